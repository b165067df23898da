use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        availability_route, events_for_grade_route, group_route, total_route,
        validate_grade_route, AvailabilityResponse, EventListResponse, GradeCheckResponse,
        GroupResponse, TotalResponse,
    },
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod catalog;
mod config;

use app_state::AppState;
use catalog::Catalog;
use config::{load_settings, read_catalog_source, Settings};

#[derive(Debug, Deserialize)]
struct GradeQuery {
    grade: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    events: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OptionQuery {
    option: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let catalog = load_catalog(&settings)?;
    info!(
        events = catalog.events().len(),
        options = catalog.option_count(),
        "event catalog loaded"
    );

    let app = build_router(Arc::new(AppState::new(catalog)), settings.request_timeout());

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(%addr, "resolution service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn load_catalog(settings: &Settings) -> anyhow::Result<Catalog> {
    match &settings.catalog_path {
        Some(path) => {
            let raw = read_catalog_source(path)?;
            Catalog::from_toml_str(&raw)
                .with_context(|| format!("invalid event catalog '{}'", path.display()))
        }
        None => Catalog::builtin().context("built-in event catalog is invalid"),
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

fn build_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(group_route(), get(http_get_group))
        .route(total_route(), get(http_calculate_total))
        .route(events_for_grade_route(), get(http_events_for_grade))
        .route(validate_grade_route(), get(http_validate_grade))
        .route(availability_route(), get(http_check_availability))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiException) -> (StatusCode, Json<ApiError>) {
    (status_for(err.code), Json(ApiError::from(err)))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_get_group(
    Query(q): Query<GradeQuery>,
) -> Result<Json<GroupResponse>, (StatusCode, Json<GroupResponse>)> {
    api::group_for_grade(q.grade.as_deref())
        .map(Json)
        .map_err(|err| {
            (
                status_for(err.code),
                Json(GroupResponse {
                    group: None,
                    error: Some(err.message),
                }),
            )
        })
}

async fn http_calculate_total(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EventsQuery>,
) -> Result<Json<TotalResponse>, (StatusCode, Json<TotalResponse>)> {
    api::total_for_events(&state.catalog, q.events.as_deref())
        .map(|total| Json(TotalResponse { total, error: None }))
        .map_err(|err| {
            (
                status_for(err.code),
                Json(TotalResponse {
                    total: Decimal::new(0, 2),
                    error: Some(err.message),
                }),
            )
        })
}

async fn http_events_for_grade(
    State(state): State<Arc<AppState>>,
    Query(q): Query<GradeQuery>,
) -> Result<Json<EventListResponse>, (StatusCode, Json<ApiError>)> {
    api::events_for_grade(&state.catalog, q.grade.as_deref())
        .map(Json)
        .map_err(reject)
}

async fn http_validate_grade(Query(q): Query<GradeQuery>) -> Json<GradeCheckResponse> {
    Json(api::check_grade(q.grade.as_deref()))
}

async fn http_check_availability(
    State(state): State<Arc<AppState>>,
    Query(q): Query<OptionQuery>,
) -> Result<Json<AvailabilityResponse>, (StatusCode, Json<ApiError>)> {
    api::availability(&state.catalog, q.option.as_deref())
        .map(Json)
        .map_err(reject)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
