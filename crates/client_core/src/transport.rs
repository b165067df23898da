//! HTTP access to the resolution service plus the request-lifecycle hooks
//! observers subscribe to.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{EventOptionId, Grade},
    protocol::{
        availability_route, events_for_grade_route, group_route, join_event_ids, total_route,
        validate_grade_route, AvailabilityResponse, EventListResponse, GradeCheckResponse,
        GroupResponse, TotalResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Group,
    Total,
    EventsForGrade,
    ValidateGrade,
    Availability,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Group => group_route(),
            Endpoint::Total => total_route(),
            Endpoint::EventsForGrade => events_for_grade_route(),
            Endpoint::ValidateGrade => validate_grade_route(),
            Endpoint::Availability => availability_route(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Group => "group",
            Endpoint::Total => "total",
            Endpoint::EventsForGrade => "events_for_grade",
            Endpoint::ValidateGrade => "validate_grade",
            Endpoint::Availability => "availability",
        }
    }
}

#[async_trait]
pub trait ResolutionService: Send + Sync {
    async fn resolve_group(&self, grade: Grade) -> Result<GroupResponse, FetchError>;
    async fn resolve_total(&self, selection: &[EventOptionId])
        -> Result<TotalResponse, FetchError>;
    async fn events_for_grade(&self, grade: Grade) -> Result<EventListResponse, FetchError>;
    async fn validate_grade(&self, raw_grade: &str) -> Result<GradeCheckResponse, FetchError>;
    async fn check_availability(
        &self,
        option_id: EventOptionId,
    ) -> Result<AvailabilityResponse, FetchError>;
}

/// Typed hooks fired around every request the HTTP service issues. Every
/// `on_request_start` is followed by exactly one of `on_request_end` or
/// `on_request_cancelled`.
pub trait LifecycleObserver: Send + Sync {
    fn on_request_start(&self, _endpoint: Endpoint, _request_id: u64) {}

    fn on_request_end(
        &self,
        _endpoint: Endpoint,
        _request_id: u64,
        _result: Result<(), &FetchError>,
    ) {
    }

    /// The request future was dropped before a response arrived.
    fn on_request_cancelled(&self, _endpoint: Endpoint, _request_id: u64) {}
}

/// Request-level trace output. Failures are reported at `warn` by whoever
/// consumes the result, so this stays at `debug`.
pub struct TracingObserver;

impl LifecycleObserver for TracingObserver {
    fn on_request_start(&self, endpoint: Endpoint, request_id: u64) {
        debug!(endpoint = endpoint.name(), request_id, "request started");
    }

    fn on_request_end(&self, endpoint: Endpoint, request_id: u64, result: Result<(), &FetchError>) {
        match result {
            Ok(()) => debug!(endpoint = endpoint.name(), request_id, "request succeeded"),
            Err(err) => debug!(
                endpoint = endpoint.name(),
                request_id,
                category = err.category(),
                "request failed"
            ),
        }
    }

    fn on_request_cancelled(&self, endpoint: Endpoint, request_id: u64) {
        debug!(endpoint = endpoint.name(), request_id, "request cancelled");
    }
}

/// Pairs a started request with its end notification, reporting a
/// cancellation if dropped before `finish`.
struct InFlight {
    endpoint: Endpoint,
    request_id: u64,
    observers: Vec<Arc<dyn LifecycleObserver>>,
    finished: bool,
}

impl InFlight {
    fn start(
        endpoint: Endpoint,
        request_id: u64,
        observers: Vec<Arc<dyn LifecycleObserver>>,
    ) -> Self {
        for observer in &observers {
            observer.on_request_start(endpoint, request_id);
        }
        Self {
            endpoint,
            request_id,
            observers,
            finished: false,
        }
    }

    fn finish(mut self, result: Result<(), &FetchError>) {
        self.finished = true;
        for observer in &self.observers {
            observer.on_request_end(self.endpoint, self.request_id, result);
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        for observer in &self.observers {
            observer.on_request_cancelled(self.endpoint, self.request_id);
        }
    }
}

pub struct HttpResolutionService {
    http: Client,
    base_url: Url,
    timeout: Duration,
    observers: RwLock<Vec<Arc<dyn LifecycleObserver>>>,
    next_request_id: AtomicU64,
}

impl HttpResolutionService {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(server_url)
            .with_context(|| format!("invalid server url '{server_url}'"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            anyhow::bail!("server_url must start with http:// or https://");
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            timeout,
            observers: RwLock::new(Vec::new()),
            next_request_id: AtomicU64::new(1),
        })
    }

    pub fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn observers(&self) -> Vec<Arc<dyn LifecycleObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn url_for(&self, endpoint: Endpoint, query: &[(&str, String)]) -> Result<Url, FetchError> {
        let mut url = self
            .base_url
            .join(endpoint.path())
            .map_err(|err| FetchError::Network(format!("invalid request url: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let in_flight = InFlight::start(endpoint, request_id, self.observers());

        let result = self.send(endpoint, query).await;

        in_flight.finish(result.as_ref().map(|_| ()));
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = self.url_for(endpoint, query)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::from_reqwest(err, self.timeout))?;

        let status = response.status();
        if status == StatusCode::REQUEST_TIMEOUT {
            return Err(FetchError::Timeout(self.timeout));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Server {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| FetchError::from_reqwest(err, self.timeout))
    }
}

/// Pulls the human-readable reason out of `{"error": ...}` or
/// `{"message": ...}` bodies.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[async_trait]
impl ResolutionService for HttpResolutionService {
    async fn resolve_group(&self, grade: Grade) -> Result<GroupResponse, FetchError> {
        self.get_json(Endpoint::Group, &[("grade", grade.value().to_string())])
            .await
    }

    async fn resolve_total(
        &self,
        selection: &[EventOptionId],
    ) -> Result<TotalResponse, FetchError> {
        self.get_json(Endpoint::Total, &[("events", join_event_ids(selection))])
            .await
    }

    async fn events_for_grade(&self, grade: Grade) -> Result<EventListResponse, FetchError> {
        self.get_json(
            Endpoint::EventsForGrade,
            &[("grade", grade.value().to_string())],
        )
        .await
    }

    async fn validate_grade(&self, raw_grade: &str) -> Result<GradeCheckResponse, FetchError> {
        self.get_json(Endpoint::ValidateGrade, &[("grade", raw_grade.to_string())])
            .await
    }

    async fn check_availability(
        &self,
        option_id: EventOptionId,
    ) -> Result<AvailabilityResponse, FetchError> {
        self.get_json(Endpoint::Availability, &[("option", option_id.0.to_string())])
            .await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
