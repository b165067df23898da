use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    render::ids,
    request::RequestPhase,
    ControllerConfig, ControllerEvent, DomPatch, FormState, HttpResolutionService,
    RegistrationController, ResolutionService, TracingObserver,
};
use shared::{
    domain::{format_taka, EventOptionId, Grade},
    protocol::parse_event_ids,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "regform", about = "Fill the registration form against a resolution server")]
struct Args {
    #[arg(long, env = "REGFORM_SERVER_URL", default_value = "http://127.0.0.1:8000")]
    server_url: String,
    /// Overrides REGFORM_DEBOUNCE_MS.
    #[arg(long)]
    debounce_ms: Option<u64>,
    #[arg(long)]
    total_settle_ms: Option<u64>,
    #[arg(long)]
    request_timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the group for a grade.
    Group {
        #[arg(long)]
        grade: i64,
    },
    /// Compute the fee total for comma-separated option ids.
    Total {
        #[arg(long)]
        events: String,
    },
    /// List the events open to a grade.
    Events {
        #[arg(long)]
        grade: i64,
    },
    /// Ask the server whether a grade label is registrable.
    Validate {
        #[arg(long)]
        grade: String,
    },
    Availability {
        #[arg(long)]
        option: i64,
    },
    /// Pick a grade and events, validate, and print the submission.
    Fill {
        #[arg(long)]
        grade: Option<i64>,
        #[arg(long, default_value = "")]
        events: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let config = controller_config(&args);
    let service = Arc::new(HttpResolutionService::new(
        &args.server_url,
        config.request_timeout,
    )?);
    service.subscribe(Arc::new(TracingObserver));
    info!(server_url = %args.server_url, ?config, "regform starting");

    match args.command {
        Command::Group { grade } => {
            let controller = RegistrationController::new(service, config);
            let mut rx = controller.subscribe();
            controller.on_grade_change(Some(grade));
            if Grade::new(grade).is_some() {
                wait_for(&controller, &mut rx, group_settled).await?;
            }
            print_element(&controller.render(), ids::GROUP_DISPLAY);
        }
        Command::Total { events } => {
            let selection = parse_event_ids(&events)?;
            let controller = RegistrationController::new(service, config);
            let mut rx = controller.subscribe();
            for option_id in &selection {
                controller.on_event_toggle(*option_id, true);
            }
            if !selection.is_empty() {
                wait_for(&controller, &mut rx, total_settled).await?;
            }
            print_element(&controller.render(), ids::TOTAL_AMOUNT);
        }
        Command::Events { grade } => {
            let Some(grade) = Grade::new(grade) else {
                bail!("grade {grade} is not in valid range (3-12)");
            };
            let response = service.events_for_grade(grade).await?;
            println!("{} events for grade {}", response.group.label(), grade.value());
            for event in &response.events {
                println!("{} (event {})", event.name, event.event_id);
                for option in &event.options {
                    let seats = option
                        .seats_remaining
                        .map(|n| format!(", {n} seats left"))
                        .unwrap_or_default();
                    println!(
                        "  [{}] {} {}{}",
                        option.option_id,
                        option.name,
                        format_taka(option.fee),
                        seats
                    );
                }
            }
        }
        Command::Validate { grade } => {
            let response = service.validate_grade(&grade).await?;
            println!("{grade}: {}", response.message);
            if !response.valid {
                bail!("grade '{grade}' is not registrable");
            }
        }
        Command::Availability { option } => {
            let response = service.check_availability(EventOptionId(option)).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Fill { grade, events } => {
            let selection = parse_event_ids(&events)?;
            let controller = RegistrationController::new(service, config);
            fill(&controller, grade, &selection).await?;
        }
    }

    Ok(())
}

fn controller_config(args: &Args) -> ControllerConfig {
    let mut config = ControllerConfig::from_env();
    if let Some(ms) = args.debounce_ms {
        config.debounce = Duration::from_millis(ms);
    }
    if let Some(ms) = args.total_settle_ms {
        config.total_settle = Duration::from_millis(ms);
    }
    if let Some(ms) = args.request_timeout_ms {
        config.request_timeout = Duration::from_millis(ms.max(1));
    }
    config
}

async fn fill(
    controller: &Arc<RegistrationController>,
    grade: Option<i64>,
    selection: &[EventOptionId],
) -> Result<()> {
    let mut rx = controller.subscribe();

    controller.on_grade_change(grade);
    if grade.and_then(Grade::new).is_some() {
        wait_for(controller, &mut rx, |state| {
            group_settled(state) && events_settled(state)
        })
        .await?;
    }

    if !selection.is_empty() {
        for option_id in selection {
            controller.on_event_toggle(*option_id, true);
        }
        wait_for(controller, &mut rx, total_settled).await?;
    }

    let submission = controller.submit();
    let patch = controller.render();
    for id in [
        ids::GROUP_DISPLAY,
        ids::EVENT_LIST,
        ids::TOTAL_AMOUNT,
        ids::NOTIFICATION,
    ] {
        print_element(&patch, id);
    }
    for element in patch
        .elements
        .iter()
        .filter(|e| e.has_class(client_core::render::EVENT_OPTION_CLASS))
    {
        let marker = if element.has_class("selected") { "x" } else { " " };
        println!(
            "  [{marker}] {}",
            element.text.as_deref().unwrap_or(&element.selector)
        );
    }

    match submission {
        Ok(payload) => {
            println!(
                "submit: grade={} selected_events={}",
                payload.grade.value(),
                payload.selected_events
            );
            Ok(())
        }
        Err(reason) => bail!("submission blocked: {reason}"),
    }
}

fn group_settled(state: &FormState) -> bool {
    matches!(state.group_request.phase(), RequestPhase::Settled(_))
}

fn events_settled(state: &FormState) -> bool {
    matches!(state.events_request.phase(), RequestPhase::Settled(_))
}

fn total_settled(state: &FormState) -> bool {
    matches!(state.total_request.phase(), RequestPhase::Settled(_))
}

/// Waits on render notifications until `done` holds for the form state.
async fn wait_for(
    controller: &Arc<RegistrationController>,
    rx: &mut broadcast::Receiver<ControllerEvent>,
    done: impl Fn(&FormState) -> bool,
) -> Result<FormState> {
    let config = controller.config();
    let limit = config.debounce + config.total_settle + config.request_timeout * 2;

    tokio::time::timeout(limit, async {
        loop {
            let state = controller.snapshot();
            if done(&state) {
                return Ok(state);
            }
            match rx.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => bail!("controller stopped publishing"),
            }
        }
    })
    .await
    .context("timed out waiting for the form to settle")?
}

fn print_element(patch: &DomPatch, id: &str) {
    let Some(element) = patch.by_id(id) else {
        return;
    };
    if !element.visible {
        return;
    }
    let text = element.text.as_deref().unwrap_or("");
    if element.classes.is_empty() {
        println!("#{id}: {text}");
    } else {
        println!("#{id}: {text} [{}]", element.classes.join(" "));
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
