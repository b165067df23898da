//! The registration form controller.
//!
//! All form state lives behind one lock and only the controller writes it.
//! Every state change is followed by a fresh [`DomPatch`] broadcast to
//! subscribers. Debounced work runs on [`CancellableTimer`]s so a newer
//! trigger aborts, rather than races, the older one.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use shared::{
    domain::{EventOptionId, Grade},
    protocol::join_event_ids,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    config::ControllerConfig,
    error::{FetchError, ValidationError},
    render::{render, DomPatch},
    request::RequestOutcome,
    state::{EventListDisplay, FormState, GroupDisplay, TotalDisplay},
    timer::CancellableTimer,
    transport::{Endpoint, ResolutionService},
    validation,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Rendered(DomPatch),
    RequestFailed {
        endpoint: Endpoint,
        category: &'static str,
        message: String,
    },
}

/// Whether a response made it onto the form or arrived after a newer request
/// had taken its slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Applied(T),
    Superseded,
}

impl<T> Resolution<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Resolution::Applied(value) => Some(value),
            Resolution::Superseded => None,
        }
    }
}

/// What the form posts once validation passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub grade: Grade,
    /// Comma-joined option ids, the format of the form's hidden field.
    pub selected_events: String,
}

struct ControllerInner {
    state: FormState,
    grade_timer: CancellableTimer,
    total_timer: CancellableTimer,
    notification_timer: CancellableTimer,
}

pub struct RegistrationController {
    service: Arc<dyn ResolutionService>,
    config: ControllerConfig,
    inner: Mutex<ControllerInner>,
    events: broadcast::Sender<ControllerEvent>,
}

impl RegistrationController {
    pub fn new(service: Arc<dyn ResolutionService>, config: ControllerConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            service,
            config,
            inner: Mutex::new(ControllerInner {
                state: FormState::default(),
                grade_timer: CancellableTimer::new(),
                total_timer: CancellableTimer::new(),
                notification_timer: CancellableTimer::new(),
            }),
            events,
        })
    }

    pub fn config(&self) -> ControllerConfig {
        self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> FormState {
        self.lock().state.clone()
    }

    pub fn render(&self) -> DomPatch {
        render(&self.lock().state)
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &FormState) {
        // no receivers is fine
        let _ = self.events.send(ControllerEvent::Rendered(render(state)));
    }

    fn report_failure(&self, endpoint: Endpoint, err: &FetchError) {
        warn!(
            endpoint = endpoint.name(),
            category = err.category(),
            status = ?err.status(),
            error = %err,
            "request failed"
        );
        let _ = self.events.send(ControllerEvent::RequestFailed {
            endpoint,
            category: err.category(),
            message: err.to_string(),
        });
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, FetchError> {
        match tokio::time::timeout(self.config.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.config.request_timeout)),
        }
    }

    /// Clears the event selection and everything derived from the previous
    /// grade, then resolves the new grade once it has been stable for the
    /// debounce period. `None` and grades outside 3..=12 leave the form on the
    /// "select grade" placeholder without touching the network.
    pub fn on_grade_change(self: &Arc<Self>, raw_grade: Option<i64>) {
        let grade = raw_grade.and_then(Grade::new);
        if raw_grade.is_some() && grade.is_none() {
            debug!(?raw_grade, "grade outside the supported range");
        }

        let mut inner = self.lock();
        inner.grade_timer.cancel();
        inner.total_timer.cancel();
        inner.state.reset_for_grade(grade);

        if let Some(grade) = grade {
            let weak: Weak<Self> = Arc::downgrade(self);
            inner.grade_timer.schedule(self.config.debounce, async move {
                let Some(controller) = weak.upgrade() else {
                    return;
                };
                futures::future::join(
                    controller.resolve_group(grade),
                    controller.load_events(grade),
                )
                .await;
            });
        }

        self.publish(&inner.state);
    }

    pub async fn resolve_group(&self, grade: Grade) -> Resolution<GroupDisplay> {
        let ticket = {
            let mut inner = self.lock();
            let ticket = inner.state.group_request.begin();
            self.publish(&inner.state);
            ticket
        };

        let result = self.bounded(self.service.resolve_group(grade)).await;

        let mut inner = self.lock();
        if !inner
            .state
            .group_request
            .settle(ticket, RequestOutcome::from(&result))
        {
            debug!(grade = grade.value(), "dropping superseded group response");
            return Resolution::Superseded;
        }

        let display = match result {
            Ok(response) => match response.group {
                Some(group) => GroupDisplay::Success(group),
                None => {
                    if let Some(error) = response.error {
                        warn!(grade = grade.value(), %error, "server returned no group");
                    }
                    GroupDisplay::Placeholder
                }
            },
            Err(err) => {
                self.report_failure(Endpoint::Group, &err);
                GroupDisplay::Error(err.kind())
            }
        };
        inner.state.group_display = display;
        self.publish(&inner.state);
        Resolution::Applied(display)
    }

    /// Fetches the events open to `grade` so toggles know their fees and
    /// radio groups.
    pub async fn load_events(&self, grade: Grade) -> Resolution<usize> {
        let ticket = {
            let mut inner = self.lock();
            let ticket = inner.state.events_request.begin();
            self.publish(&inner.state);
            ticket
        };

        let result = self.bounded(self.service.events_for_grade(grade)).await;

        let mut inner = self.lock();
        if !inner
            .state
            .events_request
            .settle(ticket, RequestOutcome::from(&result))
        {
            debug!(grade = grade.value(), "dropping superseded event list");
            return Resolution::Superseded;
        }

        let loaded = match result {
            Ok(response) => {
                let count = response.events.len();
                inner.state.event_list = EventListDisplay::Loaded(response.events);
                count
            }
            Err(err) => {
                self.report_failure(Endpoint::EventsForGrade, &err);
                inner.state.event_list = EventListDisplay::Error(err.kind());
                0
            }
        };
        self.publish(&inner.state);
        Resolution::Applied(loaded)
    }

    /// Applies the toggle immediately and recalculates the total after the
    /// settle delay. Checking an option unticks any other option of the same
    /// event.
    pub fn on_event_toggle(self: &Arc<Self>, option_id: EventOptionId, checked: bool) {
        let mut inner = self.lock();
        let choice = inner.state.event_list.choice_for(option_id);
        let displaced = inner.state.selection.toggle(choice, checked);
        if !displaced.is_empty() {
            debug!(option = %option_id, ?displaced, "replaced option of the same event");
        }
        if inner.state.notification.as_ref().map(|n| n.reason)
            == Some(ValidationError::NoEventsSelected)
            && !inner.state.selection.is_empty()
        {
            inner.notification_timer.cancel();
            inner.state.notification = None;
        }

        inner.total_timer.cancel();
        inner.state.total_request.invalidate();

        let selection = inner.state.selection.ids();
        let weak: Weak<Self> = Arc::downgrade(self);
        inner.total_timer.schedule(self.config.total_settle, async move {
            if let Some(controller) = weak.upgrade() {
                controller.resolve_total(selection).await;
            }
        });

        self.publish(&inner.state);
    }

    pub async fn resolve_total(&self, selection: Vec<EventOptionId>) -> Resolution<TotalDisplay> {
        if selection.is_empty() {
            let mut inner = self.lock();
            let ticket = inner.state.total_request.begin();
            inner.state.total_request.settle(ticket, RequestOutcome::Success);
            inner.state.total_display = TotalDisplay::zero();
            self.publish(&inner.state);
            return Resolution::Applied(TotalDisplay::zero());
        }

        let ticket = {
            let mut inner = self.lock();
            let ticket = inner.state.total_request.begin();
            self.publish(&inner.state);
            ticket
        };

        let result = self.bounded(self.service.resolve_total(&selection)).await;

        let mut inner = self.lock();
        if !inner
            .state
            .total_request
            .settle(ticket, RequestOutcome::from(&result))
        {
            debug!(
                events = %join_event_ids(&selection),
                "dropping superseded total"
            );
            return Resolution::Superseded;
        }

        let display = match result {
            Ok(response) => TotalDisplay::Amount(response.total),
            Err(err) => {
                self.report_failure(Endpoint::Total, &err);
                TotalDisplay::Error(err.kind())
            }
        };
        inner.state.total_display = display;
        self.publish(&inner.state);
        Resolution::Applied(display)
    }

    /// Checks the submission preconditions. A failure shows a notice next to
    /// the offending field that expires after the configured TTL.
    pub fn validate_submission(self: &Arc<Self>) -> Result<(), ValidationError> {
        let mut inner = self.lock();
        let result = validation::validate_submission(&inner.state);

        match result {
            Ok(()) => {
                inner.notification_timer.cancel();
                inner.state.notification = None;
            }
            Err(reason) => {
                inner.state.notification = Some(reason.into());
                let weak: Weak<Self> = Arc::downgrade(self);
                inner
                    .notification_timer
                    .schedule(self.config.notification_ttl, async move {
                        if let Some(controller) = weak.upgrade() {
                            controller.expire_notification(reason);
                        }
                    });
            }
        }

        self.publish(&inner.state);
        result
    }

    fn expire_notification(&self, reason: ValidationError) {
        let mut inner = self.lock();
        if inner.state.notification.as_ref().map(|n| n.reason) == Some(reason) {
            inner.state.notification = None;
            self.publish(&inner.state);
        }
    }

    pub fn dismiss_notification(&self) {
        let mut inner = self.lock();
        inner.notification_timer.cancel();
        if inner.state.notification.take().is_some() {
            self.publish(&inner.state);
        }
    }

    pub fn submit(self: &Arc<Self>) -> Result<SubmissionPayload, ValidationError> {
        self.validate_submission()?;

        let inner = self.lock();
        let grade = inner.state.grade.ok_or(ValidationError::MissingGrade)?;
        let payload = SubmissionPayload {
            grade,
            selected_events: join_event_ids(&inner.state.selection.ids()),
        };
        info!(
            grade = grade.value(),
            selected_events = %payload.selected_events,
            "registration form ready to submit"
        );
        Ok(payload)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
