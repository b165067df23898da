use super::*;
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    domain::{EventId, EventKind, Group},
    protocol::{
        AvailabilityResponse, EventListResponse, EventOptionSummary, EventSummary,
        GradeCheckResponse, GroupResponse, TotalResponse,
    },
};

use crate::{
    error::FetchErrorKind,
    render::ids,
    request::RequestPhase,
    state::{EventListDisplay, GroupDisplay, TotalDisplay},
};

/// In-memory resolution service with per-grade latency and injectable
/// failures. Fees follow the built-in catalog.
#[derive(Default)]
struct ScriptedService {
    group_delays: HashMap<u8, Duration>,
    group_error: Option<FetchError>,
    total_error: Option<FetchError>,
    group_calls: Mutex<Vec<Grade>>,
    total_calls: Mutex<Vec<Vec<EventOptionId>>>,
}

impl ScriptedService {
    fn with_group_delay(mut self, grade: u8, delay: Duration) -> Self {
        self.group_delays.insert(grade, delay);
        self
    }

    fn failing_group(mut self, err: FetchError) -> Self {
        self.group_error = Some(err);
        self
    }

    fn failing_total(mut self, err: FetchError) -> Self {
        self.total_error = Some(err);
        self
    }

    fn group_calls(&self) -> Vec<Grade> {
        self.group_calls.lock().unwrap().clone()
    }

    fn total_calls(&self) -> Vec<Vec<EventOptionId>> {
        self.total_calls.lock().unwrap().clone()
    }
}

fn fee(option_id: EventOptionId) -> Decimal {
    match option_id.0 {
        1 => Decimal::new(25000, 2),
        2 => Decimal::new(80000, 2),
        3 => Decimal::new(50000, 2),
        4 => Decimal::new(100000, 2),
        5 => Decimal::new(70000, 2),
        _ => Decimal::ZERO,
    }
}

fn option(id: i64, name: &str, kind: EventKind) -> EventOptionSummary {
    EventOptionSummary {
        option_id: EventOptionId(id),
        name: name.into(),
        kind,
        fee: fee(EventOptionId(id)),
        max_team_size: (kind == EventKind::Team).then_some(3),
        seats_remaining: None,
    }
}

#[async_trait]
impl ResolutionService for ScriptedService {
    async fn resolve_group(&self, grade: Grade) -> Result<GroupResponse, FetchError> {
        self.group_calls.lock().unwrap().push(grade);
        let delay = self
            .group_delays
            .get(&grade.value())
            .copied()
            .unwrap_or(Duration::from_millis(20));
        tokio::time::sleep(delay).await;
        if let Some(err) = &self.group_error {
            return Err(err.clone());
        }
        Ok(GroupResponse {
            group: Some(Group::for_grade(grade)),
            error: None,
        })
    }

    async fn resolve_total(
        &self,
        selection: &[EventOptionId],
    ) -> Result<TotalResponse, FetchError> {
        self.total_calls.lock().unwrap().push(selection.to_vec());
        tokio::time::sleep(Duration::from_millis(20)).await;
        if let Some(err) = &self.total_error {
            return Err(err.clone());
        }
        let total: Decimal = selection.iter().copied().map(fee).sum();
        Ok(TotalResponse {
            total: total.round_dp(2),
            error: None,
        })
    }

    async fn events_for_grade(&self, grade: Grade) -> Result<EventListResponse, FetchError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(EventListResponse {
            grade,
            group: Group::for_grade(grade),
            events: vec![
                EventSummary {
                    event_id: EventId(2),
                    name: "Web Development Competition".into(),
                    description: String::new(),
                    options: vec![option(2, "Team", EventKind::Team)],
                },
                EventSummary {
                    event_id: EventId(3),
                    name: "Programming Contest".into(),
                    description: String::new(),
                    options: vec![
                        option(3, "Individual", EventKind::Individual),
                        option(4, "Team", EventKind::Team),
                    ],
                },
            ],
        })
    }

    async fn validate_grade(&self, raw_grade: &str) -> Result<GradeCheckResponse, FetchError> {
        let group = raw_grade.parse::<i64>().ok().and_then(Group::for_raw_grade);
        Ok(GradeCheckResponse {
            valid: group.is_some(),
            group,
            message: String::new(),
        })
    }

    async fn check_availability(
        &self,
        option_id: EventOptionId,
    ) -> Result<AvailabilityResponse, FetchError> {
        Ok(AvailabilityResponse {
            option_id,
            available: true,
            seats_remaining: None,
            message: String::new(),
        })
    }
}

fn controller_with(service: ScriptedService) -> (Arc<RegistrationController>, Arc<ScriptedService>) {
    let service = Arc::new(service);
    let controller = RegistrationController::new(service.clone(), ControllerConfig::default());
    (controller, service)
}

fn grade(value: i64) -> Grade {
    Grade::new(value).expect("grade in range")
}

fn drain(rx: &mut broadcast::Receiver<ControllerEvent>) -> Vec<ControllerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(500)).await;
}

async fn select_grade(controller: &Arc<RegistrationController>, value: i64) {
    controller.on_grade_change(Some(value));
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn rapid_grade_changes_resolve_once() {
    let (controller, service) = controller_with(ScriptedService::default());

    controller.on_grade_change(Some(3));
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.on_grade_change(Some(5));
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.on_grade_change(Some(9));
    assert!(service.group_calls().is_empty());

    settle().await;
    assert_eq!(service.group_calls(), vec![grade(9)]);
    assert_eq!(
        controller.snapshot().group_display,
        GroupDisplay::Success(Group::C)
    );
}

#[tokio::test(start_paused = true)]
async fn grade_change_waits_for_quiet_period() {
    let (controller, service) = controller_with(ScriptedService::default());

    controller.on_grade_change(Some(11));
    tokio::time::sleep(Duration::from_millis(199)).await;
    assert!(service.group_calls().is_empty());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(service.group_calls(), vec![grade(11)]);
}

#[tokio::test(start_paused = true)]
async fn every_grade_maps_to_its_group() {
    let (controller, _service) = controller_with(ScriptedService::default());
    let expected = [
        (3, Group::A),
        (5, Group::A),
        (6, Group::B),
        (8, Group::B),
        (9, Group::C),
        (10, Group::C),
        (11, Group::D),
        (12, Group::D),
    ];
    for (value, group) in expected {
        let resolved = controller.resolve_group(grade(value)).await;
        assert_eq!(resolved, Resolution::Applied(GroupDisplay::Success(group)));
    }
}

#[tokio::test(start_paused = true)]
async fn empty_or_out_of_range_grade_shows_placeholder_without_request() {
    let (controller, service) = controller_with(ScriptedService::default());

    for raw in [None, Some(2), Some(13), Some(-1)] {
        controller.on_grade_change(raw);
        settle().await;
        let state = controller.snapshot();
        assert_eq!(state.grade, None);
        assert_eq!(state.group_display, GroupDisplay::Placeholder);
    }
    assert!(service.group_calls().is_empty());

    let patch = controller.render();
    assert_eq!(
        patch.by_id(ids::GROUP_DISPLAY).and_then(|e| e.text.as_deref()),
        Some("Select grade")
    );
}

#[tokio::test(start_paused = true)]
async fn superseded_grade_response_is_dropped() {
    let (controller, service) = controller_with(
        ScriptedService::default().with_group_delay(9, Duration::from_secs(1)),
    );

    controller.on_grade_change(Some(9));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(controller.snapshot().group_request.is_pending());

    controller.on_grade_change(Some(4));
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(service.group_calls(), vec![grade(9), grade(4)]);
    let state = controller.snapshot();
    assert_eq!(state.grade, Some(grade(4)));
    assert_eq!(state.group_display, GroupDisplay::Success(Group::A));
}

#[tokio::test(start_paused = true)]
async fn late_response_of_concurrent_resolution_is_superseded() {
    let (controller, _service) = controller_with(
        ScriptedService::default().with_group_delay(9, Duration::from_secs(1)),
    );

    let slow_controller = controller.clone();
    let slow = tokio::spawn(async move { slow_controller.resolve_group(grade(9)).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let fast = controller.resolve_group(grade(4)).await;
    assert_eq!(fast, Resolution::Applied(GroupDisplay::Success(Group::A)));

    let late = slow.await.expect("join");
    assert_eq!(late, Resolution::Superseded);
    assert_eq!(
        controller.snapshot().group_display,
        GroupDisplay::Success(Group::A)
    );
}

#[tokio::test(start_paused = true)]
async fn network_failure_renders_error_and_clears_loading_together() {
    let (controller, _service) = controller_with(
        ScriptedService::default().failing_group(FetchError::Network("connection reset".into())),
    );
    let mut rx = controller.subscribe();

    select_grade(&controller, 7).await;

    let events = drain(&mut rx);
    let error_patch = events
        .iter()
        .filter_map(|event| match event {
            ControllerEvent::Rendered(patch) => Some(patch),
            _ => None,
        })
        .find(|patch| {
            patch
                .by_id(ids::GROUP_DISPLAY)
                .is_some_and(|e| e.has_class("error-network"))
        })
        .expect("error patch");
    assert!(error_patch
        .by_id(ids::GROUP_LOADING)
        .is_some_and(|e| !e.visible));

    assert!(events.iter().any(|event| matches!(
        event,
        ControllerEvent::RequestFailed {
            endpoint: Endpoint::Group,
            category: "network",
            ..
        }
    )));
    assert_eq!(
        controller.snapshot().group_display,
        GroupDisplay::Error(FetchErrorKind::Network)
    );
}

#[tokio::test(start_paused = true)]
async fn loading_indicator_is_shown_while_request_is_pending() {
    let (controller, _service) = controller_with(
        ScriptedService::default().with_group_delay(6, Duration::from_millis(400)),
    );

    controller.on_grade_change(Some(6));
    tokio::time::sleep(Duration::from_millis(300)).await;
    let patch = controller.render();
    assert!(patch.by_id(ids::GROUP_LOADING).is_some_and(|e| e.visible));

    tokio::time::sleep(Duration::from_millis(400)).await;
    let patch = controller.render();
    assert!(patch.by_id(ids::GROUP_LOADING).is_some_and(|e| !e.visible));
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_becomes_timeout() {
    let (controller, _service) = controller_with(
        ScriptedService::default().with_group_delay(10, Duration::from_secs(60)),
    );
    let mut rx = controller.subscribe();

    let resolved = controller.resolve_group(grade(10)).await;
    assert_eq!(
        resolved,
        Resolution::Applied(GroupDisplay::Error(FetchErrorKind::Timeout))
    );
    assert_eq!(
        controller.snapshot().group_request.phase(),
        RequestPhase::Settled(RequestOutcome::Timeout)
    );
    assert!(drain(&mut rx).iter().any(|event| matches!(
        event,
        ControllerEvent::RequestFailed {
            category: "timeout",
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn grade_change_loads_events_for_the_grade() {
    let (controller, _service) = controller_with(ScriptedService::default());
    select_grade(&controller, 10).await;

    let state = controller.snapshot();
    match &state.event_list {
        EventListDisplay::Loaded(events) => assert_eq!(events.len(), 2),
        other => panic!("unexpected event list {other:?}"),
    }
    assert!(controller.render().option(EventOptionId(3)).is_some());
}

#[tokio::test(start_paused = true)]
async fn toggling_recomputes_total_from_the_service() {
    let (controller, service) = controller_with(ScriptedService::default());
    select_grade(&controller, 9).await;

    controller.on_event_toggle(EventOptionId(2), true);
    settle().await;
    assert_eq!(
        controller.snapshot().total_display,
        TotalDisplay::Amount(Decimal::new(80000, 2))
    );

    controller.on_event_toggle(EventOptionId(3), true);
    settle().await;
    assert_eq!(
        controller.snapshot().total_display,
        TotalDisplay::Amount(Decimal::new(130000, 2))
    );

    controller.on_event_toggle(EventOptionId(3), false);
    settle().await;
    assert_eq!(
        controller.snapshot().total_display,
        TotalDisplay::Amount(Decimal::new(80000, 2))
    );
    assert_eq!(
        service.total_calls(),
        vec![
            vec![EventOptionId(2)],
            vec![EventOptionId(2), EventOptionId(3)],
            vec![EventOptionId(2)],
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn toggles_inside_settle_window_share_one_request() {
    let (controller, service) = controller_with(ScriptedService::default());
    select_grade(&controller, 9).await;

    controller.on_event_toggle(EventOptionId(2), true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.on_event_toggle(EventOptionId(3), true);
    settle().await;

    assert_eq!(
        service.total_calls(),
        vec![vec![EventOptionId(2), EventOptionId(3)]]
    );
}

#[tokio::test(start_paused = true)]
async fn choosing_another_option_of_the_same_event_replaces_it() {
    let (controller, _service) = controller_with(ScriptedService::default());
    select_grade(&controller, 12).await;

    controller.on_event_toggle(EventOptionId(3), true);
    controller.on_event_toggle(EventOptionId(4), true);
    settle().await;

    let state = controller.snapshot();
    assert_eq!(state.selection.ids(), vec![EventOptionId(4)]);
    assert_eq!(
        state.total_display,
        TotalDisplay::Amount(Decimal::new(100000, 2))
    );
}

#[tokio::test(start_paused = true)]
async fn empty_selection_short_circuits_to_zero() {
    let (controller, service) = controller_with(ScriptedService::default());

    let resolved = controller.resolve_total(Vec::new()).await;
    assert_eq!(resolved, Resolution::Applied(TotalDisplay::zero()));
    assert!(service.total_calls().is_empty());

    select_grade(&controller, 9).await;
    controller.on_event_toggle(EventOptionId(2), true);
    settle().await;
    controller.on_event_toggle(EventOptionId(2), false);
    settle().await;

    assert_eq!(controller.snapshot().total_display, TotalDisplay::zero());
    assert_eq!(service.total_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn grade_change_clears_selection_and_total() {
    let (controller, _service) = controller_with(ScriptedService::default());
    select_grade(&controller, 9).await;
    controller.on_event_toggle(EventOptionId(2), true);
    settle().await;
    assert!(!controller.snapshot().selection.is_empty());

    controller.on_grade_change(Some(4));
    let state = controller.snapshot();
    assert!(state.selection.is_empty());
    assert_eq!(state.total_display, TotalDisplay::zero());
    assert_eq!(state.group_display, GroupDisplay::Placeholder);

    controller.on_grade_change(None);
    let patch = controller.render();
    assert_eq!(
        patch.by_id(ids::TOTAL_AMOUNT).and_then(|e| e.text.as_deref()),
        Some("৳0.00")
    );
}

#[tokio::test(start_paused = true)]
async fn grade_change_aborts_pending_total() {
    let (controller, service) = controller_with(ScriptedService::default());
    select_grade(&controller, 9).await;

    controller.on_event_toggle(EventOptionId(2), true);
    controller.on_grade_change(Some(9));
    settle().await;

    assert!(service.total_calls().is_empty());
    assert_eq!(controller.snapshot().total_display, TotalDisplay::zero());
}

#[tokio::test(start_paused = true)]
async fn failed_total_renders_error_state() {
    let (controller, _service) = controller_with(ScriptedService::default().failing_total(
        FetchError::Server {
            status: 400,
            message: "Invalid event selection".into(),
        },
    ));
    select_grade(&controller, 9).await;

    controller.on_event_toggle(EventOptionId(2), true);
    settle().await;

    let state = controller.snapshot();
    assert_eq!(
        state.total_display,
        TotalDisplay::Error(FetchErrorKind::Server)
    );
    let patch = controller.render();
    assert!(patch
        .by_id(ids::TOTAL_AMOUNT)
        .is_some_and(|e| e.has_class("text-red-500")));
    assert!(patch.by_id(ids::TOTAL_LOADING).is_some_and(|e| !e.visible));
}

#[tokio::test(start_paused = true)]
async fn validation_notice_expires_after_ttl() {
    let (controller, _service) = controller_with(ScriptedService::default());

    assert_eq!(
        controller.validate_submission(),
        Err(ValidationError::MissingGrade)
    );
    let notice = controller.snapshot().notification.expect("notice");
    assert_eq!(notice.field, ids::GRADE);

    tokio::time::sleep(Duration::from_millis(4900)).await;
    assert!(controller.snapshot().notification.is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(controller.snapshot().notification.is_none());
}

#[tokio::test(start_paused = true)]
async fn notice_can_be_dismissed() {
    let (controller, _service) = controller_with(ScriptedService::default());
    select_grade(&controller, 8).await;

    assert_eq!(
        controller.validate_submission(),
        Err(ValidationError::NoEventsSelected)
    );
    assert!(controller
        .render()
        .by_id(ids::EVENT_LIST)
        .is_some_and(|e| e.has_class("field-invalid")));

    controller.dismiss_notification();
    assert!(controller.snapshot().notification.is_none());
    assert!(controller
        .render()
        .by_id(ids::NOTIFICATION)
        .is_some_and(|e| !e.visible));
}

#[tokio::test(start_paused = true)]
async fn submit_yields_form_payload() {
    let (controller, _service) = controller_with(ScriptedService::default());

    assert_eq!(controller.submit(), Err(ValidationError::MissingGrade));

    select_grade(&controller, 10).await;
    controller.on_event_toggle(EventOptionId(3), true);
    controller.on_event_toggle(EventOptionId(2), true);
    settle().await;

    let payload = controller.submit().expect("valid form");
    assert_eq!(
        payload,
        SubmissionPayload {
            grade: grade(10),
            selected_events: "2,3".into(),
        }
    );
    assert!(controller.snapshot().notification.is_none());
}
