use super::*;
use std::time::Duration;

#[test]
fn begin_moves_to_pending_with_a_fresh_ticket() {
    let mut slot = RequestSlot::new(Endpoint::Group);
    assert_eq!(slot.phase(), RequestPhase::Idle);

    let first = slot.begin();
    let second = slot.begin();
    assert_ne!(first, second);
    assert_eq!(second.endpoint, Endpoint::Group);
    assert_eq!(slot.phase(), RequestPhase::Pending(second));
    assert!(slot.is_current(second));
    assert!(!slot.is_current(first));
}

#[test]
fn stale_ticket_cannot_settle() {
    let mut slot = RequestSlot::new(Endpoint::Group);
    let stale = slot.begin();
    let current = slot.begin();

    assert!(!slot.settle(stale, RequestOutcome::Success));
    assert_eq!(slot.phase(), RequestPhase::Pending(current));

    assert!(slot.settle(current, RequestOutcome::Timeout));
    assert_eq!(slot.phase(), RequestPhase::Settled(RequestOutcome::Timeout));
    assert!(!slot.is_pending());
}

#[test]
fn a_ticket_settles_once() {
    let mut slot = RequestSlot::new(Endpoint::Total);
    let ticket = slot.begin();
    assert!(slot.settle(ticket, RequestOutcome::Success));
    assert!(!slot.settle(ticket, RequestOutcome::ServerError));
    assert_eq!(slot.phase(), RequestPhase::Settled(RequestOutcome::Success));
}

#[test]
fn invalidate_returns_to_idle_and_orphans_pending_ticket() {
    let mut slot = RequestSlot::new(Endpoint::Total);
    let ticket = slot.begin();
    slot.invalidate();

    assert_eq!(slot.phase(), RequestPhase::Idle);
    assert!(!slot.settle(ticket, RequestOutcome::Success));
    assert_eq!(slot.phase(), RequestPhase::Idle);
}

#[test]
fn outcome_follows_error_kind() {
    let ok: Result<(), FetchError> = Ok(());
    assert_eq!(RequestOutcome::from(&ok), RequestOutcome::Success);

    let cases = [
        (
            FetchError::Network("connection refused".into()),
            RequestOutcome::NetworkError,
        ),
        (
            FetchError::Timeout(Duration::from_secs(10)),
            RequestOutcome::Timeout,
        ),
        (
            FetchError::Server {
                status: 503,
                message: "unavailable".into(),
            },
            RequestOutcome::ServerError,
        ),
    ];
    for (err, expected) in cases {
        let result: Result<(), FetchError> = Err(err);
        assert_eq!(RequestOutcome::from(&result), expected);
    }
}
