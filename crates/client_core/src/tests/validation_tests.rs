use super::*;
use crate::state::EventChoice;
use shared::domain::{EventOptionId, Grade};

fn pick(state: &mut FormState, id: i64) {
    state.selection.toggle(
        EventChoice {
            option_id: EventOptionId(id),
            event_id: None,
        },
        true,
    );
}

#[test]
fn missing_grade_wins_regardless_of_events() {
    let mut state = FormState::default();
    assert_eq!(
        validate_submission(&state),
        Err(ValidationError::MissingGrade)
    );

    pick(&mut state, 1);
    assert_eq!(
        validate_submission(&state),
        Err(ValidationError::MissingGrade)
    );
}

#[test]
fn grade_without_events_is_rejected() {
    let mut state = FormState::default();
    state.grade = Grade::new(7);
    assert_eq!(
        validate_submission(&state),
        Err(ValidationError::NoEventsSelected)
    );
}

#[test]
fn grade_and_events_pass() {
    let mut state = FormState::default();
    state.grade = Grade::new(11);
    pick(&mut state, 3);
    assert_eq!(validate_submission(&state), Ok(()));
}
