use crate::{error::ValidationError, state::FormState};

/// Runs before submission. A missing grade is reported first, whatever the
/// event selection looks like.
pub fn validate_submission(state: &FormState) -> Result<(), ValidationError> {
    if state.grade.is_none() {
        return Err(ValidationError::MissingGrade);
    }
    if state.selection.is_empty() {
        return Err(ValidationError::NoEventsSelected);
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
