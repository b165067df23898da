use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use shared::{
    domain::{parse_grade_label, EventId, EventOptionId, GradeParseError},
    error::{ApiException, ErrorCode},
    protocol::{
        parse_event_ids, AvailabilityResponse, EventListResponse, GradeCheckResponse,
        GroupResponse,
    },
};
use tracing::{debug, warn};

use crate::catalog::Catalog;

pub const INVALID_GRADE: &str = "Invalid grade";
pub const INVALID_SELECTION: &str = "Invalid event selection";

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

/// An empty grade is not an error: the form shows its placeholder until a
/// grade is chosen.
pub fn group_for_grade(raw_grade: Option<&str>) -> Result<GroupResponse, ApiException> {
    let Some(raw_grade) = non_empty(raw_grade) else {
        return Ok(GroupResponse::default());
    };

    match parse_grade_label(raw_grade) {
        Ok(grade) => Ok(GroupResponse {
            group: Some(grade.group()),
            error: None,
        }),
        Err(err @ GradeParseError::OutOfRange(_)) => Ok(GroupResponse {
            group: None,
            error: Some(err.to_string()),
        }),
        Err(GradeParseError::Unrecognized(_)) => {
            Err(ApiException::new(ErrorCode::Validation, INVALID_GRADE))
        }
    }
}

pub fn total_for_events(
    catalog: &Catalog,
    raw_events: Option<&str>,
) -> Result<Decimal, ApiException> {
    let ids = parse_event_ids(raw_events.unwrap_or_default())
        .map_err(|_| ApiException::new(ErrorCode::Validation, INVALID_SELECTION))?;

    let mut total = Decimal::ZERO;
    let mut seen = HashSet::with_capacity(ids.len());
    let mut chosen_per_event: HashMap<EventId, EventOptionId> = HashMap::new();
    let mut valid: Vec<EventOptionId> = Vec::with_capacity(ids.len());

    for id in &ids {
        if !seen.insert(*id) {
            continue;
        }
        let Some((event, option)) = catalog.active_option(*id) else {
            continue;
        };
        if let Some(previous) = chosen_per_event.insert(event.id, option.id) {
            debug!(event_id = event.id.0, first = previous.0, second = option.id.0, "conflicting options");
            return Err(ApiException::new(
                ErrorCode::Conflict,
                format!("Only one option per event may be selected: {}", event.name),
            ));
        }
        valid.push(*id);
        total = total.checked_add(option.fee).ok_or_else(|| {
            warn!(option_id = option.id.0, "fee total overflowed");
            ApiException::new(ErrorCode::Internal, "Fee total is out of range")
        })?;
    }

    if valid.len() != ids.len() {
        warn!(
            requested = ?ids.iter().map(|id| id.0).collect::<Vec<_>>(),
            valid = ?valid.iter().map(|id| id.0).collect::<Vec<_>>(),
            "total requested with invalid, inactive or repeated event options"
        );
        return Err(ApiException::new(ErrorCode::Validation, INVALID_SELECTION));
    }

    total.rescale(2);
    Ok(total)
}

pub fn events_for_grade(
    catalog: &Catalog,
    raw_grade: Option<&str>,
) -> Result<EventListResponse, ApiException> {
    let raw_grade = non_empty(raw_grade)
        .ok_or_else(|| ApiException::new(ErrorCode::Validation, "grade is required"))?;
    let grade = parse_grade_label(raw_grade)
        .map_err(|err| ApiException::new(ErrorCode::Validation, err.to_string()))?;

    Ok(EventListResponse {
        grade,
        group: grade.group(),
        events: catalog
            .events_for_grade(grade)
            .map(|event| event.summary())
            .collect(),
    })
}

pub fn check_grade(raw_grade: Option<&str>) -> GradeCheckResponse {
    let Some(raw_grade) = non_empty(raw_grade) else {
        return GradeCheckResponse {
            valid: false,
            group: None,
            message: "Please select your grade.".to_string(),
        };
    };

    match parse_grade_label(raw_grade) {
        Ok(grade) => GradeCheckResponse {
            valid: true,
            group: Some(grade.group()),
            message: grade.group().label().to_string(),
        },
        Err(err) => GradeCheckResponse {
            valid: false,
            group: None,
            message: err.to_string(),
        },
    }
}

pub fn availability(
    catalog: &Catalog,
    raw_option: Option<&str>,
) -> Result<AvailabilityResponse, ApiException> {
    let option_id = non_empty(raw_option)
        .and_then(|value| value.parse::<i64>().ok())
        .map(EventOptionId)
        .ok_or_else(|| ApiException::new(ErrorCode::Validation, "option must be a numeric id"))?;

    let (event, option) = catalog
        .option(option_id)
        .ok_or_else(|| ApiException::new(ErrorCode::NotFound, "event option not found"))?;

    let (available, message) = if !event.active {
        (false, "Event is not active".to_string())
    } else if option.is_full() {
        (false, format!("{} is full", event.name))
    } else {
        match option.seats_remaining() {
            Some(seats) => (true, format!("{seats} seats remaining")),
            None => (true, "Available".to_string()),
        }
    };

    Ok(AvailabilityResponse {
        option_id,
        available,
        seats_remaining: option.seats_remaining(),
        message,
    })
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
