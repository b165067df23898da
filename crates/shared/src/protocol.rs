use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{EventId, EventKind, EventOptionId, Grade, Group};

pub fn group_route() -> &'static str {
    "/get-group/"
}

pub fn total_route() -> &'static str {
    "/calculate-total/"
}

pub fn events_for_grade_route() -> &'static str {
    "/get-events-for-grade/"
}

pub fn validate_grade_route() -> &'static str {
    "/validate-grade/"
}

pub fn availability_route() -> &'static str {
    "/check-event-availability/"
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResponse {
    pub group: Option<Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalResponse {
    pub total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOptionSummary {
    pub option_id: EventOptionId,
    pub name: String,
    pub kind: EventKind,
    pub fee: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_team_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seats_remaining: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_id: EventId,
    pub name: String,
    pub description: String,
    pub options: Vec<EventOptionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventListResponse {
    pub grade: Grade,
    pub group: Group,
    pub events: Vec<EventSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeCheckResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub option_id: EventOptionId,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seats_remaining: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid event id '{0}'")]
pub struct EventIdParseError(pub String);

/// Parses the comma-separated selection the form posts. Accepts `1,2`,
/// `[1, 2]` and quoted variants; an empty string is an empty selection.
pub fn parse_event_ids(raw: &str) -> Result<Vec<EventOptionId>, EventIdParseError> {
    let cleaned = raw.replace(['"', '\''], "");
    let cleaned = cleaned.trim();
    let cleaned = cleaned
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(cleaned);

    cleaned
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .map(EventOptionId)
                .ok_or_else(|| EventIdParseError(part.to_string()))
        })
        .collect()
}

pub fn join_event_ids<'a>(ids: impl IntoIterator<Item = &'a EventOptionId>) -> String {
    ids.into_iter()
        .map(|id| id.0.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
