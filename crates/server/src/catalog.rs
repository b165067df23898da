//! Event catalog served by the resolution endpoints.
//!
//! The catalog is immutable for the lifetime of the process: it is either
//! read from a TOML file named in the settings or taken from the built-in
//! default set.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    domain::{EventId, EventKind, EventOptionId, Grade},
    protocol::{EventOptionSummary, EventSummary},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse event catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate event id {0}")]
    DuplicateEvent(EventId),
    #[error("duplicate event option id {0}")]
    DuplicateOption(EventOptionId),
    #[error("event option {0} has a negative fee")]
    NegativeFee(EventOptionId),
    #[error("team option {0} needs a max_team_size of at least 2")]
    InvalidTeamSize(EventOptionId),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogOption {
    pub id: EventOptionId,
    pub name: String,
    pub kind: EventKind,
    pub fee: Decimal,
    #[serde(default)]
    pub max_team_size: Option<u32>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub registered: u32,
}

impl CatalogOption {
    pub fn seats_remaining(&self) -> Option<u32> {
        self.max_participants
            .map(|max| max.saturating_sub(self.registered))
    }

    pub fn is_full(&self) -> bool {
        self.seats_remaining() == Some(0)
    }

    fn summary(&self) -> EventOptionSummary {
        EventOptionSummary {
            option_id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            fee: self.fee,
            max_team_size: self.max_team_size,
            seats_remaining: self.seats_remaining(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEvent {
    pub id: EventId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub target_grades: Vec<Grade>,
    #[serde(default)]
    pub options: Vec<CatalogOption>,
}

fn default_active() -> bool {
    true
}

impl CatalogEvent {
    pub fn is_open_to(&self, grade: Grade) -> bool {
        self.active && self.target_grades.contains(&grade)
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            event_id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            options: self.options.iter().map(CatalogOption::summary).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    events: Vec<CatalogEvent>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    events: Vec<CatalogEvent>,
    option_index: HashMap<EventOptionId, (usize, usize)>,
}

impl Catalog {
    pub fn new(events: Vec<CatalogEvent>) -> Result<Self, CatalogError> {
        let mut event_ids = HashSet::new();
        let mut option_index = HashMap::new();

        for (event_idx, event) in events.iter().enumerate() {
            if !event_ids.insert(event.id) {
                return Err(CatalogError::DuplicateEvent(event.id));
            }
            for (option_idx, option) in event.options.iter().enumerate() {
                if option.fee.is_sign_negative() && !option.fee.is_zero() {
                    return Err(CatalogError::NegativeFee(option.id));
                }
                if option.kind == EventKind::Team && option.max_team_size.unwrap_or(0) < 2 {
                    return Err(CatalogError::InvalidTeamSize(option.id));
                }
                if option_index
                    .insert(option.id, (event_idx, option_idx))
                    .is_some()
                {
                    return Err(CatalogError::DuplicateOption(option.id));
                }
            }
        }

        Ok(Self {
            events,
            option_index,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(raw)?;
        Self::new(file.events)
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(DEFAULT_CATALOG)
    }

    pub fn events(&self) -> &[CatalogEvent] {
        &self.events
    }

    pub fn option_count(&self) -> usize {
        self.option_index.len()
    }

    pub fn option(&self, id: EventOptionId) -> Option<(&CatalogEvent, &CatalogOption)> {
        let (event_idx, option_idx) = *self.option_index.get(&id)?;
        let event = &self.events[event_idx];
        Some((event, &event.options[option_idx]))
    }

    /// Active option lookup; inactive events behave as unknown.
    pub fn active_option(&self, id: EventOptionId) -> Option<(&CatalogEvent, &CatalogOption)> {
        self.option(id).filter(|(event, _)| event.active)
    }

    pub fn events_for_grade(&self, grade: Grade) -> impl Iterator<Item = &CatalogEvent> {
        self.events
            .iter()
            .filter(move |event| event.is_open_to(grade))
    }
}

const DEFAULT_CATALOG: &str = r#"
[[events]]
id = 1
name = "Tech Quiz Competition"
description = "General technology quiz covering various domains of computer science."
target_grades = [3, 4, 5]

[[events.options]]
id = 1
name = "Individual"
kind = "individual"
fee = "250.00"

[[events]]
id = 2
name = "Web Development Competition"
description = "Create a responsive website using HTML, CSS, and JavaScript."
target_grades = [9, 10, 11, 12]

[[events.options]]
id = 2
name = "Team"
kind = "team"
fee = "800.00"
max_team_size = 3

[[events]]
id = 3
name = "Programming Contest"
description = "Solve algorithmic problems using your preferred programming language."
target_grades = [9, 10, 11, 12]

[[events.options]]
id = 3
name = "Individual"
kind = "individual"
fee = "500.00"

[[events.options]]
id = 4
name = "Team"
kind = "team"
fee = "1000.00"
max_team_size = 3

[[events]]
id = 4
name = "Game Development Challenge"
description = "Create a simple game using any game development framework or engine."
target_grades = [6, 7, 8]

[[events.options]]
id = 5
name = "Team"
kind = "team"
fee = "700.00"
max_team_size = 2
max_participants = 40
"#;

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
