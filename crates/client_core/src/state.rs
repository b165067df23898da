use std::collections::BTreeMap;

use rust_decimal::Decimal;
use shared::{
    domain::{EventId, EventOptionId, Grade, Group},
    protocol::EventSummary,
};

use crate::{
    error::{FetchErrorKind, ValidationError},
    request::RequestSlot,
    transport::Endpoint,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupDisplay {
    Placeholder,
    Success(Group),
    Error(FetchErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalDisplay {
    Amount(Decimal),
    Error(FetchErrorKind),
}

impl TotalDisplay {
    pub fn zero() -> Self {
        TotalDisplay::Amount(Decimal::new(0, 2))
    }

    pub fn amount(&self) -> Option<Decimal> {
        match self {
            TotalDisplay::Amount(amount) => Some(*amount),
            TotalDisplay::Error(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventListDisplay {
    Empty,
    Loaded(Vec<EventSummary>),
    Error(FetchErrorKind),
}

impl EventListDisplay {
    /// Looks the option up in the loaded list; options the list does not know
    /// still toggle, just without radio grouping.
    pub fn choice_for(&self, option_id: EventOptionId) -> EventChoice {
        if let EventListDisplay::Loaded(events) = self {
            for event in events {
                if event.options.iter().any(|o| o.option_id == option_id) {
                    return EventChoice {
                        option_id,
                        event_id: Some(event.event_id),
                    };
                }
            }
        }
        EventChoice {
            option_id,
            event_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventChoice {
    pub option_id: EventOptionId,
    pub event_id: Option<EventId>,
}

/// The options currently ticked on the form. Options of the same event are
/// mutually exclusive, like the radio group they are rendered as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSelection {
    options: BTreeMap<EventOptionId, EventChoice>,
}

impl EventSelection {
    /// Returns the options displaced by a radio switch within one event.
    pub fn toggle(&mut self, choice: EventChoice, checked: bool) -> Vec<EventOptionId> {
        if !checked {
            self.options.remove(&choice.option_id);
            return Vec::new();
        }

        let displaced: Vec<EventOptionId> = match choice.event_id {
            Some(event_id) => self
                .options
                .values()
                .filter(|c| c.event_id == Some(event_id) && c.option_id != choice.option_id)
                .map(|c| c.option_id)
                .collect(),
            None => Vec::new(),
        };
        for id in &displaced {
            self.options.remove(id);
        }
        self.options.insert(choice.option_id, choice);
        displaced
    }

    pub fn clear(&mut self) {
        self.options.clear();
    }

    pub fn contains(&self, option_id: EventOptionId) -> bool {
        self.options.contains_key(&option_id)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn ids(&self) -> Vec<EventOptionId> {
        self.options.keys().copied().collect()
    }

    pub fn choices(&self) -> impl Iterator<Item = &EventChoice> {
        self.options.values()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub reason: ValidationError,
    pub field: &'static str,
    pub message: String,
}

impl From<ValidationError> for Notification {
    fn from(reason: ValidationError) -> Self {
        Self {
            reason,
            field: reason.field(),
            message: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub grade: Option<Grade>,
    pub group_display: GroupDisplay,
    pub group_request: RequestSlot,
    pub event_list: EventListDisplay,
    pub events_request: RequestSlot,
    pub selection: EventSelection,
    pub total_display: TotalDisplay,
    pub total_request: RequestSlot,
    pub notification: Option<Notification>,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            grade: None,
            group_display: GroupDisplay::Placeholder,
            group_request: RequestSlot::new(Endpoint::Group),
            event_list: EventListDisplay::Empty,
            events_request: RequestSlot::new(Endpoint::EventsForGrade),
            selection: EventSelection::default(),
            total_display: TotalDisplay::zero(),
            total_request: RequestSlot::new(Endpoint::Total),
            notification: None,
        }
    }
}

impl FormState {
    /// Resets everything that depends on the grade. Pending group, event and
    /// total requests lose their tickets.
    pub fn reset_for_grade(&mut self, grade: Option<Grade>) {
        self.grade = grade;
        self.group_display = GroupDisplay::Placeholder;
        self.group_request.invalidate();
        self.event_list = EventListDisplay::Empty;
        self.events_request.invalidate();
        self.selection.clear();
        self.total_display = TotalDisplay::zero();
        self.total_request.invalidate();
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
