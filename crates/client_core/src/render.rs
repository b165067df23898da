//! Pure projection of [`FormState`] onto the form's DOM contract.

use shared::{
    domain::{format_taka, EventOptionId},
    protocol::EventSummary,
};

use crate::{
    error::FetchErrorKind,
    state::{EventListDisplay, FormState, GroupDisplay, TotalDisplay},
};

pub mod ids {
    pub const GRADE: &str = "id_grade";
    pub const GROUP_DISPLAY: &str = "group-display";
    pub const GROUP_LOADING: &str = "group-loading";
    pub const EVENT_LIST: &str = "event-list";
    pub const TOTAL_AMOUNT: &str = "total-amount";
    pub const TOTAL_LOADING: &str = "total-loading";
    pub const NOTIFICATION: &str = "form-notification";
}

pub const EVENT_OPTION_CLASS: &str = "event-option-radio";

const PLACEHOLDER_CLASSES: &[&str] = &["text-gray-500"];
const GROUP_SUCCESS_CLASSES: &[&str] = &["font-semibold", "text-blue-600"];
const ERROR_CLASSES: &[&str] = &["text-red-500"];
const TOTAL_ZERO_CLASSES: &[&str] = &["text-2xl", "font-bold", "text-gray-500"];
const TOTAL_CLASSES: &[&str] = &["text-2xl", "font-bold", "text-green-600"];
const SELECTED_CLASS: &str = "selected";
const INVALID_FIELD_CLASS: &str = "field-invalid";

pub const SELECT_GRADE_TEXT: &str = "Select grade";
pub const SELECT_GRADE_FOR_EVENTS_TEXT: &str = "Select a grade to see available events";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPatch {
    pub selector: String,
    pub text: Option<String>,
    pub classes: Vec<&'static str>,
    pub visible: bool,
    pub attributes: Vec<(&'static str, String)>,
}

impl ElementPatch {
    fn id(id: &str) -> Self {
        Self {
            selector: format!("#{id}"),
            text: None,
            classes: Vec::new(),
            visible: true,
            attributes: Vec::new(),
        }
    }

    fn option(option_id: EventOptionId) -> Self {
        Self {
            selector: option_selector(option_id),
            text: None,
            classes: vec![EVENT_OPTION_CLASS],
            visible: true,
            attributes: vec![("data-option", option_id.0.to_string())],
        }
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    fn classes(mut self, classes: &[&'static str]) -> Self {
        self.classes.extend_from_slice(classes);
        self
    }

    fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    fn attribute(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attributes.push((name, value.into()));
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| *c == class)
    }

    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

pub fn option_selector(option_id: EventOptionId) -> String {
    format!(".{EVENT_OPTION_CLASS}[data-option=\"{}\"]", option_id.0)
}

pub fn id_selector(id: &str) -> String {
    format!("#{id}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomPatch {
    pub elements: Vec<ElementPatch>,
}

impl DomPatch {
    pub fn get(&self, selector: &str) -> Option<&ElementPatch> {
        self.elements.iter().find(|e| e.selector == selector)
    }

    pub fn by_id(&self, id: &str) -> Option<&ElementPatch> {
        self.get(&id_selector(id))
    }

    pub fn option(&self, option_id: EventOptionId) -> Option<&ElementPatch> {
        self.get(&option_selector(option_id))
    }
}

pub fn error_text(kind: FetchErrorKind) -> &'static str {
    match kind {
        FetchErrorKind::Network => "Network error. Check your connection and try again.",
        FetchErrorKind::Timeout => "The server took too long to respond.",
        FetchErrorKind::Server => "Server error. Please try again.",
    }
}

fn error_marker(kind: FetchErrorKind) -> &'static str {
    match kind {
        FetchErrorKind::Network => "error-network",
        FetchErrorKind::Timeout => "error-timeout",
        FetchErrorKind::Server => "error-server",
    }
}

pub fn render(state: &FormState) -> DomPatch {
    let mut elements = Vec::new();

    let anchored = state.notification.as_ref().map(|n| n.field);
    let mut grade = ElementPatch::id(ids::GRADE);
    if let Some(grade_value) = state.grade {
        grade = grade.attribute("value", grade_value.value().to_string());
    }
    if anchored == Some(ids::GRADE) {
        grade = grade.classes(&[INVALID_FIELD_CLASS]);
    }
    elements.push(grade);

    elements.push(render_group(state));
    elements.push(ElementPatch::id(ids::GROUP_LOADING).visible(state.group_request.is_pending()));

    let mut event_list = render_event_list(&state.event_list, state.events_request.is_pending());
    if anchored == Some(ids::EVENT_LIST) {
        event_list = event_list.classes(&[INVALID_FIELD_CLASS]);
    }
    elements.push(event_list);
    elements.extend(render_options(state));

    elements.push(render_total(&state.total_display));
    elements.push(ElementPatch::id(ids::TOTAL_LOADING).visible(state.total_request.is_pending()));

    elements.push(match &state.notification {
        Some(notification) => ElementPatch::id(ids::NOTIFICATION)
            .text(notification.message.clone())
            .classes(&["notification", "notification-error"])
            .attribute("data-anchor", notification.field),
        None => ElementPatch::id(ids::NOTIFICATION).visible(false),
    });

    DomPatch { elements }
}

fn render_group(state: &FormState) -> ElementPatch {
    let patch = ElementPatch::id(ids::GROUP_DISPLAY);
    match state.group_display {
        GroupDisplay::Placeholder => patch.text(SELECT_GRADE_TEXT).classes(PLACEHOLDER_CLASSES),
        GroupDisplay::Success(group) => patch.text(group.label()).classes(GROUP_SUCCESS_CLASSES),
        GroupDisplay::Error(kind) => patch
            .text(error_text(kind))
            .classes(ERROR_CLASSES)
            .classes(&[error_marker(kind)]),
    }
}

fn render_event_list(list: &EventListDisplay, loading: bool) -> ElementPatch {
    let patch = ElementPatch::id(ids::EVENT_LIST).attribute("aria-busy", loading.to_string());
    match list {
        EventListDisplay::Empty => patch
            .text(SELECT_GRADE_FOR_EVENTS_TEXT)
            .classes(PLACEHOLDER_CLASSES),
        EventListDisplay::Loaded(events) if events.is_empty() => patch
            .text("No events are open for this grade")
            .classes(PLACEHOLDER_CLASSES),
        EventListDisplay::Loaded(_) => patch,
        EventListDisplay::Error(kind) => patch
            .text(error_text(*kind))
            .classes(ERROR_CLASSES)
            .classes(&[error_marker(*kind)]),
    }
}

fn option_label(event: &EventSummary, option_name: &str, fee: rust_decimal::Decimal) -> String {
    format!("{} ({}) {}", event.name, option_name, format_taka(fee))
}

fn render_options(state: &FormState) -> Vec<ElementPatch> {
    let mut patches = Vec::new();
    let mut listed = Vec::new();

    if let EventListDisplay::Loaded(events) = &state.event_list {
        for event in events {
            for option in &event.options {
                listed.push(option.option_id);
                let mut patch = ElementPatch::option(option.option_id)
                    .text(option_label(event, &option.name, option.fee))
                    .attribute("name", format!("event-{}", event.event_id.0));
                if state.selection.contains(option.option_id) {
                    patch = patch.classes(&[SELECTED_CLASS]).attribute("checked", "true");
                }
                patches.push(patch);
            }
        }
    }

    for choice in state.selection.choices() {
        if !listed.contains(&choice.option_id) {
            patches.push(
                ElementPatch::option(choice.option_id)
                    .classes(&[SELECTED_CLASS])
                    .attribute("checked", "true"),
            );
        }
    }

    patches
}

fn render_total(total: &TotalDisplay) -> ElementPatch {
    let patch = ElementPatch::id(ids::TOTAL_AMOUNT);
    match total {
        TotalDisplay::Amount(amount) if amount.is_zero() => {
            patch.text(format_taka(*amount)).classes(TOTAL_ZERO_CLASSES)
        }
        TotalDisplay::Amount(amount) => patch.text(format_taka(*amount)).classes(TOTAL_CLASSES),
        TotalDisplay::Error(kind) => patch
            .text(error_text(*kind))
            .classes(ERROR_CLASSES)
            .classes(&[error_marker(*kind)]),
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
