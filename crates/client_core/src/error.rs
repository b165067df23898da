use std::time::Duration;

use thiserror::Error;

use crate::render::ids;

/// Coarse failure class used for rendering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    Network,
    Timeout,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("server responded {status}: {message}")]
    Server { status: u16, message: String },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Network(_) => FetchErrorKind::Network,
            FetchError::Timeout(_) => FetchErrorKind::Timeout,
            FetchError::Server { .. } => FetchErrorKind::Server,
        }
    }

    /// A 2xx response whose body could not be decoded counts as `server-5xx`;
    /// [`FetchError::status`] still carries the original code.
    pub fn category(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Timeout(_) => "timeout",
            FetchError::Server { status, .. } => match status {
                400..=499 => "server-4xx",
                _ => "server-5xx",
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else if let Some(status) = err.status() {
            FetchError::Server {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            FetchError::Server {
                status: 200,
                message: format!("invalid response body: {err}"),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Client-side precondition failures that block form submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ValidationError {
    #[error("Please select your grade.")]
    MissingGrade,
    #[error("Please select at least one event.")]
    NoEventsSelected,
}

impl ValidationError {
    /// DOM id of the field the notice is anchored to.
    pub fn field(self) -> &'static str {
        match self {
            ValidationError::MissingGrade => ids::GRADE,
            ValidationError::NoEventsSelected => ids::EVENT_LIST,
        }
    }
}
