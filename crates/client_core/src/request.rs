use crate::{error::FetchError, transport::Endpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub endpoint: Endpoint,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    NetworkError,
    Timeout,
    ServerError,
}

impl From<&FetchError> for RequestOutcome {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::Network(_) => RequestOutcome::NetworkError,
            FetchError::Timeout(_) => RequestOutcome::Timeout,
            FetchError::Server { .. } => RequestOutcome::ServerError,
        }
    }
}

impl<T> From<&Result<T, FetchError>> for RequestOutcome {
    fn from(result: &Result<T, FetchError>) -> Self {
        match result {
            Ok(_) => RequestOutcome::Success,
            Err(err) => err.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Idle,
    Pending(RequestTicket),
    Settled(RequestOutcome),
}

/// Lifecycle of the single outstanding request allowed per endpoint.
///
/// Every `begin` issues a fresh ticket and passes through `Idle`, so any
/// ticket handed out earlier can no longer settle the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSlot {
    endpoint: Endpoint,
    generation: u64,
    phase: RequestPhase,
}

impl RequestSlot {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            generation: 0,
            phase: RequestPhase::Idle,
        }
    }

    pub fn begin(&mut self) -> RequestTicket {
        self.invalidate();
        let ticket = RequestTicket {
            endpoint: self.endpoint,
            generation: self.generation,
        };
        self.phase = RequestPhase::Pending(ticket);
        ticket
    }

    /// Drops whatever is pending and returns to `Idle`.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.phase = RequestPhase::Idle;
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.phase == RequestPhase::Pending(ticket)
    }

    /// Returns false, leaving the slot untouched, for a superseded ticket.
    pub fn settle(&mut self, ticket: RequestTicket, outcome: RequestOutcome) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.phase = RequestPhase::Settled(outcome);
        true
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, RequestPhase::Pending(_))
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }
}

#[cfg(test)]
#[path = "tests/request_tests.rs"]
mod tests;
