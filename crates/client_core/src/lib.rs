//! Client side of the registration form: resolves a grade to its group and a
//! set of event options to their fee total against the resolution service,
//! and projects the resulting form state onto DOM patches.

pub mod config;
pub mod controller;
pub mod error;
pub mod render;
pub mod request;
pub mod state;
pub mod timer;
pub mod transport;
pub mod validation;

pub use config::ControllerConfig;
pub use controller::{ControllerEvent, RegistrationController, Resolution, SubmissionPayload};
pub use error::{FetchError, FetchErrorKind, ValidationError};
pub use render::{render, DomPatch, ElementPatch};
pub use state::{FormState, GroupDisplay, TotalDisplay};
pub use transport::{
    Endpoint, HttpResolutionService, LifecycleObserver, ResolutionService, TracingObserver,
};
