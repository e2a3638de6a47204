//! One UX test session, from form submission to report

pub mod clock;
pub mod controller;
pub mod dashboard;
pub mod error;
pub mod log_sink;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{ControllerConfig, SessionController, StopHandle, StopOutcome};
pub use dashboard::Dashboard;
pub use error::{SessionError, ValidationError};
pub use log_sink::{EventLogSink, LogEntry, LogLevel};
pub use state::{LogEvent, ProgressEvent, SessionForm, SessionOutcome, SessionState};
