use super::state::SessionState;
use crate::client::ClientError;
use crate::report::ReportError;
use thiserror::Error;

/// Rejected start form. Nothing has happened when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter an application name")]
    MissingAppName,

    #[error("Please select a category")]
    MissingCategory,

    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    #[error("Max depth {value} is outside {min}..={max}")]
    MaxDepthOutOfRange { value: u32, min: u32, max: u32 },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("a session is already {0}")]
    Busy(SessionState),

    #[error(transparent)]
    Transport(#[from] ClientError),

    #[error(transparent)]
    Report(#[from] ReportError),
}
