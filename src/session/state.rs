use crate::report::Report;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Completing,
    Complete,
    Error,
    Stopped,
}

impl SessionState {
    /// States from which `start_test` may begin a new session
    pub fn can_start(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Complete)
    }

    /// States in which the controller still expects input from the backend
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::Running | SessionState::Completing
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Completing => "completing",
            SessionState::Complete => "complete",
            SessionState::Error => "error",
            SessionState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// The start form. `reset_test` puts it back to its defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionForm {
    pub app_name: String,
    pub category: String,
    pub max_depth: u32,
}

impl SessionForm {
    pub fn with_default_depth(max_depth: u32) -> Self {
        Self {
            app_name: String::new(),
            category: String::new(),
            max_depth,
        }
    }
}

/// `{message, percentage}` from the progress stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(default)]
    pub message: String,
    pub percentage: f64,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>, percentage: f64) -> Self {
        Self {
            message: message.into(),
            percentage,
        }
    }

    pub fn terminal(&self) -> Option<Terminal> {
        if self.percentage >= 100.0 {
            Some(Terminal::Success)
        } else if self.percentage < 0.0 {
            Some(Terminal::Failure)
        } else {
            None
        }
    }
}

/// Which terminal condition a progress event signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Success,
    Failure,
}

/// `{message, type?}` from the log stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// How a session ended
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Completed(Report),
    Failed(String),
    Stopped,
}
