pub mod client;
pub mod report;
pub mod session;
pub mod stream;
pub mod ui;
pub mod utils;

// Re-export common items
pub use client::{HttpJobClient, JobBackend};
pub use session::{ControllerConfig, SessionController, SessionOutcome};
pub use utils::Config;
