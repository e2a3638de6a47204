pub mod json;
pub mod render;
pub mod types;

pub use render::render_report;
pub use types::{Report, ReportError, Severity};
