use super::log_sink::LogEntry;
use super::state::SessionState;
use crate::report::Report;

/// The user-facing surface driven by the session controller.
///
/// Every method is a side effect of a controller transition; none of them
/// feed back into the session except `confirm`.
pub trait Dashboard: Send {
    /// New entries at the end of the log; the view follows the newest one
    fn log_appended(&mut self, entries: &[LogEntry]);

    fn log_cleared(&mut self);

    /// Raw values, including out-of-order or negative percentages
    fn progress_updated(&mut self, message: &str, percentage: f64);

    /// Show or hide the cancel affordance
    fn cancel_visibility_changed(&mut self, visible: bool);

    fn state_changed(&mut self, state: SessionState);

    /// Blocking acknowledgement of a failure
    fn alert(&mut self, message: &str);

    /// Yes/no gate
    fn confirm(&mut self, prompt: &str) -> bool;

    fn present_report(&mut self, report: &Report);
}
