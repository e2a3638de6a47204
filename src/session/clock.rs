use std::time::{Duration, Instant};

/// `HH:MM:SS` elapsed since `start`. Hours grow past 99 without wrapping;
/// `now` earlier than `start` reads as zero.
pub fn elapsed_label(start: Instant, now: Instant) -> String {
    format_elapsed(now.saturating_duration_since(start))
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    format!("{:02}:{:02}:{:02}", hours, minutes % 60, seconds % 60)
}
