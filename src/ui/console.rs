use crate::report::{render_report, Report};
use crate::session::{Dashboard, LogEntry, LogLevel, SessionState};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

/// Terminal dashboard: a progress bar with the event log printed above it
pub struct ConsoleDashboard {
    bar: ProgressBar,
    interactive: bool,
    assume_yes: bool,
}

impl ConsoleDashboard {
    pub fn new(assume_yes: bool) -> Self {
        let interactive = io::stdout().is_terminal();
        let bar = if interactive {
            ProgressBar::new(100)
        } else {
            // Piped output gets plain progress lines instead of escape codes
            ProgressBar::hidden()
        };
        Self::with_bar(bar, interactive, assume_yes)
    }

    fn with_bar(bar: ProgressBar, interactive: bool, assume_yes: bool) -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        bar.set_style(style);
        Self {
            bar,
            interactive,
            assume_yes,
        }
    }

    /// Print above the bar without tearing it
    fn line(&self, text: String) {
        self.bar.suspend(|| println!("{}", text));
    }
}

fn format_entry(entry: &LogEntry) -> String {
    let time = format!("[{}]", entry.timestamp).dimmed();
    match entry.level {
        LogLevel::Info => format!("{} {} {}", time, "ℹ".cyan(), entry.message),
        LogLevel::Success => format!("{} {} {}", time, "✓".green(), entry.message.green()),
        LogLevel::Warning => format!("{} {} {}", time, "⚠".yellow(), entry.message.yellow()),
        LogLevel::Error => format!("{} {} {}", time, "✗".red(), entry.message.red()),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl Dashboard for ConsoleDashboard {
    fn log_appended(&mut self, entries: &[LogEntry]) {
        for entry in entries {
            self.line(format_entry(entry));
        }
    }

    // Terminal output is append-only
    fn log_cleared(&mut self) {}

    fn progress_updated(&mut self, message: &str, percentage: f64) {
        self.bar.set_position(percentage.clamp(0.0, 100.0) as u64);
        self.bar.set_message(message.to_string());
        if !self.interactive {
            println!("[{:>3}%] {}", percentage.round(), message);
        }
    }

    fn cancel_visibility_changed(&mut self, visible: bool) {
        if visible && self.interactive {
            self.line(format!("  {}", "Press Ctrl+C to stop the agent".dimmed()));
        }
    }

    fn state_changed(&mut self, state: SessionState) {
        match state {
            SessionState::Starting => {
                self.bar.reset();
                self.bar.set_message("Starting...");
                self.bar.enable_steady_tick(Duration::from_millis(120));
            }
            SessionState::Completing => self.bar.set_message("Loading results..."),
            SessionState::Complete => self.bar.finish_with_message("Complete"),
            SessionState::Error | SessionState::Stopped => self.bar.abandon(),
            SessionState::Idle | SessionState::Running => {}
        }
    }

    fn alert(&mut self, message: &str) {
        self.bar
            .suspend(|| eprintln!("{} {}", "✗".red().bold(), message.red()));
    }

    fn confirm(&mut self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        self.bar.suspend(|| {
            print!("{} {} [y/N] ", "?".yellow().bold(), prompt);
            let _ = io::stdout().flush();
            let mut answer = String::new();
            match io::stdin().lock().read_line(&mut answer) {
                Ok(0) | Err(_) => false,
                Ok(_) => is_yes(&answer),
            }
        })
    }

    fn present_report(&mut self, report: &Report) {
        let text = render_report(report);
        self.bar.suspend(|| {
            println!("\n{} {}", "■".blue().bold(), "UX Analysis Report".white().bold());
            print!("{}", text);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_assume_yes_skips_prompt() {
        let mut dashboard = ConsoleDashboard::with_bar(ProgressBar::hidden(), false, true);
        assert!(dashboard.confirm("Stop?"));
    }

    #[test]
    fn test_entry_format() {
        colored::control::set_override(false);
        let entry = LogEntry {
            timestamp: "00:01:05".to_string(),
            level: LogLevel::Warning,
            message: "Slow screen".to_string(),
        };
        assert_eq!(format_entry(&entry), "[00:01:05] ⚠ Slow screen");
    }
}
