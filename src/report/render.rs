//! Terminal presentation of a normalized report

use super::types::{Report, Severity};
use colored::Colorize;
use std::fmt::Write;

/// Render every report section as terminal text
pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    summary(&mut out, report);
    metrics(&mut out, report);
    positives(&mut out, report);
    issues(&mut out, report);
    recommendations(&mut out, report);
    out
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{} {}", "■".blue().bold(), title.white().bold());
}

fn summary(out: &mut String, report: &Report) {
    heading(out, "Summary");
    // Markdown is shown as-is; no renderer in a terminal
    let text = report.summary.as_deref().unwrap_or("No summary available.");
    for line in text.lines() {
        let _ = writeln!(out, "  {}", line);
    }
}

fn metrics(out: &mut String, report: &Report) {
    let nav = &report.navigation;
    let stats = &report.interaction;

    heading(out, "Navigation Depth");
    let _ = writeln!(out, "  Total Screens:   {}", nav.total_screens);
    let _ = writeln!(out, "  Max Depth:       {}", nav.max_depth);
    let _ = writeln!(out, "  Avg Depth:       {}", nav.avg_depth);
    let _ = writeln!(out, "  Hub Screens:     {}", nav.hub_screens);
    let _ = writeln!(out, "  Orphan Screens:  {}", nav.orphan_screens);

    let score = report.complexity_score;
    let label = format!("Complexity Score: {}/10", score);
    let label = if score > 7.0 {
        label.red()
    } else if score > 4.0 {
        label.yellow()
    } else {
        label.green()
    };
    let _ = writeln!(out, "  {}  {}", label, gauge(score));

    heading(out, "Interaction");
    let _ = writeln!(out, "  Silent Failures:     {}", stats.silent_failures);
    let _ = writeln!(
        out,
        "  Feedback Rate:       {}%",
        stats.visible_feedback_rate_pct.round()
    );
    let _ = writeln!(
        out,
        "  CTA Clarity:         {}",
        stats.cta_visibility.as_deref().unwrap_or("N/A")
    );
    let _ = writeln!(out, "  Preventable Errors:  {}", stats.preventable_errors);
    let _ = writeln!(out, "  Dead Elements:       {}%", stats.dead_elements_pct.round());
}

/// Ten-cell bar for a 0..=10 score
fn gauge(score: f64) -> String {
    let filled = score.round().clamp(0.0, 10.0) as usize;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(10 - filled))
}

fn positives(out: &mut String, report: &Report) {
    heading(out, "What Works");
    if report.positives.is_empty() {
        let _ = writeln!(out, "  {}", "No positive findings documented.".dimmed());
        return;
    }
    for item in &report.positives {
        let _ = writeln!(out, "  {} {} [{}]", "✓".green(), item.aspect.bold(), "Good".green());
        let _ = writeln!(out, "    {}", item.description);
        if let Some(location) = &item.location {
            let _ = writeln!(out, "    Location: {}", location);
        }
    }
}

fn severity_badge(severity: &Severity) -> colored::ColoredString {
    let label = severity.to_string();
    match severity {
        Severity::High => label.red().bold(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.normal(),
        Severity::Other(_) => label.magenta(),
    }
}

fn issues(out: &mut String, report: &Report) {
    heading(out, "Issues");
    if report.issues.is_empty() {
        let _ = writeln!(out, "  No issues found.");
        return;
    }

    let distribution = report
        .severity_distribution()
        .iter()
        .map(|(severity, count)| format!("{}: {}", severity, count))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "  Severity Distribution: {}", distribution);

    for issue in &report.issues {
        let _ = writeln!(
            out,
            "  {} {} [{}]",
            "✗".red(),
            issue.category.bold(),
            severity_badge(&issue.severity)
        );
        let _ = writeln!(out, "    {}", issue.description);
        if let Some(location) = &issue.location {
            let _ = writeln!(out, "    Location: {}", location);
        }
        if let Some(impact) = &issue.impact {
            let _ = writeln!(out, "    Impact: {}", impact);
        }
        if let Some(effort) = &issue.effort {
            let _ = writeln!(out, "    Effort to Fix: {}", effort);
        }
    }
}

fn recommendations(out: &mut String, report: &Report) {
    heading(out, "Recommendations");
    if report.recommendations.is_empty() {
        let _ = writeln!(out, "  {}", "No recommendations available.".dimmed());
        return;
    }

    for rec in &report.recommendations {
        let _ = writeln!(
            out,
            "  {} {} [{} Priority]",
            "→".blue(),
            rec.title.bold(),
            rec.priority
        );
        let _ = writeln!(out, "    {}", rec.rationale);
        if let Some(effort) = &rec.effort {
            let _ = writeln!(out, "    Effort: {}", effort);
        }
        let impact = &rec.expected_impact;
        if let Some(pct) = impact.task_success_increase_pct {
            let _ = writeln!(out, "    Task Success Impact: +{}%", pct);
        }
        if let Some(pct) = impact.time_reduction_pct {
            let _ = writeln!(out, "    Time Saved: {}%", pct);
        }
        if let Some(pct) = impact.error_reduction_pct {
            let _ = writeln!(out, "    Error Reduction: {}%", pct);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain(report: &Report) -> String {
        colored::control::set_override(false);
        render_report(report)
    }

    #[test]
    fn test_empty_report_placeholders() {
        let out = plain(&Report::from_value(json!({})).unwrap());
        assert!(out.contains("No summary available."));
        assert!(out.contains("No positive findings documented."));
        assert!(out.contains("No issues found."));
        assert!(out.contains("No recommendations available."));
        assert!(out.contains("CTA Clarity:         N/A"));
        assert!(out.contains("Complexity Score: 0/10"));
    }

    #[test]
    fn test_full_report() {
        let report = Report::from_value(json!({
            "summary": "## Overview\nSmooth app",
            "complexity_score": 8,
            "navigation_metrics": {"max_depth": 5},
            "positive": [{"aspect": "Onboarding", "description": "Short", "location": "Welcome"}],
            "issues": [{"category": "Forms", "severity": "High", "description": "No inline errors", "effort": "Low"}],
            "recommendations": [{"recommendation": "Add inline validation", "priority": "High",
                                 "expected_impact": {"task_success_increase_pct": 12}}],
        }))
        .unwrap();

        let out = plain(&report);
        assert!(out.contains("  ## Overview\n  Smooth app"));
        assert!(out.contains("Complexity Score: 8/10  [████████░░]"));
        assert!(out.contains("Max Depth:       5"));
        assert!(out.contains("Location: Welcome"));
        assert!(out.contains("Severity Distribution: High: 1, Medium: 0, Low: 0"));
        assert!(out.contains("Effort to Fix: Low"));
        assert!(out.contains("Add inline validation [High Priority]"));
        assert!(out.contains("Task Success Impact: +12%"));
    }

    #[test]
    fn test_gauge_bounds() {
        assert_eq!(gauge(-3.0), "[░░░░░░░░░░]");
        assert_eq!(gauge(42.0), "[██████████]");
    }
}
