//! Canonical report shape.
//!
//! The backend has shipped several layouts over time (flat metrics vs nested
//! sections, `suggestions` vs `recommendations`). `Report::from_value` folds
//! them into one shape so nothing downstream branches on field names.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("No results available")]
    Missing,

    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: Option<String>,
    pub navigation: NavigationMetrics,
    /// 0..=10
    pub complexity_score: f64,
    pub interaction: InteractionStats,
    pub positives: Vec<Finding>,
    pub issues: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
    /// The document as received, for export
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NavigationMetrics {
    pub total_screens: f64,
    pub max_depth: f64,
    pub avg_depth: f64,
    pub hub_screens: f64,
    pub orphan_screens: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionStats {
    pub silent_failures: f64,
    pub visible_feedback_rate_pct: f64,
    pub cta_visibility: Option<String>,
    pub preventable_errors: f64,
    pub dead_elements_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub aspect: String,
    pub description: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Severity {
    High,
    Medium,
    Low,
    Other(String),
}

impl Severity {
    fn parse(label: Option<String>) -> Self {
        match label.as_deref() {
            None | Some("Medium") => Severity::Medium,
            Some("High") => Severity::High,
            Some("Low") => Severity::Low,
            Some(other) => Severity::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "High"),
            Severity::Medium => write!(f, "Medium"),
            Severity::Low => write!(f, "Low"),
            Severity::Other(label) => write!(f, "{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub category: String,
    pub severity: Severity,
    pub description: String,
    pub location: Option<String>,
    pub impact: Option<String>,
    pub effort: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpectedImpact {
    pub task_success_increase_pct: Option<f64>,
    pub time_reduction_pct: Option<f64>,
    pub error_reduction_pct: Option<f64>,
}

impl ExpectedImpact {
    pub fn is_empty(&self) -> bool {
        self.task_success_increase_pct.is_none()
            && self.time_reduction_pct.is_none()
            && self.error_reduction_pct.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub priority: String,
    pub rationale: String,
    pub effort: Option<String>,
    pub expected_impact: ExpectedImpact,
}

impl Report {
    /// Normalize a results document
    pub fn from_value(value: Value) -> Result<Self, ReportError> {
        let root = match value.as_object() {
            Some(root) => root,
            None => return Err(ReportError::Missing),
        };
        if let Some(error) = root.get("error").filter(|e| !e.is_null()) {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(ReportError::Backend(message));
        }

        let mut report = Self {
            summary: text(root, "summary"),
            navigation: navigation(root),
            complexity_score: number(root.get("complexity_score")),
            interaction: interaction(root),
            positives: items(root, "positive").map(finding).collect(),
            issues: items(root, "issues").map(issue).collect(),
            recommendations: recommendation_items(root).map(recommendation).collect(),
            raw: Value::Null,
        };
        report.raw = value;
        Ok(report)
    }

    /// Issue counts by severity: High, Medium, Low first, then other labels
    /// in order of first appearance
    pub fn severity_distribution(&self) -> Vec<(Severity, usize)> {
        let mut counts = vec![
            (Severity::High, 0),
            (Severity::Medium, 0),
            (Severity::Low, 0),
        ];
        for issue in &self.issues {
            match counts.iter_mut().find(|(s, _)| *s == issue.severity) {
                Some((_, count)) => *count += 1,
                None => counts.push((issue.severity.clone(), 1)),
            }
        }
        counts
    }
}

fn section<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    root.get(key).and_then(Value::as_object)
}

/// Numbers and numeric strings; anything else is zero
fn number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn optional_number(value: Option<&Value>) -> Option<f64> {
    Some(number(value)).filter(|n| *n != 0.0)
}

/// First non-zero number among `candidates`
fn first_number(candidates: &[Option<&Value>]) -> f64 {
    candidates
        .iter()
        .map(|v| number(*v))
        .find(|n| *n != 0.0)
        .unwrap_or(0.0)
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(map, key))
}

fn items<'a>(root: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Map<String, Value>> {
    root.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn recommendation_items(root: &Map<String, Value>) -> impl Iterator<Item = &Map<String, Value>> {
    // `suggestions` only stands in when `recommendations` is absent; an
    // empty list still wins
    let key = match root.get("recommendations") {
        Some(Value::Array(_)) => "recommendations",
        _ => "suggestions",
    };
    items(root, key)
}

fn navigation(root: &Map<String, Value>) -> NavigationMetrics {
    let nav = section(root, "navigation_metrics");
    let meta = section(root, "app_metadata");
    let nav_field = |key: &str| nav.and_then(|n| n.get(key));

    NavigationMetrics {
        total_screens: first_number(&[
            meta.and_then(|m| m.get("screens_discovered")),
            nav_field("screens_discovered"),
            root.get("total_screens"),
        ]),
        max_depth: first_number(&[nav_field("max_depth"), root.get("max_depth")]),
        avg_depth: first_number(&[nav_field("avg_depth"), root.get("avg_depth")]),
        hub_screens: first_number(&[nav_field("hub_screen_count"), root.get("hub_screen_count")]),
        orphan_screens: number(nav_field("orphan_screens")),
    }
}

fn interaction(root: &Map<String, Value>) -> InteractionStats {
    let feedback = section(root, "interaction_feedback");
    let hierarchy = section(root, "visual_hierarchy");
    let errors = section(root, "error_handling");
    let coverage = section(root, "exploration_coverage");

    InteractionStats {
        silent_failures: number(feedback.and_then(|f| f.get("silent_failures"))),
        visible_feedback_rate_pct: number(feedback.and_then(|f| f.get("visible_feedback_rate_pct"))),
        cta_visibility: hierarchy.and_then(|h| text(h, "cta_visibility")),
        preventable_errors: number(errors.and_then(|e| e.get("preventable_errors"))),
        dead_elements_pct: number(coverage.and_then(|c| c.get("dead_elements_pct"))),
    }
}

fn finding(item: &Map<String, Value>) -> Finding {
    Finding {
        aspect: text(item, "aspect").unwrap_or_else(|| "Positive Finding".to_string()),
        description: text(item, "description")
            .unwrap_or_else(|| "No description available".to_string()),
        location: text(item, "location"),
    }
}

fn issue(item: &Map<String, Value>) -> Issue {
    Issue {
        category: text(item, "category").unwrap_or_else(|| "Issue".to_string()),
        severity: Severity::parse(text(item, "severity")),
        description: text(item, "description")
            .unwrap_or_else(|| "No description available".to_string()),
        location: text(item, "location"),
        impact: text(item, "impact"),
        effort: text(item, "effort"),
    }
}

fn recommendation(item: &Map<String, Value>) -> Recommendation {
    let impact = section(item, "expected_impact");
    let impact_field = |key: &str| optional_number(impact.and_then(|i| i.get(key)));

    Recommendation {
        title: first_text(item, &["recommendation", "title"])
            .unwrap_or_else(|| "Recommendation".to_string()),
        priority: text(item, "priority").unwrap_or_else(|| "Medium".to_string()),
        rationale: first_text(item, &["rationale", "impact"])
            .unwrap_or_else(|| "No details provided".to_string()),
        effort: text(item, "effort").filter(|e| e != "Unknown"),
        expected_impact: ExpectedImpact {
            task_success_increase_pct: impact_field("task_success_increase_pct"),
            time_reduction_pct: impact_field("time_reduction_pct"),
            error_reduction_pct: impact_field("error_reduction_pct"),
        },
    }
}
