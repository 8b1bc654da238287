//! Shared types for the delve research session service.
//!
//! These types cross the control-surface boundary:
//! - the session engine produces them
//! - embedding hosts (CLI harnesses, HTTP frontends) consume them
//!
//! Serializable with serde for JSON transport.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder summary delivered when a session is ended before completion.
pub const ENDED_SUMMARY: &str = "Session ended";
/// Placeholder report body delivered when a session is ended before completion.
pub const ENDED_REPORT: &str = "Session ended by user";

// ============================================================================
// Session Status
// ============================================================================

/// The six mutually exclusive session status labels.
///
/// A label is always derived from the session record, never stored, so the
/// projection cannot drift from the underlying fields. Precedence is the
/// declaration order below: `Ended` wins over everything, `Completed` over
/// the non-terminal labels.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusLabel {
    Ended,
    Completed,
    AwaitingClarifications,
    CollectingAnswers,
    Researching,
    Pending,
}

impl StatusLabel {
    /// Terminal labels permit no further field mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Completed)
    }
}

/// Read-only projection of one session, recomputed on every query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub label: StatusLabel,
    pub original_query: Option<String>,
    pub questions: Vec<String>,
    /// Answered clarifications keyed by question index. Keys never reach
    /// `questions.len()`; iteration order equals arrival order because
    /// answers are accepted strictly in index order.
    pub answers: BTreeMap<usize, String>,
    pub next_question_index: usize,
    /// The question the caller should answer next, if any.
    pub current_question: Option<String>,
    pub completed: bool,
}

// ============================================================================
// Research Output
// ============================================================================

/// Final synthesized research report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportData {
    pub summary: String,
    pub markdown_report: String,
    #[serde(default)]
    pub follow_ups: Vec<String>,
    /// Attached after a successful render; absent when rendering failed or
    /// reported no output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
}

/// One planned web search. Produced by planning, consumed by search
/// execution; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchTask {
    pub reason: String,
    pub query: String,
}

/// Result delivered to the party that initiated a session, once the session
/// reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionOutcome {
    pub summary: String,
    pub markdown_report: String,
    pub follow_ups: Vec<String>,
    pub pdf_path: Option<String>,
}

impl SessionOutcome {
    /// Outcome for a session that completed its research.
    pub fn from_report(report: &ReportData) -> Self {
        Self {
            summary: report.summary.clone(),
            markdown_report: report.markdown_report.clone(),
            follow_ups: report.follow_ups.clone(),
            pdf_path: report.pdf_path.clone(),
        }
    }

    /// Outcome for a session ended by signal before completion.
    pub fn ended() -> Self {
        Self {
            summary: ENDED_SUMMARY.to_string(),
            markdown_report: ENDED_REPORT.to_string(),
            follow_ups: Vec::new(),
            pdf_path: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_label_serialization() {
        let json = serde_json::to_string(&StatusLabel::AwaitingClarifications).unwrap();
        assert_eq!(json, "\"awaiting_clarifications\"");
        assert_eq!(StatusLabel::CollectingAnswers.to_string(), "collecting_answers");
    }

    #[test]
    fn test_terminal_labels() {
        assert!(StatusLabel::Ended.is_terminal());
        assert!(StatusLabel::Completed.is_terminal());
        assert!(!StatusLabel::Researching.is_terminal());
        assert!(!StatusLabel::Pending.is_terminal());
    }

    #[test]
    fn test_snapshot_answers_serialize_with_string_keys() {
        let mut answers = BTreeMap::new();
        answers.insert(0usize, "tabs".to_string());
        let snapshot = StatusSnapshot {
            label: StatusLabel::CollectingAnswers,
            original_query: Some("teach me guitar".to_string()),
            questions: vec!["chords or tabs?".to_string(), "skill level?".to_string()],
            answers,
            next_question_index: 1,
            current_question: Some("skill level?".to_string()),
            completed: false,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["answers"]["0"], "tabs");
        assert_eq!(json["label"], "collecting_answers");

        let back: StatusSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_report_omits_missing_pdf_path() {
        let report = ReportData {
            summary: "short".to_string(),
            markdown_report: "# report".to_string(),
            follow_ups: vec![],
            pdf_path: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("pdf_path"));
    }

    #[test]
    fn test_ended_outcome_placeholders() {
        let outcome = SessionOutcome::ended();
        assert_eq!(outcome.summary, ENDED_SUMMARY);
        assert_eq!(outcome.markdown_report, ENDED_REPORT);
        assert!(outcome.follow_ups.is_empty());
        assert!(outcome.pdf_path.is_none());
    }
}
