//! Session record and status derivation.
//!
//! The record is owned exclusively by its [`SessionActor`]; every external
//! observation goes through [`SessionRecord::snapshot`]. The status label is
//! recomputed from the fields on every query so the projection cannot drift
//! from the stored state.
//!
//! [`SessionActor`]: super::actor::SessionActor

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use delve_types::{ReportData, StatusLabel, StatusSnapshot};

use super::protocol::SessionError;

/// Default recorded for a clarification answered with empty text.
pub const DEFAULT_ANSWER: &str = "No preference";

/// Durable state for one clarify-then-research session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub original_query: Option<String>,
    /// Set at most once, when the clarification gate asks questions.
    pub questions: Vec<String>,
    /// Keyed by question index; never holds a key >= `questions.len()`.
    pub answers: BTreeMap<usize, String>,
    pub next_question_index: usize,
    pub report: Option<ReportData>,
    pub initialized: bool,
    pub completed: bool,
    pub ended: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            original_query: None,
            questions: Vec::new(),
            answers: BTreeMap::new(),
            next_question_index: 0,
            report: None,
            initialized: false,
            completed: false,
            ended: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derive the status label. Precedence: Ended, Completed, then the
    /// clarification states, then Researching, then Pending.
    pub fn status_label(&self) -> StatusLabel {
        if self.ended {
            StatusLabel::Ended
        } else if self.completed {
            StatusLabel::Completed
        } else if !self.questions.is_empty() && self.answers.is_empty() {
            StatusLabel::AwaitingClarifications
        } else if !self.questions.is_empty() && self.answers.len() < self.questions.len() {
            StatusLabel::CollectingAnswers
        } else if self.original_query.is_some() && !self.completed {
            StatusLabel::Researching
        } else {
            StatusLabel::Pending
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status_label().is_terminal()
    }

    /// Build the read-only projection handed to queries.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            label: self.status_label(),
            original_query: self.original_query.clone(),
            questions: self.questions.clone(),
            answers: self.answers.clone(),
            next_question_index: self.next_question_index,
            current_question: self.current_question(),
            completed: self.completed,
        }
    }

    /// The question at the answer pointer, if any remain.
    pub fn current_question(&self) -> Option<String> {
        self.questions.get(self.next_question_index).cloned()
    }

    /// Accept the clarification gate's questions. Rejected once the session
    /// has a question list or is terminal: `questions` is write-once.
    pub fn begin_clarifications(&mut self, questions: Vec<String>) -> Result<(), SessionError> {
        if self.is_terminal() {
            return Err(SessionError::ProtocolViolation(
                "session is terminal".to_string(),
            ));
        }
        if !self.questions.is_empty() {
            return Err(SessionError::ProtocolViolation(
                "clarification questions are already set".to_string(),
            ));
        }
        self.questions = questions;
        self.initialized = true;
        self.touch();
        Ok(())
    }

    /// Record the query a freshly accepted `start` is working on. Makes the
    /// session visible as `Researching` while the clarification gate runs.
    pub fn accept_query(&mut self, query: String) {
        self.original_query = Some(query);
        self.touch();
    }

    /// Mark the session as researching, optionally on a rewritten query.
    pub fn begin_research(&mut self, query: Option<String>) {
        if let Some(query) = query {
            self.original_query = Some(query);
        }
        self.initialized = true;
        self.touch();
    }

    /// Record one answer at the pointer. Out-of-order or post-terminal
    /// answers are protocol violations and leave the record untouched.
    pub fn record_answer(&mut self, index: usize, text: String) -> Result<(), SessionError> {
        if self.is_terminal() {
            return Err(SessionError::ProtocolViolation(
                "session is terminal".to_string(),
            ));
        }
        if self.questions.is_empty() {
            return Err(SessionError::ProtocolViolation(
                "no clarification questions pending".to_string(),
            ));
        }
        if self.next_question_index >= self.questions.len() {
            return Err(SessionError::ProtocolViolation(
                "all questions are already answered".to_string(),
            ));
        }
        if index != self.next_question_index {
            return Err(SessionError::ProtocolViolation(format!(
                "answer out of order: got index {index}, expected {}",
                self.next_question_index
            )));
        }

        let text = if text.trim().is_empty() {
            DEFAULT_ANSWER.to_string()
        } else {
            text
        };
        self.answers.insert(index, text);
        self.next_question_index = self.answers.len();
        self.touch();
        Ok(())
    }

    /// True once every question has an answer.
    pub fn all_answered(&self) -> bool {
        !self.questions.is_empty() && self.answers.len() >= self.questions.len()
    }

    /// Combine the original query with every question/answer pair, in order.
    pub fn enriched_query(&self) -> String {
        let original = self.original_query.as_deref().unwrap_or_default();
        let mut enriched = format!("Original query: {original}\n\nAdditional context:\n");
        for (i, question) in self.questions.iter().enumerate() {
            let answer = self
                .answers
                .get(&i)
                .map(String::as_str)
                .unwrap_or(DEFAULT_ANSWER);
            enriched.push_str(&format!("- {question}: {answer}\n"));
        }
        enriched
    }

    /// Store the finished report and mark the session completed.
    pub fn complete_with(&mut self, report: ReportData) -> Result<(), SessionError> {
        if self.is_terminal() {
            return Err(SessionError::ProtocolViolation(
                "session is terminal".to_string(),
            ));
        }
        self.report = Some(report);
        self.completed = true;
        self.touch();
        Ok(())
    }

    /// Apply the end signal. Idempotent; a no-op on an already-terminal
    /// session, so `Completed` is never relabeled.
    pub fn mark_ended(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.ended = true;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
