//! Collaborator boundary for the prompt-driven research agents.
//!
//! The session engine never interprets a query itself. Clarification
//! triage, search planning, search execution, report writing, and pdf
//! rendering are each one opaque call against an [`AgentGateway`]
//! implementation supplied by the embedding host.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use delve_types::{ReportData, SearchTask};

/// Decision returned by the clarification gate.
///
/// The session treats this polymorphically: it never second-guesses which
/// variant the gate returned. A gate implementation that fails to extract a
/// decision from its underlying agent call must return a [`GatewayError`],
/// never a silent `Proceed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ClarificationDecision {
    /// Research should start immediately, optionally on a rewritten query.
    Proceed { normalized_query: Option<String> },
    /// The request is underspecified; ask these questions, in order.
    NeedsClarification { questions: Vec<String> },
}

/// Outcome of a pdf render attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfRender {
    pub success: bool,
    pub path: Option<String>,
}

/// Errors surfaced by gateway implementations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("agent request failed: {0}")]
    Request(String),
    #[error("agent response parse failed: {0}")]
    Parse(String),
}

/// The five research capabilities, each an independent fallible call.
///
/// Implementations may issue network requests; none of the methods is
/// retried by the engine, and only `search` failures are absorbed (inside
/// the pipeline fan-out). Everything else propagates to the caller of the
/// mutating operation that triggered it.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// Decide whether `query` needs clarifying questions before research.
    async fn decide_clarification(&self, query: &str)
        -> Result<ClarificationDecision, GatewayError>;

    /// Plan the web searches for a (possibly enriched) query.
    async fn plan_searches(&self, query: &str) -> Result<Vec<SearchTask>, GatewayError>;

    /// Execute one planned search, returning a short textual summary.
    async fn search(&self, task: &SearchTask) -> Result<String, GatewayError>;

    /// Synthesize the final report from the query and search summaries.
    async fn write_report(
        &self,
        query: &str,
        summaries: &[String],
    ) -> Result<ReportData, GatewayError>;

    /// Render a markdown report to pdf. Best effort; the pipeline swallows
    /// failures and unsuccessful renders.
    async fn render_pdf(&self, markdown: &str) -> Result<PdfRender, GatewayError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted gateway double shared by pipeline and session tests.

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Notify;

    pub(crate) fn sample_report(summary: &str) -> ReportData {
        ReportData {
            summary: summary.to_string(),
            markdown_report: format!("# {summary}"),
            follow_ups: vec!["try a faster tempo".to_string()],
            pdf_path: None,
        }
    }

    /// Gateway whose every capability replays a scripted response.
    ///
    /// Scripts live behind mutexes so a running test can re-script a stage
    /// between calls (e.g. fail planning once, then let a retry succeed).
    pub(crate) struct ScriptedGateway {
        pub decision: Mutex<Result<ClarificationDecision, GatewayError>>,
        pub plan: Mutex<Result<Vec<SearchTask>, GatewayError>>,
        pub report: Mutex<Result<ReportData, GatewayError>>,
        pub render: Mutex<Result<PdfRender, GatewayError>>,
        /// Search queries that should fail instead of summarizing.
        pub failing_searches: Mutex<HashSet<String>>,
        /// Artificial per-query search latency, for completion-order tests.
        pub search_delays: Mutex<HashMap<String, Duration>>,
        /// When set, `decide_clarification` blocks until the gate is
        /// released with `notify_one`.
        pub decision_gate: Option<Arc<Notify>>,
        /// Queries seen by `write_report`, in call order.
        pub written_queries: Mutex<Vec<String>>,
        /// Summary batches seen by `write_report`, in call order.
        pub written_summaries: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedGateway {
        /// A gateway that proceeds straight to research and succeeds.
        pub(crate) fn proceeding() -> Self {
            Self {
                decision: Mutex::new(Ok(ClarificationDecision::Proceed {
                    normalized_query: None,
                })),
                plan: Mutex::new(Ok(vec![
                    SearchTask {
                        reason: "find tablature".to_string(),
                        query: "wonderwall intro tab".to_string(),
                    },
                    SearchTask {
                        reason: "find lessons".to_string(),
                        query: "wonderwall beginner lesson".to_string(),
                    },
                ])),
                report: Mutex::new(Ok(sample_report("research complete"))),
                render: Mutex::new(Ok(PdfRender {
                    success: false,
                    path: None,
                })),
                failing_searches: Mutex::new(HashSet::new()),
                search_delays: Mutex::new(HashMap::new()),
                decision_gate: None,
                written_queries: Mutex::new(Vec::new()),
                written_summaries: Mutex::new(Vec::new()),
            }
        }

        /// A gateway that asks the given clarifying questions first.
        pub(crate) fn clarifying(questions: &[&str]) -> Self {
            let gateway = Self::proceeding();
            *gateway.decision.lock().unwrap() = Ok(ClarificationDecision::NeedsClarification {
                questions: questions.iter().map(|q| q.to_string()).collect(),
            });
            gateway
        }

        pub(crate) fn with_decision_gate(mut self, gate: Arc<Notify>) -> Self {
            self.decision_gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl AgentGateway for ScriptedGateway {
        async fn decide_clarification(
            &self,
            _query: &str,
        ) -> Result<ClarificationDecision, GatewayError> {
            if let Some(gate) = &self.decision_gate {
                gate.notified().await;
            }
            self.decision.lock().unwrap().clone()
        }

        async fn plan_searches(&self, _query: &str) -> Result<Vec<SearchTask>, GatewayError> {
            self.plan.lock().unwrap().clone()
        }

        async fn search(&self, task: &SearchTask) -> Result<String, GatewayError> {
            let delay = self.search_delays.lock().unwrap().get(&task.query).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing_searches.lock().unwrap().contains(&task.query) {
                return Err(GatewayError::Request(format!(
                    "search provider unavailable for '{}'",
                    task.query
                )));
            }
            Ok(format!("summary for {}", task.query))
        }

        async fn write_report(
            &self,
            query: &str,
            summaries: &[String],
        ) -> Result<ReportData, GatewayError> {
            self.written_queries.lock().unwrap().push(query.to_string());
            self.written_summaries
                .lock()
                .unwrap()
                .push(summaries.to_vec());
            self.report.lock().unwrap().clone()
        }

        async fn render_pdf(&self, _markdown: &str) -> Result<PdfRender, GatewayError> {
            self.render.lock().unwrap().clone()
        }
    }
}
