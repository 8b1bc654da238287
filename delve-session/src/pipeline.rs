//! ResearchPipeline - plan, fan out searches, synthesize, optionally render.
//!
//! Failure model: planning and report synthesis are fatal to the run;
//! individual searches and the pdf render are best effort. A run with zero
//! surviving search summaries is still a valid run.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use delve_types::{ReportData, SearchTask};

use crate::gateway::{AgentGateway, GatewayError, PdfRender};

/// Errors that abort a pipeline run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("search planning failed: {0}")]
    Plan(#[source] GatewayError),
    #[error("report synthesis failed: {0}")]
    Write(#[source] GatewayError),
}

/// Sequences the research stages over an [`AgentGateway`].
#[derive(Clone)]
pub struct ResearchPipeline {
    gateway: Arc<dyn AgentGateway>,
    max_concurrent_searches: usize,
}

impl ResearchPipeline {
    pub fn new(gateway: Arc<dyn AgentGateway>, max_concurrent_searches: usize) -> Self {
        Self {
            gateway,
            max_concurrent_searches: max_concurrent_searches.max(1),
        }
    }

    /// Run the full pipeline for one (possibly enriched) query.
    pub async fn run(&self, query: &str) -> Result<ReportData, PipelineError> {
        let tasks = self
            .gateway
            .plan_searches(query)
            .await
            .map_err(PipelineError::Plan)?;
        tracing::info!(planned = tasks.len(), "search plan ready");

        let summaries = self.execute_searches(tasks).await;

        let mut report = self
            .gateway
            .write_report(query, &summaries)
            .await
            .map_err(PipelineError::Write)?;

        report.pdf_path = self.render_pdf(&report.markdown_report).await;
        Ok(report)
    }

    /// Fan out one search call per task, bounded by the configured
    /// concurrency cap, and aggregate summaries in completion order.
    ///
    /// A failing search contributes nothing; the fan-out itself never
    /// fails, even when every task does.
    pub async fn execute_searches(&self, tasks: Vec<SearchTask>) -> Vec<String> {
        let requested = tasks.len();
        let summaries: Vec<String> = stream::iter(tasks)
            .map(|task| {
                let gateway = Arc::clone(&self.gateway);
                async move {
                    match gateway.search(&task).await {
                        Ok(summary) => Some(summary),
                        Err(e) => {
                            tracing::warn!(query = %task.query, error = %e, "search dropped");
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrent_searches)
            .filter_map(|summary| async move { summary })
            .collect()
            .await;

        tracing::info!(
            requested,
            collected = summaries.len(),
            "search fan-out settled"
        );
        summaries
    }

    /// Best-effort render. Anything other than a successful render with a
    /// path degrades to `None` and never fails the run.
    async fn render_pdf(&self, markdown: &str) -> Option<String> {
        match self.gateway.render_pdf(markdown).await {
            Ok(PdfRender {
                success: true,
                path: Some(path),
            }) => Some(path),
            Ok(_) => {
                tracing::warn!("pdf renderer reported no output");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "pdf render failed");
                None
            }
        }
    }
}
