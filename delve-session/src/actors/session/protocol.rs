//! SessionActor message protocol and error types.
//!
//! Control-surface messages (`GetStatus`, `Start`, `Answer`, `AnswerAll`,
//! `End`, `WaitOutcome`) come from callers; the continuation messages
//! (`DecisionReady`, `ResearchReady`) come from tasks the actor spawned for
//! itself, so the mailbox is never blocked on a collaborator call.

use ractor::RpcReplyPort;

use delve_types::{ReportData, SessionOutcome, StatusSnapshot};

use crate::gateway::{ClarificationDecision, GatewayError};
use crate::pipeline::PipelineError;

/// Collaborator stages, used to identify which call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Decision,
    Plan,
    Search,
    Write,
    Render,
}

/// Errors surfaced by session operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// A decision, plan, or write collaborator call failed. The session is
    /// left in its pre-update state; the caller may retry.
    #[error("collaborator failure at {stage}: {message}")]
    Collaborator { stage: Stage, message: String },
    /// Out-of-order answer, or an operation against a terminal session.
    /// Never mutates state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    /// A non-terminal session already exists for this id.
    #[error("session already active: {0}")]
    SessionAlreadyActive(String),
    /// The actor runtime rejected the operation (dead actor, failed spawn).
    #[error("session actor unavailable: {0}")]
    ActorUnavailable(String),
}

impl From<PipelineError> for SessionError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Plan(e) => SessionError::Collaborator {
                stage: Stage::Plan,
                message: e.to_string(),
            },
            PipelineError::Write(e) => SessionError::Collaborator {
                stage: Stage::Write,
                message: e.to_string(),
            },
        }
    }
}

/// Reply type shared by every mutating operation.
pub type UpdateReply = RpcReplyPort<Result<StatusSnapshot, SessionError>>;

/// Messages handled by SessionActor.
#[derive(Debug)]
pub enum SessionMsg {
    /// Query: derive a consistent snapshot. Never suspends.
    GetStatus { reply: RpcReplyPort<StatusSnapshot> },
    /// Update: begin the session for a query.
    Start { query: String, reply: UpdateReply },
    /// Update: answer the clarification question at `index`.
    Answer {
        index: usize,
        text: String,
        reply: UpdateReply,
    },
    /// Update: answer every remaining clarification question at once.
    AnswerAll { texts: Vec<String>, reply: UpdateReply },
    /// Signal: end the session. Fire-and-forget, always accepted.
    End,
    /// Suspend until the session is terminal, then receive its outcome.
    WaitOutcome {
        reply: RpcReplyPort<SessionOutcome>,
    },
    /// Continuation: the clarification gate settled.
    DecisionReady {
        correlation_id: String,
        outcome: Result<ClarificationDecision, GatewayError>,
    },
    /// Continuation: the research pipeline settled.
    ResearchReady {
        correlation_id: String,
        outcome: Result<ReportData, PipelineError>,
    },
}
