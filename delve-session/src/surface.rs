//! ControlSurface - the operations callers use to drive sessions.
//!
//! Three contracts, matching the message kinds underneath:
//! - `status` is a query: read-only, idempotent, never suspends.
//! - `start`, `answer`, and `answer_all` are updates: the caller awaits the
//!   result, updates on one session are applied one at a time, and the call
//!   may suspend internally while the session waits on a collaborator.
//! - `end` is a signal: fire-and-forget, accepted in any state.
//!
//! `outcome` suspends until the session is terminal and returns the final
//! result, mirroring what the initiating party ultimately receives.

use std::sync::Arc;

use ractor::{Actor, ActorRef};
use tokio::task::JoinHandle;

use delve_types::{SessionOutcome, StatusSnapshot};

use crate::actors::session::{SessionError, SessionMsg};
use crate::config::Config;
use crate::gateway::AgentGateway;
use crate::supervisor::{SessionSupervisor, SessionSupervisorArgs, SessionSupervisorMsg};

/// Handle to a running session supervision tree.
#[derive(Clone)]
pub struct ControlSurface {
    supervisor: ActorRef<SessionSupervisorMsg>,
}

impl ControlSurface {
    /// Spawn the supervision tree over the given gateway. The returned
    /// join handle resolves when the supervisor stops.
    pub async fn spawn(
        gateway: Arc<dyn AgentGateway>,
        config: Config,
    ) -> Result<(Self, JoinHandle<()>), SessionError> {
        let (supervisor, handle) = Actor::spawn(
            None,
            SessionSupervisor,
            SessionSupervisorArgs { gateway, config },
        )
        .await
        .map_err(|e| SessionError::ActorUnavailable(e.to_string()))?;
        Ok((Self { supervisor }, handle))
    }

    /// Query the session's current status.
    pub async fn status(&self, session_id: &str) -> Result<StatusSnapshot, SessionError> {
        let session = self.lookup(session_id).await?;
        ractor::call!(session, |reply| SessionMsg::GetStatus { reply })
            .map_err(|e| SessionError::ActorUnavailable(e.to_string()))
    }

    /// Start a session for `query`. Rejects with `SessionAlreadyActive`
    /// when a non-terminal session exists for this id; a terminal session
    /// is replaced.
    pub async fn start(
        &self,
        session_id: &str,
        query: &str,
    ) -> Result<StatusSnapshot, SessionError> {
        let session = ractor::call!(self.supervisor, |reply| {
            SessionSupervisorMsg::OpenSession {
                session_id: session_id.to_string(),
                reply,
            }
        })
        .map_err(|e| SessionError::ActorUnavailable(e.to_string()))??;

        let query = query.to_string();
        ractor::call!(session, |reply| SessionMsg::Start { query, reply })
            .map_err(|e| SessionError::ActorUnavailable(e.to_string()))?
    }

    /// Answer the clarification question at `index`.
    pub async fn answer(
        &self,
        session_id: &str,
        index: usize,
        text: &str,
    ) -> Result<StatusSnapshot, SessionError> {
        let session = self.lookup(session_id).await?;
        let text = text.to_string();
        ractor::call!(session, |reply| SessionMsg::Answer { index, text, reply })
            .map_err(|e| SessionError::ActorUnavailable(e.to_string()))?
    }

    /// Answer every remaining clarification question in one update.
    pub async fn answer_all(
        &self,
        session_id: &str,
        texts: Vec<String>,
    ) -> Result<StatusSnapshot, SessionError> {
        let session = self.lookup(session_id).await?;
        ractor::call!(session, |reply| SessionMsg::AnswerAll { texts, reply })
            .map_err(|e| SessionError::ActorUnavailable(e.to_string()))?
    }

    /// Signal the session to end. Always accepted; unknown ids are a no-op.
    pub async fn end(&self, session_id: &str) -> Result<(), SessionError> {
        match self.find(session_id).await? {
            Some(session) => ractor::cast!(session, SessionMsg::End)
                .map_err(|e| SessionError::ActorUnavailable(e.to_string())),
            None => Ok(()),
        }
    }

    /// Suspend until the session is terminal and return its outcome.
    pub async fn outcome(&self, session_id: &str) -> Result<SessionOutcome, SessionError> {
        let session = self.lookup(session_id).await?;
        ractor::call!(session, |reply| SessionMsg::WaitOutcome { reply })
            .map_err(|e| SessionError::ActorUnavailable(e.to_string()))
    }

    async fn find(&self, session_id: &str) -> Result<Option<ActorRef<SessionMsg>>, SessionError> {
        ractor::call!(self.supervisor, |reply| SessionSupervisorMsg::GetSession {
            session_id: session_id.to_string(),
            reply,
        })
        .map_err(|e| SessionError::ActorUnavailable(e.to_string()))
    }

    async fn lookup(&self, session_id: &str) -> Result<ActorRef<SessionMsg>, SessionError> {
        self.find(session_id)
            .await?
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }
}
