//! Session Supervisor - manages SessionActor instances, one per session id.

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::actors::session::{SessionActor, SessionArguments, SessionError, SessionMsg};
use crate::config::Config;
use crate::gateway::AgentGateway;

#[derive(Debug, Default)]
pub struct SessionSupervisor;

pub struct SessionSupervisorState {
    pub sessions: HashMap<String, ActorRef<SessionMsg>>,
    pub gateway: Arc<dyn AgentGateway>,
    pub config: Config,
}

pub struct SessionSupervisorArgs {
    pub gateway: Arc<dyn AgentGateway>,
    pub config: Config,
}

#[derive(Debug)]
pub enum SessionSupervisorMsg {
    /// Resolve the session actor a `start` update will drive. Spawns a
    /// fresh actor for an unknown id, returns the live actor for an open
    /// session (the actor itself rejects a duplicate start), and replaces
    /// the actor when the existing session is terminal.
    OpenSession {
        session_id: String,
        reply: RpcReplyPort<Result<ActorRef<SessionMsg>, SessionError>>,
    },
    /// Look up the live session actor for an id, if one exists.
    GetSession {
        session_id: String,
        reply: RpcReplyPort<Option<ActorRef<SessionMsg>>>,
    },
    RemoveSession {
        session_id: String,
    },
    Supervision(SupervisionEvent),
}

#[ractor::async_trait]
impl Actor for SessionSupervisor {
    type Msg = SessionSupervisorMsg;
    type State = SessionSupervisorState;
    type Arguments = SessionSupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(supervisor = %myself.get_id(), "SessionSupervisor starting");
        Ok(SessionSupervisorState {
            sessions: HashMap::new(),
            gateway: args.gateway,
            config: args.config,
        })
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        event: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let SupervisionEvent::ActorTerminated(actor_cell, _, _)
        | SupervisionEvent::ActorFailed(actor_cell, _) = &event
        {
            let actor_id = actor_cell.get_id();
            state
                .sessions
                .retain(|_, session| session.get_id() != actor_id);
        }
        info!(
            supervisor = %myself.get_id(),
            event = ?event,
            "SessionSupervisor supervision event"
        );
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SessionSupervisorMsg::OpenSession { session_id, reply } => {
                let result = self.open_session(&myself, state, session_id).await;
                let _ = reply.send(result);
            }
            SessionSupervisorMsg::GetSession { session_id, reply } => {
                let _ = reply.send(state.sessions.get(&session_id).cloned());
            }
            SessionSupervisorMsg::RemoveSession { session_id } => {
                state.sessions.remove(&session_id);
            }
            SessionSupervisorMsg::Supervision(event) => {
                self.handle_supervisor_evt(myself, event, state).await?;
            }
        }
        Ok(())
    }
}

impl SessionSupervisor {
    async fn open_session(
        &self,
        myself: &ActorRef<SessionSupervisorMsg>,
        state: &mut SessionSupervisorState,
        session_id: String,
    ) -> Result<ActorRef<SessionMsg>, SessionError> {
        if let Some(existing) = state.sessions.get(&session_id).cloned() {
            match ractor::call!(existing, |reply| SessionMsg::GetStatus { reply }) {
                Ok(snapshot) if !snapshot.label.is_terminal() => {
                    return Ok(existing);
                }
                Ok(_) => {
                    // Terminal session: retire the old actor and start a
                    // replacement under the same id.
                    info!(session_id = %session_id, "replacing terminal session");
                    existing.stop(None);
                    state.sessions.remove(&session_id);
                }
                Err(e) => {
                    error!(session_id = %session_id, error = %e, "session status RPC failed");
                    state.sessions.remove(&session_id);
                }
            }
        }

        let args = SessionArguments {
            session_id: session_id.clone(),
            gateway: state.gateway.clone(),
            config: state.config.clone(),
        };

        match Actor::spawn_linked(None, SessionActor, args, myself.get_cell()).await {
            Ok((actor_ref, _)) => {
                state.sessions.insert(session_id, actor_ref.clone());
                Ok(actor_ref)
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to spawn SessionActor");
                Err(SessionError::ActorUnavailable(e.to_string()))
            }
        }
    }
}
