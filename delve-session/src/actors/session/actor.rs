//! SessionActor - owns one session's record and serializes its updates.
//!
//! The actor never awaits a collaborator call inside `handle`. Updates that
//! need the clarification gate or the research pipeline spawn the work on
//! the runtime and park the caller's reply port in an in-flight slot; the
//! spawned task posts a continuation message (`DecisionReady` /
//! `ResearchReady`) back to the actor when it settles. Queries and the end
//! signal are therefore processed promptly even while an update is
//! suspended, and updates that arrive during one are queued behind it.
//!
//! The end signal does not abort a collaborator call already issued; the
//! call runs to completion and its result is discarded when the
//! continuation observes the ended record.

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::collections::VecDeque;
use std::sync::Arc;

use delve_types::SessionOutcome;

use crate::actors::session::protocol::{SessionError, SessionMsg, Stage, UpdateReply};
use crate::actors::session::state::SessionRecord;
use crate::config::Config;
use crate::gateway::{AgentGateway, ClarificationDecision, GatewayError};
use crate::pipeline::{PipelineError, ResearchPipeline};

#[derive(Debug, Default)]
pub struct SessionActor;

/// Arguments for spawning a SessionActor.
pub struct SessionArguments {
    pub session_id: String,
    pub gateway: Arc<dyn AgentGateway>,
    pub config: Config,
}

/// Which collaborator the in-flight update is suspended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdatePhase {
    Deciding,
    Researching,
}

/// The single suspended update, if any. `prior` is the record as it stood
/// before the update was accepted; fatal collaborator failures restore it
/// so no partial commit is ever observable.
struct InFlight {
    correlation_id: String,
    phase: UpdatePhase,
    prior: SessionRecord,
    reply: UpdateReply,
}

/// Updates that arrived while another update was suspended.
enum QueuedUpdate {
    Start {
        query: String,
        reply: UpdateReply,
    },
    Answer {
        index: usize,
        text: String,
        reply: UpdateReply,
    },
    AnswerAll {
        texts: Vec<String>,
        reply: UpdateReply,
    },
}

pub struct SessionState {
    record: SessionRecord,
    gateway: Arc<dyn AgentGateway>,
    pipeline: ResearchPipeline,
    in_flight: Option<InFlight>,
    backlog: VecDeque<QueuedUpdate>,
    outcome_waiters: Vec<RpcReplyPort<SessionOutcome>>,
}

#[async_trait]
impl Actor for SessionActor {
    type Msg = SessionMsg;
    type State = SessionState;
    type Arguments = SessionArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            session_id = %args.session_id,
            "SessionActor starting"
        );
        let pipeline =
            ResearchPipeline::new(args.gateway.clone(), args.config.max_concurrent_searches);
        Ok(SessionState {
            record: SessionRecord::new(args.session_id),
            gateway: args.gateway,
            pipeline,
            in_flight: None,
            backlog: VecDeque::new(),
            outcome_waiters: Vec::new(),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SessionMsg::GetStatus { reply } => {
                let _ = reply.send(state.record.snapshot());
            }
            SessionMsg::Start { query, reply } => {
                self.submit_update(&myself, state, QueuedUpdate::Start { query, reply });
            }
            SessionMsg::Answer { index, text, reply } => {
                self.submit_update(&myself, state, QueuedUpdate::Answer { index, text, reply });
            }
            SessionMsg::AnswerAll { texts, reply } => {
                self.submit_update(&myself, state, QueuedUpdate::AnswerAll { texts, reply });
            }
            SessionMsg::End => {
                self.handle_end(state);
            }
            SessionMsg::WaitOutcome { reply } => {
                if state.record.is_terminal() {
                    let _ = reply.send(terminal_outcome(&state.record));
                } else {
                    state.outcome_waiters.push(reply);
                }
            }
            SessionMsg::DecisionReady {
                correlation_id,
                outcome,
            } => {
                self.handle_decision_ready(&myself, state, correlation_id, outcome);
            }
            SessionMsg::ResearchReady {
                correlation_id,
                outcome,
            } => {
                self.handle_research_ready(state, correlation_id, outcome);
                self.pump_backlog(&myself, state);
            }
        }
        Ok(())
    }
}

impl SessionActor {
    /// Enter an update into the single-writer queue: run it now if the
    /// session is idle, otherwise park it behind the suspended update.
    fn submit_update(
        &self,
        myself: &ActorRef<SessionMsg>,
        state: &mut SessionState,
        update: QueuedUpdate,
    ) {
        if state.in_flight.is_some() {
            state.backlog.push_back(update);
        } else {
            self.apply_update(myself, state, update);
        }
    }

    fn apply_update(
        &self,
        myself: &ActorRef<SessionMsg>,
        state: &mut SessionState,
        update: QueuedUpdate,
    ) {
        match update {
            QueuedUpdate::Start { query, reply } => self.handle_start(myself, state, query, reply),
            QueuedUpdate::Answer { index, text, reply } => {
                self.handle_answer(myself, state, index, text, reply)
            }
            QueuedUpdate::AnswerAll { texts, reply } => {
                self.handle_answer_all(myself, state, texts, reply)
            }
        }
    }

    /// Drain queued updates until one suspends or the backlog is empty.
    fn pump_backlog(&self, myself: &ActorRef<SessionMsg>, state: &mut SessionState) {
        while state.in_flight.is_none() {
            let Some(update) = state.backlog.pop_front() else {
                break;
            };
            self.apply_update(myself, state, update);
        }
    }

    fn handle_start(
        &self,
        myself: &ActorRef<SessionMsg>,
        state: &mut SessionState,
        query: String,
        reply: UpdateReply,
    ) {
        if state.record.is_terminal() {
            let _ = reply.send(Err(SessionError::ProtocolViolation(
                "session is terminal".to_string(),
            )));
            return;
        }
        if state.record.initialized || state.record.original_query.is_some() {
            let _ = reply.send(Err(SessionError::SessionAlreadyActive(
                state.record.session_id.clone(),
            )));
            return;
        }

        let correlation_id = ulid::Ulid::new().to_string();
        let prior = state.record.clone();
        state.record.accept_query(query.clone());
        state.in_flight = Some(InFlight {
            correlation_id: correlation_id.clone(),
            phase: UpdatePhase::Deciding,
            prior,
            reply,
        });
        tracing::info!(
            session_id = %state.record.session_id,
            correlation_id = %correlation_id,
            "start accepted; consulting clarification gate"
        );

        let gateway = Arc::clone(&state.gateway);
        let myself = myself.clone();
        tokio::spawn(async move {
            let outcome = gateway.decide_clarification(&query).await;
            let _ = myself.send_message(SessionMsg::DecisionReady {
                correlation_id,
                outcome,
            });
        });
    }

    fn handle_answer(
        &self,
        myself: &ActorRef<SessionMsg>,
        state: &mut SessionState,
        index: usize,
        text: String,
        reply: UpdateReply,
    ) {
        let prior = state.record.clone();
        if let Err(e) = state.record.record_answer(index, text) {
            let _ = reply.send(Err(e));
            return;
        }

        if state.record.all_answered() {
            let enriched = state.record.enriched_query();
            self.begin_pipeline(myself, state, prior, reply, enriched);
        } else {
            let _ = reply.send(Ok(state.record.snapshot()));
        }
    }

    fn handle_answer_all(
        &self,
        myself: &ActorRef<SessionMsg>,
        state: &mut SessionState,
        texts: Vec<String>,
        reply: UpdateReply,
    ) {
        if state.record.is_terminal() {
            let _ = reply.send(Err(SessionError::ProtocolViolation(
                "session is terminal".to_string(),
            )));
            return;
        }
        if state.record.questions.is_empty() {
            let _ = reply.send(Err(SessionError::ProtocolViolation(
                "no clarification questions pending".to_string(),
            )));
            return;
        }
        let start = state.record.next_question_index;
        let expected = state.record.questions.len() - start;
        if texts.len() != expected {
            let _ = reply.send(Err(SessionError::ProtocolViolation(format!(
                "expected {expected} answers, got {}",
                texts.len()
            ))));
            return;
        }

        let prior = state.record.clone();
        for (offset, text) in texts.into_iter().enumerate() {
            if let Err(e) = state.record.record_answer(start + offset, text) {
                state.record = prior;
                let _ = reply.send(Err(e));
                return;
            }
        }

        let enriched = state.record.enriched_query();
        self.begin_pipeline(myself, state, prior, reply, enriched);
    }

    /// Suspend the current update on a research pipeline run.
    fn begin_pipeline(
        &self,
        myself: &ActorRef<SessionMsg>,
        state: &mut SessionState,
        prior: SessionRecord,
        reply: UpdateReply,
        query: String,
    ) {
        let correlation_id = ulid::Ulid::new().to_string();
        tracing::info!(
            session_id = %state.record.session_id,
            correlation_id = %correlation_id,
            "research pipeline dispatched"
        );
        state.in_flight = Some(InFlight {
            correlation_id: correlation_id.clone(),
            phase: UpdatePhase::Researching,
            prior,
            reply,
        });

        let pipeline = state.pipeline.clone();
        let myself = myself.clone();
        tokio::spawn(async move {
            let outcome = pipeline.run(&query).await;
            let _ = myself.send_message(SessionMsg::ResearchReady {
                correlation_id,
                outcome,
            });
        });
    }

    fn handle_end(&self, state: &mut SessionState) {
        let was_terminal = state.record.is_terminal();
        state.record.mark_ended();
        if !was_terminal {
            tracing::info!(
                session_id = %state.record.session_id,
                "session ended by signal"
            );
        }
        self.resolve_terminal_waiters(state);
    }

    fn handle_decision_ready(
        &self,
        myself: &ActorRef<SessionMsg>,
        state: &mut SessionState,
        correlation_id: String,
        outcome: Result<ClarificationDecision, GatewayError>,
    ) {
        let Some(in_flight) = self.take_in_flight(state, &correlation_id, UpdatePhase::Deciding)
        else {
            return;
        };

        if state.record.ended {
            // The end signal interrupted this update; the decision result
            // is discarded and the caller observes the ended session.
            let _ = in_flight.reply.send(Ok(state.record.snapshot()));
            self.pump_backlog(myself, state);
            return;
        }

        match outcome {
            Err(e) => {
                tracing::error!(
                    session_id = %state.record.session_id,
                    correlation_id = %correlation_id,
                    error = %e,
                    "clarification gate failed"
                );
                state.record = in_flight.prior;
                let _ = in_flight.reply.send(Err(SessionError::Collaborator {
                    stage: Stage::Decision,
                    message: e.to_string(),
                }));
                self.pump_backlog(myself, state);
            }
            Ok(ClarificationDecision::NeedsClarification { questions })
                if !questions.is_empty() =>
            {
                tracing::info!(
                    session_id = %state.record.session_id,
                    questions = questions.len(),
                    "clarifications requested"
                );
                match state.record.begin_clarifications(questions) {
                    Ok(()) => {
                        let _ = in_flight.reply.send(Ok(state.record.snapshot()));
                    }
                    Err(e) => {
                        state.record = in_flight.prior;
                        let _ = in_flight.reply.send(Err(e));
                    }
                }
                self.pump_backlog(myself, state);
            }
            Ok(decision) => {
                // Proceed, or the degenerate empty question list: research
                // starts immediately while the caller's start stays suspended.
                let normalized = match decision {
                    ClarificationDecision::Proceed { normalized_query } => normalized_query,
                    ClarificationDecision::NeedsClarification { .. } => None,
                };
                state.record.begin_research(normalized);
                let query = state.record.original_query.clone().unwrap_or_default();
                self.begin_pipeline(myself, state, in_flight.prior, in_flight.reply, query);
            }
        }
    }

    fn handle_research_ready(
        &self,
        state: &mut SessionState,
        correlation_id: String,
        outcome: Result<delve_types::ReportData, PipelineError>,
    ) {
        let Some(in_flight) =
            self.take_in_flight(state, &correlation_id, UpdatePhase::Researching)
        else {
            return;
        };

        if state.record.ended {
            tracing::info!(
                session_id = %state.record.session_id,
                correlation_id = %correlation_id,
                "session ended mid-research; pipeline result discarded"
            );
            let _ = in_flight.reply.send(Ok(state.record.snapshot()));
            return;
        }

        match outcome {
            Ok(report) => match state.record.complete_with(report) {
                Ok(()) => {
                    tracing::info!(
                        session_id = %state.record.session_id,
                        correlation_id = %correlation_id,
                        "research completed"
                    );
                    let _ = in_flight.reply.send(Ok(state.record.snapshot()));
                    self.resolve_terminal_waiters(state);
                }
                Err(e) => {
                    state.record = in_flight.prior;
                    let _ = in_flight.reply.send(Err(e));
                }
            },
            Err(e) => {
                tracing::error!(
                    session_id = %state.record.session_id,
                    correlation_id = %correlation_id,
                    error = %e,
                    "research pipeline failed"
                );
                state.record = in_flight.prior;
                let _ = in_flight.reply.send(Err(e.into()));
            }
        }
    }

    /// Claim the suspended update matching this continuation. Mismatches
    /// leave the slot untouched and drop the message.
    fn take_in_flight(
        &self,
        state: &mut SessionState,
        correlation_id: &str,
        phase: UpdatePhase,
    ) -> Option<InFlight> {
        match state.in_flight.take() {
            Some(in_flight)
                if in_flight.correlation_id == correlation_id && in_flight.phase == phase =>
            {
                Some(in_flight)
            }
            other => {
                tracing::warn!(
                    session_id = %state.record.session_id,
                    correlation_id = %correlation_id,
                    "stale continuation discarded"
                );
                state.in_flight = other;
                None
            }
        }
    }

    /// Release every waiter suspended on "ended OR completed".
    fn resolve_terminal_waiters(&self, state: &mut SessionState) {
        if !state.record.is_terminal() {
            return;
        }
        let outcome = terminal_outcome(&state.record);
        for waiter in state.outcome_waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }
}

fn terminal_outcome(record: &SessionRecord) -> SessionOutcome {
    match (&record.report, record.completed) {
        (Some(report), true) => SessionOutcome::from_report(report),
        _ => SessionOutcome::ended(),
    }
}
