//! SessionActor - the clarify-then-research session state machine.
//!
//! One actor owns one session's record. External callers drive it through
//! three kinds of operation:
//! - queries (`GetStatus`) - read-only, never suspend
//! - updates (`Start`, `Answer`, `AnswerAll`) - serialized single-writer,
//!   may suspend on a collaborator call
//! - signals (`End`) - fire-and-forget, bypass the update queue
//!
//! ## State Machine
//!
//! ```text
//! Pending → AwaitingClarifications → CollectingAnswers → Researching → Completed
//!    |                                                       ^
//!    +---------------------- (no clarifications) ------------+
//!
//! any non-terminal state → Ended on the end signal
//! ```
//!
//! The status label is derived from the record on every query, never stored.

pub mod actor;
pub mod protocol;
pub mod state;

#[cfg(test)]
mod tests;

pub use actor::{SessionActor, SessionArguments, SessionState};
pub use protocol::{SessionError, SessionMsg, Stage, UpdateReply};
pub use state::{SessionRecord, DEFAULT_ANSWER};
