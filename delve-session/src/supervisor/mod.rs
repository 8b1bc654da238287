//! Supervision tree for session actors.
//!
//! SessionSupervisor (one_for_one)
//! └── SessionActor (one per session id)

pub mod session;

pub use session::{
    SessionSupervisor, SessionSupervisorArgs, SessionSupervisorMsg, SessionSupervisorState,
};
