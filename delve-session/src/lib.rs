//! Delve session engine - interactive clarify-then-research sessions.
//!
//! This crate implements the session state machine, its supervision tree,
//! the research pipeline fan-out, and the control surface callers use to
//! drive sessions. The prompt-driven research capabilities themselves live
//! behind the [`gateway::AgentGateway`] boundary and are supplied by the
//! embedding host.

pub mod actors;
pub mod config;
pub mod gateway;
pub mod pipeline;
pub mod supervisor;
pub mod surface;
