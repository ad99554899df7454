//! Bamboo Agent Worker
//!
//! This library contains the logic for the Bamboo voice-assistant worker:
//! settings, the LiveKit room layer, the agent definition and its tools,
//! the per-job session runtime, and the dispatch router. The `agent`
//! binary is a thin wrapper around this library.

pub mod agent;
pub mod audio;
pub mod config;
pub mod room;
pub mod router;
pub mod session;
pub mod state;
