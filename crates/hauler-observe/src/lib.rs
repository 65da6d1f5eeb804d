//! Logging setup shared by the agent and worker processes.
//!
//! Worker processes must log to stderr: their stdout carries the supervisor protocol.
mod logger;
pub use logger::*;
