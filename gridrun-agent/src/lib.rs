//! # Gridrun Agent
//!
//! Orchestrates an LLM provider through a remote grid game: it prepares
//! sessions, drives the tool-calling turn loop, persists every frame, and
//! publishes progress on a per-session event stream.
//!
//! ## Layers
//! - `tools`: the fixed game tool vocabulary exposed to the model
//! - `runner`: one run of the turn loop against a live game
//! - `continuation`: validation of resume requests against cached run state
//! - `orchestrator`: session lifecycle (prepare / stream / continue / cancel)

pub mod continuation;
pub mod orchestrator;
pub mod runner;
pub mod tools;

pub use continuation::{ContinuationRequest, ContinuationSession, ResumeState};
pub use orchestrator::{Orchestrator, PendingSession};
pub use runner::{GameRunner, RunConfig, RunOutcome};
pub use tools::{GameTool, ToolBinding, ToolInvocation, ToolRegistry};
