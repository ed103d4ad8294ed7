//! # Gridrun Core
//!
//! Core machinery for driving an LLM agent through a turn-based remote grid game.
//!
//! ## Core Concepts
//! - **Frame**: one visual+state snapshot of the remote game
//! - **Unpacker**: splits single-snapshot and animation-bundle API responses
//! - **Game Client**: thin HTTP abstraction over the remote game API
//! - **Session Store**: in-memory TTL map for pending/continuation sessions
//! - **Frame Store**: durable per-session frame log for replay
//! - **Stream Sink**: best-effort one-way event channel to a remote observer
//! - **Provider**: trait-based LLM tool-calling capability (OpenAI, Anthropic)

pub mod client;
pub mod frame;
pub mod persist;
pub mod provider;
pub mod session;
pub mod stream;
pub mod unpack;

pub use client::{ClientConfig, ClientError, GameClient, HttpGameClient};
pub use frame::{pixels_changed, ActionName, Frame, GameAction, GameState};
pub use persist::{FileFrameStore, FrameRecord, FrameStore, MemoryFrameStore};
pub use provider::{
    AnthropicProvider, ChatMessage, CompletionRequest, CompletionResponse, FinishReason,
    LlmProvider, OpenAIProvider, ProviderConfig, ProviderError, ProviderType, Role,
    ToolCall, ToolChoice, ToolDefinition, Usage, UsageTracker,
};
pub use session::SessionStore;
pub use stream::{EventReceiver, RunSummary, StreamEvent, StreamSink};
pub use unpack::unpack_frames;
