//! Streaming event protocol
//!
//! Every observable step of an agent run is published as a typed event on a
//! per-session channel. The run never blocks on (or fails because of) a slow
//! or absent consumer: publishing into a disconnected channel is a no-op, so
//! a client that drops its stream simply stops observing a run that keeps
//! going.

use crate::frame::GameState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ============================================================================
// Events
// ============================================================================

/// Final accounting of one finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub final_state: GameState,
    pub score: i64,
    pub steps_taken: u32,
    pub frame_count: u64,
}

/// One observable step of an agent run.
///
/// Serialized with an `event` discriminant and a `data` payload so consumers
/// can dispatch on the event name without knowing every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum StreamEvent {
    /// First event on every stream; carries the session id being observed
    #[serde(rename = "stream.init")]
    Init { session_id: String },

    /// Free-form progress text
    #[serde(rename = "stream.status")]
    Status { message: String },

    /// Agent setup has begun
    #[serde(rename = "agent.starting")]
    AgentStarting,

    /// Agent setup finished; the tool loop is about to run
    #[serde(rename = "agent.ready")]
    AgentReady { model: String },

    /// The model requested a tool invocation
    #[serde(rename = "agent.tool_call")]
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },

    /// Outcome of one tool invocation, as reported back to the model
    #[serde(rename = "agent.tool_result")]
    ToolResult {
        name: String,
        score: i64,
        state: GameState,
    },

    /// Model reasoning text surfaced mid-turn
    #[serde(rename = "agent.reasoning")]
    Reasoning { text: String },

    /// A plain assistant message (no tool call)
    #[serde(rename = "agent.message")]
    Message { text: String },

    /// A game was started (or reset) and produced its seed frame
    #[serde(rename = "game.started")]
    GameStarted { game_id: String, guid: String },

    /// One discrete frame became available, either a settled snapshot or one
    /// step of an unpacked animation
    #[serde(rename = "game.frame_update")]
    FrameUpdate {
        frame_number: u64,
        score: i64,
        state: GameState,
        is_animation: bool,
        animation_frame: u32,
        animation_total_frames: u32,
        is_last_animation_frame: bool,
    },

    /// Advisory nudge emitted when the score has been flat for several turns
    #[serde(rename = "agent.loop_hint")]
    LoopHint { message: String, flat_turns: u32 },

    /// Terminal success event; always the last event on a completed stream
    #[serde(rename = "agent.completed")]
    Completed { summary: RunSummary },

    /// Terminal failure event; always the last event on a failed stream
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl StreamEvent {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Error { .. })
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Per-session event fan-out.
///
/// One sender per session id; registering a new receiver for a session
/// replaces (and thereby disconnects) the previous one. Cheap to clone -
/// clones share the same channel table.
#[derive(Clone)]
pub struct StreamSink {
    channels: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<StreamEvent>>>>,
}

impl StreamSink {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Attach a receiver to a session, replacing any previous one
    pub fn register(&self, session_id: &str) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = self.channels.lock().unwrap();
        channels.insert(session_id.to_string(), tx);
        EventReceiver { rx }
    }

    /// Publish one event; returns whether a live receiver took it.
    ///
    /// Missing or disconnected sessions make this a no-op so the producing
    /// run is never coupled to consumer liveness.
    pub fn send(&self, session_id: &str, event: StreamEvent) -> bool {
        let mut channels = self.channels.lock().unwrap();
        match channels.get(session_id) {
            Some(tx) => {
                if tx.send(event).is_err() {
                    channels.remove(session_id);
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Publish a terminal error event and drop the channel
    pub fn error(&self, session_id: &str, code: &str, message: &str) {
        self.send(
            session_id,
            StreamEvent::Error {
                code: code.to_string(),
                message: message.to_string(),
            },
        );
        self.teardown(session_id);
    }

    /// Publish the terminal completion event and drop the channel
    pub fn close(&self, session_id: &str, summary: RunSummary) {
        self.send(session_id, StreamEvent::Completed { summary });
        self.teardown(session_id);
    }

    /// Drop a session's channel without emitting anything
    pub fn teardown(&self, session_id: &str) {
        self.channels.lock().unwrap().remove(session_id);
    }

    /// Whether a channel is registered for this session
    pub fn has(&self, session_id: &str) -> bool {
        self.channels.lock().unwrap().contains_key(session_id)
    }
}

impl Default for StreamSink {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Receiver
// ============================================================================

/// Consuming end of one session's event channel
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl EventReceiver {
    /// Next event, or `None` once the producer side is gone
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Adapt to a `futures_core::Stream` that ends after a terminal event
    pub fn into_stream(mut self) -> impl futures_core::Stream<Item = StreamEvent> {
        async_stream::stream! {
            while let Some(event) = self.rx.recv().await {
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary() -> RunSummary {
        RunSummary {
            final_state: GameState::Win,
            score: 5,
            steps_taken: 12,
            frame_count: 14,
        }
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let sink = StreamSink::new();
        let mut rx = sink.register("s1");

        assert!(sink.send("s1", StreamEvent::AgentStarting));
        assert_eq!(rx.recv().await, Some(StreamEvent::AgentStarting));
    }

    #[tokio::test]
    async fn test_send_without_receiver_is_noop() {
        let sink = StreamSink::new();
        assert!(!sink.send("nobody", StreamEvent::AgentStarting));
    }

    #[tokio::test]
    async fn test_send_after_disconnect_is_noop() {
        let sink = StreamSink::new();
        let rx = sink.register("s1");
        drop(rx);

        assert!(!sink.send("s1", StreamEvent::AgentStarting));
        assert!(!sink.has("s1"));
    }

    #[tokio::test]
    async fn test_register_replaces_previous_receiver() {
        let sink = StreamSink::new();
        let mut old_rx = sink.register("s1");
        let mut new_rx = sink.register("s1");

        assert!(sink.send("s1", StreamEvent::AgentStarting));
        assert_eq!(new_rx.recv().await, Some(StreamEvent::AgentStarting));
        assert_eq!(old_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_emits_completed_then_tears_down() {
        let sink = StreamSink::new();
        let mut rx = sink.register("s1");

        sink.close("s1", summary());
        assert!(!sink.has("s1"));

        let event = rx.recv().await.unwrap();
        match event {
            StreamEvent::Completed { summary } => {
                assert_eq!(summary.score, 5);
                assert_eq!(summary.final_state, GameState::Win);
            }
            other => panic!("expected completed, got {:?}", other),
        }
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_error_emits_then_tears_down() {
        let sink = StreamSink::new();
        let mut rx = sink.register("s1");

        sink.error("s1", "provider_failed", "model unavailable");
        assert!(!sink.has("s1"));

        let event = rx.recv().await.unwrap();
        assert!(event.is_terminal());
        match event {
            StreamEvent::Error { code, .. } => assert_eq!(code, "provider_failed"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_into_stream_ends_at_terminal_event() {
        use futures_util::StreamExt;

        let sink = StreamSink::new();
        let rx = sink.register("s1");

        sink.send("s1", StreamEvent::AgentStarting);
        sink.close("s1", summary());

        let events: Vec<_> = rx.into_stream().collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
    }

    #[test]
    fn test_event_wire_format() {
        let event = StreamEvent::FrameUpdate {
            frame_number: 3,
            score: 2,
            state: GameState::InProgress,
            is_animation: true,
            animation_frame: 1,
            animation_total_frames: 2,
            is_last_animation_frame: false,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "game.frame_update");
        assert_eq!(value["data"]["frame_number"], 3);
        assert_eq!(value["data"]["is_last_animation_frame"], false);

        let back: StreamEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_completed_wire_format() {
        let event = StreamEvent::Completed { summary: summary() };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "agent.completed");
        assert_eq!(value["data"]["summary"]["final_state"], "WIN");
        assert_eq!(value["data"]["summary"]["frame_count"], 14);
    }

    #[test]
    fn test_tool_call_wire_format() {
        let event = StreamEvent::ToolCall {
            name: "action6".to_string(),
            arguments: json!({"x": 3, "y": 3}),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "agent.tool_call");
        assert_eq!(value["data"]["arguments"]["x"], 3);
    }
}
