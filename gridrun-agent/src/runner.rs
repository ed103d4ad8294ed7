//! Game run loop
//!
//! One `run` drives an LLM provider through a remote game until the game
//! reaches a terminal state, the model stops calling tools, the turn budget
//! runs out, or the run is cancelled. Every frame the game produces is
//! persisted and published on the session's event stream as it happens.

use crate::continuation::ResumeState;
use crate::tools::{ToolInvocation, ToolRegistry};
use gridrun_core::frame::{pixels_changed, ActionName, Frame, GameAction};
use gridrun_core::persist::FrameStore;
use gridrun_core::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role, UsageTracker,
};
use gridrun_core::stream::{RunSummary, StreamEvent, StreamSink};
use gridrun_core::unpack::unpack_frames;
use gridrun_core::GameClient;
use gridrun_error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Consecutive flat-score turns before the one-shot nudge fires
const NO_PROGRESS_STREAK: u32 = 5;

const DEFAULT_INSTRUCTIONS: &str = "You are playing a turn-based puzzle game on a colored \
grid. Each cell holds a color index. You act by calling the provided tools; every action \
except 'inspect' spends one of a limited action budget. Study how the grid responds to \
your actions, raise the score, and reach the WIN state before the budget runs out.";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for one game run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Remote game identifier (e.g. "ls20")
    pub game_id: String,
    /// Model override; the provider default applies when absent
    pub model: Option<String>,
    /// Provider-call budget for the run
    pub max_turns: u32,
    /// System prompt override
    pub instructions: Option<String>,
    /// Opening user message override
    pub user_message: Option<String>,
    /// Tags recorded on the scoring card
    pub tags: Vec<String>,
    /// Source URL recorded on the scoring card
    pub source_url: String,
    /// Offer the reset tool to the model
    pub include_reset_tool: bool,
    /// Enable verbose logging
    pub verbose: bool,
}

impl RunConfig {
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            model: None,
            max_turns: 40,
            instructions: None,
            user_message: None,
            tags: Vec::new(),
            source_url: String::new(),
            include_reset_tool: false,
            verbose: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }
}

/// Result of one finished run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub usage: UsageTracker,
    /// Provider response id of the last completion, for continuation
    pub last_response_id: Option<String>,
    pub game_guid: String,
    pub card_id: Option<String>,
    pub record_id: String,
    /// Last settled frame, cached as the seed for a later continuation
    pub last_frame: Frame,
}

// ============================================================================
// Runner
// ============================================================================

/// Drives the LLM <-> game tool loop for one session at a time
pub struct GameRunner<P, C> {
    provider: P,
    client: C,
    frames: Arc<dyn FrameStore>,
    sink: StreamSink,
}

struct TurnState {
    settled: Frame,
    game_guid: String,
    next_frame_number: u64,
    frames_this_run: u64,
    steps: u32,
    stalls: u32,
    hint_emitted: bool,
}

impl<P: LlmProvider, C: GameClient> GameRunner<P, C> {
    pub fn new(provider: P, client: C, frames: Arc<dyn FrameStore>, sink: StreamSink) -> Self {
        Self { provider, client, frames, sink }
    }

    pub fn sink(&self) -> &StreamSink {
        &self.sink
    }

    pub fn frames(&self) -> &Arc<dyn FrameStore> {
        &self.frames
    }

    /// Run one game to completion, publishing events under `session_id`.
    ///
    /// A fatal error is published as exactly one terminal `error` event
    /// before it propagates; the successful `completed` event is the
    /// caller's to emit once it has recorded the outcome.
    pub async fn run(
        &self,
        session_id: &str,
        config: &RunConfig,
        resume: ResumeState,
        cancel: &AtomicBool,
    ) -> Result<RunOutcome> {
        match self.run_inner(session_id, config, resume, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.sink.error(session_id, e.kind().as_str(), e.message());
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        session_id: &str,
        config: &RunConfig,
        resume: ResumeState,
        cancel: &AtomicBool,
    ) -> Result<RunOutcome> {
        self.sink.send(session_id, StreamEvent::AgentStarting);

        // A guid with no seed frame is unresolvable: replaying actions to
        // rediscover the state would mutate the remote game. Refuse before
        // touching the network.
        if let Some(guid) = &resume.game_guid {
            if resume.seed_frame.is_none() {
                return Err(Error::missing_seed_frame(guid.clone()));
            }
        }

        let mut card_id = resume.card_id.clone();
        let resuming = resume.game_guid.is_some();

        let seed = match resume.seed_frame {
            Some(frame) => frame,
            None => {
                let card = self
                    .client
                    .open_scoring_card(
                        &config.tags,
                        &config.source_url,
                        serde_json::json!({ "session": session_id }),
                    )
                    .await?;
                if config.verbose {
                    println!("Opened scoring card: {}", card);
                }
                let frame = self.client.start_game(&config.game_id, &card).await?;
                card_id = Some(card);
                frame
            }
        };

        self.sink.send(
            session_id,
            StreamEvent::GameStarted {
                game_id: config.game_id.clone(),
                guid: seed.game_guid.clone(),
            },
        );

        let record_id = match resume.record_id {
            Some(id) => id,
            None => self
                .frames
                .create_session(&config.game_id, &seed.game_guid, seed.win_score)?,
        };

        let mut state = TurnState {
            game_guid: seed.game_guid.clone(),
            next_frame_number: if resuming {
                self.frames.frames(&record_id)?.len() as u64
            } else {
                0
            },
            settled: seed,
            frames_this_run: 0,
            steps: 0,
            stalls: 0,
            hint_emitted: false,
        };

        // a fresh run logs its seed frame as frame 0
        if !resuming {
            self.frames
                .save_frame(&record_id, 0, &state.settled, None, None, 0)?;
            state.next_frame_number = 1;
            state.frames_this_run = 1;
            self.emit_frame_update(session_id, 0, &state.settled, 1, 1);
        }

        let registry = ToolRegistry::game_tools(config.include_reset_tool);
        let definitions = registry.definitions();

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());

        let mut messages = vec![
            ChatMessage::system(
                config.instructions.as_deref().unwrap_or(DEFAULT_INSTRUCTIONS),
            ),
            ChatMessage::user(format!(
                "{}\n\nCurrent game state:\n{}",
                config
                    .user_message
                    .as_deref()
                    .unwrap_or("Play the game. Start by inspecting the grid."),
                describe_frame(&state.settled)
            )),
        ];

        self.sink.send(session_id, StreamEvent::AgentReady { model: model.clone() });

        let mut usage = UsageTracker::new();
        let mut last_response_id = resume.previous_response_id.clone();
        let mut first_call = true;

        for turn in 0..config.max_turns {
            if cancel.load(Ordering::Relaxed) {
                self.sink.send(
                    session_id,
                    StreamEvent::Status { message: "run cancelled".into() },
                );
                break;
            }

            let mut request = CompletionRequest::new(messages.clone())
                .with_model(&model)
                .with_tools(definitions.clone());
            if first_call {
                // only the opening call may resume provider-side state
                request.previous_response_id = resume.previous_response_id.clone();
                first_call = false;
            }

            let response: CompletionResponse =
                self.provider.complete(request).await.map_err(Error::from)?;
            usage.track(&model, &response.usage);
            last_response_id = Some(response.id.clone());

            if config.verbose {
                println!(
                    "Turn {}: {} tool call(s), score {}",
                    turn + 1,
                    response.tool_calls.len(),
                    state.settled.score
                );
            }

            if let Some(text) = &response.content {
                if !text.is_empty() {
                    let event = if response.tool_calls.is_empty() {
                        StreamEvent::Message { text: text.clone() }
                    } else {
                        StreamEvent::Reasoning { text: text.clone() }
                    };
                    self.sink.send(session_id, event);
                }
            }

            if response.tool_calls.is_empty() {
                // the model decided it is done
                break;
            }

            messages.push(ChatMessage {
                role: Role::Assistant,
                content: response.content.clone(),
                tool_calls: Some(response.tool_calls.clone()),
                tool_call_id: None,
            });

            let score_before = state.settled.score;
            let mut terminal = false;

            for call in &response.tool_calls {
                let arguments: serde_json::Value = serde_json::from_str(&call.arguments)
                    .unwrap_or(serde_json::Value::Null);
                self.sink.send(
                    session_id,
                    StreamEvent::ToolCall { name: call.name.clone(), arguments },
                );

                let result_text = match registry.resolve(&call.name, &call.arguments) {
                    Err(e) => {
                        // a bad tool call goes back to the model, not up the stack
                        serde_json::json!({ "error": e.message() }).to_string()
                    }
                    Ok(ToolInvocation::Inspect) => describe_frame(&state.settled),
                    Ok(ToolInvocation::Act(action)) => {
                        self.execute(session_id, config, &record_id, &action, card_id.as_deref(), &mut state)
                            .await?
                    }
                };

                messages.push(ChatMessage::tool_result(&call.id, result_text));
                self.sink.send(
                    session_id,
                    StreamEvent::ToolResult {
                        name: call.name.clone(),
                        score: state.settled.score,
                        state: state.settled.state,
                    },
                );

                if state.settled.state.is_terminal() {
                    terminal = true;
                    break;
                }
            }

            if terminal {
                break;
            }

            // flat-score watchdog: one advisory nudge per streak
            if state.settled.score <= score_before {
                state.stalls += 1;
                if state.stalls >= NO_PROGRESS_STREAK && !state.hint_emitted {
                    let hint = format!(
                        "The score has not improved for {} turns. Step back and try a \
                         different strategy: inspect the grid, look for cells you have \
                         not interacted with, or reconsider what the goal might be.",
                        state.stalls
                    );
                    self.sink.send(
                        session_id,
                        StreamEvent::LoopHint { message: hint.clone(), flat_turns: state.stalls },
                    );
                    messages.push(ChatMessage::user(hint));
                    state.hint_emitted = true;
                }
            } else {
                state.stalls = 0;
                state.hint_emitted = false;
            }
        }

        if state.settled.state.is_terminal() {
            if let Some(card) = &card_id {
                if let Err(e) = self.client.close_scoring_card(card).await {
                    eprintln!("Warning: failed to close scoring card {}: {}", card, e);
                }
            }
        }

        Ok(RunOutcome {
            summary: RunSummary {
                final_state: state.settled.state,
                score: state.settled.score,
                steps_taken: state.steps,
                frame_count: state.frames_this_run,
            },
            usage,
            last_response_id,
            game_guid: state.game_guid,
            card_id,
            record_id,
            last_frame: state.settled,
        })
    }

    /// Dispatch one action, then persist and publish every frame it produced
    async fn execute(
        &self,
        session_id: &str,
        config: &RunConfig,
        record_id: &str,
        action: &GameAction,
        card_id: Option<&str>,
        state: &mut TurnState,
    ) -> Result<String> {
        let response_frame = self
            .client
            .execute_action(&config.game_id, &state.game_guid, action, card_id)
            .await?;

        let unpacked = unpack_frames(&response_frame);
        let total = unpacked.len();
        let mut changed = 0;

        for (i, frame) in unpacked.iter().enumerate() {
            let is_last = i + 1 == total;
            // intermediate animation frames carry no authoritative diff
            let pixels = if is_last {
                pixels_changed(&state.settled.frame, &frame.frame)
            } else {
                0
            };
            if is_last {
                changed = pixels;
            }

            self.frames.save_frame(
                record_id,
                state.next_frame_number,
                frame,
                Some(action),
                None,
                pixels,
            )?;
            self.emit_frame_update(
                session_id,
                state.next_frame_number,
                frame,
                (i + 1) as u32,
                total as u32,
            );
            state.next_frame_number += 1;
            state.frames_this_run += 1;
        }

        // unpack_frames never returns an empty list
        let settled = unpacked.into_iter().next_back().unwrap();
        if action.name == ActionName::Reset && settled.game_guid != state.game_guid {
            // a reset may start a fresh game under the same card
            state.game_guid = settled.game_guid.clone();
        }
        state.settled = settled;
        state.steps += 1;

        let mut description: serde_json::Value =
            serde_json::from_str(&describe_frame(&state.settled))
                .unwrap_or(serde_json::Value::Null);
        description["pixels_changed"] = serde_json::json!(changed);
        Ok(description.to_string())
    }

    fn emit_frame_update(
        &self,
        session_id: &str,
        frame_number: u64,
        frame: &Frame,
        animation_frame: u32,
        animation_total_frames: u32,
    ) {
        self.sink.send(
            session_id,
            StreamEvent::FrameUpdate {
                frame_number,
                score: frame.score,
                state: frame.state,
                is_animation: animation_total_frames > 1,
                animation_frame,
                animation_total_frames,
                is_last_animation_frame: animation_frame == animation_total_frames,
            },
        );
    }
}

/// Render a frame as the JSON the model sees in tool results
fn describe_frame(frame: &Frame) -> String {
    let dimensions = frame
        .grid_dimensions()
        .map(|(layers, rows, cols)| serde_json::json!([layers, rows, cols]))
        .unwrap_or(serde_json::Value::Null);
    let actions: Option<Vec<&str>> = frame
        .available_actions
        .as_ref()
        .map(|set| set.iter().map(|a| a.as_str()).collect());

    serde_json::json!({
        "score": frame.score,
        "state": frame.state.as_str(),
        "action_counter": frame.action_counter,
        "max_actions": frame.max_actions,
        "win_score": frame.win_score,
        "grid_dimensions": dimensions,
        "available_actions": actions,
        "grid": frame.frame,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_config_defaults() {
        let config = RunConfig::new("ls20");
        assert_eq!(config.game_id, "ls20");
        assert_eq!(config.max_turns, 40);
        assert!(!config.include_reset_tool);
        assert!(config.model.is_none());
    }

    #[test]
    fn test_describe_frame_shape() {
        let frame: Frame = serde_json::from_value(json!({
            "gameGuid": "g-1",
            "gameId": "ls20",
            "frame": [[[0, 1], [2, 3]]],
            "score": 2,
            "state": "IN_PROGRESS",
            "actionCounter": 4,
            "maxActions": 80,
            "winScore": 10,
            "availableActions": ["RESET", "ACTION6"]
        }))
        .unwrap();

        let described: serde_json::Value =
            serde_json::from_str(&describe_frame(&frame)).unwrap();
        assert_eq!(described["score"], 2);
        assert_eq!(described["state"], "IN_PROGRESS");
        assert_eq!(described["grid_dimensions"], json!([1, 2, 2]));
        assert_eq!(described["available_actions"], json!(["RESET", "ACTION6"]));
    }
}
