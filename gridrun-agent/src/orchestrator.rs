//! Session orchestration
//!
//! The two-step protocol consumers speak: first prepare a session (fresh run
//! or continuation), then attach to its event stream and drive it. Prepared
//! sessions live in a TTL store and are consumed exactly once; finished runs
//! leave behind a continuation record under the same session id so a later
//! request can pick up where the run ended.

use crate::continuation::{ContinuationRequest, ContinuationSession, ResumeState};
use crate::runner::{GameRunner, RunConfig};
use gridrun_core::persist::FrameStore;
use gridrun_core::provider::LlmProvider;
use gridrun_core::session::SessionStore;
use gridrun_core::stream::{EventReceiver, RunSummary, StreamEvent, StreamSink};
use gridrun_core::GameClient;
use gridrun_error::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Default lifetime of a prepared-but-unstarted session
pub const DEFAULT_SESSION_TTL_MS: i64 = 10 * 60 * 1000;

/// A prepared run waiting for its stream to start
#[derive(Clone)]
pub struct PendingSession {
    pub config: RunConfig,
    pub resume: ResumeState,
}

/// Session lifecycle around the run loop
pub struct Orchestrator<P, C> {
    runner: GameRunner<P, C>,
    sink: StreamSink,
    pending: SessionStore<PendingSession>,
    continuations: SessionStore<ContinuationSession>,
    cancel_flags: Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>,
    session_ttl_ms: i64,
}

impl<P: LlmProvider, C: GameClient> Orchestrator<P, C> {
    pub fn new(provider: P, client: C, frames: Arc<dyn FrameStore>) -> Self {
        let sink = StreamSink::new();
        Self {
            runner: GameRunner::new(provider, client, frames, sink.clone()),
            sink,
            pending: SessionStore::new(),
            continuations: SessionStore::new(),
            cancel_flags: Arc::new(Mutex::new(HashMap::new())),
            session_ttl_ms: DEFAULT_SESSION_TTL_MS,
        }
    }

    pub fn with_session_ttl(mut self, ttl_ms: i64) -> Self {
        self.session_ttl_ms = ttl_ms;
        self
    }

    /// Stage a fresh run and return its session id
    pub fn prepare_run(&self, config: RunConfig) -> String {
        self.pending.save(
            None,
            PendingSession { config, resume: ResumeState::default() },
            self.session_ttl_ms,
        )
    }

    /// Stage a continuation of an earlier run under the same session id.
    ///
    /// The cached run state is consumed even when validation downgrades the
    /// request to a fresh run; a continuation attempt is single-use either way.
    pub fn prepare_continuation(
        &self,
        session_id: &str,
        request: ContinuationRequest,
    ) -> Result<String> {
        let cached = self
            .continuations
            .take(session_id)
            .ok_or_else(|| Error::session_not_found(session_id))?;

        let mut config = cached.config.clone();
        if let Some(message) = request.user_message.clone() {
            config.user_message = Some(message);
        }
        let resume = request.validate(Some(&cached));

        Ok(self.pending.save(
            Some(session_id.to_string()),
            PendingSession { config, resume },
            self.session_ttl_ms,
        ))
    }

    /// Stage a resume that carries its own seed state instead of relying on
    /// a cached continuation record (e.g. a client restarting after a crash).
    ///
    /// The request is validated without a cache, so it must bring a settled
    /// seed frame matching its guid or it is downgraded to a fresh run.
    pub fn prepare_resume(&self, config: RunConfig, request: ContinuationRequest) -> String {
        let mut config = config;
        if let Some(message) = request.user_message.clone() {
            config.user_message = Some(message);
        }
        let resume = request.validate(None);
        self.pending.save(
            None,
            PendingSession { config, resume },
            self.session_ttl_ms,
        )
    }

    /// Attach an event receiver to a prepared session.
    ///
    /// The first event on the stream is always `stream.init`. Attaching again
    /// replaces the previous receiver.
    pub fn attach(&self, session_id: &str) -> Result<EventReceiver> {
        if !self.pending.has(session_id) {
            return Err(Error::session_not_found(session_id));
        }
        let receiver = self.sink.register(session_id);
        self.sink.send(
            session_id,
            StreamEvent::Init { session_id: session_id.to_string() },
        );
        Ok(receiver)
    }

    /// Drive a prepared session to completion.
    ///
    /// Consumes the pending entry (a session runs at most once), publishes
    /// every event under `session_id`, and on success caches the continuation
    /// state and emits the terminal `completed` event. A run that wound down
    /// after an explicit cancel caches nothing: cancel deletes the session.
    pub async fn run_session(&self, session_id: &str) -> Result<RunSummary> {
        let Some(pending) = self.pending.take(session_id) else {
            let err = Error::session_not_found(session_id);
            self.sink.error(session_id, err.kind().as_str(), err.message());
            return Err(err);
        };

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_flags
            .lock()
            .unwrap()
            .insert(session_id.to_string(), Arc::clone(&cancel));

        let result = self
            .runner
            .run(session_id, &pending.config, pending.resume, &cancel)
            .await;

        self.cancel_flags.lock().unwrap().remove(session_id);

        match result {
            Ok(outcome) => {
                if cancel.load(Ordering::Relaxed) {
                    // an explicit cancel deletes the session outright; the
                    // run that just wound down must not resurrect it as a
                    // continuation record
                    self.continuations.clear(session_id);
                    return Ok(outcome.summary);
                }
                self.continuations.save(
                    Some(session_id.to_string()),
                    ContinuationSession {
                        config: pending.config,
                        game_guid: outcome.game_guid.clone(),
                        last_frame: outcome.last_frame.clone(),
                        previous_response_id: outcome.last_response_id.clone(),
                        card_id: outcome.card_id.clone(),
                        record_id: Some(outcome.record_id.clone()),
                    },
                    self.session_ttl_ms,
                );
                self.sink.close(session_id, outcome.summary.clone());
                Ok(outcome.summary)
            }
            Err(e) => {
                // the runner already published the terminal error event
                self.continuations.clear(session_id);
                Err(e)
            }
        }
    }

    /// Request cancellation of a running session.
    ///
    /// The run stops at its next turn boundary; the prepared entry and any
    /// attached stream are dropped immediately. Returns whether anything
    /// was actually cancelled.
    pub fn cancel(&self, session_id: &str) -> bool {
        let mut hit = false;
        if let Some(flag) = self.cancel_flags.lock().unwrap().get(session_id) {
            flag.store(true, Ordering::Relaxed);
            hit = true;
        }
        if self.pending.has(session_id) {
            self.pending.clear(session_id);
            hit = true;
        }
        self.sink.teardown(session_id);
        hit
    }

    /// Whether a continuation record exists for this session
    pub fn can_continue(&self, session_id: &str) -> bool {
        self.continuations.has(session_id)
    }

    pub fn frame_store(&self) -> &Arc<dyn FrameStore> {
        self.runner.frames()
    }
}
