//! Continuation validation
//!
//! A client may resume a finished-but-not-terminal run by presenting the game
//! guid it wants to continue, optionally with the frame it last saw and the
//! provider response id of the previous conversation. Clients lie, crash, and
//! replay stale state, so everything here is validated against the state the
//! orchestrator cached when the previous run ended; the outcome is always one
//! of: resume with a trusted seed, or fall back to a fresh run with a warning.
//! The runner itself still refuses a guid with no seed frame outright.

use crate::runner::RunConfig;
use gridrun_core::frame::Frame;
use serde::{Deserialize, Serialize};

/// Run state cached when a stream ends, keyed by session id.
///
/// This is what makes a later continuation trustworthy: the frame here is the
/// last settled frame the server actually produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationSession {
    pub config: RunConfig,
    pub game_guid: String,
    pub last_frame: Frame,
    pub previous_response_id: Option<String>,
    pub card_id: Option<String>,
    pub record_id: Option<String>,
}

/// Client-supplied resume parameters, unvalidated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContinuationRequest {
    pub game_guid: Option<String>,
    pub seed_frame: Option<Frame>,
    pub previous_response_id: Option<String>,
    pub user_message: Option<String>,
}

/// Validated resume state consumed by the runner.
///
/// Invariant the validation below maintains: `game_guid.is_some()` implies
/// `seed_frame.is_some()` with settled fields. The runner re-checks and
/// hard-errors on violation rather than probing the remote API.
#[derive(Debug, Clone, Default)]
pub struct ResumeState {
    pub game_guid: Option<String>,
    pub seed_frame: Option<Frame>,
    pub previous_response_id: Option<String>,
    pub card_id: Option<String>,
    pub record_id: Option<String>,
}

impl ResumeState {
    pub fn is_fresh(&self) -> bool {
        self.game_guid.is_none()
    }
}

impl ContinuationRequest {
    /// Reconcile this request with the cached run state.
    ///
    /// Resolution order for the seed frame, given a requested guid:
    /// 1. a client-supplied frame with settled fields, matching the guid
    /// 2. the cached last frame, when the guid matches the cached run
    /// 3. neither: drop the guid and start fresh, with a warning
    pub fn validate(self, cached: Option<&ContinuationSession>) -> ResumeState {
        let Some(guid) = self.game_guid else {
            // no guid: fresh run; a stray seed frame or response id is
            // meaningless without one
            if self.seed_frame.is_some() {
                eprintln!("Warning: ignoring seed frame without a game guid");
            }
            return ResumeState::default();
        };

        let client_seed = self.seed_frame.filter(|f| {
            if f.game_guid != guid {
                eprintln!(
                    "Warning: seed frame guid '{}' does not match requested guid '{}'; ignoring it",
                    f.game_guid, guid
                );
                return false;
            }
            if !f.has_settled_fields() {
                eprintln!("Warning: seed frame is missing settled fields; ignoring it");
                return false;
            }
            true
        });

        let cached = cached.filter(|c| c.game_guid == guid);

        let seed = client_seed.or_else(|| cached.map(|c| c.last_frame.clone()));

        match seed {
            Some(frame) => ResumeState {
                game_guid: Some(guid),
                seed_frame: Some(frame),
                previous_response_id: self
                    .previous_response_id
                    .or_else(|| cached.and_then(|c| c.previous_response_id.clone())),
                card_id: cached.and_then(|c| c.card_id.clone()),
                record_id: cached.and_then(|c| c.record_id.clone()),
            },
            None => {
                eprintln!(
                    "Warning: cannot resume guid '{}' without a seed frame; starting fresh",
                    guid
                );
                ResumeState::default()
            }
        }
    }
}
