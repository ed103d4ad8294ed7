//! Frame unpacking - single snapshot vs. animation bundle
//!
//! The remote API returns one of two shapes in the same `frame` field, with
//! no flag to tell them apart:
//!
//! ```text
//! single:    layers -> rows -> cols            (3-D, cells are scalars)
//! animation: frames -> layers -> rows -> cols  (4-D, one more nesting level)
//! ```
//!
//! The only reliable disambiguation is a dimensionality probe: walk one path
//! into the nested arrays (`outer[0][0][0]`) and check whether the innermost
//! value is itself an array. Downstream persistence and agent perception need
//! every rendered step of an animation, but only the final step carries the
//! true game state; earlier steps are synthetic intermediates.

use crate::frame::{Frame, GameState};

/// Split one API response into an ordered list of discrete frames.
///
/// - Empty/absent frame data or a 3-D single snapshot: returns the input
///   unchanged as a one-element list (callers must never loop over zero
///   frames).
/// - A 4-D animation bundle of N snapshots: returns N frames sharing the
///   original's identifiers and limits; the last one inherits the true
///   `state`/`score`/`action_counter`, every earlier one is marked
///   `IN_PROGRESS` with `score = 0` and no action counter, because the API
///   exposes no authoritative intermediate score and fabricating one is
///   worse than omitting it.
/// - Any structural anomaly during the probe: warn and fall back to a single
///   unchanged frame. Losing one animation's fidelity is preferable to
///   aborting the run.
pub fn unpack_frames(frame: &Frame) -> Vec<Frame> {
    let outer = match frame.frame.as_array() {
        Some(arr) if !arr.is_empty() => arr,
        _ => return vec![frame.clone()],
    };

    let innermost = outer
        .first()
        .and_then(|v| v.as_array())
        .and_then(|v| v.first())
        .and_then(|v| v.as_array())
        .and_then(|v| v.first());

    match innermost {
        // scalar colour index at depth 3: a plain 3-D snapshot
        Some(value) if !value.is_array() => vec![frame.clone()],
        // array at depth 3: 4-D animation bundle, one entry per snapshot
        Some(_) => split_bundle(frame, outer),
        None => {
            eprintln!(
                "Warning: frame data for game '{}' has an unexpected shape; \
                 treating as a single frame",
                frame.game_id
            );
            vec![frame.clone()]
        }
    }
}

fn split_bundle(original: &Frame, snapshots: &[serde_json::Value]) -> Vec<Frame> {
    let last = snapshots.len() - 1;
    snapshots
        .iter()
        .enumerate()
        .map(|(i, snapshot)| {
            let settled = i == last;
            Frame {
                game_guid: original.game_guid.clone(),
                game_id: original.game_id.clone(),
                frame: snapshot.clone(),
                score: if settled { original.score } else { 0 },
                state: if settled { original.state } else { GameState::InProgress },
                action_counter: if settled { original.action_counter } else { None },
                max_actions: original.max_actions,
                win_score: original.win_score,
                available_actions: original.available_actions.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_frame(frame_data: serde_json::Value) -> Frame {
        serde_json::from_value(json!({
            "gameGuid": "guid-1",
            "gameId": "ls20",
            "frame": frame_data,
            "score": 5,
            "state": "WIN",
            "actionCounter": 12,
            "maxActions": 80,
            "winScore": 5,
            "availableActions": ["RESET", "ACTION1", "ACTION6"]
        }))
        .unwrap()
    }

    #[test]
    fn test_single_snapshot_passes_through() {
        let frame = base_frame(json!([[[0, 1], [2, 3]], [[4, 5], [6, 7]]]));
        let unpacked = unpack_frames(&frame);

        assert_eq!(unpacked.len(), 1);
        assert_eq!(unpacked[0].score, 5);
        assert_eq!(unpacked[0].state, GameState::Win);
        assert_eq!(unpacked[0].action_counter, Some(12));
        assert_eq!(unpacked[0].frame, frame.frame);
    }

    #[test]
    fn test_empty_frame_data_wraps_input() {
        let frame = base_frame(json!([]));
        assert_eq!(unpack_frames(&frame).len(), 1);

        let frame = base_frame(json!(null));
        assert_eq!(unpack_frames(&frame).len(), 1);
    }

    #[test]
    fn test_animation_bundle_splits_with_settled_semantics() {
        // 3 snapshots, each one layer of a 2x2 grid
        let frame = base_frame(json!([
            [[[0, 0], [0, 0]]],
            [[[1, 0], [0, 0]]],
            [[[1, 1], [0, 0]]]
        ]));
        let unpacked = unpack_frames(&frame);
        assert_eq!(unpacked.len(), 3);

        for intermediate in &unpacked[..2] {
            assert_eq!(intermediate.state, GameState::InProgress);
            assert_eq!(intermediate.score, 0);
            assert_eq!(intermediate.action_counter, None);
            assert_eq!(intermediate.game_guid, "guid-1");
            assert_eq!(intermediate.max_actions, 80);
            assert_eq!(intermediate.win_score, 5);
        }

        let settled = &unpacked[2];
        assert_eq!(settled.state, GameState::Win);
        assert_eq!(settled.score, 5);
        assert_eq!(settled.action_counter, Some(12));
        assert_eq!(settled.frame, json!([[[1, 1], [0, 0]]]));
    }

    #[test]
    fn test_two_snapshot_bundle() {
        let frame = base_frame(json!([
            [[[0]]],
            [[[1]]]
        ]));
        let unpacked = unpack_frames(&frame);
        assert_eq!(unpacked.len(), 2);
        assert_eq!(unpacked[0].state, GameState::InProgress);
        assert_eq!(unpacked[1].state, GameState::Win);
        assert_eq!(unpacked[1].score, 5);
    }

    #[test]
    fn test_structural_anomaly_falls_back_to_single_frame() {
        // depth-2 nesting only: the probe finds nothing at outer[0][0][0]
        let frame = base_frame(json!([[0, 1], [2, 3]]));
        let unpacked = unpack_frames(&frame);
        assert_eq!(unpacked.len(), 1);
        assert_eq!(unpacked[0].score, 5);

        // non-array garbage inside
        let frame = base_frame(json!([{"rows": []}]));
        assert_eq!(unpack_frames(&frame).len(), 1);
    }

    #[test]
    fn test_bundle_preserves_available_actions() {
        let frame = base_frame(json!([[[[0]]], [[[1]]]]));
        let unpacked = unpack_frames(&frame);
        for f in &unpacked {
            assert_eq!(
                f.available_actions.as_ref().map(|s| s.len()),
                Some(3)
            );
        }
    }
}
