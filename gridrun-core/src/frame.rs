//! Frame and action data model
//!
//! Everything the rest of the system knows about the remote game is carried
//! by `Frame`. Action tokens arrive on the wire in heterogeneous forms
//! (numbers, strings, mixed casings); they are normalized into `ActionName`
//! at this boundary and no internal logic ever touches raw wire tokens.

use gridrun_error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Game state
// ============================================================================

/// The lifecycle state of a remote game, as reported per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    NotPlayed,
    InProgress,
    Win,
    GameOver,
    NotFinished,
}

impl GameState {
    /// Terminal states end the run and close any open scoring card
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameState::Win | GameState::GameOver)
    }

    /// Returns the state as its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::NotPlayed => "NOT_PLAYED",
            GameState::InProgress => "IN_PROGRESS",
            GameState::Win => "WIN",
            GameState::GameOver => "GAME_OVER",
            GameState::NotFinished => "NOT_FINISHED",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Action names
// ============================================================================

/// Canonical action vocabulary of the remote game.
///
/// The wire is sloppy about these: the same action may arrive as `"ACTION1"`,
/// `"action1"`, `"1"`, or the number `1`. `from_wire` is the single place
/// that accepts all of those; everywhere else only the enum exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionName {
    Reset,
    Action1,
    Action2,
    Action3,
    Action4,
    Action5,
    Action6,
    Action7,
}

impl ActionName {
    /// Returns the canonical wire name (`RESET`, `ACTION1`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::Reset => "RESET",
            ActionName::Action1 => "ACTION1",
            ActionName::Action2 => "ACTION2",
            ActionName::Action3 => "ACTION3",
            ActionName::Action4 => "ACTION4",
            ActionName::Action5 => "ACTION5",
            ActionName::Action6 => "ACTION6",
            ActionName::Action7 => "ACTION7",
        }
    }

    /// Numeric form used by some API responses (`0` = reset)
    pub fn index(&self) -> u8 {
        match self {
            ActionName::Reset => 0,
            ActionName::Action1 => 1,
            ActionName::Action2 => 2,
            ActionName::Action3 => 3,
            ActionName::Action4 => 4,
            ActionName::Action5 => 5,
            ActionName::Action6 => 6,
            ActionName::Action7 => 7,
        }
    }

    fn from_index(n: u64) -> Option<Self> {
        match n {
            0 => Some(ActionName::Reset),
            1 => Some(ActionName::Action1),
            2 => Some(ActionName::Action2),
            3 => Some(ActionName::Action3),
            4 => Some(ActionName::Action4),
            5 => Some(ActionName::Action5),
            6 => Some(ActionName::Action6),
            7 => Some(ActionName::Action7),
            _ => None,
        }
    }

    /// Normalize one heterogeneous wire token into a canonical action.
    ///
    /// Accepts JSON numbers (`0..=7`), numeric strings, and `RESET`/`ACTIONk`
    /// in any casing. Anything else is an `ActionUnrecognized` error.
    pub fn from_wire(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(Self::from_index)
                .ok_or_else(|| Error::action_unrecognized(n.to_string())),
            serde_json::Value::String(s) => {
                let token = s.trim().to_ascii_uppercase();
                if let Ok(n) = token.parse::<u64>() {
                    return Self::from_index(n)
                        .ok_or_else(|| Error::action_unrecognized(s.clone()));
                }
                match token.as_str() {
                    "RESET" => Ok(ActionName::Reset),
                    "ACTION1" => Ok(ActionName::Action1),
                    "ACTION2" => Ok(ActionName::Action2),
                    "ACTION3" => Ok(ActionName::Action3),
                    "ACTION4" => Ok(ActionName::Action4),
                    "ACTION5" => Ok(ActionName::Action5),
                    "ACTION6" => Ok(ActionName::Action6),
                    "ACTION7" => Ok(ActionName::Action7),
                    _ => Err(Error::action_unrecognized(s.clone())),
                }
            }
            other => Err(Error::action_unrecognized(other.to_string())),
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        ActionName::from_wire(&value).map_err(serde::de::Error::custom)
    }
}

/// Normalize a heterogeneous `availableActions` array into a canonical set.
///
/// Unrecognized tokens are warned about and skipped rather than failing the
/// whole frame; a newly introduced server-side action must not abort a run.
pub fn normalize_action_set(values: &[serde_json::Value]) -> BTreeSet<ActionName> {
    let mut set = BTreeSet::new();
    for value in values {
        match ActionName::from_wire(value) {
            Ok(action) => {
                set.insert(action);
            }
            Err(e) => {
                eprintln!("Warning: skipping unrecognized available action: {}", e);
            }
        }
    }
    set
}

fn de_available_actions<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<BTreeSet<ActionName>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|values| normalize_action_set(&values)))
}

// ============================================================================
// Game actions
// ============================================================================

/// One action the agent can submit to the remote game.
///
/// Only `ACTION6` carries coordinates; `RESET` additionally needs a scoring
/// card id, which is supplied by the caller at dispatch time (it is run
/// state, not action state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameAction {
    pub name: ActionName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<(u32, u32)>,
}

impl GameAction {
    /// A coordinate-free action (`RESET`, `ACTION1`..`ACTION5`, `ACTION7`)
    pub fn simple(name: ActionName) -> Self {
        Self { name, coordinates: None }
    }

    /// The coordinate action (`ACTION6`)
    pub fn at(x: u32, y: u32) -> Self {
        Self {
            name: ActionName::Action6,
            coordinates: Some((x, y)),
        }
    }

    /// Check the coordinate rule: exactly `ACTION6` carries coordinates
    pub fn validate(&self) -> Result<()> {
        match (self.name, self.coordinates) {
            (ActionName::Action6, None) => {
                Err(Error::action_invalid("ACTION6 requires (x, y) coordinates"))
            }
            (ActionName::Action6, Some(_)) => Ok(()),
            (name, Some(_)) => Err(Error::action_invalid(format!(
                "{} does not take coordinates",
                name
            ))),
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// Frames
// ============================================================================

/// One game snapshot as consumed from the remote API.
///
/// `frame` holds the raw nested grid data: normally `layers -> rows -> cols`
/// of colour indices, but the API sometimes bundles an animation as
/// `frames -> layers -> rows -> cols` in the same field with no flag. See
/// `unpack::unpack_frames` for the disambiguation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(alias = "guid")]
    pub game_guid: String,
    pub game_id: String,
    #[serde(default)]
    pub frame: serde_json::Value,
    #[serde(default)]
    pub score: i64,
    pub state: GameState,
    #[serde(default)]
    pub action_counter: Option<u64>,
    #[serde(default)]
    pub max_actions: u64,
    #[serde(default)]
    pub win_score: i64,
    #[serde(
        default,
        deserialize_with = "de_available_actions",
        skip_serializing_if = "Option::is_none"
    )]
    pub available_actions: Option<BTreeSet<ActionName>>,
}

impl Frame {
    /// Whether this frame carries the settled fields a continuation needs
    pub fn has_settled_fields(&self) -> bool {
        self.action_counter.is_some() && self.max_actions > 0 && self.win_score > 0
    }

    /// Grid dimensions as (layers, rows, cols), if the data is 3-D
    pub fn grid_dimensions(&self) -> Option<(usize, usize, usize)> {
        let layers = self.frame.as_array()?;
        let rows = layers.first()?.as_array()?;
        let cols = rows.first()?.as_array()?;
        // A 4-D bundle would put an array here
        if cols.first().map(|v| v.is_array()).unwrap_or(false) {
            return None;
        }
        Some((layers.len(), rows.len(), cols.len()))
    }
}

/// Count cells that differ between two 3-D grid snapshots.
///
/// Cells present in one snapshot but missing in the other count as changed.
/// Only meaningful on settled frames; intermediate animation frames are
/// recorded with 0.
pub fn pixels_changed(prev: &serde_json::Value, next: &serde_json::Value) -> u64 {
    fn count(prev: &serde_json::Value, next: &serde_json::Value, depth: u8) -> u64 {
        match (prev.as_array(), next.as_array()) {
            (Some(a), Some(b)) if depth > 0 => {
                let len = a.len().max(b.len());
                let null = serde_json::Value::Null;
                (0..len)
                    .map(|i| {
                        count(a.get(i).unwrap_or(&null), b.get(i).unwrap_or(&null), depth - 1)
                    })
                    .sum()
            }
            _ => u64::from(prev != next),
        }
    }
    // layers -> rows -> cols, then compare cells
    count(prev, next, 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_from_wire_strings() {
        assert_eq!(ActionName::from_wire(&json!("ACTION1")).unwrap(), ActionName::Action1);
        assert_eq!(ActionName::from_wire(&json!("action6")).unwrap(), ActionName::Action6);
        assert_eq!(ActionName::from_wire(&json!("Reset")).unwrap(), ActionName::Reset);
        assert_eq!(ActionName::from_wire(&json!(" reset ")).unwrap(), ActionName::Reset);
        assert_eq!(ActionName::from_wire(&json!("3")).unwrap(), ActionName::Action3);
    }

    #[test]
    fn test_action_from_wire_numbers() {
        assert_eq!(ActionName::from_wire(&json!(0)).unwrap(), ActionName::Reset);
        assert_eq!(ActionName::from_wire(&json!(7)).unwrap(), ActionName::Action7);
        assert!(ActionName::from_wire(&json!(8)).is_err());
        assert!(ActionName::from_wire(&json!(-1)).is_err());
    }

    #[test]
    fn test_action_from_wire_rejects_junk() {
        assert!(ActionName::from_wire(&json!("ACTION9")).is_err());
        assert!(ActionName::from_wire(&json!("jump")).is_err());
        assert!(ActionName::from_wire(&json!(null)).is_err());
        assert!(ActionName::from_wire(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_normalize_action_set_skips_unknown() {
        let set = normalize_action_set(&[json!("RESET"), json!(6), json!("ACTION99")]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&ActionName::Reset));
        assert!(set.contains(&ActionName::Action6));
    }

    #[test]
    fn test_game_action_validation() {
        assert!(GameAction::at(3, 3).validate().is_ok());
        assert!(GameAction::simple(ActionName::Action1).validate().is_ok());
        assert!(GameAction::simple(ActionName::Action6).validate().is_err());

        let bad = GameAction {
            name: ActionName::Action2,
            coordinates: Some((1, 1)),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_frame_deserializes_heterogeneous_actions() {
        let frame: Frame = serde_json::from_value(json!({
            "gameGuid": "g-1",
            "gameId": "ls20",
            "frame": [[[0, 1], [2, 3]]],
            "score": 2,
            "state": "IN_PROGRESS",
            "actionCounter": 4,
            "maxActions": 80,
            "winScore": 10,
            "availableActions": ["RESET", "action1", 6]
        }))
        .unwrap();

        let actions = frame.available_actions.as_ref().unwrap();
        assert_eq!(actions.len(), 3);
        assert!(actions.contains(&ActionName::Action6));
        assert_eq!(frame.state, GameState::InProgress);
        assert!(frame.has_settled_fields());
    }

    #[test]
    fn test_frame_accepts_guid_alias() {
        let frame: Frame = serde_json::from_value(json!({
            "guid": "g-2",
            "gameId": "ft09",
            "state": "NOT_PLAYED"
        }))
        .unwrap();
        assert_eq!(frame.game_guid, "g-2");
        assert!(!frame.has_settled_fields());
    }

    #[test]
    fn test_grid_dimensions() {
        let frame: Frame = serde_json::from_value(json!({
            "gameGuid": "g", "gameId": "x", "state": "IN_PROGRESS",
            "frame": [[[0, 1, 2], [3, 4, 5]]]
        }))
        .unwrap();
        assert_eq!(frame.grid_dimensions(), Some((1, 2, 3)));

        let bundle: Frame = serde_json::from_value(json!({
            "gameGuid": "g", "gameId": "x", "state": "IN_PROGRESS",
            "frame": [[[[0]]]]
        }))
        .unwrap();
        assert_eq!(bundle.grid_dimensions(), None);
    }

    #[test]
    fn test_pixels_changed() {
        let a = json!([[[0, 1], [2, 3]]]);
        let b = json!([[[0, 9], [2, 3]]]);
        assert_eq!(pixels_changed(&a, &b), 1);
        assert_eq!(pixels_changed(&a, &a), 0);

        // shape growth counts the new cells
        let c = json!([[[0, 1], [2, 3], [4, 5]]]);
        assert_eq!(pixels_changed(&a, &c), 2);
    }

    #[test]
    fn test_game_state_terminal() {
        assert!(GameState::Win.is_terminal());
        assert!(GameState::GameOver.is_terminal());
        assert!(!GameState::InProgress.is_terminal());
        assert!(!GameState::NotFinished.is_terminal());
    }
}
