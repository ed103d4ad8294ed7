//! Game tool vocabulary
//!
//! The model never emits raw API actions; it calls named tools, and this
//! module is the single mapping between tool names and game actions. Tool
//! schemas are plain JSON Schema objects handed to the provider verbatim.

use gridrun_core::frame::{ActionName, GameAction};
use gridrun_core::provider::ToolDefinition;
use gridrun_error::{Error, Result};
use std::collections::HashMap;

/// What a tool does when the model calls it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolBinding {
    /// Re-describe the current grid without touching the game
    Inspect,
    /// A coordinate-free game action
    Simple(ActionName),
    /// The coordinate action (`ACTION6`)
    Coordinate,
    /// Restart the game under the current scoring card
    Reset,
}

/// One tool as exposed to the model
#[derive(Debug, Clone)]
pub struct GameTool {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    pub binding: ToolBinding,
}

/// A resolved tool call, ready for the runner to execute
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    /// Answer from local state; no remote call
    Inspect,
    /// Dispatch one action to the remote game
    Act(GameAction),
}

/// Name-indexed set of game tools
pub struct ToolRegistry {
    tools: Vec<GameTool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// The standard tool set: inspect, the five simple actions, the
    /// coordinate action, and optionally reset.
    ///
    /// `ACTION7` is deliberately absent: no current game uses it and
    /// offering it only invites wasted turns.
    pub fn game_tools(include_reset: bool) -> Self {
        let no_args = serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        });

        let mut tools = vec![GameTool {
            name: "inspect".into(),
            description: "Look at the current grid again without spending an action. \
                          Returns the full grid, score, and game state."
                .into(),
            parameters: no_args.clone(),
            binding: ToolBinding::Inspect,
        }];

        let simple = [
            (ActionName::Action1, "action1", "Simple action 1 (often: move up)"),
            (ActionName::Action2, "action2", "Simple action 2 (often: move down)"),
            (ActionName::Action3, "action3", "Simple action 3 (often: move left)"),
            (ActionName::Action4, "action4", "Simple action 4 (often: move right)"),
            (ActionName::Action5, "action5", "Simple action 5 (often: interact/select)"),
        ];
        for (action, name, description) in simple {
            tools.push(GameTool {
                name: name.into(),
                description: description.into(),
                parameters: no_args.clone(),
                binding: ToolBinding::Simple(action),
            });
        }

        tools.push(GameTool {
            name: "action6".into(),
            description: "Click a cell of the grid at coordinates (x, y). \
                          x is the column, y is the row, both zero-based."
                .into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "x": { "type": "integer", "description": "Column, zero-based" },
                    "y": { "type": "integer", "description": "Row, zero-based" }
                },
                "required": ["x", "y"]
            }),
            binding: ToolBinding::Coordinate,
        });

        if include_reset {
            tools.push(GameTool {
                name: "reset".into(),
                description: "Restart the game from its initial state. The score \
                              resets; use only when the game is unwinnable from here."
                    .into(),
                parameters: no_args,
                binding: ToolBinding::Reset,
            });
        }

        let by_name = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        Self { tools, by_name }
    }

    /// Tool schemas in the provider's wire form
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| {
                ToolDefinition::new(&t.name, &t.description)
                    .with_parameters(t.parameters.clone())
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolve one model tool call into an executable invocation.
    ///
    /// Coordinate arguments must be non-negative integers; anything else is
    /// an `ActionInvalid` error reported back to the model, not a run abort.
    pub fn resolve(&self, name: &str, arguments: &str) -> Result<ToolInvocation> {
        let tool = self
            .by_name
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| Error::action_unrecognized(name))?;

        match tool.binding {
            ToolBinding::Inspect => Ok(ToolInvocation::Inspect),
            ToolBinding::Simple(action) => Ok(ToolInvocation::Act(GameAction::simple(action))),
            ToolBinding::Reset => Ok(ToolInvocation::Act(GameAction::simple(ActionName::Reset))),
            ToolBinding::Coordinate => {
                let args: serde_json::Value = serde_json::from_str(arguments)
                    .map_err(|e| Error::action_invalid(format!("action6 arguments: {}", e)))?;
                let x = coordinate(&args, "x")?;
                let y = coordinate(&args, "y")?;
                Ok(ToolInvocation::Act(GameAction::at(x, y)))
            }
        }
    }
}

fn coordinate(args: &serde_json::Value, key: &str) -> Result<u32> {
    args.get(key)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            Error::action_invalid(format!(
                "action6 requires a non-negative integer '{}', got {}",
                key,
                args.get(key).unwrap_or(&serde_json::Value::Null)
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tool_set() {
        let registry = ToolRegistry::game_tools(false);
        assert_eq!(registry.len(), 7);

        let with_reset = ToolRegistry::game_tools(true);
        assert_eq!(with_reset.len(), 8);

        let names: Vec<_> = with_reset.definitions().iter().map(|d| d.name.clone()).collect();
        assert!(names.contains(&"inspect".to_string()));
        assert!(names.contains(&"action6".to_string()));
        assert!(names.contains(&"reset".to_string()));
    }

    #[test]
    fn test_resolve_simple_actions() {
        let registry = ToolRegistry::game_tools(true);

        assert_eq!(
            registry.resolve("action3", "{}").unwrap(),
            ToolInvocation::Act(GameAction::simple(ActionName::Action3))
        );
        assert_eq!(
            registry.resolve("reset", "{}").unwrap(),
            ToolInvocation::Act(GameAction::simple(ActionName::Reset))
        );
        assert_eq!(registry.resolve("inspect", "{}").unwrap(), ToolInvocation::Inspect);
    }

    #[test]
    fn test_resolve_coordinate_action() {
        let registry = ToolRegistry::game_tools(false);
        assert_eq!(
            registry.resolve("action6", r#"{"x": 3, "y": 7}"#).unwrap(),
            ToolInvocation::Act(GameAction::at(3, 7))
        );
    }

    #[test]
    fn test_resolve_rejects_bad_coordinates() {
        let registry = ToolRegistry::game_tools(false);

        assert!(registry.resolve("action6", r#"{"x": 3}"#).is_err());
        assert!(registry.resolve("action6", r#"{"x": -1, "y": 0}"#).is_err());
        assert!(registry.resolve("action6", r#"{"x": 1.5, "y": 0}"#).is_err());
        assert!(registry.resolve("action6", r#"{"x": "3", "y": "3"}"#).is_err());
        assert!(registry.resolve("action6", "not json").is_err());
    }

    #[test]
    fn test_resolve_unknown_tool() {
        let registry = ToolRegistry::game_tools(true);
        let err = registry.resolve("teleport", "{}").unwrap_err();
        assert_eq!(err.kind(), gridrun_error::ErrorKind::ActionUnrecognized);
    }

    #[test]
    fn test_reset_absent_unless_requested() {
        let registry = ToolRegistry::game_tools(false);
        assert!(registry.resolve("reset", "{}").is_err());
    }
}
