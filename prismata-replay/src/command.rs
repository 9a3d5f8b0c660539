//! Decoding of recorded client commands.
//!
//! A replay stores every click as `{"_type": ..., "_id": ...}`. Emotes are
//! the only entries that carry `_params`.

use prismata_core::{GameError, GameResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Raw command entry as stored in `commandInfo.commandList`.
pub type RawCommand = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ReplayCommand {
    ClickUnit { id: i64 },
    ShiftClickUnit { id: i64 },
    /// `id` is an index into the deck.
    ClickBlueprint { id: i64 },
    ShiftClickBlueprint { id: i64 },
    ClickSpace,
    ClickRevert,
    ClickUndo,
    ClickRedo,
    CancelTargeting,
    EndCombinedAction,
    Emote {
        player: Option<Value>,
        params: Option<Value>,
    },
}

impl ReplayCommand {
    /// The unit or blueprint index the command refers to.
    pub fn id(&self) -> Option<i64> {
        match *self {
            ReplayCommand::ClickUnit { id }
            | ReplayCommand::ShiftClickUnit { id }
            | ReplayCommand::ClickBlueprint { id }
            | ReplayCommand::ShiftClickBlueprint { id } => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for ReplayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplayCommand::ClickUnit { .. } => "ClickUnit",
            ReplayCommand::ShiftClickUnit { .. } => "ShiftClickUnit",
            ReplayCommand::ClickBlueprint { .. } => "ClickBlueprint",
            ReplayCommand::ShiftClickBlueprint { .. } => "ShiftClickBlueprint",
            ReplayCommand::ClickSpace => "ClickSpace",
            ReplayCommand::ClickRevert => "ClickRevert",
            ReplayCommand::ClickUndo => "ClickUndo",
            ReplayCommand::ClickRedo => "ClickRedo",
            ReplayCommand::CancelTargeting => "CancelTargeting",
            ReplayCommand::EndCombinedAction => "EndCombinedAction",
            ReplayCommand::Emote { .. } => "Emote",
        };
        match self.id() {
            Some(id) => write!(f, "{} {}", name, id),
            None => f.write_str(name),
        }
    }
}

/// Decode one recorded command.
pub fn parse_command(data: &RawCommand) -> GameResult<ReplayCommand> {
    let describe = || Value::Object(data.clone());
    let kind = data
        .get("_type")
        .and_then(Value::as_str)
        .ok_or_else(|| GameError::data("Missing properties.").with_detail(describe()))?;

    if kind.starts_with("emote") {
        if !data.contains_key("_id") && !data.contains_key("_params") {
            return Err(GameError::data("Missing properties.").with_detail(describe()));
        }
        if data.len() != 2 && data.len() != 3 {
            return Err(GameError::data("Unknown properties.").with_detail(describe()));
        }
        return Ok(ReplayCommand::Emote {
            player: data.get("_id").cloned(),
            params: data.get("_params").cloned(),
        });
    }

    let Some(id) = data.get("_id") else {
        return Err(GameError::data("Missing properties.").with_detail(describe()));
    };
    if data.len() != 2 {
        return Err(GameError::data("Unknown properties.").with_detail(describe()));
    }
    let id = id
        .as_i64()
        .ok_or_else(|| GameError::data("Unknown ID.").with_detail(describe()))?;

    let require_id = |allowed: &[i64], message: &str| -> GameResult<()> {
        if allowed.contains(&id) {
            Ok(())
        } else {
            Err(GameError::data(message).with_detail(describe()))
        }
    };

    let command = match kind {
        "inst clicked" => ReplayCommand::ClickUnit { id },
        "inst shift clicked" => ReplayCommand::ShiftClickUnit { id },
        "card clicked" => ReplayCommand::ClickBlueprint { id },
        "card shift clicked" => ReplayCommand::ShiftClickBlueprint { id },
        "space clicked" => {
            require_id(&[-1, 0], "Unknown ID for space.")?;
            ReplayCommand::ClickSpace
        }
        "revert clicked" => {
            require_id(&[-1], "Unknown ID.")?;
            ReplayCommand::ClickRevert
        }
        "undo clicked" => {
            require_id(&[-1], "Unknown ID.")?;
            ReplayCommand::ClickUndo
        }
        "redo clicked" => {
            require_id(&[-1], "Unknown ID.")?;
            ReplayCommand::ClickRedo
        }
        "cancel target processed" => {
            require_id(&[-1], "Unknown ID.")?;
            ReplayCommand::CancelTargeting
        }
        "end swipe processed" => {
            require_id(&[-1, 0], "Unknown ID.")?;
            ReplayCommand::EndCombinedAction
        }
        _ => return Err(GameError::data("Unknown command type").with_detail(describe())),
    };
    Ok(command)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn raw(kind: &str, id: i64) -> RawCommand {
        let mut map = Map::new();
        map.insert("_type".into(), json!(kind));
        map.insert("_id".into(), json!(id));
        map
    }

    proptest! {
        #[test]
        fn prop_unit_clicks_keep_any_id(id in any::<i64>()) {
            prop_assert_eq!(parse_command(&raw("inst clicked", id)), Ok(ReplayCommand::ClickUnit { id }));
        }

        #[test]
        fn prop_space_rejects_other_ids(id in any::<i64>().prop_filter("not -1 or 0", |id| *id != -1 && *id != 0)) {
            prop_assert!(parse_command(&raw("space clicked", id)).is_err());
        }

        #[test]
        fn prop_unknown_types_rejected(kind in "[a-z]{1,12}") {
            prop_assume!(!kind.starts_with("emote"));
            prop_assert!(parse_command(&raw(&kind, -1)).is_err());
        }
    }
}
