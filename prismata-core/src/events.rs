//! Engine-level notifications.
//!
//! The engine buffers these while an operation runs; callers drain them with
//! [`GameState::drain_events`](crate::GameState::drain_events) after each
//! call, which keeps delivery ordered with the actions that caused them.

use crate::action::ActionKind;
use crate::unit::{Player, UnitId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DestroyReason {
    /// Fully damaged while blocking.
    Defense,
    Lifespan,
    NoHealth,
    Spell,
    /// Fully damaged by the attacker.
    Attack,
    Sacrificed,
    /// Created by a script that was reversed.
    Deconstructed,
}

impl fmt::Display for DestroyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DestroyReason::Defense => "defense",
            DestroyReason::Lifespan => "lifespan",
            DestroyReason::NoHealth => "noHealth",
            DestroyReason::Spell => "spell",
            DestroyReason::Attack => "attack",
            DestroyReason::Sacrificed => "sacrificed",
            DestroyReason::Deconstructed => "deconstructed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    TurnStarted {
        turn_number: u32,
        player: Player,
    },
    UnitConstructed {
        unit: UnitId,
        by: UnitId,
    },
    UnitDestroyed {
        unit: UnitId,
        reason: DestroyReason,
    },
    /// An action the engine applied on its own as a side effect.
    AutoAction {
        action: ActionKind,
        unit: UnitId,
    },
    AssignAttackBlocker {
        unit: UnitId,
    },
}
