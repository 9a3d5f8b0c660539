//! Immutable unit templates.
//!
//! Blueprints arrive already normalised (defaults applied, renames resolved)
//! from the replay layer. The engine shares them between units and snapshots
//! through `Arc` and never mutates them.

use crate::error::{GameError, GameResult};
use crate::resources::Resources;
use serde::{Deserialize, Serialize};

/// Names the snipe condition `isABC` accepts.
const ABC_UNITS: [&str; 3] = ["Animus", "Blastforge", "Conduit"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    /// Name before rename mapping, if the blueprint was renamed.
    pub original_name: Option<String>,
    pub ui_shortname: Option<String>,
    pub rarity: Option<String>,

    pub build_time: i32,
    /// Remaining ability uses; `None` means unlimited.
    pub charge: Option<i32>,
    pub default_blocking: bool,
    pub fragile: bool,
    pub hp_gained: i32,
    pub hp_max: Option<i32>,
    pub lifespan: Option<i32>,
    pub spell: bool,
    pub toughness: i32,
    /// Frontline: attackable before defenses are overrun.
    pub undefendable: bool,

    pub ability_cost: Option<Resources>,
    /// Ability consumes an eligible enemy Drone as an extra cost.
    pub ability_netherfy: bool,
    pub ability_sac: Option<Vec<SacrificeRule>>,
    pub ability_script: Option<Script>,
    pub hp_used: i32,
    pub target_action: Option<TargetAction>,
    pub target_amount: Option<i32>,

    pub buy_cost: Option<Resources>,
    pub buy_sac: Option<Vec<SacrificeRule>>,
    pub buy_script: Option<Script>,

    pub begin_own_turn_script: Option<Script>,
    /// One gold per live unit of this name at start of turn.
    pub gold_resonate: Option<String>,
    /// One attack per live unit of this name at start of turn.
    pub resonate: Option<String>,
    pub condition: Option<Condition>,

    /// Attributes present in the source data that the engine does not know.
    pub unknown_attributes: Vec<String>,
}

impl Blueprint {
    /// A blueprint with the engine defaults: one turn to build, one health.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            original_name: None,
            ui_shortname: None,
            rarity: None,
            build_time: 1,
            charge: None,
            default_blocking: false,
            fragile: false,
            hp_gained: 0,
            hp_max: None,
            lifespan: None,
            spell: false,
            toughness: 1,
            undefendable: false,
            ability_cost: None,
            ability_netherfy: false,
            ability_sac: None,
            ability_script: None,
            hp_used: 0,
            target_action: None,
            target_amount: None,
            buy_cost: None,
            buy_sac: None,
            buy_script: None,
            begin_own_turn_script: None,
            gold_resonate: None,
            resonate: None,
            condition: None,
            unknown_attributes: Vec::new(),
        }
    }

    pub fn has_ability(&self) -> bool {
        self.ability_script.is_some() || self.target_action.is_some()
    }

    /// Health cap applied at start of turn.
    pub fn max_health(&self) -> i32 {
        match self.hp_max {
            Some(max) if max > 0 => max,
            _ => self.toughness,
        }
    }
}

/// Effects of buying a unit, using its ability, or starting a turn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Script {
    pub create: Vec<CreateRule>,
    /// Sets the owner's delay when run.
    pub delay: Option<i32>,
    pub receive: Option<Resources>,
    pub selfsac: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRule {
    pub unit_name: String,
    pub for_opponent: bool,
    pub count: u32,
    pub build_time: i32,
    pub lifespan: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SacrificeRule {
    pub unit_name: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetAction {
    /// Adds chill to an enemy blocker.
    Disrupt,
    /// Sacrifices an enemy unit matching the blueprint's condition.
    Snipe,
    Unknown(String),
}

impl TargetAction {
    pub fn from_name(name: &str) -> Self {
        match name {
            "disrupt" => TargetAction::Disrupt,
            "snipe" => TargetAction::Snipe,
            other => TargetAction::Unknown(other.to_string()),
        }
    }

    /// Fails for targeting kinds the engine does not model.
    pub fn require_known(&self) -> GameResult<()> {
        match self {
            TargetAction::Unknown(name) => {
                Err(GameError::data("Unknown target action.").with_detail(name))
            }
            _ => Ok(()),
        }
    }
}

/// Declarative restriction on snipe targets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Condition {
    pub is_abc: bool,
    pub health_at_most: Option<i32>,
    pub name_in: Option<Vec<String>>,
    pub is_engineer_temp_hack: bool,
    pub unknown_keys: Vec<String>,
}

impl Condition {
    /// Evaluate against a candidate's name and effective health.
    pub fn accepts(&self, name: &str, health: i32) -> GameResult<bool> {
        if let Some(key) = self.unknown_keys.first() {
            return Err(GameError::data("Unknown condition.").with_detail(key));
        }
        if self.is_abc && !ABC_UNITS.contains(&name) {
            return Ok(false);
        }
        if let Some(limit) = self.health_at_most {
            if health > limit {
                return Ok(false);
            }
        }
        if let Some(names) = &self.name_in {
            if !names.iter().any(|n| n == name) {
                return Ok(false);
            }
        }
        if self.is_engineer_temp_hack && name != "Engineer" {
            return Ok(false);
        }
        Ok(true)
    }
}
