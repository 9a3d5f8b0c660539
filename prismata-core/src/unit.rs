//! Mutable unit instances layered over a shared blueprint.

use crate::blueprint::{Blueprint, Condition, TargetAction};
use crate::error::{GameError, GameResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Player {
    #[default]
    First,
    Second,
}

impl Player {
    pub fn index(self) -> usize {
        match self {
            Player::First => 0,
            Player::Second => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Player::First),
            1 => Some(Player::Second),
            _ => None,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Player::First => Player::Second,
            Player::Second => Player::First,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.index() + 1)
    }
}

/// Stable position of a unit in the engine's unit list.
///
/// Units are never removed, only flagged destroyed, so an id stays valid for
/// the rest of the match (undo pads the list to keep it that way).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub usize);

impl UnitId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name of the stand-in units that undo appends to keep ids aligned.
pub const PLACEHOLDER_NAME: &str = "UNDO";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    blueprint: Arc<Blueprint>,
    pub player: Player,

    pub ability_used: bool,
    /// Damage allocated to this unit, by a defender or by the attacker.
    pub assigned_attack: i32,
    pub building: bool,
    pub constructed_by: Option<UnitId>,
    pub defenses_bypassed: bool,
    /// Turns until built; `None` or `Some(0)` means ready.
    pub delay: Option<i32>,
    pub destroyed: bool,
    /// Accumulated chill.
    pub disruption: i32,
    pub purchased: bool,
    pub sacrificed: bool,
    /// Units currently applying a targeted ability to this one, in order.
    pub targeted_by: Vec<UnitId>,

    pub charge: Option<i32>,
    pub lifespan: Option<i32>,
    pub toughness: i32,
}

impl Unit {
    pub fn new(blueprint: Arc<Blueprint>, player: Player) -> Self {
        Self {
            player,
            ability_used: false,
            assigned_attack: 0,
            building: false,
            constructed_by: None,
            defenses_bypassed: false,
            delay: None,
            destroyed: false,
            disruption: 0,
            purchased: false,
            sacrificed: false,
            targeted_by: Vec::new(),
            charge: blueprint.charge,
            lifespan: blueprint.lifespan,
            toughness: blueprint.toughness,
            blueprint,
        }
    }

    pub(crate) fn placeholder() -> Self {
        let mut unit = Self::new(Arc::new(Blueprint::new(PLACEHOLDER_NAME)), Player::First);
        unit.destroyed = true;
        unit
    }

    pub fn blueprint(&self) -> &Arc<Blueprint> {
        &self.blueprint
    }

    pub fn name(&self) -> &str {
        &self.blueprint.name
    }

    pub fn target_action(&self) -> Option<&TargetAction> {
        self.blueprint.target_action.as_ref()
    }

    pub fn is_delayed(&self) -> bool {
        self.delay.is_some_and(|d| d > 0)
    }

    /// Intercepts enemy attack by default and is currently eligible to.
    pub fn blocking(&self) -> bool {
        !self.destroyed
            && !self.sacrificed
            && !self.is_delayed()
            && self.blueprint.default_blocking
            && !self.ability_used
    }

    pub fn frozen(&self) -> bool {
        !self.destroyed && self.disruption >= self.toughness
    }

    pub fn purchased_this_turn(&self) -> bool {
        if self.destroyed || !self.purchased {
            return false;
        }
        if self.blueprint.build_time == 0 {
            return self.delay.is_none();
        }
        self.delay == Some(self.blueprint.build_time)
    }

    /// Whether a targeted ability of the given kind may be aimed at this unit.
    pub fn valid_target(
        &self,
        action: &TargetAction,
        condition: Option<&Condition>,
    ) -> GameResult<bool> {
        match action {
            TargetAction::Disrupt => Ok(self.blocking()),
            TargetAction::Snipe => {
                let condition = condition
                    .ok_or_else(|| GameError::data("No snipe condition given."))?;
                self.valid_snipe_target(condition)
            }
            TargetAction::Unknown(name) => {
                Err(GameError::data("Unknown target action.").with_detail(name))
            }
        }
    }

    fn valid_snipe_target(&self, condition: &Condition) -> GameResult<bool> {
        if self.is_delayed() && self.purchased {
            return Ok(false);
        }
        if self.assigned_attack >= self.toughness {
            return Ok(false);
        }
        let health = if self.blueprint.fragile {
            self.toughness - self.assigned_attack
        } else {
            self.toughness
        };
        condition.accepts(self.name(), health)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.player, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> Unit {
        let bp = Blueprint {
            default_blocking: true,
            toughness: 3,
            build_time: 0,
            ..Blueprint::new("Wall")
        };
        Unit::new(Arc::new(bp), Player::First)
    }

    #[test]
    fn test_blocking_predicates() {
        let mut unit = wall();
        assert!(unit.blocking());

        unit.delay = Some(0);
        assert!(unit.blocking(), "zero delay counts as ready");

        unit.delay = Some(2);
        assert!(!unit.blocking());

        unit.delay = None;
        unit.ability_used = true;
        assert!(!unit.blocking());
    }

    #[test]
    fn test_frozen() {
        let mut unit = wall();
        unit.disruption = 2;
        assert!(!unit.frozen());
        unit.disruption = 3;
        assert!(unit.frozen());
        unit.destroyed = true;
        assert!(!unit.frozen());
    }

    #[test]
    fn test_purchased_this_turn() {
        let bp = Blueprint {
            build_time: 2,
            ..Blueprint::new("Tarsier")
        };
        let mut unit = Unit::new(Arc::new(bp), Player::First);
        unit.purchased = true;
        unit.delay = Some(2);
        assert!(unit.purchased_this_turn());
        unit.delay = Some(1);
        assert!(!unit.purchased_this_turn());

        let mut instant = wall();
        instant.purchased = true;
        assert!(instant.purchased_this_turn());
        instant.delay = Some(0);
        assert!(!instant.purchased_this_turn());
    }

    #[test]
    fn test_disrupt_target_requires_blocking() {
        let mut unit = wall();
        assert_eq!(unit.valid_target(&TargetAction::Disrupt, None), Ok(true));
        unit.sacrificed = true;
        assert_eq!(unit.valid_target(&TargetAction::Disrupt, None), Ok(false));
    }

    #[test]
    fn test_snipe_target_uses_fragile_health() {
        let bp = Blueprint {
            fragile: true,
            toughness: 4,
            ..Blueprint::new("Wall")
        };
        let mut unit = Unit::new(Arc::new(bp), Player::Second);
        let cond = Condition {
            health_at_most: Some(2),
            ..Condition::default()
        };
        assert_eq!(unit.valid_target(&TargetAction::Snipe, Some(&cond)), Ok(false));
        unit.assigned_attack = 2;
        assert_eq!(unit.valid_target(&TargetAction::Snipe, Some(&cond)), Ok(true));
        assert!(unit.valid_target(&TargetAction::Snipe, None).is_err());
    }

    #[test]
    fn test_placeholder_is_destroyed() {
        let unit = Unit::placeholder();
        assert!(unit.destroyed);
        assert_eq!(unit.name(), PLACEHOLDER_NAME);
    }
}
