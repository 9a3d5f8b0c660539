//! Order in which a shift-click applies an action to matching units.
//!
//! The client picks units by a per-action list of sort keys. Sorts are
//! stable, so units tied on every key keep slate order.

use prismata_core::{ActionKind, GameError, GameResult, GameState, Unit, UnitId};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Delay,
    AbilityUsed,
    /// Unset or zero lifespan sorts as infinite.
    Lifespan,
    Toughness,
    Charge,
    AssignedAttack,
    /// `delay - 1` for delayed units, else 0.
    DelayMinusOne,
    /// `lifespan + delay` for units with a lifespan, else 0.
    LifespanPlusDelay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Asc,
    Desc,
}

type Rule = (Order, Key);

use Key::*;
use Order::*;

const TARGETING: &[Rule] = &[(Asc, Lifespan), (Desc, Toughness), (Desc, Charge)];
const ABILITY_BLOCKER: &[Rule] = &[(Desc, Lifespan), (Asc, Toughness), (Desc, Charge)];
const ABILITY_HEALTH_COST: &[Rule] = &[(Asc, Lifespan), (Desc, Toughness), (Desc, Charge)];
const ABILITY: &[Rule] = &[(Asc, Lifespan), (Asc, Toughness), (Desc, Charge)];
const DEFENSE: &[Rule] = &[
    (Asc, AssignedAttack),
    (Asc, Lifespan),
    (Asc, Toughness),
    (Asc, Charge),
];
const ATTACK_BLOCKER: &[Rule] = &[
    (Asc, Delay),
    (Asc, AbilityUsed),
    (Asc, Lifespan),
    (Desc, Toughness),
    (Desc, Charge),
];
const ATTACK: &[Rule] = &[
    (Asc, AssignedAttack),
    (Asc, DelayMinusOne),
    (Desc, LifespanPlusDelay),
    (Asc, Toughness),
    (Desc, Charge),
];

fn key_value(unit: &Unit, key: Key) -> f64 {
    let delay = unit.delay.unwrap_or(0);
    let lifespan = unit.lifespan.filter(|&l| l != 0);
    let value = match key {
        Delay => delay,
        AbilityUsed => i32::from(unit.ability_used),
        Lifespan => return lifespan.map_or(f64::INFINITY, f64::from),
        Toughness => unit.toughness,
        Charge => unit.charge.unwrap_or(0),
        AssignedAttack => unit.assigned_attack,
        DelayMinusOne => {
            if delay != 0 {
                delay - 1
            } else {
                0
            }
        }
        LifespanPlusDelay => lifespan.map_or(0, |l| l + delay),
    };
    f64::from(value)
}

fn compare(a: &Unit, b: &Unit, rules: &[Rule]) -> Ordering {
    for &(order, key) in rules {
        let (x, y) = (key_value(a, key), key_value(b, key));
        if x == y {
            continue;
        }
        let ordering = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        return match order {
            Asc => ordering,
            Desc => ordering.reverse(),
        };
    }
    Ordering::Equal
}

fn sort_units(state: &GameState, units: &mut [UnitId], rules: &[Rule]) {
    units.sort_by(|&a, &b| compare(state.unit(a), state.unit(b), rules));
}

/// Sort shift-click matches into the order the action is applied.
pub fn sort_shift_click_matches(
    state: &GameState,
    kind: ActionKind,
    units: &mut [UnitId],
) -> GameResult<()> {
    let Some(&first) = units.first() else {
        return Ok(());
    };
    let first = state.unit(first).blueprint().clone();

    match kind {
        ActionKind::SelectForTargeting => sort_units(state, units, TARGETING),
        ActionKind::UseAbility | ActionKind::CancelUseAbility => {
            let rules = if first.default_blocking {
                ABILITY_BLOCKER
            } else if first.hp_used != 0 {
                ABILITY_HEALTH_COST
            } else {
                ABILITY
            };
            sort_units(state, units, rules);
        }
        ActionKind::AssignDefense | ActionKind::CancelAssignDefense => {
            sort_units(state, units, DEFENSE)
        }
        ActionKind::AssignAttack | ActionKind::CancelAssignAttack => {
            if first.default_blocking {
                // Blockers first, then everything from the first used or
                // delayed unit onwards as non-blockers.
                sort_units(state, units, ATTACK_BLOCKER);
                let split = units
                    .iter()
                    .position(|&id| {
                        let u = state.unit(id);
                        u.ability_used || u.delay.is_some_and(|d| d != 0)
                    })
                    .unwrap_or(0);
                sort_units(state, &mut units[split..], ATTACK);
            } else {
                sort_units(state, units, ATTACK);
            }
        }
        ActionKind::Purchase | ActionKind::CancelPurchase => {}
        other => {
            return Err(GameError::invalid("Unsupported shift-click action.").with_detail(other));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prismata_core::testing::GameStateBuilder;
    use prismata_core::{Blueprint, Player};

    #[test]
    fn test_defense_ties_keep_slate_order() {
        let (state, ids) = GameStateBuilder::new()
            .blueprint(Blueprint {
                default_blocking: true,
                toughness: 3,
                ..Blueprint::new("Wall")
            })
            .unit(Player::First, "Wall")
            .unit(Player::First, "Wall")
            .unit(Player::First, "Wall")
            .build_with_ids();
        let mut units = ids.clone();
        // All tied: stable order.
        sort_shift_click_matches(&state, ActionKind::AssignDefense, &mut units).unwrap();
        assert_eq!(units, ids);
    }

    #[test]
    fn test_lifespan_unset_sorts_last_ascending() {
        let (state, ids) = GameStateBuilder::new()
            .blueprint(Blueprint::new("Drone"))
            .blueprint(Blueprint {
                lifespan: Some(2),
                ..Blueprint::new("Drone Clone")
            })
            .unit(Player::First, "Drone")
            .unit(Player::First, "Drone Clone")
            .build_with_ids();
        let mut units = ids.clone();
        sort_shift_click_matches(&state, ActionKind::SelectForTargeting, &mut units).unwrap();
        assert_eq!(units, vec![ids[1], ids[0]]);
    }

    #[test]
    fn test_ability_sort_by_toughness() {
        let (state, ids) = GameStateBuilder::new()
            .blueprint(Blueprint {
                toughness: 1,
                ..Blueprint::new("Small")
            })
            .blueprint(Blueprint {
                toughness: 4,
                ..Blueprint::new("Big")
            })
            .unit(Player::First, "Big")
            .unit(Player::First, "Small")
            .build_with_ids();
        let mut units = ids.clone();
        sort_shift_click_matches(&state, ActionKind::UseAbility, &mut units).unwrap();
        assert_eq!(units, vec![ids[1], ids[0]]);
    }

    #[test]
    fn test_attack_on_blockers_splits_used_units() {
        let (state, ids) = GameStateBuilder::new()
            .blueprint(Blueprint {
                default_blocking: true,
                toughness: 2,
                ..Blueprint::new("Wall")
            })
            .unit(Player::Second, "Wall")
            .building_unit(Player::Second, "Wall", 1)
            .unit(Player::Second, "Wall")
            .build_with_ids();
        let mut units = ids.clone();
        sort_shift_click_matches(&state, ActionKind::AssignAttack, &mut units).unwrap();
        // Ready blockers first, the delayed one last.
        assert_eq!(units, vec![ids[0], ids[2], ids[1]]);
    }

    #[test]
    fn test_unsupported_kind() {
        let (state, ids) = GameStateBuilder::new()
            .blueprint(Blueprint::new("Drone"))
            .unit(Player::First, "Drone")
            .build_with_ids();
        let mut units = ids;
        assert!(sort_shift_click_matches(&state, ActionKind::EndTurn, &mut units).is_err());
    }
}
