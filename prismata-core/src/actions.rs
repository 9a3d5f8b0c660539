//! Player actions and their legality predicates.
//!
//! Every mutating action has a paired `can_*` predicate with the same
//! contract: `Err` when the request is malformed for the current state (wrong
//! phase, wrong owner, unit in the wrong condition), `Ok(false)` when it is
//! well formed but not affordable or not applicable right now. The action
//! itself fails with "Unavailable action." whenever its predicate says no.

use crate::action::ActionKind;
use crate::blueprint::TargetAction;
use crate::error::{GameError, GameResult};
use crate::events::GameEvent;
use crate::state::GameState;
use crate::unit::UnitId;

const NETHERFY_PREY: &str = "Drone";

fn unavailable(detail: impl std::fmt::Display) -> GameError {
    GameError::invalid("Unavailable action.").with_detail(detail)
}

impl GameState {
    /// Evaluate the predicate paired with a single-unit action kind.
    pub fn can_apply(&self, kind: ActionKind, unit: UnitId) -> GameResult<bool> {
        match kind {
            ActionKind::AssignDefense => self.can_assign_defense(unit),
            ActionKind::CancelAssignDefense => self.can_cancel_assign_defense(unit),
            ActionKind::CancelPurchase => self.can_cancel_purchase(unit),
            ActionKind::AssignAttack => self.can_assign_attack(unit),
            ActionKind::CancelAssignAttack => self.can_cancel_assign_attack(unit),
            ActionKind::UseAbility => self.can_use_ability(unit, None),
            ActionKind::CancelUseAbility => self.can_cancel_use_ability(unit),
            other => Err(GameError::invalid("No unit predicate.").with_detail(other)),
        }
    }

    // Defense

    pub fn can_assign_defense(&self, id: UnitId) -> GameResult<bool> {
        if !self.in_defense_phase {
            return Err(GameError::invalid("Not in defense phase."));
        }
        self.require_friendly_unit(id, false)?;
        let unit = self.unit(id);
        if unit.assigned_attack > 0 {
            return Err(GameError::invalid("Already assigned.").with_detail(self.describe(id)));
        }
        if !unit.blocking() {
            return Err(GameError::invalid("Not blocking.").with_detail(self.describe(id)));
        }
        if unit.frozen() {
            return Err(GameError::invalid("Frozen unit.").with_detail(self.describe(id)));
        }
        Ok(self.attack_of(self.villain()) > 0)
    }

    pub fn assign_defense(&mut self, id: UnitId) -> GameResult<()> {
        if !self.can_assign_defense(id)? {
            return Err(unavailable(self.describe(id)));
        }
        let amount = self.unit(id).toughness.min(self.attack_of(self.villain()));
        self.unit_mut(id).assigned_attack = amount;
        self.remove_attack(amount, self.villain())
    }

    pub fn can_cancel_assign_defense(&self, id: UnitId) -> GameResult<bool> {
        if !self.in_defense_phase {
            return Err(GameError::invalid("Not in defense phase."));
        }
        self.require_friendly_unit(id, false)?;
        if self.unit(id).assigned_attack == 0 {
            return Err(GameError::invalid("Not assigned.").with_detail(self.describe(id)));
        }
        // Only the partially absorbing blocker may give attack back once the
        // whole pool has been soaked up.
        let absorber = self.absorber();
        Ok(self.attack_of(self.villain()) > 0 || absorber.is_none() || absorber == Some(id))
    }

    pub fn cancel_assign_defense(&mut self, id: UnitId) -> GameResult<()> {
        if !self.can_cancel_assign_defense(id)? {
            return Err(unavailable(self.describe(id)));
        }
        let amount = self.unit(id).assigned_attack;
        self.add_attack(amount, self.villain())?;
        self.unit_mut(id).assigned_attack = 0;
        Ok(())
    }

    pub fn end_defense(&mut self) -> GameResult<()> {
        if !self.in_defense_phase {
            return Err(GameError::invalid("Not in defense phase."));
        }
        if self.attack_of(self.villain()) > 0 {
            return Err(GameError::invalid("Ended defense with unassigned attack."));
        }
        self.in_defense_phase = false;
        self.run_start_turn()
    }

    // Purchase

    pub fn can_purchase(&self, name: &str) -> GameResult<bool> {
        self.require_action_phase()?;
        let blueprint = self
            .blueprint_for_name(name)
            .ok_or_else(|| GameError::invalid("Blueprint not found.").with_detail(name))?;

        let in_supply = self
            .supply(self.active_player, &blueprint.name)
            .is_some_and(|s| s.available());
        if !in_supply {
            return Ok(false);
        }
        if let Some(cost) = &blueprint.buy_cost {
            if !self.can_remove_resources(cost, self.active_player) {
                return Ok(false);
            }
        }
        if let Some(rules) = &blueprint.buy_sac {
            if !self.can_sacrifice_units(rules) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Buy one unit of `name`, returning the new unit.
    pub fn purchase(&mut self, name: &str) -> GameResult<UnitId> {
        if !self.can_purchase(name)? {
            return Err(unavailable(name));
        }
        let blueprint = self
            .blueprint_for_name(name)
            .ok_or_else(|| GameError::data("Blueprint not found.").with_detail(name))?;

        let player = self.active_player;
        self.supplies[player.index()]
            .get_mut(&blueprint.name)
            .ok_or_else(|| GameError::invalid("Not in supply.").with_detail(name))?
            .take()?;

        if let Some(cost) = &blueprint.buy_cost {
            self.remove_resources(cost, player)?;
        }
        if let Some(rules) = &blueprint.buy_sac {
            self.sacrifice_units(rules)?;
        }

        let id = self.construct_unit(blueprint.clone(), None, player, None)?;
        self.unit_mut(id).purchased = true;
        if let Some(script) = &blueprint.buy_script {
            self.run_script(id, script)?;
        }
        for other in self.slate_all() {
            if self.unit(other).constructed_by == Some(id) {
                self.unit_mut(other).purchased = true;
            }
        }
        log::debug!("{} purchased {}", player, self.describe(id));
        Ok(id)
    }

    pub fn can_cancel_purchase(&self, id: UnitId) -> GameResult<bool> {
        self.require_action_phase()?;
        self.require_friendly_unit(id, false)?;
        let unit = self.unit(id);
        if !unit.purchased_this_turn() {
            return Err(GameError::invalid("Not purchased this turn.").with_detail(self.describe(id)));
        }
        Ok(unit
            .blueprint()
            .buy_script
            .as_ref()
            .map_or(true, |script| self.can_reverse_script(script)))
    }

    pub fn cancel_purchase(&mut self, id: UnitId) -> GameResult<()> {
        if !self.can_cancel_purchase(id)? {
            return Err(unavailable(self.describe(id)));
        }
        let blueprint = self.unit(id).blueprint().clone();
        let player = self.unit(id).player;

        if let Some(supply) = self.supplies[player.index()].get_mut(&blueprint.name) {
            supply.give_back();
        }
        if let Some(cost) = &blueprint.buy_cost {
            self.add_resources(cost, player)?;
        }
        if let Some(rules) = &blueprint.buy_sac {
            self.cancel_sacrifice_units(rules)?;
        }
        if let Some(script) = &blueprint.buy_script {
            self.reverse_script(id, script)?;
        }
        // Not a destruction in game terms, so no event.
        self.unit_mut(id).destroyed = true;
        Ok(())
    }

    // Abilities

    fn netherfy_candidates(&self) -> Vec<UnitId> {
        self.slate(self.villain())
            .into_iter()
            .filter(|&id| {
                let u = self.unit(id);
                u.name() == NETHERFY_PREY
                    && !u.sacrificed
                    && (!u.is_delayed() || !u.purchased)
                    && !u.blocking()
            })
            .collect()
    }

    fn disrupt_amount(&self, id: UnitId) -> GameResult<i32> {
        match self.unit(id).blueprint().target_amount {
            Some(amount) if amount > 0 => Ok(amount),
            _ => Err(GameError::data("Invalid target amount.").with_detail(self.describe(id))),
        }
    }

    pub fn can_use_ability(&self, id: UnitId, target: Option<UnitId>) -> GameResult<bool> {
        self.require_action_phase()?;
        self.require_friendly_unit(id, false)?;
        let unit = self.unit(id);
        let blueprint = unit.blueprint();
        if !blueprint.has_ability() {
            return Err(GameError::invalid("Unit has no ability.").with_detail(self.describe(id)));
        }
        if unit.ability_used {
            return Err(
                GameError::invalid("Unit's ability already used.").with_detail(self.describe(id))
            );
        }
        if unit.charge == Some(0) {
            return Err(GameError::invalid("No stamina.").with_detail(self.describe(id)));
        }

        if let Some(cost) = &blueprint.ability_cost {
            if !self.can_remove_resources(cost, self.active_player) {
                return Ok(false);
            }
        }
        if let Some(rules) = &blueprint.ability_sac {
            if !self.can_sacrifice_units(rules) {
                return Ok(false);
            }
        }
        if unit.toughness < blueprint.hp_used {
            return Ok(false);
        }
        if blueprint.ability_netherfy && self.netherfy_candidates().is_empty() {
            return Ok(false);
        }

        let Some(action) = &blueprint.target_action else {
            if target.is_some() {
                return Err(GameError::invalid("Target given, but no target action.")
                    .with_detail(self.describe(id)));
            }
            return Ok(true);
        };

        let target = self.require_enemy_unit(target, true)?;
        if !self
            .unit(target)
            .valid_target(action, blueprint.condition.as_ref())?
        {
            return Err(GameError::invalid("Invalid target.").with_detail(self.describe(target)));
        }

        match action {
            TargetAction::Disrupt => {
                self.disrupt_amount(id)?;
                Ok(!self.unit(target).frozen())
            }
            TargetAction::Snipe => Ok(!self.unit(target).sacrificed),
            TargetAction::Unknown(name) => {
                Err(GameError::data("Unknown target action.").with_detail(name))
            }
        }
    }

    pub fn use_ability(&mut self, id: UnitId, target: Option<UnitId>) -> GameResult<()> {
        if !self.can_use_ability(id, target)? {
            return Err(unavailable(self.describe(id)));
        }
        let blueprint = self.unit(id).blueprint().clone();
        let player = self.active_player;

        self.unit_mut(id).ability_used = true;
        if let Some(cost) = &blueprint.ability_cost {
            self.remove_resources(cost, player)?;
        }
        if let Some(rules) = &blueprint.ability_sac {
            self.sacrifice_units(rules)?;
        }
        self.unit_mut(id).toughness -= blueprint.hp_used;

        if blueprint.ability_netherfy {
            let mut candidates = self.netherfy_candidates();
            // Finished drones go before ones still building.
            candidates.sort_by_key(|&c| std::cmp::Reverse(self.unit(c).delay.unwrap_or(0)));
            let prey = candidates
                .pop()
                .ok_or_else(|| GameError::invalid("No drone to netherfy."))?;
            self.unit_mut(prey).sacrificed = true;
        }

        if let Some(script) = &blueprint.ability_script {
            self.run_script(id, script)?;
        }
        let unit = self.unit_mut(id);
        if let Some(charge) = unit.charge.filter(|&c| c > 0) {
            unit.charge = Some(charge - 1);
        }

        let Some(action) = &blueprint.target_action else {
            return Ok(());
        };
        let target = target.ok_or_else(|| GameError::invalid("No unit given."))?;
        self.unit_mut(target).targeted_by.push(id);
        match action {
            TargetAction::Disrupt => {
                if self.unit(target).frozen() {
                    return Err(
                        GameError::invalid("Target already frozen.").with_detail(self.describe(target))
                    );
                }
                let amount = self.disrupt_amount(id)?;
                self.unit_mut(target).disruption += amount;
            }
            TargetAction::Snipe => {
                if self.unit(target).sacrificed {
                    return Err(GameError::invalid("Target has been sacrificed.")
                        .with_detail(self.describe(target)));
                }
                self.unit_mut(target).sacrificed = true;
            }
            TargetAction::Unknown(name) => {
                return Err(GameError::data("Unknown target action.").with_detail(name));
            }
        }
        Ok(())
    }

    pub fn can_cancel_use_ability(&self, id: UnitId) -> GameResult<bool> {
        self.require_action_phase()?;
        self.require_friendly_unit(id, true)?;
        let unit = self.unit(id);
        let blueprint = unit.blueprint();
        if !blueprint.has_ability() {
            return Err(GameError::invalid("Unit has no ability.").with_detail(self.describe(id)));
        }
        if !unit.ability_used {
            return Err(GameError::invalid("Unit's ability not used.").with_detail(self.describe(id)));
        }
        if let Some(script) = &blueprint.ability_script {
            if !self.can_reverse_script(script) {
                return Ok(false);
            }
        }

        let Some(action) = &blueprint.target_action else {
            return Ok(true);
        };
        let target = self
            .targeted_unit(id)
            .ok_or_else(|| GameError::invalid("No target found.").with_detail(self.describe(id)))?;
        self.require_enemy_unit(Some(target), true)?;
        if !self
            .unit(target)
            .valid_target(action, blueprint.condition.as_ref())?
        {
            return Err(GameError::invalid("Invalid target.").with_detail(self.describe(target)));
        }

        match action {
            TargetAction::Disrupt => {
                let amount = self.disrupt_amount(id)?;
                if self.unit(target).disruption < amount {
                    return Err(GameError::invalid("Not enough existing chill.")
                        .with_detail(self.describe(target)));
                }
            }
            TargetAction::Snipe => {
                if !self.unit(target).sacrificed {
                    return Err(GameError::invalid("Not sacrificed.").with_detail(self.describe(target)));
                }
            }
            TargetAction::Unknown(name) => {
                return Err(GameError::data("Unknown target action.").with_detail(name));
            }
        }
        Ok(true)
    }

    pub fn cancel_use_ability(&mut self, id: UnitId) -> GameResult<()> {
        if !self.can_cancel_use_ability(id)? {
            return Err(unavailable(self.describe(id)));
        }
        let blueprint = self.unit(id).blueprint().clone();
        let player = self.active_player;

        if let Some(script) = &blueprint.ability_script {
            self.reverse_script(id, script)?;
        }
        if blueprint.ability_netherfy {
            let prey = self
                .slate(self.villain())
                .into_iter()
                .find(|&c| {
                    let u = self.unit(c);
                    u.name() == NETHERFY_PREY && u.sacrificed
                })
                .ok_or_else(|| GameError::invalid("No sniped drone found."))?;
            self.unit_mut(prey).sacrificed = false;
        }
        if let Some(cost) = &blueprint.ability_cost {
            self.add_resources(cost, player)?;
        }
        if let Some(rules) = &blueprint.ability_sac {
            self.cancel_sacrifice_units(rules)?;
        }
        let unit = self.unit_mut(id);
        unit.toughness += blueprint.hp_used;
        if let Some(charge) = unit.charge {
            unit.charge = Some(charge + 1);
        }
        unit.ability_used = false;

        let Some(action) = &blueprint.target_action else {
            return Ok(());
        };
        let target = self
            .targeted_unit(id)
            .ok_or_else(|| GameError::invalid("No target found.").with_detail(self.describe(id)))?;
        let target_unit = self.unit_mut(target);
        if let Some(pos) = target_unit.targeted_by.iter().position(|&s| s == id) {
            target_unit.targeted_by.remove(pos);
        }
        match action {
            TargetAction::Disrupt => {
                let amount = self.disrupt_amount(id)?;
                self.unit_mut(target).disruption -= amount;
            }
            TargetAction::Snipe => self.unit_mut(target).sacrificed = false,
            TargetAction::Unknown(name) => {
                return Err(GameError::data("Unknown target action.").with_detail(name));
            }
        }
        Ok(())
    }

    // Attack

    pub fn can_overrun_defenses(&self) -> GameResult<bool> {
        self.require_action_phase()?;
        if self.defenses_overran() {
            return Err(GameError::invalid("Defenses already overran."));
        }
        let total_defense: i32 = self
            .blockers(self.villain())
            .into_iter()
            .map(|id| self.unit(id))
            .filter(|u| u.assigned_attack == 0)
            .map(|u| u.toughness)
            .sum();
        Ok(self.attack() >= total_defense.max(1))
    }

    /// Allocate full damage to every enemy blocker not already bypassed.
    pub fn overrun_defenses(&mut self) -> GameResult<()> {
        self.require_action_phase()?;
        if self.defenses_overran() {
            return Err(GameError::invalid("Defenses already overran."));
        }
        for id in self.overrun_targets() {
            if self.unit(id).assigned_attack > 0 {
                return Err(GameError::invalid("Blocker already assigned.").with_detail(self.describe(id)));
            }
            self.emit(GameEvent::AssignAttackBlocker { unit: id });
            let toughness = self.unit(id).toughness;
            self.remove_attack(toughness, self.active_player)?;
            self.unit_mut(id).assigned_attack = toughness;
        }
        Ok(())
    }

    pub fn cancel_overrun_defenses(&mut self) -> GameResult<()> {
        self.require_action_phase()?;
        if !self.defenses_overran() {
            return Err(GameError::invalid("Defenses not overran."));
        }
        for id in self.overrun_targets() {
            let amount = self.unit(id).assigned_attack;
            self.add_attack(amount, self.active_player)?;
            self.unit_mut(id).assigned_attack = 0;
        }
        Ok(())
    }

    fn overrun_targets(&self) -> Vec<UnitId> {
        self.blockers(self.villain())
            .into_iter()
            .filter(|&id| !self.unit(id).defenses_bypassed)
            .collect()
    }

    pub fn can_assign_attack(&self, id: UnitId) -> GameResult<bool> {
        self.require_action_phase()?;
        self.require_enemy_unit(Some(id), false)?;
        let unit = self.unit(id);
        if !self.defenses_overran() && !unit.blueprint().undefendable {
            return Err(GameError::invalid("Can not target unit before defenses are overrun.")
                .with_detail(self.describe(id)));
        }
        if unit.assigned_attack > 0 {
            return Err(GameError::invalid("Unit already targeted.").with_detail(self.describe(id)));
        }
        if unit.toughness <= 0 {
            return Err(GameError::invalid("Unit has no health.").with_detail(self.describe(id)));
        }
        let needed = if unit.blueprint().fragile {
            1
        } else {
            unit.toughness
        };
        Ok(self.attack() >= needed)
    }

    pub fn assign_attack(&mut self, id: UnitId) -> GameResult<()> {
        if !self.can_assign_attack(id)? {
            return Err(unavailable(self.describe(id)));
        }
        if !self.defenses_overran() {
            self.unit_mut(id).defenses_bypassed = true;
        }
        let amount = self.unit(id).toughness.min(self.attack());
        self.remove_attack(amount, self.active_player)?;
        self.unit_mut(id).assigned_attack = amount;
        Ok(())
    }

    pub fn can_cancel_assign_attack(&self, id: UnitId) -> GameResult<bool> {
        self.require_action_phase()?;
        self.require_enemy_unit(Some(id), true)?;
        let unit = self.unit(id);
        if self.defenses_overran() && unit.blocking() && !unit.frozen() {
            return Err(GameError::invalid("Can not cancel attack on blocker after overran.")
                .with_detail(self.describe(id)));
        }
        Ok(unit.assigned_attack > 0)
    }

    pub fn cancel_assign_attack(&mut self, id: UnitId) -> GameResult<()> {
        if !self.can_cancel_assign_attack(id)? {
            return Err(unavailable(self.describe(id)));
        }
        // A snipe on a damaged unit is only legal because of that damage.
        for source in self.unit(id).targeted_by.clone() {
            if self.unit(source).target_action() == Some(&TargetAction::Snipe) {
                self.emit(GameEvent::AutoAction {
                    action: ActionKind::CancelUseAbility,
                    unit: source,
                });
                self.cancel_use_ability(source)?;
            }
        }
        if self.unit(id).sacrificed {
            return Err(GameError::invalid("Sacrificed unit").with_detail(self.describe(id)));
        }

        let unit = self.unit_mut(id);
        let amount = unit.assigned_attack;
        unit.assigned_attack = 0;
        unit.defenses_bypassed = false;
        self.add_attack(amount, self.active_player)
    }
}

#[cfg(test)]
mod tests {
    use crate::blueprint::{Blueprint, Condition, CreateRule, SacrificeRule, Script, TargetAction};
    use crate::error::GameError;
    use crate::events::GameEvent;
    use crate::resources::Resources;
    use crate::state::Supply;
    use crate::testing::GameStateBuilder;
    use crate::unit::{Player, UnitId};

    fn wall(toughness: i32) -> Blueprint {
        Blueprint {
            default_blocking: true,
            toughness,
            ..Blueprint::new("Wall")
        }
    }

    fn drone() -> Blueprint {
        Blueprint {
            buy_cost: Some(Resources::parse("3")),
            ability_script: Some(Script {
                receive: Some(Resources::parse("1")),
                ..Script::default()
            }),
            rarity: Some("trinket".into()),
            ..Blueprint::new("Drone")
        }
    }

    #[test]
    fn test_defense_assign_and_cancel() {
        let (mut state, ids) = GameStateBuilder::new()
            .blueprint(wall(3))
            .unit(Player::First, "Wall")
            .attack(Player::Second, 5)
            .defense_phase()
            .build_with_ids();

        assert_eq!(state.can_assign_defense(ids[0]), Ok(true));
        state.assign_defense(ids[0]).unwrap();
        assert_eq!(state.unit(ids[0]).assigned_attack, 3);
        assert_eq!(state.attack_of(Player::Second), 2);
        assert!(state.end_defense().is_err());

        state.cancel_assign_defense(ids[0]).unwrap();
        assert_eq!(state.unit(ids[0]).assigned_attack, 0);
        assert_eq!(state.attack_of(Player::Second), 5);
    }

    #[test]
    fn test_only_absorber_may_cancel_after_soak() {
        let (mut state, ids) = GameStateBuilder::new()
            .blueprint(wall(3))
            .unit(Player::First, "Wall")
            .unit(Player::First, "Wall")
            .attack(Player::Second, 4)
            .defense_phase()
            .build_with_ids();
        state.assign_defense(ids[0]).unwrap();
        state.assign_defense(ids[1]).unwrap();
        assert_eq!(state.absorber(), Some(ids[1]));
        assert_eq!(state.can_cancel_assign_defense(ids[0]), Ok(false));
        assert_eq!(state.can_cancel_assign_defense(ids[1]), Ok(true));

        state.end_defense().unwrap();
        assert!(!state.in_defense_phase());
        assert!(state.unit(ids[0]).destroyed);
        assert!(!state.unit(ids[1]).destroyed);
    }

    #[test]
    fn test_assign_defense_requires_defense_phase() {
        let (state, ids) = GameStateBuilder::new()
            .blueprint(wall(3))
            .unit(Player::First, "Wall")
            .build_with_ids();
        assert!(state.can_assign_defense(ids[0]).is_err());
    }

    #[test]
    fn test_purchase_pays_and_consumes_supply() {
        let mut state = GameStateBuilder::new()
            .blueprint(Blueprint {
                buy_cost: Some(Resources::parse("3GG")),
                rarity: Some("rare".into()),
                ..Blueprint::new("Tarsier")
            })
            .supply(Player::First, "Tarsier", Supply::Limited(4))
            .resources(Player::First, "5GGG")
            .build();

        assert_eq!(state.can_purchase("Tarsier"), Ok(true));
        let id = state.purchase("Tarsier").unwrap();
        assert_eq!(state.supply(Player::First, "Tarsier"), Some(Supply::Limited(3)));
        assert_eq!(*state.resources(Player::First), Resources::parse("2G"));
        let unit = state.unit(id);
        assert!(unit.purchased);
        assert!(unit.building);
        assert_eq!(unit.delay, Some(1));
        assert_eq!(state.can_purchase("Tarsier"), Ok(false));
        assert!(state.can_purchase("Nope").is_err());
    }

    #[test]
    fn test_cancel_purchase_restores_everything() {
        let mut state = GameStateBuilder::new()
            .blueprint(Blueprint {
                build_time: 0,
                ..drone()
            })
            .blueprint(Blueprint {
                buy_cost: Some(Resources::parse("2")),
                buy_sac: Some(vec![SacrificeRule {
                    unit_name: "Drone".into(),
                    count: 1,
                }]),
                buy_script: Some(Script {
                    create: vec![CreateRule {
                        unit_name: "Drone".into(),
                        for_opponent: true,
                        count: 1,
                        build_time: 1,
                        lifespan: None,
                    }],
                    ..Script::default()
                }),
                ..Blueprint::new("Gift")
            })
            .unit(Player::First, "Drone")
            .supply(Player::First, "Gift", Supply::Limited(2))
            .resources(Player::First, "4")
            .build();
        let before = state.snapshot();

        let gift = state.purchase("Gift").unwrap();
        assert_eq!(state.slate(Player::Second).len(), 1);
        assert!(state.units()[0].sacrificed);

        state.cancel_purchase(gift).unwrap();
        assert_eq!(state.resources(Player::First), &before.resources[0]);
        assert_eq!(state.supply(Player::First, "Gift"), Some(Supply::Limited(2)));
        assert_eq!(state.slate_all(), vec![UnitId(0)]);
        assert!(!state.units()[0].sacrificed);
    }

    #[test]
    fn test_cancel_purchase_needs_fresh_unit() {
        let (state, ids) = GameStateBuilder::new()
            .blueprint(drone())
            .unit(Player::First, "Drone")
            .build_with_ids();
        assert!(state.can_cancel_purchase(ids[0]).is_err());
    }

    #[test]
    fn test_ability_use_and_cancel() {
        let (mut state, ids) = GameStateBuilder::new()
            .blueprint(drone())
            .unit(Player::First, "Drone")
            .build_with_ids();
        state.use_ability(ids[0], None).unwrap();
        assert_eq!(state.resources(Player::First).gold, 1);
        assert!(state.can_use_ability(ids[0], None).is_err());

        state.cancel_use_ability(ids[0]).unwrap();
        assert_eq!(state.resources(Player::First).gold, 0);
        assert!(!state.unit(ids[0]).ability_used);
        assert!(state.use_ability(ids[0], Some(ids[0])).is_err());
    }

    #[test]
    fn test_charge_is_consumed() {
        let (mut state, ids) = GameStateBuilder::new()
            .blueprint(Blueprint {
                charge: Some(1),
                ..drone()
            })
            .unit(Player::First, "Drone")
            .build_with_ids();
        state.use_ability(ids[0], None).unwrap();
        assert_eq!(state.unit(ids[0]).charge, Some(0));
        state.cancel_use_ability(ids[0]).unwrap();
        assert_eq!(state.unit(ids[0]).charge, Some(1));
    }

    #[test]
    fn test_disrupt_freezes_blocker() {
        let (mut state, ids) = GameStateBuilder::new()
            .blueprint(wall(2))
            .blueprint(Blueprint {
                target_action: Some(TargetAction::Disrupt),
                target_amount: Some(2),
                ..Blueprint::new("Frost Brooder")
            })
            .unit(Player::First, "Frost Brooder")
            .unit(Player::Second, "Wall")
            .build_with_ids();
        let (brooder, target) = (ids[0], ids[1]);

        assert_eq!(state.can_use_ability(brooder, Some(target)), Ok(true));
        state.use_ability(brooder, Some(target)).unwrap();
        assert!(state.unit(target).frozen());
        assert_eq!(state.targeted_unit(brooder), Some(target));
        assert!(state.blockers(Player::Second).is_empty());

        state.cancel_use_ability(brooder).unwrap();
        assert_eq!(state.unit(target).disruption, 0);
        assert!(state.unit(target).targeted_by.is_empty());
    }

    #[test]
    fn test_disrupt_without_amount_is_data_error() {
        let (state, ids) = GameStateBuilder::new()
            .blueprint(wall(2))
            .blueprint(Blueprint {
                target_action: Some(TargetAction::Disrupt),
                ..Blueprint::new("Frost Brooder")
            })
            .unit(Player::First, "Frost Brooder")
            .unit(Player::Second, "Wall")
            .build_with_ids();
        assert!(matches!(
            state.can_use_ability(ids[0], Some(ids[1])),
            Err(GameError::Data { .. })
        ));
    }

    #[test]
    fn test_snipe_sacrifices_target() {
        let (mut state, ids) = GameStateBuilder::new()
            .blueprint(Blueprint {
                build_time: 0,
                ..Blueprint::new("Engineer")
            })
            .blueprint(Blueprint {
                target_action: Some(TargetAction::Snipe),
                condition: Some(Condition {
                    health_at_most: Some(1),
                    ..Condition::default()
                }),
                ..Blueprint::new("Apollo")
            })
            .unit(Player::First, "Apollo")
            .unit(Player::Second, "Engineer")
            .build_with_ids();
        state.use_ability(ids[0], Some(ids[1])).unwrap();
        assert!(state.unit(ids[1]).sacrificed);
        assert_eq!(state.can_cancel_use_ability(ids[0]), Ok(true));
        state.cancel_use_ability(ids[0]).unwrap();
        assert!(!state.unit(ids[1]).sacrificed);
    }

    #[test]
    fn test_overrun_then_attack_breach() {
        let (mut state, ids) = GameStateBuilder::new()
            .blueprint(wall(2))
            .blueprint(Blueprint {
                toughness: 3,
                ..Blueprint::new("Drone")
            })
            .unit(Player::Second, "Wall")
            .unit(Player::Second, "Drone")
            .attack(Player::First, 6)
            .build_with_ids();
        let (blocker, drone) = (ids[0], ids[1]);

        assert!(state.can_assign_attack(drone).is_err());
        assert_eq!(state.can_overrun_defenses(), Ok(true));
        state.overrun_defenses().unwrap();
        assert!(state.defenses_overran());
        assert_eq!(state.attack(), 4);
        assert_eq!(
            state.drain_events(),
            vec![GameEvent::AssignAttackBlocker { unit: blocker }]
        );
        assert!(state.can_cancel_assign_attack(blocker).is_err());

        state.assign_attack(drone).unwrap();
        assert_eq!(state.unit(drone).assigned_attack, 3);
        assert!(state.breaching());
        assert!(state.can_overkill());

        state.cancel_assign_attack(drone).unwrap();
        state.cancel_overrun_defenses().unwrap();
        assert_eq!(state.attack(), 6);
        assert!(!state.defenses_overran());
    }

    #[test]
    fn test_more_attack_releases_partial_breach() {
        let (mut state, ids) = GameStateBuilder::new()
            .blueprint(Blueprint {
                fragile: true,
                toughness: 5,
                ..Blueprint::new("Forcefield")
            })
            .unit(Player::Second, "Forcefield")
            .attack(Player::First, 2)
            .build_with_ids();
        state.assign_attack(ids[0]).unwrap();
        assert_eq!(state.breach_absorber(), Some(ids[0]));

        state.add_attack(1, Player::First).unwrap();
        assert_eq!(state.unit(ids[0]).assigned_attack, 0);
        assert_eq!(state.attack(), 3);
    }

    #[test]
    fn test_frontline_attack_before_overrun() {
        let (mut state, ids) = GameStateBuilder::new()
            .blueprint(wall(4))
            .blueprint(Blueprint {
                undefendable: true,
                toughness: 2,
                ..Blueprint::new("Gauss Charge")
            })
            .unit(Player::Second, "Wall")
            .unit(Player::Second, "Gauss Charge")
            .attack(Player::First, 2)
            .build_with_ids();
        assert_eq!(state.can_assign_attack(ids[1]), Ok(true));
        state.assign_attack(ids[1]).unwrap();
        assert!(state.unit(ids[1]).defenses_bypassed);
        assert_eq!(state.attack(), 0);
    }
}
