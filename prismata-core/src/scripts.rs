//! Scripted effects and sacrifice costs.

use crate::blueprint::{SacrificeRule, Script};
use crate::error::{GameError, GameResult};
use crate::events::{DestroyReason, GameEvent};
use crate::state::GameState;
use crate::unit::{Player, UnitId};

impl GameState {
    /// Active-player units of `name` eligible as a sacrifice, best first.
    ///
    /// Newest units come first, except that units whose ability was already
    /// used this turn are preferred over all others.
    pub(crate) fn sacrifice_list(&self, name: &str) -> Vec<UnitId> {
        let mut found: Vec<UnitId> = self
            .slate(self.active_player)
            .into_iter()
            .filter(|&id| {
                let u = self.unit(id);
                !u.sacrificed && u.name() == name && !u.is_delayed()
            })
            .collect();
        found.reverse();
        // sort_by_key is stable
        found.sort_by_key(|&id| !self.unit(id).ability_used);
        found
    }

    pub(crate) fn can_sacrifice_units(&self, rules: &[SacrificeRule]) -> bool {
        rules
            .iter()
            .all(|rule| self.sacrifice_list(&rule.unit_name).len() >= rule.count as usize)
    }

    pub(crate) fn sacrifice_units(&mut self, rules: &[SacrificeRule]) -> GameResult<()> {
        for rule in rules {
            let targets = self.sacrifice_list(&rule.unit_name);
            if targets.len() < rule.count as usize {
                return Err(GameError::invalid("Not enough units to sacrifice.")
                    .with_detail(&rule.unit_name));
            }
            for id in targets.into_iter().take(rule.count as usize) {
                let unit = self.unit(id);
                // Blockers with an ability fire it on the way out.
                if unit.blueprint().default_blocking
                    && unit.blueprint().ability_script.is_some()
                    && !unit.ability_used
                {
                    self.use_ability(id, None)?;
                }
                self.unit_mut(id).sacrificed = true;
            }
        }
        Ok(())
    }

    pub(crate) fn cancel_sacrifice_units(&mut self, rules: &[SacrificeRule]) -> GameResult<()> {
        for rule in rules {
            for _ in 0..rule.count {
                let found = self
                    .slate(self.active_player)
                    .into_iter()
                    .find(|&id| {
                        let u = self.unit(id);
                        u.name() == rule.unit_name && u.sacrificed
                    })
                    .ok_or_else(|| {
                        GameError::invalid("No unit found to cancel ability sacrifice.")
                            .with_detail(&rule.unit_name)
                    })?;
                self.unit_mut(found).sacrificed = false;
            }
        }
        Ok(())
    }

    fn script_target(&self, for_opponent: bool) -> Player {
        if for_opponent {
            self.villain()
        } else {
            self.active_player
        }
    }

    pub(crate) fn run_script(&mut self, owner: UnitId, script: &Script) -> GameResult<()> {
        for rule in &script.create {
            let blueprint = self
                .blueprint_for_name(&rule.unit_name)
                .ok_or_else(|| GameError::data("Blueprint not found.").with_detail(&rule.unit_name))?;
            let player = self.script_target(rule.for_opponent);
            for _ in 0..rule.count {
                let id = self.construct_unit(
                    blueprint.clone(),
                    Some(rule.build_time),
                    player,
                    rule.lifespan,
                )?;
                self.unit_mut(id).constructed_by = Some(owner);
                self.emit(GameEvent::UnitConstructed { unit: id, by: owner });
            }
        }

        if let Some(delay) = script.delay {
            self.unit_mut(owner).delay = Some(delay);
        }
        if let Some(receive) = &script.receive {
            self.add_resources(receive, self.active_player)?;
        }
        if script.selfsac {
            self.unit_mut(owner).sacrificed = true;
        }
        Ok(())
    }

    pub(crate) fn can_reverse_script(&self, script: &Script) -> bool {
        script
            .receive
            .as_ref()
            .map_or(true, |r| self.can_remove_resources(r, self.active_player))
    }

    pub(crate) fn reverse_script(&mut self, owner: UnitId, script: &Script) -> GameResult<()> {
        for rule in &script.create {
            let player = self.script_target(rule.for_opponent);
            for _ in 0..rule.count {
                let found = self
                    .slate(player)
                    .into_iter()
                    .rev()
                    .find(|&id| {
                        let u = self.unit(id);
                        u.name() == rule.unit_name && u.constructed_by == Some(owner)
                    })
                    .ok_or_else(|| {
                        GameError::invalid("No unit to deconstruct.").with_detail(self.describe(owner))
                    })?;
                self.destroy_unit(found, DestroyReason::Deconstructed)?;
            }
        }

        if script.delay.is_some() {
            self.unit_mut(owner).delay = None;
        }
        if let Some(receive) = &script.receive {
            self.remove_resources(receive, self.active_player)?;
        }
        if script.selfsac {
            if !self.unit(owner).sacrificed {
                return Err(GameError::invalid("Not sacrificed.").with_detail(self.describe(owner)));
            }
            self.unit_mut(owner).sacrificed = false;
        }
        Ok(())
    }
}
