//! Start and end of turn processing.

use crate::error::{GameError, GameResult};
use crate::events::{DestroyReason, GameEvent};
use crate::state::GameState;
use crate::unit::Player;
use tracing::instrument;

impl GameState {
    /// Hand the turn to the other player.
    ///
    /// Enters the defense phase when the new active player faces attack,
    /// otherwise runs start-of-turn processing right away.
    #[instrument(skip_all, fields(turn = self.turn_number))]
    pub fn start_turn(&mut self) -> GameResult<()> {
        self.active_player = self.villain();
        if self.active_player == Player::First {
            self.turn_number += 1;
        }
        log::debug!("turn {} begins for {}", self.turn_number, self.active_player);
        self.emit(GameEvent::TurnStarted {
            turn_number: self.turn_number,
            player: self.active_player,
        });
        if self.attack_of(self.villain()) > 0 {
            self.in_defense_phase = true;
            Ok(())
        } else {
            self.run_start_turn()
        }
    }

    /// Finish the action phase. The turn itself passes with [`start_turn`](Self::start_turn).
    pub fn end_turn(&mut self) -> GameResult<()> {
        self.require_action_phase()?;
        self.run_end_turn()
    }

    pub(crate) fn run_start_turn(&mut self) -> GameResult<()> {
        for id in self.slate(self.active_player) {
            let unit = self.unit_mut(id);
            if unit.assigned_attack > 0 {
                if unit.assigned_attack >= unit.toughness {
                    self.destroy_unit(id, DestroyReason::Defense)?;
                    continue;
                }
                if unit.blueprint().fragile {
                    unit.toughness -= unit.assigned_attack;
                }
                unit.assigned_attack = 0;
            }
            unit.toughness = (unit.toughness + unit.blueprint().hp_gained)
                .min(unit.blueprint().max_health());

            if !unit.is_delayed() {
                if let Some(lifespan) = unit.lifespan.filter(|&l| l > 0) {
                    unit.lifespan = Some(lifespan - 1);
                    if lifespan == 1 {
                        self.destroy_unit(id, DestroyReason::Lifespan)?;
                        continue;
                    }
                }
            }

            unit.disruption = 0;
            unit.ability_used = false;
            match unit.delay {
                Some(delay) if delay > 0 => {
                    if delay <= 1 {
                        unit.delay = None;
                        unit.building = false;
                        unit.purchased = false;
                    } else {
                        unit.delay = Some(delay - 1);
                    }
                }
                _ => unit.purchased = false,
            }
        }

        let ready: Vec<_> = self
            .slate(self.active_player)
            .into_iter()
            .filter(|&id| !self.unit(id).is_delayed())
            .collect();
        for id in ready {
            let blueprint = self.unit(id).blueprint().clone();
            let player = self.unit(id).player;
            if let Some(script) = &blueprint.begin_own_turn_script {
                self.run_script(id, script)?;
            }
            if let Some(name) = &blueprint.gold_resonate {
                let count = self.count_ready(player, name);
                self.resources[player.index()].gold += count;
            }
            if let Some(name) = &blueprint.resonate {
                let count = self.count_ready(player, name);
                self.add_attack(count, self.active_player)?;
            }
        }
        Ok(())
    }

    fn count_ready(&self, player: Player, name: &str) -> i32 {
        let count = self
            .slate(player)
            .into_iter()
            .filter(|&id| {
                let u = self.unit(id);
                !u.is_delayed() && u.name() == name
            })
            .count();
        i32::try_from(count).unwrap_or(i32::MAX)
    }

    pub(crate) fn run_end_turn(&mut self) -> GameResult<()> {
        let bank = &mut self.resources[self.active_player.index()];
        bank.blue = 0;
        bank.red = 0;
        bank.energy = 0;

        for id in self.slate_all() {
            let unit = self.unit(id);
            let reason = if unit.toughness == 0 {
                Some(DestroyReason::NoHealth)
            } else if unit.blueprint().spell {
                Some(DestroyReason::Spell)
            } else if unit.assigned_attack >= unit.toughness {
                Some(DestroyReason::Attack)
            } else if unit.sacrificed {
                Some(DestroyReason::Sacrificed)
            } else {
                None
            };
            if let Some(reason) = reason {
                self.destroy_unit(id, reason)?;
            }
            let unit = self.unit_mut(id);
            unit.sacrificed = false;
            unit.constructed_by = None;
            unit.targeted_by.clear();
        }

        let attack = self.attack();
        if self.defenses_overran() && attack > 0 {
            // FIXME: leftover attack with nothing worth killing is overkill and
            // should be dropped even when a cheap target remains.
            let wasted = self.slate(self.villain()).into_iter().any(|id| {
                let u = self.unit(id);
                !u.purchased
                    && u.assigned_attack == 0
                    && (u.blueprint().fragile || u.toughness < attack)
            });
            if wasted {
                return Err(GameError::invalid("Attack left unassigned after defenses overran."));
            }
            self.remove_attack(attack, self.active_player)?;
        }
        Ok(())
    }
}
