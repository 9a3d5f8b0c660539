use crate::blueprint::Blueprint;
use crate::resources::Resources;
use crate::state::{GameState, Supply};
use crate::unit::{Player, Unit, UnitId};
use std::sync::Arc;

/// Builds a mid-game [`GameState`] directly, skipping `init`.
///
/// Units are created ready (no build delay) unless added through
/// [`building_unit`](Self::building_unit). Player one is active and the
/// game is in its action phase on turn 1.
pub struct GameStateBuilder {
    state: GameState,
    pending: Vec<(Player, String, Option<i32>)>,
}

impl GameStateBuilder {
    pub fn new() -> Self {
        let mut state = GameState::new();
        state.turn_number = 1;
        Self {
            state,
            pending: Vec::new(),
        }
    }

    pub fn blueprint(mut self, blueprint: Blueprint) -> Self {
        self.state.deck.push(Arc::new(blueprint));
        self
    }

    pub fn unit(mut self, player: Player, name: &str) -> Self {
        self.pending.push((player, name.to_string(), None));
        self
    }

    pub fn building_unit(mut self, player: Player, name: &str, delay: i32) -> Self {
        self.pending.push((player, name.to_string(), Some(delay)));
        self
    }

    pub fn resources(mut self, player: Player, amount: &str) -> Self {
        self.state.resources[player.index()] = Resources::parse(amount);
        self
    }

    pub fn attack(mut self, player: Player, amount: i32) -> Self {
        self.state.resources[player.index()].attack = amount;
        self
    }

    pub fn supply(mut self, player: Player, name: &str, supply: Supply) -> Self {
        self.state.supplies[player.index()].insert(name.to_string(), supply);
        self
    }

    pub fn active(mut self, player: Player) -> Self {
        self.state.active_player = player;
        self
    }

    pub fn defense_phase(mut self) -> Self {
        self.state.in_defense_phase = true;
        self
    }

    pub fn build(self) -> GameState {
        self.build_with_ids().0
    }

    /// Build and also return the ids of the added units, in insertion order.
    ///
    /// Panics if a unit names a blueprint that was not added.
    pub fn build_with_ids(self) -> (GameState, Vec<UnitId>) {
        let mut state = self.state;
        let mut ids = Vec::with_capacity(self.pending.len());
        for (player, name, delay) in self.pending {
            let blueprint = state
                .blueprint_for_name(&name)
                .unwrap_or_else(|| panic!("no blueprint named {name}"));
            let mut unit = Unit::new(blueprint, player);
            if let Some(delay) = delay {
                unit.building = true;
                unit.delay = Some(delay);
            }
            state.units.push(unit);
            ids.push(UnitId(state.units.len() - 1));
        }
        (state, ids)
    }
}

impl Default for GameStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let (state, ids) = GameStateBuilder::default()
            .blueprint(Blueprint::new("Drone"))
            .unit(Player::Second, "Drone")
            .building_unit(Player::First, "Drone", 1)
            .resources(Player::First, "3G")
            .attack(Player::First, 2)
            .active(Player::Second)
            .build_with_ids();

        assert_eq!(ids, vec![UnitId(0), UnitId(1)]);
        assert_eq!(state.active_player(), Player::Second);
        assert_eq!(state.unit(ids[0]).delay, None);
        assert!(state.unit(ids[1]).is_delayed());
        assert_eq!(state.resources(Player::First).gold, 3);
        assert_eq!(state.attack_of(Player::First), 2);
    }
}
