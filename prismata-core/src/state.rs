//! Rules engine state: resources, supplies, the unit list and turn phase.
//!
//! Action methods live in [`crate::actions`], turn processing in
//! [`crate::turn`] and script/sacrifice handling in [`crate::scripts`]; they
//! all extend [`GameState`].

use crate::action::ActionKind;
use crate::blueprint::{Blueprint, TargetAction};
use crate::error::{GameError, GameResult};
use crate::events::{DestroyReason, GameEvent};
use crate::resources::Resources;
use crate::unit::{Player, Unit, UnitId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Remaining purchasable count of one blueprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Supply {
    Limited(u32),
    Unlimited,
}

impl Supply {
    /// Supply granted by a blueprint rarity.
    pub fn for_rarity(rarity: &str) -> Option<Self> {
        match rarity {
            "trinket" => Some(Supply::Limited(20)),
            "normal" => Some(Supply::Limited(10)),
            "rare" => Some(Supply::Limited(4)),
            "legendary" => Some(Supply::Limited(1)),
            _ => None,
        }
    }

    pub fn available(&self) -> bool {
        !matches!(self, Supply::Limited(0))
    }

    pub(crate) fn take(&mut self) -> GameResult<()> {
        match self {
            Supply::Limited(0) => Err(GameError::invalid("Supply exhausted.")),
            Supply::Limited(n) => {
                *n -= 1;
                Ok(())
            }
            Supply::Unlimited => Ok(()),
        }
    }

    pub(crate) fn give_back(&mut self) {
        if let Supply::Limited(n) = self {
            *n += 1;
        }
    }
}

pub type Supplies = FxHashMap<String, Supply>;

/// One entry of a purchasable set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckEntry {
    /// Supply taken from the blueprint rarity.
    Named(String),
    /// Supply given explicitly.
    Custom { name: String, supply: i64 },
}

impl DeckEntry {
    pub fn name(&self) -> &str {
        match self {
            DeckEntry::Named(name) => name,
            DeckEntry::Custom { name, .. } => name,
        }
    }
}

/// Everything needed to set up a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitialState {
    pub deck: Vec<Blueprint>,
    pub init_resources: [Resources; 2],
    /// `(count, blueprint name)` per player.
    pub init_cards: [Vec<(u32, String)>; 2],
    pub base_sets: [Vec<DeckEntry>; 2],
    pub random_sets: [Vec<DeckEntry>; 2],
    pub infinite_supplies: bool,
}

/// Deep, independent copy of all engine state.
///
/// Blueprints are shared through `Arc`; everything mutable is copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub deck: Vec<Arc<Blueprint>>,
    pub turn_number: u32,
    pub active_player: Player,
    pub in_defense_phase: bool,
    pub supplies: [Supplies; 2],
    pub resources: [Resources; 2],
    pub units: Vec<Unit>,
}

#[derive(Debug, Default)]
pub struct GameState {
    pub(crate) deck: Vec<Arc<Blueprint>>,
    pub(crate) turn_number: u32,
    pub(crate) active_player: Player,
    pub(crate) in_defense_phase: bool,
    pub(crate) supplies: [Supplies; 2],
    pub(crate) resources: [Resources; 2],
    pub(crate) units: Vec<Unit>,
    events: Vec<GameEvent>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up both players and run the first start-of-turn processing.
    pub fn init(&mut self, info: InitialState) -> GameResult<()> {
        if self.turn_number != 0 {
            return Err(GameError::invalid("Already initialized."));
        }

        self.resources = info.init_resources;
        self.deck = info.deck.into_iter().map(Arc::new).collect();
        self.supplies = Default::default();
        for player in [Player::First, Player::Second] {
            let i = player.index();
            self.init_player(
                player,
                &info.init_cards[i],
                info.base_sets[i].iter().chain(&info.random_sets[i]),
                info.infinite_supplies,
            )?;
        }

        self.turn_number = 1;
        self.active_player = Player::First;
        self.in_defense_phase = false;
        self.emit(GameEvent::TurnStarted {
            turn_number: self.turn_number,
            player: self.active_player,
        });
        self.run_start_turn()
    }

    fn init_player<'a>(
        &mut self,
        player: Player,
        cards: &[(u32, String)],
        sets: impl Iterator<Item = &'a DeckEntry>,
        infinite_supplies: bool,
    ) -> GameResult<()> {
        for entry in sets {
            let supply = match entry {
                DeckEntry::Custom { name, supply } => {
                    if *supply <= 0 {
                        return Err(GameError::data("Invalid set supply.").with_detail(name));
                    }
                    Supply::Limited(u32::try_from(*supply).unwrap_or(u32::MAX))
                }
                DeckEntry::Named(name) => {
                    let blueprint = self
                        .blueprint_for_name(name)
                        .ok_or_else(|| GameError::data("Unknown unit.").with_detail(name))?;
                    let rarity = blueprint.rarity.as_deref().unwrap_or("undefined");
                    Supply::for_rarity(rarity)
                        .ok_or_else(|| GameError::data("Unknown rarity.").with_detail(rarity))?
                }
            };
            let supply = if infinite_supplies {
                Supply::Unlimited
            } else {
                supply
            };
            self.supplies[player.index()].insert(entry.name().to_string(), supply);
        }

        for (count, name) in cards {
            let blueprint = self
                .blueprint_for_name(name)
                .ok_or_else(|| GameError::data("Blueprint not found.").with_detail(name))?;
            for _ in 0..*count {
                self.construct_unit(blueprint.clone(), Some(0), player, None)?;
            }
        }
        Ok(())
    }

    // Accessors

    pub fn deck(&self) -> &[Arc<Blueprint>] {
        &self.deck
    }

    pub fn turn_number(&self) -> u32 {
        self.turn_number
    }

    pub fn active_player(&self) -> Player {
        self.active_player
    }

    pub fn in_defense_phase(&self) -> bool {
        self.in_defense_phase
    }

    pub fn resources(&self, player: Player) -> &Resources {
        &self.resources[player.index()]
    }

    pub fn supply(&self, player: Player, name: &str) -> Option<Supply> {
        self.supplies[player.index()].get(name).copied()
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn get_unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id.index())
    }

    /// Panics if `id` was not issued by this engine.
    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.index()]
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id.index()]
    }

    pub fn blueprint_for_name(&self, name: &str) -> Option<Arc<Blueprint>> {
        self.deck.iter().find(|bp| bp.name == name).cloned()
    }

    // Queries

    pub fn villain(&self) -> Player {
        self.active_player.opponent()
    }

    /// Attack pool of the active player.
    pub fn attack(&self) -> i32 {
        self.attack_of(self.active_player)
    }

    pub fn attack_of(&self, player: Player) -> i32 {
        self.resources[player.index()].attack
    }

    /// Live units of one player, in construction order.
    pub fn slate(&self, player: Player) -> Vec<UnitId> {
        self.live_units()
            .filter(|&id| self.unit(id).player == player)
            .collect()
    }

    /// Live units of both players, in construction order.
    pub fn slate_all(&self) -> Vec<UnitId> {
        self.live_units().collect()
    }

    fn live_units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| !u.destroyed)
            .map(|(i, _)| UnitId(i))
    }

    /// Units of `player` that currently intercept attack.
    pub fn blockers(&self, player: Player) -> Vec<UnitId> {
        self.slate(player)
            .into_iter()
            .filter(|&id| {
                let u = self.unit(id);
                u.blocking() && !u.frozen()
            })
            .collect()
    }

    /// Partially damaged friendly blocker during defense.
    pub fn absorber(&self) -> Option<UnitId> {
        self.slate(self.active_player).into_iter().find(|&id| {
            let u = self.unit(id);
            u.blocking() && u.assigned_attack > 0 && u.assigned_attack < u.toughness
        })
    }

    /// Partially damaged enemy non-blocker holding attack.
    pub fn breach_absorber(&self) -> Option<UnitId> {
        let candidates: Vec<UnitId> = self
            .slate(self.villain())
            .into_iter()
            .filter(|&id| {
                let u = self.unit(id);
                !u.blocking() && u.assigned_attack > 0 && u.assigned_attack < u.toughness
            })
            .collect();
        if candidates.len() == 2 && self.unit(candidates[0]).sacrificed {
            return Some(candidates[1]);
        }
        candidates.first().copied()
    }

    /// No enemy blocker is left without full attack allocated.
    pub fn defenses_overran(&self) -> bool {
        !self.blockers(self.villain()).into_iter().any(|id| {
            let u = self.unit(id);
            u.assigned_attack < u.toughness
        })
    }

    /// Attack has been assigned to an enemy non-blocker.
    pub fn breaching(&self) -> bool {
        self.slate(self.villain()).into_iter().any(|id| {
            let u = self.unit(id);
            !u.sacrificed && !u.blocking() && u.assigned_attack > 0
        })
    }

    /// Every enemy unit that could absorb attack already holds lethal damage.
    pub fn can_overkill(&self) -> bool {
        !self.slate(self.villain()).into_iter().any(|id| {
            let u = self.unit(id);
            !u.sacrificed && u.assigned_attack < u.toughness && (!u.is_delayed() || !u.purchased)
        })
    }

    /// The unit `source` currently applies its targeted ability to.
    pub fn targeted_unit(&self, source: UnitId) -> Option<UnitId> {
        self.live_units()
            .find(|&id| self.unit(id).targeted_by.contains(&source))
    }

    // Events

    pub(crate) fn emit(&mut self, event: GameEvent) {
        log::trace!("engine event: {:?}", event);
        self.events.push(event);
    }

    /// Take the events buffered since the last drain.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // Snapshots

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            deck: self.deck.clone(),
            turn_number: self.turn_number,
            active_player: self.active_player,
            in_defense_phase: self.in_defense_phase,
            supplies: self.supplies.clone(),
            resources: self.resources,
            units: self.units.clone(),
        }
    }

    /// Replace all engine state with the snapshot's.
    pub fn restore(&mut self, snapshot: &GameSnapshot) {
        self.deck = snapshot.deck.clone();
        self.turn_number = snapshot.turn_number;
        self.active_player = snapshot.active_player;
        self.in_defense_phase = snapshot.in_defense_phase;
        self.supplies = snapshot.supplies.clone();
        self.resources = snapshot.resources;
        self.units = snapshot.units.clone();
        self.events.clear();
    }

    pub fn from_snapshot(snapshot: &GameSnapshot) -> Self {
        let mut state = Self::new();
        state.restore(snapshot);
        state
    }

    /// Append destroyed stand-ins until the unit list has `len` entries.
    pub fn pad_units(&mut self, len: usize) {
        while self.units.len() < len {
            self.units.push(Unit::placeholder());
        }
    }

    // Validation

    pub(crate) fn require_action_phase(&self) -> GameResult<()> {
        if self.in_defense_phase {
            return Err(GameError::invalid("Not in action phase."));
        }
        Ok(())
    }

    fn require_valid_unit(&self, id: Option<UnitId>, allow_sacrificed: bool) -> GameResult<UnitId> {
        let id = id.ok_or_else(|| GameError::invalid("No unit given."))?;
        let unit = self
            .get_unit(id)
            .ok_or_else(|| GameError::invalid("Unit with no ID.").with_detail(id))?;
        if unit.destroyed {
            return Err(GameError::invalid("Destroyed unit.").with_detail(self.describe(id)));
        }
        if unit.sacrificed && !allow_sacrificed {
            return Err(GameError::invalid("Sacrificed unit.").with_detail(self.describe(id)));
        }
        Ok(id)
    }

    pub(crate) fn require_friendly_unit(
        &self,
        id: UnitId,
        allow_sacrificed: bool,
    ) -> GameResult<()> {
        self.require_valid_unit(Some(id), allow_sacrificed)?;
        if self.unit(id).player != self.active_player {
            return Err(GameError::invalid("Enemy unit.").with_detail(self.describe(id)));
        }
        Ok(())
    }

    pub(crate) fn require_enemy_unit(
        &self,
        id: Option<UnitId>,
        allow_sacrificed: bool,
    ) -> GameResult<UnitId> {
        let id = self.require_valid_unit(id, allow_sacrificed)?;
        if self.unit(id).player == self.active_player {
            return Err(GameError::invalid("Friendly unit.").with_detail(self.describe(id)));
        }
        Ok(id)
    }

    /// Short description for error details and logs.
    pub fn describe(&self, id: UnitId) -> String {
        match self.get_unit(id) {
            Some(unit) => format!("{} {}", id, unit),
            None => id.to_string(),
        }
    }

    // Unit lifecycle

    pub(crate) fn construct_unit(
        &mut self,
        blueprint: Arc<Blueprint>,
        build_time: Option<i32>,
        player: Player,
        lifespan: Option<i32>,
    ) -> GameResult<UnitId> {
        if let Some(attribute) = blueprint.unknown_attributes.first() {
            return Err(GameError::data("Unknown unit attribute.").with_detail(attribute));
        }
        if blueprint.ui_shortname.as_deref() == Some("Robo Santa") {
            return Err(GameError::not_implemented("Robo Santa"));
        }

        let delay = build_time.unwrap_or(blueprint.build_time);
        let mut unit = Unit::new(blueprint, player);
        if delay != 0 {
            unit.building = true;
            unit.delay = Some(delay);
        }
        if let Some(lifespan) = lifespan.filter(|&l| l != 0) {
            unit.lifespan = Some(lifespan);
        }
        self.units.push(unit);
        Ok(UnitId(self.units.len() - 1))
    }

    pub(crate) fn destroy_unit(&mut self, id: UnitId, reason: DestroyReason) -> GameResult<()> {
        if self.unit(id).destroyed {
            return Err(GameError::invalid("Unit already destroyed.").with_detail(self.describe(id)));
        }
        self.unit_mut(id).destroyed = true;
        self.emit(GameEvent::UnitDestroyed { unit: id, reason });
        Ok(())
    }

    // Resources

    pub(crate) fn add_attack(&mut self, amount: i32, player: Player) -> GameResult<()> {
        if amount < 0 {
            return Err(GameError::invalid("Amount can not be negative."));
        }
        if amount == 0 {
            return Ok(());
        }

        self.resources[player.index()].attack += amount;

        // More attack can invalidate a partial allocation on an enemy
        // non-blocker, so it is reversed along with any snipe aimed at it.
        if let Some(absorber) = self.breach_absorber() {
            for source in self.unit(absorber).targeted_by.clone() {
                if self.unit(source).target_action() == Some(&TargetAction::Snipe) {
                    self.emit(GameEvent::AutoAction {
                        action: ActionKind::CancelUseAbility,
                        unit: source,
                    });
                    self.cancel_use_ability(source)?;
                }
            }
            if self.unit(absorber).sacrificed {
                return Err(GameError::invalid("Partially damaged unit sacrificed.")
                    .with_detail(self.describe(absorber)));
            }
            self.emit(GameEvent::AutoAction {
                action: ActionKind::CancelAssignAttack,
                unit: absorber,
            });
            self.cancel_assign_attack(absorber)?;
        }
        Ok(())
    }

    pub(crate) fn remove_attack(&mut self, amount: i32, player: Player) -> GameResult<()> {
        if amount < 0 {
            return Err(GameError::invalid("Amount can not be negative."));
        }
        let pool = &mut self.resources[player.index()].attack;
        if *pool < amount {
            return Err(GameError::invalid("Negative attack."));
        }
        *pool -= amount;
        Ok(())
    }

    /// Currency goes to `player`; attack always goes to the active player.
    pub(crate) fn add_resources(&mut self, amount: &Resources, player: Player) -> GameResult<()> {
        self.resources[player.index()].add_currencies(amount);
        self.add_attack(amount.attack, self.active_player)
    }

    /// Currency comes from `player`; attack always from the active player.
    pub(crate) fn remove_resources(
        &mut self,
        amount: &Resources,
        player: Player,
    ) -> GameResult<()> {
        self.resources[player.index()].sub_currencies(amount);
        self.remove_attack(amount.attack, self.active_player)
    }

    pub(crate) fn can_remove_resources(&self, amount: &Resources, player: Player) -> bool {
        self.resources[player.index()].covers(amount)
    }
}
