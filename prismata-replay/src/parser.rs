//! Replay interpreter.
//!
//! Turns the recorded client commands (unit clicks, blueprint clicks, space
//! bar) back into high-level actions on the rules engine, tracking the
//! client-side state the engine does not know about: the confirm phase, the
//! damage phase, units selected for targeting and the undo history.

use crate::command::{parse_command, ReplayCommand};
use crate::config::ReplayOptions;
use crate::data::ReplayData;
use crate::error::ReplayError;
use crate::observer::{ObserverRegistry, ReplayEvent, ReplayObserver};
use crate::shift_click::sort_shift_click_matches;
use prismata_core::{
    Action, ActionKind, Condition, GameError, GameResult, GameSnapshot, GameState, TargetAction,
    Unit, UnitId,
};
use std::cmp::Reverse;
use std::sync::Arc;

/// Interpreter state that undo and revert roll back along with the engine.
#[derive(Debug, Clone)]
struct ParserSnapshot {
    in_confirm_phase: bool,
    in_damage_phase: bool,
    targeting_units: Vec<UnitId>,
    end_defense_snapshot: Option<Arc<ParserSnapshot>>,
    end_action_snapshot: Option<Arc<ParserSnapshot>>,
    state: GameSnapshot,
}

pub struct ReplayParser {
    data: ReplayData,
    state: GameState,
    observers: ObserverRegistry,

    in_confirm_phase: bool,
    in_damage_phase: bool,
    targeting_units: Vec<UnitId>,
    combined_action: bool,

    undo_snapshots: Vec<ParserSnapshot>,
    start_turn_snapshot: Option<Arc<ParserSnapshot>>,
    end_defense_snapshot: Option<Arc<ParserSnapshot>>,
    end_action_snapshot: Option<Arc<ParserSnapshot>>,
}

fn invalid(message: &str) -> GameError {
    GameError::invalid(message)
}

/// Target is not yet spent for the given targeting kind.
fn still_open(unit: &Unit, action: &TargetAction) -> bool {
    match action {
        TargetAction::Disrupt => !unit.frozen(),
        TargetAction::Snipe => !unit.sacrificed,
        TargetAction::Unknown(_) => false,
    }
}

impl ReplayParser {
    pub fn new(data: ReplayData) -> Self {
        Self {
            data,
            state: GameState::new(),
            observers: ObserverRegistry::new(),
            in_confirm_phase: false,
            in_damage_phase: false,
            targeting_units: Vec::new(),
            combined_action: false,
            undo_snapshots: Vec::new(),
            start_turn_snapshot: None,
            end_defense_snapshot: None,
            end_action_snapshot: None,
        }
    }

    pub fn from_json(text: &str, options: &ReplayOptions) -> Result<Self, ReplayError> {
        Ok(Self::new(ReplayData::from_json(text, options)?))
    }

    pub fn register(&mut self, observer: Box<dyn ReplayObserver>) {
        self.observers.register(observer);
    }

    pub fn data(&self) -> &ReplayData {
        &self.data
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn in_confirm_phase(&self) -> bool {
        self.in_confirm_phase
    }

    pub fn in_damage_phase(&self) -> bool {
        self.in_damage_phase
    }

    pub fn in_combined_action(&self) -> bool {
        self.combined_action
    }

    pub fn targeting_units(&self) -> &[UnitId] {
        &self.targeting_units
    }

    /// Set up the match and replay every recorded command.
    pub fn run(&mut self) -> GameResult<()> {
        self.notify(ReplayEvent::InitGame);
        self.init_game()?;
        self.notify(ReplayEvent::InitGameDone);

        let count = self.data.commands()?.len();
        for i in 0..count {
            let command = parse_command(&self.data.commands()?[i])?;
            self.run_command(&command)?;
        }
        Ok(())
    }

    /// Set up the match from the recorded deck and starting position.
    pub fn init_game(&mut self) -> GameResult<()> {
        let initial = self.data.initial_state()?;
        self.state.init(initial)?;
        self.forward_engine_events();

        self.undo_snapshots.clear();
        self.combined_action = false;
        self.end_defense_snapshot = None;
        self.end_action_snapshot = None;
        self.start_turn_snapshot = Some(Arc::new(self.snapshot()));
        Ok(())
    }

    fn notify(&self, event: ReplayEvent) {
        self.observers.notify(&event, &self.state);
    }

    fn forward_engine_events(&mut self) {
        for event in self.state.drain_events() {
            log::trace!("engine event: {:?}", event);
            self.notify(ReplayEvent::Game { event });
        }
    }

    // Snapshots

    fn snapshot(&self) -> ParserSnapshot {
        ParserSnapshot {
            in_confirm_phase: self.in_confirm_phase,
            in_damage_phase: self.in_damage_phase,
            targeting_units: self.targeting_units.clone(),
            end_defense_snapshot: self.end_defense_snapshot.clone(),
            end_action_snapshot: self.end_action_snapshot.clone(),
            state: self.state.snapshot(),
        }
    }

    fn restore(&mut self, snapshot: &ParserSnapshot) {
        self.in_confirm_phase = snapshot.in_confirm_phase;
        self.in_damage_phase = snapshot.in_damage_phase;
        self.targeting_units = snapshot.targeting_units.clone();
        self.end_defense_snapshot = snapshot.end_defense_snapshot.clone();
        self.end_action_snapshot = snapshot.end_action_snapshot.clone();
        self.state.restore(&snapshot.state);
    }

    fn add_undo_snapshot(&mut self) {
        self.combined_action = false;
        self.notify(ReplayEvent::UndoSnapshot);
        self.undo_snapshots.push(self.snapshot());
    }

    // Click resolution

    /// The action a plain click on `id` would perform, if any.
    pub fn get_click_action(&self, id: UnitId) -> GameResult<Option<Action>> {
        if !self.targeting_units.is_empty() {
            return Err(invalid("In targeting mode."));
        }
        if self.in_confirm_phase {
            return Err(invalid("In confirm phase."));
        }

        let state = &self.state;
        let unit = state
            .get_unit(id)
            .ok_or_else(|| invalid("Unit not found.").with_detail(id))?;
        if unit.destroyed {
            return Ok(None);
        }
        let villain = state.villain();

        if state.in_defense_phase() {
            if unit.player != state.active_player() || !unit.blocking() || unit.frozen() {
                return Ok(None);
            }
            if unit.assigned_attack != 0 {
                if state.attack_of(villain) == 0 {
                    if let Some(absorber) = state.absorber() {
                        return Ok(Some(Action::CancelAssignDefense { unit: absorber }));
                    }
                }
                return Ok(Some(Action::CancelAssignDefense { unit: id }));
            }
            if state.attack_of(villain) <= 0 {
                return Ok(None);
            }
            return Ok(Some(Action::AssignDefense { unit: id }));
        }

        if let Some(creator) = unit.constructed_by {
            if state.unit(creator).purchased_this_turn() {
                return Ok(Some(Action::CancelPurchase { unit: creator }));
            }
        }

        if unit.player != state.active_player() {
            return self.enemy_click_action(id, unit);
        }

        if unit.purchased_this_turn() {
            return Ok(Some(Action::CancelPurchase { unit: id }));
        }
        if let Some(creator) = unit.constructed_by {
            return Ok(Some(Action::CancelUseAbility { unit: creator }));
        }

        let blueprint = unit.blueprint();
        if blueprint.ability_script.is_none() && blueprint.target_action.is_none() {
            return Ok(None);
        }
        if unit.ability_used {
            let selfsac = blueprint.ability_script.as_ref().is_some_and(|s| s.selfsac);
            if unit.sacrificed && !selfsac {
                return Ok(None);
            }
            return Ok(Some(Action::CancelUseAbility { unit: id }));
        }
        if unit.sacrificed
            || unit.is_delayed()
            || unit.charge == Some(0)
            || (blueprint.hp_used != 0 && unit.toughness < blueprint.hp_used)
        {
            return Ok(None);
        }
        if blueprint.target_action.is_some() {
            // FIXME: offered even when no legal target exists.
            return Ok(Some(Action::SelectForTargeting { unit: id }));
        }
        Ok(Some(Action::UseAbility {
            unit: id,
            target: None,
        }))
    }

    fn enemy_click_action(&self, id: UnitId, unit: &Unit) -> GameResult<Option<Action>> {
        let state = &self.state;

        for &source in &unit.targeted_by {
            match state.unit(source).target_action() {
                // Chill that can no longer be undone falls through to the next source.
                Some(TargetAction::Disrupt) => {
                    if unit.sacrificed {
                        continue;
                    }
                    if !self.in_damage_phase {
                        return Ok(Some(Action::CancelUseAbility { unit: source }));
                    }
                    if !state.breaching()
                        && !unit.blueprint().fragile
                        && unit.assigned_attack == 0
                        && state.attack() < unit.toughness
                    {
                        return Ok(Some(Action::CancelUseAbility { unit: source }));
                    }
                }
                Some(TargetAction::Snipe) => {
                    if unit.assigned_attack != 0 {
                        return Ok(Some(Action::CancelAssignAttack { unit: id }));
                    }
                    return Ok(Some(Action::CancelUseAbility { unit: source }));
                }
                _ => {}
            }
        }

        if unit.sacrificed {
            return Ok(None);
        }

        if unit.assigned_attack != 0 {
            if state.attack() == 0 {
                if let Some(absorber) = state.breach_absorber().filter(|&b| b != id) {
                    return Ok(Some(Action::CancelAssignAttack { unit: absorber }));
                }
            }
            if state.defenses_overran() && unit.blocking() {
                if unit.frozen() {
                    return Ok(Some(Action::CancelAssignAttack { unit: id }));
                }
                if state.breaching() || unit.defenses_bypassed {
                    return Ok(None);
                }
                return Ok(Some(Action::CancelOverrunDefenses));
            }
            return Ok(Some(Action::CancelAssignAttack { unit: id }));
        }

        if unit.blueprint().undefendable && !unit.is_delayed() {
            return Ok(Some(Action::AssignAttack { unit: id }));
        }
        if state.defenses_overran() {
            if unit.is_delayed() && unit.purchased && !unit.blocking() && !state.can_overkill() {
                return Ok(None);
            }
            if !unit.blueprint().fragile && state.attack() < unit.toughness {
                return Ok(None);
            }
            return Ok(Some(Action::AssignAttack { unit: id }));
        }
        if !unit.blocking() || !state.can_overrun_defenses()? {
            return Ok(None);
        }
        Ok(Some(Action::OverrunDefenses))
    }

    // Actions

    /// Apply one high-level action, notifying observers around it.
    pub fn run_action(&mut self, action: Action) -> GameResult<()> {
        log::debug!("action: {:?}", action);
        self.notify(ReplayEvent::Action {
            action: action.clone(),
        });

        match &action {
            Action::EndDefense => {
                self.end_defense_snapshot = Some(Arc::new(self.snapshot()));
                self.state.end_defense()?;
            }
            Action::SelectForTargeting { unit } => self.targeting_units.push(*unit),
            Action::CancelTargeting => {
                if self.targeting_units.is_empty() {
                    return Err(invalid("Not targeting."));
                }
                self.targeting_units.clear();
                self.combined_action = false;
            }
            Action::UseAbility { unit, target } => self.state.use_ability(*unit, *target)?,
            Action::Purchase { name } => {
                self.state.purchase(name)?;
            }
            Action::AssignDefense { unit } => self.state.assign_defense(*unit)?,
            Action::CancelAssignDefense { unit } => self.state.cancel_assign_defense(*unit)?,
            Action::CancelPurchase { unit } => self.state.cancel_purchase(*unit)?,
            Action::CancelUseAbility { unit } => {
                self.state.cancel_use_ability(*unit)?;
                let disrupt = self.state.unit(*unit).target_action() == Some(&TargetAction::Disrupt);
                if disrupt && !self.state.defenses_overran() {
                    self.in_damage_phase = false;
                }
            }
            Action::AssignAttack { unit } => {
                self.state.assign_attack(*unit)?;
                if !self.state.unit(*unit).blueprint().undefendable && !self.villain_has_open_blocker()
                {
                    self.in_damage_phase = true;
                }
            }
            Action::CancelAssignAttack { unit } => self.state.cancel_assign_attack(*unit)?,
            Action::ProceedToDamage => {
                if self.in_damage_phase {
                    return Err(invalid("Already proceeded to damage."));
                }
                self.in_damage_phase = true;
            }
            Action::OverrunDefenses => {
                self.state.overrun_defenses()?;
                self.in_damage_phase = true;
            }
            Action::CancelOverrunDefenses => {
                self.state.cancel_overrun_defenses()?;
                self.in_damage_phase = false;
            }
            Action::EndTurn => {
                if self.in_confirm_phase {
                    return Err(invalid("Already in confirm phase."));
                }
                self.end_action_snapshot = Some(Arc::new(self.snapshot()));
                self.state.end_turn()?;
                self.in_damage_phase = false;
                self.in_confirm_phase = true;
            }
            Action::CommitTurn => {
                self.combined_action = false;
                self.in_confirm_phase = false;
                self.state.start_turn()?;
                self.end_defense_snapshot = None;
                self.end_action_snapshot = None;
                self.undo_snapshots.clear();
                self.start_turn_snapshot = Some(Arc::new(self.snapshot()));
            }
            Action::Undo => {
                let snapshot = self
                    .undo_snapshots
                    .pop()
                    .ok_or_else(|| invalid("No undo available."))?;
                let first_free = self.state.units().len();
                let was_in_defense = self.state.in_defense_phase();
                self.restore(&snapshot);
                // Ids handed out after the snapshot stay taken.
                if was_in_defense == self.state.in_defense_phase() {
                    self.state.pad_units(first_free);
                }
            }
            Action::Redo => return Err(GameError::not_implemented("Redo")),
            Action::Revert => {
                let target = self
                    .end_action_snapshot
                    .clone()
                    .or_else(|| self.end_defense_snapshot.clone())
                    .or_else(|| self.start_turn_snapshot.clone())
                    .ok_or_else(|| invalid("Nothing to revert to."))?;
                self.restore(&target);
            }
        }

        self.forward_engine_events();
        self.notify(ReplayEvent::ActionDone { action });
        Ok(())
    }

    fn villain_has_open_blocker(&self) -> bool {
        self.state
            .blockers(self.state.villain())
            .into_iter()
            .any(|id| self.state.unit(id).assigned_attack == 0)
    }

    fn run_unit_action(&mut self, kind: ActionKind, unit: UnitId) -> GameResult<()> {
        let action = Action::for_unit(kind, unit)
            .ok_or_else(|| GameError::data("Action requires a unit.").with_detail(kind))?;
        self.run_action(action)
    }

    // Clicks

    fn run_target_click(&mut self, clicked: UnitId, shift: bool) -> GameResult<()> {
        if self.state.in_defense_phase() {
            return Err(invalid("In defense phase."));
        }
        if self.in_confirm_phase {
            return Err(invalid("In confirm phase."));
        }
        if !self.combined_action {
            return Err(invalid("Not combined action."));
        }
        if self.targeting_units.contains(&clicked) {
            // Clicking a targeter cancels targeting, which is recorded separately.
            return Err(invalid("Invalid target, targeter.").with_detail(self.state.describe(clicked)));
        }

        let target_unit = self.state.unit(clicked);
        if target_unit.player == self.state.active_player() {
            return Err(
                invalid("Invalid target, friendly unit.").with_detail(self.state.describe(clicked))
            );
        }
        let source = self.state.unit(self.targeting_units[0]).blueprint().clone();
        let target_action = source
            .target_action
            .clone()
            .ok_or_else(|| GameError::data("Unknown target action."))?;
        let condition = source.condition.as_ref();
        if !target_unit.valid_target(&target_action, condition)? {
            return Err(invalid("Invalid target.").with_detail(self.state.describe(clicked)));
        }
        match &target_action {
            TargetAction::Disrupt if target_unit.frozen() => {
                return Err(invalid("Invalid target, already frozen.")
                    .with_detail(self.state.describe(clicked)));
            }
            TargetAction::Snipe if target_unit.sacrificed => {
                return Err(invalid("Invalid target, already sacrificed.")
                    .with_detail(self.state.describe(clicked)));
            }
            TargetAction::Unknown(name) => {
                return Err(GameError::data("Unknown target action.").with_detail(name));
            }
            _ => {}
        }

        let targets = if shift {
            let mut targets = Vec::new();
            for id in self.state.slate(target_unit.player) {
                let x = self.state.unit(id);
                // Chill spreads only over blockers holding the same damage.
                let same_damage = target_action != TargetAction::Disrupt
                    || x.assigned_attack == target_unit.assigned_attack;
                if x.name() == target_unit.name()
                    && x.valid_target(&target_action, condition)?
                    && still_open(x, &target_action)
                    && same_damage
                {
                    targets.push(id);
                }
            }
            targets.sort_by_key(|&id| Reverse(self.state.unit(id).toughness));
            targets
        } else {
            vec![clicked]
        };

        for (n, &target) in targets.iter().enumerate() {
            if n > 0 && !self.targeting_is_useful(&target_action, source.target_amount, target) {
                break;
            }
            let mut used = 0;
            while used < self.targeting_units.len() {
                let source = self.targeting_units[used];
                if used > 0 && !self.state.can_use_ability(source, Some(target))? {
                    break;
                }
                self.run_action(Action::UseAbility {
                    unit: source,
                    target: Some(target),
                })?;
                used += 1;
            }
            self.targeting_units.drain(..used);
            if self.targeting_units.is_empty() {
                self.combined_action = false;
                break;
            }
        }

        if !self.targeting_units.is_empty() && !self.has_open_target(&target_action, condition)? {
            self.run_action(Action::CancelTargeting)?;
        }
        Ok(())
    }

    /// Some villain unit can still take the pending targeted ability.
    fn has_open_target(
        &self,
        action: &TargetAction,
        condition: Option<&Condition>,
    ) -> GameResult<bool> {
        for id in self.state.slate(self.state.villain()) {
            let x = self.state.unit(id);
            if x.valid_target(action, condition)? && still_open(x, action) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether the remaining targeters would still make a difference on `target`.
    fn targeting_is_useful(
        &self,
        action: &TargetAction,
        amount: Option<i32>,
        target: UnitId,
    ) -> bool {
        match action {
            // Existing chill is ignored, as in the client.
            TargetAction::Disrupt => {
                let unit = self.state.unit(target);
                let count = i32::try_from(self.targeting_units.len()).unwrap_or(i32::MAX);
                unit.disruption == 0
                    && amount.is_some_and(|a| unit.toughness <= a.saturating_mul(count))
            }
            TargetAction::Snipe => true,
            TargetAction::Unknown(_) => false,
        }
    }

    fn run_confirm_phase_click(&mut self) -> GameResult<()> {
        if self.state.in_defense_phase() {
            return Err(invalid("Overlapping defense and confirm phases."));
        }
        if !self.targeting_units.is_empty() {
            return Err(invalid("Targeting in confirm phase."));
        }
        self.run_action(Action::Undo)
    }

    fn require_click_action(&self, clicked: UnitId) -> GameResult<Action> {
        self.get_click_action(clicked)?
            .ok_or_else(|| invalid("No click action.").with_detail(self.state.describe(clicked)))
    }

    fn run_click_unit(&mut self, clicked: UnitId) -> GameResult<()> {
        if self.in_confirm_phase {
            return self.run_confirm_phase_click();
        }
        if !self.targeting_units.is_empty() {
            if self.state.in_defense_phase() {
                return Err(invalid("Targeting in defense phase."));
            }
            return self.run_target_click(clicked, false);
        }

        let action = self.require_click_action(clicked)?;
        let kind = action.kind();
        let partly_damaged = |parser: &Self, unit: UnitId| {
            let u = parser.state.unit(unit);
            u.assigned_attack < u.toughness
        };

        match action.unit() {
            Some(unit) if kind == ActionKind::CancelAssignAttack && partly_damaged(self, unit) => {
                self.add_undo_snapshot();
                let clicked_unit = self.state.unit(clicked);
                let has_siblings = unit == clicked
                    && self.state.slate(clicked_unit.player).into_iter().any(|id| {
                        let x = self.state.unit(id);
                        id != clicked && x.name() == clicked_unit.name() && !x.is_delayed()
                    });
                if has_siblings {
                    self.combined_action = true;
                }
            }
            Some(unit) if kind == ActionKind::CancelAssignDefense && partly_damaged(self, unit) => {
                self.add_undo_snapshot();
            }
            _ if (kind.has_unit_predicate() && kind != ActionKind::CancelPurchase)
                || kind == ActionKind::SelectForTargeting =>
            {
                if !self.combined_action {
                    self.add_undo_snapshot();
                    self.combined_action = true;
                }
            }
            _ if kind != ActionKind::Undo => self.add_undo_snapshot(),
            _ => {}
        }

        if let Action::CancelUseAbility { unit } = action {
            if self.state.unit(unit).target_action().is_some() && clicked != unit {
                for source in self.state.unit(clicked).targeted_by.clone() {
                    self.run_action(Action::CancelUseAbility { unit: source })?;
                }
                return Ok(());
            }
        }
        self.run_action(action)
    }

    fn run_shift_click_unit(&mut self, clicked: UnitId) -> GameResult<()> {
        if self.in_confirm_phase {
            return self.run_confirm_phase_click();
        }
        if !self.targeting_units.is_empty() {
            if self.state.in_defense_phase() {
                return Err(invalid("Targeting in defense phase."));
            }
            return self.run_target_click(clicked, true);
        }

        let action = self.require_click_action(clicked)?;
        let kind = action.kind();
        if kind == ActionKind::SelectForTargeting {
            if !self.combined_action {
                self.add_undo_snapshot();
                self.combined_action = true;
            }
        } else if kind != ActionKind::Undo {
            self.add_undo_snapshot();
        }

        let Some(unit) = action.unit() else {
            return self.run_action(action);
        };
        let clicked_name = self.state.unit(clicked).name().to_string();

        if kind == ActionKind::CancelUseAbility && clicked != unit {
            if let Some(target_action) = self.state.unit(unit).target_action().cloned() {
                return self.cancel_targeted_group(clicked, &target_action);
            }
        }

        let redirectable = matches!(
            kind,
            ActionKind::CancelAssignDefense | ActionKind::CancelAssignAttack
        );
        if redirectable && self.state.unit(unit).name() != clicked_name {
            return self.run_action(action);
        }

        let matching = self.shift_click_matches(kind, unit)?;
        let Some((&first, rest)) = matching.split_first() else {
            return Err(
                invalid("Shift-click with no matches.").with_detail(self.state.describe(clicked))
            );
        };
        self.run_unit_action(kind, first)?;
        for &x in rest {
            if kind != ActionKind::SelectForTargeting && !self.state.can_apply(kind, x)? {
                break;
            }
            self.run_unit_action(kind, x)?;
        }
        Ok(())
    }

    /// Cancel every targeted ability aimed at units like `clicked`.
    fn cancel_targeted_group(
        &mut self,
        clicked: UnitId,
        target_action: &TargetAction,
    ) -> GameResult<()> {
        let clicked_unit = self.state.unit(clicked);
        let mut sources = Vec::new();
        for id in self.state.slate(clicked_unit.player) {
            let x = self.state.unit(id);
            if x.name() != clicked_unit.name() {
                continue;
            }
            let x_kind = self.get_click_action(id)?.map(|a| a.kind());
            if x_kind != Some(ActionKind::CancelUseAbility) {
                continue;
            }
            // Fully and partly chilled units are separate groups.
            if *target_action == TargetAction::Disrupt && clicked_unit.frozen() != x.frozen() {
                continue;
            }
            sources.extend(x.targeted_by.iter().copied());
        }
        for source in sources {
            self.run_action(Action::CancelUseAbility { unit: source })?;
        }
        Ok(())
    }

    /// Units a shift-click applies `kind` to, in application order.
    fn shift_click_matches(&self, kind: ActionKind, unit: UnitId) -> GameResult<Vec<UnitId>> {
        let reference = self.state.unit(unit);
        let mut matching = Vec::new();
        for id in self.state.slate(reference.player) {
            let x = self.state.unit(id);
            if x.name() != reference.name() {
                continue;
            }
            // Frontline units group by blocking status.
            if kind == ActionKind::AssignAttack
                && x.blueprint().undefendable
                && x.blocking() != reference.blocking()
            {
                continue;
            }
            let Some(x_action) = self.get_click_action(id)? else {
                continue;
            };
            if x_action.kind() != kind {
                continue;
            }
            let Some(x_unit) = x_action.unit() else {
                continue;
            };
            // Redirects are fine within a unit type: the first defender
            // click removes the absorber, same for breaching.
            if x_unit != id {
                let redirectable = matches!(
                    kind,
                    ActionKind::CancelAssignDefense | ActionKind::CancelAssignAttack
                );
                if !redirectable || self.state.unit(x_unit).name() != x.name() {
                    continue;
                }
            }
            matching.push(id);
        }

        sort_shift_click_matches(&self.state, kind, &mut matching)?;
        if kind == ActionKind::CancelAssignAttack {
            if let Some(absorber) = self.state.breach_absorber() {
                if let Some(i) = matching.iter().position(|&id| id == absorber) {
                    matching.swap(0, i);
                }
            }
        }
        Ok(matching)
    }

    // Commands

    fn lookup_unit(&self, id: i64) -> GameResult<UnitId> {
        let unit = usize::try_from(id)
            .ok()
            .map(UnitId)
            .filter(|&unit| self.state.get_unit(unit).is_some())
            .ok_or_else(|| invalid("Unit not found.").with_detail(id))?;
        if self.state.unit(unit).destroyed {
            return Err(invalid("Destroyed unit.").with_detail(self.state.describe(unit)));
        }
        Ok(unit)
    }

    fn cancel_pending_targeting(&mut self) -> GameResult<()> {
        if self.targeting_units.is_empty() {
            return Ok(());
        }
        self.run_action(Action::CancelTargeting)
    }

    fn run_blueprint_click(&mut self, id: i64, shift: bool) -> GameResult<()> {
        let name = usize::try_from(id)
            .ok()
            .and_then(|i| self.state.deck().get(i))
            .map(|bp| bp.name.clone())
            .ok_or_else(|| invalid("Blueprint not found").with_detail(id))?;
        if self.in_confirm_phase {
            return self.run_action(Action::Undo);
        }
        self.cancel_pending_targeting()?;
        self.add_undo_snapshot();
        loop {
            self.run_action(Action::Purchase { name: name.clone() })?;
            if !shift || !self.state.can_purchase(&name)? {
                return Ok(());
            }
        }
    }

    fn run_space_click(&mut self) -> GameResult<()> {
        if self.in_confirm_phase {
            return self.run_action(Action::CommitTurn);
        }
        self.cancel_pending_targeting()?;
        self.add_undo_snapshot();

        if self.state.in_defense_phase() {
            return self.run_action(Action::EndDefense);
        }
        if !self.state.defenses_overran() && self.state.can_overrun_defenses()? {
            return self.run_action(Action::OverrunDefenses);
        }
        if self.state.attack() > 0 && !self.in_damage_phase && !self.villain_has_open_blocker() {
            return self.run_action(Action::ProceedToDamage);
        }
        self.run_action(Action::EndTurn)
    }

    /// Replay one recorded command.
    pub fn run_command(&mut self, command: &ReplayCommand) -> GameResult<()> {
        log::trace!("command: {}", command);
        self.notify(ReplayEvent::Command {
            command: command.clone(),
        });

        match *command {
            ReplayCommand::ClickUnit { id } => {
                let unit = self.lookup_unit(id)?;
                self.run_click_unit(unit)?;
            }
            ReplayCommand::ShiftClickUnit { id } => {
                let unit = self.lookup_unit(id)?;
                self.run_shift_click_unit(unit)?;
            }
            ReplayCommand::ClickBlueprint { id } => self.run_blueprint_click(id, false)?,
            ReplayCommand::ShiftClickBlueprint { id } => self.run_blueprint_click(id, true)?,
            ReplayCommand::ClickSpace => self.run_space_click()?,
            ReplayCommand::CancelTargeting => self.run_action(Action::CancelTargeting)?,
            ReplayCommand::EndCombinedAction => {
                if !self.combined_action {
                    return Err(invalid("Not in combined action."));
                }
                if self.targeting_units.is_empty() {
                    self.combined_action = false;
                }
            }
            ReplayCommand::ClickRevert => {
                self.add_undo_snapshot();
                self.run_action(Action::Revert)?;
            }
            ReplayCommand::ClickUndo => self.run_action(Action::Undo)?,
            ReplayCommand::ClickRedo => self.run_action(Action::Redo)?,
            ReplayCommand::Emote { .. } => {}
        }

        self.notify(ReplayEvent::CommandDone {
            command: command.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::CollectingObserver;
    use prismata_core::{Player, Resources};
    use serde_json::{json, Value};

    fn record(commands: Value) -> Value {
        json!({
            "versionInfo": {"serverVersion": 200},
            "deckInfo": {
                "mergedDeck": [
                    {"name": "Drone", "rarity": "trinket", "buyCost": "3",
                     "abilityScript": {"receive": "1"}},
                    {"name": "Wall", "rarity": "normal", "buyCost": "5",
                     "toughness": 3, "defaultBlocking": 1}
                ],
                "base": [["Drone", "Wall"], ["Drone", "Wall"]],
                "randomizer": [[], []]
            },
            "initInfo": {
                "initCards": [[[2, "Drone"]], [[2, "Drone"]]],
                "initResources": ["6", "0"]
            },
            "commandInfo": {"commandList": commands}
        })
    }

    fn parser(commands: Value) -> ReplayParser {
        let data = ReplayData::from_value(record(commands), &ReplayOptions::default()).unwrap();
        ReplayParser::new(data)
    }

    fn click(kind: &str, id: i64) -> Value {
        json!({"_type": kind, "_id": id})
    }

    #[test]
    fn test_purchase_then_end_turn() {
        let mut parser = parser(json!([
            click("card clicked", 0),
            click("space clicked", -1),
            click("space clicked", -1),
        ]));
        parser.run().unwrap();

        let state = parser.state();
        assert_eq!(state.units().len(), 5);
        assert_eq!(state.unit(UnitId(4)).name(), "Drone");
        assert_eq!(state.unit(UnitId(4)).player, Player::First);
        assert_eq!(state.active_player(), Player::Second);
        assert!(!parser.in_confirm_phase());
    }

    #[test]
    fn test_replaying_twice_is_deterministic() {
        let commands = json!([
            click("card clicked", 0),
            click("inst clicked", 0),
            click("space clicked", -1),
            click("space clicked", -1),
            click("space clicked", -1),
        ]);
        let mut first = parser(commands.clone());
        let mut second = parser(commands);
        first.run().unwrap();
        second.run().unwrap();

        assert_eq!(first.state().snapshot(), second.state().snapshot());
    }

    #[test]
    fn test_click_on_purchase_cancels_it() {
        let mut parser = parser(json!([
            click("card clicked", 0),
            click("inst clicked", 4),
        ]));
        parser.run().unwrap();
        assert!(parser.state().unit(UnitId(4)).destroyed);
        assert_eq!(parser.state().resources(Player::First).gold, 6);
    }

    #[test]
    fn test_undo_keeps_ids_taken() {
        let mut parser = parser(json!([
            click("card clicked", 0),
            click("undo clicked", -1),
            click("card clicked", 0),
        ]));
        parser.run().unwrap();
        let state = parser.state();
        // The first purchase's id stays reserved.
        assert_eq!(state.units().len(), 6);
        assert!(state.unit(UnitId(4)).destroyed);
        assert!(!state.unit(UnitId(5)).destroyed);
        assert_eq!(state.resources(Player::First).gold, 3);
    }

    #[test]
    fn test_shift_click_blueprint_buys_until_broke() {
        let mut parser = parser(json!([click("card shift clicked", 0)]));
        parser.run().unwrap();
        let bought = parser.state().slate(Player::First).len();
        assert_eq!(bought, 4);
        assert_eq!(parser.state().resources(Player::First), &Resources::default());
    }

    #[test]
    fn test_shift_click_uses_every_ready_ability() {
        let mut parser = parser(json!([click("inst shift clicked", 0)]));
        parser.run().unwrap();
        let state = parser.state();
        assert!(state.unit(UnitId(0)).ability_used);
        assert!(state.unit(UnitId(1)).ability_used);
        assert_eq!(state.resources(Player::First).gold, 8);
    }

    #[test]
    fn test_confirm_phase_click_undoes_end_turn() {
        let mut parser = parser(json!([
            click("space clicked", -1),
            click("card clicked", 0),
        ]));
        parser.run().unwrap();
        assert!(!parser.in_confirm_phase());
        assert_eq!(parser.state().units().len(), 4);
    }

    #[test]
    fn test_revert_returns_to_turn_start() {
        let mut parser = parser(json!([
            click("card clicked", 0),
            click("card clicked", 0),
            click("revert clicked", -1),
        ]));
        parser.run().unwrap();
        let state = parser.state();
        assert_eq!(state.resources(Player::First).gold, 6);
        assert_eq!(state.slate(Player::First).len(), 2);
    }

    #[test]
    fn test_errors() {
        let mut p = parser(json!([click("inst clicked", 99)]));
        assert_eq!(
            p.run().unwrap_err(),
            GameError::invalid("Unit not found.").with_detail(99)
        );

        let mut p = parser(json!([click("undo clicked", -1)]));
        assert_eq!(p.run().unwrap_err(), GameError::invalid("No undo available."));

        let mut p = parser(json!([click("redo clicked", -1)]));
        assert!(p.run().unwrap_err().is_not_implemented());

        // Enemy Drones have no click action.
        let mut p = parser(json!([click("inst clicked", 2)]));
        assert!(matches!(
            p.run().unwrap_err(),
            GameError::InvalidState { message, .. } if message == "No click action."
        ));

        let mut p = parser(json!([click("end swipe processed", -1)]));
        assert_eq!(p.run().unwrap_err(), GameError::invalid("Not in combined action."));
    }

    #[test]
    fn test_observer_sequence() {
        let collector = CollectingObserver::new();
        let mut parser = parser(json!([click("card clicked", 0)]));
        parser.register(Box::new(collector.clone()));
        parser.run().unwrap();

        let events = collector.events();
        assert_eq!(events[0], ReplayEvent::InitGame);
        let setup: Vec<_> = events
            .iter()
            .take_while(|e| **e != ReplayEvent::InitGameDone)
            .collect();
        assert!(setup.iter().any(|e| matches!(
            e,
            ReplayEvent::Game {
                event: prismata_core::GameEvent::TurnStarted { turn_number: 1, .. }
            }
        )));
        let tail: Vec<_> = events
            .iter()
            .skip_while(|e| !matches!(e, ReplayEvent::Command { .. }))
            .filter(|e| !matches!(e, ReplayEvent::Game { .. }))
            .cloned()
            .collect();
        let purchase = Action::Purchase {
            name: "Drone".into(),
        };
        let command = ReplayCommand::ClickBlueprint { id: 0 };
        assert_eq!(
            tail,
            vec![
                ReplayEvent::Command {
                    command: command.clone()
                },
                ReplayEvent::UndoSnapshot,
                ReplayEvent::Action {
                    action: purchase.clone()
                },
                ReplayEvent::ActionDone { action: purchase },
                ReplayEvent::CommandDone { command },
            ]
        );
    }

    /// A match where each listed unit starts on the board, in order, one
    /// copy per entry. Unit ids follow the same order, first player first.
    fn arena(first: &[&str], second: &[&str], commands: Value) -> ReplayParser {
        let cards = |names: &[&str]| -> Vec<Value> {
            names.iter().map(|name| json!([1, name])).collect()
        };
        let record = json!({
            "versionInfo": {"serverVersion": 200},
            "deckInfo": {
                "mergedDeck": [
                    {"name": "Drone", "rarity": "trinket", "buyCost": "3",
                     "abilityScript": {"receive": "1"}},
                    {"name": "Wall", "toughness": 3, "defaultBlocking": 1},
                    {"name": "Front", "toughness": 3, "defaultBlocking": 1, "undefendable": 1},
                    {"name": "Big", "toughness": 3, "fragile": 1},
                    {"name": "Gun", "abilityScript": {"receive": "AAAA"}},
                    {"name": "Frost", "targetAction": "disrupt", "targetAmount": 3},
                    {"name": "Sniper", "targetAction": "snipe",
                     "condition": {"healthAtMost": 4}}
                ],
                "base": [["Drone"], ["Drone"]],
                "randomizer": [[], []]
            },
            "initInfo": {
                "initCards": [cards(first), cards(second)],
                "initResources": ["6", "6"]
            },
            "commandInfo": {"commandList": commands}
        });
        let data = ReplayData::from_value(record, &ReplayOptions::default()).unwrap();
        ReplayParser::new(data)
    }

    fn actions(collector: &CollectingObserver) -> Vec<Action> {
        collector
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ReplayEvent::Action { action } => Some(action),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_defense_click_redirects_to_absorber() {
        // Gun 0 | Walls 1, 2
        let mut parser = arena(
            &["Gun"],
            &["Wall", "Wall"],
            json!([
                click("inst clicked", 0),
                click("space clicked", -1),
                click("space clicked", -1),
                click("inst clicked", 1),
                click("inst clicked", 2),
                click("inst clicked", 1),
            ]),
        );
        parser.run().unwrap();

        let state = parser.state();
        assert!(state.in_defense_phase());
        assert_eq!(state.active_player(), Player::Second);
        // The second click on the full blocker gave back the partial one.
        assert_eq!(state.unit(UnitId(1)).assigned_attack, 3);
        assert_eq!(state.unit(UnitId(2)).assigned_attack, 0);
        assert_eq!(state.attack_of(Player::First), 1);
    }

    #[test]
    fn test_revert_falls_back_to_end_of_defense() {
        let mut parser = arena(
            &["Gun"],
            &["Wall", "Wall"],
            json!([
                click("inst clicked", 0),
                click("space clicked", -1),
                click("space clicked", -1),
                click("inst clicked", 1),
                click("inst clicked", 2),
                click("space clicked", -1),
                click("card clicked", 0),
                click("revert clicked", -1),
            ]),
        );
        let collector = CollectingObserver::new();
        parser.register(Box::new(collector.clone()));
        parser.run().unwrap();

        assert!(actions(&collector).contains(&Action::EndDefense));
        let state = parser.state();
        assert!(state.in_defense_phase());
        assert_eq!(state.units().len(), 3);
        assert!(!state.unit(UnitId(1)).destroyed);
        assert_eq!(state.unit(UnitId(1)).assigned_attack, 3);
        assert_eq!(state.unit(UnitId(2)).assigned_attack, 1);
        assert_eq!(state.resources(Player::Second).gold, 6);
    }

    #[test]
    fn test_overrun_then_end_turn_spends_leftover_attack() {
        // Gun 0 | Wall 1
        let mut parser = arena(
            &["Gun"],
            &["Wall"],
            json!([
                click("inst clicked", 0),
                click("space clicked", -1),
                click("space clicked", -1),
            ]),
        );
        let collector = CollectingObserver::new();
        parser.register(Box::new(collector.clone()));
        parser.run().unwrap();

        assert_eq!(
            actions(&collector)[1..],
            [Action::OverrunDefenses, Action::EndTurn]
        );
        assert!(parser.in_confirm_phase());
        assert!(!parser.in_damage_phase());
        assert!(parser.state().unit(UnitId(1)).destroyed);
        assert_eq!(parser.state().attack_of(Player::First), 0);
    }

    #[test]
    fn test_proceed_to_damage_then_kill() {
        // Gun 0 | Big 1
        let mut parser = arena(
            &["Gun"],
            &["Big"],
            json!([
                click("inst clicked", 0),
                click("space clicked", -1),
                click("inst clicked", 1),
                click("space clicked", -1),
            ]),
        );
        let collector = CollectingObserver::new();
        parser.register(Box::new(collector.clone()));
        parser.run().unwrap();

        assert_eq!(
            actions(&collector)[1..],
            [
                Action::ProceedToDamage,
                Action::AssignAttack { unit: UnitId(1) },
                Action::EndTurn,
            ]
        );
        assert!(parser.state().unit(UnitId(1)).destroyed);
        assert_eq!(parser.state().attack_of(Player::First), 0);
    }

    #[test]
    fn test_end_turn_rejects_unspent_attack_after_overrun() {
        // Gun 0 | Bigs 1, 2
        let mut parser = arena(
            &["Gun"],
            &["Big", "Big"],
            json!([
                click("inst clicked", 0),
                click("inst clicked", 1),
                click("space clicked", -1),
            ]),
        );
        assert_eq!(
            parser.run().unwrap_err(),
            GameError::invalid("Attack left unassigned after defenses overran.")
        );
    }

    #[test]
    fn test_click_on_overrun_blocker_cancels_breach_first() {
        // Gun 0 | Wall 1, Big 2
        let mut parser = arena(
            &["Gun"],
            &["Wall", "Big"],
            json!([
                click("inst clicked", 0),
                click("inst clicked", 1),
                click("inst clicked", 2),
                click("inst clicked", 1),
            ]),
        );
        parser.run().unwrap();

        let state = parser.state();
        assert!(state.defenses_overran());
        assert_eq!(state.unit(UnitId(1)).assigned_attack, 3);
        assert_eq!(state.unit(UnitId(2)).assigned_attack, 0);
        assert_eq!(state.attack(), 1);
    }

    #[test]
    fn test_shift_click_cancels_breach_absorber_first() {
        // Gun 0 | Bigs 1, 2
        let mut parser = arena(
            &["Gun"],
            &["Big", "Big"],
            json!([
                click("inst clicked", 0),
                click("inst clicked", 1),
                click("inst clicked", 2),
                click("inst shift clicked", 1),
            ]),
        );
        let collector = CollectingObserver::new();
        parser.register(Box::new(collector.clone()));
        parser.run().unwrap();

        let cancels: Vec<_> = actions(&collector)
            .into_iter()
            .filter(|a| a.kind() == ActionKind::CancelAssignAttack)
            .collect();
        assert_eq!(cancels[0], Action::CancelAssignAttack { unit: UnitId(2) });
        let state = parser.state();
        assert_eq!(state.unit(UnitId(1)).assigned_attack, 0);
        assert_eq!(state.unit(UnitId(2)).assigned_attack, 0);
        assert_eq!(state.attack(), 4);
    }

    #[test]
    fn test_click_on_chilled_enemy_cancels_chill() {
        // Frost 0 | Wall 1
        let mut parser = arena(
            &["Frost"],
            &["Wall"],
            json!([
                click("inst clicked", 0),
                click("inst clicked", 1),
            ]),
        );
        parser.run().unwrap();
        assert!(parser.state().unit(UnitId(1)).frozen());
        assert!(parser.targeting_units().is_empty());
        assert_eq!(
            parser.get_click_action(UnitId(1)).unwrap(),
            Some(Action::CancelUseAbility { unit: UnitId(0) })
        );

        parser
            .run_command(&ReplayCommand::ClickUnit { id: 1 })
            .unwrap();
        let state = parser.state();
        assert_eq!(state.unit(UnitId(1)).disruption, 0);
        assert!(!state.unit(UnitId(0)).ability_used);
    }

    #[test]
    fn test_click_on_sniped_chilled_enemy_cancels_snipe() {
        // Frost 0, Sniper 1 | Wall 2
        let mut parser = arena(
            &["Frost", "Sniper"],
            &["Wall"],
            json!([
                click("inst clicked", 0),
                click("inst clicked", 2),
                click("inst clicked", 1),
                click("inst clicked", 2),
            ]),
        );
        parser.run().unwrap();

        let wall = parser.state().unit(UnitId(2));
        assert!(wall.sacrificed);
        assert_eq!(wall.targeted_by, vec![UnitId(0), UnitId(1)]);
        assert_eq!(
            parser.get_click_action(UnitId(2)).unwrap(),
            Some(Action::CancelUseAbility { unit: UnitId(1) })
        );
    }

    #[test]
    fn test_blueprint_click_cancels_targeting() {
        // Frost 0 | Wall 1
        let mut parser = arena(
            &["Frost"],
            &["Wall"],
            json!([
                click("inst clicked", 0),
                click("card clicked", 0),
                click("undo clicked", -1),
            ]),
        );
        let collector = CollectingObserver::new();
        parser.register(Box::new(collector.clone()));
        parser.run().unwrap();

        assert_eq!(
            actions(&collector),
            vec![
                Action::SelectForTargeting { unit: UnitId(0) },
                Action::CancelTargeting,
                Action::Purchase {
                    name: "Drone".into()
                },
                Action::Undo,
            ]
        );
        // Undo goes back to after the cancel, not into targeting.
        assert!(parser.targeting_units().is_empty());
        assert!(!parser.in_combined_action());
        assert_eq!(parser.state().resources(Player::First).gold, 6);
    }

    #[test]
    fn test_space_click_cancels_targeting_before_overrun() {
        // Gun 0, Frost 1 | Wall 2
        let mut parser = arena(
            &["Gun", "Frost"],
            &["Wall"],
            json!([
                click("inst clicked", 0),
                click("inst clicked", 1),
                click("space clicked", -1),
            ]),
        );
        let collector = CollectingObserver::new();
        parser.register(Box::new(collector.clone()));
        parser.run().unwrap();

        assert_eq!(
            actions(&collector)[1..],
            [
                Action::SelectForTargeting { unit: UnitId(1) },
                Action::CancelTargeting,
                Action::OverrunDefenses,
            ]
        );
        assert!(parser.targeting_units().is_empty());
        assert!(parser.state().defenses_overran());
    }

    #[test]
    fn test_targeting_ends_when_no_target_is_left() {
        // Snipers 0, 1 | Big 2
        let mut parser = arena(
            &["Sniper", "Sniper"],
            &["Big"],
            json!([
                click("inst shift clicked", 0),
                click("inst clicked", 2),
            ]),
        );
        let collector = CollectingObserver::new();
        parser.register(Box::new(collector.clone()));
        parser.run().unwrap();

        assert!(parser.state().unit(UnitId(2)).sacrificed);
        assert!(parser.state().unit(UnitId(0)).ability_used);
        assert!(!parser.state().unit(UnitId(1)).ability_used);
        assert!(parser.targeting_units().is_empty());
        assert!(!parser.in_combined_action());
        assert_eq!(actions(&collector).last(), Some(&Action::CancelTargeting));
    }

    #[test]
    fn test_shift_target_chills_only_blockers_with_same_damage() {
        // Gun 0, Frosts 1, 2 | Fronts 3, 4
        let mut parser = arena(
            &["Gun", "Frost", "Frost"],
            &["Front", "Front"],
            json!([
                click("inst clicked", 0),
                click("inst clicked", 3),
                click("inst shift clicked", 1),
                click("inst shift clicked", 4),
            ]),
        );
        parser.run().unwrap();

        let state = parser.state();
        assert_eq!(state.unit(UnitId(3)).assigned_attack, 3);
        assert_eq!(state.unit(UnitId(3)).disruption, 0);
        assert!(state.unit(UnitId(4)).frozen());
        // One Frost is still waiting; the damaged Front remains a target.
        assert_eq!(parser.targeting_units(), &[UnitId(2)]);
    }
}
