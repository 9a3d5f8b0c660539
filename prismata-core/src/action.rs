use crate::unit::UnitId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// High-level action kinds, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AssignDefense,
    CancelAssignDefense,
    EndDefense,
    SelectForTargeting,
    CancelTargeting,
    UseAbility,
    CancelUseAbility,
    Purchase,
    CancelPurchase,
    ProceedToDamage,
    OverrunDefenses,
    CancelOverrunDefenses,
    AssignAttack,
    CancelAssignAttack,
    EndTurn,
    CommitTurn,
    Undo,
    Redo,
    Revert,
}

impl ActionKind {
    /// Kinds with a paired legality predicate on a single unit.
    pub fn has_unit_predicate(self) -> bool {
        matches!(
            self,
            ActionKind::AssignDefense
                | ActionKind::CancelAssignDefense
                | ActionKind::CancelPurchase
                | ActionKind::AssignAttack
                | ActionKind::CancelAssignAttack
                | ActionKind::UseAbility
                | ActionKind::CancelUseAbility
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One high-level game action with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    AssignDefense { unit: UnitId },
    CancelAssignDefense { unit: UnitId },
    EndDefense,
    SelectForTargeting { unit: UnitId },
    CancelTargeting,
    UseAbility { unit: UnitId, target: Option<UnitId> },
    CancelUseAbility { unit: UnitId },
    Purchase { name: String },
    CancelPurchase { unit: UnitId },
    ProceedToDamage,
    OverrunDefenses,
    CancelOverrunDefenses,
    AssignAttack { unit: UnitId },
    CancelAssignAttack { unit: UnitId },
    EndTurn,
    CommitTurn,
    Undo,
    Redo,
    Revert,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::AssignDefense { .. } => ActionKind::AssignDefense,
            Action::CancelAssignDefense { .. } => ActionKind::CancelAssignDefense,
            Action::EndDefense => ActionKind::EndDefense,
            Action::SelectForTargeting { .. } => ActionKind::SelectForTargeting,
            Action::CancelTargeting => ActionKind::CancelTargeting,
            Action::UseAbility { .. } => ActionKind::UseAbility,
            Action::CancelUseAbility { .. } => ActionKind::CancelUseAbility,
            Action::Purchase { .. } => ActionKind::Purchase,
            Action::CancelPurchase { .. } => ActionKind::CancelPurchase,
            Action::ProceedToDamage => ActionKind::ProceedToDamage,
            Action::OverrunDefenses => ActionKind::OverrunDefenses,
            Action::CancelOverrunDefenses => ActionKind::CancelOverrunDefenses,
            Action::AssignAttack { .. } => ActionKind::AssignAttack,
            Action::CancelAssignAttack { .. } => ActionKind::CancelAssignAttack,
            Action::EndTurn => ActionKind::EndTurn,
            Action::CommitTurn => ActionKind::CommitTurn,
            Action::Undo => ActionKind::Undo,
            Action::Redo => ActionKind::Redo,
            Action::Revert => ActionKind::Revert,
        }
    }

    /// The unit the action is applied to, if any.
    pub fn unit(&self) -> Option<UnitId> {
        match *self {
            Action::AssignDefense { unit }
            | Action::CancelAssignDefense { unit }
            | Action::SelectForTargeting { unit }
            | Action::UseAbility { unit, .. }
            | Action::CancelUseAbility { unit }
            | Action::CancelPurchase { unit }
            | Action::AssignAttack { unit }
            | Action::CancelAssignAttack { unit } => Some(unit),
            _ => None,
        }
    }

    /// Build a unit-targeted action of the given kind.
    ///
    /// Returns `None` for kinds that do not take a single unit.
    pub fn for_unit(kind: ActionKind, unit: UnitId) -> Option<Self> {
        let action = match kind {
            ActionKind::AssignDefense => Action::AssignDefense { unit },
            ActionKind::CancelAssignDefense => Action::CancelAssignDefense { unit },
            ActionKind::SelectForTargeting => Action::SelectForTargeting { unit },
            ActionKind::UseAbility => Action::UseAbility { unit, target: None },
            ActionKind::CancelUseAbility => Action::CancelUseAbility { unit },
            ActionKind::CancelPurchase => Action::CancelPurchase { unit },
            ActionKind::AssignAttack => Action::AssignAttack { unit },
            ActionKind::CancelAssignAttack => Action::CancelAssignAttack { unit },
            _ => return None,
        };
        Some(action)
    }
}
