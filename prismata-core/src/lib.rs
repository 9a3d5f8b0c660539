//! # Prismata Rules Engine
//!
//! Deterministic model of a Prismata match, advanced one high-level action
//! at a time. Used by `prismata-replay` to reconstruct recorded games.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ Interpreter │────▶│   Action     │────▶│  GameState  │
//! │ (clicks)    │     │ (can_*/do)   │     │ (mutate)    │
//! └─────────────┘     └──────────────┘     └──────┬──────┘
//!                                                 │
//!                     ┌──────────────┐     ┌──────▼──────┐
//!                     │  Observers   │◀────│  GameEvent  │
//!                     │  (side fx)   │     │ (drained)   │
//!                     └──────────────┘     └─────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`GameState`] | Resources, supplies, units and turn phase |
//! | [`Blueprint`] | Immutable unit template shared through `Arc` |
//! | [`Unit`] | Live unit: blueprint plus per-instance state |
//! | [`Action`] | High-level player action with payload |
//! | [`GameSnapshot`] | Deep copy used for undo and checkpoints |
//! | [`GameEvent`] | Notifications buffered during an operation |
//!
//! Units are addressed by [`UnitId`], their index in the engine's unit list.
//! Units are never removed, so ids stay stable for the whole match.

pub mod action;
mod actions;
pub mod blueprint;
pub mod error;
pub mod events;
pub mod resources;
mod scripts;
pub mod state;
pub mod testing;
mod turn;
pub mod unit;

pub use action::{Action, ActionKind};
pub use blueprint::{Blueprint, Condition, CreateRule, SacrificeRule, Script, TargetAction};
pub use error::{GameError, GameResult};
pub use events::{DestroyReason, GameEvent};
pub use resources::Resources;
pub use state::{DeckEntry, GameSnapshot, GameState, InitialState, Supplies, Supply};
pub use unit::{Player, Unit, UnitId, PLACEHOLDER_NAME};
