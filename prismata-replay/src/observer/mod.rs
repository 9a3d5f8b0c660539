//! Observer pattern for following a replay as it is interpreted.
//!
//! The interpreter notifies every registered observer synchronously, in
//! order: engine events drained after an engine call are delivered before
//! the `ActionDone` of the action that caused them.
//!
//! # Architecture
//!
//! ```text
//! ReplayObserver trait
//!        │
//!        ├── ConsoleObserver (indented gameplay listing)
//!        ├── EventLogObserver (JSON lines)
//!        └── CollectingObserver (in-memory, for tests)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut parser = ReplayParser::new(data);
//! parser.register(Box::new(ConsoleObserver::stdout(ConsoleOptions::default())));
//! parser.run()?;
//! ```

pub mod console;
pub mod event_log;

use crate::command::ReplayCommand;
use prismata_core::{Action, GameEvent, GameState};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Everything the interpreter reports while running a replay.
///
/// Serialized with an internal `type` tag:
/// ```json
/// {"type":"action","action":{"kind":"purchase","name":"Drone"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    InitGame,
    InitGameDone,
    Command { command: ReplayCommand },
    CommandDone { command: ReplayCommand },
    Action { action: Action },
    ActionDone { action: Action },
    UndoSnapshot,
    /// Forwarded from the rules engine.
    Game { event: GameEvent },
}

/// Errors that can occur during observation.
#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Formatting error, including poisoned locks.
    #[error("Render error: {0}")]
    Render(String),
}

/// Receives interpreter events.
///
/// The engine state is passed read-only so observers can resolve unit ids
/// to names. Errors returned from `on_event` are logged and never abort the
/// replay.
pub trait ReplayObserver: Send + Sync {
    fn on_event(&self, event: &ReplayEvent, state: &GameState) -> Result<(), ObserverError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Called once when the registry is dropped or shut down.
    fn on_shutdown(&self) {}
}

/// Registry for managing multiple observers.
pub struct ObserverRegistry {
    observers: Vec<Box<dyn ReplayObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self { observers: vec![] }
    }

    pub fn register(&mut self, observer: Box<dyn ReplayObserver>) {
        log::info!("Registered observer: {}", observer.name());
        self.observers.push(observer);
    }

    /// Deliver an event to every observer. Errors are logged, not propagated.
    pub fn notify(&self, event: &ReplayEvent, state: &GameState) {
        for observer in &self.observers {
            if let Err(e) = observer.on_event(event, state) {
                log::warn!("Observer '{}' error: {}", observer.name(), e);
            }
        }
    }

    pub fn shutdown(&self) {
        for observer in &self.observers {
            observer.on_shutdown();
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObserverRegistry {
    fn drop(&mut self) {
        // Flush buffered writers.
        self.shutdown();
    }
}

/// Records every event into a shared buffer.
///
/// Clones share the buffer, so keep one clone and register the other.
#[derive(Clone, Default)]
pub struct CollectingObserver {
    events: Arc<Mutex<Vec<ReplayEvent>>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events received so far.
    pub fn events(&self) -> Vec<ReplayEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ReplayObserver for CollectingObserver {
    fn on_event(&self, event: &ReplayEvent, _state: &GameState) -> Result<(), ObserverError> {
        self.events
            .lock()
            .map_err(|_| ObserverError::Render("CollectingObserver lock poisoned".into()))?
            .push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "CollectingObserver"
    }
}
