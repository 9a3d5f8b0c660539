//! Console observer printing an indented gameplay listing.

use super::{ObserverError, ReplayEvent, ReplayObserver};
use prismata_core::{Action, GameEvent, GameState, UnitId};
use std::io::{self, BufWriter, Write};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOptions {
    /// Also list the recorded commands that produced each action.
    pub show_commands: bool,
    /// Mark every undo snapshot.
    pub show_undo_points: bool,
}

/// Writes one line per turn start, action and notable engine event.
///
/// Turn starts are unindented; actions are nested under the command that
/// produced them when commands are shown, and engine effects one level
/// deeper than actions.
pub struct ConsoleObserver {
    writer: Mutex<Box<dyn Write + Send>>,
    options: ConsoleOptions,
}

impl ConsoleObserver {
    pub fn stdout(options: ConsoleOptions) -> Self {
        Self::new(Box::new(BufWriter::new(io::stdout())), options)
    }

    pub fn new(writer: Box<dyn Write + Send>, options: ConsoleOptions) -> Self {
        Self {
            writer: Mutex::new(writer),
            options,
        }
    }

    fn action_level(&self) -> usize {
        if self.options.show_commands {
            2
        } else {
            1
        }
    }

    /// Indent level and text for an event, or `None` when it is not listed.
    fn render(&self, event: &ReplayEvent, state: &GameState) -> Option<(usize, String)> {
        let name = |id: UnitId| state.get_unit(id).map_or("?", |u| u.name()).to_string();
        let effect_level = self.action_level() + 1;

        match event {
            ReplayEvent::Command { command } if self.options.show_commands => {
                Some((1, command.to_string()))
            }
            ReplayEvent::UndoSnapshot if self.options.show_undo_points => {
                Some((0, "-- undo point".to_string()))
            }
            ReplayEvent::Action { action } => {
                let kind = action.kind();
                let text = match action {
                    Action::UseAbility {
                        unit,
                        target: Some(target),
                    } => format!("Action: {} {} -> {}", kind, name(*unit), name(*target)),
                    Action::Purchase { name } => format!("{} {}", kind, name),
                    _ => match action.unit() {
                        Some(unit) => format!("{} {}", kind, name(unit)),
                        None => kind.to_string(),
                    },
                };
                Some((self.action_level(), text))
            }
            ReplayEvent::Game { event } => match event {
                GameEvent::TurnStarted {
                    turn_number,
                    player,
                } => Some((0, format!("{} turn {} started.", player, turn_number))),
                GameEvent::UnitDestroyed { unit, reason } => Some((
                    effect_level,
                    format!("Unit destroyed ({}): {}", reason, name(*unit)),
                )),
                GameEvent::UnitConstructed { unit, .. } => {
                    Some((effect_level, format!("Unit constructed: {}", name(*unit))))
                }
                GameEvent::AutoAction { action, unit } => Some((
                    effect_level,
                    format!("Automatic action: {} {}", action, name(*unit)),
                )),
                GameEvent::AssignAttackBlocker { unit } => Some((
                    effect_level,
                    format!("Assigning attack to blocker: {}", name(*unit)),
                )),
            },
            _ => None,
        }
    }
}

impl ReplayObserver for ConsoleObserver {
    fn on_event(&self, event: &ReplayEvent, state: &GameState) -> Result<(), ObserverError> {
        let Some((level, text)) = self.render(event, state) else {
            return Ok(());
        };
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ObserverError::Render("Lock poisoned".to_string()))?;
        writeln!(writer, "{}{}", "  ".repeat(level), text)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "ConsoleObserver"
    }

    fn on_shutdown(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
