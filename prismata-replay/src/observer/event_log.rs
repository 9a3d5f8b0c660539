//! Event log observer writing every replay event as a JSON line.
//!
//! ```json
//! {"type":"command","command":{"command":"click_unit","id":4}}
//! {"type":"game","event":{"type":"unit_destroyed","unit":4,"reason":"sacrificed"}}
//! ```

use super::{ObserverError, ReplayEvent, ReplayObserver};
use prismata_core::GameState;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

pub struct EventLogObserver {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl EventLogObserver {
    /// Buffered stdout, for piping to `jq` and similar tools.
    pub fn stdout() -> Self {
        Self::new(Box::new(BufWriter::new(std::io::stdout())))
    }

    pub fn file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl ReplayObserver for EventLogObserver {
    fn on_event(&self, event: &ReplayEvent, _state: &GameState) -> Result<(), ObserverError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ObserverError::Render("EventLogObserver writer lock poisoned".into()))?;
        serde_json::to_writer(&mut *writer, event)?;
        writeln!(writer)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "EventLogObserver"
    }

    fn on_shutdown(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
