use serde::{Deserialize, Serialize};

/// Top-level record fields accepted in strict mode besides the ones the
/// interpreter reads.
pub const PASSIVE_RECORD_FIELDS: [&str; 5] = ["chatInfo", "id", "logInfo", "rawHash", "seed"];

/// Options controlling how replay records are accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayOptions {
    /// Reject records carrying top-level fields outside the known schema.
    pub strict: bool,
}

impl ReplayOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}
