use thiserror::Error;

/// Errors raised by the rules engine.
///
/// All three kinds abort the current replay. Batch tooling is expected to
/// count [`GameError::NotImplemented`] separately since it marks known gaps
/// rather than defects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// The recorded data violates a structural expectation.
    #[error("Data error: {message}{}", fmt_detail(.detail))]
    Data {
        message: String,
        detail: Option<String>,
    },
    /// An action was attempted that the current game state forbids.
    #[error("Invalid state: {message}{}", fmt_detail(.detail))]
    InvalidState {
        message: String,
        detail: Option<String>,
    },
    /// Functionality deliberately left unimplemented.
    #[error("Feature not implemented: {0}")]
    NotImplemented(String),
}

pub type GameResult<T> = Result<T, GameError>;

fn fmt_detail(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(" ({})", d),
        None => String::new(),
    }
}

impl GameError {
    pub fn data(message: impl Into<String>) -> Self {
        GameError::Data {
            message: message.into(),
            detail: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        GameError::InvalidState {
            message: message.into(),
            detail: None,
        }
    }

    pub fn not_implemented(feature: impl Into<String>) -> Self {
        GameError::NotImplemented(feature.into())
    }

    /// Attach a description of the offending value.
    pub fn with_detail(self, value: impl std::fmt::Display) -> Self {
        let detail = Some(value.to_string());
        match self {
            GameError::Data { message, .. } => GameError::Data { message, detail },
            GameError::InvalidState { message, .. } => GameError::InvalidState { message, detail },
            other => other,
        }
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, GameError::NotImplemented(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            GameError::invalid("Not in action phase.").to_string(),
            "Invalid state: Not in action phase."
        );
        assert_eq!(
            GameError::data("Unknown rarity.").with_detail("mythic").to_string(),
            "Data error: Unknown rarity. (mythic)"
        );
        assert_eq!(
            GameError::not_implemented("Redo").to_string(),
            "Feature not implemented: Redo"
        );
    }

    #[test]
    fn test_detail_ignored_for_not_implemented() {
        let err = GameError::not_implemented("Redo").with_detail("x");
        assert!(err.is_not_implemented());
        assert_eq!(err, GameError::NotImplemented("Redo".to_string()));
    }
}
