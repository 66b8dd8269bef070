//! Error types for the session room.

use thiserror::Error;

/// Errors surfaced by the session room library.
///
/// Missing inputs are not errors: lookups return `Option` and the UI shows an
/// off placeholder instead.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Settings could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A duration string such as "1s" or "500ms" could not be parsed.
    #[error("Invalid duration '{0}'")]
    Duration(String),

    /// Input positions are 1 through 4.
    #[error("Invalid input position {0} (expected 1-4)")]
    InvalidPosition(u8),

    /// Two roster entries claim the same position.
    #[error("Position {0} is assigned to more than one input")]
    DuplicatePosition(u8),

    /// Two roster entries share an input id.
    #[error("Input id '{0}' is used by more than one line")]
    DuplicateInput(String),

    /// A line edit carried a value the roster cannot accept.
    #[error("Invalid value for {field}: {reason}")]
    InvalidLine { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, RoomError>;
