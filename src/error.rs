//! Error types for the veneer crate

use thiserror::Error;
use veneer_remote_interface::RemoteError;

pub type Result<T> = std::result::Result<T, StyleError>;

#[derive(Error, Debug)]
pub enum StyleError {
    /// No live session matched the target's identity rules. Carries the name
    /// patterns that were attempted so the failure is diagnosable from the
    /// message alone.
    #[error("no session matched {patterns:?}: {reason}")]
    Resolution {
        reason: String,
        patterns: Vec<String>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("style transaction retry count exceeded after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    #[error("malformed mapping entry: {0}")]
    MappingEntry(String),

    #[error("failed to encode style patch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RemoteError> for StyleError {
    fn from(err: RemoteError) -> Self {
        StyleError::Transport(err.to_string())
    }
}
