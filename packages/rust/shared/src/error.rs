//! Error types for tabharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::ContextId;

/// Top-level error type for all tabharvest operations.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Session file could not be read or is malformed.
    #[error("session error: {message}")]
    Session { message: String },

    /// A host call (enumerate, activate, inject) failed.
    #[error("host error: {0}")]
    Host(String),

    /// The context does not exist in the current workspace.
    #[error("unknown context {0}")]
    UnknownContext(ContextId),

    /// The context's address is an internal/system address.
    #[error("context {id} is not scriptable ({address})")]
    NotScriptable { id: ContextId, address: String },

    /// The context's content has not been materialized yet.
    #[error("context {0} has no materialized content")]
    NotMaterialized(ContextId),

    /// Network/HTTP error while materializing a context.
    #[error("network error: {0}")]
    Network(String),

    /// A per-context invocation exceeded its deadline.
    #[error("context {id} timed out after {elapsed:?}")]
    Timeout { id: ContextId, elapsed: Duration },

    /// The extraction task died before reporting a result.
    #[error("extraction task failed: {0}")]
    Task(String),

    /// The artifact could not be saved.
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a session error from any displayable message.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
            message: msg.into(),
        }
    }

    /// Create a host error from any displayable message.
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = HarvestError::config("settle interval must be positive");
        assert_eq!(
            err.to_string(),
            "config error: settle interval must be positive"
        );

        let err = HarvestError::NotScriptable {
            id: ContextId(7),
            address: "chrome://settings".into(),
        };
        assert!(err.to_string().contains("chrome://settings"));

        let err = HarvestError::NotMaterialized(ContextId(3));
        assert_eq!(err.to_string(), "context #3 has no materialized content");
    }
}
