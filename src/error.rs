//! Error types for Trueno-Exp
//!
//! Creation-time configuration problems are soft failures (logged, `None`
//! returned) and never appear here. Everything in this enum stops the current
//! operation and reaches the caller.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Exp error types
#[derive(Error, Debug)]
pub enum Error {
    /// An entry already exists and overwriting was not allowed
    #[error("{kind} {id} already exists\nOverwriting not explicitly allowed. Set allow_overwrite=true")]
    Conflict {
        /// Entity kind (experiment, run, split, ...)
        kind: String,
        /// Identity / folder name of the entry
        id: String,
    },

    /// A fatal precondition failed (e.g. a parameter spec that is not a mapping)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lifecycle transition that the state machine does not allow
    #[error("Invalid transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        /// Entity description (kind and id)
        entity: String,
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// Entry not found in a repository
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind
        kind: String,
        /// Identity that was looked up
        id: String,
    },

    /// Storage layout or payload problem
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Error raised by the modeling library behind a pipeline step
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] anyhow::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary payload (de)serialization error
    #[error("Binary serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Git repository error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Layered configuration could not be extracted
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// Invalid search pattern
    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a storage conflict error.
    #[must_use]
    pub fn conflict(kind: impl ToString, id: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.to_string(),
            id: id.into(),
        }
    }

    /// Build a not-found error.
    #[must_use]
    pub fn not_found(kind: impl ToString, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            id: id.into(),
        }
    }

    /// True if this error is a storage conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// True if this error must stop the current run instead of failing one split.
    ///
    /// Storage conflicts and precondition failures are fatal; errors coming
    /// out of the modeling library only fail the split that raised them.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Pipeline(_))
    }
}
