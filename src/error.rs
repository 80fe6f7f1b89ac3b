//! Error types for cloudmirror
//!
//! One crate-wide error enum plus the scope classification that decides
//! whether a failure kills the run, skips a scenario, or fails a single
//! object.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mirroring operations
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Credentials file missing, unreadable, or malformed
    #[error("Credentials error in '{path}': {message}")]
    Credentials { path: PathBuf, message: String },

    /// Backend unreachable or rejected authentication
    #[error("Connection error to {backend}: {message}")]
    Connection { backend: String, message: String },

    /// Container does not exist or cannot be opened
    #[error("Container '{container}' not found on {backend}")]
    ContainerNotFound { backend: String, container: String },

    /// Scenario string did not match `<kind>://<container>-><kind>://<container>`
    #[error("Invalid scenario '{0}'")]
    InvalidScenario(String),

    /// Backend identifier is not one of the known kinds
    #[error("Unknown backend identifier '{0}'")]
    UnknownBackend(String),

    /// Source and destination name the same backend kind
    #[error("Same-cloud mirroring not supported: {0}")]
    SameBackend(String),

    /// Object missing at the source when its transfer ran
    #[error("Object '{key}' not found in container '{container}'")]
    ObjectNotFound { container: String, key: String },

    /// A single object's copy failed at the backend
    #[error("Transfer of '{key}' failed: {message}")]
    Transfer { key: String, message: String },

    /// Local staging file could not be written or removed
    #[error("Staging error at '{path}': {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error with path context
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backend CLI produced output we could not parse
    #[error("Malformed {backend} listing: {message}")]
    ListingParse { backend: String, message: String },

    /// Worker pool channel failure
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// Report could not be delivered
    #[error("Notification error: {0}")]
    Notification(String),
}

/// How far an error's blast radius reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Terminates the process with a nonzero status
    Fatal,
    /// Skips the current scenario, run continues
    Scenario,
    /// Fails a single object, siblings continue
    Object,
}

impl MirrorError {
    /// Create a connection error
    pub fn connection(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a credentials error
    pub fn credentials(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Credentials {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a per-object transfer error
    pub fn transfer(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transfer {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a staging-file error
    pub fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Staging {
            path: path.into(),
            source,
        }
    }

    /// Classify this error per the run's containment policy.
    ///
    /// `Connection` is classified `Scenario` here because after startup the
    /// only place it surfaces is a listing call; the startup probes in `main`
    /// treat any error as fatal regardless of scope.
    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::Credentials { .. } => ErrorScope::Fatal,
            Self::Connection { .. }
            | Self::ContainerNotFound { .. }
            | Self::InvalidScenario(_)
            | Self::UnknownBackend(_)
            | Self::SameBackend(_)
            | Self::ListingParse { .. } => ErrorScope::Scenario,
            Self::ObjectNotFound { .. }
            | Self::Transfer { .. }
            | Self::Staging { .. }
            | Self::Io { .. }
            | Self::Pool(_)
            | Self::Notification(_) => ErrorScope::Object,
        }
    }
}

/// Result type alias for mirroring operations
pub type Result<T> = std::result::Result<T, MirrorError>;

impl From<std::io::Error> for MirrorError {
    fn from(err: std::io::Error) -> Self {
        MirrorError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| MirrorError::Io {
            path: path.into(),
            source: e,
        })
    }
}
