//! Shared error types for the services crate.

use thiserror::Error;

use progress_core::model::Path;
use progress_core::progress::TreeError;
use storage::repository::StorageError;
use storage::schema_file::SchemaLoadError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by remote calls and the sync engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("session expired; sign in again")]
    AuthExpired,
    #[error("email or password rejected")]
    LoginRejected,
    #[error("remote record not found: {0}")]
    NotFound(String),
    #[error("remote conflict: {0}")]
    Conflict(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("server returned {status}: {reason}")]
    Server {
        status: reqwest::StatusCode,
        reason: String,
    },
    #[error("malformed remote payload: {0}")]
    Decode(String),
    #[error("a sync for {0} is already outstanding")]
    InFlight(Path),
    #[error("no progress node registered at {0}")]
    UnknownPath(Path),
    #[error("progress tree has not been built")]
    NotBuilt,
}

impl SyncError {
    /// Whether retrying the same call later may succeed without user action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Server { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    /// Whether the caller should prompt for credentials again.
    #[must_use]
    pub fn needs_login(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::AuthExpired)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors emitted by `SnapshotService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("progress tree has not been built")]
    NotBuilt,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while reading remote configuration from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("unknown environment {0:?} (expected dev, staging or prod)")]
    UnknownEnvironment(String),
    #[error("invalid server url {raw:?}: {source}")]
    InvalidUrl {
        raw: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid timeout {0:?}")]
    InvalidTimeout(String),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Schema(#[from] SchemaLoadError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}
