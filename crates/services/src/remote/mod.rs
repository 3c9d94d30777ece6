//! Remote progress store: the trait the sync engine talks to, plus its
//! HTTP and in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use progress_core::model::{Path, RemoteId, RemoteRecord};

use crate::auth::Credential;
use crate::error::SyncError;

mod http;
mod memory;
mod wire;

pub use http::HttpProgressRemote;
pub use memory::{InMemoryRemote, RemoteCall};

/// Operations offered by the remote progress store.
///
/// Implementations check that echoed identifiers match the request and
/// report a mismatch as `SyncError::Conflict`.
#[async_trait]
pub trait ProgressRemote: Send + Sync {
    /// Exchange email and password for a session credential.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::LoginRejected` for bad credentials, or the usual
    /// transport and decode failures.
    async fn login(&self, email: &str, password: &str) -> Result<Credential, SyncError>;

    /// Email of the principal the credential belongs to.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::AuthExpired` if the credential is no longer accepted.
    async fn current_user(&self, credential: &Credential) -> Result<String, SyncError>;

    /// All progress records of the authenticated principal.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Decode` if any record (including its path) is malformed.
    async fn fetch_all(&self, credential: &Credential) -> Result<Vec<RemoteRecord>, SyncError>;

    /// Create a record and return it with its assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` on transport, status or decode failure.
    async fn create(
        &self,
        credential: &Credential,
        path: &Path,
        completed_on: DateTime<Utc>,
    ) -> Result<RemoteRecord, SyncError>;

    /// Replace the completion timestamp of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotFound` if the record no longer exists.
    async fn update(
        &self,
        credential: &Credential,
        id: RemoteId,
        path: &Path,
        completed_on: DateTime<Utc>,
    ) -> Result<(), SyncError>;

    /// Delete an existing record.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotFound` if the record no longer exists.
    async fn delete(&self, credential: &Credential, id: RemoteId) -> Result<(), SyncError>;
}
