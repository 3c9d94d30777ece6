use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use progress_core::progress::ProgressContext;
use tracing::{info, warn};

use crate::Clock;
use crate::error::SyncError;
use crate::remote::ProgressRemote;

/// Session token issued by the login endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    #[must_use]
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// In-memory holder of the current credential, shared by the services that
/// make remote calls. Nothing is persisted.
#[derive(Clone, Default)]
pub struct AuthSession {
    credential: Arc<Mutex<Option<Credential>>>,
}

impl AuthSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        let session = Self::new();
        session.set(credential);
        session
    }

    pub fn set(&self, credential: Credential) {
        *self.guard() = Some(credential);
    }

    pub fn clear(&self) {
        *self.guard() = None;
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.guard().is_some()
    }

    /// The credential to attach to a remote call made at `now`.
    ///
    /// An expired credential is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Unauthenticated` if none is held, or
    /// `SyncError::AuthExpired` if it is past its expiry.
    pub fn current(&self, now: DateTime<Utc>) -> Result<Credential, SyncError> {
        let mut guard = self.guard();
        let credential = guard.as_ref().cloned().ok_or(SyncError::Unauthenticated)?;
        if credential.is_expired(now) {
            *guard = None;
            return Err(SyncError::AuthExpired);
        }
        Ok(credential)
    }

    /// Drops the credential if `err` says the server no longer accepts it.
    pub(crate) fn observe(&self, err: &SyncError) {
        if matches!(err, SyncError::AuthExpired) {
            warn!("remote rejected the session credential; signing out");
            self.clear();
        }
    }

    // Poisoning cannot leave an `Option` half-written.
    fn guard(&self) -> MutexGuard<'_, Option<Credential>> {
        self.credential
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Login, verification and logout against the remote store.
#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    remote: Arc<dyn ProgressRemote>,
    session: AuthSession,
}

impl AuthService {
    #[must_use]
    pub fn new(clock: Clock, remote: Arc<dyn ProgressRemote>, session: AuthSession) -> Self {
        Self {
            clock,
            remote,
            session,
        }
    }

    #[must_use]
    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Sign in and hold the issued credential.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::LoginRejected` for bad credentials, or any remote failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), SyncError> {
        let credential = self.remote.login(email, password).await?;
        self.session.set(credential);
        info!(email, "signed in");
        Ok(())
    }

    /// Ask the server who the held credential belongs to.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Unauthenticated` when signed out and
    /// `SyncError::AuthExpired` when the server rejects the token.
    pub async fn verify(&self) -> Result<String, SyncError> {
        let credential = self.session.current(self.clock.now())?;
        self.remote
            .current_user(&credential)
            .await
            .inspect_err(|err| self.session.observe(err))
    }

    /// Forget the credential and discard the progress tree.
    pub fn logout(&self, ctx: &mut ProgressContext) {
        self.session.clear();
        ctx.reset();
        info!("signed out");
    }
}
