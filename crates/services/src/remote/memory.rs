use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use progress_core::model::{Path, RemoteId, RemoteRecord};

use super::ProgressRemote;
use crate::auth::Credential;
use crate::error::SyncError;

/// Calls received by `InMemoryRemote`, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Login(String),
    CurrentUser,
    FetchAll,
    Create(Path),
    Update(RemoteId),
    Delete(RemoteId),
}

#[derive(Default)]
struct RemoteState {
    accounts: HashMap<String, String>,
    tokens: HashMap<String, String>,
    records: BTreeMap<RemoteId, RemoteRecord>,
    next_id: u64,
    failures: VecDeque<SyncError>,
    calls: Vec<RemoteCall>,
}

impl RemoteState {
    fn issue_id(&mut self) -> RemoteId {
        self.next_id += 1;
        RemoteId::new(self.next_id)
    }

    fn begin(&mut self, call: RemoteCall) -> Result<(), SyncError> {
        self.calls.push(call);
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn authorize(&self, credential: &Credential) -> Result<&str, SyncError> {
        self.tokens
            .get(credential.token())
            .map(String::as_str)
            .ok_or(SyncError::AuthExpired)
    }
}

/// Remote store kept in memory, for tests and offline runs.
///
/// Failures queued with `fail_next` are returned by the following calls
/// before any other check.
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account that `login` will accept.
    #[must_use]
    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.lock()
            .accounts
            .insert(email.to_string(), password.to_string());
        self
    }

    /// Accept `credential` as a session for `email` without a login call.
    pub fn accept(&self, credential: &Credential, email: &str) {
        self.lock()
            .tokens
            .insert(credential.token().to_string(), email.to_string());
    }

    /// Invalidate every issued session, as if the server expired them.
    pub fn revoke_sessions(&self) {
        self.lock().tokens.clear();
    }

    /// Store a record directly and return its identifier.
    pub fn seed(&self, path: Path, completed_on: DateTime<Utc>) -> RemoteId {
        let mut state = self.lock();
        let id = state.issue_id();
        state.records.insert(
            id,
            RemoteRecord {
                id,
                path,
                completed_on,
            },
        );
        id
    }

    /// Store a record under a caller-chosen identifier.
    pub fn seed_record(&self, record: RemoteRecord) {
        let mut state = self.lock();
        state.next_id = state.next_id.max(record.id.value());
        state.records.insert(record.id, record);
    }

    pub fn fail_next(&self, err: SyncError) {
        self.lock().failures.push_back(err);
    }

    #[must_use]
    pub fn records(&self) -> Vec<RemoteRecord> {
        self.lock().records.values().cloned().collect()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl ProgressRemote for InMemoryRemote {
    async fn login(&self, email: &str, password: &str) -> Result<Credential, SyncError> {
        let mut state = self.lock();
        state.begin(RemoteCall::Login(email.to_string()))?;
        if state.accounts.get(email).map(String::as_str) != Some(password) {
            return Err(SyncError::LoginRejected);
        }
        let token = format!("session-{}", state.tokens.len() + 1);
        state.tokens.insert(token.clone(), email.to_string());
        Ok(Credential::new(token))
    }

    async fn current_user(&self, credential: &Credential) -> Result<String, SyncError> {
        let mut state = self.lock();
        state.begin(RemoteCall::CurrentUser)?;
        state.authorize(credential).map(str::to_string)
    }

    async fn fetch_all(&self, credential: &Credential) -> Result<Vec<RemoteRecord>, SyncError> {
        let mut state = self.lock();
        state.begin(RemoteCall::FetchAll)?;
        state.authorize(credential)?;
        Ok(state.records.values().cloned().collect())
    }

    async fn create(
        &self,
        credential: &Credential,
        path: &Path,
        completed_on: DateTime<Utc>,
    ) -> Result<RemoteRecord, SyncError> {
        let mut state = self.lock();
        state.begin(RemoteCall::Create(path.clone()))?;
        state.authorize(credential)?;
        let id = state.issue_id();
        let record = RemoteRecord {
            id,
            path: path.clone(),
            completed_on,
        };
        state.records.insert(id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        credential: &Credential,
        id: RemoteId,
        path: &Path,
        completed_on: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let mut state = self.lock();
        state.begin(RemoteCall::Update(id))?;
        state.authorize(credential)?;
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| SyncError::NotFound(format!("progress {id}")))?;
        record.path = path.clone();
        record.completed_on = completed_on;
        Ok(())
    }

    async fn delete(&self, credential: &Credential, id: RemoteId) -> Result<(), SyncError> {
        let mut state = self.lock();
        state.begin(RemoteCall::Delete(id))?;
        state.authorize(credential)?;
        state
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| SyncError::NotFound(format!("progress {id}")))
    }
}
