use std::path::{Path, PathBuf};
use std::sync::Arc;

use progress_core::model::Course;
use progress_core::progress::ProgressContext;
use storage::repository::Storage;
use storage::schema_file::load_course;
use tracing::info;

use crate::Clock;
use crate::auth::{AuthService, AuthSession};
use crate::config::RemoteConfig;
use crate::error::AppServicesError;
use crate::remote::{HttpProgressRemote, ProgressRemote};
use crate::snapshot_service::SnapshotService;
use crate::sync::SyncService;

/// Where the local snapshot lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// `progress.json` inside the given data directory.
    Json(PathBuf),
    /// `SQLite` database url.
    Sqlite(String),
}

impl StoreBackend {
    async fn open(&self) -> Result<Storage, AppServicesError> {
        match self {
            Self::Json(data_dir) => Ok(Storage::json_file(data_dir)),
            Self::Sqlite(url) => Ok(Storage::sqlite(url).await?),
        }
    }
}

/// Assembles app-facing services around one course.
#[derive(Clone)]
pub struct AppServices {
    course: Arc<Course>,
    session: AuthSession,
    auth: Arc<AuthService>,
    sync: Arc<SyncService>,
    snapshots: Arc<SnapshotService>,
}

impl AppServices {
    #[must_use]
    pub fn new(
        clock: Clock,
        course: Course,
        storage: &Storage,
        remote: Arc<dyn ProgressRemote>,
    ) -> Self {
        let session = AuthSession::new();
        let auth = Arc::new(AuthService::new(
            clock,
            Arc::clone(&remote),
            session.clone(),
        ));
        let sync = Arc::new(SyncService::new(clock, remote, session.clone()));
        let snapshots = Arc::new(SnapshotService::new(Arc::clone(&storage.snapshots)));

        Self {
            course: Arc::new(course),
            session,
            auth,
            sync,
            snapshots,
        }
    }

    /// Load the course schema, open the snapshot store and connect the HTTP
    /// remote.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the schema cannot be loaded, the store
    /// cannot be opened or the HTTP client cannot be built.
    pub async fn open(
        clock: Clock,
        schema_path: &Path,
        backend: &StoreBackend,
        remote_config: RemoteConfig,
    ) -> Result<Self, AppServicesError> {
        let course = load_course(schema_path).await?;
        let storage = backend.open().await?;
        info!(
            environment = %remote_config.environment,
            server = %remote_config.base_url,
            "using remote store"
        );
        let remote: Arc<dyn ProgressRemote> = Arc::new(HttpProgressRemote::new(remote_config)?);
        Ok(Self::new(clock, course, &storage, remote))
    }

    /// Build the tree (if needed) and merge the local snapshot into it.
    /// Returns the number of nodes restored from the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the tree cannot be built or the
    /// snapshot cannot be read.
    pub async fn start(&self, ctx: &mut ProgressContext) -> Result<usize, AppServicesError> {
        ctx.build(&self.course)?;
        Ok(self.snapshots.load(ctx).await?)
    }

    #[must_use]
    pub fn course(&self) -> Arc<Course> {
        Arc::clone(&self.course)
    }

    #[must_use]
    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn sync(&self) -> Arc<SyncService> {
        Arc::clone(&self.sync)
    }

    #[must_use]
    pub fn snapshots(&self) -> Arc<SnapshotService> {
        Arc::clone(&self.snapshots)
    }
}
