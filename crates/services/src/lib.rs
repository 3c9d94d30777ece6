#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth;
pub mod config;
pub mod error;
pub mod remote;
pub mod snapshot_service;
pub mod sync;

pub use progress_core::Clock;

pub use app_services::{AppServices, StoreBackend};
pub use auth::{AuthService, AuthSession, Credential};
pub use config::{Environment, RemoteConfig};
pub use error::{AppServicesError, ConfigError, SnapshotError, SyncError};
pub use remote::{HttpProgressRemote, InMemoryRemote, ProgressRemote, RemoteCall};
pub use snapshot_service::SnapshotService;
pub use sync::{NodeSyncOutcome, SyncReport, SyncService, SyncStart};
