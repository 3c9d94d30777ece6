#![forbid(unsafe_code)]

pub mod json_file;
pub mod repository;
pub mod schema_file;
pub mod sqlite;

pub use json_file::{JsonFileSnapshotStore, PENDING_FILE_NAME, SNAPSHOT_FILE_NAME};
pub use repository::{InMemorySnapshotStore, SnapshotStore, Storage, StorageError};
pub use schema_file::{SchemaLoadError, load_course, parse_course};
