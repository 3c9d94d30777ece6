use progress_core::model::{Path, PendingRecord, RemoteId, SnapshotRecord};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn remote_id_to_i64(id: Option<RemoteId>) -> Result<Option<i64>, StorageError> {
    id.map(|id| {
        i64::try_from(id.value())
            .map_err(|_| StorageError::Serialization("remote_id overflow".into()))
    })
    .transpose()
}

fn remote_id_from_i64(v: i64) -> Result<RemoteId, StorageError> {
    u64::try_from(v)
        .map(RemoteId::new)
        .map_err(|_| StorageError::Serialization("remote_id sign overflow".into()))
}

fn path_column(row: &sqlx::sqlite::SqliteRow) -> Result<Path, StorageError> {
    let raw_path: String = row.try_get("path").map_err(ser)?;
    raw_path
        .parse()
        .map_err(|e| StorageError::Serialization(format!("invalid path {raw_path}: {e}")))
}

fn remote_id_column(row: &sqlx::sqlite::SqliteRow) -> Result<Option<RemoteId>, StorageError> {
    row.try_get::<Option<i64>, _>("remote_id")
        .map_err(ser)?
        .map(remote_id_from_i64)
        .transpose()
}

pub(crate) fn map_snapshot_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<SnapshotRecord, StorageError> {
    let path = path_column(row)?;
    let completed_on: chrono::DateTime<chrono::Utc> =
        row.try_get("completed_on").map_err(ser)?;
    let remote_id = remote_id_column(row)?;

    Ok(SnapshotRecord {
        path,
        completed_on,
        remote_id,
    })
}

pub(crate) fn map_pending_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<PendingRecord, StorageError> {
    Ok(PendingRecord {
        path: path_column(row)?,
        remote_id: remote_id_column(row)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_id_conversion_checks_range() {
        assert_eq!(remote_id_to_i64(None).unwrap(), None);
        assert_eq!(remote_id_to_i64(Some(RemoteId::new(7))).unwrap(), Some(7));
        assert!(remote_id_to_i64(Some(RemoteId::new(u64::MAX))).is_err());
        assert!(remote_id_from_i64(-1).is_err());
    }
}
