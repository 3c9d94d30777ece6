use progress_core::model::{PendingRecord, SnapshotRecord};
use tracing::debug;

use super::SqliteRepository;
use super::mapping::{map_pending_row, map_snapshot_row, remote_id_to_i64};
use crate::repository::{SnapshotStore, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn position(index: usize) -> Result<i64, StorageError> {
    i64::try_from(index).map_err(|_| StorageError::Serialization("position overflow".into()))
}

#[async_trait::async_trait]
impl SnapshotStore for SqliteRepository {
    async fn write_snapshot(&self, records: &[SnapshotRecord]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM progress_snapshot")
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (index, record) in records.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO progress_snapshot (path, position, completed_on, remote_id)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(record.path.to_string())
            .bind(position(index)?)
            .bind(record.completed_on)
            .bind(remote_id_to_i64(record.remote_id)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        debug!(records = records.len(), "wrote progress snapshot to sqlite");
        Ok(())
    }

    async fn read_snapshot(&self) -> Result<Vec<SnapshotRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT path, completed_on, remote_id
            FROM progress_snapshot
            ORDER BY position ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_snapshot_row).collect()
    }

    async fn write_pending(&self, records: &[PendingRecord]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM pending_sync")
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (index, record) in records.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO pending_sync (path, position, remote_id)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(record.path.to_string())
            .bind(position(index)?)
            .bind(remote_id_to_i64(record.remote_id)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        debug!(records = records.len(), "wrote pending sync list to sqlite");
        Ok(())
    }

    async fn read_pending(&self) -> Result<Vec<PendingRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT path, remote_id
            FROM pending_sync
            ORDER BY position ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_pending_row).collect()
    }
}
