/// SQLite-backed snapshot store
///
/// One row per `(namespace, id)`; saving again replaces the blob.
use async_trait::async_trait;
use sdk::errors::SquadError;
use sdk::SnapshotStore;
use sqlx::SqlitePool;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ids saved under `namespace`, most recently updated first.
    pub async fn ids(&self, namespace: &str) -> Result<Vec<String>, SquadError> {
        sqlx::query_scalar(
            "SELECT id FROM snapshots WHERE namespace = ? ORDER BY updated_at DESC, id ASC",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SquadError::Persistence(format!("Failed to list snapshots: {}", e)))
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn save(&self, namespace: &str, id: &str, blob: Vec<u8>) -> Result<(), SquadError> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (namespace, id, blob, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, id) DO UPDATE SET
                blob = excluded.blob,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace)
        .bind(id)
        .bind(blob)
        .bind(now_secs())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            SquadError::Persistence(format!("Failed to save {}/{}: {}", namespace, id, e))
        })?;
        Ok(())
    }

    async fn load(&self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, SquadError> {
        sqlx::query_scalar("SELECT blob FROM snapshots WHERE namespace = ? AND id = ?")
            .bind(namespace)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                SquadError::Persistence(format!("Failed to load {}/{}: {}", namespace, id, e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    async fn store() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("snapshots.db"))
            .await
            .unwrap();
        (temp_dir, db)
    }

    #[tokio::test]
    async fn missing_snapshot_loads_as_none() {
        let (_dir, db) = store().await;
        let snapshots = db.snapshots();
        assert_eq!(snapshots.load("projects", "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn saving_twice_replaces_the_blob() {
        let (_dir, db) = store().await;
        let snapshots = db.snapshots();

        snapshots.save("projects", "p1", b"first".to_vec()).await.unwrap();
        snapshots.save("projects", "p1", b"second".to_vec()).await.unwrap();
        snapshots.save("metrics", "p1", b"other".to_vec()).await.unwrap();

        assert_eq!(
            snapshots.load("projects", "p1").await.unwrap(),
            Some(b"second".to_vec())
        );
        assert_eq!(snapshots.ids("projects").await.unwrap(), vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn snapshots_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshots.db");

        let db = Database::new(&path).await.unwrap();
        db.snapshots()
            .save("stats", "memory", b"{}".to_vec())
            .await
            .unwrap();
        db.close().await.unwrap();

        let db = Database::new(&path).await.unwrap();
        assert_eq!(
            db.snapshots().load("stats", "memory").await.unwrap(),
            Some(b"{}".to_vec())
        );
    }
}
