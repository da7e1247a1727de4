//! Optional durability layer
//!
//! Projects and memory statistics are saved as opaque blobs keyed by
//! `(namespace, id)`. The engine works with the in-memory store alone;
//! durable backends live in the engine's `db` module.

use crate::errors::SquadError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Insert or replace the blob stored under `(namespace, id)`.
    async fn save(&self, namespace: &str, id: &str, blob: Vec<u8>) -> Result<(), SquadError>;

    /// Returns `None` when nothing was saved under `(namespace, id)`.
    async fn load(&self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, SquadError>;
}

/// Process-local snapshot store, lost on exit.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    blobs: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, namespace: &str, id: &str, blob: Vec<u8>) -> Result<(), SquadError> {
        self.blobs
            .write()
            .await
            .insert((namespace.to_string(), id.to_string()), blob);
        Ok(())
    }

    async fn load(&self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, SquadError> {
        Ok(self
            .blobs
            .read()
            .await
            .get(&(namespace.to_string(), id.to_string()))
            .cloned())
    }
}
