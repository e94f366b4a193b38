//! Snapshot persistence for the identity store.
//!
//! The identity store is read wholesale at startup and written wholesale at
//! shutdown. This module defines the [`SnapshotStorage`] seam and the two
//! strategies shipped with the bridge:
//!
//! - [`JsonFileStorage`]: a single JSON document on disk, written to a
//!   temporary file and renamed over the previous snapshot
//! - [`MemoryStorage`]: keeps the snapshot in memory, for ephemeral runs and tests
//!
//! # Snapshot Layout
//!
//! ```json
//! {
//!   "users": { "@alice:example.org": { "mxid": "@alice:example.org", ... } },
//!   "rooms": { "!room:example.org": { "mxid": "!room:example.org", ... } }
//! }
//! ```

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;
use thiserror::Error;

use crate::store::Snapshot;

mod json_file;
mod memory;

pub use crate::persistence::{json_file::JsonFileStorage, memory::MemoryStorage};

/// Errors raised while reading or writing a snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("no snapshot found at {0}")]
    NotFound(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
    #[error("failed to serialize snapshot: {0}")]
    Serialize(String),
}

/// Durable storage for identity store snapshots.
///
/// Implementations only move whole snapshots around: there is no incremental
/// or partial persistence.
#[automock]
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Reads the last stored snapshot.
    async fn load(&self) -> Result<Snapshot, PersistenceError>;
    /// Replaces the stored snapshot.
    async fn store(&self, snapshot: &Snapshot) -> Result<(), PersistenceError>;
}

/// Storage strategy selected in the configuration file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Single JSON file inside the data directory
    #[default]
    Json,
    /// Nothing survives a restart
    Memory,
}

impl StorageBackend {
    /// Builds the storage for this backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Snapshot file path, ignored by the memory backend
    pub fn open(self, path: &Path) -> Arc<dyn SnapshotStorage> {
        match self {
            StorageBackend::Json => Arc::new(JsonFileStorage::new(path)),
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_starts_empty() {
        let storage = StorageBackend::Memory.open(Path::new("unused.json"));
        assert!(matches!(
            storage.load().await,
            Err(PersistenceError::NotFound(_))
        ));
    }

    #[test]
    fn test_backend_deserializes_lowercase() {
        let backend: StorageBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, StorageBackend::Memory);
        assert_eq!(StorageBackend::default(), StorageBackend::Json);
    }
}
