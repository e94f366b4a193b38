//! In-memory snapshot storage.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    persistence::{PersistenceError, SnapshotStorage},
    store::Snapshot,
};

/// Keeps the last stored snapshot in memory.
///
/// Used when the bridge runs with `store.backend: memory`, where nothing is
/// expected to survive a restart.
#[derive(Default)]
pub struct MemoryStorage {
    snapshot: Mutex<Option<Snapshot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }
}

#[async_trait]
impl SnapshotStorage for MemoryStorage {
    async fn load(&self) -> Result<Snapshot, PersistenceError> {
        self.snapshot
            .lock()
            .await
            .clone()
            .ok_or_else(|| PersistenceError::NotFound("memory".to_string()))
    }

    async fn store(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        *self.snapshot.lock().await = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use matrix_sdk::ruma::room_id;

    use super::*;
    use crate::store::Room;

    #[tokio::test]
    async fn test_load_returns_last_stored_snapshot() {
        let storage = MemoryStorage::new();
        let mut snapshot = Snapshot::default();
        let room = Room::shell(room_id!("!room:example.org").to_owned());
        snapshot.rooms.insert(room.mxid.clone(), room);

        storage.store(&snapshot).await.unwrap();

        assert_eq!(storage.load().await.unwrap(), snapshot);
    }
}
