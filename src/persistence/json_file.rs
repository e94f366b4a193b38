//! JSON file snapshot storage.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::fs;

use crate::{
    persistence::{PersistenceError, SnapshotStorage},
    store::Snapshot,
};

/// Stores the snapshot as a single JSON document.
///
/// Writes go to `<path>.tmp` first and are renamed over `path`, so a crash in
/// the middle of a write leaves the previous snapshot intact.
///
/// # Examples
///
/// ```ignore
/// let storage = JsonFileStorage::new(Path::new("./data/db.json"));
/// storage.store(&store.snapshot().await).await?;
/// let snapshot = storage.load().await?;
/// ```
#[derive(Clone, Debug)]
pub struct JsonFileStorage {
    /// Path of the snapshot file
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: &Path) -> Self {
        JsonFileStorage {
            path: path.to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }
}

#[async_trait]
impl SnapshotStorage for JsonFileStorage {
    async fn load(&self) -> Result<Snapshot, PersistenceError> {
        let serialized_snapshot = match fs::read_to_string(&self.path).await {
            Ok(serialized) => serialized,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_str(&serialized_snapshot)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))?;

        debug!("loaded snapshot from {}", self.path.display());

        Ok(snapshot)
    }

    async fn store(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let serialized_snapshot = serde_json::to_string_pretty(snapshot)
            .map_err(|e| PersistenceError::Serialize(e.to_string()))?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, serialized_snapshot).await?;
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            if let Err(remove_error) = fs::remove_file(&temp_path).await {
                warn!("failed to remove {}: {}", temp_path.display(), remove_error);
            }
            return Err(e.into());
        }

        info!("snapshot written to {}", self.path.display());
        Ok(())
    }
}
