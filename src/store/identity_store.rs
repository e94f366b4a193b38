//! In-memory identity store shared by the event router and the host runtime.
//!
//! This module provides the [`IdentityStore`] which owns every [`User`] and
//! [`Room`] record for the lifetime of the process, and the [`Snapshot`] type
//! used to move the whole state to and from durable storage.

use std::collections::HashMap;

use log::{debug, error, info, warn};
use matrix_sdk::ruma::{OwnedRoomId, OwnedUserId, RoomId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    persistence::{PersistenceError, SnapshotStorage},
    store::{Permissions, Room, User},
};

/// The full state of the identity store at a point in time.
///
/// Serialized as a document with two top-level maps, users keyed by Matrix
/// user ID and rooms keyed by Matrix room ID.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: HashMap<OwnedUserId, User>,
    #[serde(default)]
    pub rooms: HashMap<OwnedRoomId, Room>,
}

/// Owner of every bridged user and room.
///
/// Callers get clones of the records. Every read-modify-write sequence runs
/// under a single lock, so concurrent get-or-create calls for the same key
/// always agree on one record.
///
/// # Examples
///
/// ```ignore
/// let store = Arc::new(IdentityStore::new(permissions));
/// store.hydrate(storage.as_ref()).await;
///
/// let user = store.get_user(user_id!("@alice:example.org"), true).await;
/// store.set_management_room(user_id!("@alice:example.org"), room_id!("!dm:example.org")).await;
///
/// store.flush(storage.as_ref()).await?;
/// ```
pub struct IdentityStore {
    /// Users and rooms, guarded together
    state: Mutex<Snapshot>,
    /// Permission levels granted to users on creation and on load
    permissions: Permissions,
}

impl IdentityStore {
    /// Creates an empty store.
    pub fn new(permissions: Permissions) -> Self {
        IdentityStore {
            state: Mutex::new(Snapshot::default()),
            permissions,
        }
    }

    /// Returns the user for `user_id`, creating it when `create` is set.
    ///
    /// A missing user with `create == false` yields `None`. New users get their
    /// permission level from the configured [`Permissions`].
    pub async fn get_user(&self, user_id: &UserId, create: bool) -> Option<User> {
        if create {
            return Some(self.get_or_create_user(user_id).await);
        }

        let user = self.state.lock().await.users.get(user_id).cloned();
        if user.is_none() {
            debug!("user {} is unknown", user_id);
        }
        user
    }

    /// Returns the user for `user_id`, inserting a new one if it is unknown.
    ///
    /// Lookup and insertion happen under the same lock.
    pub async fn get_or_create_user(&self, user_id: &UserId) -> User {
        let mut state = self.state.lock().await;

        if let Some(user) = state.users.get(user_id) {
            return user.clone();
        }

        let user = User::new(user_id.to_owned(), self.permissions.level_for(user_id));
        info!(
            "created user {} with permission level {:?}",
            user_id, user.permission_level
        );
        state.users.insert(user.mxid.clone(), user.clone());

        user
    }

    /// Returns the room for `room_id`.
    ///
    /// Unknown rooms come back as a shell carrying only the identifier. The
    /// shell is not inserted in the store.
    pub async fn get_room(&self, room_id: &RoomId) -> Room {
        self.state
            .lock()
            .await
            .rooms
            .get(room_id)
            .cloned()
            .unwrap_or_else(|| Room::shell(room_id.to_owned()))
    }

    /// Records the management room of a known user.
    ///
    /// Unknown users are left alone: this never creates a user. Returns
    /// `true` if a user was updated.
    pub async fn set_management_room(&self, user_id: &UserId, room_id: &RoomId) -> bool {
        let mut state = self.state.lock().await;

        let Some(user) = state.users.get_mut(user_id) else {
            debug!(
                "ignoring management room {} for unknown user {}",
                room_id, user_id
            );
            return false;
        };

        if user.management_room.as_deref() != Some(room_id) {
            info!("management room of {} is now {}", user_id, room_id);
            user.management_room = Some(room_id.to_owned());
        }
        true
    }

    /// Records the remote identity of a known user after a successful login.
    ///
    /// Returns the updated user, or `None` if the user is unknown.
    pub async fn complete_login(
        &self,
        user_id: &UserId,
        remote_id: &str,
        remote_name: &str,
    ) -> Option<User> {
        let mut state = self.state.lock().await;
        let user = state.users.get_mut(user_id)?;

        user.remote_id = remote_id.to_owned();
        user.remote_name = remote_name.to_owned();
        info!("{} logged in as {} ({})", user_id, remote_name, remote_id);

        Some(user.clone())
    }

    /// Inserts or replaces a room.
    pub async fn insert_room(&self, room: Room) {
        debug!("storing room {} (remote {})", room.mxid, room.remote_id);
        self.state.lock().await.rooms.insert(room.mxid.clone(), room);
    }

    /// Returns every stored room.
    pub async fn rooms(&self) -> Vec<Room> {
        self.state.lock().await.rooms.values().cloned().collect()
    }

    /// Returns the number of stored users and rooms.
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.users.len(), state.rooms.len())
    }

    /// Returns a copy of the whole state, taken under the store lock.
    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.clone()
    }

    /// Loads the store from `storage`.
    ///
    /// A missing or corrupt snapshot is logged and leaves the store empty: the
    /// bridge must always be able to start. Permission levels of loaded users
    /// are resolved again from the configured [`Permissions`], so a level
    /// changed in the configuration applies after a restart. The store lock is
    /// held for the whole operation.
    pub async fn hydrate(&self, storage: &dyn SnapshotStorage) {
        let mut state = self.state.lock().await;

        match storage.load().await {
            Ok(mut snapshot) => {
                for user in snapshot.users.values_mut() {
                    let level = self.permissions.level_for(&user.mxid);
                    if level != user.permission_level {
                        info!(
                            "permission level of {} changed from {:?} to {:?}",
                            user.mxid, user.permission_level, level
                        );
                        user.permission_level = level;
                    }
                }

                info!(
                    "loaded {} users and {} rooms",
                    snapshot.users.len(),
                    snapshot.rooms.len()
                );
                *state = snapshot;
            }
            Err(PersistenceError::NotFound(location)) => {
                warn!(
                    "no snapshot found at {}, starting with an empty store",
                    location
                );
                *state = Snapshot::default();
            }
            Err(e) => {
                error!("failed to load snapshot ({}), starting with an empty store", e);
                *state = Snapshot::default();
            }
        }
    }

    /// Writes the whole store to `storage`.
    ///
    /// The state is copied under the store lock and written once the lock is
    /// released. Callers flush once no event is being handled anymore.
    /// Failures are logged and returned, never retried.
    pub async fn flush(&self, storage: &dyn SnapshotStorage) -> Result<(), PersistenceError> {
        let snapshot = self.snapshot().await;

        if let Err(e) = storage.store(&snapshot).await {
            error!("failed to persist snapshot: {}", e);
            return Err(e);
        }

        info!(
            "persisted {} users and {} rooms",
            snapshot.users.len(),
            snapshot.rooms.len()
        );
        Ok(())
    }
}
