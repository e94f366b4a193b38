//! Bridged room records.

use matrix_sdk::ruma::{OwnedRoomId, OwnedUserId, RoomId};
use serde::{Deserialize, Serialize};

use crate::kit::BridgedRoom;

/// Reference to a ghost that a room was provisioned with.
///
/// The store never owns ghosts. It keeps enough to let the ghost registry
/// resolve or rebuild the ghost after a restart.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GhostRef {
    /// Matrix user ID of the ghost
    pub mxid: OwnedUserId,
    /// Identifier of the remote user the ghost stands for
    pub remote_id: String,
}

/// A Matrix room known to the bridge.
///
/// A room whose `remote_id` is empty is a *shell*: the identifier is known but
/// the room is not tied to any remote conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Matrix room ID
    pub mxid: OwnedRoomId,
    /// Remote conversation identifier, empty for shell rooms
    #[serde(default)]
    pub remote_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub topic: String,
    /// Ghosts the room was provisioned with
    #[serde(default)]
    pub ghosts: Vec<GhostRef>,
}

impl Room {
    /// Creates a shell room carrying only its identifier.
    pub fn shell(mxid: OwnedRoomId) -> Self {
        Room {
            mxid,
            remote_id: String::new(),
            name: String::new(),
            topic: String::new(),
            ghosts: Vec::new(),
        }
    }

    /// Returns `true` if the room is not tied to a remote conversation.
    pub fn is_shell(&self) -> bool {
        !self.is_bridged()
    }
}

impl BridgedRoom for Room {
    fn room_id(&self) -> &RoomId {
        &self.mxid
    }

    fn remote_id(&self) -> &str {
        &self.remote_id
    }
}
