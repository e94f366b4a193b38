//! Interfaces of the collaborators the connector drives.
//!
//! The connector core never talks to a homeserver or to the remote network
//! directly. Every side effect goes through one of these traits, implemented
//! by the host runtime (see the `matrix` module for the relay-mode runtime):
//!
//! - [`BridgeFacade`]: outbound Matrix actions (create room, send, mark read)
//! - [`GhostRegistry`]: issues and resolves ghosts
//! - [`RoomOrchestrator`]: describes new rooms and loads persisted ones
//! - [`RemoteNetwork`]: the remote network transport
//!
//! All traits are mockable with `mockall` for the router tests.

use std::time::Duration;

use async_trait::async_trait;
use matrix_sdk::ruma::{
    OwnedMxcUri, OwnedRoomId, RoomId, events::room::message::RoomMessageEventContent,
};
use mockall::automock;
use thiserror::Error;

use crate::store::{GhostRef, Room, User};

mod handles;
mod identity;

pub use crate::kit::{
    handles::{GhostHandle, PendingRoom, RoomEvent, RoomHandle, RoomInfo},
    identity::{BridgedRoom, RemoteIdentity},
};

/// Errors returned by collaborator calls.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
    #[error("room {0} is not joined")]
    NotJoined(OwnedRoomId),
    #[error("invalid identifier: {0}")]
    InvalidId(String),
    #[error("handler panicked")]
    Panicked,
}

/// Outbound actions against the Matrix side of the bridge.
#[automock]
#[async_trait]
pub trait BridgeFacade: Send + Sync {
    /// Creates (or reuses) the Matrix room for `room` and invites `user`.
    async fn create_room(
        &self,
        room: &PendingRoom,
        user: &User,
    ) -> Result<(RoomHandle, RoomInfo), BridgeError>;

    /// Sends a message as the bridge bot.
    async fn send_bot_message(
        &self,
        room: &RoomHandle,
        content: RoomMessageEventContent,
    ) -> Result<(), BridgeError>;

    /// Sends a message as `ghost`.
    async fn send_message_as(
        &self,
        room: &RoomHandle,
        ghost: &GhostHandle,
        content: RoomMessageEventContent,
    ) -> Result<(), BridgeError>;

    /// Replies to a command in the room it was issued in.
    async fn reply(&self, room_id: &RoomId, body: &str) -> Result<(), BridgeError>;

    /// Marks `event` as read to show the user it was processed.
    async fn mark_read(&self, event: &RoomEvent, room: &Room) -> Result<(), BridgeError>;
}

/// Issues and resolves ghosts.
#[automock]
#[async_trait]
pub trait GhostRegistry: Send + Sync {
    /// Returns the ghost of a remote user, registering it if needed.
    async fn new_ghost(
        &self,
        remote_id: &str,
        remote_name: &str,
        local_name: &str,
        avatar: Option<OwnedMxcUri>,
    ) -> GhostHandle;

    /// Resolves a ghost referenced by a persisted room.
    async fn get_ghost(&self, ghost: &GhostRef) -> Option<GhostHandle>;
}

/// Describes new rooms and brings persisted ones back to life.
#[automock]
#[async_trait]
pub trait RoomOrchestrator: Send + Sync {
    /// Restores the intents of a room read from the snapshot.
    async fn load_room(&self, room: &Room) -> Result<(), BridgeError>;

    /// Describes a room bridged to the conversation with `ghost`.
    fn new_room(&self, name: &str, topic: &str, ghost: &GhostHandle) -> PendingRoom;
}

/// Transport towards the remote network.
#[automock]
#[async_trait]
pub trait RemoteNetwork: Send + Sync {
    /// Relays a Matrix message to a remote conversation.
    async fn send_message(
        &self,
        remote_room: &str,
        sender: &User,
        body: &str,
    ) -> Result<(), BridgeError>;
}
