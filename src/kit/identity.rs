//! Capability traits the router depends on instead of concrete types.

use matrix_sdk::ruma::{RoomId, UserId};

/// Something that has an identity on both sides of the bridge.
pub trait RemoteIdentity {
    /// Matrix user ID
    fn matrix_id(&self) -> &UserId;
    /// Identifier on the remote network, empty when unknown
    fn remote_id(&self) -> &str;
    /// Display name on the remote network
    fn remote_name(&self) -> &str;

    /// Returns `true` once the identity is tied to a remote account.
    fn is_logged_in(&self) -> bool {
        !self.remote_id().is_empty()
    }
}

/// A Matrix room that may be tied to a remote conversation.
pub trait BridgedRoom {
    /// Matrix room ID
    fn room_id(&self) -> &RoomId;
    /// Remote conversation identifier, empty when the room is not bridged
    fn remote_id(&self) -> &str;

    fn is_bridged(&self) -> bool {
        !self.remote_id().is_empty()
    }
}
