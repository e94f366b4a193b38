//! Values exchanged with the bridge collaborators.

use matrix_sdk::ruma::{
    OwnedEventId, OwnedMxcUri, OwnedRoomId, OwnedUserId, RoomId, UserId,
    events::TimelineEventType,
};
use serde_json::Value;

use crate::{
    kit::{BridgedRoom, RemoteIdentity},
    store::{GhostRef, Room},
};

/// A puppet identity standing for a remote user inside Matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GhostHandle {
    /// Matrix user ID of the ghost
    pub mxid: OwnedUserId,
    /// Identifier of the remote user
    pub remote_id: String,
    /// Display name of the remote user
    pub remote_name: String,
    /// Username used to build the ghost's Matrix localpart
    pub local_name: String,
    pub avatar: Option<OwnedMxcUri>,
}

impl GhostHandle {
    /// Returns the reference stored in rooms provisioned with this ghost.
    pub fn to_ref(&self) -> GhostRef {
        GhostRef {
            mxid: self.mxid.clone(),
            remote_id: self.remote_id.clone(),
        }
    }
}

impl RemoteIdentity for GhostHandle {
    fn matrix_id(&self) -> &UserId {
        &self.mxid
    }

    fn remote_id(&self) -> &str {
        &self.remote_id
    }

    fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

/// A room described by the room orchestrator but not created on the homeserver yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRoom {
    pub name: String,
    pub topic: String,
    /// Remote conversation the room will be bridged to
    pub remote_id: String,
    /// Ghost that the room is created for
    pub ghost: GhostHandle,
}

/// A room that exists on the homeserver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomHandle {
    /// Record to keep in the identity store
    pub room: Room,
    /// User the room speaks through by default, the ghost for provisioned rooms
    pub main_intent: OwnedUserId,
}

impl BridgedRoom for RoomHandle {
    fn room_id(&self) -> &RoomId {
        &self.room.mxid
    }

    fn remote_id(&self) -> &str {
        &self.room.remote_id
    }
}

/// Extra information returned by room creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoomInfo {
    /// `false` when an existing room was reused
    pub is_new: bool,
}

/// A Matrix room event delivered by the host runtime.
#[derive(Clone, Debug)]
pub struct RoomEvent {
    pub event_id: OwnedEventId,
    pub room_id: OwnedRoomId,
    pub sender: OwnedUserId,
    pub kind: TimelineEventType,
    /// Raw event content
    pub content: Value,
}

impl RoomEvent {
    /// Returns the plain text body of a message event.
    pub fn body(&self) -> Option<&str> {
        self.content.get("body")?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use matrix_sdk::ruma::{event_id, room_id, user_id};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ghost_to_ref() {
        let ghost = GhostHandle {
            mxid: user_id!("@ferry_user_name:example.org").to_owned(),
            remote_id: "SomeUserID".to_string(),
            remote_name: "Test User".to_string(),
            local_name: "user_name".to_string(),
            avatar: None,
        };

        let ghost_ref = ghost.to_ref();
        assert_eq!(ghost_ref.mxid, ghost.mxid);
        assert_eq!(ghost_ref.remote_id, "SomeUserID");
        assert!(ghost.is_logged_in());
    }

    #[test]
    fn test_room_event_body() {
        let event = RoomEvent {
            event_id: event_id!("$event:example.org").to_owned(),
            room_id: room_id!("!room:example.org").to_owned(),
            sender: user_id!("@alice:example.org").to_owned(),
            kind: TimelineEventType::RoomMessage,
            content: json!({"msgtype": "m.text", "body": "hello"}),
        };

        assert_eq!(event.body(), Some("hello"));
    }

    #[test]
    fn test_room_event_without_body() {
        let event = RoomEvent {
            event_id: event_id!("$event:example.org").to_owned(),
            room_id: room_id!("!room:example.org").to_owned(),
            sender: user_id!("@alice:example.org").to_owned(),
            kind: TimelineEventType::Reaction,
            content: json!({"m.relates_to": {}}),
        };

        assert_eq!(event.body(), None);
    }
}
