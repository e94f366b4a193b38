//! Bridged user records.
//!
//! This module provides the [`User`] struct, the store's representation of a
//! Matrix user known to the bridge, and the [`PermissionLevel`] granted to it.

use matrix_sdk::ruma::{OwnedRoomId, OwnedUserId, UserId};
use serde::{Deserialize, Serialize};

use crate::kit::RemoteIdentity;

/// Access level of a Matrix user on the bridge.
///
/// Levels are ordered: `None < Relay < User < Admin`. A command registered
/// with a required level accepts every user whose level is greater or equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    /// The user may not interact with the bridge at all
    #[default]
    None,
    /// The user's messages may be relayed, but it cannot log in
    Relay,
    /// The user may log in and get bridged rooms
    User,
    /// The user may run every command
    Admin,
}

/// A Matrix user known to the bridge.
///
/// The Matrix user ID is the primary key of the identity store. The remote
/// fields stay empty until the user logs in to the remote network.
///
/// # Examples
///
/// ```ignore
/// let user = User::new(user_id!("@alice:example.org").to_owned(), PermissionLevel::User);
/// assert!(!user.is_logged_in());
/// assert_eq!(user.display_name, "alice");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Matrix user ID
    pub mxid: OwnedUserId,
    /// Identifier of the user on the remote network, empty when not logged in
    #[serde(default)]
    pub remote_id: String,
    /// Display name of the user on the remote network
    #[serde(default)]
    pub remote_name: String,
    /// Display name used on the Matrix side
    pub display_name: String,
    /// Access level on the bridge
    pub permission_level: PermissionLevel,
    /// Private room used by the user to talk to the bridge bot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_room: Option<OwnedRoomId>,
}

impl User {
    /// Creates a user that has not logged in yet.
    ///
    /// Both display names default to the localpart of the Matrix user ID.
    pub fn new(mxid: OwnedUserId, permission_level: PermissionLevel) -> Self {
        let localpart = mxid.localpart().to_owned();

        User {
            mxid,
            remote_id: String::new(),
            remote_name: localpart.clone(),
            display_name: localpart,
            permission_level,
            management_room: None,
        }
    }
}

impl RemoteIdentity for User {
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

#[cfg(test)]
mod tests {
    use matrix_sdk::ruma::{room_id, user_id};

    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = User::new(user_id!("@alice:example.org").to_owned(), PermissionLevel::User);

        assert_eq!(user.display_name, "alice");
        assert_eq!(user.remote_name, "alice");
        assert!(user.remote_id.is_empty());
        assert!(user.management_room.is_none());
        assert!(!user.is_logged_in());
    }

    #[test]
    fn test_logged_in_once_remote_id_is_set() {
        let mut user = User::new(user_id!("@bob:example.org").to_owned(), PermissionLevel::User);
        user.remote_id = "bob-remote".to_string();

        assert!(user.is_logged_in());
    }

    #[test]
    fn test_permission_levels_are_ordered() {
        assert!(PermissionLevel::None < PermissionLevel::Relay);
        assert!(PermissionLevel::Relay < PermissionLevel::User);
        assert!(PermissionLevel::User < PermissionLevel::Admin);
    }

    #[test]
    fn test_serialization_skips_missing_management_room() {
        let mut user = User::new(user_id!("@carol:example.org").to_owned(), PermissionLevel::Admin);
        let serialized = serde_json::to_string(&user).unwrap();
        assert!(!serialized.contains("management_room"));
        assert!(serialized.contains("\"admin\""));

        user.management_room = Some(room_id!("!mgmt:example.org").to_owned());
        let serialized = serde_json::to_string(&user).unwrap();
        let deserialized: User = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, user);
    }
}
