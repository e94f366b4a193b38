//! Relay-mode ghosts.
//!
//! Without an appservice registration the bridge cannot own Matrix accounts
//! for remote users. Ghosts are therefore virtual: they get a Matrix user ID
//! built from the username template, but every message "sent as a ghost" is
//! sent by the bot with the ghost's name prepended.

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, warn};
use matrix_sdk::ruma::{OwnedMxcUri, OwnedServerName, OwnedUserId, UserId};
use tokio::sync::Mutex;

use crate::{
    kit::{BridgeError, GhostHandle, GhostRegistry},
    store::GhostRef,
};

/// Builds the Matrix user ID of a ghost.
///
/// # Examples
///
/// ```ignore
/// let id = ghost_user_id("ferry_{}", "user_name", "example.org")?;
/// assert_eq!(id, "@ferry_user_name:example.org");
/// ```
pub fn ghost_user_id(
    template: &str,
    local_name: &str,
    server_name: &str,
) -> Result<OwnedUserId, BridgeError> {
    let localpart = template.replace("{}", &local_name.to_lowercase());
    UserId::parse(format!("@{}:{}", localpart, server_name))
        .map_err(|e| BridgeError::InvalidId(format!("{}: {}", localpart, e)))
}

/// Registry of the virtual ghosts, keyed by remote user ID.
pub struct VirtualGhosts {
    username_template: String,
    server_name: OwnedServerName,
    /// Used when a ghost user ID cannot be built
    bot: OwnedUserId,
    ghosts: Mutex<HashMap<String, GhostHandle>>,
}

impl VirtualGhosts {
    pub fn new(username_template: &str, bot: OwnedUserId) -> Self {
        VirtualGhosts {
            username_template: username_template.to_string(),
            server_name: bot.server_name().to_owned(),
            bot,
            ghosts: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl GhostRegistry for VirtualGhosts {
    async fn new_ghost(
        &self,
        remote_id: &str,
        remote_name: &str,
        local_name: &str,
        avatar: Option<OwnedMxcUri>,
    ) -> GhostHandle {
        let mxid = ghost_user_id(&self.username_template, local_name, self.server_name.as_str())
            .unwrap_or_else(|e| {
                warn!("ghost of {} speaks as the bot: {}", remote_id, e);
                self.bot.clone()
            });

        let ghost = GhostHandle {
            mxid,
            remote_id: remote_id.to_string(),
            remote_name: remote_name.to_string(),
            local_name: local_name.to_string(),
            avatar,
        };
        debug!("registered ghost {} for {}", ghost.mxid, remote_id);

        self.ghosts
            .lock()
            .await
            .insert(remote_id.to_string(), ghost.clone());
        ghost
    }

    /// Returns the ghost behind `ghost`, or `None` if it belongs to another
    /// homeserver.
    async fn get_ghost(&self, ghost: &GhostRef) -> Option<GhostHandle> {
        if ghost.mxid.server_name().as_str() != self.server_name.as_str() {
            warn!("ghost {} is not on {}", ghost.mxid, self.server_name);
            return None;
        }

        let mut ghosts = self.ghosts.lock().await;

        // Ghosts of a previous run are rebuilt from the room snapshot
        let handle = ghosts
            .entry(ghost.remote_id.clone())
            .or_insert_with(|| GhostHandle {
                mxid: ghost.mxid.clone(),
                remote_id: ghost.remote_id.clone(),
                remote_name: ghost.remote_id.clone(),
                local_name: ghost.mxid.localpart().to_string(),
                avatar: None,
            });

        Some(handle.clone())
    }
}

#[cfg(test)]
mod tests {
    use matrix_sdk::ruma::user_id;

    use super::*;

    fn create_registry() -> VirtualGhosts {
        VirtualGhosts::new("ferry_{}", user_id!("@ferry:example.org").to_owned())
    }

    #[test]
    fn test_ghost_user_id_uses_template() {
        let id = ghost_user_id("ferry_{}", "User_Name", "example.org").unwrap();
        assert_eq!(id.as_str(), "@ferry_user_name:example.org");
    }

    #[test]
    fn test_ghost_user_id_invalid_localpart() {
        let result = ghost_user_id("ferry_{}", "has:colon", "example.org");
        assert!(matches!(result, Err(BridgeError::InvalidId(_))));
    }

    #[tokio::test]
    async fn test_new_ghost() {
        let registry = create_registry();

        let ghost = registry
            .new_ghost("SomeUserID", "Test User", "user_name", None)
            .await;

        assert_eq!(ghost.mxid.as_str(), "@ferry_user_name:example.org");
        assert_eq!(ghost.remote_name, "Test User");
    }

    #[tokio::test]
    async fn test_invalid_ghost_falls_back_to_bot() {
        let registry = create_registry();

        let ghost = registry
            .new_ghost("SomeUserID", "Test User", "has:colon", None)
            .await;

        assert_eq!(ghost.mxid.as_str(), "@ferry:example.org");
    }

    #[tokio::test]
    async fn test_get_known_ghost() {
        let registry = create_registry();
        let ghost = registry
            .new_ghost("SomeUserID", "Test User", "user_name", None)
            .await;

        let found = registry.get_ghost(&ghost.to_ref()).await;
        assert_eq!(found, Some(ghost));
    }

    #[tokio::test]
    async fn test_get_ghost_rebuilds_persisted_reference() {
        let registry = create_registry();

        let found = registry
            .get_ghost(&GhostRef {
                mxid: user_id!("@ferry_user_name:example.org").to_owned(),
                remote_id: "SomeUserID".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(found.remote_id, "SomeUserID");
        assert_eq!(found.local_name, "ferry_user_name");
    }

    #[tokio::test]
    async fn test_get_ghost_of_other_server() {
        let registry = create_registry();

        let found = registry
            .get_ghost(&GhostRef {
                mxid: user_id!("@ferry_user_name:other.org").to_owned(),
                remote_id: "SomeUserID".to_string(),
            })
            .await;

        assert!(found.is_none());
    }
}
