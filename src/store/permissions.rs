//! Permission resolution for newly created users.

use std::collections::HashMap;

use matrix_sdk::ruma::UserId;
use serde::Deserialize;

use crate::store::PermissionLevel;

/// Key matching every user in the permission map.
const WILDCARD: &str = "*";

/// Maps Matrix user IDs, server names or `*` to a [`PermissionLevel`].
///
/// Lookup precedence is: exact user ID, then the user's server name, then the
/// wildcard. Users matching nothing get [`PermissionLevel::None`].
///
/// # YAML Section
///
/// ```yaml
/// permissions:
///   "*": relay
///   "example.org": user
///   "@admin:example.org": admin
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Permissions(HashMap<String, PermissionLevel>);

impl Permissions {
    #[cfg(test)]
    pub fn new(entries: HashMap<String, PermissionLevel>) -> Self {
        Permissions(entries)
    }

    /// Resolves the permission level of `user_id`.
    pub fn level_for(&self, user_id: &UserId) -> PermissionLevel {
        [user_id.as_str(), user_id.server_name().as_str(), WILDCARD]
            .iter()
            .find_map(|key| self.0.get(*key).copied())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use matrix_sdk::ruma::user_id;

    use super::*;

    fn create_permissions() -> Permissions {
        Permissions::new(HashMap::from([
            ("*".to_string(), PermissionLevel::Relay),
            ("example.org".to_string(), PermissionLevel::User),
            ("@admin:example.org".to_string(), PermissionLevel::Admin),
        ]))
    }

    #[test]
    fn test_exact_user_wins() {
        let permissions = create_permissions();
        assert_eq!(
            permissions.level_for(user_id!("@admin:example.org")),
            PermissionLevel::Admin
        );
    }

    #[test]
    fn test_server_name_before_wildcard() {
        let permissions = create_permissions();
        assert_eq!(
            permissions.level_for(user_id!("@alice:example.org")),
            PermissionLevel::User
        );
    }

    #[test]
    fn test_wildcard_fallback() {
        let permissions = create_permissions();
        assert_eq!(
            permissions.level_for(user_id!("@bob:other.org")),
            PermissionLevel::Relay
        );
    }

    #[test]
    fn test_empty_map_denies() {
        let permissions = Permissions::default();
        assert_eq!(
            permissions.level_for(user_id!("@bob:other.org")),
            PermissionLevel::None
        );
    }

    #[test]
    fn test_deserialize_from_yaml_like_map() {
        let permissions: Permissions =
            serde_json::from_str(r#"{"*": "user", "@root:example.org": "admin"}"#).unwrap();
        assert_eq!(
            permissions.level_for(user_id!("@root:example.org")),
            PermissionLevel::Admin
        );
        assert_eq!(
            permissions.level_for(user_id!("@any:example.org")),
            PermissionLevel::User
        );
    }
}
