//! Configuration file structures for the bridge.
//!
//! The configuration is a YAML file merged with environment variables
//! prefixed with `FERRY_` (nested keys are separated by `__`, e.g.
//! `FERRY_MATRIX__PASSWORD`).
//!
//! # Configuration File Format
//!
//! ```yaml
//! # Bot account the bridge logs in with
//! matrix:
//!   user_id: "@ferry:example.org"
//!   password: "secret-password"
//!
//! bridge:
//!   # Commands are `!<command_prefix> <command>`
//!   command_prefix: "ferry"
//!   # Localpart of ghosts, `{}` is replaced by the ghost username
//!   username_template: "ferry_{}"
//!   # Seconds before a collaborator call is abandoned
//!   collaborator_timeout: 30
//!   permissions:
//!     "*": relay
//!     "example.org": user
//!     "@admin:example.org": admin
//!
//! # What the `login` command provisions
//! provisioning:
//!   room_name: "Test Room"
//!   room_topic: "Some Topic"
//!   ghost_remote_id: "SomeUserID"
//!   ghost_remote_name: "Test User"
//!   ghost_username: "user_name"
//!   bot_welcome: "Hello, I'm a bot"
//!   ghost_welcome: "Hello, I'm a ghost"
//!
//! store:
//!   backend: json   # or memory
//!   file: db.json
//! ```
//!
//! Every section but `matrix` is optional.

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use matrix_sdk::ruma::{OwnedMxcUri, OwnedUserId};
use serde::Deserialize;

use crate::{persistence::StorageBackend, store::Permissions};

/// Root configuration structure of the bridge.
///
/// # Examples
///
/// ```ignore
/// let config = Config::load("config.yaml")?;
/// println!("Matrix User: {}", config.matrix.user_id);
/// ```
#[derive(Debug, Deserialize)]
pub struct Config {
    pub matrix: Matrix,
    #[serde(default)]
    pub bridge: Bridge,
    #[serde(default)]
    pub provisioning: Provisioning,
    #[serde(default)]
    pub store: Store,
}

impl Config {
    /// Loads the configuration from a YAML file and `FERRY_` environment variables.
    ///
    /// Environment variables take precedence over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or if a required value is
    /// missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("FERRY_").split("__"))
    }
}

/// Matrix account configuration.
#[derive(Debug, Deserialize)]
pub struct Matrix {
    /// Fully qualified Matrix user ID of the bridge bot.
    ///
    /// # Examples
    ///
    /// - `@ferry:matrix.org`
    pub user_id: OwnedUserId,

    /// Matrix account password.
    ///
    /// Used for initial login. After successful authentication, the session
    /// is persisted and the bridge restores it without re-authenticating.
    pub password: String,

    /// Passphrase of the local sqlite store, not encrypted when unset.
    #[serde(default)]
    pub passphrase: Option<String>,
}

/// Bridge behavior.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Bridge {
    pub command_prefix: String,
    /// Ghost localpart template, `{}` is replaced by the ghost username
    pub username_template: String,
    /// Upper bound of every collaborator call, in seconds
    pub collaborator_timeout: u64,
    /// Permission levels granted to new users
    pub permissions: Permissions,
}

impl Bridge {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout)
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Bridge {
            command_prefix: "ferry".to_string(),
            username_template: "ferry_{}".to_string(),
            collaborator_timeout: 30,
            permissions: Permissions::default(),
        }
    }
}

/// The room and ghost provisioned by the `login` command.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Provisioning {
    pub room_name: String,
    pub room_topic: String,
    /// Remote identifier of the provisioned ghost
    pub ghost_remote_id: String,
    pub ghost_remote_name: String,
    /// Username the ghost localpart is built from
    pub ghost_username: String,
    pub ghost_avatar: Option<OwnedMxcUri>,
    /// First message sent by the bot in the provisioned room
    pub bot_welcome: String,
    /// First message sent by the ghost in the provisioned room
    pub ghost_welcome: String,
}

impl Default for Provisioning {
    fn default() -> Self {
        Provisioning {
            room_name: "Test Room".to_string(),
            room_topic: "Some Topic".to_string(),
            ghost_remote_id: "SomeUserID".to_string(),
            ghost_remote_name: "Test User".to_string(),
            ghost_username: "user_name".to_string(),
            ghost_avatar: None,
            bot_welcome: "Hello, I'm a bot".to_string(),
            ghost_welcome: "Hello, I'm a ghost".to_string(),
        }
    }
}

/// Identity store persistence.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Store {
    pub backend: StorageBackend,
    /// Snapshot file name, relative to the data directory
    pub file: String,
}

impl Default for Store {
    fn default() -> Self {
        Store {
            backend: StorageBackend::Json,
            file: "db.json".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use matrix_sdk::ruma::user_id;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::store::PermissionLevel;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let file = write_config(
            "matrix:\n  user_id: \"@ferry:example.org\"\n  password: \"secret\"\n",
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.matrix.user_id.as_str(), "@ferry:example.org");
        assert_eq!(config.matrix.passphrase, None);
        assert_eq!(config.bridge.command_prefix, "ferry");
        assert_eq!(config.bridge.collaborator_timeout(), Duration::from_secs(30));
        assert_eq!(config.provisioning.room_name, "Test Room");
        assert_eq!(config.provisioning.ghost_welcome, "Hello, I'm a ghost");
        assert_eq!(config.store.backend, StorageBackend::Json);
        assert_eq!(config.store.file, "db.json");
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
matrix:
  user_id: "@bridge:example.org"
  password: "secret"
bridge:
  command_prefix: "bridge"
  collaborator_timeout: 5
  permissions:
    "*": relay
    "@admin:example.org": admin
provisioning:
  room_name: "Lobby"
store:
  backend: memory
"#,
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.bridge.command_prefix, "bridge");
        assert_eq!(config.bridge.username_template, "ferry_{}");
        assert_eq!(config.bridge.collaborator_timeout(), Duration::from_secs(5));
        assert_eq!(
            config
                .bridge
                .permissions
                .level_for(user_id!("@admin:example.org")),
            PermissionLevel::Admin
        );
        assert_eq!(
            config
                .bridge
                .permissions
                .level_for(user_id!("@bob:other.org")),
            PermissionLevel::Relay
        );
        assert_eq!(config.provisioning.room_name, "Lobby");
        assert_eq!(config.provisioning.room_topic, "Some Topic");
        assert_eq!(config.store.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_load_missing_matrix_section_fails() {
        let file = write_config("bridge:\n  command_prefix: \"ferry\"\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_invalid_user_id_fails() {
        let file = write_config("matrix:\n  user_id: \"not-a-user-id\"\n  password: \"secret\"\n");
        assert!(Config::load(file.path()).is_err());
    }
}
