use std::path::{Path, PathBuf};

use log::{debug, trace};
use matrix_sdk::authentication::matrix;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Session data persisted between runs of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Session {
    /// Access token and device of the bot account
    user_session: matrix::MatrixSession,

    /// The latest sync token, to resume syncing where the last run stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_token: Option<String>,
}

/// Bot account session stored in the data directory.
///
/// # File Structure
///
/// The session directory contains:
/// - `session`: JSON file with the bot login and sync token
/// - `sqlite`: SQLite database for Matrix SDK state
#[derive(Clone)]
pub struct MatrixSession {
    /// The stored session, `None` before the first login
    session: Option<Session>,
    sqlite_path: PathBuf,
    session_path: PathBuf,
}

impl MatrixSession {
    /// Reads the session stored in `dir_path`, if any.
    ///
    /// The directory is created when missing. A missing or unreadable session
    /// file means the bridge has to log in again.
    pub async fn new(dir_path: &Path) -> anyhow::Result<MatrixSession> {
        debug!("read session at {}", dir_path.display());
        fs::create_dir_all(dir_path).await?;

        let sqlite_path = dir_path.join("sqlite");
        let session_path = dir_path.join("session");

        let session = match MatrixSession::read_session(&session_path).await {
            Ok(session) => Some(session),
            Err(e) => {
                debug!("no usable session: {}", e);
                None
            }
        };

        Ok(MatrixSession {
            session,
            sqlite_path,
            session_path,
        })
    }

    async fn read_session(session_path: &Path) -> anyhow::Result<Session> {
        if !fs::try_exists(session_path).await.unwrap_or_default() {
            anyhow::bail!("session file does not exist");
        }

        let session_data = fs::read_to_string(session_path).await?;
        Ok(serde_json::from_str(&session_data)?)
    }

    #[cfg(test)]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub fn user_session(&self) -> Option<&matrix::MatrixSession> {
        self.session.as_ref().map(|s| &s.user_session)
    }

    pub fn sync_token(&self) -> Option<String> {
        self.session.as_ref().and_then(|s| s.sync_token.clone())
    }

    /// Stores a new sync token next to the user session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be read, parsed, or written.
    pub async fn persist_sync_token(&self, sync_token: String) -> anyhow::Result<()> {
        trace!("persist sync token {}", sync_token);

        let mut session = MatrixSession::read_session(&self.session_path).await?;
        session.sync_token = Some(sync_token);
        fs::write(&self.session_path, serde_json::to_string(&session)?).await?;

        Ok(())
    }

    /// Stores the user session of a fresh login, dropping any sync token.
    pub async fn persist_user_session(
        &self,
        user_session: &matrix::MatrixSession,
    ) -> anyhow::Result<()> {
        trace!("persist user session");

        let session = Session {
            user_session: user_session.clone(),
            sync_token: None,
        };
        fs::write(&self.session_path, serde_json::to_string(&session)?).await?;

        Ok(())
    }
}
