//! Relay-mode host runtime on top of `matrix-sdk`.
//!
//! The bridge logs in as an ordinary Matrix account and speaks for its ghosts:
//! - **Login**: password login on the first run, session restore afterwards
//! - **Sync**: auto-join on invite, delivery of timeline events as [`InboundEvent`]s
//! - **Kit**: [`MatrixKit`] and [`VirtualGhosts`] implement the collaborator
//!   traits the connector drives
//!
//! # Examples
//!
//! ```ignore
//! let client = MatrixClient::new(&config.matrix, &data_dir.join("session")).await?;
//! let kit = MatrixKit::new(client.client(), client.user_id(), ghosts);
//! client.sync(|event| println!("{:?}", event), shutdown).await?;
//! ```

use std::path::Path;

use log::{error, info};
use matrix_sdk::{Client, ruma::OwnedUserId};
use tokio_util::sync::CancellationToken;

use crate::{
    config,
    matrix::{login::setup_client, session::MatrixSession, sync::MatrixSync},
};

mod client;
mod ghosts;
mod login;
mod session;
mod sync;

pub use crate::matrix::{client::MatrixKit, ghosts::VirtualGhosts, sync::InboundEvent};

/// The logged-in bot account.
pub struct MatrixClient {
    matrix_sync: MatrixSync,
    client: Client,
    user_id: OwnedUserId,
}

impl MatrixClient {
    /// Logs in, or restores the session stored in `session_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory is unusable or the login fails.
    pub async fn new(credentials: &config::Matrix, session_path: &Path) -> anyhow::Result<Self> {
        let matrix_session = MatrixSession::new(session_path).await?;
        let client = setup_client(credentials, &matrix_session).await?;

        client.account().set_display_name(Some("Ferry bridge")).await?;

        Ok(MatrixClient {
            matrix_sync: MatrixSync::new(&client, &matrix_session),
            client,
            user_id: credentials.user_id.clone(),
        })
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn user_id(&self) -> OwnedUserId {
        self.user_id.clone()
    }

    /// Syncs until `shutdown` is cancelled.
    pub async fn sync<F>(&self, on_event: F, shutdown: CancellationToken)
    where
        F: Fn(InboundEvent) + Send + Sync + 'static,
    {
        match self.matrix_sync.sync(on_event, shutdown).await {
            Ok(()) => info!("matrix sync ended"),
            Err(e) => error!("matrix sync ended with error: {:?}", e),
        }
    }
}
