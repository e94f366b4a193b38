//! Placeholder transport towards the remote network.

use async_trait::async_trait;
use log::info;

use crate::{
    kit::{BridgeError, RemoteIdentity, RemoteNetwork},
    store::User,
};

/// Remote network that only logs what it would send.
#[derive(Debug, Default)]
pub struct LoggingNetwork;

#[async_trait]
impl RemoteNetwork for LoggingNetwork {
    async fn send_message(
        &self,
        remote_room: &str,
        sender: &User,
        body: &str,
    ) -> Result<(), BridgeError> {
        info!(
            "[remote] {} ({}) -> {}: {}",
            sender.remote_name(),
            sender.remote_id(),
            remote_room,
            body
        );
        Ok(())
    }
}
