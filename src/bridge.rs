//! Bridge wiring and main loop.
//!
//! This module provides the [`Bridge`], which connects the Matrix relay
//! runtime, the command registry and the [`Connector`].
//!
//! # Event Flow
//!
//! ```text
//! invite          → auto join → user created → management room recorded → ready message
//! command message → CommandRegistry → handler (login) / help / error reply
//! other event     → Connector::handle_room_event → mark read
//! ```
//!
//! Every event is handled in its own tracked task, with a cancellation token
//! derived from the shutdown token. On shutdown, the store is flushed only
//! once every event task has finished.

use std::{path::Path, sync::Arc};

use log::{error, info, warn};
use matrix_sdk::ruma::{OwnedRoomId, OwnedUserId, events::TimelineEventType};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    commands::{CommandOutcome, CommandParseError, CommandRegistry, format_ready},
    config::Config,
    kit::{BridgeFacade, RoomEvent},
    matrix::{InboundEvent, MatrixClient, MatrixKit, VirtualGhosts},
    persistence::PersistenceError,
    remote::LoggingNetwork,
    router::{Collaborators, Connector, Step},
    store::IdentityStore,
};

/// Everything an event task needs.
#[derive(Clone)]
struct EventContext {
    connector: Arc<Connector>,
    registry: Arc<CommandRegistry>,
    facade: Arc<dyn BridgeFacade>,
    shutdown: CancellationToken,
}

pub struct Bridge {
    matrix_client: Arc<MatrixClient>,
    connector: Arc<Connector>,
    registry: Arc<CommandRegistry>,
    facade: Arc<dyn BridgeFacade>,
}

impl Bridge {
    /// Logs in to Matrix and builds the connector.
    ///
    /// # Arguments
    ///
    /// * `config` - The loaded configuration
    /// * `data_dir` - Directory holding the Matrix session and the snapshot file
    ///
    /// # Errors
    ///
    /// Returns an error if the Matrix login fails.
    pub async fn new(config: Config, data_dir: &Path) -> anyhow::Result<Self> {
        let matrix_client =
            Arc::new(MatrixClient::new(&config.matrix, &data_dir.join("session")).await?);

        let ghosts = Arc::new(VirtualGhosts::new(
            &config.bridge.username_template,
            matrix_client.user_id(),
        ));
        let kit = Arc::new(MatrixKit::new(
            matrix_client.client(),
            matrix_client.user_id(),
            Arc::clone(&ghosts),
        ));

        let store = Arc::new(IdentityStore::new(config.bridge.permissions.clone()));
        let storage = config.store.backend.open(&data_dir.join(&config.store.file));

        let connector = Arc::new(Connector::new(
            store,
            storage,
            Collaborators {
                facade: Arc::clone(&kit) as Arc<dyn BridgeFacade>,
                ghosts,
                rooms: Arc::clone(&kit) as _,
                network: Arc::new(LoggingNetwork),
            },
            config.provisioning,
            config.bridge.collaborator_timeout(),
        ));

        let mut registry = CommandRegistry::new(&config.bridge.command_prefix);
        connector.register_commands(&mut registry);

        Ok(Bridge {
            matrix_client,
            connector,
            registry: Arc::new(registry),
            facade: kit,
        })
    }

    /// Runs the bridge until Ctrl-C or the end of the Matrix sync, then flushes the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity store cannot be flushed.
    pub async fn run(self) -> anyhow::Result<()> {
        self.connector.init().await;
        self.connector
            .start(&self.matrix_client.user_id(), self.registry.prefix());

        let shutdown = CancellationToken::new();
        let tasks = TaskTracker::new();
        let context = EventContext {
            connector: Arc::clone(&self.connector),
            registry: Arc::clone(&self.registry),
            facade: Arc::clone(&self.facade),
            shutdown: shutdown.clone(),
        };

        let on_event = {
            let tasks = tasks.clone();
            move |event: InboundEvent| {
                tasks.spawn(handle_event(event, context.clone()));
            }
        };

        let mut sync_task = tokio::spawn({
            let matrix_client = Arc::clone(&self.matrix_client);
            let shutdown = shutdown.clone();
            async move { matrix_client.sync(on_event, shutdown).await }
        });

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("shutting down"),
            _ = &mut sync_task => warn!("matrix sync stopped, shutting down"),
        }

        shutdown.cancel();
        if !sync_task.is_finished() && let Err(e) = sync_task.await {
            error!("sync task failed: {}", e);
        }

        drain_and_stop(&tasks, &self.connector).await?;
        info!("identity store flushed");
        Ok(())
    }
}

/// Waits for every event task to finish, then flushes the store.
///
/// Call once the sync has stopped delivering events.
async fn drain_and_stop(tasks: &TaskTracker, connector: &Connector) -> Result<(), PersistenceError> {
    tasks.close();
    if !tasks.is_empty() {
        info!("waiting for {} event tasks", tasks.len());
    }
    tasks.wait().await;

    connector.stop().await
}

async fn handle_event(event: InboundEvent, context: EventContext) {
    match event {
        InboundEvent::Invited { room_id, inviter } => {
            handle_invite(room_id, inviter, &context).await
        }
        InboundEvent::Timeline(event) => {
            let is_command = event.kind == TimelineEventType::RoomMessage
                && event
                    .body()
                    .is_some_and(|body| context.registry.is_command(body));

            if is_command {
                handle_command(event, &context).await;
            } else {
                let event_id = event.event_id.clone();
                let dispatch = context
                    .connector
                    .handle_room_event(event, context.shutdown.child_token())
                    .await;
                if dispatch.failed(Step::MarkRead) {
                    warn!("{} stays unread", event_id);
                }
            }
        }
    }
}

/// Makes the room the bot was invited to the inviter's management room.
async fn handle_invite(room_id: OwnedRoomId, inviter: OwnedUserId, context: &EventContext) {
    context.connector.get_user(&inviter, true).await;
    context
        .connector
        .set_management_room(&inviter, &room_id)
        .await;
    info!("{} is the management room of {}", room_id, inviter);

    if let Err(e) = context
        .facade
        .reply(&room_id, &format_ready(context.registry.prefix()))
        .await
    {
        error!("failed to greet {} in {}: {}", inviter, room_id, e);
    }
}

async fn handle_command(event: RoomEvent, context: &EventContext) {
    let Some(user) = context.connector.get_user(&event.sender, true).await else {
        return;
    };
    let body = event.body().unwrap_or_default();

    let reply = match context
        .registry
        .dispatch(
            body,
            &user,
            Some(&event.room_id),
            context.shutdown.child_token(),
        )
        .await
    {
        Ok(CommandOutcome::Handled) | Err(CommandParseError::NotForBot) => return,
        Ok(CommandOutcome::Reply(text)) | Err(CommandParseError::InvalidCommand(text)) => text,
    };

    if let Err(e) = context.facade.reply(&event.room_id, &reply).await {
        error!("failed to reply to {} in {}: {}", user.mxid, event.room_id, e);
    }
}
