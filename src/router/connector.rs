//! The bridge connector: lifecycle and identity resolution.
//!
//! This module provides the [`Connector`], the event router sitting between
//! the host runtime and the identity store. The event handlers themselves
//! live in the `login` and `room_event` modules.

use std::{sync::Arc, time::Duration};

use futures::FutureExt;
use log::{error, info};
use matrix_sdk::ruma::{RoomId, UserId};
use tokio_util::sync::CancellationToken;

use crate::{
    commands::{CommandEvent, CommandRegistry, CommandSpec, HelpSection},
    config::Provisioning,
    kit::{BridgeFacade, GhostRegistry, RemoteNetwork, RoomOrchestrator},
    persistence::{PersistenceError, SnapshotStorage},
    router::CallGuard,
    store::{IdentityStore, PermissionLevel, Room, User},
};

/// Collaborators supplied by the host runtime.
#[derive(Clone)]
pub struct Collaborators {
    pub facade: Arc<dyn BridgeFacade>,
    pub ghosts: Arc<dyn GhostRegistry>,
    pub rooms: Arc<dyn RoomOrchestrator>,
    pub network: Arc<dyn RemoteNetwork>,
}

/// Routes inbound events between Matrix and the remote network.
///
/// The connector is stateless between events: everything it knows lives in
/// the [`IdentityStore`]. It is shared behind an `Arc` by the host runtime,
/// which delivers events concurrently.
///
/// # Lifecycle
///
/// 1. [`Connector::init`] hydrates the store and loads persisted rooms
/// 2. [`Connector::register_commands`] registers the `login` command
/// 3. [`Connector::start`] announces that the bridge is ready
/// 4. events are delivered through [`Connector::handle_login`] and
///    [`Connector::handle_room_event`]
/// 5. [`Connector::stop`] flushes the store
///
/// # Examples
///
/// ```ignore
/// let connector = Arc::new(Connector::new(store, storage, collaborators, provisioning, timeout));
/// connector.init().await;
/// connector.register_commands(&mut registry);
/// connector.start(bot_user_id);
/// // ... deliver events ...
/// connector.stop().await?;
/// ```
pub struct Connector {
    pub(super) store: Arc<IdentityStore>,
    storage: Arc<dyn SnapshotStorage>,
    pub(super) facade: Arc<dyn BridgeFacade>,
    pub(super) ghosts: Arc<dyn GhostRegistry>,
    pub(super) rooms: Arc<dyn RoomOrchestrator>,
    pub(super) network: Arc<dyn RemoteNetwork>,
    /// What the login flow provisions
    pub(super) provisioning: Provisioning,
    /// Upper bound of every collaborator call
    pub(super) timeout: Duration,
}

impl Connector {
    pub fn new(
        store: Arc<IdentityStore>,
        storage: Arc<dyn SnapshotStorage>,
        collaborators: Collaborators,
        provisioning: Provisioning,
        timeout: Duration,
    ) -> Self {
        let Collaborators {
            facade,
            ghosts,
            rooms,
            network,
        } = collaborators;

        Connector {
            store,
            storage,
            facade,
            ghosts,
            rooms,
            network,
            provisioning,
            timeout,
        }
    }

    /// Hydrates the identity store and restores the intents of persisted rooms.
    ///
    /// Never fails: a missing snapshot starts an empty store and a room that
    /// cannot be loaded is logged and skipped.
    pub async fn init(&self) {
        info!("initializing connector");
        self.store.hydrate(self.storage.as_ref()).await;

        let guard = CallGuard::new(CancellationToken::new(), self.timeout);
        for room in self.store.rooms().await {
            if let Err(e) = guard.run(self.rooms.load_room(&room)).await {
                error!("failed to load room {}: {}", room.mxid, e);
            }
        }

        let (users, rooms) = self.store.counts().await;
        info!("connector ready with {} users and {} rooms", users, rooms);
    }

    /// Registers the connector's commands.
    pub fn register_commands(self: &Arc<Self>, registry: &mut CommandRegistry) {
        let connector = Arc::clone(self);

        registry.register(
            CommandSpec {
                name: "login",
                section: HelpSection::Authentication,
                help: "Authenticate with the bridge: `login [remote_id] [display name]`",
                permission: PermissionLevel::User,
            },
            Arc::new(move |event: CommandEvent| {
                let connector = Arc::clone(&connector);
                async move {
                    connector.handle_login(event).await;
                }
                .boxed()
            }),
        );
    }

    /// Logs that the bridge is ready to receive commands.
    pub fn start(&self, bot: &UserId, prefix: &str) {
        info!("--------------------");
        info!("bridge started, go ahead and message {}", bot);
        info!("use the `!{} login` command", prefix);
        info!("--------------------");
    }

    /// Flushes the identity store to storage.
    pub async fn stop(&self) -> Result<(), PersistenceError> {
        info!("stopping connector");
        self.store.flush(self.storage.as_ref()).await
    }

    /// Returns the user for `user_id`, creating it when `create` is set.
    pub async fn get_user(&self, user_id: &UserId, create: bool) -> Option<User> {
        self.store.get_user(user_id, create).await
    }

    /// Returns the room for `room_id`, or a shell room if it is unknown.
    pub async fn get_room(&self, room_id: &RoomId) -> Room {
        self.store.get_room(room_id).await
    }

    /// Records the management room of a known user.
    pub async fn set_management_room(&self, user_id: &UserId, room_id: &RoomId) {
        self.store.set_management_room(user_id, room_id).await;
    }
}
