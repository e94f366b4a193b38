//! Inbound Matrix room events.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use log::{debug, info};
use matrix_sdk::ruma::events::TimelineEventType;
use tokio_util::sync::CancellationToken;

use crate::{
    kit::{BridgeError, BridgedRoom, RemoteIdentity, RoomEvent},
    router::{Actor, CallGuard, Connector, Dispatch, Step},
    store::Room,
};

impl Connector {
    /// Handles a Matrix event delivered by the host runtime.
    ///
    /// The room is resolved as a shell when unknown and an unknown sender
    /// becomes an [`Actor::Unauthenticated`]; neither stops the dispatch.
    /// The event is always marked as read, once, after kind-specific
    /// handling, whether or not that handling succeeded.
    pub async fn handle_room_event(&self, event: RoomEvent, cancel: CancellationToken) -> Dispatch {
        let mut dispatch = Dispatch::new(format!("{} in {}", event.kind, event.room_id));
        let guard = CallGuard::new(cancel, self.timeout);

        let room = self.get_room(&event.room_id).await;
        let actor = match self.get_user(&event.sender, false).await {
            Some(user) => Actor::Bridged(user),
            None => Actor::Unauthenticated(event.sender.clone()),
        };

        dispatch.handling();

        let handled = AssertUnwindSafe(self.handle_by_kind(&event, &room, &actor, &guard))
            .catch_unwind()
            .await
            .unwrap_or(Err(BridgeError::Panicked));
        dispatch.record(Step::HandleEvent, handled);

        dispatch.record(
            Step::MarkRead,
            guard.run(self.facade.mark_read(&event, &room)).await,
        );

        dispatch.finish()
    }

    async fn handle_by_kind(
        &self,
        event: &RoomEvent,
        room: &Room,
        actor: &Actor,
        guard: &CallGuard,
    ) -> Result<(), BridgeError> {
        match event.kind {
            TimelineEventType::RoomMessage => {
                let body = event.body().unwrap_or_default();
                match actor {
                    Actor::Bridged(user) => info!(
                        "{} ({}) in {}: {}",
                        user.display_name,
                        user.matrix_id(),
                        room.room_id(),
                        body
                    ),
                    Actor::Unauthenticated(sender) => {
                        info!("{} (unauthenticated) in {}: {}", sender, room.mxid, body)
                    }
                }

                match actor {
                    Actor::Bridged(user) if !room.is_shell() && user.is_logged_in() => {
                        guard
                            .run(self.network.send_message(room.remote_id(), user, body))
                            .await
                    }
                    _ => {
                        debug!("not relaying message of {} in {}", event.sender, room.mxid);
                        Ok(())
                    }
                }
            }
            _ => {
                debug!("unhandled {} event {}", event.kind, event.event_id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc, time::Duration};

    use async_trait::async_trait;
    use matrix_sdk::ruma::{OwnedRoomId, event_id, room_id, user_id};
    use serde_json::json;

    use super::*;
    use crate::{
        config::Provisioning,
        kit::{
            MockBridgeFacade, MockGhostRegistry, MockRemoteNetwork, MockRoomOrchestrator,
            RemoteNetwork,
        },
        persistence::MemoryStorage,
        router::{Collaborators, dispatch::DispatchState},
        store::{IdentityStore, PermissionLevel, Permissions, User},
    };

    fn create_event(room_id: OwnedRoomId, kind: TimelineEventType) -> RoomEvent {
        RoomEvent {
            event_id: event_id!("$event:example.org").to_owned(),
            room_id,
            sender: user_id!("@alice:example.org").to_owned(),
            kind,
            content: json!({"msgtype": "m.text", "body": "hello"}),
        }
    }

    async fn create_store_with_bridged_room() -> Arc<IdentityStore> {
        let store = Arc::new(IdentityStore::new(Permissions::new(HashMap::from([(
            "*".to_string(),
            PermissionLevel::User,
        )]))));
        store.get_user(user_id!("@alice:example.org"), true).await;
        store
            .complete_login(user_id!("@alice:example.org"), "alice-42", "Alice")
            .await;

        let mut room = Room::shell(room_id!("!bridged:example.org").to_owned());
        room.remote_id = "conversation-1".to_string();
        store.insert_room(room).await;
        store
    }

    fn create_connector(
        store: Arc<IdentityStore>,
        facade: MockBridgeFacade,
        network: MockRemoteNetwork,
    ) -> Connector {
        Connector::new(
            store,
            Arc::new(MemoryStorage::new()),
            Collaborators {
                facade: Arc::new(facade),
                ghosts: Arc::new(MockGhostRegistry::new()),
                rooms: Arc::new(MockRoomOrchestrator::new()),
                network: Arc::new(network),
            },
            Provisioning::default(),
            Duration::from_secs(5),
        )
    }

    fn facade_marking_read_once() -> MockBridgeFacade {
        let mut facade = MockBridgeFacade::new();
        facade
            .expect_mark_read()
            .times(1)
            .returning(|_, _| Ok(()));
        facade
    }

    #[tokio::test]
    async fn test_message_relayed_to_remote_conversation() {
        let mut network = MockRemoteNetwork::new();
        network
            .expect_send_message()
            .withf(|remote_room, sender, body| {
                remote_room == "conversation-1" && sender.remote_id == "alice-42" && body == "hello"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let connector = create_connector(
            create_store_with_bridged_room().await,
            facade_marking_read_once(),
            network,
        );
        let dispatch = connector
            .handle_room_event(
                create_event(
                    room_id!("!bridged:example.org").to_owned(),
                    TimelineEventType::RoomMessage,
                ),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(dispatch.state(), DispatchState::Idle);
        assert_eq!(dispatch.completed(), &[Step::HandleEvent, Step::MarkRead]);
    }

    #[tokio::test]
    async fn test_mark_read_runs_even_if_relay_fails() {
        let mut network = MockRemoteNetwork::new();
        network
            .expect_send_message()
            .times(1)
            .returning(|_, _, _| Err(BridgeError::Request("remote down".to_string())));

        let connector = create_connector(
            create_store_with_bridged_room().await,
            facade_marking_read_once(),
            network,
        );
        let dispatch = connector
            .handle_room_event(
                create_event(
                    room_id!("!bridged:example.org").to_owned(),
                    TimelineEventType::RoomMessage,
                ),
                CancellationToken::new(),
            )
            .await;

        assert!(dispatch.failed(Step::HandleEvent));
        assert_eq!(dispatch.completed(), &[Step::MarkRead]);
    }

    #[tokio::test]
    async fn test_unknown_sender_and_room_still_marked_read() {
        let mut facade = MockBridgeFacade::new();
        facade
            .expect_mark_read()
            .withf(|event, room| event.room_id == room.mxid && room.is_shell())
            .times(1)
            .returning(|_, _| Ok(()));
        let mut network = MockRemoteNetwork::new();
        network.expect_send_message().never();

        let store = Arc::new(IdentityStore::new(Permissions::default()));
        let connector = create_connector(Arc::clone(&store), facade, network);
        let dispatch = connector
            .handle_room_event(
                create_event(
                    room_id!("!unknown:example.org").to_owned(),
                    TimelineEventType::RoomMessage,
                ),
                CancellationToken::new(),
            )
            .await;

        assert!(dispatch.errors().is_empty());
        // neither the sender nor the room are created by a room event
        assert_eq!(store.counts().await, (0, 0));
    }

    #[tokio::test]
    async fn test_unhandled_kind_is_marked_read() {
        let mut network = MockRemoteNetwork::new();
        network.expect_send_message().never();

        let connector = create_connector(
            create_store_with_bridged_room().await,
            facade_marking_read_once(),
            network,
        );
        let dispatch = connector
            .handle_room_event(
                create_event(
                    room_id!("!bridged:example.org").to_owned(),
                    TimelineEventType::Reaction,
                ),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(dispatch.completed(), &[Step::HandleEvent, Step::MarkRead]);
    }

    struct PanickingNetwork;

    #[async_trait]
    impl RemoteNetwork for PanickingNetwork {
        async fn send_message(&self, _: &str, _: &User, _: &str) -> Result<(), BridgeError> {
            panic!("transport bug")
        }
    }

    #[tokio::test]
    async fn test_panicking_handler_still_marked_read() {
        let connector = Connector::new(
            create_store_with_bridged_room().await,
            Arc::new(MemoryStorage::new()),
            Collaborators {
                facade: Arc::new(facade_marking_read_once()),
                ghosts: Arc::new(MockGhostRegistry::new()),
                rooms: Arc::new(MockRoomOrchestrator::new()),
                network: Arc::new(PanickingNetwork),
            },
            Provisioning::default(),
            Duration::from_secs(5),
        );
        let dispatch = connector
            .handle_room_event(
                create_event(
                    room_id!("!bridged:example.org").to_owned(),
                    TimelineEventType::RoomMessage,
                ),
                CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            dispatch.errors()[0].source,
            BridgeError::Panicked
        ));
        assert_eq!(dispatch.completed(), &[Step::MarkRead]);
    }

    #[tokio::test]
    async fn test_cancelled_event_reports_mark_read_failure() {
        let mut facade = MockBridgeFacade::new();
        facade.expect_mark_read().returning(|_, _| Ok(()));
        let mut network = MockRemoteNetwork::new();
        network.expect_send_message().returning(|_, _, _| Ok(()));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let connector = create_connector(create_store_with_bridged_room().await, facade, network);
        let dispatch = connector
            .handle_room_event(
                create_event(
                    room_id!("!bridged:example.org").to_owned(),
                    TimelineEventType::RoomMessage,
                ),
                cancel,
            )
            .await;

        assert!(dispatch.failed(Step::HandleEvent));
        assert!(dispatch.failed(Step::MarkRead));
        assert!(dispatch.completed().is_empty());
    }
}
