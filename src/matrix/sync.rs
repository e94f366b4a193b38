//! Matrix client synchronization and event delivery.
//!
//! [`MatrixSync::sync`]:
//! 1. Performs an initial sync to catch up on offline events (especially invites)
//! 2. Sets up event handlers for auto-joining rooms and delivering timeline events
//! 3. Enters a continuous sync loop with sync token persistence

use std::sync::Arc;

use log::{error, info, warn};
use matrix_sdk::{
    Client, LoopCtrl, Room, RoomState,
    config::SyncSettings,
    ruma::{
        OwnedEventId, OwnedRoomId, OwnedUserId,
        api::client::filter::FilterDefinition,
        events::{AnySyncTimelineEvent, TimelineEventType, room::member::StrippedRoomMemberEvent},
        serde::Raw,
    },
};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

use crate::{kit::RoomEvent, matrix::session::MatrixSession};

/// An event the host runtime hands to the bridge.
#[derive(Clone, Debug)]
pub enum InboundEvent {
    /// The bot joined a room it was invited to
    Invited {
        room_id: OwnedRoomId,
        inviter: OwnedUserId,
    },
    /// A timeline event of a joined room, sent by someone else than the bot
    Timeline(RoomEvent),
}

/// Fields of a timeline event the bridge routes on.
#[derive(Deserialize)]
struct TimelineFields {
    event_id: OwnedEventId,
    sender: OwnedUserId,
    #[serde(rename = "type")]
    kind: TimelineEventType,
    #[serde(default)]
    content: Value,
}

/// Converts a raw timeline event, `None` if it lacks the routed fields.
fn to_room_event(raw: &Raw<AnySyncTimelineEvent>, room_id: OwnedRoomId) -> Option<RoomEvent> {
    let fields: TimelineFields = match serde_json::from_str(raw.json().get()) {
        Ok(fields) => fields,
        Err(e) => {
            warn!("skipping malformed event in {}: {}", room_id, e);
            return None;
        }
    };

    Some(RoomEvent {
        event_id: fields.event_id,
        room_id,
        sender: fields.sender,
        kind: fields.kind,
        content: fields.content,
    })
}

pub struct MatrixSync {
    client: Client,
    session: MatrixSession,
}

impl MatrixSync {
    pub fn new(client: &Client, session: &MatrixSession) -> Self {
        MatrixSync {
            client: client.to_owned(),
            session: session.to_owned(),
        }
    }

    /// Syncs until `shutdown` is cancelled, delivering events to `on_event`.
    ///
    /// Only events received after the initial sync are delivered: the bridge
    /// does not replay the history of its rooms.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync loop fails.
    pub async fn sync<F>(&self, on_event: F, shutdown: CancellationToken) -> anyhow::Result<()>
    where
        F: Fn(InboundEvent) + Send + Sync + 'static,
    {
        info!("start syncing");
        let on_event = Arc::new(on_event);

        // Auto join rooms when invited
        self.client.add_event_handler({
            let on_event = Arc::clone(&on_event);
            move |member: StrippedRoomMemberEvent, client: Client, room: Room| {
                let on_event = Arc::clone(&on_event);
                async move { auto_join_room(member, client, room, on_event).await }
            }
        });

        // Enable room members lazy-loading
        let filter = FilterDefinition::with_lazy_loading();
        let mut sync_settings = SyncSettings::default().filter(filter.into());

        if let Some(sync_token) = self.session.sync_token() {
            sync_settings = sync_settings.token(sync_token);
        }

        // First sync to only get the invitations sent while the bridge was offline
        let response = loop {
            match self.client.sync_once(sync_settings.clone()).await {
                Ok(response) => break response,
                Err(e) => {
                    error!("an error occurred during initial sync: {e}, trying again");
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = sleep(Duration::from_secs(5)) => {}
                    }
                }
            }
        };
        if let Err(e) = self
            .session
            .persist_sync_token(response.next_batch.clone())
            .await
        {
            error!("failed to persist sync token: {:?}", e);
        }

        // Listening after the first sync, so only new events are delivered
        self.client.add_event_handler({
            let on_event = Arc::clone(&on_event);
            move |raw: Raw<AnySyncTimelineEvent>, client: Client, room: Room| {
                let on_event = Arc::clone(&on_event);
                async move { on_timeline_event(raw, client, room, &on_event) }
            }
        });

        sync_settings = sync_settings.token(response.next_batch);

        let session = &self.session;
        let sync_loop = self
            .client
            .sync_with_result_callback(sync_settings, |sync_result| async move {
                let response = sync_result?;

                // The token is persisted each time to be able to resume the session
                if let Err(e) = session.persist_sync_token(response.next_batch).await {
                    error!("failed to persist sync token: {:?}", e);
                }

                Ok(LoopCtrl::Continue)
            });

        tokio::select! {
            _ = shutdown.cancelled() => info!("sync stopped"),
            result = sync_loop => result?,
        }

        Ok(())
    }
}

async fn auto_join_room<F>(member: StrippedRoomMemberEvent, client: Client, room: Room, on_event: Arc<F>)
where
    F: Fn(InboundEvent) + Send + Sync + 'static,
{
    let Some(user_id) = client.user_id() else {
        warn!("could not get user id from client");
        return;
    };

    // Ignore if the invite is not for us
    if member.state_key != user_id {
        return;
    }

    tokio::spawn(async move {
        info!("auto joining room {}", room.room_id());
        let mut delay = 2;

        while let Err(e) = room.join().await {
            // Synapse may send the invite before the invited user is able to join
            error!(
                "failed to join room {} ({e:?}), retrying in {delay}s",
                room.room_id()
            );

            sleep(Duration::from_secs(delay)).await;
            delay *= 2;

            if delay > 3600 {
                error!("can't join room {} ({e:?})", room.room_id());
                return;
            }
        }
        info!("joined room {}, invited by {}", room.room_id(), member.sender);

        on_event(InboundEvent::Invited {
            room_id: room.room_id().to_owned(),
            inviter: member.sender,
        });
    });
}

fn on_timeline_event<F>(raw: Raw<AnySyncTimelineEvent>, client: Client, room: Room, on_event: &Arc<F>)
where
    F: Fn(InboundEvent) + Send + Sync + 'static,
{
    // Ignore events from non-joined rooms
    if room.state() != RoomState::Joined {
        return;
    }

    let Some(event) = to_room_event(&raw, room.room_id().to_owned()) else {
        return;
    };

    // Ignore the bot's own echoes
    if client.user_id() == Some(&*event.sender) {
        return;
    }

    on_event(InboundEvent::Timeline(event));
}
