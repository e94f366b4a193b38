//! Matrix side of the bridge in relay mode.
//!
//! This module provides [`MatrixKit`], which implements the outbound
//! collaborator traits on top of the logged-in bot client.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use matrix_sdk::{
    Client, Room as SdkRoom, RoomState,
    ruma::{
        OwnedUserId, RoomId,
        api::client::{
            receipt::create_receipt::v3::ReceiptType,
            room::{Visibility, create_room::v3::Request as CreateRoomRequest},
        },
        events::{receipt::ReceiptThread, room::message::RoomMessageEventContent},
    },
};

use crate::{
    kit::{
        BridgeError, BridgeFacade, GhostHandle, GhostRegistry, PendingRoom, RoomEvent,
        RoomHandle, RoomInfo, RoomOrchestrator,
    },
    matrix::ghosts::VirtualGhosts,
    store::{Room, User},
};

fn request_error(e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Request(e.to_string())
}

/// Prefixes a message with the name of the ghost it is relayed for.
fn relay_content(ghost: &GhostHandle, content: &RoomMessageEventContent) -> RoomMessageEventContent {
    RoomMessageEventContent::text_markdown(format!("**{}**: {}", ghost.remote_name, content.body()))
}

/// Describes the room bridged to the direct conversation with `ghost`.
fn describe_room(name: &str, topic: &str, ghost: &GhostHandle) -> PendingRoom {
    PendingRoom {
        name: name.to_string(),
        topic: topic.to_string(),
        remote_id: ghost.remote_id.clone(),
        ghost: ghost.clone(),
    }
}

/// Collaborators backed by the bot's Matrix client.
pub struct MatrixKit {
    client: Client,
    bot: OwnedUserId,
    ghosts: Arc<VirtualGhosts>,
}

impl MatrixKit {
    pub fn new(client: Client, bot: OwnedUserId, ghosts: Arc<VirtualGhosts>) -> Self {
        MatrixKit {
            client,
            bot,
            ghosts,
        }
    }

    /// Returns the room if the bot joined it.
    fn joined_room(&self, room_id: &RoomId) -> Result<SdkRoom, BridgeError> {
        match self.client.get_room(room_id) {
            Some(room) if room.state() == RoomState::Joined => Ok(room),
            _ => Err(BridgeError::NotJoined(room_id.to_owned())),
        }
    }

    async fn send(
        &self,
        room_id: &RoomId,
        content: RoomMessageEventContent,
    ) -> Result<(), BridgeError> {
        let room = self.joined_room(room_id)?;
        room.send(content).await.map_err(request_error)?;
        Ok(())
    }
}

#[async_trait]
impl BridgeFacade for MatrixKit {
    async fn create_room(
        &self,
        room: &PendingRoom,
        user: &User,
    ) -> Result<(RoomHandle, RoomInfo), BridgeError> {
        let mut request = CreateRoomRequest::new();
        request.name = Some(room.name.clone());
        request.topic = Some(room.topic.clone());
        request.invite = vec![user.mxid.clone()];
        request.is_direct = true;
        request.visibility = Visibility::Private;

        let created = self
            .client
            .create_room(request)
            .await
            .map_err(request_error)?;
        info!(
            "created room {} for {} with ghost {}",
            created.room_id(),
            user.mxid,
            room.ghost.mxid
        );

        let record = Room {
            mxid: created.room_id().to_owned(),
            remote_id: room.remote_id.clone(),
            name: room.name.clone(),
            topic: room.topic.clone(),
            ghosts: vec![room.ghost.to_ref()],
        };

        Ok((
            RoomHandle {
                room: record,
                main_intent: self.bot.clone(),
            },
            RoomInfo { is_new: true },
        ))
    }

    async fn send_bot_message(
        &self,
        room: &RoomHandle,
        content: RoomMessageEventContent,
    ) -> Result<(), BridgeError> {
        self.send(&room.room.mxid, content).await
    }

    async fn send_message_as(
        &self,
        room: &RoomHandle,
        ghost: &GhostHandle,
        content: RoomMessageEventContent,
    ) -> Result<(), BridgeError> {
        self.send(&room.room.mxid, relay_content(ghost, &content))
            .await
    }

    async fn reply(&self, room_id: &RoomId, body: &str) -> Result<(), BridgeError> {
        self.send(room_id, RoomMessageEventContent::text_markdown(body))
            .await
    }

    async fn mark_read(&self, event: &RoomEvent, room: &Room) -> Result<(), BridgeError> {
        let joined = self.joined_room(&room.mxid)?;
        joined
            .send_single_receipt(
                ReceiptType::Read,
                ReceiptThread::Unthreaded,
                event.event_id.clone(),
            )
            .await
            .map_err(request_error)?;

        debug!("marked {} as read", event.event_id);
        Ok(())
    }
}

#[async_trait]
impl RoomOrchestrator for MatrixKit {
    async fn load_room(&self, room: &Room) -> Result<(), BridgeError> {
        self.joined_room(&room.mxid)?;

        for ghost in &room.ghosts {
            if self.ghosts.get_ghost(ghost).await.is_none() {
                return Err(BridgeError::InvalidId(ghost.mxid.to_string()));
            }
        }

        debug!("loaded room {} with {} ghosts", room.mxid, room.ghosts.len());
        Ok(())
    }

    fn new_room(&self, name: &str, topic: &str, ghost: &GhostHandle) -> PendingRoom {
        describe_room(name, topic, ghost)
    }
}
