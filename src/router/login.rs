//! Authentication command flow.
//!
//! `login` acknowledges the user, records its remote identity and provisions a
//! bridged room proving both the bot and the ghost can talk:
//!
//! ```text
//! new_ghost → new_room → create_room → store room → bot message ┐
//!                                                 → ghost message ┘ (both attempted)
//! ```

use futures::future::join;
use log::{debug, info, warn};
use matrix_sdk::ruma::events::room::message::RoomMessageEventContent;

use crate::{
    commands::{CommandEvent, format_login_ack},
    kit::BridgeError,
    router::{CallGuard, Connector, Dispatch, Step},
    store::User,
};

impl Connector {
    /// Handles the `login` command.
    ///
    /// The invoking user is created if the store does not know it yet. The
    /// first argument is the remote identifier (defaults to the Matrix
    /// localpart), the remaining ones form the remote display name.
    ///
    /// Failures are collected in the returned [`Dispatch`], never propagated.
    pub async fn handle_login(&self, event: CommandEvent) -> Dispatch {
        let mut dispatch = Dispatch::new(format!("login from {}", event.user.mxid));
        let guard = CallGuard::new(event.cancel.clone(), self.timeout);

        let user = self.store.get_or_create_user(&event.user.mxid).await;
        let room = match &event.room_id {
            Some(room_id) => Some(self.store.get_room(room_id).await),
            None => None,
        };
        info!(
            "login called by {} in {}",
            user.display_name,
            room.as_ref()
                .map_or("no room".to_string(), |r| r.mxid.to_string())
        );

        let remote_id = event
            .args
            .first()
            .cloned()
            .unwrap_or_else(|| user.mxid.localpart().to_owned());
        let remote_name = if event.args.len() > 1 {
            event.args[1..].join(" ")
        } else {
            remote_id.clone()
        };
        let user = self
            .store
            .complete_login(&user.mxid, &remote_id, &remote_name)
            .await
            .unwrap_or(user);

        dispatch.handling();

        match &room {
            Some(room) => dispatch.record(
                Step::Acknowledge,
                guard
                    .run(self.facade.reply(&room.mxid, &format_login_ack(&remote_name)))
                    .await,
            ),
            None => warn!("no room to acknowledge the login of {}", user.mxid),
        }

        self.provision_room(&user, &guard, &mut dispatch).await;

        dispatch.finish()
    }

    /// Provisions one bridged room for `user`.
    ///
    /// The ghost is allocated before the room is created, and the room must
    /// exist before anything is sent. Returns early on the first failure of
    /// those two steps.
    async fn provision_room(&self, user: &User, guard: &CallGuard, dispatch: &mut Dispatch) {
        let provisioning = &self.provisioning;

        let ghost = match guard
            .run(async {
                Ok::<_, BridgeError>(self
                    .ghosts
                    .new_ghost(
                        &provisioning.ghost_remote_id,
                        &provisioning.ghost_remote_name,
                        &provisioning.ghost_username,
                        provisioning.ghost_avatar.clone(),
                    )
                    .await)
            })
            .await
        {
            Ok(ghost) => ghost,
            Err(e) => return dispatch.fail(Step::AllocateGhost, e),
        };
        dispatch.record(Step::AllocateGhost, Ok(()));
        debug!("allocated ghost {} for {}", ghost.mxid, user.mxid);

        let pending_room =
            self.rooms
                .new_room(&provisioning.room_name, &provisioning.room_topic, &ghost);

        let (room, room_info) = match guard
            .run(self.facade.create_room(&pending_room, user))
            .await
        {
            Ok(created) => created,
            Err(e) => return dispatch.fail(Step::CreateRoom, e),
        };
        dispatch.record(Step::CreateRoom, Ok(()));

        if room_info.is_new {
            info!("created room {} for {}", room.room.mxid, user.mxid);
        } else {
            info!("reusing room {} for {}", room.room.mxid, user.mxid);
        }
        self.store.insert_room(room.room.clone()).await;

        let bot_message = RoomMessageEventContent::text_markdown(&provisioning.bot_welcome);
        let ghost_message = RoomMessageEventContent::text_markdown(&provisioning.ghost_welcome);

        let (bot_result, ghost_result) = join(
            guard.run(self.facade.send_bot_message(&room, bot_message)),
            guard.run(self.facade.send_message_as(&room, &ghost, ghost_message)),
        )
        .await;

        dispatch.record(Step::SendBotMessage, bot_result);
        dispatch.record(Step::SendGhostMessage, ghost_result);
    }
}
