//! Command registry.
//!
//! This module provides the [`CommandRegistry`], which maps command names to
//! their [`CommandSpec`] and handler and dispatches parsed messages to them.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use matrix_sdk::ruma::RoomId;
use tokio_util::sync::CancellationToken;

use crate::{
    commands::{
        CommandEvent, CommandHandler, CommandOutcome, CommandParseError, CommandSpec,
        command::parse,
        markdown_response::{format_help, format_permission_denied, format_unknown_command},
    },
    store::User,
};

struct RegisteredCommand {
    spec: CommandSpec,
    handler: CommandHandler,
}

/// Registered commands of the bot, dispatched by name.
///
/// `help` is built in and always available.
///
/// # Examples
///
/// ```ignore
/// let mut registry = CommandRegistry::new("ferry");
/// connector.register_commands(&mut registry);
///
/// match registry.dispatch("!ferry login", &user, Some(&room_id), cancel).await {
///     Ok(CommandOutcome::Reply(text)) => { /* send text */ }
///     _ => {}
/// }
/// ```
pub struct CommandRegistry {
    /// Bot name following the `!`
    prefix: String,
    commands: BTreeMap<&'static str, RegisteredCommand>,
}

impl CommandRegistry {
    pub fn new(prefix: &str) -> Self {
        CommandRegistry {
            prefix: prefix.to_string(),
            commands: BTreeMap::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Registers a command, replacing any command with the same name.
    pub fn register(&mut self, spec: CommandSpec, handler: CommandHandler) {
        if self.contains(spec.name) {
            warn!("command {} registered twice, keeping the last one", spec.name);
        }
        debug!("registering command {} ({})", spec.name, spec.section);
        self.commands
            .insert(spec.name, RegisteredCommand { spec, handler });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Returns `true` if `body` is a command addressed to this bot.
    pub fn is_command(&self, body: &str) -> bool {
        parse(&self.prefix, body).is_ok()
    }

    /// Dispatches a message body sent by `sender` in `room_id`.
    ///
    /// # Returns
    ///
    /// * `Ok(CommandOutcome::Reply)` - the help text
    /// * `Ok(CommandOutcome::Handled)` - once the registered handler completed
    ///
    /// # Errors
    ///
    /// * [`CommandParseError::NotForBot`] - the body is not a command for this bot
    /// * [`CommandParseError::InvalidCommand`] - unknown command or insufficient
    ///   permission, with the text to reply with
    pub async fn dispatch(
        &self,
        body: &str,
        sender: &User,
        room_id: Option<&RoomId>,
        cancel: CancellationToken,
    ) -> Result<CommandOutcome, CommandParseError> {
        let command = parse(&self.prefix, body)?;

        let Some(registered) = self.commands.get(command.name.as_str()) else {
            if command.name == "help" {
                return Ok(CommandOutcome::Reply(format_help(
                    &self.prefix,
                    self.commands.values().map(|c| &c.spec),
                )));
            }
            return Err(CommandParseError::InvalidCommand(format_unknown_command(
                &self.prefix,
            )));
        };

        if sender.permission_level < registered.spec.permission {
            info!(
                "{} ({:?}) is not allowed to use {}",
                sender.mxid, sender.permission_level, command.name
            );
            return Err(CommandParseError::InvalidCommand(format_permission_denied(
                registered.spec.name,
            )));
        }

        info!("{} called {} {:?}", sender.mxid, command.name, command.args);
        (registered.handler)(CommandEvent {
            user: sender.clone(),
            room_id: room_id.map(|r| r.to_owned()),
            args: command.args,
            cancel,
        })
        .await;

        Ok(CommandOutcome::Handled)
    }
}
