//! Bot commands: parsing, registration and dispatch.
//!
//! Commands are messages of the form `!<prefix> <command> [args...]` sent to
//! the bridge bot, usually in the sender's management room.
//!
//! # Overview
//!
//! ```text
//! Matrix message
//!      │
//!      ▼
//! ┌──────────────────┐
//! │ CommandRegistry  │  ← parse, look up, check permission
//! └──────────────────┘
//!      │
//!      ├── help / unknown / denied ──▶ CommandOutcome::Reply, CommandParseError
//!      │
//!      └── registered command ───────▶ handler(CommandEvent)
//! ```
//!
//! Handlers are registered by the components owning the behavior (see
//! `Connector::register_commands`) and do their own replying through the
//! bridge facade.
//!
//! # Error Handling
//!
//! - **Silent** ([`CommandParseError::NotForBot`]): not a command, or a command
//!   for another bot. Never answered.
//! - **User errors** ([`CommandParseError::InvalidCommand`]): unknown command or
//!   missing permission, carrying the Markdown text to reply with.

use std::{fmt, sync::Arc};

use futures::future::BoxFuture;
use matrix_sdk::ruma::OwnedRoomId;
use tokio_util::sync::CancellationToken;

use crate::store::{PermissionLevel, User};

mod command;
mod markdown_response;
mod registry;

pub use crate::commands::{
    markdown_response::{format_login_ack, format_ready},
    registry::CommandRegistry,
};

/// Async handler of a registered command.
pub type CommandHandler = Arc<dyn Fn(CommandEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Help section a command is listed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HelpSection {
    General,
    Authentication,
}

impl fmt::Display for HelpSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HelpSection::General => f.write_str("General"),
            HelpSection::Authentication => f.write_str("Authentication"),
        }
    }
}

/// Registration metadata of a command.
#[derive(Clone, Debug)]
pub struct CommandSpec {
    /// Word following the bot prefix
    pub name: &'static str,
    pub section: HelpSection,
    /// One line of Markdown shown by `help`
    pub help: &'static str,
    /// Lowest permission level allowed to run the command
    pub permission: PermissionLevel,
}

/// A command invocation delivered to a handler.
#[derive(Clone, Debug)]
pub struct CommandEvent {
    /// The invoking user, as resolved by the host
    pub user: User,
    /// Room the command was issued in
    pub room_id: Option<OwnedRoomId>,
    /// Words following the command name
    pub args: Vec<String>,
    /// Cancelled when the bridge shuts down
    pub cancel: CancellationToken,
}

/// Result of a dispatched command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The registry answered by itself, the text must be sent back
    Reply(String),
    /// A registered handler ran
    Handled,
}

/// Errors that can occur while dispatching a message as a command.
///
/// # Examples
///
/// ```ignore
/// match registry.dispatch(body, &user, Some(&room_id), cancel).await {
///     Ok(CommandOutcome::Reply(text)) => reply(text),
///     Ok(CommandOutcome::Handled) => {}
///     Err(CommandParseError::NotForBot) => {}
///     Err(CommandParseError::InvalidCommand(text)) => reply(text),
/// }
/// ```
#[derive(Debug, PartialEq, Eq)]
pub enum CommandParseError {
    /// The message is not a command for this bot
    NotForBot,
    /// The command is unknown or not allowed, with the reply to send
    InvalidCommand(String),
}
