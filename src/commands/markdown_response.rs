//! Markdown response formatters for bot commands.

use std::collections::BTreeMap;

use crate::commands::{CommandSpec, HelpSection};

/// Formats the help message, commands grouped by help section.
///
/// # Arguments
///
/// * `prefix` - The bot prefix, shown in the usage line
/// * `commands` - The registered commands
///
/// # Examples
///
/// ```ignore
/// let help = format_help("ferry", &[]);
/// assert!(help.contains("**General**"));
/// ```
pub fn format_help<'a>(prefix: &str, commands: impl IntoIterator<Item = &'a CommandSpec>) -> String {
    let mut sections: BTreeMap<HelpSection, Vec<String>> = BTreeMap::new();
    sections
        .entry(HelpSection::General)
        .or_default()
        .push("- `help`: show this help message".to_string());

    for spec in commands {
        sections
            .entry(spec.section)
            .or_default()
            .push(format!("- `{}`: {}", spec.name, spec.help));
    }

    let body = sections
        .iter()
        .map(|(section, lines)| format!("**{}**\n{}", section, lines.join("\n")))
        .collect::<Vec<String>>()
        .join("\n\n");

    format!("Usage: `!{} <command> [args...]`\n\n{}", prefix, body)
}

/// Formats a response for an unknown command.
pub fn format_unknown_command(prefix: &str) -> String {
    format!("Unknown command. Type `!{} help` for more information.", prefix)
}

/// Formats a response for a command the sender is not allowed to run.
pub fn format_permission_denied(command: &str) -> String {
    format!("You don't have the permission to use the `{}` command.", command)
}

/// Formats the acknowledgment of a `login` command.
///
/// # Examples
///
/// ```ignore
/// let msg = format_login_ack("Alice");
/// assert!(msg.contains("**Alice**"));
/// ```
pub fn format_login_ack(remote_name: &str) -> String {
    format!(
        "Logged in as **{}**. A bridged room is on its way, check your invites.",
        remote_name
    )
}

/// Formats the message sent to a management room once the bot joined it.
pub fn format_ready(prefix: &str) -> String {
    format!(
        "Hello! This room is now your management room. Type `!{} login` to get started.",
        prefix
    )
}
