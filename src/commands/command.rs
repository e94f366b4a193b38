//! Command parsing.
//!
//! This module turns a Matrix message body into a [`ParsedCommand`] using the
//! `command_parser` crate.

use command_parser::Parser;
use log::debug;

use crate::commands::CommandParseError;

/// A command addressed to the bot.
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Command name, `help` when the message only holds the bot prefix
    pub name: String,
    /// Words following the command name
    pub args: Vec<String>,
}

/// Parses a message body addressed to the bot named `prefix`.
///
/// # Errors
///
/// Returns [`CommandParseError::NotForBot`] if the body is not a command or
/// is a command for another bot.
///
/// # Examples
///
/// ```ignore
/// let command = parse("ferry", "!ferry login alice").unwrap();
/// assert_eq!(command.name, "login");
/// assert_eq!(command.args, vec!["alice"]);
/// ```
pub fn parse(prefix: &str, body: &str) -> Result<ParsedCommand, CommandParseError> {
    let parser = Parser::new('!', '-');

    // For an unknown reason the parser ignores the last word, so we add a dummy word at the end
    let body = body.to_string() + " dummy";

    // This is normal to fail if the message is not a command
    let Ok(command) = parser.parse(&body) else {
        return Err(CommandParseError::NotForBot);
    };

    if command.name != prefix {
        return Err(CommandParseError::NotForBot);
    }

    debug!("parsed command: {:?}", command);

    let mut words = command.arguments.into_iter();
    let name = words.next().unwrap_or_else(|| "help".to_string());

    Ok(ParsedCommand {
        name,
        args: words.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_with_args() {
        let result = parse("ferry", "!ferry login alice-42 Alice");
        assert_eq!(
            result,
            Ok(ParsedCommand {
                name: "login".to_string(),
                args: vec!["alice-42".to_string(), "Alice".to_string()],
            })
        );
    }

    #[test]
    fn test_parse_command_without_args() {
        let result = parse("ferry", "!ferry login").unwrap();
        assert_eq!(result.name, "login");
        assert!(result.args.is_empty());
    }

    #[test]
    fn test_parse_prefix_only_is_help() {
        let result = parse("ferry", "!ferry").unwrap();
        assert_eq!(result.name, "help");
    }

    #[test]
    fn test_parse_other_bot() {
        let result = parse("ferry", "!other_bot login");
        assert_eq!(result, Err(CommandParseError::NotForBot));
    }

    #[test]
    fn test_parse_plain_message() {
        let result = parse("ferry", "This is not a command");
        assert_eq!(result, Err(CommandParseError::NotForBot));
    }
}
