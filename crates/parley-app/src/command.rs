//! Slash commands typed into the composer.
//!
//! A line starting with `/` is a command; anything else is message text.

use thiserror::Error;

/// Commands understood by the [`crate::App`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a line of text to the open conversation.
    Say(String),
    /// Open the conversation whose name or id matches.
    Open(String),
    /// Close the open conversation.
    Close,
    /// Filter the chat and friend lists. Empty clears the filter.
    Search(String),
    /// Remove a friend by username or id.
    Unfriend(String),
    /// Create a group with the given member usernames.
    Group {
        /// Group name.
        name: String,
        /// Member usernames or ids.
        members: Vec<String>,
    },
    /// Reload friends, groups and chats.
    Refresh,
    /// Switch realtime on or off.
    Realtime(bool),
    /// End the session.
    Logout,
    /// Leave the application.
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The command name is not known.
    #[error("unknown command /{0}")]
    Unknown(String),
    /// A required argument is missing.
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    /// Parse one input line.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            return Ok(Self::Say(line.to_string()));
        };

        let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let args = args.trim();

        match name {
            "open" | "o" => required(args, "/open <chat>").map(Self::Open),
            "close" => Ok(Self::Close),
            "search" | "s" => Ok(Self::Search(args.to_string())),
            "unfriend" => required(args, "/unfriend <username>").map(Self::Unfriend),
            "group" => {
                let mut words = args.split_whitespace();
                let name = words.next().ok_or(CommandError::Usage("/group <name> <member>..."))?;
                let members: Vec<String> = words.map(str::to_string).collect();
                if members.is_empty() {
                    return Err(CommandError::Usage("/group <name> <member>..."));
                }
                Ok(Self::Group { name: name.to_string(), members })
            },
            "refresh" => Ok(Self::Refresh),
            "realtime" => match args {
                "on" => Ok(Self::Realtime(true)),
                "off" => Ok(Self::Realtime(false)),
                _ => Err(CommandError::Usage("/realtime on|off")),
            },
            "logout" => Ok(Self::Logout),
            "quit" | "q" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn required(args: &str, usage: &'static str) -> Result<String, CommandError> {
    if args.is_empty() { Err(CommandError::Usage(usage)) } else { Ok(args.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_said() {
        assert_eq!(Command::parse("hello /there"), Ok(Command::Say("hello /there".into())));
    }

    #[test]
    fn commands_take_arguments() {
        assert_eq!(Command::parse("/open  Team chat "), Ok(Command::Open("Team chat".into())));
        assert_eq!(Command::parse("/search"), Ok(Command::Search(String::new())));
        assert_eq!(Command::parse("/realtime off"), Ok(Command::Realtime(false)));
        assert_eq!(
            Command::parse("/group team ada bob"),
            Ok(Command::Group { name: "team".into(), members: vec!["ada".into(), "bob".into()] })
        );
    }

    #[test]
    fn missing_arguments_report_usage() {
        assert_eq!(Command::parse("/open"), Err(CommandError::Usage("/open <chat>")));
        assert!(matches!(Command::parse("/group team"), Err(CommandError::Usage(_))));
        assert!(matches!(Command::parse("/realtime maybe"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn unknown_command() {
        let err = Command::parse("/dance").unwrap_err();
        assert_eq!(err.to_string(), "unknown command /dance");
    }
}
