//! Command parsing for the line-oriented terminal.
//!
//! This module parses input lines into structured [`Command`] values.

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Join a channel.
    Join {
        /// Channel name.
        channel: String,
        /// Nickname to use in the channel.
        nickname: String,
        /// Shared channel secret.
        secret: String,
    },

    /// Leave the current channel.
    Leave,

    /// List the peers in the current channel.
    Peers,

    /// Show the local identity and key fingerprint.
    WhoAmI,

    /// Quit the application.
    Quit,

    /// Send a message to the current channel.
    Message {
        /// Message content.
        content: String,
    },

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Parse a user input line into a command.
///
/// Commands start with `/`. Anything else is treated as a message.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Message { content: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    match command {
        "join" => match parts.as_slice() {
            [_, channel, nickname, secret] => Command::Join {
                channel: (*channel).to_string(),
                nickname: (*nickname).to_string(),
                secret: (*secret).to_string(),
            },
            _ => Command::InvalidArgs {
                command: "join".into(),
                error: "Usage: /join <channel> <nickname> <secret>".into(),
            },
        },

        "leave" => Command::Leave,

        "peers" => Command::Peers,

        "whoami" => Command::WhoAmI,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}
