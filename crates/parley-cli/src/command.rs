//! Input line parsing.

use thiserror::Error;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send the line as a chat message
    Say(String),
    /// `/typing`: notify the room
    Typing,
    /// `/token <value>`: rotate the access token
    Token(String),
    /// `/connect`: reconnect after a terminal state
    Connect,
    /// `/rooms`: list visible rooms
    Rooms,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// Blank line
    Nothing,
}

/// Rejected input line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Slash command not recognized.
    #[error("unknown command /{0}, try /help")]
    Unknown(String),

    /// Command needs an argument.
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
}

/// Help text listing the commands.
pub const HELP: &str = "\
/typing         tell the room you are typing
/token <value>  use a new access token (reconnects)
/connect        reconnect after the session gave up
/rooms          list rooms
/quit           leave
//text          send a message starting with /";

impl Command {
    /// Parse one input line.
    ///
    /// Lines not starting with `/` are messages. A leading `//` escapes the
    /// slash.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            return Ok(Self::Nothing);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Say(line.to_string()));
        };

        if rest.starts_with('/') {
            return Ok(Self::Say(rest.to_string()));
        }

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        match name {
            "typing" => Ok(Self::Typing),
            "token" if argument.is_empty() => Err(CommandError::MissingArgument("token")),
            "token" => Ok(Self::Token(argument.to_string())),
            "connect" => Ok(Self::Connect),
            "rooms" => Ok(Self::Rooms),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
