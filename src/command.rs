//! The control surface of a session and its console syntax.
//!
//! A line starting with `/` names a command; anything else is a chat line.
//!
//! | Input          | Command                    |
//! |----------------|----------------------------|
//! | `/1`           | toggle deflector           |
//! | `/2`           | toggle ASCII spam          |
//! | `/3`           | toggle repeat send         |
//! | `/4`           | toggle anti-deflector      |
//! | `/5`, `/esc`   | toggle no-input            |
//! | `/6`           | fake disconnect            |
//! | `/7`           | toggle recording           |
//! | `/8`           | play back recording        |
//! | `/9`           | toggle file logging        |
//! | `/r`, `/retry` | redial (client only)       |
//! | `/q`, `/quit`  | quit                       |

use std::str::FromStr;

use thiserror::Error;

/// Help text printed by the console shell.
pub const HELP: &str = "\
Commands:
  /1          toggle Deflector (bounce every message back)
  /2          toggle ASCII Spam (random characters)
  /3          toggle Repeat Send (next line is repeated)
  /4          toggle Anti-Deflector (ignore echoes of your own text)
  /5, /esc    toggle No Input (ignore everything received)
  /6          fake disconnect
  /7          toggle Recording
  /8          play back the recording
  /9          toggle file logging
  /r, /retry  reconnect to the server (client only)
  /q, /quit   quit
  /help       show this text
Anything else is sent as a message.";

/// One request to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleDeflector,
    ToggleAsciiSpam,
    ToggleRepeatSend,
    ToggleAntiDeflector,
    ToggleNoInput,
    FakeDisconnect,
    ToggleRecording,
    Playback,
    ToggleLogging,
    /// A chat line typed by the user.
    Send(String),
    Retry,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command {0} (try /help)")]
    Unknown(String),
}

impl FromStr for Command {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        if line.is_empty() {
            return Err(CommandParseError::Empty);
        }
        if !line.starts_with('/') {
            return Ok(Command::Send(line.to_string()));
        }
        match line.to_lowercase().as_str() {
            "/1" => Ok(Command::ToggleDeflector),
            "/2" => Ok(Command::ToggleAsciiSpam),
            "/3" => Ok(Command::ToggleRepeatSend),
            "/4" => Ok(Command::ToggleAntiDeflector),
            "/5" | "/esc" => Ok(Command::ToggleNoInput),
            "/6" => Ok(Command::FakeDisconnect),
            "/7" => Ok(Command::ToggleRecording),
            "/8" => Ok(Command::Playback),
            "/9" => Ok(Command::ToggleLogging),
            "/r" | "/retry" => Ok(Command::Retry),
            "/q" | "/quit" => Ok(Command::Quit),
            _ => Err(CommandParseError::Unknown(line.to_string())),
        }
    }
}
