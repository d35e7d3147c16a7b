//! Session parameters.
//!
//! Role and address are fixed for the lifetime of a [`crate::session::Session`];
//! the cadences below govern the cooperative event loop and the two
//! background senders.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// TCP port used when none is given (a nod to the old 9600 baud link).
pub const DEFAULT_PORT: u16 = 9600;

/// Host used when none is given.
pub const DEFAULT_HOST: &str = "localhost";

/// Which end of the link this terminal is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Binds and waits for the peer ("server").
    Listener,
    /// Dials the peer ("client").
    Initiator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Listener => f.write_str("SERVER"),
            Role::Initiator => f.write_str("CLIENT"),
        }
    }
}

/// Adjustable session parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub role: Role,
    pub host: String,
    pub port: u16,
    /// Delay between ASCII-spam characters.
    pub spam_interval: Duration,
    /// Delay between repeat-send transmissions.  Slower than spam.
    pub repeat_interval: Duration,
    /// Bounded wait for each inbound poll.
    pub inbound_poll: Duration,
    /// Displayed lines kept before the history is halved.
    pub history_capacity: usize,
    /// Directory that receives `terminal_log_*.txt` files.
    pub log_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role: Role::Listener,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            spam_interval: Duration::from_millis(50),
            repeat_interval: Duration::from_millis(100),
            inbound_poll: Duration::from_millis(10),
            history_capacity: 1000,
            log_dir: PathBuf::from("."),
        }
    }
}

impl SessionConfig {
    /// Defaults with the given role and rendezvous address.
    pub fn new(role: Role, host: impl Into<String>, port: u16) -> Self {
        Self {
            role,
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// `host:port` as shown to the user.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
