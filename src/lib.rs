//! `chat-war`: a two-party TCP chat with "chat war" toggles.
//!
//! # Architecture
//!
//! ```text
//!   console / tests ──Command──▶ ┌──────────────────────────────┐
//!                                │           Session            │──▶ DisplaySink
//!                                │ FeatureState · History · Log │──▶ LogSink
//!                                └──────┬────────────────▲──────┘
//!                        outbound::*    │                │   inbound::evaluate
//!                                ┌──────▼────────────────┴──────┐
//!                                │    Connection (ChatCodec)    │
//!                                └──────────────┬───────────────┘
//!                                               │ newline records, 0x10 = disconnect
//!                                            TcpStream
//! ```
//!
//! Each module has a single responsibility:
//! - [`codec`]:      wire format (line records and the disconnect sentinel)
//! - [`connection`]: one framed TCP link: listen, connect, send, bounded receive
//! - [`state`]:      the feature toggles and their interaction rules
//! - [`inbound`]:    discard / bounce / deliver decision for received lines
//! - [`outbound`]:   user-line capture, spam and repeat senders, playback
//! - [`sink`]:       display and session-log interfaces, file log
//! - [`history`]:    bounded buffer of displayed lines
//! - [`command`]:    the command set and its console syntax
//! - [`console`]:    stdout display for the binary
//! - [`session`]:    owns everything above and runs the event loop
//! - [`config`]:     role, address and cadences

pub mod codec;
pub mod command;
pub mod config;
pub mod connection;
pub mod console;
pub mod history;
pub mod inbound;
pub mod outbound;
pub mod session;
pub mod sink;
pub mod state;

pub use command::Command;
pub use config::{Role, SessionConfig};
pub use connection::{ConnError, Connection, Listener};
pub use session::Session;
