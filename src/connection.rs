//! The single TCP link between the two terminals.
//!
//! A [`Connection`] owns one framed `TcpStream` and speaks [`Frame`]s instead
//! of raw bytes.  Its responsibilities are:
//! - Establishing the link, either by accepting exactly one peer
//!   ([`Listener`], [`Connection::listen`]) or by dialling once
//!   ([`Connection::connect`]).
//! - Writing one frame at a time ([`Connection::send`]).
//! - Receiving with a bounded wait ([`Connection::receive`]) so callers can
//!   interleave polling with other work.
//! - Classifying peer loss: a clean EOF is [`Received::Closed`], reset-class
//!   I/O failures are [`ConnError::ConnectionLost`].
//!
//! Feature logic lives elsewhere; this module owns only the stream.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::codec::{ChatCodec, DecodeError, Frame};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise while establishing or using the link.
#[derive(Debug, Error)]
pub enum ConnError {
    /// The listening socket could not be bound.
    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// Accepting the inbound peer failed.
    #[error("could not accept a peer: {0}")]
    Accept(#[source] io::Error),
    /// Dialling the peer failed; the caller may retry.
    #[error("could not connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// The peer vanished mid-session.
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] io::Error),
}

/// Outcome of one bounded receive.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    /// A complete record arrived.
    Frame(Frame),
    /// A record arrived but could not be decoded; it has been consumed.
    Malformed(DecodeError),
    /// Nothing arrived within the wait.  Not an error.
    Timeout,
    /// The peer closed its end of the stream.
    Closed,
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// A bound socket waiting for the one peer.
#[derive(Debug)]
pub struct Listener {
    /// Address the OS actually bound (resolves port `0`).
    pub local_addr: SocketAddr,
    inner: TcpListener,
}

impl Listener {
    /// Bind `host:port`.  Port `0` lets the OS choose.
    pub async fn bind(host: &str, port: u16) -> Result<Self, ConnError> {
        let addr = format!("{host}:{port}");
        let inner = TcpListener::bind((host, port))
            .await
            .map_err(|source| ConnError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = inner
            .local_addr()
            .map_err(|source| ConnError::Bind { addr, source })?;
        log::info!("[conn] listening on {local_addr}");
        Ok(Self { local_addr, inner })
    }

    /// Wait for exactly one peer and wrap it in a [`Connection`].
    pub async fn accept(&self) -> Result<Connection, ConnError> {
        let (stream, peer) = self.inner.accept().await.map_err(ConnError::Accept)?;
        log::info!("[conn] accepted {peer}");
        Connection::from_stream(stream).map_err(ConnError::Accept)
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A framed, full-duplex link to the peer.
#[derive(Debug)]
pub struct Connection {
    /// Remote end of the link.
    pub peer_addr: SocketAddr,
    /// Local end of the link.
    pub local_addr: SocketAddr,
    framed: Framed<TcpStream, ChatCodec>,
}

impl Connection {
    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        // Chat lines are tiny; do not let Nagle hold them back.
        stream.set_nodelay(true)?;
        Ok(Self {
            peer_addr,
            local_addr,
            framed: Framed::new(stream, ChatCodec::new()),
        })
    }

    /// Passive open: bind `host:port` and accept one peer.
    pub async fn listen(host: &str, port: u16) -> Result<Self, ConnError> {
        Listener::bind(host, port).await?.accept().await
    }

    /// Active open: dial `host:port` once.
    pub async fn connect(host: &str, port: u16) -> Result<Self, ConnError> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| ConnError::ConnectFailed {
                addr: addr.clone(),
                source,
            })?;
        let conn = Self::from_stream(stream)
            .map_err(|source| ConnError::ConnectFailed { addr, source })?;
        log::info!("[conn] connected {} -> {}", conn.local_addr, conn.peer_addr);
        Ok(conn)
    }

    /// Write one frame and flush it.
    pub async fn send(&mut self, frame: Frame) -> Result<(), ConnError> {
        log::debug!("[conn] -> {frame:?}");
        self.framed
            .send(frame)
            .await
            .map_err(ConnError::ConnectionLost)
    }

    /// Wait at most `wait` for the next record.
    ///
    /// Cancel-safe: bytes of a partially received record stay buffered when
    /// the wait elapses or the future is dropped.
    pub async fn receive(&mut self, wait: Duration) -> Result<Received, ConnError> {
        match timeout(wait, self.framed.next()).await {
            Err(_elapsed) => Ok(Received::Timeout),
            Ok(None) => Ok(Received::Closed),
            Ok(Some(Ok(Ok(frame)))) => {
                log::debug!("[conn] <- {frame:?}");
                Ok(Received::Frame(frame))
            }
            Ok(Some(Ok(Err(err)))) => Ok(Received::Malformed(err)),
            Ok(Some(Err(err))) => Err(ConnError::ConnectionLost(err)),
        }
    }

    /// Flush and close the write side.  Best-effort.
    pub async fn shutdown(mut self) -> io::Result<()> {
        self.framed.close().await
    }
}
