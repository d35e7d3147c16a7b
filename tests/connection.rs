//! Integration tests for the TCP link.
//!
//! Each test binds a real listener on an OS-chosen loopback port, accepts in
//! a background task and talks to it with a dialled [`Connection`].

use std::time::Duration;

use chat_war::codec::Frame;
use chat_war::connection::{ConnError, Connection, Listener, Received};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

/// Connected `(server, client)` pair on loopback.
async fn pair() -> (Connection, Connection) {
    let listener = Listener::bind("127.0.0.1", 0).await.expect("bind listener");
    let port = listener.local_addr.port();

    let server_task = tokio::spawn(async move { listener.accept().await });

    let client = tokio::time::timeout(WAIT, Connection::connect("127.0.0.1", port))
        .await
        .expect("client connect timed out")
        .expect("client connect failed");

    let server = tokio::time::timeout(WAIT, server_task)
        .await
        .expect("server accept timed out")
        .expect("server task panicked")
        .expect("server accept failed");

    (server, client)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Each end reports the other as its peer.
#[tokio::test]
async fn both_ends_see_each_other() {
    let (server, client) = pair().await;
    assert_eq!(server.peer_addr, client.local_addr);
    assert_eq!(client.peer_addr, server.local_addr);
}

/// A chat line sent from either end arrives intact at the other.
#[tokio::test]
async fn message_crosses_in_both_directions() {
    let (mut server, mut client) = pair().await;

    client.send(Frame::message("hello")).await.unwrap();
    assert_eq!(
        server.receive(WAIT).await.unwrap(),
        Received::Frame(Frame::Message("hello".into()))
    );

    server.send(Frame::message("hi back")).await.unwrap();
    assert_eq!(
        client.receive(WAIT).await.unwrap(),
        Received::Frame(Frame::Message("hi back".into()))
    );
}

/// The bare sentinel decodes as a disconnect and the stream keeps going.
#[tokio::test]
async fn sentinel_arrives_as_disconnect() {
    let (mut server, mut client) = pair().await;

    client.send(Frame::Disconnect).await.unwrap();
    client.send(Frame::message("still here")).await.unwrap();

    assert_eq!(
        server.receive(WAIT).await.unwrap(),
        Received::Frame(Frame::Disconnect)
    );
    assert_eq!(
        server.receive(WAIT).await.unwrap(),
        Received::Frame(Frame::Message("still here".into()))
    );
}

/// A bounded receive on a quiet link is a timeout, not an error.
#[tokio::test]
async fn quiet_link_times_out_without_error() {
    let (mut server, _client) = pair().await;
    assert_eq!(
        server.receive(Duration::from_millis(20)).await.unwrap(),
        Received::Timeout
    );
}

/// Bytes of a half-received line are kept across a timeout.
#[tokio::test]
async fn partial_record_survives_a_timeout() {
    let listener = Listener::bind("127.0.0.1", 0).await.unwrap();
    let port = listener.local_addr.port();
    let server_task = tokio::spawn(async move { listener.accept().await });
    let mut raw = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut server = server_task.await.unwrap().unwrap();

    raw.write_all(b"hel").await.unwrap();
    assert_eq!(
        server.receive(Duration::from_millis(50)).await.unwrap(),
        Received::Timeout
    );

    raw.write_all(b"lo\r\n").await.unwrap();
    assert_eq!(
        server.receive(WAIT).await.unwrap(),
        Received::Frame(Frame::Message("hello".into()))
    );
}

/// An undecodable line is reported as malformed and the next line still arrives.
#[tokio::test]
async fn invalid_utf8_is_reported_and_stream_continues() {
    let listener = Listener::bind("127.0.0.1", 0).await.unwrap();
    let port = listener.local_addr.port();
    let server_task = tokio::spawn(async move { listener.accept().await });
    let mut raw = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut server = server_task.await.unwrap().unwrap();

    raw.write_all(b"\xff\xfe\nok\n").await.unwrap();
    assert!(matches!(
        server.receive(WAIT).await.unwrap(),
        Received::Malformed(_)
    ));
    assert_eq!(
        server.receive(WAIT).await.unwrap(),
        Received::Frame(Frame::Message("ok".into()))
    );
}

/// Dropping the peer reads as a clean close.
#[tokio::test]
async fn peer_drop_reads_as_closed() {
    let (mut server, client) = pair().await;
    drop(client);
    assert_eq!(server.receive(WAIT).await.unwrap(), Received::Closed);
}

/// Dialling a port nobody listens on is a `ConnectFailed`.
#[tokio::test]
async fn dialling_a_closed_port_fails_cleanly() {
    // Bind then drop to find a port nobody is listening on.
    let port = {
        let listener = Listener::bind("127.0.0.1", 0).await.unwrap();
        listener.local_addr.port()
    };

    let err = Connection::connect("127.0.0.1", port).await.unwrap_err();
    assert!(
        matches!(err, ConnError::ConnectFailed { .. }),
        "expected ConnectFailed, got {err:?}"
    );
}
