//! The chat engine.
//!
//! A [`Session`] owns at most one [`Connection`], the [`FeatureState`], the
//! display and log sinks, and the displayed history.  Everything that mutates
//! them runs on one task:
//!
//! ```text
//!  Session::run
//!    loop {
//!      select! {
//!        commands.recv()       → Event::Command
//!        listener.accept()     → Event::Accepted    (only while bound and unlinked)
//!        connection.receive()  → Event::Inbound     (bounded wait, only while connected)
//!        spam.tick()           → Event::SpamTick
//!        repeat.tick()         → Event::RepeatTick
//!      }
//!      handle(event)           ← the only place state changes
//!    }
//! ```
//!
//! Each branch only produces an [`Event`]; the event is handled after the
//! select completes, so inbound processing, user commands and the background
//! senders never interleave.  Every transmission goes through
//! [`Session::send_message`].

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::codec::{single_line, Frame};
use crate::command::Command;
use crate::config::{Role, SessionConfig};
use crate::connection::{ConnError, Connection, Listener, Received};
use crate::history::History;
use crate::inbound::{self, InboundAction};
use crate::outbound::{self, AsciiSpam, Submission};
use crate::sink::{DisplayLine, DisplaySink, FileLog, LogSink, LogWriteError, Source, Status};
use crate::state::FeatureState;

/// Result of one inbound poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polled {
    /// Nothing arrived, or the session is not connected.
    Idle,
    /// A record was read and processed.
    Handled,
    /// The link went down during this poll.
    Disconnected,
}

/// One unit of work for the control task.
#[derive(Debug)]
enum Event {
    /// `None` once every command sender is gone.
    Command(Option<Command>),
    /// The bound listener produced a peer (or failed).
    Accepted(Result<Connection, ConnError>),
    Inbound(Result<Received, ConnError>),
    SpamTick,
    RepeatTick,
}

/// A two-party chat session.
pub struct Session {
    config: SessionConfig,
    /// Kept after binding so a lost peer can be replaced.
    listener: Option<Listener>,
    connection: Option<Connection>,
    connected: bool,
    running: bool,
    state: FeatureState,
    history: History,
    display: Box<dyn DisplaySink + Send>,
    log: Option<Box<dyn LogSink + Send>>,
    spam: AsciiSpam,
}

impl Session {
    /// A disconnected session.  Call [`Session::establish`] to bring the link up.
    pub fn new(config: SessionConfig, display: Box<dyn DisplaySink + Send>) -> Self {
        let history = History::new(config.history_capacity);
        Self {
            config,
            listener: None,
            connection: None,
            connected: false,
            running: true,
            state: FeatureState::new(),
            history,
            display,
            log: None,
            spam: AsciiSpam::new(),
        }
    }

    /// A session over an already-established link.
    pub fn with_connection(
        config: SessionConfig,
        connection: Connection,
        display: Box<dyn DisplaySink + Send>,
    ) -> Self {
        let mut session = Self::new(config, display);
        session.connection = Some(connection);
        session.connected = true;
        session
    }

    /// Replace the spam source, e.g. with a seeded one.
    pub fn with_spam(mut self, spam: AsciiSpam) -> Self {
        self.spam = spam;
        self
    }

    // -----------------------------------------------------------------------
    // Link lifecycle
    // -----------------------------------------------------------------------

    /// Bring the link up according to the configured role, waiting for the
    /// peer when listening.
    pub async fn establish(&mut self) -> Result<(), ConnError> {
        self.start().await?;
        if self.config.role == Role::Listener {
            self.accept().await?;
        }
        Ok(())
    }

    /// Bind (listener) or dial (initiator) without waiting for a peer.
    ///
    /// A bound listener takes its peer inside [`Session::run`], so commands
    /// keep flowing while nobody has connected yet.
    pub async fn start(&mut self) -> Result<(), ConnError> {
        match self.config.role {
            Role::Listener => self.bind().await.map(|_| ()),
            Role::Initiator => self.dial().await,
        }
    }

    /// Listener role: bind the configured address and keep the listener.
    /// Returns the address actually bound.
    pub async fn bind(&mut self) -> Result<SocketAddr, ConnError> {
        self.notice(format!("Starting server on port {}...", self.config.port));
        match Listener::bind(&self.config.host, self.config.port).await {
            Ok(listener) => {
                let addr = listener.local_addr;
                self.listener = Some(listener);
                self.notice(format!("Server listening on {addr}"));
                self.notice("Waiting for client to connect...");
                Ok(addr)
            }
            Err(err) => {
                self.notice(format!("Server error: {err}"));
                Err(err)
            }
        }
    }

    /// Listener role: wait for the peer on the bound listener.
    pub async fn accept(&mut self) -> Result<(), ConnError> {
        let accepted = match self.listener.as_ref() {
            Some(listener) => listener.accept().await,
            None => Err(ConnError::Accept(io::Error::new(
                io::ErrorKind::NotConnected,
                "not listening",
            ))),
        };
        self.on_accepted(accepted)
    }

    fn on_accepted(&mut self, accepted: Result<Connection, ConnError>) -> Result<(), ConnError> {
        match accepted {
            Ok(conn) => {
                self.notice(format!("Client connected from {}", conn.peer_addr));
                self.attach(conn);
                Ok(())
            }
            Err(err) => {
                // A listener that failed once is not polled again.
                self.listener = None;
                self.notice(format!("Server error: {err}"));
                Err(err)
            }
        }
    }

    /// Initiator role: dial the configured address once.
    ///
    /// A failure leaves the session running and disconnected; the user may
    /// retry.
    pub async fn dial(&mut self) -> Result<(), ConnError> {
        self.notice(format!("Connecting to {}...", self.config.addr()));
        match Connection::connect(&self.config.host, self.config.port).await {
            Ok(conn) => {
                self.attach(conn);
                self.notice("Connected to server!");
                Ok(())
            }
            Err(err) => {
                log::warn!("[session] {err}");
                self.notice(format!("Connection failed: {err}"));
                self.notice("Other computer not responding. Retry with /r or quit with /q");
                Err(err)
            }
        }
    }

    fn attach(&mut self, conn: Connection) {
        log::info!("[session] link up {} <-> {}", conn.local_addr, conn.peer_addr);
        self.connection = Some(conn);
        self.connected = true;
        self.refresh_status();
    }

    /// Redial after a failed or lost link.  Initiator only.
    pub async fn retry(&mut self) {
        if self.config.role != Role::Initiator {
            self.notice("Retry is only available as client");
            return;
        }
        if self.connected {
            self.notice("Already connected");
            return;
        }
        // Drop any handle kept after a remote disconnect before dialling.
        self.connection = None;
        // The failure has already been reported as notices.
        let _ = self.dial().await;
    }

    /// Report a real loss once and drop the handle.
    fn lose_connection(&mut self, notice: &str) {
        let had_link = self.connection.take().is_some();
        if self.connected || had_link {
            self.connected = false;
            log::info!("[session] link down: {notice}");
            self.notice(notice);
            self.refresh_status();
        }
    }

    /// Flush and close the link.  Errors are swallowed.
    pub async fn shutdown(&mut self) {
        self.connected = false;
        self.listener = None;
        if let Some(conn) = self.connection.take() {
            if let Err(err) = conn.shutdown().await {
                log::warn!("[session] shutdown: {err}");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// The single transmission primitive.
    ///
    /// `text` is normalised to what the peer will read (one line, trimmed,
    /// no sentinel) and that exact string becomes `last_sent_message` and the
    /// logged `YOU` line.  Returns `false` without side effects when
    /// disconnected or when nothing is left to send.  A write failure is
    /// reported as a lost connection.
    pub async fn send_message(&mut self, text: &str) -> bool {
        if !self.connected {
            return false;
        }
        let text = single_line(text).trim().to_owned();
        if text.is_empty() {
            return false;
        }
        let Some(conn) = self.connection.as_mut() else {
            return false;
        };
        match conn.send(Frame::Message(text.clone())).await {
            Ok(()) => {
                self.state.note_sent(&text);
                let line = DisplayLine::now(Source::You, text);
                self.write_log(&line);
                true
            }
            Err(err) => {
                log::warn!("[session] send failed: {err}");
                self.lose_connection("Connection lost!");
                false
            }
        }
    }

    /// A line typed by the user.
    pub async fn submit(&mut self, line: &str) {
        match outbound::submit_line(&mut self.state, line) {
            Submission::Captured { notice } => {
                self.notice(notice);
                self.refresh_status();
            }
            Submission::Transmit(text) => {
                if !self.connected {
                    self.notice("Not connected - message not sent");
                } else if self.send_message(&text).await {
                    // Show what went out; send_message already logged it.
                    let sent = self.state.last_sent_message().to_owned();
                    self.emit(Source::You, &sent, false);
                }
            }
        }
    }

    /// One ASCII-spam tick.
    pub async fn spam_tick(&mut self) {
        if let Some(payload) = self.spam.tick(&self.state, self.connected) {
            self.send_message(&payload).await;
        }
    }

    /// One repeat-send tick.
    pub async fn repeat_tick(&mut self) {
        if let Some(payload) = outbound::repeat_tick(&self.state, self.connected) {
            self.send_message(&payload).await;
        }
    }

    /// Send the recorded buffer as one message.
    pub async fn playback(&mut self) {
        match outbound::playback(&self.state) {
            None => self.notice("Nothing recorded to play back"),
            Some(_) if !self.connected => self.notice("Not connected - message not sent"),
            Some(text) => {
                if self.send_message(&text).await {
                    self.notice("Played back recorded message");
                }
            }
        }
    }

    /// Tell the peer we left while keeping the socket open.
    pub async fn fake_disconnect(&mut self) {
        if !self.connected {
            self.notice("Not connected");
            return;
        }
        if let Some(conn) = self.connection.as_mut() {
            // The prank goes ahead even if the peer never sees the sentinel.
            if let Err(err) = conn.send(Frame::Disconnect).await {
                log::warn!("[session] sentinel not sent: {err}");
            }
        }
        self.state.begin_fake_disconnect();
        self.notice("Fake disconnect... press any key to 'reconnect'");
        self.refresh_status();
    }

    // -----------------------------------------------------------------------
    // Receiving
    // -----------------------------------------------------------------------

    /// One bounded-wait receive and its processing.
    pub async fn poll_inbound(&mut self) -> Polled {
        if !self.connected {
            return Polled::Idle;
        }
        let wait = self.config.inbound_poll;
        let Some(conn) = self.connection.as_mut() else {
            return Polled::Idle;
        };
        let received = conn.receive(wait).await;
        self.handle_received(received).await
    }

    async fn handle_received(&mut self, received: Result<Received, ConnError>) -> Polled {
        match received {
            Ok(Received::Timeout) => Polled::Idle,
            Ok(Received::Frame(Frame::Disconnect)) => {
                self.on_remote_disconnect();
                Polled::Disconnected
            }
            Ok(Received::Frame(Frame::Message(text))) => {
                self.handle_message(text).await;
                if self.connected {
                    Polled::Handled
                } else {
                    Polled::Disconnected
                }
            }
            Ok(Received::Malformed(err)) => {
                log::warn!("[session] dropped inbound record: {err}");
                Polled::Handled
            }
            Ok(Received::Closed) => {
                self.lose_connection("Connection closed by remote.");
                Polled::Disconnected
            }
            Err(err) => {
                log::warn!("[session] receive failed: {err}");
                self.lose_connection("Connection lost!");
                Polled::Disconnected
            }
        }
    }

    /// The peer sent the sentinel.  The handle is kept so a pranking peer
    /// can keep writing; we just stop talking.
    fn on_remote_disconnect(&mut self) {
        log::info!("[session] disconnect sentinel received");
        self.connected = false;
        self.notice("Remote terminal disconnected.");
        self.refresh_status();
    }

    async fn handle_message(&mut self, text: String) {
        match inbound::evaluate(&mut self.state, &text) {
            InboundAction::Discard(reason) => {
                log::debug!("[session] discarded {text:?}: {reason:?}");
            }
            InboundAction::Deliver { bounce } => {
                if bounce {
                    self.send_message(&text).await;
                }
                self.emit(Source::Remote, &text, true);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Apply one command.
    ///
    /// While a fake disconnect is in progress the command is consumed by the
    /// "reconnect" instead.
    pub async fn handle_command(&mut self, command: Command) {
        if self.state.end_fake_disconnect() {
            self.notice("'Reconnected' - other terminal didn't notice!");
            self.refresh_status();
            return;
        }

        log::debug!("[session] command {command:?}");
        match command {
            Command::ToggleDeflector => {
                let notice = self.state.toggle_deflector();
                self.toggled(notice);
            }
            Command::ToggleAsciiSpam => {
                let notice = self.state.toggle_ascii_spam();
                self.toggled(notice);
            }
            Command::ToggleRepeatSend => {
                let notice = self.state.toggle_repeat_send();
                self.toggled(notice);
            }
            Command::ToggleAntiDeflector => {
                let notice = self.state.toggle_anti_deflector();
                self.toggled(notice);
            }
            Command::ToggleNoInput => {
                let notice = self.state.toggle_no_input();
                self.toggled(notice);
            }
            Command::ToggleRecording => {
                let notice = self.state.toggle_recording();
                self.toggled(notice);
            }
            Command::FakeDisconnect => self.fake_disconnect().await,
            Command::Playback => self.playback().await,
            Command::ToggleLogging => self.toggle_logging(),
            Command::Send(line) => self.submit(&line).await,
            Command::Retry => self.retry().await,
            Command::Quit => {
                log::info!("[session] quit requested");
                self.running = false;
            }
        }
    }

    fn toggled(&mut self, notice: String) {
        self.notice(notice);
        self.refresh_status();
    }

    /// Open a fresh log file, or close the current one.
    pub fn toggle_logging(&mut self) {
        if self.log.take().is_some() {
            self.notice("File logging OFF");
        } else {
            match FileLog::create(&self.config.log_dir) {
                Ok(file) => {
                    let path = file.path().display().to_string();
                    self.log = Some(Box::new(file));
                    self.notice(format!("Logging to {path}"));
                }
                Err(err) => self.notice(format!("Failed to create log: {err}")),
            }
        }
        self.refresh_status();
    }

    /// Start logging to `sink`, replacing any current log.
    pub fn attach_log(&mut self, sink: Box<dyn LogSink + Send>) {
        self.log = Some(sink);
        self.refresh_status();
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Drive the session until `Quit` or until every command sender is gone.
    /// The link is shut down on the way out.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) {
        let mut spam = ticker(self.config.spam_interval);
        let mut repeat = ticker(self.config.repeat_interval);
        let poll = self.config.inbound_poll;
        self.refresh_status();

        while self.running {
            let listening = self.connected && self.connection.is_some();
            let awaiting_peer = !self.connected && self.listener.is_some();
            let event = tokio::select! {
                biased;

                cmd = commands.recv() => Event::Command(cmd),

                accepted = accept_from(self.listener.as_ref()), if awaiting_peer => {
                    Event::Accepted(accepted)
                }

                received = receive_from(self.connection.as_mut(), poll), if listening => {
                    Event::Inbound(received)
                }

                _ = spam.tick() => Event::SpamTick,

                _ = repeat.tick() => Event::RepeatTick,
            };

            match event {
                Event::Command(Some(command)) => self.handle_command(command).await,
                Event::Command(None) => {
                    log::info!("[session] command channel closed");
                    self.running = false;
                }
                Event::Accepted(accepted) => {
                    // Failures are already shown as notices.
                    let _ = self.on_accepted(accepted);
                }
                Event::Inbound(received) => {
                    self.handle_received(received).await;
                }
                Event::SpamTick => self.spam_tick().await,
                Event::RepeatTick => self.repeat_tick().await,
            }
        }

        self.shutdown().await;
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    fn notice(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.emit(Source::System, &text, true);
    }

    fn emit(&mut self, source: Source, text: &str, log: bool) {
        let line = DisplayLine::now(source, text);
        self.display.display_line(&line);
        if log {
            self.write_log(&line);
        }
        self.history.push(line);
    }

    fn write_log(&mut self, line: &DisplayLine) {
        let Some(sink) = self.log.as_mut() else {
            return;
        };
        if let Err(err) = sink.log_line(&line.timestamp, line.source, &line.text) {
            let err = LogWriteError::from(err);
            log::warn!("[session] {err}");
            self.log = None;
            self.notice(err.to_string());
            self.refresh_status();
        }
    }

    fn refresh_status(&mut self) {
        let status = self.status();
        self.display.status(&status);
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn status(&self) -> Status {
        Status {
            role: self.config.role,
            connected: self.connected,
            flags: self.state.flags(),
            logging: self.log.is_some(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &FeatureState {
        &self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_logging(&self) -> bool {
        self.log.is_some()
    }
}

/// Next peer on an optional listener.  Never resolves without one.
async fn accept_from(listener: Option<&Listener>) -> Result<Connection, ConnError> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

/// Bounded receive on an optional link.  Never resolves without one.
async fn receive_from(
    connection: Option<&mut Connection>,
    wait: Duration,
) -> Result<Received, ConnError> {
    match connection {
        Some(conn) => conn.receive(wait).await,
        None => std::future::pending().await,
    }
}

/// A background-sender interval that drops ticks missed while busy.
fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
