//! Chat-war feature state.
//!
//! [`FeatureState`] is the one mutable bundle of toggles and their data.  It
//! is owned by the session's control task and changes only through the
//! methods below, which enforce the rules that tie the features together:
//!
//! ```text
//!  repeat_send OFF ──toggle──▶ ARMED (payload "") ──user line──▶ PRIMED (payload set)
//!        ▲                          │                                  │
//!        └────────toggle (payload cleared)◀────────────────────────────┘
//!
//!  recording OFF ──toggle (buffer cleared)──▶ ON ──toggle──▶ OFF (buffer kept for playback)
//! ```
//!
//! No I/O happens here.  Every toggle returns the one notice the session must
//! show for it.

/// Snapshot of the boolean toggles, for status displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub deflector: bool,
    pub ascii_spam: bool,
    pub repeat_send: bool,
    pub anti_deflector: bool,
    pub no_input: bool,
    pub fake_disconnected: bool,
    pub recording: bool,
}

/// Toggles plus the text they carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureState {
    deflector: bool,
    ascii_spam: bool,
    repeat_send: bool,
    anti_deflector: bool,
    no_input: bool,
    fake_disconnected: bool,
    /// Captured once after arming, reused until repeat send is toggled off.
    repeat_message: String,
    recording: bool,
    recorded_buffer: String,
    /// Last text that went out on the wire; the anti-deflector reference.
    last_sent_message: String,
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "ON"
    } else {
        "OFF"
    }
}

impl FeatureState {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Toggles
    // -----------------------------------------------------------------------

    pub fn toggle_deflector(&mut self) -> String {
        self.deflector = !self.deflector;
        format!("Deflector {}", on_off(self.deflector))
    }

    pub fn toggle_ascii_spam(&mut self) -> String {
        self.ascii_spam = !self.ascii_spam;
        format!("ASCII Spam {}", on_off(self.ascii_spam))
    }

    pub fn toggle_anti_deflector(&mut self) -> String {
        self.anti_deflector = !self.anti_deflector;
        format!("Anti-Deflector {}", on_off(self.anti_deflector))
    }

    pub fn toggle_no_input(&mut self) -> String {
        self.no_input = !self.no_input;
        format!("No Input {}", on_off(self.no_input))
    }

    /// Arm repeat send, or switch it off and forget the payload.
    ///
    /// Arming returns a prompt rather than an ON notice: the next user line
    /// becomes the payload (see [`FeatureState::capture_repeat`]).
    pub fn toggle_repeat_send(&mut self) -> String {
        if self.repeat_send {
            self.repeat_send = false;
            self.repeat_message.clear();
            "Repeat Send OFF".to_string()
        } else {
            self.repeat_send = true;
            "Enter message to repeat, then press Enter".to_string()
        }
    }

    /// Start recording into an empty buffer, or stop and report its size.
    pub fn toggle_recording(&mut self) -> String {
        if self.recording {
            self.recording = false;
            format!(
                "Recording OFF - captured {} chars",
                self.recorded_buffer.chars().count()
            )
        } else {
            self.recorded_buffer.clear();
            self.recording = true;
            "Recording ON - incoming messages being captured".to_string()
        }
    }

    // -----------------------------------------------------------------------
    // Transitions driven by traffic
    // -----------------------------------------------------------------------

    /// If repeat send is armed, take `line` as its payload and return the
    /// confirmation notice.  Otherwise leave `line` to be sent normally.
    pub fn capture_repeat(&mut self, line: &str) -> Option<String> {
        if !self.is_repeat_armed() {
            return None;
        }
        self.repeat_message = line.to_string();
        Some(format!("Will repeat: '{line}'"))
    }

    /// Append a delivered inbound text while recording.
    pub fn record(&mut self, text: &str) {
        if self.recording {
            self.recorded_buffer.push_str(text);
        }
    }

    /// Remember what just went out on the wire.
    pub fn note_sent(&mut self, text: &str) {
        self.last_sent_message.clear();
        self.last_sent_message.push_str(text);
    }

    pub fn begin_fake_disconnect(&mut self) {
        self.fake_disconnected = true;
    }

    /// Clear the fake-disconnect flag.  Returns `true` if it was set.
    pub fn end_fake_disconnect(&mut self) -> bool {
        std::mem::replace(&mut self.fake_disconnected, false)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn deflector(&self) -> bool {
        self.deflector
    }

    pub fn ascii_spam(&self) -> bool {
        self.ascii_spam
    }

    pub fn repeat_send(&self) -> bool {
        self.repeat_send
    }

    pub fn anti_deflector(&self) -> bool {
        self.anti_deflector
    }

    pub fn no_input(&self) -> bool {
        self.no_input
    }

    pub fn fake_disconnected(&self) -> bool {
        self.fake_disconnected
    }

    pub fn recording(&self) -> bool {
        self.recording
    }

    pub fn repeat_message(&self) -> &str {
        &self.repeat_message
    }

    pub fn recorded_buffer(&self) -> &str {
        &self.recorded_buffer
    }

    pub fn last_sent_message(&self) -> &str {
        &self.last_sent_message
    }

    /// Repeat send is on and still waiting for its payload.
    pub fn is_repeat_armed(&self) -> bool {
        self.repeat_send && self.repeat_message.is_empty()
    }

    /// The payload the repeat sender should transmit, once primed.
    pub fn repeat_payload(&self) -> Option<&str> {
        (self.repeat_send && !self.repeat_message.is_empty()).then_some(self.repeat_message.as_str())
    }

    pub fn flags(&self) -> FeatureFlags {
        FeatureFlags {
            deflector: self.deflector,
            ascii_spam: self.ascii_spam,
            repeat_send: self.repeat_send,
            anti_deflector: self.anti_deflector,
            no_input: self.no_input,
            fake_disconnected: self.fake_disconnected,
            recording: self.recording,
        }
    }
}
