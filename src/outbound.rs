//! Outbound decisions: user lines, background senders, playback.
//!
//! Like [`crate::inbound`], nothing here writes to the socket.  Each function
//! tells the session *what* to transmit; the session funnels every
//! transmission through its single send primitive so `last_sent_message`
//! always reflects the wire.
//!
//! Background senders are gated per tick:
//!
//! | Sender | Sends when                                   | Payload                 |
//! |--------|----------------------------------------------|-------------------------|
//! | spam   | `ascii_spam` on and connected                 | one char in `'!'..='~'` |
//! | repeat | `repeat_send` on, payload set and connected   | `repeat_message`        |

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::state::FeatureState;

/// Lowest and highest printable, non-blank ASCII codes used for spam.
const SPAM_FIRST: u8 = b'!';
const SPAM_LAST: u8 = b'~';

/// What to do with a line the user submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Repeat send was armed; the line became its payload and is not sent
    /// this turn.
    Captured { notice: String },
    /// Send the line.
    Transmit(String),
}

/// Route a user line, capturing it as the repeat payload when armed.
pub fn submit_line(state: &mut FeatureState, line: &str) -> Submission {
    match state.capture_repeat(line) {
        Some(notice) => Submission::Captured { notice },
        None => Submission::Transmit(line.to_string()),
    }
}

/// Payload for one repeat-send tick, if the sender is due to fire.
pub fn repeat_tick(state: &FeatureState, connected: bool) -> Option<String> {
    if !connected {
        return None;
    }
    state.repeat_payload().map(str::to_string)
}

/// The recorded buffer as a single message, or `None` if nothing was recorded.
pub fn playback(state: &FeatureState) -> Option<String> {
    let recorded = state.recorded_buffer();
    (!recorded.is_empty()).then(|| recorded.to_string())
}

/// Source of random spam characters.
#[derive(Debug)]
pub struct AsciiSpam {
    rng: StdRng,
}

impl Default for AsciiSpam {
    fn default() -> Self {
        Self::new()
    }
}

impl AsciiSpam {
    /// Spam source seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic spam source.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// One random printable character.  Never whitespace or a control code.
    pub fn next_char(&mut self) -> char {
        char::from(self.rng.random_range(SPAM_FIRST..=SPAM_LAST))
    }

    /// Payload for one spam tick, if the sender is due to fire.
    pub fn tick(&mut self, state: &FeatureState, connected: bool) -> Option<String> {
        if !(connected && state.ascii_spam()) {
            return None;
        }
        Some(self.next_char().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armed_repeat_captures_next_line() {
        let mut s = FeatureState::new();
        s.toggle_repeat_send();
        assert_eq!(
            submit_line(&mut s, "PING"),
            Submission::Captured {
                notice: "Will repeat: 'PING'".to_string()
            }
        );
        assert_eq!(
            submit_line(&mut s, "hello"),
            Submission::Transmit("hello".to_string())
        );
    }

    #[test]
    fn repeat_tick_needs_payload_and_link() {
        let mut s = FeatureState::new();
        assert_eq!(repeat_tick(&s, true), None);

        s.toggle_repeat_send();
        assert_eq!(repeat_tick(&s, true), None, "armed but no payload yet");

        s.capture_repeat("PING");
        assert_eq!(repeat_tick(&s, true).as_deref(), Some("PING"));
        assert_eq!(repeat_tick(&s, false), None);

        s.toggle_repeat_send();
        assert_eq!(repeat_tick(&s, true), None);
    }

    #[test]
    fn spam_chars_are_printable_and_not_blank() {
        let mut spam = AsciiSpam::seeded(7);
        for _ in 0..1000 {
            let c = spam.next_char();
            assert!(c.is_ascii_graphic(), "unexpected spam char {c:?}");
        }
    }

    #[test]
    fn spam_tick_is_gated() {
        let mut spam = AsciiSpam::seeded(1);
        let mut s = FeatureState::new();
        assert_eq!(spam.tick(&s, true), None);

        s.toggle_ascii_spam();
        assert_eq!(spam.tick(&s, false), None);
        let payload = spam.tick(&s, true).unwrap();
        assert_eq!(payload.chars().count(), 1);
    }

    #[test]
    fn playback_of_empty_buffer_is_none() {
        let mut s = FeatureState::new();
        assert_eq!(playback(&s), None);

        s.toggle_recording();
        s.record("abc");
        assert_eq!(playback(&s).as_deref(), Some("abc"));
    }
}
