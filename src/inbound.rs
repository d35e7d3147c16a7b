//! Inbound message pipeline.
//!
//! [`evaluate`] decides what happens to one received chat line:
//!
//! ```text
//!  received ──no_input?──▶ discard
//!      │
//!      └──anti_deflector && text == last_sent?──▶ discard
//!             │
//!             └──▶ deliver { bounce: deflector }   (recorded here)
//! ```
//!
//! The order is fixed.  `no_input` must short-circuit before any stateful
//! side effect, and the echo check must see `last_sent_message` before a
//! bounce overwrites it.  This module does not touch the socket; the session
//! performs the bounce (before display) and the display/log writes.

use crate::state::FeatureState;

/// Why an inbound line was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// No-input mode ignores everything.
    NoInput,
    /// The line equals our own last transmission.
    OwnEcho,
}

/// What the session must do with an inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundAction {
    Discard(DiscardReason),
    /// Show (and log) the line, re-sending it first when `bounce` is set.
    Deliver { bounce: bool },
}

/// Run `text` through the feature filters.
///
/// A delivered line is appended to the recording buffer as part of the
/// decision, so callers never record a discarded line.
pub fn evaluate(state: &mut FeatureState, text: &str) -> InboundAction {
    if state.no_input() {
        return InboundAction::Discard(DiscardReason::NoInput);
    }
    if state.anti_deflector() && text == state.last_sent_message() {
        return InboundAction::Discard(DiscardReason::OwnEcho);
    }
    state.record(text);
    InboundAction::Deliver {
        bounce: state.deflector(),
    }
}
