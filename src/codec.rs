//! Wire-format definitions for chat records.
//!
//! Every unit exchanged between the two terminals is a [`Frame`].  This module
//! is responsible for:
//! - Defining the on-wire layout of a chat line and of the disconnect signal.
//! - Serialising a [`Frame`] into the outbound byte buffer.
//! - Splitting the inbound byte stream back into [`Frame`]s, reporting
//!   undecodable records without ending the stream.
//!
//! No I/O happens here; [`ChatCodec`] plugs into `tokio_util::codec::Framed`.
//!
//! # Wire format
//!
//! ```text
//!  chat line        : <UTF-8 text, no '\n'> 0x0A
//!  disconnect signal: 0x10                       (bare byte, no newline)
//! ```
//!
//! There are no length prefixes or checksums.  A trailing `\r` before the
//! newline is tolerated, surrounding whitespace is trimmed and blank lines are
//! skipped.  A record consisting of the single byte `0x10` (with or without a
//! newline) is the disconnect signal and is never surfaced as text.

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Reserved byte that signals an intentional disconnect (`CHR$(16)`).
pub const CONTROL_SENTINEL: u8 = 0x10;

/// Longest record accepted without a newline before it is discarded.
pub const MAX_RECORD_LEN: usize = 64 * 1024;

/// One record on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A line of chat text.
    Message(String),
    /// The peer announced it is leaving.
    Disconnect,
}

impl Frame {
    /// Build a message frame, normalising `text` to a single line that cannot
    /// be mistaken for the disconnect signal.
    pub fn message(text: &str) -> Self {
        Frame::Message(single_line(text))
    }
}

/// Replace line breaks with spaces and drop the control sentinel so `text`
/// encodes as exactly one record.
pub fn single_line(text: &str) -> String {
    text.chars()
        .filter(|c| *c != char::from(CONTROL_SENTINEL))
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Reasons an inbound record is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Record bytes are not valid UTF-8.
    #[error("record of {len} bytes is not valid UTF-8")]
    InvalidUtf8 { len: usize },
    /// More than [`MAX_RECORD_LEN`] bytes arrived without a newline.
    #[error("record exceeds {MAX_RECORD_LEN} bytes without a newline")]
    TooLong,
}

/// Newline framing with the out-of-band disconnect byte.
///
/// Decoded items are `Result<Frame, DecodeError>` so a malformed record is
/// reported to the caller while the stream keeps running.  Only transport
/// failures surface as the codec's `io::Error`.
#[derive(Debug, Default)]
pub struct ChatCodec {
    /// Bytes at the front of the buffer already scanned for a newline.
    next_index: usize,
    /// Set while skipping the rest of an over-long record.
    discarding: bool,
}

impl ChatCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ChatCodec {
    type Item = Result<Frame, DecodeError>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.discarding {
                match src.iter().position(|b| *b == b'\n') {
                    Some(pos) => {
                        src.advance(pos + 1);
                        self.discarding = false;
                        self.next_index = 0;
                    }
                    None => {
                        src.clear();
                        return Ok(None);
                    }
                }
            }

            // The sentinel is only meaningful at a record boundary.
            if self.next_index == 0 && src.first() == Some(&CONTROL_SENTINEL) {
                src.advance(1);
                // Tolerate a newline sent after the sentinel.
                if src.first() == Some(&b'\n') {
                    src.advance(1);
                }
                return Ok(Some(Ok(Frame::Disconnect)));
            }

            let newline = src[self.next_index..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|i| i + self.next_index);

            match newline {
                Some(pos) => {
                    let record = src.split_to(pos + 1);
                    self.next_index = 0;
                    if let Some(item) = decode_record(&record[..pos]) {
                        return Ok(Some(item));
                    }
                    // Blank line: keep scanning.
                }
                None if src.len() > MAX_RECORD_LEN => {
                    src.clear();
                    self.next_index = 0;
                    self.discarding = true;
                    return Ok(Some(Err(DecodeError::TooLong)));
                }
                None => {
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        self.next_index = 0;
        if self.discarding || src.is_empty() {
            self.discarding = false;
            src.clear();
            return Ok(None);
        }
        // Peer closed mid-line: deliver what it managed to send.
        let record = src.split_to(src.len());
        Ok(decode_record(&record))
    }
}

impl Encoder<Frame> for ChatCodec {
    type Error = io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match frame {
            Frame::Message(text) => {
                dst.reserve(text.len() + 1);
                dst.put_slice(text.as_bytes());
                dst.put_u8(b'\n');
            }
            Frame::Disconnect => dst.put_u8(CONTROL_SENTINEL),
        }
        Ok(())
    }
}

/// Turn one newline-stripped record into a frame.  `None` for blank lines.
fn decode_record(raw: &[u8]) -> Option<Result<Frame, DecodeError>> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text.trim(),
        Err(_) => return Some(Err(DecodeError::InvalidUtf8 { len: raw.len() })),
    };
    if text.is_empty() {
        return None;
    }
    if text.as_bytes() == [CONTROL_SENTINEL] {
        return Some(Ok(Frame::Disconnect));
    }
    Some(Ok(Frame::Message(text.to_owned())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut ChatCodec, buf: &mut BytesMut) -> Vec<Result<Frame, DecodeError>> {
        let mut out = Vec::new();
        while let Some(item) = codec.decode(buf).unwrap() {
            out.push(item);
        }
        out
    }

    fn msg(text: &str) -> Result<Frame, DecodeError> {
        Ok(Frame::Message(text.to_string()))
    }

    #[test]
    fn message_encodes_as_text_plus_newline() {
        let mut buf = BytesMut::new();
        ChatCodec::new()
            .encode(Frame::message("hello"), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"hello\n");
    }

    #[test]
    fn disconnect_encodes_as_bare_sentinel() {
        let mut buf = BytesMut::new();
        ChatCodec::new().encode(Frame::Disconnect, &mut buf).unwrap();
        assert_eq!(&buf[..], &[CONTROL_SENTINEL]);
    }

    #[test]
    fn partial_record_waits_for_newline() {
        let mut codec = ChatCodec::new();
        let mut buf = BytesMut::from(&b"hel"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"lo\nwor");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(msg("hello")));
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(&buf[..], b"wor");
    }

    #[test]
    fn sentinel_between_records_is_a_disconnect() {
        let mut codec = ChatCodec::new();
        let mut buf = BytesMut::from(&b"one\n\x10two\n"[..]);
        assert_eq!(
            decode_all(&mut codec, &mut buf),
            vec![msg("one"), Ok(Frame::Disconnect), msg("two")]
        );
    }

    #[test]
    fn sentinel_followed_by_newline_is_one_disconnect() {
        let mut codec = ChatCodec::new();
        let mut buf = BytesMut::from(&b"\x10\n"[..]);
        assert_eq!(decode_all(&mut codec, &mut buf), vec![Ok(Frame::Disconnect)]);
        assert!(buf.is_empty());
    }

    #[test]
    fn crlf_and_blank_lines_are_normalised() {
        let mut codec = ChatCodec::new();
        let mut buf = BytesMut::from(&b"  hi there \r\n\n\r\nbye\n"[..]);
        assert_eq!(
            decode_all(&mut codec, &mut buf),
            vec![msg("hi there"), msg("bye")]
        );
    }

    #[test]
    fn invalid_utf8_is_reported_and_stream_continues() {
        let mut codec = ChatCodec::new();
        let mut buf = BytesMut::from(&b"\xff\xfe\nok\n"[..]);
        assert_eq!(
            decode_all(&mut codec, &mut buf),
            vec![Err(DecodeError::InvalidUtf8 { len: 2 }), msg("ok")]
        );
    }

    #[test]
    fn over_long_record_is_skipped_up_to_its_newline() {
        let mut codec = ChatCodec::new();
        let mut buf = BytesMut::from(&vec![b'a'; MAX_RECORD_LEN + 1][..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Err(DecodeError::TooLong)));

        buf.extend_from_slice(b"still the long one\nnext\n");
        assert_eq!(decode_all(&mut codec, &mut buf), vec![msg("next")]);
    }

    #[test]
    fn eof_flushes_unterminated_record() {
        let mut codec = ChatCodec::new();
        let mut buf = BytesMut::from(&b"last words"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(msg("last words")));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn message_constructor_keeps_one_record() {
        assert_eq!(
            Frame::message("a\nb\r\x10c"),
            Frame::Message("a b c".to_string())
        );
    }
}
