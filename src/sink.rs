//! Where engine output goes: the display and the optional session log.
//!
//! Both are append-only.  The engine calls [`DisplaySink::display_line`] for
//! every line a user should see and [`LogSink::log_line`] for every line that
//! crosses the engine while logging is on.  Rendering and file formats are
//! the sinks' business.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::config::Role;
use crate::state::FeatureFlags;

/// Who produced a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Remote,
    You,
    System,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Remote => "REMOTE",
            Source::You => "YOU",
            Source::System => "SYSTEM",
        })
    }
}

/// One timestamped line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub timestamp: DateTime<Local>,
    pub source: Source,
    pub text: String,
}

impl DisplayLine {
    pub fn now(source: Source, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            source,
            text: text.into(),
        }
    }
}

impl fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.source,
            self.text
        )
    }
}

/// What a status bar shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub role: Role,
    pub connected: bool,
    pub flags: FeatureFlags,
    pub logging: bool,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indicators: Vec<&str> = [
            (self.flags.deflector, "[DF]"),
            (self.flags.ascii_spam, "[ASCII]"),
            (self.flags.repeat_send, "[RS]"),
            (self.flags.anti_deflector, "[ADF]"),
            (self.flags.no_input, "[NI]"),
            (self.flags.recording, "[REC]"),
            (self.logging, "[LOG]"),
        ]
        .into_iter()
        .filter_map(|(on, tag)| on.then_some(tag))
        .collect();

        let features = if indicators.is_empty() {
            "[Ready]".to_string()
        } else {
            indicators.join(" ")
        };
        let connected = if self.connected { "YES" } else { "NO" };
        write!(f, "[{}] {features} | Connected: {connected}", self.role)
    }
}

/// Consumer of display lines and status changes.
pub trait DisplaySink {
    fn display_line(&mut self, line: &DisplayLine);

    /// Called whenever a toggle or the link state changes.
    fn status(&mut self, _status: &Status) {}
}

/// Durable record of the session.
pub trait LogSink {
    fn log_line(&mut self, timestamp: &DateTime<Local>, source: Source, text: &str)
        -> io::Result<()>;
}

/// A failed write to the session log.
#[derive(Debug, Error)]
#[error("Log write failed: {0}")]
pub struct LogWriteError(#[from] pub io::Error);

/// Session log written to `terminal_log_YYYYMMDD_HHMMSS.txt`.
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileLog {
    /// Create a fresh, timestamp-named log file inside `dir`.
    pub fn create(dir: &Path) -> io::Result<Self> {
        let name = format!("terminal_log_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(name);
        let file = File::create(&path)?;
        log::info!("[log] writing session log to {}", path.display());
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLog {
    fn log_line(
        &mut self,
        timestamp: &DateTime<Local>,
        source: Source,
        text: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[{}] {source}: {text}",
            timestamp.format("%H:%M:%S")
        )?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_line_format() {
        let line = DisplayLine::now(Source::Remote, "hi");
        let rendered = line.to_string();
        // "[HH:MM:SS] REMOTE: hi"
        assert_eq!(rendered.len(), "[00:00:00] REMOTE: hi".len());
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] REMOTE: hi"));
    }

    #[test]
    fn status_lists_active_features() {
        let mut status = Status {
            role: Role::Listener,
            connected: false,
            flags: FeatureFlags::default(),
            logging: false,
        };
        assert_eq!(status.to_string(), "[SERVER] [Ready] | Connected: NO");

        status.flags.deflector = true;
        status.flags.recording = true;
        status.logging = true;
        status.connected = true;
        assert_eq!(
            status.to_string(),
            "[SERVER] [DF] [REC] [LOG] | Connected: YES"
        );
    }

    #[test]
    fn file_log_writes_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();

        let mut log = FileLog::create(dir.path()).unwrap();
        assert!(log.path().starts_with(dir.path()));
        let name = log.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("terminal_log_") && name.ends_with(".txt"), "{name}");
        let now = Local::now();
        log.log_line(&now, Source::You, "hello").unwrap();
        log.log_line(&now, Source::System, "bye").unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] YOU: hello"));
        assert!(lines[1].ends_with("] SYSTEM: bye"));
    }
}
