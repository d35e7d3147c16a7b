//! Plain stdout display used by the binary.

use std::io::{self, Write};

use crate::sink::{DisplayLine, DisplaySink, Status};

/// Prints every line to stdout and the status bar whenever it changes.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    last_status: Option<Status>,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySink for ConsoleDisplay {
    fn display_line(&mut self, line: &DisplayLine) {
        let mut out = io::stdout().lock();
        // A closed stdout leaves nothing to report to.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }

    fn status(&mut self, status: &Status) {
        if self.last_status.as_ref() == Some(status) {
            return;
        }
        self.last_status = Some(*status);
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "-- {status} --");
        let _ = out.flush();
    }
}
