//! Bounded buffer of displayed lines.

use std::collections::VecDeque;

use crate::sink::DisplayLine;

/// Displayed lines, oldest first.
///
/// Once more than `capacity` lines are held, the oldest are dropped so that
/// only the newest `capacity / 2` remain.
#[derive(Debug, Clone)]
pub struct History {
    lines: VecDeque<DisplayLine>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.saturating_add(1)),
            capacity,
        }
    }

    pub fn push(&mut self, line: DisplayLine) {
        self.lines.push_back(line);
        if self.lines.len() > self.capacity {
            let keep = self.capacity / 2;
            let excess = self.lines.len() - keep;
            self.lines.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayLine> {
        self.lines.iter()
    }

    pub fn last(&self) -> Option<&DisplayLine> {
        self.lines.back()
    }
}
