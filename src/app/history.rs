// LogTail - app/history.rs
//
// In-memory ring buffer of the most recent line events. This is the only
// history the system keeps; nothing is persisted. A dashboard transport can
// replay `snapshot()` to a newly connected client.

use crate::app::cursor::lock;
use crate::app::dispatch::EventSink;
use crate::core::model::{LineEvent, TailEvent};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

/// Bounded history of line events, oldest first.
pub struct HistorySink {
    lines: Mutex<VecDeque<LineEvent>>,
    capacity: usize,
}

impl HistorySink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity.min(4_096))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        lock(&self.lines).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the buffered lines, oldest first.
    pub fn snapshot(&self) -> Vec<LineEvent> {
        lock(&self.lines).iter().cloned().collect()
    }

    /// Buffered lines of one file, oldest first.
    pub fn lines_for(&self, file: &Path) -> Vec<LineEvent> {
        lock(&self.lines)
            .iter()
            .filter(|l| l.file == file)
            .cloned()
            .collect()
    }
}

impl EventSink for HistorySink {
    fn deliver(&self, event: &TailEvent) {
        if let TailEvent::Line(line) = event {
            let mut lines = lock(&self.lines);
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            lines.push_back(line.clone());
        }
    }
}
