// LogTail - app/debouncer.rs
//
// Quiescence tracking for the Notifier driver: a modified file is only
// re-examined once no further modification has arrived for the configured
// window, so a burst of writes becomes one delta read. A file that is written
// continuously never goes quiet, so a pending change is also released once it
// has waited `max_wait`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Debounces change events by path.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending changes: path -> (first change, last change).
    pending: HashMap<PathBuf, (Instant, Instant)>,
    /// How long a file must be quiet before it is reported.
    window: Duration,
    /// Upper bound on how long a change may stay pending.
    max_wait: Duration,
}

impl Debouncer {
    pub fn new(window: Duration, max_wait: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            window,
            max_wait: max_wait.max(window),
        }
    }

    /// Record a change, restarting the quiet period for this path.
    pub fn record(&mut self, path: PathBuf) {
        self.record_at(path, Instant::now());
    }

    fn record_at(&mut self, path: PathBuf, at: Instant) {
        self.pending
            .entry(path)
            .and_modify(|(_, last)| *last = at)
            .or_insert((at, at));
    }

    /// Forget a path (e.g. it was removed and is reported immediately).
    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// Take every path that has been quiet for the full window.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        self.take_ready_at(Instant::now())
    }

    fn take_ready_at(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut ready = Vec::new();
        self.pending.retain(|path, (first, last)| {
            let quiet = now.duration_since(*last) >= self.window;
            let overdue = now.duration_since(*first) >= self.max_wait;
            if quiet || overdue {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });
        ready.sort();
        ready
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
