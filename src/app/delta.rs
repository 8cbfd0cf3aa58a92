// LogTail - app/delta.rs
//
// Change processing for one file: Rotation Detector -> Delta Reader ->
// Line Splitter -> Event Dispatcher -> cursor update.
//
// Every step runs under the file's own lock, so reads, carry-over mutation,
// event delivery and the cursor update for a file form one ordered timeline
// while other files proceed independently. Both change drivers funnel into
// `DeltaReader::process`; neither has its own read or split logic.
//
// Error policy:
//   - A file that is gone at stat or read time is removed: one FileRemoved
//     event, cursor dropped.
//   - Any other I/O failure emits an Error event and keeps the cursor at the
//     last fully processed chunk; the next notice retries from there.
//   - The range is streamed in READ_CHUNK_SIZE pieces and the cursor advances
//     after each chunk, so a failure part-way never re-emits earlier lines.

use crate::app::cursor::{lock, CursorStore, TrackedFile};
use crate::app::dispatch::Dispatcher;
use crate::core::model::{LineEvent, SizeChange, TailEvent};
use crate::core::rotation;
use crate::platform::fs::FileSource;
use crate::util::constants::READ_CHUNK_SIZE;
use crate::util::error::TailError;
use crate::util::logging::preview;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

/// What processing a change notice did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The path has no cursor (never registered, or removed).
    Untracked,
    /// Size equals the cursor; nothing was read.
    Unchanged,
    /// New bytes were read. `truncated` is set when the file had shrunk.
    Read { lines: usize, truncated: bool },
    /// The file vanished and was dropped.
    Removed,
    /// A recoverable error was reported; the cursor is unchanged.
    Failed,
}

/// Shared consumer behind both change drivers.
pub struct DeltaReader {
    fs: Arc<dyn FileSource>,
    store: Arc<CursorStore>,
    dispatcher: Arc<Dispatcher>,
    chunk_size: u64,
}

impl DeltaReader {
    pub fn new(
        fs: Arc<dyn FileSource>,
        store: Arc<CursorStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            fs,
            store,
            dispatcher,
            chunk_size: READ_CHUNK_SIZE,
        }
    }

    /// Override the streaming chunk size.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Re-examine `path`: classify its size against the cursor and read
    /// whatever is new.
    pub fn process(&self, path: &Path) -> Outcome {
        let Some(handle) = self.store.get(path) else {
            return Outcome::Untracked;
        };
        let mut file = lock(&handle);
        if !file.is_active() {
            return Outcome::Untracked;
        }

        let current_size = match self.fs.stat(path) {
            Ok(Some(stat)) => stat.size,
            Ok(None) => {
                self.vanish(&mut file);
                return Outcome::Removed;
            }
            Err(e) => {
                self.report(&TailError::from_io(path.to_path_buf(), e));
                return Outcome::Failed;
            }
        };

        let change = rotation::classify(file.last_known_size(), current_size);
        let Some((start, end)) = change.range() else {
            return Outcome::Unchanged;
        };

        let truncated = matches!(change, SizeChange::Truncated { .. });
        if truncated {
            tracing::info!(
                file = %path.display(),
                old_size = file.last_known_size(),
                new_size = current_size,
                "File truncated or rotated, re-reading from start"
            );
            file.reset();
        }

        match self.read_range(&mut file, start, end) {
            Ok(lines) => Outcome::Read { lines, truncated },
            Err(TailError::FileVanished { .. }) => {
                self.vanish(&mut file);
                Outcome::Removed
            }
            Err(e) => {
                self.report(&e);
                Outcome::Failed
            }
        }
    }

    /// Stream `[start, end)` of the file through its splitter, emitting one
    /// event per complete line. Returns the number of lines emitted.
    ///
    /// A trailing fragment stays in the carry-over; it is not emitted.
    pub fn read_range(
        &self,
        file: &mut TrackedFile,
        start: u64,
        end: u64,
    ) -> Result<usize, TailError> {
        let mut pos = start;
        let mut emitted = 0;

        while pos < end {
            let chunk_end = pos.saturating_add(self.chunk_size).min(end);
            let bytes = self
                .fs
                .read_range(file.path(), pos, chunk_end)
                .map_err(|e| TailError::from_io(file.path().to_path_buf(), e))?;
            if bytes.is_empty() {
                // Shrunk under us; the next notice reclassifies.
                break;
            }
            let short = (bytes.len() as u64) < chunk_end - pos;
            pos += bytes.len() as u64;

            let outcome = file.split(&bytes);
            if outcome.discarded > 0 {
                tracing::warn!(
                    file = %file.path().display(),
                    bytes = outcome.discarded,
                    "Discarded oversized unterminated line"
                );
            }
            emitted += emit_lines(&self.dispatcher, file, outcome.lines);
            file.advance_to(pos);

            if short {
                break;
            }
        }

        tracing::debug!(
            file = %file.path().display(),
            start,
            end = pos,
            lines = emitted,
            "Delta read"
        );
        Ok(emitted)
    }

    fn vanish(&self, file: &mut TrackedFile) {
        if self.store.remove_locked(file) {
            tracing::info!(file = %file.path().display(), "Tracked file removed");
            self.dispatcher.dispatch(TailEvent::FileRemoved {
                file: file.path().to_path_buf(),
            });
        }
    }

    fn report(&self, e: &TailError) {
        tracing::warn!(error = %e, "Tail read failed");
        self.dispatcher.dispatch(TailEvent::from_error(e));
    }
}

/// Dispatch one `Line` event per line, numbering them from the file's
/// sequence counter. Returns the number of events sent.
pub(crate) fn emit_lines(
    dispatcher: &Dispatcher,
    file: &mut TrackedFile,
    lines: Vec<String>,
) -> usize {
    let count = lines.len();
    for text in lines {
        let seq = file.next_seq();
        tracing::trace!(file = %file.path().display(), seq, line = preview(&text), "Line");
        dispatcher.dispatch(TailEvent::Line(LineEvent {
            file: file.path().to_path_buf(),
            text,
            seq,
            timestamp: Utc::now(),
        }));
    }
    count
}
