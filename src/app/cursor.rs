// LogTail - app/cursor.rs
//
// File Cursor Store: the single source of truth for what has been consumed
// from each tracked file.
//
// Concurrency:
//   - The map lives behind an `RwLock` that is only held long enough to
//     clone an entry's `Arc`; it is never held across I/O.
//   - Each `TrackedFile` sits behind its own `Mutex`. Holding that mutex is
//     what gives a file its single processing timeline: stat, read, split,
//     dispatch, and cursor update all happen under it.
//   - Lock order is always file -> map, never the reverse.
//
// A removed entry is marked inactive under its own lock before it leaves the
// map, so a thread that was blocked on the lock of an orphaned entry sees it
// is dead and does not read on its behalf.

use crate::core::splitter::{LineSplitter, SplitOutcome};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

/// Shared handle to one tracked file's state.
pub type FileHandle = Arc<Mutex<TrackedFile>>;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-file cursor state.
#[derive(Debug)]
pub struct TrackedFile {
    path: PathBuf,
    /// File size as of the most recent successful read.
    last_known_size: u64,
    splitter: LineSplitter,
    /// Last sequence number handed out.
    seq: u64,
    active: bool,
}

impl TrackedFile {
    fn new(path: PathBuf, seq: u64) -> Self {
        Self {
            path,
            last_known_size: 0,
            splitter: LineSplitter::default(),
            seq,
            active: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_known_size(&self) -> u64 {
        self.last_known_size
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn carry_over(&self) -> &[u8] {
        self.splitter.carry()
    }

    /// Record that bytes up to `size` have been consumed.
    pub(crate) fn advance_to(&mut self, size: u64) {
        self.last_known_size = size;
    }

    /// Rotation: forget the cursor and any partial line.
    pub(crate) fn reset(&mut self) {
        self.last_known_size = 0;
        self.splitter.reset();
    }

    /// Returns the number of bytes dropped by the carry-over cap.
    pub(crate) fn set_carry_over(&mut self, carry: Vec<u8>) -> usize {
        self.splitter.set_carry(carry)
    }

    pub(crate) fn split(&mut self, chunk: &[u8]) -> SplitOutcome {
        self.splitter.push(chunk)
    }

    pub(crate) fn flush(&mut self) -> Option<String> {
        self.splitter.flush()
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }
}

/// Result of a non-blocking cursor lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorProbe {
    /// The file is tracked and idle; this is its stored size.
    Size(u64),
    /// The file is being processed right now.
    Busy,
    /// The path is not tracked.
    Untracked,
}

/// Mapping from file identity to cursor state, owned by one engine instance.
#[derive(Debug, Default)]
pub struct CursorStore {
    files: RwLock<HashMap<PathBuf, FileHandle>>,
    /// Last sequence number of files that were removed, so a file that
    /// re-appears keeps numbering monotonically.
    retired: Mutex<HashMap<PathBuf, u64>>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unpublished entry for `path` with a zero cursor.
    ///
    /// Callers lock the returned handle, then [`publish`](Self::publish) it,
    /// so no other thread can observe the entry before it is initialised.
    pub fn create(&self, path: &Path) -> FileHandle {
        let seq = lock(&self.retired).remove(path).unwrap_or(0);
        Arc::new(Mutex::new(TrackedFile::new(path.to_path_buf(), seq)))
    }

    /// Make an entry visible. Replaces any previous entry for the path.
    pub fn publish(&self, handle: FileHandle, path: &Path) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), handle);
    }

    pub fn get(&self, path: &Path) -> Option<FileHandle> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    /// Remove the entry for a file whose lock the caller holds.
    ///
    /// Marks it inactive and retires its sequence counter. Returns `false`
    /// if the entry was already gone.
    pub fn remove_locked(&self, file: &mut TrackedFile) -> bool {
        if !file.active {
            return false;
        }
        file.deactivate();
        lock(&self.retired).insert(file.path.clone(), file.seq);
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&file.path)
            .is_some()
    }

    /// Stored size without waiting on a file that is mid-read.
    pub fn probe(&self, path: &Path) -> CursorProbe {
        let Some(handle) = self.get(path) else {
            return CursorProbe::Untracked;
        };
        let probe = match handle.try_lock() {
            Ok(file) if file.active => CursorProbe::Size(file.last_known_size),
            Ok(_) => CursorProbe::Untracked,
            Err(TryLockError::WouldBlock) => CursorProbe::Busy,
            Err(TryLockError::Poisoned(p)) => {
                let file = p.into_inner();
                if file.active {
                    CursorProbe::Size(file.last_known_size)
                } else {
                    CursorProbe::Untracked
                }
            }
        };
        probe
    }

    /// All tracked paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        paths.sort();
        paths
    }

    /// Snapshot of every handle, for teardown.
    pub fn handles(&self) -> Vec<FileHandle> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and all retired sequence counters.
    pub fn clear(&self) {
        for handle in self.handles() {
            lock(&handle).deactivate();
        }
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        lock(&self.retired).clear();
    }
}
