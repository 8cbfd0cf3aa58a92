// LogTail - app/notifier.rs
//
// Notifier driver: OS file-change notifications via `notify`.
//
// The watcher subscribes to each tracked file's parent directory
// (non-recursive) rather than the file itself, so a file that is rotated
// away and recreated under the same name is still observed. Raw events are
// filtered to the tracked paths on a bridge thread:
//   - create / modify / rename: debounced, then one notice per quiet file
//   - remove: immediate notice, pending debounce dropped
//   - access: ignored
// The consumer re-stats on every notice, so spurious or duplicated events
// cost one `stat` and nothing else.

use crate::app::cursor::lock;
use crate::app::debouncer::Debouncer;
use crate::app::driver::{ChangeDriver, NoticeSender};
use crate::core::model::ChangeNotice;
use crate::util::constants::{CANCEL_CHECK_INTERVAL_MS, DEBOUNCE_MAX_WAIT_MS};
use crate::util::error::TailError;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

type WatchedSet = Arc<Mutex<HashSet<PathBuf>>>;

pub struct Notifier {
    debounce: Duration,
    paths: WatchedSet,
    /// Parent directory -> number of tracked files in it.
    dirs: HashMap<PathBuf, usize>,
    watcher: Option<notify::RecommendedWatcher>,
    cancel: Option<Arc<AtomicBool>>,
    thread: Option<JoinHandle<()>>,
}

impl Notifier {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            paths: Arc::new(Mutex::new(HashSet::new())),
            dirs: HashMap::new(),
            watcher: None,
            cancel: None,
            thread: None,
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl ChangeDriver for Notifier {
    fn name(&self) -> &'static str {
        "notify"
    }

    fn start(&mut self, notices: NoticeSender) -> Result<(), TailError> {
        self.stop_thread();

        let (raw_tx, raw_rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the bridge has shut down.
            let _ = raw_tx.send(res);
        })?;

        for dir in self.dirs.keys() {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);
        let paths = Arc::clone(&self.paths);
        let debounce = self.debounce;

        let thread = std::thread::Builder::new()
            .name("logtail-notifier".to_string())
            .spawn(move || run_bridge(raw_rx, paths, debounce, notices, thread_cancel))
            .map_err(|e| TailError::DriverSetup {
                driver: "notify",
                reason: e.to_string(),
            })?;

        self.watcher = Some(watcher);
        self.cancel = Some(cancel);
        self.thread = Some(thread);
        tracing::debug!(
            dirs = self.dirs.len(),
            debounce_ms = self.debounce.as_millis() as u64,
            "Notifier started"
        );
        Ok(())
    }

    fn watch(&mut self, path: &Path) -> Result<(), TailError> {
        if !lock(&self.paths).insert(path.to_path_buf()) {
            return Ok(());
        }

        let dir = parent_dir(path);
        let count = self.dirs.get(&dir).copied().unwrap_or(0);
        if count == 0 {
            if let Some(watcher) = self.watcher.as_mut() {
                if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
                    lock(&self.paths).remove(path);
                    return Err(e.into());
                }
                tracing::debug!(dir = %dir.display(), "Notifier: watching directory");
            }
        }
        self.dirs.insert(dir, count + 1);
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) {
        if !lock(&self.paths).remove(path) {
            return;
        }

        let dir = parent_dir(path);
        let Some(count) = self.dirs.get_mut(&dir) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.dirs.remove(&dir);
            if let Some(watcher) = self.watcher.as_mut() {
                if let Err(e) = watcher.unwatch(&dir) {
                    tracing::debug!(dir = %dir.display(), error = %e, "Notifier: unwatch failed");
                }
            }
        }
    }

    fn stop(&mut self) {
        self.stop_thread();
        lock(&self.paths).clear();
        self.dirs.clear();
    }
}

impl Notifier {
    /// Drop the OS watcher and join the bridge thread.
    fn stop_thread(&mut self) {
        if let Some(flag) = self.cancel.take() {
            flag.store(true, Ordering::SeqCst);
        }
        // Dropping the watcher releases every OS subscription and closes the
        // raw channel, which also ends the bridge.
        self.watcher = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Notifier thread panicked");
            }
            tracing::debug!("Notifier stopped");
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

/// How a raw event affects one tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Debounce,
    Immediate,
}

/// Map a raw event onto the tracked paths it touches.
fn classify_event(event: &Event, watched: &HashSet<PathBuf>) -> Vec<(PathBuf, Action)> {
    let action = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Remove(_) => Action::Immediate,
        _ => Action::Debounce,
    };
    event
        .paths
        .iter()
        .filter(|p| watched.contains(*p))
        .map(|p| (p.clone(), action))
        .collect()
}

fn run_bridge(
    raw_rx: mpsc::Receiver<notify::Result<Event>>,
    paths: WatchedSet,
    debounce: Duration,
    notices: NoticeSender,
    cancel: Arc<AtomicBool>,
) {
    let mut debouncer = Debouncer::new(debounce, Duration::from_millis(DEBOUNCE_MAX_WAIT_MS));
    let tick = Duration::from_millis(CANCEL_CHECK_INTERVAL_MS);

    loop {
        if cancel.load(Ordering::SeqCst) {
            return;
        }

        match raw_rx.recv_timeout(tick) {
            Ok(Ok(event)) => {
                let touched = classify_event(&event, &lock(&paths));
                for (path, action) in touched {
                    tracing::trace!(file = %path.display(), kind = ?event.kind, "Notifier: event");
                    match action {
                        Action::Debounce => debouncer.record(path),
                        Action::Immediate => {
                            debouncer.remove(&path);
                            if notices.send(ChangeNotice::new(path)).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "Notifier: watch error"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }

        for path in debouncer.take_ready() {
            if notices.send(ChangeNotice::new(path)).is_err() {
                // Engine dropped the receiver.
                return;
            }
        }
    }
}
