// LogTail - app/poller.rs
//
// Poller driver: every interval, stat each watched file and raise a notice
// when its size differs from the stored cursor, when it vanished, or when a
// previously vanished file is back.
//
// Architecture:
//   - `Poller` lives on the engine thread; `run_poll_loop` runs on a
//     background thread.
//   - An `Arc<AtomicBool>` cancel flag stops the thread. The interval sleep
//     is split into CANCEL_CHECK_INTERVAL_MS slices so stop is prompt.
//   - The watched set is shared with the thread so paths can be added and
//     removed without restarting it.
//   - A file that is mid-read is skipped for that tick; missed ticks simply
//     coalesce into one larger delta on the next.

use crate::app::cursor::{lock, CursorProbe, CursorStore};
use crate::app::driver::{ChangeDriver, NoticeSender};
use crate::core::model::ChangeNotice;
use crate::platform::fs::FileSource;
use crate::util::constants::CANCEL_CHECK_INTERVAL_MS;
use crate::util::error::TailError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub struct Poller {
    interval: Duration,
    fs: Arc<dyn FileSource>,
    store: Arc<CursorStore>,
    paths: Arc<Mutex<BTreeSet<PathBuf>>>,
    cancel: Option<Arc<AtomicBool>>,
    thread: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(interval: Duration, fs: Arc<dyn FileSource>, store: Arc<CursorStore>) -> Self {
        Self {
            interval,
            fs,
            store,
            paths: Arc::new(Mutex::new(BTreeSet::new())),
            cancel: None,
            thread: None,
        }
    }

    /// Check every watched path once and return the notices to raise.
    pub fn tick(&self) -> Vec<ChangeNotice> {
        let paths: Vec<PathBuf> = lock(&self.paths).iter().cloned().collect();
        check_paths(self.fs.as_ref(), &self.store, &paths)
    }
}

impl ChangeDriver for Poller {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn start(&mut self, notices: NoticeSender) -> Result<(), TailError> {
        self.stop();

        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);
        let fs = Arc::clone(&self.fs);
        let store = Arc::clone(&self.store);
        let paths = Arc::clone(&self.paths);
        let interval = self.interval;

        let thread = std::thread::Builder::new()
            .name("logtail-poller".to_string())
            .spawn(move || run_poll_loop(interval, fs, store, paths, notices, thread_cancel))
            .map_err(|e| TailError::DriverSetup {
                driver: "poll",
                reason: e.to_string(),
            })?;

        self.cancel = Some(cancel);
        self.thread = Some(thread);
        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "Poller started");
        Ok(())
    }

    fn watch(&mut self, path: &Path) -> Result<(), TailError> {
        lock(&self.paths).insert(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) {
        lock(&self.paths).remove(path);
    }

    fn stop(&mut self) {
        if let Some(flag) = self.cancel.take() {
            flag.store(true, Ordering::SeqCst);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Poller thread panicked");
            }
            tracing::debug!("Poller stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Compare each path's on-disk state with its cursor.
fn check_paths(fs: &dyn FileSource, store: &CursorStore, paths: &[PathBuf]) -> Vec<ChangeNotice> {
    let mut notices = Vec::new();
    for path in paths {
        let probe = store.probe(path);
        if probe == CursorProbe::Busy {
            continue;
        }
        let changed = match (fs.stat(path), probe) {
            (Ok(Some(stat)), CursorProbe::Size(size)) => stat.size != size,
            // Back after vanishing.
            (Ok(Some(_)), CursorProbe::Untracked) => true,
            (Ok(None), CursorProbe::Size(_)) => true,
            (Ok(None), _) => false,
            (Err(e), CursorProbe::Size(_)) => {
                // Let the consumer attempt it and report the error.
                tracing::debug!(file = %path.display(), error = %e, "Poller: stat failed");
                true
            }
            (Err(_), _) => false,
            (Ok(Some(_)), CursorProbe::Busy) => false,
        };
        if changed {
            notices.push(ChangeNotice::new(path.clone()));
        }
    }
    notices
}

fn run_poll_loop(
    interval: Duration,
    fs: Arc<dyn FileSource>,
    store: Arc<CursorStore>,
    paths: Arc<Mutex<BTreeSet<PathBuf>>>,
    notices: NoticeSender,
    cancel: Arc<AtomicBool>,
) {
    loop {
        if !wait_interval(interval, &cancel) {
            return;
        }

        let snapshot: Vec<PathBuf> = lock(&paths).iter().cloned().collect();
        for notice in check_paths(fs.as_ref(), &store, &snapshot) {
            tracing::trace!(file = %notice.path.display(), "Poller: change detected");
            if notices.send(notice).is_err() {
                // Engine dropped the receiver.
                return;
            }
        }
    }
}

/// Sleep for the full `interval`, checking `cancel` every slice.
/// Returns false if cancelled.
fn wait_interval(interval: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + interval;
    let slice = Duration::from_millis(CANCEL_CHECK_INTERVAL_MS);
    loop {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        std::thread::sleep(left.min(slice));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fs::testing::MemoryFs;
    use std::sync::mpsc;

    fn setup() -> (Arc<MemoryFs>, Arc<CursorStore>, Poller, PathBuf) {
        let fs = Arc::new(MemoryFs::new());
        let store = Arc::new(CursorStore::new());
        let poller = Poller::new(Duration::from_millis(10), fs.clone(), Arc::clone(&store));
        (fs, store, poller, PathBuf::from("/logs/app.log"))
    }

    fn track(store: &CursorStore, path: &Path, size: u64) {
        let handle = store.create(path);
        lock(&handle).advance_to(size);
        store.publish(handle, path);
    }

    #[test]
    fn test_tick_reports_only_changed_sizes() {
        let (fs, store, mut poller, path) = setup();
        fs.write(&path, b"a\n");
        track(&store, &path, 2);
        poller.watch(&path).unwrap();

        assert!(poller.tick().is_empty());

        fs.append(&path, b"b\n");
        assert_eq!(poller.tick(), vec![ChangeNotice::new(path.clone())]);
    }

    #[test]
    fn test_tick_reports_removal_and_reappearance() {
        let (fs, store, mut poller, path) = setup();
        fs.write(&path, b"a\n");
        track(&store, &path, 2);
        poller.watch(&path).unwrap();

        fs.remove(&path);
        assert_eq!(poller.tick().len(), 1);

        // Consumer dropped the cursor; nothing more until it returns.
        let handle = store.get(&path).unwrap();
        store.remove_locked(&mut lock(&handle));
        assert!(poller.tick().is_empty());

        fs.write(&path, b"new\n");
        assert_eq!(poller.tick().len(), 1);
    }

    #[test]
    fn test_tick_skips_busy_and_unwatched_files() {
        let (fs, store, mut poller, path) = setup();
        fs.write(&path, b"a\n");
        track(&store, &path, 0);
        poller.watch(&path).unwrap();

        let handle = store.get(&path).unwrap();
        let guard = lock(&handle);
        assert!(poller.tick().is_empty());
        drop(guard);
        assert_eq!(poller.tick().len(), 1);

        poller.unwatch(&path);
        assert!(poller.tick().is_empty());
    }

    #[test]
    fn test_wait_interval_sleeps_full_interval() {
        // 30 ms is not a multiple of the cancel-check slice.
        let cancel = AtomicBool::new(false);
        let started = Instant::now();
        assert!(wait_interval(Duration::from_millis(30), &cancel));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_interval_returns_when_cancelled() {
        let cancel = AtomicBool::new(true);
        let started = Instant::now();
        assert!(!wait_interval(Duration::from_secs(10), &cancel));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_background_loop_sends_notices_and_stops() {
        let (fs, store, mut poller, path) = setup();
        fs.write(&path, b"a\n");
        track(&store, &path, 0);
        poller.watch(&path).unwrap();

        let (tx, rx) = mpsc::channel();
        poller.start(tx).unwrap();
        let notice = rx.recv_timeout(Duration::from_secs(2)).expect("notice");
        assert_eq!(notice.path, path);

        poller.stop();
        poller.stop();
        // Thread joined: the sender it owned is gone once drained.
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
