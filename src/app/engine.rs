// LogTail - app/engine.rs
//
// Tail engine: owns the cursor store, the dispatcher, the change driver and
// the worker thread that turns driver notices into delta reads.
//
// Lifecycle:
//   start(files, options)
//     1. build and start the driver (follow mode only); failure aborts with
//        nothing registered
//     2. per file: resolve identity, watch, read the initial window, emit
//        FileAdded followed by the window lines
//     3. spawn the worker (follow mode only)
//   stop()
//     driver first (no new notices), then the worker (in-flight read
//     finishes), then optional carry-over flush, then all state is dropped.
//
// All state belongs to the engine instance; two engines never share cursors.

use crate::app::cursor::{lock, CursorStore};
use crate::app::delta::{emit_lines, DeltaReader, Outcome};
use crate::app::dispatch::{Dispatcher, EventSink};
use crate::app::driver::ChangeDriver;
use crate::app::notifier::Notifier;
use crate::app::poller::Poller;
use crate::app::window::read_last_lines;
use crate::core::model::{ChangeNotice, DriverKind, StartOptions, TailEvent};
use crate::platform::config::AppConfig;
use crate::platform::fs::{resolve_path, FileSource, LocalFs};
use crate::util::constants::{
    CANCEL_CHECK_INTERVAL_MS, DEFAULT_AVG_LINE_BYTES, DEFAULT_DEBOUNCE_MS,
    DEFAULT_POLL_INTERVAL_MS,
};
use crate::util::error::TailError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Engine tuning, usually derived from [`AppConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub driver: DriverKind,
    pub poll_interval_ms: u64,
    pub debounce_ms: u64,
    /// Line length estimate for sizing the initial window.
    pub avg_line_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Poll,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            avg_line_bytes: DEFAULT_AVG_LINE_BYTES,
        }
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            driver: config.driver,
            poll_interval_ms: config.poll_interval_ms,
            debounce_ms: config.debounce_ms,
            avg_line_bytes: config.avg_line_bytes,
        }
    }
}

/// State shared between the engine and its worker thread.
struct Shared {
    fs: Arc<dyn FileSource>,
    store: Arc<CursorStore>,
    dispatcher: Arc<Dispatcher>,
    reader: DeltaReader,
    /// Paths the caller asked to follow. A vanished file stays here so it can
    /// be picked up again when it re-appears.
    watched: Mutex<BTreeSet<PathBuf>>,
    avg_line_bytes: u64,
}

impl Shared {
    fn is_watched(&self, path: &Path) -> bool {
        lock(&self.watched).contains(path)
    }

    /// Register `path` at its current end, emitting the last `n` lines.
    fn register_window(&self, path: &Path, n: usize) -> Result<(), TailError> {
        let handle = self.store.create(path);
        let mut file = lock(&handle);
        self.store.publish(Arc::clone(&handle), path);

        let window = match read_last_lines(self.fs.as_ref(), path, n, self.avg_line_bytes) {
            Ok(window) => window,
            Err(e) => {
                self.store.remove_locked(&mut file);
                return Err(e);
            }
        };

        file.advance_to(window.size);
        let dropped = file.set_carry_over(window.carry_over);
        if dropped > 0 {
            tracing::warn!(
                file = %path.display(),
                bytes = dropped,
                "Discarded oversized unterminated line"
            );
        }
        tracing::info!(
            file = %path.display(),
            size = window.size,
            lines = window.lines.len(),
            "Tracking file"
        );
        self.dispatcher.dispatch(TailEvent::FileAdded {
            file: path.to_path_buf(),
        });
        emit_lines(&self.dispatcher, &mut file, window.lines);
        Ok(())
    }

    /// Re-register a watched file that came back after vanishing. Its whole
    /// content is new, so the cursor starts at 0 and the delta read does the
    /// rest.
    fn register_reappeared(&self, path: &Path) {
        match self.fs.stat(path) {
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(e) => {
                tracing::debug!(file = %path.display(), error = %e, "Re-appearance check failed");
                return;
            }
        }

        {
            let handle = self.store.create(path);
            let mut file = lock(&handle);
            self.store.publish(Arc::clone(&handle), path);
            // remove_file may have run since the notice was raised.
            if !self.is_watched(path) {
                self.store.remove_locked(&mut file);
                return;
            }
            tracing::info!(file = %path.display(), "Tracked file re-appeared");
            self.dispatcher.dispatch(TailEvent::FileAdded {
                file: path.to_path_buf(),
            });
        }

        self.reader.process(path);
    }

    fn handle_notice(&self, notice: &ChangeNotice) {
        let outcome = self.reader.process(&notice.path);
        tracing::trace!(file = %notice.path.display(), ?outcome, "Notice processed");
        if outcome == Outcome::Untracked && self.is_watched(&notice.path) {
            self.register_reappeared(&notice.path);
        }
    }

    /// Emit every non-empty carry-over as a final line.
    fn flush_all(&self) {
        for handle in self.store.handles() {
            let mut file = lock(&handle);
            if !file.is_active() {
                continue;
            }
            if let Some(text) = file.flush() {
                emit_lines(&self.dispatcher, &mut file, vec![text]);
            }
        }
    }
}

/// Pieces that only exist between `start` and `stop`.
struct Running {
    options: StartOptions,
    driver: Option<Box<dyn ChangeDriver>>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

/// Builds the change driver for each follow-mode `start`.
pub type DriverFactory = Box<dyn Fn() -> Box<dyn ChangeDriver> + Send + Sync>;

/// Incremental tail engine for a set of files.
pub struct TailEngine {
    config: EngineConfig,
    shared: Arc<Shared>,
    running: Option<Running>,
    /// Replaces the driver chosen by `config.driver`.
    driver_factory: Option<DriverFactory>,
}

impl TailEngine {
    /// Engine over the local filesystem.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_source(config, Arc::new(LocalFs))
    }

    /// Engine over any [`FileSource`].
    pub fn with_source(config: EngineConfig, fs: Arc<dyn FileSource>) -> Self {
        let store = Arc::new(CursorStore::new());
        let dispatcher = Arc::new(Dispatcher::new());
        let reader = DeltaReader::new(Arc::clone(&fs), Arc::clone(&store), Arc::clone(&dispatcher));
        let shared = Arc::new(Shared {
            fs,
            store,
            dispatcher,
            reader,
            watched: Mutex::new(BTreeSet::new()),
            avg_line_bytes: config.avg_line_bytes,
        });
        Self {
            config,
            shared,
            running: None,
            driver_factory: None,
        }
    }

    /// Use a custom change driver instead of the built-in poller/notifier.
    pub fn with_driver_factory(mut self, factory: DriverFactory) -> Self {
        self.driver_factory = Some(factory);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Add a consumer. Sinks registered while running see subsequent events.
    pub fn register_sink(&self, sink: Arc<dyn EventSink>) {
        self.shared.dispatcher.register(sink);
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Register `files`, emit their initial windows and, in follow mode,
    /// begin watching them.
    ///
    /// A running engine is stopped first. Per-file failures are reported as
    /// `Error` events and do not fail the call; only a driver that cannot be
    /// set up does, in which case nothing is left running.
    pub fn start(&mut self, files: &[PathBuf], options: StartOptions) -> Result<(), TailError> {
        self.stop();

        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<ChangeNotice>();
        let driver = if options.follow {
            let mut driver = self.build_driver();
            driver.start(tx)?;
            tracing::info!(driver = driver.name(), "Change driver started");
            Some(driver)
        } else {
            None
        };

        let mut running = Running {
            options,
            driver,
            cancel: Arc::clone(&cancel),
            worker: None,
        };

        for path in files {
            register_path(&self.shared, &mut running, path);
        }

        if options.follow {
            let shared = Arc::clone(&self.shared);
            let spawned = std::thread::Builder::new()
                .name("logtail-worker".to_string())
                .spawn(move || run_worker(shared, rx, cancel));
            match spawned {
                Ok(worker) => running.worker = Some(worker),
                Err(e) => {
                    self.running = Some(running);
                    self.stop();
                    return Err(TailError::DriverSetup {
                        driver: "worker",
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            requested = files.len(),
            tracked = self.shared.store.len(),
            follow = options.follow,
            "Tail started"
        );
        self.running = Some(running);
        Ok(())
    }

    /// Stop watching and drop all per-file state. Idempotent.
    pub fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };

        if let Some(mut driver) = running.driver.take() {
            driver.stop();
        }
        running.cancel.store(true, Ordering::SeqCst);
        if let Some(worker) = running.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Tail worker panicked");
            }
        }

        if running.options.flush_on_stop {
            self.shared.flush_all();
        }

        self.shared.store.clear();
        lock(&self.shared.watched).clear();
        tracing::info!("Tail stopped");
    }

    /// Start following another file on a running engine.
    ///
    /// Returns `Ok(false)` if the file is already followed.
    pub fn add_file(&mut self, path: &Path) -> Result<bool, TailError> {
        let Some(running) = self.running.as_mut() else {
            return Err(TailError::NotRunning);
        };
        let resolved = resolve_path(path).map_err(|e| TailError::from_io(path.to_path_buf(), e))?;
        if self.shared.is_watched(&resolved) || self.shared.store.contains(&resolved) {
            return Ok(false);
        }
        try_register(&self.shared, running, &resolved)?;
        Ok(true)
    }

    /// Stop following a file. Emits `FileRemoved` if it was tracked.
    ///
    /// Returns `false` if the path was not followed.
    pub fn remove_file(&mut self, path: &Path) -> bool {
        let resolved = resolve_path(path).unwrap_or_else(|_| path.to_path_buf());
        let was_watched = lock(&self.shared.watched).remove(&resolved);
        if let Some(driver) = self.running.as_mut().and_then(|r| r.driver.as_mut()) {
            driver.unwatch(&resolved);
        }

        let removed = match self.shared.store.get(&resolved) {
            Some(handle) => {
                let mut file = lock(&handle);
                self.shared.store.remove_locked(&mut file)
            }
            None => false,
        };
        if removed {
            tracing::info!(file = %resolved.display(), "Stopped tracking file");
            self.shared.dispatcher.dispatch(TailEvent::FileRemoved { file: resolved });
        }
        was_watched || removed
    }

    /// Files currently holding a cursor, sorted.
    pub fn list_tracked_files(&self) -> Vec<PathBuf> {
        self.shared.store.paths()
    }

    fn build_driver(&self) -> Box<dyn ChangeDriver> {
        if let Some(factory) = &self.driver_factory {
            return factory();
        }
        match self.config.driver {
            DriverKind::Poll => Box::new(Poller::new(
                Duration::from_millis(self.config.poll_interval_ms),
                Arc::clone(&self.shared.fs),
                Arc::clone(&self.shared.store),
            )),
            DriverKind::Notify => {
                Box::new(Notifier::new(Duration::from_millis(self.config.debounce_ms)))
            }
        }
    }
}

impl Drop for TailEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Register one start-time path, reporting any failure as an event.
fn register_path(shared: &Shared, running: &mut Running, path: &Path) {
    let resolved = match resolve_path(path) {
        Ok(p) => p,
        Err(e) => {
            report(shared, &TailError::from_io(path.to_path_buf(), e));
            return;
        }
    };
    if shared.is_watched(&resolved) || shared.store.contains(&resolved) {
        tracing::debug!(file = %resolved.display(), "Duplicate path ignored");
        return;
    }
    if let Err(e) = try_register(shared, running, &resolved) {
        report(shared, &e);
    }
}

/// Watch, then read the initial window. Watching first means a write that
/// lands during the window read still raises a notice.
fn try_register(shared: &Shared, running: &mut Running, path: &Path) -> Result<(), TailError> {
    match shared.fs.stat(path) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Err(TailError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(TailError::from_io(path.to_path_buf(), e)),
    }

    if let Some(driver) = running.driver.as_mut() {
        driver.watch(path)?;
    }
    if running.options.follow {
        lock(&shared.watched).insert(path.to_path_buf());
    }

    if let Err(e) = shared.register_window(path, running.options.initial_lines) {
        lock(&shared.watched).remove(path);
        if let Some(driver) = running.driver.as_mut() {
            driver.unwatch(path);
        }
        return Err(e);
    }
    Ok(())
}

fn report(shared: &Shared, e: &TailError) {
    tracing::warn!(error = %e, "Could not register file");
    shared.dispatcher.dispatch(TailEvent::from_error(e));
}

fn run_worker(shared: Arc<Shared>, notices: mpsc::Receiver<ChangeNotice>, cancel: Arc<AtomicBool>) {
    let tick = Duration::from_millis(CANCEL_CHECK_INTERVAL_MS);
    loop {
        if cancel.load(Ordering::SeqCst) {
            return;
        }
        match notices.recv_timeout(tick) {
            Ok(notice) => shared.handle_notice(&notice),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::driver::NoticeSender;
    use crate::core::model::{ErrorKind, LineEvent};
    use crate::platform::fs::testing::MemoryFs;

    struct Harness {
        fs: Arc<MemoryFs>,
        engine: TailEngine,
        events: Arc<Mutex<Vec<TailEvent>>>,
    }

    impl Harness {
        fn new() -> Self {
            let fs = Arc::new(MemoryFs::new());
            let config = EngineConfig {
                poll_interval_ms: 10,
                ..EngineConfig::default()
            };
            let engine = TailEngine::with_source(config, fs.clone());
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink_events = Arc::clone(&events);
            engine.register_sink(Arc::new(move |e: &TailEvent| {
                lock(&sink_events).push(e.clone());
            }));
            Self { fs, engine, events }
        }

        fn take(&self) -> Vec<TailEvent> {
            std::mem::take(&mut *lock(&self.events))
        }

        fn lines(&self) -> Vec<String> {
            self.take()
                .into_iter()
                .filter_map(|e| match e {
                    TailEvent::Line(LineEvent { text, .. }) => Some(text),
                    _ => None,
                })
                .collect()
        }

        /// Wait until the sink has collected `n` events.
        fn wait_for(&self, n: usize) -> Vec<TailEvent> {
            for _ in 0..200 {
                if lock(&self.events).len() >= n {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            self.take()
        }
    }

    fn once() -> StartOptions {
        StartOptions {
            initial_lines: 10,
            follow: false,
            flush_on_stop: false,
        }
    }

    fn follow() -> StartOptions {
        StartOptions {
            follow: true,
            ..once()
        }
    }

    /// Driver whose setup always fails.
    struct BrokenDriver;

    impl ChangeDriver for BrokenDriver {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn start(&mut self, _notices: NoticeSender) -> Result<(), TailError> {
            Err(TailError::DriverSetup {
                driver: "broken",
                reason: "no watch backend".to_string(),
            })
        }

        fn watch(&mut self, _path: &Path) -> Result<(), TailError> {
            panic!("watch called on a driver that failed to start");
        }

        fn unwatch(&mut self, _path: &Path) {}

        fn stop(&mut self) {}
    }

    #[test]
    fn test_driver_setup_failure_leaves_nothing_behind() {
        let Harness { fs, engine, events } = Harness::new();
        let factory: DriverFactory = Box::new(|| Box::new(BrokenDriver) as Box<dyn ChangeDriver>);
        let mut engine = engine.with_driver_factory(factory);
        let path = PathBuf::from("/logs/app.log");
        fs.write(&path, b"a\nb\n");

        let err = engine.start(&[path.clone()], follow()).unwrap_err();
        assert!(matches!(err, TailError::DriverSetup { driver: "broken", .. }));
        assert!(!engine.is_running());
        assert!(engine.list_tracked_files().is_empty());
        assert!(lock(&events).is_empty());
        assert!(matches!(engine.add_file(&path), Err(TailError::NotRunning)));

        // Without follow no driver is needed, so start succeeds.
        engine.start(&[path.clone()], once()).unwrap();
        assert_eq!(engine.list_tracked_files(), vec![path]);
    }

    #[test]
    fn test_start_emits_file_added_then_window() {
        let mut h = Harness::new();
        let path = PathBuf::from("/logs/app.log");
        h.fs.write(&path, b"a\nb\n");

        h.engine.start(&[path.clone()], once()).unwrap();
        let events = h.take();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], TailEvent::FileAdded { file: path.clone() });
        assert!(matches!(&events[1], TailEvent::Line(l) if l.text == "a" && l.seq == 1));
        assert!(matches!(&events[2], TailEvent::Line(l) if l.text == "b" && l.seq == 2));
        assert_eq!(h.engine.list_tracked_files(), vec![path]);
    }

    #[test]
    fn test_missing_file_reported_and_others_continue() {
        let mut h = Harness::new();
        let good = PathBuf::from("/logs/good.log");
        let missing = PathBuf::from("/logs/missing.log");
        h.fs.write(&good, b"ok\n");

        h.engine.start(&[missing.clone(), good.clone()], once()).unwrap();
        let events = h.take();
        assert!(matches!(
            &events[0],
            TailEvent::Error { file: Some(f), kind: ErrorKind::NotFound, .. } if *f == missing
        ));
        assert_eq!(h.engine.list_tracked_files(), vec![good]);
    }

    #[test]
    fn test_duplicate_paths_registered_once() {
        let mut h = Harness::new();
        let path = PathBuf::from("/logs/app.log");
        h.fs.write(&path, b"a\n");
        h.engine.start(&[path.clone(), path.clone()], once()).unwrap();
        assert_eq!(h.lines(), vec!["a"]);
    }

    #[test]
    fn test_follow_append_emits_new_line() {
        let mut h = Harness::new();
        let path = PathBuf::from("/logs/app.log");
        h.fs.write(&path, b"a\nb\n");
        h.engine.start(&[path.clone()], follow()).unwrap();
        assert_eq!(h.lines(), vec!["a", "b"]);

        h.fs.append(&path, b"c\n");
        let events = h.wait_for(1);
        assert!(matches!(&events[..], [TailEvent::Line(l)] if l.text == "c" && l.seq == 3));
        h.engine.stop();
    }

    #[test]
    fn test_truncate_and_rewrite_emits_only_new_content() {
        let mut h = Harness::new();
        let path = PathBuf::from("/logs/app.log");
        h.fs.write(&path, b"a\nb\n");
        h.engine.start(&[path.clone()], follow()).unwrap();
        h.take();

        h.fs.write(&path, b"x\n");
        let events = h.wait_for(1);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TailEvent::Line(l) if l.text == "x"));
        h.engine.stop();
    }

    #[test]
    fn test_removal_then_reappearance() {
        let mut h = Harness::new();
        let path = PathBuf::from("/logs/app.log");
        h.fs.write(&path, b"a\n");
        h.engine.start(&[path.clone()], follow()).unwrap();
        h.take();

        h.fs.remove(&path);
        let events = h.wait_for(1);
        assert_eq!(events, vec![TailEvent::FileRemoved { file: path.clone() }]);
        std::thread::sleep(Duration::from_millis(50));
        assert!(h.take().is_empty());
        assert!(h.engine.list_tracked_files().is_empty());

        h.fs.write(&path, b"fresh\n");
        let events = h.wait_for(2);
        assert_eq!(events[0], TailEvent::FileAdded { file: path.clone() });
        // Numbering continues from the first registration.
        assert!(matches!(&events[1], TailEvent::Line(l) if l.text == "fresh" && l.seq == 2));
        h.engine.stop();
    }

    #[test]
    fn test_add_and_remove_file_while_running() {
        let mut h = Harness::new();
        let a = PathBuf::from("/logs/a.log");
        let b = PathBuf::from("/logs/b.log");
        h.fs.write(&a, b"a1\n");
        h.fs.write(&b, b"b1\n");

        assert!(matches!(h.engine.add_file(&b), Err(TailError::NotRunning)));

        h.engine.start(&[a.clone()], follow()).unwrap();
        assert!(h.engine.add_file(&b).unwrap());
        assert!(!h.engine.add_file(&b).unwrap());
        assert_eq!(h.engine.list_tracked_files(), vec![a.clone(), b.clone()]);
        h.take();

        assert!(h.engine.remove_file(&a));
        assert_eq!(h.take(), vec![TailEvent::FileRemoved { file: a.clone() }]);
        assert!(!h.engine.remove_file(&a));

        h.fs.append(&a, b"a2\n");
        h.fs.append(&b, b"b2\n");
        let events = h.wait_for(1);
        assert!(matches!(&events[..], [TailEvent::Line(l)] if l.file == b && l.text == "b2"));
        h.engine.stop();
    }

    #[test]
    fn test_stop_is_idempotent_and_releases_state() {
        let mut h = Harness::new();
        let path = PathBuf::from("/logs/app.log");
        h.fs.write(&path, b"a\n");
        h.engine.start(&[path.clone()], follow()).unwrap();
        assert!(h.engine.is_running());

        h.engine.stop();
        h.engine.stop();
        assert!(!h.engine.is_running());
        assert!(h.engine.list_tracked_files().is_empty());
        h.take();

        h.fs.append(&path, b"late\n");
        std::thread::sleep(Duration::from_millis(50));
        assert!(h.take().is_empty());
    }

    #[test]
    fn test_flush_on_stop_emits_carry_over() {
        let mut h = Harness::new();
        let path = PathBuf::from("/logs/app.log");
        h.fs.write(&path, b"a\npartial");
        let options = StartOptions {
            flush_on_stop: true,
            ..once()
        };
        h.engine.start(&[path], options).unwrap();
        assert_eq!(h.lines(), vec!["a"]);
        h.engine.stop();
        assert_eq!(h.lines(), vec!["partial"]);
    }
}
