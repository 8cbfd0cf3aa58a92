// LogTail - tests/e2e_tail.rs
//
// End-to-end tests for the tail engine.
//
// These tests exercise the real filesystem, real background threads and,
// for the notify driver, real OS change notifications. No mocks, no stubs.
// Timeouts are generous because CI filesystems and notification backends
// can be slow; the assertions themselves are exact.

use logtail::app::dispatch::ChannelSink;
use logtail::app::engine::{EngineConfig, TailEngine};
use logtail::app::history::HistorySink;
use logtail::core::model::{DriverKind, ErrorKind, StartOptions, TailEvent};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// Helpers
// =============================================================================

const WAIT: Duration = Duration::from_secs(5);

fn engine(driver: DriverKind) -> (TailEngine, Receiver<TailEvent>) {
    let config = EngineConfig {
        driver,
        poll_interval_ms: 20,
        debounce_ms: 20,
        ..EngineConfig::default()
    };
    let engine = TailEngine::new(config);
    let (sink, rx) = ChannelSink::new();
    engine.register_sink(Arc::new(sink));
    (engine, rx)
}

fn follow(initial_lines: usize) -> StartOptions {
    StartOptions {
        initial_lines,
        follow: true,
        flush_on_stop: false,
    }
}

/// Canonical form of a temp file path, as the engine reports it.
fn log_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().canonicalize().unwrap().join(name)
}

fn append(path: &Path, text: &str) {
    let mut f = OpenOptions::new().append(true).open(path).unwrap();
    f.write_all(text.as_bytes()).unwrap();
}

/// Receive events until `n` line events have arrived (or time runs out).
fn recv_lines(rx: &Receiver<TailEvent>, n: usize) -> Vec<String> {
    let deadline = Instant::now() + WAIT;
    let mut lines = Vec::new();
    while lines.len() < n {
        let left = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok(TailEvent::Line(line)) => lines.push(line.text),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    lines
}

/// Receive the next event, whatever it is.
fn recv_event(rx: &Receiver<TailEvent>) -> TailEvent {
    rx.recv_timeout(WAIT).expect("timed out waiting for event")
}

/// Assert that nothing arrives for a while.
fn assert_quiet(rx: &Receiver<TailEvent>, window: Duration) {
    if let Ok(event) = rx.recv_timeout(window) {
        panic!("unexpected event: {event:?}");
    }
}

// =============================================================================
// Scenarios shared by both drivers
// =============================================================================

fn window_then_append(driver: DriverKind) {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir, "app.log");
    fs::write(&path, "a\nb\n").unwrap();

    let (mut engine, rx) = engine(driver);
    engine.start(&[path.clone()], follow(10)).unwrap();

    assert_eq!(recv_event(&rx), TailEvent::FileAdded { file: path.clone() });
    assert_eq!(recv_lines(&rx, 2), vec!["a", "b"]);

    // Let the driver arm before writing.
    std::thread::sleep(Duration::from_millis(100));
    append(&path, "c\n");
    assert_eq!(recv_lines(&rx, 1), vec!["c"]);
    assert_quiet(&rx, Duration::from_millis(200));

    engine.stop();
}

fn truncate_then_write(driver: DriverKind) {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir, "app.log");
    fs::write(&path, "a\nb\n").unwrap();

    let (mut engine, rx) = engine(driver);
    engine.start(&[path.clone()], follow(10)).unwrap();
    assert_eq!(recv_lines(&rx, 2), vec!["a", "b"]);

    std::thread::sleep(Duration::from_millis(100));
    fs::write(&path, "x\n").unwrap();
    assert_eq!(recv_lines(&rx, 1), vec!["x"]);
    assert_quiet(&rx, Duration::from_millis(200));

    engine.stop();
}

fn partial_line_completes(driver: DriverKind) {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir, "app.log");
    fs::write(&path, "").unwrap();

    let (mut engine, rx) = engine(driver);
    engine.start(&[path.clone()], follow(10)).unwrap();
    assert_eq!(recv_event(&rx), TailEvent::FileAdded { file: path.clone() });

    std::thread::sleep(Duration::from_millis(100));
    append(&path, "hel");
    assert_quiet(&rx, Duration::from_millis(300));
    append(&path, "lo\r\n");
    assert_eq!(recv_lines(&rx, 1), vec!["hello"]);

    engine.stop();
}

/// Deleting a tracked file yields exactly one FileRemoved and then silence;
/// re-creating it tracks it again from byte 0.
fn removal_then_recreate(driver: DriverKind) {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir, "app.log");
    fs::write(&path, "a\n").unwrap();

    let (mut engine, rx) = engine(driver);
    engine.start(&[path.clone()], follow(0)).unwrap();
    assert_eq!(recv_event(&rx), TailEvent::FileAdded { file: path.clone() });

    std::thread::sleep(Duration::from_millis(100));
    fs::remove_file(&path).unwrap();
    assert_eq!(recv_event(&rx), TailEvent::FileRemoved { file: path.clone() });
    assert_quiet(&rx, Duration::from_millis(200));
    assert!(engine.list_tracked_files().is_empty());

    fs::write(&path, "again\n").unwrap();
    assert_eq!(recv_event(&rx), TailEvent::FileAdded { file: path.clone() });
    assert_eq!(recv_lines(&rx, 1), vec!["again"]);
    assert_eq!(engine.list_tracked_files(), vec![path]);

    engine.stop();
}

// =============================================================================
// Poll driver
// =============================================================================

#[test]
fn e2e_poll_window_then_append() {
    window_then_append(DriverKind::Poll);
}

#[test]
fn e2e_poll_truncate_then_write() {
    truncate_then_write(DriverKind::Poll);
}

#[test]
fn e2e_poll_partial_line_completes() {
    partial_line_completes(DriverKind::Poll);
}

#[test]
fn e2e_poll_removal_then_recreate() {
    removal_then_recreate(DriverKind::Poll);
}

/// Files are independent: one vanishing does not disturb another.
#[test]
fn e2e_poll_files_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let a = log_path(&dir, "a.log");
    let b = log_path(&dir, "b.log");
    fs::write(&a, "").unwrap();
    fs::write(&b, "").unwrap();

    let (mut engine, rx) = engine(DriverKind::Poll);
    engine.start(&[a.clone(), b.clone()], follow(0)).unwrap();
    assert_eq!(engine.list_tracked_files(), vec![a.clone(), b.clone()]);
    recv_event(&rx);
    recv_event(&rx);

    fs::remove_file(&a).unwrap();
    assert_eq!(recv_event(&rx), TailEvent::FileRemoved { file: a.clone() });

    append(&b, "still here\n");
    match recv_event(&rx) {
        TailEvent::Line(line) => {
            assert_eq!(line.file, b);
            assert_eq!(line.text, "still here");
        }
        other => panic!("expected line, got {other:?}"),
    }

    engine.stop();
}

/// A missing file is reported as NotFound and does not stop the others.
#[test]
fn e2e_missing_file_reported_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let good = log_path(&dir, "good.log");
    let missing = log_path(&dir, "missing.log");
    fs::write(&good, "ok\n").unwrap();

    let (mut engine, rx) = engine(DriverKind::Poll);
    engine
        .start(&[missing.clone(), good.clone()], follow(10))
        .unwrap();

    match recv_event(&rx) {
        TailEvent::Error { file, kind, .. } => {
            assert_eq!(file, Some(missing));
            assert_eq!(kind, ErrorKind::NotFound);
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(recv_event(&rx), TailEvent::FileAdded { file: good.clone() });
    assert_eq!(recv_lines(&rx, 1), vec!["ok"]);
    assert_eq!(engine.list_tracked_files(), vec![good]);

    engine.stop();
}

/// The initial window of a large file holds exactly the last N lines.
#[test]
fn e2e_initial_window_of_large_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir, "big.log");
    let mut content = String::new();
    for i in 0..50_000 {
        content.push_str(&format!("line {i}\n"));
    }
    fs::write(&path, &content).unwrap();

    let (mut engine, rx) = engine(DriverKind::Poll);
    let options = StartOptions {
        initial_lines: 3,
        follow: false,
        flush_on_stop: false,
    };
    engine.start(&[path], options).unwrap();
    engine.stop();

    let lines: Vec<String> = rx
        .try_iter()
        .filter_map(|e| match e {
            TailEvent::Line(line) => Some(line.text),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec!["line 49997", "line 49998", "line 49999"]);
}

/// The history sink keeps the most recent lines across files.
#[test]
fn e2e_history_sink_records_recent_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir, "app.log");
    fs::write(&path, "1\n2\n3\n4\n").unwrap();

    // Registered ahead of the channel so it has seen every line the
    // channel delivers.
    let history = Arc::new(HistorySink::new(3));
    let mut engine = TailEngine::new(EngineConfig {
        poll_interval_ms: 20,
        ..EngineConfig::default()
    });
    engine.register_sink(history.clone());
    let (sink, rx) = ChannelSink::new();
    engine.register_sink(Arc::new(sink));
    engine.start(&[path.clone()], follow(10)).unwrap();
    assert_eq!(recv_lines(&rx, 4).len(), 4);

    std::thread::sleep(Duration::from_millis(100));
    append(&path, "5\n");
    assert_eq!(recv_lines(&rx, 1), vec!["5"]);

    let texts: Vec<String> = history.lines_for(&path).into_iter().map(|l| l.text).collect();
    assert_eq!(texts, vec!["3", "4", "5"]);

    engine.stop();
}

/// Stopping twice is harmless and silences the engine.
#[test]
fn e2e_stop_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = log_path(&dir, "app.log");
    fs::write(&path, "a\n").unwrap();

    let (mut engine, rx) = engine(DriverKind::Poll);
    engine.start(&[path.clone()], follow(10)).unwrap();
    recv_lines(&rx, 1);

    engine.stop();
    engine.stop();
    append(&path, "late\n");
    assert_quiet(&rx, Duration::from_millis(200));
}

// =============================================================================
// Notify driver
// =============================================================================

#[test]
fn e2e_notify_window_then_append() {
    window_then_append(DriverKind::Notify);
}

#[test]
fn e2e_notify_truncate_then_write() {
    truncate_then_write(DriverKind::Notify);
}

#[test]
fn e2e_notify_partial_line_completes() {
    partial_line_completes(DriverKind::Notify);
}

#[test]
fn e2e_notify_removal_then_recreate() {
    removal_then_recreate(DriverKind::Notify);
}
