// LogTail - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Every configurable value has a default plus a min/max pair that
// `platform::config` validates against.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogTail";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogTail";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Initial window
// =============================================================================

/// Number of trailing lines emitted per file when tailing starts.
pub const DEFAULT_INITIAL_LINES: usize = 10;

/// Hard upper bound on the initial line count.
pub const MAX_INITIAL_LINES: usize = 100_000;

/// Heuristic average line length used to size the first window read.
pub const DEFAULT_AVG_LINE_BYTES: u64 = 200;

/// Minimum configurable average line estimate.
pub const MIN_AVG_LINE_BYTES: u64 = 16;

/// Maximum configurable average line estimate.
pub const MAX_AVG_LINE_BYTES: u64 = 64 * 1024;

/// Largest suffix the window reader will ever load while growing its
/// estimate. Files with fewer than `n` lines in this many trailing bytes
/// simply yield fewer lines.
pub const MAX_INITIAL_WINDOW_BYTES: u64 = 8 * 1024 * 1024; // 8 MiB

// =============================================================================
// Delta reads
// =============================================================================

/// Chunk size for streaming a delta range through the line splitter.
pub const READ_CHUNK_SIZE: u64 = 64 * 1024; // 64 KiB

/// Maximum accumulated size of the carry-over buffer for a single file.
///
/// A file that never writes a newline (binary content, a runaway single
/// line) would otherwise grow the buffer without bound. Past this size the
/// fragment is discarded, the rest of that line up to its newline is skipped,
/// and a warning is logged.
pub const MAX_CARRY_OVER_BYTES: usize = 2 * 1024 * 1024; // 2 MiB

// =============================================================================
// Change drivers
// =============================================================================

/// Default poll interval for the Poller driver (ms).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Minimum user-configurable poll interval (ms).
pub const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Maximum user-configurable poll interval (ms).
pub const MAX_POLL_INTERVAL_MS: u64 = 10_000; // 10 s

/// Default quiescence window for the Notifier driver (ms). 0 disables it.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Maximum user-configurable debounce window (ms).
pub const MAX_DEBOUNCE_MS: u64 = 5_000;

/// Longest a continuously written file waits for its debounced notice (ms).
pub const DEBOUNCE_MAX_WAIT_MS: u64 = 1_000;

/// How often background threads wake to check their cancel flag (ms).
pub const CANCEL_CHECK_INTERVAL_MS: u64 = 20;

// =============================================================================
// Output
// =============================================================================

/// Default capacity of the in-memory line history ring buffer.
pub const DEFAULT_HISTORY_LINES: usize = 1_000;

/// Hard upper bound on the history ring buffer.
pub const MAX_HISTORY_LINES: usize = 1_000_000;

// =============================================================================
// Logging
// =============================================================================

/// Default log level. stderr is shared with error reports, so keep it quiet.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Maximum length of a log line included in debug output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
