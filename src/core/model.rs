// LogTail - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies.
//
// These types are the shared vocabulary between the engine and every
// downstream consumer (CLI renderer, history buffer, dashboard transport).

use crate::util::error::TailError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

// =============================================================================
// Events
// =============================================================================

/// One complete line observed in a tracked file.
///
/// Produced exactly once per logical line under normal operation.
/// Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineEvent {
    /// Absolute path of the source file.
    pub file: PathBuf,

    /// Line content without its terminator.
    pub text: String,

    /// Monotonic per-file sequence number, starting at 1.
    pub seq: u64,

    /// When the engine observed the line.
    pub timestamp: DateTime<Utc>,
}

/// Classification of an error event, so consumers can react without
/// inspecting the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// File missing at registration.
    NotFound,
    /// Tracked file disappeared.
    FileVanished,
    /// Permission or I/O failure mid-read.
    ReadError,
    /// Change driver failure.
    Driver,
}

impl From<&TailError> for ErrorKind {
    fn from(e: &TailError) -> Self {
        match e {
            TailError::NotFound { .. } => ErrorKind::NotFound,
            TailError::FileVanished { .. } => ErrorKind::FileVanished,
            TailError::Read { .. } => ErrorKind::ReadError,
            TailError::DriverSetup { .. } | TailError::NotRunning => ErrorKind::Driver,
        }
    }
}

/// Everything the engine reports to its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TailEvent {
    /// A complete line was read.
    Line(LineEvent),

    /// A file became tracked.
    FileAdded { file: PathBuf },

    /// A tracked file vanished or was unregistered.
    FileRemoved { file: PathBuf },

    /// A per-file or driver error.
    Error {
        file: Option<PathBuf>,
        #[serde(rename = "error_kind")]
        kind: ErrorKind,
        message: String,
    },
}

impl TailEvent {
    /// Build an error event from a typed engine error.
    pub fn from_error(e: &TailError) -> Self {
        TailEvent::Error {
            file: e.path().cloned(),
            kind: ErrorKind::from(e),
            message: e.to_string(),
        }
    }

    /// The file this event concerns, if any.
    pub fn file(&self) -> Option<&PathBuf> {
        match self {
            TailEvent::Line(line) => Some(&line.file),
            TailEvent::FileAdded { file } | TailEvent::FileRemoved { file } => Some(file),
            TailEvent::Error { file, .. } => file.as_ref(),
        }
    }
}

// =============================================================================
// Change detection
// =============================================================================

/// Internal signal: "re-examine this file now". Carries identity only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeNotice {
    pub path: PathBuf,
}

impl ChangeNotice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Result of comparing a file's current size with its stored cursor.
///
/// `Grown` and `Truncated` carry the half-open byte range `[start, end)`
/// that must be read next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeChange {
    Unchanged,
    Grown { start: u64, end: u64 },
    Truncated { start: u64, end: u64 },
}

impl SizeChange {
    /// The byte range to read, or `None` when nothing changed.
    pub fn range(&self) -> Option<(u64, u64)> {
        match *self {
            SizeChange::Unchanged => None,
            SizeChange::Grown { start, end } | SizeChange::Truncated { start, end } => {
                Some((start, end))
            }
        }
    }
}

// =============================================================================
// Engine options
// =============================================================================

/// Which change driver feeds the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Fixed-interval size re-check of every tracked file.
    #[default]
    Poll,
    /// OS change notifications, debounced.
    Notify,
}

impl DriverKind {
    pub fn label(&self) -> &'static str {
        match self {
            DriverKind::Poll => "poll",
            DriverKind::Notify => "notify",
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for DriverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poll" => Ok(DriverKind::Poll),
            "notify" => Ok(DriverKind::Notify),
            other => Err(format!(
                "unknown driver \"{other}\", expected \"poll\" or \"notify\""
            )),
        }
    }
}

/// Per-start options: how much history to show and whether to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOptions {
    /// Trailing lines emitted per file at start.
    pub initial_lines: usize,

    /// Keep watching after the initial window.
    pub follow: bool,

    /// On `stop`, emit any non-empty carry-over as a final line.
    pub flush_on_stop: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            initial_lines: crate::util::constants::DEFAULT_INITIAL_LINES,
            follow: true,
            flush_on_stop: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_event_serialises_with_kind_tag() {
        let event = TailEvent::Line(LineEvent {
            file: PathBuf::from("/var/log/app.log"),
            text: "abc".to_string(),
            seq: 1,
            timestamp: DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "line");
        assert_eq!(json["text"], "abc");
        assert_eq!(json["seq"], 1);
    }

    #[test]
    fn test_error_event_from_tail_error() {
        let err = TailError::FileVanished {
            path: PathBuf::from("/tmp/a.log"),
        };
        let event = TailEvent::from_error(&err);
        match &event {
            TailEvent::Error { file, kind, .. } => {
                assert_eq!(file.as_deref(), Some(std::path::Path::new("/tmp/a.log")));
                assert_eq!(*kind, ErrorKind::FileVanished);
            }
            other => panic!("expected error event, got {other:?}"),
        }
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["error_kind"], "file_vanished");
    }

    #[test]
    fn test_driver_kind_parse() {
        assert_eq!("poll".parse::<DriverKind>(), Ok(DriverKind::Poll));
        assert_eq!("NOTIFY".parse::<DriverKind>(), Ok(DriverKind::Notify));
        assert!("inotify".parse::<DriverKind>().is_err());
    }

    #[test]
    fn test_size_change_range() {
        assert_eq!(SizeChange::Unchanged.range(), None);
        assert_eq!(
            SizeChange::Truncated { start: 0, end: 80 }.range(),
            Some((0, 80))
        );
    }
}
