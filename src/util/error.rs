// LogTail - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation; every variant that wraps a lower-level
// failure exposes it through `source()` for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogTail operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogTailError {
    /// Tail engine failure (registration, reads, driver setup).
    Tail(TailError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for LogTailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tail(e) => write!(f, "Tail error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for LogTailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tail(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Tail errors
// ---------------------------------------------------------------------------

/// Errors raised by the tail engine.
///
/// `NotFound`, `FileVanished` and `Read` are per-file and never affect other
/// tracked files. `DriverSetup` is engine-fatal and aborts `start`.
#[derive(Debug)]
pub enum TailError {
    /// The file did not exist when it was registered.
    NotFound { path: PathBuf },

    /// A tracked file disappeared between observations.
    FileVanished { path: PathBuf },

    /// Permission or I/O failure while reading a tracked file.
    Read { path: PathBuf, source: io::Error },

    /// The change driver could not be set up.
    DriverSetup {
        driver: &'static str,
        reason: String,
    },

    /// Operation requires a running engine.
    NotRunning,
}

impl TailError {
    /// Classify an I/O failure observed on a tracked file.
    ///
    /// A missing file means the file vanished; anything else is a
    /// recoverable read error.
    pub fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::FileVanished { path }
        } else {
            Self::Read { path, source }
        }
    }

    /// The file this error refers to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::NotFound { path } | Self::FileVanished { path } | Self::Read { path, .. } => {
                Some(path)
            }
            Self::DriverSetup { .. } | Self::NotRunning => None,
        }
    }
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { path } => {
                write!(f, "'{}' does not exist", path.display())
            }
            Self::FileVanished { path } => {
                write!(f, "'{}' was removed while being tailed", path.display())
            }
            Self::Read { path, source } => {
                write!(f, "Read error on '{}': {source}", path.display())
            }
            Self::DriverSetup { driver, reason } => {
                write!(f, "Failed to start {driver} driver: {reason}")
            }
            Self::NotRunning => write!(f, "Tail engine is not running"),
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<notify::Error> for TailError {
    fn from(e: notify::Error) -> Self {
        Self::DriverSetup {
            driver: "notify",
            reason: e.to_string(),
        }
    }
}

impl From<TailError> for LogTailError {
    fn from(e: TailError) -> Self {
        Self::Tail(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for LogTailError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for LogTail results.
pub type Result<T> = std::result::Result<T, LogTailError>;
