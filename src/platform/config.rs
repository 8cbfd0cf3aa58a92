// LogTail - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::model::DriverKind;
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for LogTail configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logtail/ or %APPDATA%\LogTail\config\)
    pub config_dir: PathBuf,

    /// Default config.toml location inside `config_dir`.
    pub config_file: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let config_file = config_dir.join(constants::CONFIG_FILE_NAME);
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self {
                config_dir,
                config_file,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                config_file: fallback.join(constants::CONFIG_FILE_NAME),
                config_dir: fallback,
            }
        }
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[tail]` section.
    pub tail: TailSection,
    /// `[output]` section.
    pub output: OutputSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[tail]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct TailSection {
    /// Trailing lines shown per file at start.
    pub initial_lines: Option<usize>,
    /// Keep following after the initial window.
    pub follow: Option<bool>,
    /// "poll" or "notify".
    pub driver: Option<String>,
    /// Poller interval in ms.
    pub poll_interval_ms: Option<u64>,
    /// Notifier quiescence window in ms.
    pub debounce_ms: Option<u64>,
    /// Average line length estimate used by the initial window reader.
    pub avg_line_bytes: Option<u64>,
}

/// `[output]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// "plain" or "json".
    pub format: Option<String>,
    /// Print `==> file <==` headers when the source file changes.
    pub headers: Option<bool>,
    /// Capacity of the in-memory line history.
    pub history_lines: Option<usize>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Tail --
    pub initial_lines: usize,
    pub follow: bool,
    pub driver: DriverKind,
    pub poll_interval_ms: u64,
    pub debounce_ms: u64,
    pub avg_line_bytes: u64,

    // -- Output --
    /// Emit JSON events instead of plain lines.
    pub json_output: bool,
    pub headers: bool,
    pub history_lines: usize,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            initial_lines: constants::DEFAULT_INITIAL_LINES,
            follow: false,
            driver: DriverKind::Poll,
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            debounce_ms: constants::DEFAULT_DEBOUNCE_MS,
            avg_line_bytes: constants::DEFAULT_AVG_LINE_BYTES,
            json_output: false,
            headers: true,
            history_lines: constants::DEFAULT_HISTORY_LINES,
            log_level: None,
            log_file: None,
        }
    }
}

/// Read and parse a config file without validating values.
fn read_raw(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Check `value` against an inclusive range, recording a warning on failure.
fn in_range<T>(
    field: &str,
    value: T,
    min: T,
    max: T,
    default: T,
    warnings: &mut Vec<String>,
) -> Option<T>
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    if value >= min && value <= max {
        Some(value)
    } else {
        let err = ConfigError::ValueOutOfRange {
            field: field.to_string(),
            value: value.to_string(),
            expected: format!("{min}-{max}"),
        };
        warnings.push(format!("{err}. Using default ({default})."));
        None
    }
}

/// Load and validate a config file.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first run).
/// If the file is unreadable or unparseable, returns defaults with a warning;
/// the application still starts but the user is informed.
pub fn load_config(config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let raw = match read_raw(config_path) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");

    let (config, mut value_warnings) = validate(raw);
    warnings.append(&mut value_warnings);

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (config, warnings)
}

/// Validate every field against its named bounds, accumulating all problems.
pub fn validate(raw: RawConfig) -> (AppConfig, Vec<String>) {
    let mut warnings = Vec::new();
    let mut config = AppConfig::default();

    // -- Tail --
    if let Some(n) = raw.tail.initial_lines {
        if let Some(n) = in_range(
            "[tail] initial_lines",
            n,
            0,
            constants::MAX_INITIAL_LINES,
            constants::DEFAULT_INITIAL_LINES,
            &mut warnings,
        ) {
            config.initial_lines = n;
        }
    }

    if let Some(follow) = raw.tail.follow {
        config.follow = follow;
    }

    if let Some(ref driver) = raw.tail.driver {
        match driver.parse::<DriverKind>() {
            Ok(kind) => config.driver = kind,
            Err(e) => warnings.push(format!(
                "[tail] driver: {e}. Using default ({}).",
                AppConfig::default().driver
            )),
        }
    }

    if let Some(ms) = raw.tail.poll_interval_ms {
        if let Some(ms) = in_range(
            "[tail] poll_interval_ms",
            ms,
            constants::MIN_POLL_INTERVAL_MS,
            constants::MAX_POLL_INTERVAL_MS,
            constants::DEFAULT_POLL_INTERVAL_MS,
            &mut warnings,
        ) {
            config.poll_interval_ms = ms;
        }
    }

    if let Some(ms) = raw.tail.debounce_ms {
        if let Some(ms) = in_range(
            "[tail] debounce_ms",
            ms,
            0,
            constants::MAX_DEBOUNCE_MS,
            constants::DEFAULT_DEBOUNCE_MS,
            &mut warnings,
        ) {
            config.debounce_ms = ms;
        }
    }

    if let Some(bytes) = raw.tail.avg_line_bytes {
        if let Some(bytes) = in_range(
            "[tail] avg_line_bytes",
            bytes,
            constants::MIN_AVG_LINE_BYTES,
            constants::MAX_AVG_LINE_BYTES,
            constants::DEFAULT_AVG_LINE_BYTES,
            &mut warnings,
        ) {
            config.avg_line_bytes = bytes;
        }
    }

    // -- Output --
    if let Some(ref format) = raw.output.format {
        match format.to_lowercase().as_str() {
            "plain" => config.json_output = false,
            "json" => config.json_output = true,
            other => warnings.push(format!(
                "[output] format = \"{other}\" is not recognised. \
                 Expected \"plain\" or \"json\". Using default (plain)."
            )),
        }
    }

    if let Some(headers) = raw.output.headers {
        config.headers = headers;
    }

    if let Some(n) = raw.output.history_lines {
        if let Some(n) = in_range(
            "[output] history_lines",
            n,
            1,
            constants::MAX_HISTORY_LINES,
            constants::DEFAULT_HISTORY_LINES,
            &mut warnings,
        ) {
            config.history_lines = n;
        }
    }

    // -- Logging --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: {}. Using default ({}).",
                valid.join(", "),
                constants::DEFAULT_LOG_LEVEL,
            ));
        }
    }

    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(PathBuf::from(file));
        }
    }

    (config, warnings)
}
