// LogTail - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and CLI overrides
// 3. Logging initialisation (debug mode support)
// 4. Glob expansion of file arguments
// 5. Running the engine and rendering its events to stdout

use clap::Parser;
use logtail::app::dispatch::ChannelSink;
use logtail::app::engine::{EngineConfig, TailEngine};
use logtail::core::model::{DriverKind, StartOptions, TailEvent};
use logtail::platform::config::{self, AppConfig};
use logtail::util::error::{LogTailError, Result};
use logtail::util::{self, constants};
use regex::Regex;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// LogTail - follow growing log files, surviving rotation and truncation.
#[derive(Parser, Debug)]
#[command(name = "logtail", version, about)]
struct Cli {
    /// Files to tail. Glob patterns are expanded.
    #[arg(required = true, value_name = "FILES")]
    files: Vec<String>,

    /// Number of trailing lines to print per file at startup.
    #[arg(short = 'n', long = "lines", value_name = "N")]
    lines: Option<usize>,

    /// Keep running and print lines as they are appended.
    #[arg(short = 'f', long = "follow")]
    follow: bool,

    /// Change driver: poll or notify.
    #[arg(long = "driver")]
    driver: Option<DriverKind>,

    /// Poll interval for the poll driver.
    #[arg(long = "poll-interval", value_name = "MS")]
    poll_interval: Option<u64>,

    /// Quiescence window for the notify driver (0 disables it).
    #[arg(long = "debounce", value_name = "MS")]
    debounce: Option<u64>,

    /// Print one JSON event per line instead of plain text.
    #[arg(long = "json")]
    json: bool,

    /// Only print lines matching this regular expression.
    #[arg(long = "grep", value_name = "REGEX")]
    grep: Option<Regex>,

    /// Never print `==> file <==` headers.
    #[arg(long = "no-headers")]
    no_headers: bool,

    /// Config file to use instead of the platform default.
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write diagnostics to this file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "LogTail failed");
            eprintln!("logtail: {e}");
            std::process::exit(1);
        }
    }
}

/// Returns the process exit code: 0 if at least one file was tracked.
fn run(cli: &Cli) -> Result<i32> {
    let config_path = match &cli.config {
        Some(path) if !path.exists() => {
            return Err(LogTailError::Io {
                path: path.clone(),
                operation: "read config",
                source: io::Error::new(io::ErrorKind::NotFound, "file does not exist"),
            });
        }
        Some(path) => path.clone(),
        None => config::PlatformPaths::resolve().config_file,
    };
    let (mut app_config, warnings) = config::load_config(&config_path);

    let log_file = cli.log_file.clone().or_else(|| app_config.log_file.clone());
    util::logging::init(cli.debug, app_config.log_level.as_deref(), log_file.as_deref());
    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        config = %config_path.display(),
        "LogTail starting"
    );
    for warning in &warnings {
        tracing::warn!(warning = %warning, "Config warning");
        eprintln!("logtail: {warning}");
    }

    apply_overrides(&mut app_config, cli);

    let files = expand_patterns(&cli.files);
    let multi_file = files.len() > 1;

    let mut engine = TailEngine::new(EngineConfig::from(&app_config));
    let (sink, events) = ChannelSink::new();
    engine.register_sink(Arc::new(sink));

    let options = StartOptions {
        initial_lines: app_config.initial_lines,
        follow: app_config.follow,
        flush_on_stop: !app_config.follow,
    };
    engine.start(&files, options)?;

    let mut printer = Printer::new(
        app_config.json_output,
        app_config.headers && multi_file,
        cli.grep.clone(),
    );
    let any_tracked = !engine.list_tracked_files().is_empty();

    if !app_config.follow || !any_tracked {
        engine.stop();
        let mut out = io::stdout().lock();
        for event in events.try_iter() {
            if printer.print(&mut out, &event).is_err() {
                break;
            }
        }
        let _ = out.flush();
        return Ok(if any_tracked { 0 } else { 1 });
    }

    // Follow mode: runs until interrupted or stdout closes.
    for event in events {
        let mut out = io::stdout().lock();
        let written = printer.print(&mut out, &event).and_then(|()| out.flush());
        if let Err(e) = written {
            tracing::debug!(error = %e, "stdout closed; exiting");
            break;
        }
    }
    engine.stop();
    Ok(0)
}

/// CLI flags win over config.toml. Out-of-range values are clamped.
fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(n) = cli.lines {
        config.initial_lines = n.min(constants::MAX_INITIAL_LINES);
    }
    if cli.follow {
        config.follow = true;
    }
    if let Some(driver) = cli.driver {
        config.driver = driver;
    }
    if let Some(ms) = cli.poll_interval {
        config.poll_interval_ms =
            ms.clamp(constants::MIN_POLL_INTERVAL_MS, constants::MAX_POLL_INTERVAL_MS);
    }
    if let Some(ms) = cli.debounce {
        config.debounce_ms = ms.min(constants::MAX_DEBOUNCE_MS);
    }
    if cli.json {
        config.json_output = true;
    }
    if cli.no_headers {
        config.headers = false;
    }
}

/// Expand glob patterns; plain paths pass through unchanged.
///
/// A pattern that matches nothing is kept literally so the engine reports
/// it as not found.
fn expand_patterns(patterns: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            files.push(PathBuf::from(pattern));
            continue;
        }
        match glob::glob(pattern) {
            Ok(paths) => {
                let mut matched: Vec<PathBuf> = paths
                    .filter_map(|entry| match entry {
                        Ok(path) if path.is_file() => Some(path),
                        Ok(_) => None,
                        Err(e) => {
                            tracing::warn!(error = %e, "Glob entry unreadable");
                            None
                        }
                    })
                    .collect();
                if matched.is_empty() {
                    files.push(PathBuf::from(pattern));
                } else {
                    matched.sort();
                    files.append(&mut matched);
                }
            }
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "Invalid glob pattern; using literally");
                files.push(PathBuf::from(pattern));
            }
        }
    }
    files
}

/// Renders engine events to stdout; errors and lifecycle notes go to stderr.
struct Printer {
    json: bool,
    headers: bool,
    grep: Option<Regex>,
    /// File of the last printed line, for header switching.
    last_file: Option<PathBuf>,
}

impl Printer {
    fn new(json: bool, headers: bool, grep: Option<Regex>) -> Self {
        Self {
            json,
            headers,
            grep,
            last_file: None,
        }
    }

    fn print(&mut self, out: &mut impl Write, event: &TailEvent) -> io::Result<()> {
        if let TailEvent::Line(line) = event {
            if let Some(re) = &self.grep {
                if !re.is_match(&line.text) {
                    return Ok(());
                }
            }
        }

        if self.json {
            let json = serde_json::to_string(event).map_err(io::Error::other)?;
            return writeln!(out, "{json}");
        }

        match event {
            TailEvent::Line(line) => {
                if self.headers && self.last_file.as_deref() != Some(line.file.as_path()) {
                    if self.last_file.is_some() {
                        writeln!(out)?;
                    }
                    writeln!(out, "==> {} <==", line.file.display())?;
                    self.last_file = Some(line.file.clone());
                }
                writeln!(out, "{}", line.text)
            }
            TailEvent::FileRemoved { file } => {
                eprintln!("logtail: '{}' has disappeared", file.display());
                Ok(())
            }
            TailEvent::Error { message, .. } => {
                eprintln!("logtail: {message}");
                Ok(())
            }
            TailEvent::FileAdded { .. } => Ok(()),
        }
    }
}
