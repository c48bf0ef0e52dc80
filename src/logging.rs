//! Logging System
//!
//! The Logger capability handed to initializers, UIs and the command body, and
//! the default console logger built on `tracing`. The console logger owns its
//! own subscriber (it is never installed globally) with a reloadable level and
//! a swappable output, so both can change at runtime.

mod format;

use crate::config::AppConfig;
use anyhow::{anyhow, Context};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
pub use tracing::level_filters::LevelFilter;
use tracing::{Dispatch, Level};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{fmt, reload, Layer, Registry};

pub use format::ConsoleFormat;

/// Target used for events emitted through a [`Logger`].
pub const LOG_TARGET: &str = "clio";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Verbosity count; when non-zero it overrides `level` (1=info, 2=debug, 3+=trace)
    #[serde(default)]
    pub verbosity: u8,

    /// Suppress all log output
    #[serde(default)]
    pub quiet: bool,

    /// Output format: text, json
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stderr, stdout, file, discard
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path (required when output is "file")
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format on a terminal only)
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            verbosity: 0,
            quiet: false,
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
        }
    }
}

impl LoggingConfig {
    /// Level after applying `quiet` and `verbosity`.
    pub fn effective_level(&self) -> anyhow::Result<LevelFilter> {
        if self.quiet {
            return Ok(LevelFilter::OFF);
        }
        match self.verbosity {
            0 => self
                .level
                .parse::<LevelFilter>()
                .map_err(|_| anyhow!("Invalid log level: {}", self.level)),
            1 => Ok(LevelFilter::INFO),
            2 => Ok(LevelFilter::DEBUG),
            _ => Ok(LevelFilter::TRACE),
        }
    }

    fn open_output(&self) -> anyhow::Result<(Box<dyn Write + Send>, bool)> {
        match self.output.as_str() {
            "stderr" => Ok((Box::new(std::io::stderr()), std::io::stderr().is_terminal())),
            "stdout" => Ok((Box::new(std::io::stdout()), std::io::stdout().is_terminal())),
            "discard" => Ok((Box::new(std::io::sink()), false)),
            "file" => {
                let path = self
                    .file
                    .as_ref()
                    .ok_or_else(|| anyhow!("Log output is 'file' but no log file is set"))?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create log directory {}", parent.display())
                    })?;
                }
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file {}", path.display()))?;
                Ok((Box::new(file), false))
            }
            other => Err(anyhow!(
                "Invalid log output: {} (must be 'stderr', 'stdout', 'file', or 'discard')",
                other
            )),
        }
    }
}

/// Leveled logging capability shared across the run. Must be safe to call
/// from any thread.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn error(&self, message: &str) {
        self.log(Level::ERROR, message)
    }

    fn warn(&self, message: &str) {
        self.log(Level::WARN, message)
    }

    fn info(&self, message: &str) {
        self.log(Level::INFO, message)
    }

    fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message)
    }

    fn trace(&self, message: &str) {
        self.log(Level::TRACE, message)
    }

    /// Runtime control, if the logger supports it.
    fn controller(&self) -> Option<&dyn Controller> {
        None
    }

    /// Dispatch that framework `tracing` diagnostics are routed through while
    /// this logger owns the run. `None` leaves them on the current default.
    fn dispatch(&self) -> Option<&Dispatch> {
        None
    }
}

/// Runtime level and output changes.
pub trait Controller: Send + Sync {
    fn set_level(&self, level: LevelFilter) -> anyhow::Result<()>;

    fn set_output(&self, output: Box<dyn Write + Send>);
}

/// Writer whose target can be swapped while loggers hold clones of it.
#[derive(Clone)]
pub struct SharedWriter(Arc<Mutex<Box<dyn Write + Send>>>);

impl SharedWriter {
    pub fn new(inner: Box<dyn Write + Send>) -> Self {
        Self(Arc::new(Mutex::new(inner)))
    }

    pub fn replace(&self, inner: Box<dyn Write + Send>) {
        let mut guard = self.0.lock();
        let _ = guard.flush();
        *guard = inner;
    }
}

pub struct SharedWriterGuard<'a>(MutexGuard<'a, Box<dyn Write + Send>>);

impl Write for SharedWriterGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriterGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard(self.0.lock())
    }
}

type FilteredRegistry = Layered<reload::Layer<LevelFilter, Registry>, Registry>;

/// Default logger: a private `tracing` dispatch honoring [`LoggingConfig`].
pub struct ConsoleLogger {
    dispatch: Dispatch,
    level: reload::Handle<LevelFilter, Registry>,
    writer: SharedWriter,
}

impl ConsoleLogger {
    pub fn new(config: &LoggingConfig) -> anyhow::Result<Self> {
        let level = config.effective_level()?;
        let (output, is_terminal) = config.open_output()?;
        let writer = SharedWriter::new(output);
        let (filter, handle) = reload::Layer::new(level);

        let fmt_layer: Box<dyn Layer<FilteredRegistry> + Send + Sync> =
            match config.format.as_str() {
                "json" => fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer.clone())
                    .boxed(),
                "text" => {
                    let color = config.color && is_terminal;
                    fmt::layer()
                        .event_format(ConsoleFormat::new())
                        .with_ansi(color)
                        .with_writer(writer.clone())
                        .boxed()
                }
                other => {
                    return Err(anyhow!(
                        "Invalid log format: {} (must be 'json' or 'text')",
                        other
                    ))
                }
            };

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            level: handle,
            writer,
        })
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, level: Level, message: &str) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            if level == Level::ERROR {
                tracing::error!(target: LOG_TARGET, "{}", message);
            } else if level == Level::WARN {
                tracing::warn!(target: LOG_TARGET, "{}", message);
            } else if level == Level::INFO {
                tracing::info!(target: LOG_TARGET, "{}", message);
            } else if level == Level::DEBUG {
                tracing::debug!(target: LOG_TARGET, "{}", message);
            } else {
                tracing::trace!(target: LOG_TARGET, "{}", message);
            }
        });
    }

    fn controller(&self) -> Option<&dyn Controller> {
        Some(self)
    }

    fn dispatch(&self) -> Option<&Dispatch> {
        Some(&self.dispatch)
    }
}

impl Controller for ConsoleLogger {
    fn set_level(&self, level: LevelFilter) -> anyhow::Result<()> {
        self.level
            .reload(level)
            .context("Failed to change log level")
    }

    fn set_output(&self, output: Box<dyn Write + Send>) {
        self.writer.replace(output);
    }
}

/// Logger that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardLogger;

impl Logger for DiscardLogger {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Default LoggerConstructor.
pub fn new_console_logger(config: &AppConfig) -> anyhow::Result<Arc<dyn Logger>> {
    Ok(Arc::new(ConsoleLogger::new(&config.log)?))
}
