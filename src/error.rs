//! Error types for application setup and the UI lifecycle.
//!
//! Fatal categories ([`ConfigError`], [`ConstructionError`], [`InitializerError`])
//! stop the pipeline and are wrapped by [`SetupError`]. UI failures are
//! recorded per component and aggregated into the final report.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration overlay errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to parse configuration file {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("Invalid value {value:?} in {var} (expected {expected})")]
    InvalidEnvironmentValue {
        var: String,
        value: String,
        expected: &'static str,
    },

    #[error("Failed to merge configuration: {0}")]
    Merge(#[from] serde_json::Error),
}

/// A Logger, EventBus or UI constructor failed
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("Failed to construct logger: {0:#}")]
    Logger(#[source] anyhow::Error),

    #[error("Failed to construct event bus: {0:#}")]
    Bus(#[source] anyhow::Error),

    #[error("Failed to construct UIs: {0:#}")]
    Ui(#[source] anyhow::Error),
}

/// First failing initializer in the chain
#[derive(Debug, Error)]
#[error("Initializer #{index} failed: {source:#}")]
pub struct InitializerError {
    pub index: usize,
    #[source]
    pub source: anyhow::Error,
}

/// Errors from the pre-run hook, in pipeline order
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Initializer(#[from] InitializerError),
}

/// A failure recorded against a single UI
#[derive(Debug, Error)]
pub enum UiFailure {
    #[error("UI #{ui} setup failed: {source:#}")]
    Setup {
        ui: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("UI #{ui} failed to handle {event_type:?} event: {source:#}")]
    Handle {
        ui: usize,
        event_type: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("UI #{ui} teardown failed: {source:#}")]
    Teardown {
        ui: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("UI #{ui} teardown did not finish within {after:?}")]
    TeardownTimedOut { ui: usize, after: Duration },
}

impl UiFailure {
    /// Index of the UI in registration order.
    pub fn ui(&self) -> usize {
        match self {
            UiFailure::Setup { ui, .. }
            | UiFailure::Handle { ui, .. }
            | UiFailure::Teardown { ui, .. }
            | UiFailure::TeardownTimedOut { ui, .. } => *ui,
        }
    }

    /// A hung teardown is the only UI failure that fails the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, UiFailure::TeardownTimedOut { .. })
    }
}
