//! clio: application bootstrap for command-line tools
//!
//! Assembles a layered configuration, a logger, an event bus and a set of UI
//! renderers from pluggable constructors, runs initializer hooks, then drives
//! the UIs from bus events while the command body executes.

pub mod application;
pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod exit;
pub mod initializer;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod state;
pub mod ui;

pub use application::{Application, Invocation, SetupConfig};
pub use bus::{Event, EventBus, InMemoryBus};
pub use crate::config::{AppConfig, ConfigOverlay, Identification};
pub use context::ProcessContext;
pub use error::{ConfigError, ConstructionError, InitializerError, SetupError, UiFailure};
pub use exit::RunReport;
pub use logging::{Logger, LoggingConfig};
pub use state::State;
pub use ui::{ExitEventLoop, Ui};
