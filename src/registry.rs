//! Component registry: pluggable constructors for the Logger, EventBus and UIs.

use crate::bus::{new_in_memory_bus, EventBus};
use crate::config::AppConfig;
use crate::error::ConstructionError;
use crate::logging::{new_console_logger, Logger};
use crate::state::State;
use crate::ui::{no_uis, share, Ui};
use std::sync::Arc;
use tracing::debug;

pub type LoggerConstructor =
    Arc<dyn Fn(&AppConfig) -> anyhow::Result<Arc<dyn Logger>> + Send + Sync>;

pub type BusConstructor =
    Arc<dyn Fn(&AppConfig) -> anyhow::Result<Option<Arc<dyn EventBus>>> + Send + Sync>;

pub type UiConstructor = Arc<dyn Fn(&AppConfig) -> anyhow::Result<Vec<Box<dyn Ui>>> + Send + Sync>;

/// Holds the constructors; unset ones fall back to the builtins (console
/// logger, in-memory bus, no UIs).
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    logger: Option<LoggerConstructor>,
    bus: Option<BusConstructor>,
    ui: Option<UiConstructor>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_logger_constructor<F>(&mut self, constructor: F)
    where
        F: Fn(&AppConfig) -> anyhow::Result<Arc<dyn Logger>> + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(constructor));
    }

    pub fn set_bus_constructor<F>(&mut self, constructor: F)
    where
        F: Fn(&AppConfig) -> anyhow::Result<Option<Arc<dyn EventBus>>> + Send + Sync + 'static,
    {
        self.bus = Some(Arc::new(constructor));
    }

    pub fn set_ui_constructor<F>(&mut self, constructor: F)
    where
        F: Fn(&AppConfig) -> anyhow::Result<Vec<Box<dyn Ui>>> + Send + Sync + 'static,
    {
        self.ui = Some(Arc::new(constructor));
    }

    /// Construct Logger, then EventBus, then UIs. The first failure aborts and
    /// no State is produced.
    pub fn build(&self, config: &AppConfig) -> Result<State, ConstructionError> {
        let logger = match &self.logger {
            Some(constructor) => constructor(config),
            None => new_console_logger(config),
        }
        .map_err(ConstructionError::Logger)?;

        let bus = match &self.bus {
            Some(constructor) => constructor(config),
            None => new_in_memory_bus(config),
        }
        .map_err(|e| {
            logger.error(&format!("failed to construct event bus: {:#}", e));
            ConstructionError::Bus(e)
        })?;

        let uis = match &self.ui {
            Some(constructor) => constructor(config),
            None => no_uis(config),
        }
        .map_err(|e| {
            logger.error(&format!("failed to construct UIs: {:#}", e));
            ConstructionError::Ui(e)
        })?;

        debug!(bus = bus.is_some(), uis = uis.len(), "Constructed application state");
        Ok(State::new(
            logger,
            bus,
            uis.into_iter().map(share).collect(),
        ))
    }
}
