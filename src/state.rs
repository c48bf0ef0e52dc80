//! Per-run bag of constructed components.

use crate::bus::EventBus;
use crate::logging::Logger;
use crate::ui::SharedUi;
use std::sync::Arc;

/// Logger, optional EventBus and UIs built once per run.
///
/// Cloning shares the same components. Components cannot be replaced after
/// construction; they change only through their own methods.
#[derive(Clone)]
pub struct State {
    logger: Arc<dyn Logger>,
    bus: Option<Arc<dyn EventBus>>,
    uis: Vec<SharedUi>,
}

impl State {
    pub(crate) fn new(
        logger: Arc<dyn Logger>,
        bus: Option<Arc<dyn EventBus>>,
        uis: Vec<SharedUi>,
    ) -> Self {
        Self { logger, bus, uis }
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn bus(&self) -> Option<&Arc<dyn EventBus>> {
        self.bus.as_ref()
    }

    /// UIs in registration order.
    pub fn uis(&self) -> &[SharedUi] {
        &self.uis
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("bus", &self.bus.is_some())
            .field("uis", &self.uis.len())
            .finish()
    }
}
