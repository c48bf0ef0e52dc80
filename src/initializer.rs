//! Initializer chain: ordered, fail-fast hooks run after State is built and
//! before the command body.

use crate::config::AppConfig;
use crate::context::ProcessContext;
use crate::error::InitializerError;
use crate::state::State;
use std::sync::Arc;
use tracing::debug;

/// Receives the merged config and the constructed State. May change the
/// process context (environment) or runtime logger settings, but not the
/// components themselves.
pub type Initializer =
    Arc<dyn Fn(&AppConfig, &State, &mut ProcessContext) -> anyhow::Result<()> + Send + Sync>;

/// Initializers in registration order. No reordering, no deduplication.
#[derive(Clone, Default)]
pub struct InitializerChain {
    initializers: Vec<Initializer>,
}

impl InitializerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, initializer: F)
    where
        F: Fn(&AppConfig, &State, &mut ProcessContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.initializers.push(Arc::new(initializer));
    }

    pub fn len(&self) -> usize {
        self.initializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initializers.is_empty()
    }

    /// Run every initializer in order; the first error stops the chain. No
    /// rollback is attempted.
    pub fn run(
        &self,
        config: &AppConfig,
        state: &State,
        ctx: &mut ProcessContext,
    ) -> Result<(), InitializerError> {
        for (index, initializer) in self.initializers.iter().enumerate() {
            debug!(index, "Running initializer");
            initializer(config, state, ctx).map_err(|source| {
                state
                    .logger()
                    .error(&format!("initializer #{} failed: {:#}", index, source));
                InitializerError { index, source }
            })?;
        }
        Ok(())
    }
}
