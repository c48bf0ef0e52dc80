//! Application: the pre-run hook (overlay, construction, initializers) and the
//! run loop that drives UIs while the command body executes.

use crate::bus::{EventBus, Subscription};
use crate::config::{AppConfig, ConfigOverlay, Identification};
use crate::context::ProcessContext;
use crate::error::{ConfigError, SetupError};
use crate::exit::{ExitCoordinator, RunReport};
use crate::initializer::InitializerChain;
use crate::lifecycle::{DispatchEnd, UiDriver};
use crate::logging::{Logger, LoggingConfig};
use crate::registry::ComponentRegistry;
use crate::state::State;
use crate::ui::Ui;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, Dispatch};

/// Default bound on a forced teardown, per UI.
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Called after teardown with the final report. Errors are logged; they do not
/// change the exit status.
pub type PostRun = Arc<dyn Fn(&State, &RunReport) -> anyhow::Result<()> + Send + Sync>;

/// Everything an application registers before the first run.
#[derive(Clone)]
pub struct SetupConfig {
    identification: Identification,
    logging: LoggingConfig,
    registry: ComponentRegistry,
    initializers: InitializerChain,
    post_runs: Vec<PostRun>,
    config_path: Option<PathBuf>,
    search_config: bool,
    handle_interrupts: bool,
    teardown_timeout: Duration,
}

impl SetupConfig {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            identification: Identification::new(name, version),
            logging: LoggingConfig::default(),
            registry: ComponentRegistry::new(),
            initializers: InitializerChain::new(),
            post_runs: Vec::new(),
            config_path: None,
            search_config: true,
            handle_interrupts: true,
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
        }
    }

    pub fn identification(&self) -> &Identification {
        &self.identification
    }

    /// Default logging settings, before the persisted document and environment.
    pub fn with_logging_config(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_logger_constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&AppConfig) -> anyhow::Result<Arc<dyn Logger>> + Send + Sync + 'static,
    {
        self.registry.set_logger_constructor(constructor);
        self
    }

    pub fn with_bus_constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&AppConfig) -> anyhow::Result<Option<Arc<dyn EventBus>>> + Send + Sync + 'static,
    {
        self.registry.set_bus_constructor(constructor);
        self
    }

    pub fn with_ui_constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&AppConfig) -> anyhow::Result<Vec<Box<dyn Ui>>> + Send + Sync + 'static,
    {
        self.registry.set_ui_constructor(constructor);
        self
    }

    /// Appends to the chain; initializers run in the order they were added.
    pub fn with_initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&AppConfig, &State, &mut ProcessContext) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.initializers.push(initializer);
        self
    }

    pub fn with_post_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&State, &RunReport) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.post_runs.push(Arc::new(hook));
        self
    }

    /// Use this persisted document instead of searching. It must exist.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Skip the persisted document search; defaults and environment only
    /// unless an explicit path is set.
    pub fn without_config_search(mut self) -> Self {
        self.search_config = false;
        self
    }

    /// Do not listen for Ctrl-C; only the caller's cancellation token interrupts.
    pub fn without_interrupt_handler(mut self) -> Self {
        self.handle_interrupts = false;
        self
    }

    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }
}

/// What the command body receives from [`Application::execute`].
pub struct Invocation<T> {
    /// The command's own configuration, after overlay.
    pub config: T,
    pub app: AppConfig,
    pub state: State,
    /// Process context as left by the initializers.
    pub ctx: ProcessContext,
}

pub struct Application {
    setup: SetupConfig,
}

impl Application {
    pub fn new(setup: SetupConfig) -> Self {
        Self { setup }
    }

    pub fn identification(&self) -> &Identification {
        &self.setup.identification
    }

    /// Locate and parse the persisted document once.
    pub fn load_overlay(&self, ctx: &ProcessContext) -> Result<ConfigOverlay, ConfigError> {
        ConfigOverlay::load(
            &self.setup.identification,
            ctx,
            self.setup.config_path.as_deref(),
            self.setup.search_config,
        )
    }

    /// Pre-run hook: overlay `AppConfig` and `cmd`, construct State, run the
    /// initializers. The first error stops the pipeline; `cmd` is left
    /// untouched unless its own overlay succeeded.
    pub fn setup<T>(
        &self,
        ctx: &mut ProcessContext,
        cmd: &mut T,
    ) -> Result<(AppConfig, State), SetupError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.prepare(ctx, |overlay| overlay.apply(cmd))
    }

    /// Pre-run hook for commands without their own configuration.
    pub fn setup_without_config(
        &self,
        ctx: &mut ProcessContext,
    ) -> Result<(AppConfig, State), SetupError> {
        self.prepare(ctx, |_| Ok(()))
    }

    fn prepare(
        &self,
        ctx: &mut ProcessContext,
        overlay_command: impl FnOnce(&ConfigOverlay) -> Result<(), ConfigError>,
    ) -> Result<(AppConfig, State), SetupError> {
        let overlay = self.load_overlay(ctx)?;

        let mut config = AppConfig::new(
            self.setup.identification.clone(),
            self.setup.logging.clone(),
        );
        overlay.apply(&mut config)?;
        config.identification = self.setup.identification.clone();
        overlay_command(&overlay)?;

        let state = self.setup.registry.build(&config)?;
        tracing::dispatcher::with_default(&diagnostics(&state), || {
            if let Some(path) = overlay.document_path() {
                debug!(path = %path.display(), "Loaded persisted configuration");
            }
            self.setup.initializers.run(&config, &state, ctx)
        })?;
        Ok((config, state))
    }

    /// Run `body` while UIs render bus events. Interrupted by Ctrl-C unless
    /// disabled.
    pub async fn run<F, Fut>(&self, state: State, body: F) -> RunReport
    where
        F: FnOnce(State) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.run_until(state, CancellationToken::new(), body).await
    }

    /// Like [`run`](Self::run), also interrupted when `cancel` fires.
    /// Framework diagnostics go through the State logger for the whole run.
    pub async fn run_until<F, Fut>(
        &self,
        state: State,
        cancel: CancellationToken,
        body: F,
    ) -> RunReport
    where
        F: FnOnce(State) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let dispatch = diagnostics(&state);
        self.drive(state, cancel, body)
            .with_subscriber(dispatch)
            .await
    }

    async fn drive<F, Fut>(&self, state: State, cancel: CancellationToken, body: F) -> RunReport
    where
        F: FnOnce(State) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut exit = ExitCoordinator::new();
        let interrupt = cancel.child_token();
        let signal_watcher = self.setup.handle_interrupts.then(|| {
            let interrupt = interrupt.clone();
            tokio::spawn(
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Interrupt received");
                        interrupt.cancel();
                    }
                }
                .with_current_subscriber(),
            )
        });

        let mut driver = UiDriver::new(&state);
        let subscription = driver.subscribe(state.bus());
        let unsubscriber = subscription.as_ref().map(Subscription::unsubscriber);
        let dispatcher = tokio::spawn({
            let interrupt = interrupt.clone();
            async move {
                let end = driver.dispatch(subscription, &interrupt).await;
                (driver, end)
            }
            .with_current_subscriber()
        });

        let outcome = tokio::select! {
            biased;
            _ = interrupt.cancelled() => None,
            result = body(state.clone()) => Some(result),
        };
        match outcome {
            Some(result) => exit.record_command(result),
            None => exit.record_interrupt(),
        }

        // Stop accepting new events; the dispatcher drains what is buffered.
        if let Some(unsubscriber) = &unsubscriber {
            unsubscriber.unsubscribe();
        }
        let mut driver = match dispatcher.await {
            Ok((driver, end)) => {
                if end == DispatchEnd::Interrupted && !exit.interrupted() {
                    exit.record_interrupt();
                }
                driver
            }
            Err(err) => {
                exit.record_fatal(anyhow::Error::new(err).context("UI dispatcher task failed"));
                UiDriver::recovered(&state)
            }
        };
        if let Some(watcher) = signal_watcher {
            watcher.abort();
        }

        let force = exit.must_force();
        let timeout = force.then_some(self.setup.teardown_timeout);
        driver.teardown(force, timeout).await;
        exit.record_teardown(force);
        debug!(delivered = driver.delivered(), forced = force, "Run finished");
        exit.record_ui_failures(driver.into_failures());

        let report = exit.finish();
        for (index, hook) in self.setup.post_runs.iter().enumerate() {
            if let Err(err) = hook(&state, &report) {
                state
                    .logger()
                    .error(&format!("post-run hook #{} failed: {:#}", index, err));
            }
        }
        report
    }

    /// Setup, run and report in one call. A setup failure produces a report
    /// without running the body.
    pub async fn execute<T, F, Fut>(&self, ctx: ProcessContext, cmd_config: T, body: F) -> RunReport
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Invocation<T>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.execute_until(ctx, cmd_config, CancellationToken::new(), body)
            .await
    }

    pub async fn execute_until<T, F, Fut>(
        &self,
        mut ctx: ProcessContext,
        mut cmd_config: T,
        cancel: CancellationToken,
        body: F,
    ) -> RunReport
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Invocation<T>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        match self.setup(&mut ctx, &mut cmd_config) {
            Ok((app, state)) => {
                self.run_until(state, cancel, move |state| {
                    body(Invocation {
                        config: cmd_config,
                        app,
                        state,
                        ctx,
                    })
                })
                .await
            }
            Err(err) => {
                let mut exit = ExitCoordinator::new();
                exit.record_setup_error(err);
                exit.finish()
            }
        }
    }
}

/// The State logger's dispatch, or the current default when it has none.
fn diagnostics(state: &State) -> Dispatch {
    match state.logger().dispatch() {
        Some(dispatch) => dispatch.clone(),
        None => tracing::dispatcher::get_default(Dispatch::clone),
    }
}
