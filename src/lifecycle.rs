//! UI lifecycle driver: subscribe, dispatch bus events to UIs, tear down.
//!
//! The driver moves through [`Phase`] in one direction only:
//! `Idle -> Subscribed -> Dispatching -> TearingDown -> Closed`. Every UI call
//! goes through the UI's own lock, so no UI ever sees concurrent calls.

use crate::bus::{Event, EventBus, Subscription, Unsubscriber};
use crate::error::UiFailure;
use crate::logging::Logger;
use crate::state::State;
use crate::ui::{is_exit_event_loop, SharedUi};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Dispatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Subscribed,
    Dispatching,
    TearingDown { forced: bool },
    Closed,
}

/// Why the dispatch loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEnd {
    /// The subscription was released and every buffered event delivered.
    Drained,
    /// The cancellation token fired.
    Interrupted,
    /// A UI returned [`ExitEventLoop`](crate::ui::ExitEventLoop).
    Exited,
}

pub struct UiDriver {
    uis: Vec<SharedUi>,
    /// UIs whose setup succeeded; only these receive events.
    ready: Vec<bool>,
    phase: Phase,
    failures: Vec<UiFailure>,
    delivered: u64,
    logger: Arc<dyn Logger>,
}

impl UiDriver {
    pub fn new(state: &State) -> Self {
        Self {
            uis: state.uis().to_vec(),
            ready: vec![false; state.uis().len()],
            phase: Phase::Idle,
            failures: Vec::new(),
            delivered: 0,
            logger: Arc::clone(state.logger()),
        }
    }

    /// Driver for UIs whose dispatcher was lost mid-run: every UI already
    /// went through setup, so all of them are due a teardown.
    pub(crate) fn recovered(state: &State) -> Self {
        Self {
            phase: Phase::Dispatching,
            ..Self::new(state)
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn failures(&self) -> &[UiFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<UiFailure> {
        self.failures
    }

    /// Total successful `handle` calls across all UIs.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Subscribe to the bus (if any) and run `setup` on every UI in
    /// registration order. A failing UI is skipped for delivery but still
    /// torn down later.
    pub fn subscribe(&mut self, bus: Option<&Arc<dyn EventBus>>) -> Option<Subscription> {
        if self.phase != Phase::Idle {
            warn!(phase = ?self.phase, "UI driver already subscribed");
            return None;
        }

        let subscription = bus.map(|bus| bus.subscribe());
        let unsubscriber = subscription
            .as_ref()
            .map(Subscription::unsubscriber)
            .unwrap_or_else(Unsubscriber::detached);

        for (index, ui) in self.uis.iter().enumerate() {
            let handle = unsubscriber.clone();
            let result = guarded(|| ui.lock().setup(handle));
            match result {
                Ok(()) => self.ready[index] = true,
                Err(source) => {
                    self.logger
                        .error(&format!("UI #{} setup failed: {:#}", index, source));
                    self.failures.push(UiFailure::Setup { ui: index, source });
                }
            }
        }

        self.phase = Phase::Subscribed;
        debug!(
            uis = self.uis.len(),
            ready = self.ready.iter().filter(|r| **r).count(),
            "UIs set up"
        );
        subscription
    }

    /// Deliver events until the subscription drains, `cancel` fires, or a UI
    /// asks to leave the loop. An interrupt finishes the in-flight event
    /// before returning.
    pub async fn dispatch(
        &mut self,
        subscription: Option<Subscription>,
        cancel: &CancellationToken,
    ) -> DispatchEnd {
        if self.phase == Phase::Subscribed {
            self.phase = Phase::Dispatching;
        }
        let Some(mut subscription) = subscription else {
            return DispatchEnd::Drained;
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return DispatchEnd::Interrupted,
                event = subscription.recv() => event,
            };
            let Some(event) = event else {
                return DispatchEnd::Drained;
            };
            if self.deliver(&event) {
                debug!(event_type = %event.event_type, "UI requested exit from event loop");
                return DispatchEnd::Exited;
            }
        }
    }

    /// Returns true when a UI asked to stop the event loop.
    fn deliver(&mut self, event: &Event) -> bool {
        let mut exit = false;
        for (index, ui) in self.uis.iter().enumerate() {
            if !self.ready[index] {
                continue;
            }
            match guarded(|| ui.lock().handle(event)) {
                Ok(()) => self.delivered += 1,
                Err(err) if is_exit_event_loop(&err) => {
                    self.delivered += 1;
                    exit = true;
                }
                Err(source) => {
                    self.logger.warn(&format!(
                        "UI #{} failed to handle {} event: {:#}",
                        index, event.event_type, source
                    ));
                    self.failures.push(UiFailure::Handle {
                        ui: index,
                        event_type: event.event_type.clone(),
                        source,
                    });
                }
            }
        }
        exit
    }

    /// Call `teardown(force)` once on every UI that went through setup, in
    /// registration order, collecting every failure. With a timeout, a UI
    /// that does not return in time is abandoned and recorded as fatal.
    pub async fn teardown(&mut self, force: bool, timeout: Option<Duration>) {
        match self.phase {
            Phase::Subscribed | Phase::Dispatching => {}
            Phase::Idle => {
                self.phase = Phase::Closed;
                return;
            }
            Phase::TearingDown { .. } | Phase::Closed => return,
        }
        self.phase = Phase::TearingDown { forced: force };

        for (index, ui) in self.uis.iter().enumerate() {
            let ui = Arc::clone(ui);
            let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
            let call = tokio::task::spawn_blocking(move || {
                tracing::dispatcher::with_default(&dispatch, || guarded(|| ui.lock().teardown(force)))
            });
            let joined = match timeout {
                Some(after) => match tokio::time::timeout(after, call).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        self.logger.error(&format!(
                            "UI #{} teardown did not finish within {:?}",
                            index, after
                        ));
                        self.failures
                            .push(UiFailure::TeardownTimedOut { ui: index, after });
                        continue;
                    }
                },
                None => call.await,
            };
            let result = joined.map_err(anyhow::Error::from).and_then(|r| r);
            if let Err(source) = result {
                self.logger
                    .error(&format!("UI #{} teardown failed: {:#}", index, source));
                self.failures.push(UiFailure::Teardown { ui: index, source });
            }
        }

        self.phase = Phase::Closed;
        debug!(forced = force, "UIs torn down");
    }
}

impl std::fmt::Debug for UiDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiDriver")
            .field("phase", &self.phase)
            .field("uis", &self.uis.len())
            .field("failures", &self.failures.len())
            .field("delivered", &self.delivered)
            .finish()
    }
}

/// Run one UI call, turning a panic into an error.
fn guarded(call: impl FnOnce() -> anyhow::Result<()>) -> anyhow::Result<()> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!("panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
