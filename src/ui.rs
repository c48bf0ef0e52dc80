//! UI capability: renderers that receive bus events during a run.

use crate::bus::{Event, Unsubscriber};
use parking_lot::Mutex;
use std::sync::Arc;

/// A renderer driven by the lifecycle driver.
///
/// `setup` is called once before any event; `handle` once per event (only if
/// setup succeeded); `teardown` exactly once at the end of the run, with
/// `force = true` when the run was interrupted or failed. Calls on one UI are
/// never concurrent.
pub trait Ui: Send {
    fn setup(&mut self, unsubscriber: Unsubscriber) -> anyhow::Result<()>;

    fn handle(&mut self, event: &Event) -> anyhow::Result<()>;

    fn teardown(&mut self, force: bool) -> anyhow::Result<()>;
}

/// A UI instance shared between State and the driver; the lock serializes calls.
pub type SharedUi = Arc<Mutex<Box<dyn Ui>>>;

pub fn share(ui: Box<dyn Ui>) -> SharedUi {
    Arc::new(Mutex::new(ui))
}

/// Returned from [`Ui::handle`] to stop event delivery for the rest of the run.
/// Not treated as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("exit event loop")]
pub struct ExitEventLoop;

/// True when `err` is (or wraps) [`ExitEventLoop`].
pub fn is_exit_event_loop(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ExitEventLoop>().is_some()
}

/// Default UiConstructor: headless.
pub fn no_uis(_config: &crate::config::AppConfig) -> anyhow::Result<Vec<Box<dyn Ui>>> {
    Ok(Vec::new())
}
