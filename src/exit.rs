//! Exit coordination: teardown mode, final diagnostics and process status.

use crate::error::{SetupError, UiFailure};
use std::io::Write;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// 128 + SIGINT
pub const EXIT_INTERRUPTED: i32 = 130;

/// Collects everything that happened during a run and decides how it ends.
#[derive(Debug, Default)]
pub struct ExitCoordinator {
    setup_error: Option<SetupError>,
    command_error: Option<anyhow::Error>,
    interrupted: bool,
    fatal: Vec<anyhow::Error>,
    ui_failures: Vec<UiFailure>,
    forced_teardown: bool,
}

impl ExitCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_setup_error(&mut self, err: SetupError) {
        if self.setup_error.is_none() {
            self.setup_error = Some(err);
        }
    }

    pub fn record_command(&mut self, result: anyhow::Result<()>) {
        if let Err(err) = result {
            if self.command_error.is_none() {
                self.command_error = Some(err);
            }
        }
    }

    pub fn record_interrupt(&mut self) {
        self.interrupted = true;
    }

    /// A failure outside any single UI that still fails the run.
    pub fn record_fatal(&mut self, err: anyhow::Error) {
        self.fatal.push(err);
    }

    pub fn record_ui_failures(&mut self, failures: impl IntoIterator<Item = UiFailure>) {
        self.ui_failures.extend(failures);
    }

    pub fn record_teardown(&mut self, forced: bool) {
        self.forced_teardown = forced;
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// Forced unless the command finished cleanly with nothing fatal recorded.
    pub fn must_force(&self) -> bool {
        self.interrupted
            || self.setup_error.is_some()
            || self.command_error.is_some()
            || !self.fatal.is_empty()
            || self.ui_failures.iter().any(UiFailure::is_fatal)
    }

    pub fn finish(self) -> RunReport {
        let fatal_ui = self.ui_failures.iter().find(|f| f.is_fatal());

        let headline = if let Some(err) = &self.setup_error {
            Some(err.to_string())
        } else if let Some(err) = &self.command_error {
            Some(format!("{:#}", err))
        } else if let Some(err) = self.fatal.first() {
            Some(format!("{:#}", err))
        } else if self.interrupted {
            Some("interrupted".to_string())
        } else {
            fatal_ui.map(ToString::to_string)
        };

        let exit_code = if self.setup_error.is_some()
            || self.command_error.is_some()
            || !self.fatal.is_empty()
        {
            EXIT_FAILURE
        } else if self.interrupted {
            EXIT_INTERRUPTED
        } else if fatal_ui.is_some() {
            EXIT_FAILURE
        } else {
            EXIT_SUCCESS
        };

        let diagnostics = self
            .fatal
            .iter()
            .skip(1)
            .map(|err| format!("{:#}", err))
            .chain(self.ui_failures.iter().map(ToString::to_string))
            .collect();

        RunReport {
            exit_code,
            headline,
            diagnostics,
            forced: self.forced_teardown,
            interrupted: self.interrupted,
        }
    }
}

/// Final outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    exit_code: i32,
    headline: Option<String>,
    diagnostics: Vec<String>,
    forced: bool,
    interrupted: bool,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn success(&self) -> bool {
        self.exit_code == EXIT_SUCCESS
    }

    /// The first fatal error, in pipeline order.
    pub fn headline(&self) -> Option<&str> {
        self.headline.as_deref()
    }

    /// Aggregated non-fatal errors.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Whether UIs were torn down with `force = true`.
    pub fn forced(&self) -> bool {
        self.forced
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// Write the headline and indented diagnostics, if any.
    pub fn print(&self, out: &mut impl Write) -> std::io::Result<()> {
        if let Some(headline) = &self.headline {
            writeln!(out, "error: {}", headline)?;
        }
        if !self.diagnostics.is_empty() {
            let label = if self.headline.is_some() { "also" } else { "warning" };
            writeln!(out, "{}:", label)?;
            for diagnostic in &self.diagnostics {
                writeln!(out, "  - {}", diagnostic)?;
            }
        }
        Ok(())
    }
}
