//! clio demo binary
//!
//! Wires the library into a small clap front end: overlays a demo config,
//! registers a line-printing UI and publishes one event per count.

use clap::{ArgAction, Parser, Subcommand};
use clio::bus::{Event, Unsubscriber};
use clio::ui::Ui;
use clio::{Application, LoggingConfig, ProcessContext, SetupConfig};
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "clio-demo", version, about = "Demo application built on clio")]
struct Cli {
    /// Configuration file (searched for when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all logging
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish N events and render them
    Count {
        /// Number of events to publish
        n: u64,
    },
}

/// Overlaid from `.clio-demo.yaml` and `CLIO_DEMO_*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DemoConfig {
    label: String,
    #[serde(rename = "delay-ms")]
    delay_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            label: "tick".to_string(),
            delay_ms: 100,
        }
    }
}

/// Prints one line per event to stdout.
struct LineUi {
    count: u64,
}

impl Ui for LineUi {
    fn setup(&mut self, _unsubscriber: Unsubscriber) -> anyhow::Result<()> {
        Ok(())
    }

    fn handle(&mut self, event: &Event) -> anyhow::Result<()> {
        self.count += 1;
        let label = event.data["label"].as_str().unwrap_or("event");
        let mut out = std::io::stdout().lock();
        writeln!(out, "{} {} {}", "•".cyan(), label.bold(), event.data["n"])?;
        Ok(())
    }

    fn teardown(&mut self, force: bool) -> anyhow::Result<()> {
        let mut out = std::io::stdout().lock();
        if force {
            writeln!(out, "{} after {} events", "stopped".yellow(), self.count)?;
        } else {
            writeln!(out, "{} {} events", "rendered".green(), self.count)?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let (verbosity, quiet) = (cli.verbose, cli.quiet);

    let mut setup = SetupConfig::new("clio-demo", env!("CARGO_PKG_VERSION"))
        .with_ui_constructor(|_| Ok(vec![Box::new(LineUi { count: 0 }) as Box<dyn Ui>]))
        .with_initializer(move |config, state, _| {
            // Flags take precedence over the file and environment.
            let flags = LoggingConfig {
                verbosity,
                quiet,
                ..config.log.clone()
            };
            if let Some(controller) = state.logger().controller() {
                controller.set_level(flags.effective_level()?)?;
            }
            Ok(())
        });
    if let Some(path) = &cli.config {
        setup = setup.with_config_path(path.clone());
    }
    let app = Application::new(setup);

    let report = match cli.command {
        Command::Count { n } => {
            app.execute(
                ProcessContext::from_env(),
                DemoConfig::default(),
                |invocation| async move {
                    let Some(bus) = invocation.state.bus().cloned() else {
                        anyhow::bail!("no event bus configured");
                    };
                    let delay = Duration::from_millis(invocation.config.delay_ms);
                    for i in 1..=n {
                        bus.publish(
                            Event::new("count", json!({"n": i, "label": &invocation.config.label}))
                                .with_source("clio-demo"),
                        );
                        tokio::time::sleep(delay).await;
                    }
                    invocation.state.logger().info(&format!("published {} events", n));
                    Ok(())
                },
            )
            .await
        }
    };

    if let Err(e) = report.print(&mut std::io::stderr()) {
        eprintln!("Failed to write report: {}", e);
    }
    process::exit(report.exit_code());
}
