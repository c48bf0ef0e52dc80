//! Text line format: `[SSSS] LEVEL message`.

use owo_colors::{OwoColorize, Style};
use std::fmt;
use std::time::Instant;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Elapsed whole seconds since the logger was created, zero-padded, followed
/// by the right-aligned level and the event fields.
pub struct ConsoleFormat {
    start: Instant,
}

impl ConsoleFormat {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for ConsoleFormat {
    fn default() -> Self {
        Self::new()
    }
}

fn level_style(level: Level) -> Style {
    if level == Level::ERROR {
        Style::new().red().bold()
    } else if level == Level::WARN {
        Style::new().yellow()
    } else if level == Level::INFO {
        Style::new().green()
    } else if level == Level::DEBUG {
        Style::new().blue()
    } else {
        Style::new().magenta()
    }
}

impl<S, N> FormatEvent<S, N> for ConsoleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = *event.metadata().level();
        let label = format!("{:>5}", level.as_str());

        write!(writer, "[{:04}] ", self.start.elapsed().as_secs())?;
        if writer.has_ansi_escapes() {
            write!(writer, "{}", label.style(level_style(level)))?;
        } else {
            write!(writer, "{}", label)?;
        }
        write!(writer, " ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
