//! `tracing` subscriber setup for the command line tool
//!
//! Diagnostics go to stderr; stdout stays reserved for the progress bar and
//! the epoch summary lines.

use std::io::{self, IsTerminal};

use colored::*;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

/// Filter directive used when `RUST_LOG` is not set
pub fn default_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "attrswap=info,warn",
        1 => "attrswap=debug,info",
        2 => "attrswap=trace,debug",
        _ => "trace",
    }
}

/// Install the global subscriber: JSON lines, colored terminal output, or
/// plain text when stderr is not a terminal.
pub fn init_logging(verbosity: u8, quiet: bool, json_output: bool) -> Result<()> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(_) if !quiet => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity, quiet))),
        _ => EnvFilter::new(default_directive(verbosity, quiet)),
    };

    let installed = if json_output {
        let json_layer = fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(json_layer).try_init()
    } else if io::stderr().is_terminal() {
        let fmt_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(true)
            .with_span_events(FmtSpan::NONE)
            .event_format(ColoredFormatter)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(fmt_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_ansi(false)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(fmt_layer).try_init()
    };

    installed.map_err(|e| Error::config(format!("cannot install log subscriber: {e}")))
}

/// Timestamped, level-colored single-line events
struct ColoredFormatter;

impl<S, N> fmt::FormatEvent<S, N> for ColoredFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(writer, "{} ", now.format("%H:%M:%S").to_string().dimmed())?;

        let level = match *event.metadata().level() {
            Level::ERROR => "ERROR".red().bold(),
            Level::WARN => "WARN".yellow().bold(),
            Level::INFO => "INFO".green().bold(),
            Level::DEBUG => "DEBUG".blue().bold(),
            Level::TRACE => "TRACE".purple().bold(),
        };
        write!(writer, "{} ", level)?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Print a success line on stdout, with a green check mark on terminals
pub fn success(message: &str) {
    if io::stdout().is_terminal() {
        println!("{} {}", "✓".green().bold(), message);
    } else {
        println!("SUCCESS: {}", message);
    }
}
