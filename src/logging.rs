//! Tracing subscriber setup.
//!
//! Output is tiered the way operators expect from a cron-driven checker:
//! warnings and errors go to stderr, informational output to stdout, and an
//! optional log file receives everything enabled. The level knob is an
//! explicit value resolved from the CLI; there is no global mutable logger
//! state beyond the subscriber installed here once.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Installs the global subscriber. Fails only when `log_file` cannot be
/// opened for appending.
pub fn init(max_level: Level, log_file: Option<&Path>) -> io::Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter_fn(move |meta| {
            *meta.level() <= Level::WARN && *meta.level() <= max_level
        }));

    let stdout_layer = fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .without_time()
        .with_filter(filter_fn(move |meta| {
            *meta.level() > Level::WARN && *meta.level() <= max_level
        }));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_filter(filter_fn(move |meta| *meta.level() <= max_level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
