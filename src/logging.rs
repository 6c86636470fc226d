//! Diagnostic output
//!
//! Error events, and only error events, are written to stderr, so every line
//! a reader finds there is an `ERROR MSG ...` report or a send/receive
//! failure. Everything else the filter lets through goes to stdout.

use tracing::Level;
use tracing_subscriber::fmt::writer::{MakeWriterExt, OrElse, WithMaxLevel};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Routes ERROR events to `errors` and every other event to `rest`
pub fn split_by_level<E, O>(errors: E, rest: O) -> OrElse<WithMaxLevel<E>, O>
where
    E: for<'w> MakeWriter<'w>,
    O: for<'w> MakeWriter<'w>,
{
    errors.with_max_level(Level::ERROR).or_else(rest)
}

/// Installs the process-wide subscriber
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(split_by_level(std::io::stderr, std::io::stdout))
        .init();
}
