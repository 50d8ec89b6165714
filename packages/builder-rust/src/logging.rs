//! Tracing subscriber setup for the `request-builder` binary.

use anyhow::Result;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Environment variable read for filter directives when no level is given.
pub const LOG_ENV: &str = "REQUEST_BUILDER_LOG";

const DEFAULT_LEVEL: &str = "info";

//-----------------------------------------------------------------------------
// Tracing Initialization
//-----------------------------------------------------------------------------

/// Installs the global tracing subscriber. Events go to stderr so that
/// operation results printed on stdout stay machine readable.
///
/// `level` accepts full filter directives, e.g. `request_builder=debug,info`.
/// Without one, [`LOG_ENV`] is consulted, then `info`.
///
/// # Errors
///
/// Fails on malformed directives or when a global subscriber is already set.
pub fn init_tracing(level: Option<&str>, json: bool) -> Result<()> {
    let filter = build_filter(level)?;
    let subscriber = Registry::default().with(filter);

    if json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr);
        tracing::subscriber::set_global_default(subscriber.with(layer))?;
    } else {
        let layer = fmt::layer()
            .pretty()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);
        tracing::subscriber::set_global_default(subscriber.with(layer))?;
    }

    Ok(())
}

fn build_filter(level: Option<&str>) -> Result<EnvFilter> {
    let filter = match level {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_env(LOG_ENV).or_else(|_| EnvFilter::try_new(DEFAULT_LEVEL))?,
    };
    Ok(filter)
}
