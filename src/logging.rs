//! Tracing subscriber setup.
//!
//! The port logs through `tracing`; nothing is printed unless the embedding
//! program installs a subscriber. [`init`] installs a `fmt` subscriber on
//! stderr from a [`LoggingConfig`].

use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Build the subscriber described by `config` without installing it.
///
/// `RUST_LOG` takes precedence over `config.level`; an unparsable level
/// falls back to `info`.
pub fn subscriber(config: &LoggingConfig) -> Box<dyn Subscriber + Send + Sync> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_thread_names(true);

    match config.format {
        LogFormat::Pretty => Box::new(builder.pretty().finish()),
        LogFormat::Compact => Box::new(builder.compact().with_ansi(false).finish()),
        LogFormat::Json => Box::new(builder.json().finish()),
    }
}

/// Install the global subscriber.
///
/// Returns `false` if a global subscriber was already set, which makes
/// repeated calls harmless.
pub fn init(config: &LoggingConfig) -> bool {
    tracing::subscriber::set_global_default(subscriber(config)).is_ok()
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
