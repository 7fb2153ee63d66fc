use tracing::level_filters::LevelFilter;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::LogFormat;

/// Filter built from `RUST_LOG`-style directives, `info` when none are given.
fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init(format: LogFormat) -> Result<(), SetGlobalDefaultError> {
    let filter = env_filter(&std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default());

    match format {
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Json => {
            let subscriber = Registry::default()
                .with(filter)
                .with(JsonStorageLayer)
                .with(BunyanFormattingLayer::new(env!("CARGO_PKG_NAME").to_string(), std::io::stdout));
            tracing::subscriber::set_global_default(subscriber)
        }
    }
}
