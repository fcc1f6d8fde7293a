//! Structured logging setup

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::LogSettings;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over the configured level when present. Calling this
/// twice is harmless; the second install is ignored.
pub fn init_tracing(settings: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}
