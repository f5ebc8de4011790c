//! Logging initialization.
//!
//! Diagnostics go to stderr so they never mix with the encoded response on stdout.
//! `RUST_LOG` takes precedence over the default `warn` level.
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
