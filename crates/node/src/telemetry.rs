//! Structured logging initialization for the node binaries.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initializes the global `tracing` subscriber.
///
/// Honors `RUST_LOG`; defaults to `info`. Logs go to stderr so stdout stays
/// usable for command output.
pub fn init_tracing() -> Result<(), anyhow::Error> {
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
