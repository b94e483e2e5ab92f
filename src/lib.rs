pub mod calendar;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod summary;

use tracing_subscriber::EnvFilter;

/// Install the stderr tracing subscriber.
///
/// Honors `RUST_LOG`, otherwise falls back to [`config::default_log_filter`].
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
