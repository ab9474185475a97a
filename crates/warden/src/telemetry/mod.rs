pub mod log_filter;

use tracing_subscriber::{
    EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
};
use warden_config::LoggingConfig;

pub use log_filter::LogTypeFilter;

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays clean. When `RUST_LOG` is set it replaces the configured
/// levels.
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), TryInitError> {
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|directives| !directives.trim().is_empty())
        .map(EnvFilter::new);
    let log_type_filter = match env_filter {
        Some(_) => None,
        None => Some(LogTypeFilter::from_config(config)),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(config.use_color)
        .with_target(config.show_target);
    let fmt_layer = if config.show_timestamp {
        fmt_layer.boxed()
    } else {
        fmt_layer.without_time().boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .with(log_type_filter)
        .try_init()
}
