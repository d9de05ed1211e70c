//! Centralized logging initialization with environment variable support

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for harness logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Initialize the tracing subscriber.
///
/// Environment variables (in priority order):
/// - `RUST_LOG`: standard filter directives (takes precedence over all)
/// - `LOG_LEVEL`: set the base level (trace, debug, info, warn, error)
/// - `LOG_FORMAT`: `json` or `pretty` (default `pretty`)
///
/// Logs go to stderr so the scenario runner's own stdout stays clean.
/// Safe to call more than once; later calls are no-ops.
pub fn initialize() {
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|l| l.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);

    // RUST_LOG takes precedence over the LOG_LEVEL base directive.
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|f| match f.to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" | "human" => Some(LogFormat::Pretty),
            _ => None,
        })
        .unwrap_or(LogFormat::Pretty);

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    // Already-initialized is fine; test binaries call this freely.
    let _ = result;
}

#[cfg(test)]
mod tests {
    use super::initialize;

    #[test]
    fn initialize_is_idempotent() {
        initialize();
        initialize();
    }
}
