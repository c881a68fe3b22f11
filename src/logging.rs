use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when `RUST_LOG` is unset.
fn default_directive(debug_mode: bool) -> &'static str {
    if debug_mode {
        "debug"
    } else {
        "info"
    }
}

/// Build the filter: `--debug` wins, then `RUST_LOG`, then `info`.
pub fn env_filter(debug_mode: bool) -> EnvFilter {
    if debug_mode {
        return EnvFilter::new(default_directive(true));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(false)))
}

/// Install the global subscriber writing to stderr.
///
/// Stdout is reserved for command results so they can be piped.
pub fn setup_logging(debug_mode: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(debug_mode))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(debug_mode)
                .with_line_number(debug_mode),
        )
        .try_init()
        .map_err(|e| anyhow!("initializing logging: {e}"))?;

    tracing::debug!(debug = debug_mode, "logging initialized");
    Ok(())
}
