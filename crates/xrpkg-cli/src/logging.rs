use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "XRPKG_LOG";

pub fn default_log_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// `-v` flags win over `XRPKG_LOG`; without them the env filter applies.
pub fn init_logging(verbosity: u8) -> Result<()> {
    let filter = if verbosity > 0 {
        EnvFilter::new(default_log_directive(verbosity))
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(default_log_directive(0)))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize logging: {err}"))
}
