use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn";

/// `--log-level` wins over `RUST_LOG`; with neither only warnings and errors show.
pub(crate) fn env_filter(log_level: Option<&str>) -> Result<EnvFilter> {
    match log_level {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("invalid --log-level \"{}\"", level))
        }
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))),
    }
}

/// Logs go to stderr so stdout stays machine-readable.
pub(crate) fn init(log_level: Option<&str>) -> Result<()> {
    let filter = env_filter(log_level)?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}
