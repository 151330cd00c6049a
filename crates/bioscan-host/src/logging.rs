//! Log output for the host.
//!
//! Logs go to stderr: in headless mode stdout is the bridge.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Pick the filter directive: `--log-filter`, then `RUST_LOG`, then `info`.
pub fn resolve_filter(cli: Option<&str>, env: Option<String>) -> String {
    cli.map(str::to_string)
        .or(env)
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the global subscriber and return the filter actually in effect.
///
/// An unparsable directive falls back to `info` rather than failing startup.
pub fn init(cli_filter: Option<&str>) -> String {
    let requested = resolve_filter(cli_filter, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    let (filter, effective) = match EnvFilter::try_new(&requested) {
        Ok(filter) => (filter, requested),
        Err(_) => (EnvFilter::new(DEFAULT_FILTER), DEFAULT_FILTER.to_string()),
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
    effective
}
