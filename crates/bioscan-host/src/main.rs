//! bioscan host entry point.
//!
//! # Usage
//!
//! ```text
//! bioscan-host [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>        TOML configuration file
//!       --backend <KIND>       usb | sdk | mock
//!       --ui-command <CMD>     Program started as the UI surface
//!       --stdio                Serve the bridge on stdin/stdout instead
//!       --log-filter <FILTER>  tracing filter directive [default: RUST_LOG or info]
//!       --settle-ms <MS>       Wait between arming the sensor and reading
//! ```
//!
//! | Variable             | Overrides       |
//! |----------------------|-----------------|
//! | `BIOSCAN_CONFIG`     | `--config`      |
//! | `BIOSCAN_BACKEND`    | `--backend`     |
//! | `BIOSCAN_UI_COMMAND` | `--ui-command`  |
//! | `BIOSCAN_LOG`        | `--log-filter`  |

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use bioscan_host::backend::build_shim;
use bioscan_host::{BackendKind, ConfigError, HostConfig, HostContext, SessionEnd, UiSurface, logging, session};

/// Privileged host for fingerprint capture.
#[derive(Debug, Parser)]
#[command(name = "bioscan-host", about = "Privileged host for fingerprint capture", version)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "BIOSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Driver backend, overriding `backend.kind`.
    #[arg(long, value_enum, env = "BIOSCAN_BACKEND")]
    backend: Option<BackendKind>,

    /// UI program, overriding `ui.command`.
    #[arg(long, env = "BIOSCAN_UI_COMMAND")]
    ui_command: Option<String>,

    /// Serve the bridge on this process's stdin/stdout (no UI child).
    #[arg(long)]
    stdio: bool,

    /// tracing filter directive, e.g. `bioscan_biometric=debug`.
    #[arg(long, env = "BIOSCAN_LOG")]
    log_filter: Option<String>,

    /// Settle interval in milliseconds, overriding `capture.settle_ms`.
    #[arg(long)]
    settle_ms: Option<u64>,
}

impl Cli {
    /// Load the config file (if any), apply overrides, validate.
    fn resolve_config(&self) -> Result<HostConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => HostConfig::load(path)?,
            None => HostConfig::default(),
        };

        if let Some(kind) = self.backend {
            config.backend.kind = kind;
        }
        if let Some(command) = &self.ui_command {
            config.ui.command = command.clone();
        }
        if let Some(settle_ms) = self.settle_ms {
            config.capture.settle_ms = settle_ms;
        }

        config.validate()?;
        Ok(config)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = cli.resolve_config().context("invalid configuration")?;
    let log_filter = logging::init(cli.log_filter.as_deref());

    let shim = build_shim(&config).context("failed to select driver backend")?;
    let ctx = HostContext::new(config, shim, log_filter);
    info!(session = %ctx.session_id, version = env!("CARGO_PKG_VERSION"), "bioscan host starting");

    let surface = if cli.stdio {
        UiSurface::headless()
    } else {
        UiSurface::spawn(&ctx.config.ui).context("failed to create UI surface")?
    };

    match session::run(&ctx, surface, shutdown_signal()).await? {
        SessionEnd::UiClosed(_) => info!("bioscan host stopped: UI closed"),
        SessionEnd::Interrupted => info!("bioscan host stopped: interrupted"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["bioscan-host"]);
        assert!(!cli.stdio);
        assert!(cli.backend.is_none());
        assert!(cli.settle_ms.is_none());
    }

    #[test]
    fn test_cli_overrides_apply() {
        let cli = Cli::parse_from([
            "bioscan-host",
            "--backend",
            "mock",
            "--ui-command",
            "bioscan-ui",
            "--settle-ms",
            "1200",
            "--stdio",
        ]);
        let config = cli.resolve_config().unwrap();

        assert!(cli.stdio);
        assert_eq!(config.backend.kind, BackendKind::Mock);
        assert_eq!(config.ui.command, "bioscan-ui");
        assert_eq!(config.capture.settle_ms, 1200);
    }

    #[test]
    fn test_cli_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["bioscan-host", "--backend", "serial"]).is_err());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let cli = Cli::parse_from(["bioscan-host", "--config", "/nonexistent/bioscan.toml"]);
        assert!(matches!(cli.resolve_config(), Err(ConfigError::Io { .. })));
    }
}
