//! One host run: serve the UI until it goes away, then tear down.
//!
//! ```text
//! UI surface ready ─▶ serve bridge ─┬─ UI closes stdout / exits ─┐
//!                     initialize()  └─ shutdown signal ──────────┤
//!                     monitor                                    ▼
//!                                    stop monitor ─▶ service.shutdown() ─▶ reap UI
//! ```
//!
//! The reader is always released before the UI process is reaped.

use std::future::Future;
use std::sync::Arc;

use bioscan_bridge::{BridgeServer, Dispatcher, SessionStats};
use tracing::{Instrument, error, info, info_span, warn};

use crate::context::HostContext;
use crate::error::Result;
use crate::monitor;
use crate::ui::UiSurface;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The UI closed its side of the bridge.
    UiClosed(SessionStats),
    /// The shutdown signal fired first.
    Interrupted,
}

/// Run the bridge for `surface` until the UI closes or `shutdown` resolves.
///
/// A failed reader initialization is logged and left for the UI
/// (`biometric.init`) or the presence monitor to retry.
///
/// # Errors
///
/// Returns [`HostError::Bridge`](crate::HostError::Bridge) when the bridge
/// transport fails. Teardown still runs first.
pub async fn run<F>(ctx: &HostContext, surface: UiSurface, shutdown: F) -> Result<SessionEnd>
where
    F: Future<Output = ()>,
{
    let span = info_span!("session", id = %ctx.session_id);
    run_inner(ctx, surface, shutdown).instrument(span).await
}

async fn run_inner<F>(ctx: &HostContext, surface: UiSurface, shutdown: F) -> Result<SessionEnd>
where
    F: Future<Output = ()>,
{
    let (reader, writer, process) = surface.into_parts();
    let server = BridgeServer::new(Dispatcher::new(Arc::clone(&ctx.service), ctx.app_info()));
    let monitor = monitor::spawn(Arc::clone(&ctx.service), ctx.monitor_config());

    info!(
        app = %ctx.config.app.name,
        environment = %ctx.config.app.environment,
        backend = ctx.service.backend(),
        "Host session started"
    );

    // The server subscribes to device events before the first connect runs.
    let bridge = async {
        let (served, ()) = tokio::join!(server.serve(reader, writer), initialize(ctx));
        served
    };

    let outcome = tokio::select! {
        served = bridge => served.map(SessionEnd::UiClosed),
        () = shutdown => Ok(SessionEnd::Interrupted),
    };

    match &outcome {
        Ok(SessionEnd::UiClosed(stats)) => info!(requests = stats.requests, "UI surface closed"),
        Ok(SessionEnd::Interrupted) => info!("Shutdown requested"),
        Err(e) => error!(error = %e, "Bridge session failed"),
    }

    monitor.stop().await;
    ctx.service.shutdown().await;

    match process.reap(ctx.config.shutdown_grace()).await {
        Ok(Some(status)) => info!(%status, "UI surface reaped"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to reap UI surface"),
    }

    Ok(outcome?)
}

async fn initialize(ctx: &HostContext) {
    match ctx.service.initialize().await {
        Ok(descriptor) => info!(device_id = %descriptor.id(), name = %descriptor.display_name, "Reader ready"),
        Err(e) => warn!(kind = %e.kind(), error = %e, "No reader available at startup"),
    }
}
