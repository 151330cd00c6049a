//! Background presence monitor.
//!
//! Polls the bus on a fixed interval, lets the service release a reader that
//! was unplugged, and (with `auto_reconnect`) connects again once a supported
//! reader shows up. A check in progress always runs to completion; stopping
//! the monitor only prevents the next one.

use std::sync::Arc;
use std::time::Duration;

use bioscan_biometric::{PresenceChange, ServiceError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::context::HostService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub auto_reconnect: bool,
}

/// Handle to the running monitor task.
#[derive(Debug)]
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop after the current check and wait for the task to end.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        match self.task.await {
            Ok(()) => debug!("Presence monitor stopped"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "Presence monitor task failed"),
        }
    }
}

/// Start polling. The first check runs one interval after start.
pub fn spawn(service: Arc<HostService>, config: MonitorConfig) -> MonitorHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = config.interval.as_secs(), auto_reconnect = config.auto_reconnect, "Presence monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => check_once(&service, config.auto_reconnect).await,
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    MonitorHandle { stop_tx, task }
}

async fn check_once(service: &HostService, auto_reconnect: bool) {
    match service.check_presence().await {
        Ok(PresenceChange::Unchanged) => {}
        Ok(PresenceChange::Removed(descriptor)) => {
            info!(device_id = %descriptor.id(), "Reader unplugged");
        }
        Ok(PresenceChange::Available(found)) if auto_reconnect => {
            debug!(count = found.len(), "Reader available, reconnecting");
            match service.initialize().await {
                Ok(descriptor) => info!(device_id = %descriptor.id(), "Reader reconnected"),
                // Someone else is already connecting or capturing.
                Err(ServiceError::DeviceBusy) => {}
                Err(e) => warn!(error = %e, "Reconnect failed"),
            }
        }
        Ok(PresenceChange::Available(_)) => {}
        Err(e) => warn!(error = %e, "Presence check failed"),
    }
}
