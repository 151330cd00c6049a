//! The biometric service: one reader, one lifecycle.
//!
//! The service owns the only device handle in the process. Every hardware
//! operation funnels through it and is gated by the [`StateMachine`]:
//!
//! ```text
//!   initialize()            capture_fingerprint()
//! Uninitialized ─▶ Detecting ─▶ Connected ─▶ Capturing ─▶ Connected
//!                      │            │             └──(fatal)──▶ Failed
//!                      └─▶ Disconnected ◀── shutdown() / unplug
//! ```
//!
//! State lives behind a short synchronous lock so that "is anyone capturing?"
//! and "I am capturing now" happen in one step; a second capture is turned
//! away immediately instead of queueing. The handle lives behind an async
//! lock held for the duration of each hardware operation.

use std::sync::{Mutex, MutexGuard};

use bioscan_core::constants::{MAX_QUALITY, SHORT_READ_MESSAGE, UNSTABLE_DEVICE_MESSAGE};
use bioscan_core::{CaptureResult, DeviceDescriptor, DeviceId};
use bioscan_hardware::{
    CaptureParams, DriverShim, HardwareError, VendorCommand, validate_template_len,
};
use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::config::{CaptureConfig, CaptureOptions};
use crate::error::{Result, ServiceError};
use crate::events::DeviceEvent;
use crate::state_machine::{ServiceState, StateMachine, StateTransition};
use crate::status::{DeviceInfo, DeviceStats, PresenceChange, ServiceStatus};

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug)]
struct Inner {
    machine: StateMachine,
    active: Option<DeviceDescriptor>,
    stats: DeviceStats,
    devices_found: usize,
    closing: bool,
}

/// Owner of the reader lifecycle.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bioscan_biometric::{BiometricService, CaptureConfig, CaptureOptions, ServiceState};
/// use bioscan_core::DeviceDescriptor;
/// use bioscan_hardware::MockShim;
///
/// #[tokio::main]
/// async fn main() -> bioscan_biometric::Result<()> {
///     let (shim, handle) = MockShim::with_devices([DeviceDescriptor::new(0x096e, 0x0001, "Hamster")]);
///     handle.queue_read(vec![0x5A; 200]);
///
///     let config = CaptureConfig { settle: Duration::ZERO, ..CaptureConfig::default() };
///     let service = BiometricService::new(shim, config);
///
///     service.initialize().await?;
///     let result = service.capture_fingerprint(CaptureOptions::default()).await?;
///     assert!(result.is_success());
///     assert_eq!(service.state(), ServiceState::Connected);
///
///     service.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct BiometricService<S: DriverShim> {
    shim: S,
    config: CaptureConfig,
    inner: Mutex<Inner>,
    handle: tokio::sync::Mutex<Option<S::Handle>>,
    state_tx: watch::Sender<ServiceState>,
    events: broadcast::Sender<DeviceEvent>,
}

impl<S: DriverShim> std::fmt::Debug for BiometricService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricService")
            .field("backend", &self.shim.backend())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<S: DriverShim> BiometricService<S> {
    pub fn new(shim: S, config: CaptureConfig) -> Self {
        let (state_tx, _) = watch::channel(ServiceState::Uninitialized);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            shim,
            config,
            inner: Mutex::new(Inner {
                machine: StateMachine::new(),
                active: None,
                stats: DeviceStats::default(),
                devices_found: 0,
                closing: false,
            }),
            handle: tokio::sync::Mutex::new(None),
            state_tx,
            events,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn backend(&self) -> &'static str {
        self.shim.backend()
    }

    /// Device connect/disconnect notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Watch the service state.
    pub fn watch_state(&self) -> watch::Receiver<ServiceState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ServiceState {
        self.lock_inner().machine.current()
    }

    /// Recent state transitions, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.lock_inner().machine.history().iter().cloned().collect()
    }

    pub fn is_connected(&self) -> bool {
        self.state().holds_device()
    }

    /// The active device, if any.
    pub fn device_info(&self) -> Option<DeviceInfo> {
        let inner = self.lock_inner();
        inner
            .active
            .as_ref()
            .map(|d| DeviceInfo::active(d, inner.stats.clone()))
    }

    pub fn status(&self) -> ServiceStatus {
        let inner = self.lock_inner();
        let state = inner.machine.current();
        ServiceStatus {
            state,
            connected: state.holds_device(),
            device: inner
                .active
                .as_ref()
                .map(|d| DeviceInfo::active(d, inner.stats.clone())),
            devices_found: inner.devices_found,
            backend: self.shim.backend().to_string(),
        }
    }

    /// Connect to the first allow-listed reader found.
    ///
    /// Re-running while connected releases the current reader and detects
    /// again.
    ///
    /// # Errors
    ///
    /// - [`HardwareError::NoDeviceFound`] when nothing matches; state becomes
    ///   `Disconnected`.
    /// - [`HardwareError::DeviceOpen`] when the OS refuses the device.
    /// - [`ServiceError::DeviceBusy`] while a capture is running.
    pub async fn initialize(&self) -> Result<DeviceDescriptor> {
        self.connect(None).await
    }

    /// Connect to the reader with this id.
    pub async fn connect_device(&self, id: DeviceId) -> Result<DeviceDescriptor> {
        self.connect(Some(id)).await
    }

    /// Enumerate attached readers, marking the active one.
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let found = self.shim.enumerate().await?;

        let mut inner = self.lock_inner();
        inner.devices_found = found.len();
        Ok(found
            .iter()
            .map(|d| match &inner.active {
                Some(active) if active == d => DeviceInfo::active(d, inner.stats.clone()),
                _ => DeviceInfo::from_descriptor(d),
            })
            .collect())
    }

    /// Run one capture on the active reader.
    ///
    /// Step failures (command, read, short template) come back as
    /// `Ok(CaptureResult::Failed)` with the state returned to `Connected`.
    /// A fatal transfer failure also releases the reader and leaves the
    /// service in `Failed`.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotInitialized`] when no reader is connected.
    /// - [`ServiceError::DeviceBusy`] when another capture is running.
    /// - [`ServiceError::DeviceNotActive`] when `options.device_id` names
    ///   another reader.
    pub async fn capture_fingerprint(&self, options: CaptureOptions) -> Result<CaptureResult> {
        let descriptor = self.begin_capture(&options)?;
        let mut guard = CaptureGuard::new(self);
        let quality = options
            .quality
            .unwrap_or(self.config.default_quality)
            .min(MAX_QUALITY);

        let mut slot = self.handle.lock().await;
        let Some(handle) = slot.as_mut() else {
            // State said Connected but no handle is held.
            guard.disarm();
            self.lock_inner().active = None;
            self.settle(ServiceState::Failed);
            return Err(ServiceError::NotInitialized);
        };

        let command = VendorCommand::begin_capture_with(
            self.config.begin_capture_opcode,
            self.config.begin_capture_payload.clone(),
            CaptureParams {
                quality,
                timeout: self.config.sdk_timeout,
            },
        );

        debug!(device_id = %descriptor.id(), quality, "Capture started");
        let outcome = self.run_capture(handle, &command).await;

        match outcome {
            Ok(bytes) => {
                {
                    let mut inner = self.lock_inner();
                    inner.stats.capture_count += 1;
                    inner.stats.consecutive_transfer_errors = 0;
                    inner.stats.last_used = Some(Utc::now());
                }
                guard.disarm();
                self.settle(ServiceState::Connected);
                info!(device_id = %descriptor.id(), bytes = bytes.len(), quality, "Fingerprint captured");
                Ok(CaptureResult::from_template(&bytes, quality))
            }
            Err(e) if e.is_fatal() => {
                let released = slot.take();
                drop(slot);
                {
                    let mut inner = self.lock_inner();
                    inner.stats.error_count += 1;
                    inner.active = None;
                }
                guard.disarm();
                self.settle(ServiceState::Failed);
                error!(device_id = %descriptor.id(), error = %e, "Capture failed, device released");

                if let Some(handle) = released {
                    if let Err(close_error) = self.shim.close(handle).await {
                        warn!(device_id = %descriptor.id(), error = %close_error, "Close after fatal error failed");
                    }
                }
                self.emit(DeviceEvent::Disconnected(descriptor));
                Ok(CaptureResult::failed(e.to_string()))
            }
            Err(e) => {
                let message = {
                    let mut inner = self.lock_inner();
                    inner.stats.error_count += 1;
                    inner.stats.last_used = Some(Utc::now());
                    self.failure_message(&mut inner.stats, &e)
                };
                guard.disarm();
                self.settle(ServiceState::Connected);
                warn!(device_id = %descriptor.id(), error = %e, "Capture failed");
                Ok(CaptureResult::failed(message))
            }
        }
    }

    /// Re-enumerate and reconcile with the active reader.
    ///
    /// Releases the reader if it left the bus. Does nothing while a capture
    /// or a connect is in flight.
    pub async fn check_presence(&self) -> Result<PresenceChange> {
        let found = self.shim.enumerate().await?;
        let Ok(mut slot) = self.handle.try_lock() else {
            return Ok(PresenceChange::Unchanged);
        };

        let removed = {
            let mut inner = self.lock_inner();
            inner.devices_found = found.len();

            let gone = inner.machine.current() == ServiceState::Connected
                && inner.active.as_ref().is_some_and(|d| !found.contains(d));
            if gone {
                if let Err(e) = inner.machine.transition_to(ServiceState::Disconnected) {
                    error!(error = %e, "Presence check transition rejected");
                }
                self.state_tx.send_replace(ServiceState::Disconnected);
                inner.active.take()
            } else {
                None
            }
        };

        if let Some(descriptor) = removed {
            if let Some(handle) = slot.take() {
                if let Err(e) = self.shim.close(handle).await {
                    debug!(device_id = %descriptor.id(), error = %e, "Close of removed device failed");
                }
            }
            warn!(device_id = %descriptor.id(), "Device removed");
            self.emit(DeviceEvent::Disconnected(descriptor.clone()));
            return Ok(PresenceChange::Removed(descriptor));
        }

        let state = self.state();
        if !state.holds_device() && state != ServiceState::Detecting && !found.is_empty() {
            return Ok(PresenceChange::Available(found));
        }
        Ok(PresenceChange::Unchanged)
    }

    /// Release the reader and end in `Disconnected`.
    ///
    /// Waits for an in-flight capture to finish first. Safe to call any
    /// number of times.
    pub async fn shutdown(&self) {
        let _closing = ClosingGuard::new(self);

        let mut state_rx = self.state_tx.subscribe();
        let idle = state_rx
            .wait_for(|s| *s != ServiceState::Capturing)
            .await
            .map(|_| ());
        if idle.is_err() {
            warn!("State channel closed during shutdown");
        }

        let mut slot = self.handle.lock().await;
        let released = slot.take();
        let descriptor = {
            let mut inner = self.lock_inner();
            if let Some(transition) = inner.machine.reset_to(ServiceState::Disconnected) {
                debug!(from = %transition.from, "Shutdown reset state");
            }
            inner.active.take()
        };
        self.state_tx.send_replace(ServiceState::Disconnected);

        if let Some(handle) = released {
            if let Err(e) = self.shim.close(handle).await {
                warn!(error = %e, "Close during shutdown failed");
            }
        }
        drop(slot);

        if let Some(descriptor) = descriptor {
            info!(device_id = %descriptor.id(), "Device released");
            self.emit(DeviceEvent::Disconnected(descriptor));
        }
    }

    async fn connect(&self, selector: Option<DeviceId>) -> Result<DeviceDescriptor> {
        self.begin_detecting()?;

        let mut slot = self.handle.lock().await;
        let previous = {
            let mut inner = self.lock_inner();
            inner.active.take()
        };
        if let Some(handle) = slot.take() {
            if let Err(e) = self.shim.close(handle).await {
                warn!(error = %e, "Close of previous device failed");
            }
        }
        if let Some(previous) = previous {
            self.emit(DeviceEvent::Disconnected(previous));
        }

        match self.detect_and_open(selector).await {
            Ok((handle, descriptor)) => {
                *slot = Some(handle);
                {
                    let mut inner = self.lock_inner();
                    inner.active = Some(descriptor.clone());
                    inner.stats = DeviceStats::connected_now();
                }
                self.settle(ServiceState::Connected);
                drop(slot);

                info!(device_id = %descriptor.id(), name = %descriptor.display_name, "Device connected");
                self.emit(DeviceEvent::Connected(descriptor.clone()));
                Ok(descriptor)
            }
            Err(e) => {
                self.settle(ServiceState::Disconnected);
                warn!(error = %e, "Device detection failed");
                Err(e)
            }
        }
    }

    async fn detect_and_open(&self, selector: Option<DeviceId>) -> Result<(S::Handle, DeviceDescriptor)> {
        let found = self.shim.enumerate().await?;
        self.lock_inner().devices_found = found.len();
        debug!(count = found.len(), "Enumerated readers");

        let descriptor = match selector {
            Some(id) => found.into_iter().find(|d| d.id() == id),
            None => found.into_iter().next(),
        }
        .ok_or(HardwareError::NoDeviceFound)?;

        let handle = self.shim.open(&descriptor).await?;
        Ok((handle, descriptor))
    }

    async fn run_capture(
        &self,
        handle: &mut S::Handle,
        command: &VendorCommand,
    ) -> std::result::Result<Vec<u8>, HardwareError> {
        self.shim.send_command(handle, command).await?;
        tokio::time::sleep(self.config.settle).await;
        let bytes = self.shim.read_template(handle, self.config.read_buffer_bytes).await?;
        validate_template_len(&bytes, self.config.min_template_bytes)?;
        Ok(bytes)
    }

    fn failure_message(&self, stats: &mut DeviceStats, error: &HardwareError) -> String {
        match error {
            HardwareError::ShortRead { .. } => SHORT_READ_MESSAGE.to_string(),
            e if e.is_recoverable_transfer() => {
                stats.consecutive_transfer_errors += 1;
                if stats.consecutive_transfer_errors >= self.config.unstable_after {
                    UNSTABLE_DEVICE_MESSAGE.to_string()
                } else {
                    e.to_string()
                }
            }
            e => e.to_string(),
        }
    }

    /// Connected → Capturing in one step, or say why not.
    fn begin_capture(&self, options: &CaptureOptions) -> Result<DeviceDescriptor> {
        let mut inner = self.lock_inner();
        if inner.closing {
            return Err(ServiceError::NotInitialized);
        }

        match inner.machine.current() {
            ServiceState::Capturing => return Err(ServiceError::DeviceBusy),
            ServiceState::Connected => {}
            _ => return Err(ServiceError::NotInitialized),
        }

        let descriptor = inner.active.clone().ok_or(ServiceError::NotInitialized)?;
        if let Some(requested) = options.device_id {
            if requested != descriptor.id() {
                return Err(ServiceError::DeviceNotActive {
                    requested: requested.to_string(),
                });
            }
        }

        inner.machine.transition_to(ServiceState::Capturing)?;
        self.state_tx.send_replace(ServiceState::Capturing);
        Ok(descriptor)
    }

    fn begin_detecting(&self) -> Result<()> {
        let mut inner = self.lock_inner();
        if inner.closing {
            return Err(ServiceError::DeviceBusy);
        }

        match inner.machine.current() {
            ServiceState::Capturing | ServiceState::Detecting => Err(ServiceError::DeviceBusy),
            _ => {
                inner.machine.transition_to(ServiceState::Detecting)?;
                self.state_tx.send_replace(ServiceState::Detecting);
                Ok(())
            }
        }
    }

    /// Apply a transition that is valid by construction.
    fn settle(&self, target: ServiceState) {
        let mut inner = self.lock_inner();
        match inner.machine.transition_to(target) {
            Ok(transition) => debug!(from = %transition.from, to = %transition.to, "State changed"),
            Err(e) => {
                // Shutdown may already have reset the machine underneath us.
                debug!(error = %e, "Transition skipped");
                return;
            }
        }
        self.state_tx.send_replace(target);
    }

    fn emit(&self, event: DeviceEvent) {
        // No subscribers is fine; the host may not have attached a UI yet.
        let _ = self.events.send(event);
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Puts the machine back to `Connected` if a capture future is dropped
/// before it settles. The handle stays in its slot.
struct CaptureGuard<'a, S: DriverShim> {
    service: &'a BiometricService<S>,
    armed: bool,
}

impl<'a, S: DriverShim> CaptureGuard<'a, S> {
    fn new(service: &'a BiometricService<S>) -> Self {
        Self { service, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<S: DriverShim> Drop for CaptureGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Capture abandoned before completion");
            self.service.settle(ServiceState::Connected);
        }
    }
}

/// Holds off new captures and connects while a shutdown runs, including one
/// whose future is dropped part-way.
struct ClosingGuard<'a, S: DriverShim> {
    service: &'a BiometricService<S>,
}

impl<'a, S: DriverShim> ClosingGuard<'a, S> {
    fn new(service: &'a BiometricService<S>) -> Self {
        service.lock_inner().closing = true;
        Self { service }
    }
}

impl<S: DriverShim> Drop for ClosingGuard<'_, S> {
    fn drop(&mut self) {
        self.service.lock_inner().closing = false;
    }
}
