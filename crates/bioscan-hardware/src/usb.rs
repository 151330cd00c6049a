//! Generic USB transport over libusb.
//!
//! Readers on the allow-list that speak the plain vendor protocol (control
//! OUT to arm, bulk or interrupt IN to collect) are driven here. libusb calls
//! block, so each one runs on tokio's blocking pool and surfaces as a single
//! `.await`.

use std::sync::Arc;
use std::time::Duration;

use bioscan_core::DeviceDescriptor;
use bioscan_core::constants::{DEFAULT_INTERFACE, DEFAULT_TRANSFER_TIMEOUT_MS, is_allowed_vendor};
use rusb::{Direction, GlobalContext, Recipient, RequestType, TransferType, UsbContext};
use tracing::{debug, info, warn};

use crate::command::VendorCommand;
use crate::error::{HardwareError, Result, TransferFailure};
use crate::traits::DriverShim;

/// Settings for the USB transport.
#[derive(Debug, Clone)]
pub struct UsbConfig {
    /// Interface number claimed on open.
    pub interface: u8,
    /// Timeout for each control or data transfer.
    pub transfer_timeout: Duration,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE,
            transfer_timeout: Duration::from_millis(DEFAULT_TRANSFER_TIMEOUT_MS),
        }
    }
}

/// Readable endpoint found on the claimed interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InEndpoint {
    pub address: u8,
    pub transfer_type: TransferType,
}

/// An opened reader with its interface claimed.
pub struct UsbHandle {
    device: Arc<rusb::DeviceHandle<GlobalContext>>,
    descriptor: DeviceDescriptor,
    interface: u8,
    endpoint: Option<InEndpoint>,
}

impl UsbHandle {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn endpoint(&self) -> Option<InEndpoint> {
        self.endpoint
    }
}

impl std::fmt::Debug for UsbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbHandle")
            .field("device", &self.descriptor.id())
            .field("interface", &self.interface)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Driver shim backed by libusb.
#[derive(Debug, Clone, Default)]
pub struct UsbShim {
    config: UsbConfig,
}

impl UsbShim {
    pub fn new(config: UsbConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UsbConfig {
        &self.config
    }
}

/// Map a libusb transfer error onto the shim's failure classes.
pub fn classify_transfer_error(error: rusb::Error) -> TransferFailure {
    match error {
        rusb::Error::Pipe => TransferFailure::Stall,
        rusb::Error::Overflow => TransferFailure::Babble,
        rusb::Error::Timeout => TransferFailure::Timeout,
        rusb::Error::NoDevice => TransferFailure::Disconnected,
        _ => TransferFailure::Other,
    }
}

fn transfer_error(error: rusb::Error) -> HardwareError {
    HardwareError::transfer(classify_transfer_error(error), error.to_string())
}

fn join_error(error: tokio::task::JoinError) -> HardwareError {
    HardwareError::transfer(TransferFailure::Other, format!("transfer task failed: {error}"))
}

fn find_in_endpoint<T: UsbContext>(device: &rusb::Device<T>, interface: u8) -> Option<InEndpoint> {
    let config = device.active_config_descriptor().ok()?;

    for iface in config.interfaces().filter(|i| i.number() == interface) {
        for alt in iface.descriptors() {
            for ep in alt.endpoint_descriptors() {
                if ep.direction() == Direction::In
                    && matches!(ep.transfer_type(), TransferType::Bulk | TransferType::Interrupt)
                {
                    return Some(InEndpoint {
                        address: ep.address(),
                        transfer_type: ep.transfer_type(),
                    });
                }
            }
        }
    }

    None
}

fn scan_allowed() -> Result<Vec<DeviceDescriptor>> {
    let devices = rusb::devices().map_err(transfer_error)?;
    let mut found = Vec::new();

    for device in devices.iter() {
        let Ok(desc) = device.device_descriptor() else {
            continue;
        };
        if is_allowed_vendor(desc.vendor_id()) {
            found.push(DeviceDescriptor::from_ids(desc.vendor_id(), desc.product_id()));
        }
    }

    Ok(found)
}

fn open_blocking(descriptor: DeviceDescriptor, interface: u8) -> Result<UsbHandle> {
    let id = descriptor.id();
    let devices = rusb::devices().map_err(|e| HardwareError::device_open(id, e.to_string()))?;

    let device = devices
        .iter()
        .find(|d| {
            d.device_descriptor().is_ok_and(|desc| {
                desc.vendor_id() == descriptor.vendor_id && desc.product_id() == descriptor.product_id
            })
        })
        .ok_or_else(|| HardwareError::device_open(id, "device is no longer attached"))?;

    let mut handle = device
        .open()
        .map_err(|e| HardwareError::device_open(id, e.to_string()))?;

    // Not supported on every platform; claiming still works without it.
    if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
        debug!(device_id = %id, error = %e, "Kernel driver auto-detach unavailable");
    }

    handle
        .claim_interface(interface)
        .map_err(|e| HardwareError::device_open(id, format!("claim interface {interface}: {e}")))?;

    let endpoint = find_in_endpoint(&device, interface);
    if endpoint.is_none() {
        warn!(device_id = %id, interface, "No bulk or interrupt IN endpoint on claimed interface");
    }

    Ok(UsbHandle {
        device: Arc::new(handle),
        descriptor,
        interface,
        endpoint,
    })
}

impl DriverShim for UsbShim {
    type Handle = UsbHandle;

    fn backend(&self) -> &'static str {
        "usb"
    }

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let found = tokio::task::spawn_blocking(scan_allowed)
            .await
            .map_err(join_error)??;
        debug!(count = found.len(), "USB scan complete");
        Ok(found)
    }

    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<UsbHandle> {
        let descriptor = descriptor.clone();
        let interface = self.config.interface;
        let id = descriptor.id();

        let handle = tokio::task::spawn_blocking(move || open_blocking(descriptor, interface))
            .await
            .map_err(|e| HardwareError::device_open(id, e.to_string()))??;

        info!(device_id = %id, interface, "USB device opened");
        Ok(handle)
    }

    async fn send_command(&self, handle: &mut UsbHandle, command: &VendorCommand) -> Result<()> {
        let device = Arc::clone(&handle.device);
        let command = command.clone();
        let timeout = self.config.transfer_timeout;
        let request_type = rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device);

        let written = tokio::task::spawn_blocking(move || {
            device.write_control(
                request_type,
                command.request,
                command.value,
                command.index,
                &command.payload,
                timeout,
            )
        })
        .await
        .map_err(join_error)?
        .map_err(transfer_error)?;

        debug!(device_id = %handle.descriptor.id(), written, "Control transfer complete");
        Ok(())
    }

    async fn read_template(&self, handle: &mut UsbHandle, max_bytes: usize) -> Result<Vec<u8>> {
        let endpoint = handle.endpoint.ok_or_else(|| {
            HardwareError::transfer(
                TransferFailure::NoEndpoint,
                format!("interface {} has no readable endpoint", handle.interface),
            )
        })?;
        let device = Arc::clone(&handle.device);
        let timeout = self.config.transfer_timeout;

        let bytes = tokio::task::spawn_blocking(move || {
            let mut buffer = vec![0u8; max_bytes];
            let read = match endpoint.transfer_type {
                TransferType::Interrupt => device.read_interrupt(endpoint.address, &mut buffer, timeout),
                _ => device.read_bulk(endpoint.address, &mut buffer, timeout),
            }?;
            buffer.truncate(read);
            Ok::<_, rusb::Error>(buffer)
        })
        .await
        .map_err(join_error)?
        .map_err(transfer_error)?;

        debug!(device_id = %handle.descriptor.id(), bytes = bytes.len(), "Data transfer complete");
        Ok(bytes)
    }

    async fn close(&self, handle: UsbHandle) -> Result<()> {
        let id = handle.descriptor.id();
        let interface = handle.interface;
        let device = handle.device;

        tokio::task::spawn_blocking(move || match Arc::try_unwrap(device) {
            Ok(mut device) => {
                if let Err(e) = device.release_interface(interface) {
                    // Already gone from the bus; dropping the handle is all that is left.
                    debug!(device_id = %id, error = %e, "Release interface failed");
                }
            }
            Err(_) => debug!(device_id = %id, "Handle still shared, interface released on drop"),
        })
        .await
        .map_err(join_error)?;

        info!(device_id = %id, "USB device closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(rusb::Error::Pipe, TransferFailure::Stall)]
    #[case(rusb::Error::Overflow, TransferFailure::Babble)]
    #[case(rusb::Error::Timeout, TransferFailure::Timeout)]
    #[case(rusb::Error::NoDevice, TransferFailure::Disconnected)]
    #[case(rusb::Error::Io, TransferFailure::Other)]
    fn test_classify_transfer_error(#[case] error: rusb::Error, #[case] expected: TransferFailure) {
        assert_eq!(classify_transfer_error(error), expected);
    }

    #[test]
    fn test_stall_is_fatal_after_mapping() {
        assert!(transfer_error(rusb::Error::Pipe).is_fatal());
        assert!(!transfer_error(rusb::Error::Timeout).is_fatal());
    }

    #[test]
    fn test_default_config() {
        let shim = UsbShim::default();
        assert_eq!(shim.config().interface, 0);
        assert_eq!(shim.config().transfer_timeout, Duration::from_secs(5));
        assert_eq!(shim.backend(), "usb");
    }
}
