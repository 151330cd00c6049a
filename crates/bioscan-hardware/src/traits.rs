//! The driver shim contract.
//!
//! A shim turns one way of talking to a reader (raw USB transfers, a vendor
//! SDK, a scripted mock) into the same five operations. Methods use native
//! `async fn` (Edition 2024 RPITIT), so the trait is dispatched through
//! [`AnyShim`](crate::devices::AnyShim) rather than `dyn`.

#![allow(async_fn_in_trait)]

use bioscan_core::DeviceDescriptor;

use crate::command::VendorCommand;
use crate::error::Result;

/// Transport to a fingerprint reader.
///
/// Each blocking transfer is exposed as exactly one `.await`; shims run the
/// blocking call on tokio's blocking pool so the runtime is never stalled.
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// opaque futures. Use generics or [`AnyShim`](crate::devices::AnyShim).
///
/// # Examples
///
/// ```
/// use bioscan_hardware::{CaptureParams, DriverShim, Result, VendorCommand};
///
/// async fn grab<S: DriverShim>(shim: &S) -> Result<Vec<u8>> {
///     let descriptor = shim
///         .enumerate()
///         .await?
///         .into_iter()
///         .next()
///         .ok_or(bioscan_hardware::HardwareError::NoDeviceFound)?;
///
///     let mut handle = shim.open(&descriptor).await?;
///     shim.send_command(&mut handle, &VendorCommand::begin_capture(CaptureParams::default()))
///         .await?;
///     let bytes = shim.read_template(&mut handle, 1024).await;
///     shim.close(handle).await?;
///     bytes
/// }
/// ```
pub trait DriverShim: Send + Sync {
    /// Exclusive ownership of an opened, interface-claimed device.
    type Handle: Send + 'static;

    /// Short backend name used in status reports and logs.
    fn backend(&self) -> &'static str;

    /// Scan attached devices and keep those on the vendor allow-list.
    ///
    /// Every call rescans; order follows the bus and may change between calls.
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>>;

    /// Open the device and claim its interface.
    ///
    /// # Errors
    ///
    /// [`HardwareError::DeviceOpen`](crate::HardwareError::DeviceOpen) when
    /// the OS denies access or the descriptor no longer matches a device.
    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<Self::Handle>;

    /// Issue a vendor control transfer.
    async fn send_command(&self, handle: &mut Self::Handle, command: &VendorCommand) -> Result<()>;

    /// Read the captured template.
    ///
    /// The USB and mock backends return at most `max_bytes`. SDK
    /// backends return the vendor's fixed block, which is never smaller
    /// than `max_bytes`.
    async fn read_template(&self, handle: &mut Self::Handle, max_bytes: usize) -> Result<Vec<u8>>;

    /// Release the interface and drop the OS handle.
    async fn close(&self, handle: Self::Handle) -> Result<()>;
}
