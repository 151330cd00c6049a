//! Enum wrapper for driver shim dispatch.
//!
//! Native `async fn` in traits is not object-safe, so the backend chosen at
//! startup is carried as an [`AnyShim`] variant instead of a `Box<dyn _>`.
//! Each variant pairs with the matching [`AnyHandle`] variant; handing a shim
//! a handle from another backend is reported as unsupported.
//!
//! ```
//! use bioscan_core::DeviceDescriptor;
//! use bioscan_hardware::devices::AnyShim;
//! use bioscan_hardware::mock::MockShim;
//! use bioscan_hardware::DriverShim;
//!
//! #[tokio::main]
//! async fn main() -> bioscan_hardware::Result<()> {
//!     let (mock, handle) = MockShim::new();
//!     handle.attach(DeviceDescriptor::new(0x1162, 0x0320, "Futronic FS88"));
//!
//!     let shim = AnyShim::Mock(mock);
//!     assert_eq!(shim.backend(), "mock");
//!     assert_eq!(shim.enumerate().await?.len(), 1);
//!     Ok(())
//! }
//! ```

use bioscan_core::DeviceDescriptor;

use crate::command::VendorCommand;
use crate::error::{HardwareError, Result};
use crate::mock::{MockDeviceHandle, MockShim};
use crate::sdk::{NativeSdkShim, SdkSession};
use crate::traits::DriverShim;
#[cfg(feature = "usb")]
use crate::usb::{UsbHandle, UsbShim};

/// Driver shim selected at startup.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyShim {
    /// Generic USB transport.
    #[cfg(feature = "usb")]
    Usb(UsbShim),
    /// Vendor SDK adapter.
    NativeSdk(NativeSdkShim),
    /// Scripted mock for development and tests.
    Mock(MockShim),
}

/// Device handle produced by an [`AnyShim`].
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyHandle {
    #[cfg(feature = "usb")]
    Usb(UsbHandle),
    NativeSdk(SdkSession),
    Mock(MockDeviceHandle),
}

impl AnyHandle {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        match self {
            #[cfg(feature = "usb")]
            Self::Usb(handle) => handle.descriptor(),
            Self::NativeSdk(handle) => handle.descriptor(),
            Self::Mock(handle) => handle.descriptor(),
        }
    }
}

fn mismatched() -> HardwareError {
    HardwareError::unsupported("device handle belongs to a different backend")
}

impl DriverShim for AnyShim {
    type Handle = AnyHandle;

    fn backend(&self) -> &'static str {
        match self {
            #[cfg(feature = "usb")]
            Self::Usb(shim) => shim.backend(),
            Self::NativeSdk(shim) => shim.backend(),
            Self::Mock(shim) => shim.backend(),
        }
    }

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        match self {
            #[cfg(feature = "usb")]
            Self::Usb(shim) => shim.enumerate().await,
            Self::NativeSdk(shim) => shim.enumerate().await,
            Self::Mock(shim) => shim.enumerate().await,
        }
    }

    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<AnyHandle> {
        match self {
            #[cfg(feature = "usb")]
            Self::Usb(shim) => shim.open(descriptor).await.map(AnyHandle::Usb),
            Self::NativeSdk(shim) => shim.open(descriptor).await.map(AnyHandle::NativeSdk),
            Self::Mock(shim) => shim.open(descriptor).await.map(AnyHandle::Mock),
        }
    }

    async fn send_command(&self, handle: &mut AnyHandle, command: &VendorCommand) -> Result<()> {
        match (self, handle) {
            #[cfg(feature = "usb")]
            (Self::Usb(shim), AnyHandle::Usb(handle)) => shim.send_command(handle, command).await,
            (Self::NativeSdk(shim), AnyHandle::NativeSdk(handle)) => {
                shim.send_command(handle, command).await
            }
            (Self::Mock(shim), AnyHandle::Mock(handle)) => shim.send_command(handle, command).await,
            #[allow(unreachable_patterns)]
            _ => Err(mismatched()),
        }
    }

    async fn read_template(&self, handle: &mut AnyHandle, max_bytes: usize) -> Result<Vec<u8>> {
        match (self, handle) {
            #[cfg(feature = "usb")]
            (Self::Usb(shim), AnyHandle::Usb(handle)) => shim.read_template(handle, max_bytes).await,
            (Self::NativeSdk(shim), AnyHandle::NativeSdk(handle)) => {
                shim.read_template(handle, max_bytes).await
            }
            (Self::Mock(shim), AnyHandle::Mock(handle)) => shim.read_template(handle, max_bytes).await,
            #[allow(unreachable_patterns)]
            _ => Err(mismatched()),
        }
    }

    async fn close(&self, handle: AnyHandle) -> Result<()> {
        match (self, handle) {
            #[cfg(feature = "usb")]
            (Self::Usb(shim), AnyHandle::Usb(handle)) => shim.close(handle).await,
            (Self::NativeSdk(shim), AnyHandle::NativeSdk(handle)) => shim.close(handle).await,
            (Self::Mock(shim), AnyHandle::Mock(handle)) => shim.close(handle).await,
            #[allow(unreachable_patterns)]
            _ => Err(mismatched()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CaptureParams;

    fn suprema() -> DeviceDescriptor {
        DeviceDescriptor::new(0x0c2c, 0x2000, "Suprema BioMini")
    }

    #[tokio::test]
    async fn test_mock_variant_dispatch() {
        let (mock, handle) = MockShim::with_devices([suprema()]);
        handle.queue_read(vec![9u8; 120]);
        let shim = AnyShim::Mock(mock);

        let mut device = shim.open(&suprema()).await.unwrap();
        assert_eq!(device.descriptor(), &suprema());

        shim.send_command(&mut device, &VendorCommand::begin_capture(CaptureParams::default()))
            .await
            .unwrap();
        let bytes = shim.read_template(&mut device, 1024).await.unwrap();
        assert_eq!(bytes.len(), 120);
        shim.close(device).await.unwrap();

        assert_eq!(handle.commands().len(), 1);
        assert_eq!(handle.open_handles(), 0);
    }
}
