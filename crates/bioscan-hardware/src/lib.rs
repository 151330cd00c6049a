//! Device driver shim for USB fingerprint readers.
//!
//! This crate hides how a reader is driven behind the [`DriverShim`] trait:
//!
//! - [`usb::UsbShim`] talks raw libusb transfers to readers with an open
//!   vendor protocol (feature `usb`, on by default).
//! - [`sdk::NativeSdkShim`] wraps a blocking vendor SDK such as the Mantra
//!   MFS100 library (linked with feature `vendor-sdk`).
//! - [`mock::MockShim`] is a scriptable stand-in for development and tests.
//!
//! The host picks one at startup and wraps it in [`AnyShim`].
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] with a
//! [`HardwareError`]. Transfer failures carry a [`TransferFailure`] that
//! tells the caller whether the handle survived.
//!
//! # Thread Safety
//!
//! Shims are `Send + Sync`; handles are `Send` and owned by exactly one
//! caller at a time.

pub mod command;
pub mod devices;
pub mod error;
pub mod mock;
pub mod sdk;
pub mod traits;
#[cfg(feature = "usb")]
pub mod usb;

pub use command::{CaptureParams, VendorCommand};
pub use devices::{AnyHandle, AnyShim};
pub use error::{HardwareError, Result, TransferFailure, validate_template_len};
pub use mock::{MockShim, MockShimHandle};
pub use sdk::{NativeSdkShim, VendorSdk};
pub use traits::DriverShim;
