//! Shared vocabulary for the bioscan fingerprint-capture host.
//!
//! This crate carries the types that cross every layer of the system: the
//! USB device descriptor and its textual id, the vendor allow-list, the
//! capture result handed back to the UI, and the error kind taxonomy used on
//! the bridge wire. It has no I/O of its own.
//!
//! ```
//! use bioscan_core::{CaptureResult, DeviceDescriptor};
//!
//! let descriptor = DeviceDescriptor::new(0x096e, 0x0001, "SecuGen Hamster");
//! assert_eq!(descriptor.id().to_string(), "0x096e_0x0001");
//! assert!(descriptor.is_allowed());
//!
//! let result = CaptureResult::from_template(&[0xAB; 64], 70);
//! assert!(result.is_success());
//! ```

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{CaptureResult, DeviceDescriptor, DeviceId, VendorEntry};
