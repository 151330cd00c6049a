//! Scriptable shim for development and tests.
//!
//! The shim runs without any hardware; a cloneable handle decides what the
//! "bus" contains and what each transfer returns.

pub mod shim;

pub use shim::{MockDeviceHandle, MockShim, MockShimHandle};
