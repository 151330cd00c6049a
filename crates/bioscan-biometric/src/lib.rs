//! Biometric service for the bioscan host.
//!
//! [`BiometricService`] owns exactly one reader lifecycle on top of any
//! [`DriverShim`](bioscan_hardware::DriverShim): detection, the capture
//! protocol (arm → settle → read → validate → encode), release on shutdown
//! and on unplug, and connect/disconnect notifications.
//!
//! Every operation is serialized through a [`StateMachine`]; see
//! [`service`] for the lifecycle diagram.

pub mod config;
pub mod error;
pub mod events;
pub mod service;
pub mod state_machine;
pub mod status;

pub use config::{CaptureConfig, CaptureOptions};
pub use error::{Result, ServiceError};
pub use events::DeviceEvent;
pub use service::BiometricService;
pub use state_machine::{ServiceState, StateMachine, StateTransition};
pub use status::{DeviceInfo, DeviceStats, PresenceChange, ServiceStatus};
