//! Read-only snapshots handed to the host and the UI.

use bioscan_core::{DeviceDescriptor, DeviceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::ServiceState;

/// Usage counters for the active device. Reset on every new connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStats {
    pub capture_count: u64,
    pub error_count: u64,
    pub consecutive_transfer_errors: u32,
    pub connected_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
}

impl DeviceStats {
    pub(crate) fn connected_now() -> Self {
        Self {
            connected_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// A reader as reported to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub vendor_name: Option<String>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub display_name: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DeviceStats>,
}

impl DeviceInfo {
    pub fn from_descriptor(descriptor: &DeviceDescriptor) -> Self {
        Self {
            id: descriptor.id(),
            vendor_name: descriptor.vendor_name().map(str::to_string),
            vendor_id: descriptor.vendor_id,
            product_id: descriptor.product_id,
            display_name: descriptor.display_name.clone(),
            is_active: false,
            stats: None,
        }
    }

    pub(crate) fn active(descriptor: &DeviceDescriptor, stats: DeviceStats) -> Self {
        Self {
            is_active: true,
            stats: Some(stats),
            ..Self::from_descriptor(descriptor)
        }
    }
}

/// Service snapshot for `biometric.getStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
    pub devices_found: usize,
    pub backend: String,
}

/// Outcome of a presence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// Nothing the service needs to act on.
    Unchanged,
    /// The active reader left the bus and was released.
    Removed(DeviceDescriptor),
    /// No reader is held but these are attached.
    Available(Vec<DeviceDescriptor>),
}
