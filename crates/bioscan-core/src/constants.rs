//! Capture protocol defaults and the reader vendor allow-list.
//!
//! These values describe the reference capture exchange:
//!
//! ```text
//! host  --control OUT (opcode 0x01, payload [0x00, 0x01])-->  reader
//! host  ... settle 3000 ms (finger placement, sensor exposure) ...
//! host  <--bulk/interrupt IN (up to 1024 bytes)-------------  reader
//! ```
//!
//! Everything except the allow-list can be overridden through the host
//! configuration; the constants here are the defaults it falls back to.
//!
//! ```
//! use bioscan_core::constants::*;
//!
//! assert!(MIN_TEMPLATE_BYTES < DEFAULT_READ_BUFFER_BYTES);
//! assert_eq!(vendor_name(0x2c0f), Some("BioMiKey"));
//! ```

use crate::types::VendorEntry;

// ============================================================================
// Vendor allow-list
// ============================================================================

/// SecuGen (Hamster family).
pub const VENDOR_SECUGEN: u16 = 0x096e;

/// Futronic (FS80/FS88).
pub const VENDOR_FUTRONIC: u16 = 0x1162;

/// NITGEN (eNBioScan).
pub const VENDOR_NITGEN: u16 = 0x0483;

/// Suprema (BioMini).
pub const VENDOR_SUPREMA: u16 = 0x0c2c;

/// BioMiKey / Mantra MFS100.
pub const VENDOR_BIOMIKEY: u16 = 0x2c0f;

/// Readers the host is willing to open. Not editable at runtime.
pub const VENDOR_ALLOW_LIST: [VendorEntry; 5] = [
    VendorEntry::new("SecuGen", VENDOR_SECUGEN),
    VendorEntry::new("Futronic", VENDOR_FUTRONIC),
    VendorEntry::new("NITGEN", VENDOR_NITGEN),
    VendorEntry::new("Suprema", VENDOR_SUPREMA),
    VendorEntry::new("BioMiKey", VENDOR_BIOMIKEY),
];

/// Look up the vendor name for an allow-listed vendor id.
pub fn vendor_name(vendor_id: u16) -> Option<&'static str> {
    VENDOR_ALLOW_LIST
        .iter()
        .find(|entry| entry.vendor_id == vendor_id)
        .map(|entry| entry.name)
}

/// Whether a vendor id is on the allow-list.
pub fn is_allowed_vendor(vendor_id: u16) -> bool {
    vendor_name(vendor_id).is_some()
}

// ============================================================================
// Capture protocol
// ============================================================================

/// USB interface claimed on open.
pub const DEFAULT_INTERFACE: u8 = 0;

/// Vendor control request that arms the sensor.
pub const BEGIN_CAPTURE_OPCODE: u8 = 0x01;

/// Payload sent with [`BEGIN_CAPTURE_OPCODE`].
pub const BEGIN_CAPTURE_PAYLOAD: [u8; 2] = [0x00, 0x01];

/// Time between arming the sensor and reading the template.
pub const DEFAULT_SETTLE_MS: u64 = 3000;

/// Buffer handed to the IN endpoint read.
pub const DEFAULT_READ_BUFFER_BYTES: usize = 1024;

/// Reads shorter than this are not a fingerprint.
pub const MIN_TEMPLATE_BYTES: usize = 50;

/// Timeout applied to each individual USB transfer.
pub const DEFAULT_TRANSFER_TIMEOUT_MS: u64 = 5000;

// ============================================================================
// Quality
// ============================================================================

/// Quality threshold used when a request does not name one.
pub const DEFAULT_QUALITY: u8 = 70;

/// Upper bound of the quality scale.
pub const MAX_QUALITY: u8 = 100;

// ============================================================================
// Native SDK
// ============================================================================

/// Timeout passed to the SDK capture routine.
pub const DEFAULT_SDK_TIMEOUT_MS: u32 = 5000;

/// Output buffer size the SDK capture routine expects.
pub const SDK_TEMPLATE_BUFFER_BYTES: usize = 5120;

// ============================================================================
// Service
// ============================================================================

/// Consecutive recoverable transfer failures before a device is reported unstable.
pub const DEFAULT_UNSTABLE_AFTER: u32 = 3;

/// Error text for a capture that produced too few bytes.
pub const SHORT_READ_MESSAGE: &str = "Invalid fingerprint captured";

/// Error text once a device keeps failing transfers.
pub const UNSTABLE_DEVICE_MESSAGE: &str = "Device unstable, reconnect";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allow_list_has_unique_vendor_ids() {
        let ids: HashSet<u16> = VENDOR_ALLOW_LIST.iter().map(|v| v.vendor_id).collect();
        assert_eq!(ids.len(), VENDOR_ALLOW_LIST.len());
    }

    #[test]
    fn test_vendor_lookup() {
        assert_eq!(vendor_name(VENDOR_SECUGEN), Some("SecuGen"));
        assert_eq!(vendor_name(VENDOR_SUPREMA), Some("Suprema"));
        assert_eq!(vendor_name(0x046d), None);
        assert!(is_allowed_vendor(VENDOR_NITGEN));
        assert!(!is_allowed_vendor(0x0000));
    }

    #[test]
    fn test_protocol_defaults_are_consistent() {
        assert!(MIN_TEMPLATE_BYTES < DEFAULT_READ_BUFFER_BYTES);
        assert!(DEFAULT_QUALITY <= MAX_QUALITY);
        assert_eq!(BEGIN_CAPTURE_PAYLOAD, [0x00, 0x01]);
    }
}
