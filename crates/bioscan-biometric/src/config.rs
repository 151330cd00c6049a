//! Capture tuning.

use std::time::Duration;

use bioscan_core::DeviceId;
use bioscan_core::constants::{
    BEGIN_CAPTURE_OPCODE, BEGIN_CAPTURE_PAYLOAD, DEFAULT_QUALITY, DEFAULT_READ_BUFFER_BYTES,
    DEFAULT_SDK_TIMEOUT_MS, DEFAULT_SETTLE_MS, DEFAULT_UNSTABLE_AFTER, MIN_TEMPLATE_BYTES,
};

/// How the service drives a capture.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use bioscan_biometric::CaptureConfig;
///
/// let config = CaptureConfig {
///     settle: Duration::from_millis(1500),
///     ..CaptureConfig::default()
/// };
/// assert_eq!(config.read_buffer_bytes, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Wait between arming the sensor and reading the template.
    pub settle: Duration,
    /// Size of the buffer handed to the data endpoint.
    pub read_buffer_bytes: usize,
    /// Shorter reads are rejected as not a fingerprint.
    pub min_template_bytes: usize,
    /// Quality threshold when the request does not name one.
    pub default_quality: u8,
    /// Timeout passed to SDK-style capture calls.
    pub sdk_timeout: Duration,
    /// Consecutive recoverable transfer errors before the device is called unstable.
    pub unstable_after: u32,
    /// Control request that arms the sensor.
    pub begin_capture_opcode: u8,
    /// Data stage sent with the arming request.
    pub begin_capture_payload: Vec<u8>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            min_template_bytes: MIN_TEMPLATE_BYTES,
            default_quality: DEFAULT_QUALITY,
            sdk_timeout: Duration::from_millis(u64::from(DEFAULT_SDK_TIMEOUT_MS)),
            unstable_after: DEFAULT_UNSTABLE_AFTER,
            begin_capture_opcode: BEGIN_CAPTURE_OPCODE,
            begin_capture_payload: BEGIN_CAPTURE_PAYLOAD.to_vec(),
        }
    }
}

/// Per-request capture options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Must name the active device when set.
    pub device_id: Option<DeviceId>,
    /// Quality threshold, 0 to 100.
    pub quality: Option<u8>,
}

impl CaptureOptions {
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: Some(quality),
            ..Self::default()
        }
    }
}
