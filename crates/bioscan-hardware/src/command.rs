//! Vendor control commands sent to a reader.

use std::time::Duration;

use bioscan_core::constants::{
    BEGIN_CAPTURE_OPCODE, BEGIN_CAPTURE_PAYLOAD, DEFAULT_QUALITY, DEFAULT_SDK_TIMEOUT_MS,
};

/// Parameters a capture-arming command carries for backends that capture
/// in a single vendor call instead of over raw transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureParams {
    pub quality: u8,
    pub timeout: Duration,
}

impl Default for CaptureParams {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            timeout: Duration::from_millis(u64::from(DEFAULT_SDK_TIMEOUT_MS)),
        }
    }
}

/// A host-to-device vendor control transfer.
///
/// # Examples
///
/// ```
/// use bioscan_hardware::{CaptureParams, VendorCommand};
///
/// let command = VendorCommand::begin_capture(CaptureParams::default());
/// assert_eq!(command.request, 0x01);
/// assert_eq!(command.payload, vec![0x00, 0x01]);
/// assert!(command.capture.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorCommand {
    /// `bRequest` of the control transfer.
    pub request: u8,
    /// `wValue` of the control transfer.
    pub value: u16,
    /// `wIndex` of the control transfer.
    pub index: u16,
    /// Data stage bytes.
    pub payload: Vec<u8>,
    /// Set when this command arms a capture.
    pub capture: Option<CaptureParams>,
}

impl VendorCommand {
    pub fn new(request: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            request,
            value: 0,
            index: 0,
            payload: payload.into(),
            capture: None,
        }
    }

    /// The reference begin-capture handshake.
    pub fn begin_capture(params: CaptureParams) -> Self {
        Self::new(BEGIN_CAPTURE_OPCODE, BEGIN_CAPTURE_PAYLOAD).with_capture(params)
    }

    /// Begin-capture with a reader-specific opcode and payload.
    pub fn begin_capture_with(request: u8, payload: impl Into<Vec<u8>>, params: CaptureParams) -> Self {
        Self::new(request, payload).with_capture(params)
    }

    pub fn with_value(mut self, value: u16) -> Self {
        self.value = value;
        self
    }

    pub fn with_index(mut self, index: u16) -> Self {
        self.index = index;
        self
    }

    pub fn with_capture(mut self, params: CaptureParams) -> Self {
        self.capture = Some(params);
        self
    }

    pub fn is_begin_capture(&self) -> bool {
        self.capture.is_some()
    }
}
