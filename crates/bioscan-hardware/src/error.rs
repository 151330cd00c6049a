//! Error types for driver shim operations.
//!
//! Each variant maps onto one [`ErrorKind`] of the bridge wire contract.
//! Transfer failures additionally carry a [`TransferFailure`] so the service
//! can tell a device that went away from one that merely hiccuped.

use std::fmt;

use bioscan_core::ErrorKind;
use serde::{Deserialize, Serialize};

/// Result type alias for driver shim operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Low-level reason a USB transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferFailure {
    /// Endpoint halted.
    Stall,
    /// Device sent more data than requested.
    Babble,
    /// No response within the transfer timeout.
    Timeout,
    /// Device left the bus mid-transfer.
    Disconnected,
    /// Claimed interface exposes no readable endpoint.
    NoEndpoint,
    /// Anything else reported by the transport.
    Other,
}

impl TransferFailure {
    /// Whether the handle is unusable after this failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransferFailure::Stall | TransferFailure::Disconnected)
    }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferFailure::Stall => "stall",
            TransferFailure::Babble => "babble",
            TransferFailure::Timeout => "timeout",
            TransferFailure::Disconnected => "disconnected",
            TransferFailure::NoEndpoint => "no endpoint",
            TransferFailure::Other => "other",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during driver shim operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Nothing on the bus matched the vendor allow-list.
    #[error("No supported fingerprint reader found")]
    NoDeviceFound,

    /// The OS denied access or the descriptor no longer matches a device.
    #[error("Failed to open {device}: {reason}")]
    DeviceOpen { device: String, reason: String },

    /// A control or data transfer failed.
    #[error("Transfer failed ({failure}): {message}")]
    Transfer {
        failure: TransferFailure,
        message: String,
    },

    /// The reader returned too few bytes to be a template.
    #[error("Short read: got {got} bytes, expected at least {min}")]
    ShortRead { got: usize, min: usize },

    /// The vendor SDK `Init` routine returned a non-zero status.
    #[error("Init failed: {code}")]
    SdkInit { code: i32 },

    /// The vendor SDK `CaptureFinger` routine returned a non-zero status.
    #[error("Capture failed: {code}")]
    SdkCapture { code: i32 },

    /// The backend cannot perform the requested operation.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },
}

impl HardwareError {
    /// Create a new device open error.
    pub fn device_open(device: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::DeviceOpen {
            device: device.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a new transfer error.
    pub fn transfer(failure: TransferFailure, message: impl Into<String>) -> Self {
        Self::Transfer {
            failure,
            message: message.into(),
        }
    }

    /// Create a new short read error.
    pub fn short_read(got: usize, min: usize) -> Self {
        Self::ShortRead { got, min }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Bridge-level classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HardwareError::NoDeviceFound => ErrorKind::NoDeviceFound,
            HardwareError::DeviceOpen { .. } => ErrorKind::DeviceOpen,
            HardwareError::Transfer { .. } => ErrorKind::Transfer,
            HardwareError::ShortRead { .. } => ErrorKind::ShortRead,
            HardwareError::SdkInit { .. } => ErrorKind::SdkInit,
            HardwareError::SdkCapture { .. } => ErrorKind::SdkCapture,
            HardwareError::Unsupported { .. } => ErrorKind::Internal,
        }
    }

    /// Whether the device handle must be released after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            HardwareError::Transfer { failure, .. } => failure.is_fatal(),
            _ => false,
        }
    }

    /// Whether this is a transfer failure the device may recover from.
    pub fn is_recoverable_transfer(&self) -> bool {
        matches!(self, HardwareError::Transfer { failure, .. } if !failure.is_fatal())
    }
}

/// Reject buffers too short to be a fingerprint template.
///
/// # Errors
///
/// Returns [`HardwareError::ShortRead`] when `bytes` is shorter than `min`.
pub fn validate_template_len(bytes: &[u8], min: usize) -> Result<()> {
    if bytes.len() < min {
        return Err(HardwareError::short_read(bytes.len(), min));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TransferFailure::Stall, true)]
    #[case(TransferFailure::Disconnected, true)]
    #[case(TransferFailure::Babble, false)]
    #[case(TransferFailure::Timeout, false)]
    #[case(TransferFailure::NoEndpoint, false)]
    #[case(TransferFailure::Other, false)]
    fn test_fatal_classification(#[case] failure: TransferFailure, #[case] fatal: bool) {
        let error = HardwareError::transfer(failure, "bulk in");
        assert_eq!(error.is_fatal(), fatal);
        assert_eq!(error.is_recoverable_transfer(), !fatal);
        assert_eq!(error.kind(), ErrorKind::Transfer);
    }

    #[test]
    fn test_sdk_errors_keep_vendor_code() {
        let error = HardwareError::SdkCapture { code: -1307 };
        assert_eq!(error.to_string(), "Capture failed: -1307");
        assert_eq!(error.kind(), ErrorKind::SdkCapture);

        let error = HardwareError::SdkInit { code: 7 };
        assert_eq!(error.to_string(), "Init failed: 7");
        assert!(!error.is_fatal());
    }

    #[test]
    fn test_device_open_error() {
        let error = HardwareError::device_open("0x096e_0x0001", "Access denied");
        assert_eq!(error.to_string(), "Failed to open 0x096e_0x0001: Access denied");
        assert_eq!(error.kind(), ErrorKind::DeviceOpen);
    }

    #[test]
    fn test_validate_template_len() {
        assert!(validate_template_len(&[0u8; 50], 50).is_ok());

        let error = validate_template_len(&[0u8; 10], 50).unwrap_err();
        assert!(matches!(error, HardwareError::ShortRead { got: 10, min: 50 }));
        assert_eq!(error.kind(), ErrorKind::ShortRead);
    }
}
