//! Error kinds shared across the capture stack.
//!
//! Every failure that can reach the UI is classified by an [`ErrorKind`].
//! The kind is what the bridge puts in the `error.kind` field of a response,
//! so its string form is part of the wire contract.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failure as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Enumeration found no reader on the vendor allow-list.
    #[serde(rename = "NoDeviceFoundError")]
    NoDeviceFound,
    /// The OS refused to open the device or claim its interface.
    #[serde(rename = "DeviceOpenError")]
    DeviceOpen,
    /// A control or bulk transfer failed.
    #[serde(rename = "TransferError")]
    Transfer,
    /// The reader returned fewer bytes than a plausible template.
    #[serde(rename = "ShortReadError")]
    ShortRead,
    /// A capture is already running.
    #[serde(rename = "DeviceBusyError")]
    DeviceBusy,
    /// No device is connected.
    #[serde(rename = "NotInitializedError")]
    NotInitialized,
    /// The vendor SDK refused to initialize.
    #[serde(rename = "SdkInitError")]
    SdkInit,
    /// The vendor SDK capture routine failed.
    #[serde(rename = "SdkCaptureError")]
    SdkCapture,
    /// A request named a device that is not the active one.
    #[serde(rename = "DeviceNotActiveError")]
    DeviceNotActive,
    /// The requested bridge operation does not exist.
    #[serde(rename = "UnknownOperationError")]
    UnknownOperation,
    /// The request payload did not match the operation schema.
    #[serde(rename = "InvalidPayloadError")]
    InvalidPayload,
    /// Anything the host could not classify.
    #[serde(rename = "InternalError")]
    Internal,
}

impl ErrorKind {
    /// Wire name of this kind, as sent in bridge responses.
    ///
    /// # Examples
    ///
    /// ```
    /// use bioscan_core::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::NotInitialized.as_str(), "NotInitializedError");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoDeviceFound => "NoDeviceFoundError",
            ErrorKind::DeviceOpen => "DeviceOpenError",
            ErrorKind::Transfer => "TransferError",
            ErrorKind::ShortRead => "ShortReadError",
            ErrorKind::DeviceBusy => "DeviceBusyError",
            ErrorKind::NotInitialized => "NotInitializedError",
            ErrorKind::SdkInit => "SdkInitError",
            ErrorKind::SdkCapture => "SdkCaptureError",
            ErrorKind::DeviceNotActive => "DeviceNotActiveError",
            ErrorKind::UnknownOperation => "UnknownOperationError",
            ErrorKind::InvalidPayload => "InvalidPayloadError",
            ErrorKind::Internal => "InternalError",
        }
    }

    /// Whether retrying the same operation later can reasonably succeed.
    ///
    /// Busy and transfer failures clear up on their own; the rest need the
    /// operator to act (plug a reader in, fix permissions, reconnect).
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::DeviceBusy | ErrorKind::Transfer | ErrorKind::ShortRead)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building core values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid device id: {0}")]
    InvalidDeviceId(String),

    #[error("Invalid capture result: {0}")]
    InvalidCaptureResult(String),
}

pub type Result<T> = std::result::Result<T, Error>;
