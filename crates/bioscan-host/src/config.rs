//! Host configuration.
//!
//! Loaded from an optional TOML file and then overridden from the command
//! line. Every field has a default, so an empty file (or none at all) gives a
//! working USB setup:
//!
//! ```toml
//! [app]
//! name = "bioscan"
//! environment = "production"
//!
//! [backend]
//! kind = "usb"            # usb | sdk | mock
//!
//! [capture]
//! settle_ms = 3000
//! read_buffer_bytes = 1024
//! min_template_bytes = 50
//! default_quality = 70
//!
//! [usb]
//! interface = 0
//! begin_capture_opcode = 1
//! begin_capture_payload = [0, 1]
//!
//! [ui]
//! command = "bioscan-ui"
//! args = ["--kiosk"]
//!
//! [monitor]
//! poll_interval_secs = 30
//! auto_reconnect = true
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bioscan_biometric::CaptureConfig;
use bioscan_bridge::{DEFAULT_MAX_FRAME_SIZE, max_template_bytes};
use bioscan_core::DeviceDescriptor;
use bioscan_core::constants::{
    BEGIN_CAPTURE_OPCODE, BEGIN_CAPTURE_PAYLOAD, DEFAULT_INTERFACE, DEFAULT_QUALITY,
    DEFAULT_READ_BUFFER_BYTES, DEFAULT_SDK_TIMEOUT_MS, DEFAULT_SETTLE_MS,
    DEFAULT_TRANSFER_TIMEOUT_MS, DEFAULT_UNSTABLE_AFTER, MAX_QUALITY, MIN_TEMPLATE_BYTES,
    VENDOR_BIOMIKEY,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("backend '{0}' is not compiled into this build")]
    BackendUnavailable(BackendKind),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Which driver shim the host runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Raw USB transfers over libusb.
    #[default]
    Usb,
    /// Linked vendor SDK.
    Sdk,
    /// Simulated reader.
    Mock,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Usb => "usb",
            BackendKind::Sdk => "sdk",
            BackendKind::Mock => "mock",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSection {
    pub name: String,
    pub environment: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "bioscan".to_string(),
            environment: "production".to_string(),
        }
    }
}

/// The reader reported by the `sdk` and `mock` backends, which cannot
/// enumerate the bus themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceSection {
    pub vendor_id: u16,
    pub product_id: u16,
    pub display_name: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            vendor_id: VENDOR_BIOMIKEY,
            product_id: 0x0000,
            display_name: "Mantra MFS100".to_string(),
        }
    }
}

impl DeviceSection {
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(self.vendor_id, self.product_id, self.display_name.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSection {
    pub kind: BackendKind,
    pub device: DeviceSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureSection {
    pub settle_ms: u64,
    pub read_buffer_bytes: usize,
    pub min_template_bytes: usize,
    pub default_quality: u8,
    pub sdk_timeout_ms: u32,
    pub unstable_after: u32,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            settle_ms: DEFAULT_SETTLE_MS,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            min_template_bytes: MIN_TEMPLATE_BYTES,
            default_quality: DEFAULT_QUALITY,
            sdk_timeout_ms: DEFAULT_SDK_TIMEOUT_MS,
            unstable_after: DEFAULT_UNSTABLE_AFTER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsbSection {
    pub interface: u8,
    pub begin_capture_opcode: u8,
    pub begin_capture_payload: Vec<u8>,
    pub transfer_timeout_ms: u64,
}

impl Default for UsbSection {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE,
            begin_capture_opcode: BEGIN_CAPTURE_OPCODE,
            begin_capture_payload: BEGIN_CAPTURE_PAYLOAD.to_vec(),
            transfer_timeout_ms: DEFAULT_TRANSFER_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiSection {
    /// Program started as the UI surface. Empty means none is configured.
    pub command: String,
    pub args: Vec<String>,
    /// How long the UI gets to exit on its own before it is killed.
    pub shutdown_grace_secs: u64,
}

impl Default for UiSection {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            shutdown_grace_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSection {
    pub poll_interval_secs: u64,
    pub auto_reconnect: bool,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            auto_reconnect: true,
        }
    }
}

/// Complete host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub app: AppSection,
    pub backend: BackendSection,
    pub capture: CaptureSection,
    pub usb: UsbSection,
    pub ui: UiSection,
    pub monitor: MonitorSection,
}

impl HostConfig {
    /// Read and parse a TOML file. Does not validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capture = &self.capture;
        if capture.read_buffer_bytes == 0 {
            return Err(ConfigError::invalid("capture.read_buffer_bytes", "must be greater than zero"));
        }
        let max_buffer = max_template_bytes(DEFAULT_MAX_FRAME_SIZE);
        if capture.read_buffer_bytes > max_buffer {
            return Err(ConfigError::invalid(
                "capture.read_buffer_bytes",
                format!(
                    "{} exceeds {max_buffer}, the largest template a bridge response can carry",
                    capture.read_buffer_bytes
                ),
            ));
        }
        if capture.min_template_bytes > capture.read_buffer_bytes {
            return Err(ConfigError::invalid(
                "capture.min_template_bytes",
                format!(
                    "{} exceeds read_buffer_bytes ({})",
                    capture.min_template_bytes, capture.read_buffer_bytes
                ),
            ));
        }
        if capture.default_quality > MAX_QUALITY {
            return Err(ConfigError::invalid(
                "capture.default_quality",
                format!("{} exceeds {MAX_QUALITY}", capture.default_quality),
            ));
        }
        if capture.unstable_after == 0 {
            return Err(ConfigError::invalid("capture.unstable_after", "must be greater than zero"));
        }
        if self.usb.begin_capture_payload.is_empty() {
            return Err(ConfigError::invalid("usb.begin_capture_payload", "must not be empty"));
        }
        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::invalid("monitor.poll_interval_secs", "must be greater than zero"));
        }
        if self.backend.kind != BackendKind::Usb && !self.backend.device.descriptor().is_allowed() {
            return Err(ConfigError::invalid(
                "backend.device.vendor_id",
                format!("0x{:04x} is not a supported reader vendor", self.backend.device.vendor_id),
            ));
        }
        Ok(())
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            settle: Duration::from_millis(self.capture.settle_ms),
            read_buffer_bytes: self.capture.read_buffer_bytes,
            min_template_bytes: self.capture.min_template_bytes,
            default_quality: self.capture.default_quality,
            sdk_timeout: Duration::from_millis(u64::from(self.capture.sdk_timeout_ms)),
            unstable_after: self.capture.unstable_after,
            begin_capture_opcode: self.usb.begin_capture_opcode,
            begin_capture_payload: self.usb.begin_capture_payload.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.poll_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.ui.shutdown_grace_secs)
    }
}
