//! Driver shim selection.

use bioscan_hardware::AnyShim;
use bioscan_hardware::mock::MockShim;
use tracing::{info, warn};

use crate::config::{BackendKind, ConfigError, HostConfig};

/// Build the shim named by `backend.kind`. Chosen once, at startup.
///
/// # Errors
///
/// [`ConfigError::BackendUnavailable`] when the backend's cargo feature
/// was not compiled in.
pub fn build_shim(config: &HostConfig) -> Result<AnyShim, ConfigError> {
    let kind = config.backend.kind;
    let shim = match kind {
        BackendKind::Usb => usb_shim(config)?,
        BackendKind::Sdk => sdk_shim(config)?,
        BackendKind::Mock => {
            let descriptor = config.backend.device.descriptor();
            warn!(device = %descriptor, "Using simulated reader");
            let (shim, handle) = MockShim::new();
            handle.attach(descriptor);
            AnyShim::Mock(shim)
        }
    };
    info!(backend = %kind, "Driver shim selected");
    Ok(shim)
}

#[cfg(feature = "usb")]
fn usb_shim(config: &HostConfig) -> Result<AnyShim, ConfigError> {
    use std::time::Duration;

    use bioscan_hardware::usb::{UsbConfig, UsbShim};

    Ok(AnyShim::Usb(UsbShim::new(UsbConfig {
        interface: config.usb.interface,
        transfer_timeout: Duration::from_millis(config.usb.transfer_timeout_ms),
    })))
}

#[cfg(not(feature = "usb"))]
fn usb_shim(_config: &HostConfig) -> Result<AnyShim, ConfigError> {
    Err(ConfigError::BackendUnavailable(BackendKind::Usb))
}

#[cfg(feature = "vendor-sdk")]
fn sdk_shim(config: &HostConfig) -> Result<AnyShim, ConfigError> {
    use std::sync::Arc;

    use bioscan_hardware::NativeSdkShim;
    use bioscan_hardware::sdk::mfs100::Mfs100Sdk;

    Ok(AnyShim::NativeSdk(NativeSdkShim::new(
        Arc::new(Mfs100Sdk),
        config.backend.device.descriptor(),
    )))
}

#[cfg(not(feature = "vendor-sdk"))]
fn sdk_shim(_config: &HostConfig) -> Result<AnyShim, ConfigError> {
    Err(ConfigError::BackendUnavailable(BackendKind::Sdk))
}
