use bioscan_core::ErrorKind;
use bioscan_hardware::HardwareError;
use thiserror::Error;

use crate::state_machine::ServiceState;

/// Errors returned by [`BiometricService`](crate::BiometricService) operations.
///
/// Capture step failures are not errors: they come back as a failed
/// `CaptureResult`. These variants cover calls that could not start.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Biometric device not initialized")]
    NotInitialized,

    #[error("Biometric device busy")]
    DeviceBusy,

    #[error("Device {requested} is not the active device")]
    DeviceNotActive { requested: String },

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: ServiceState, to: ServiceState },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotInitialized => ErrorKind::NotInitialized,
            ServiceError::DeviceBusy => ErrorKind::DeviceBusy,
            ServiceError::DeviceNotActive { .. } => ErrorKind::DeviceNotActive,
            ServiceError::Hardware(e) => e.kind(),
            ServiceError::InvalidTransition { .. } => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_kind_passes_through() {
        let error = ServiceError::from(HardwareError::NoDeviceFound);
        assert_eq!(error.kind(), ErrorKind::NoDeviceFound);
        assert_eq!(error.to_string(), "No supported fingerprint reader found");
    }

    #[test]
    fn test_service_kinds() {
        assert_eq!(ServiceError::NotInitialized.kind(), ErrorKind::NotInitialized);
        assert_eq!(ServiceError::DeviceBusy.kind(), ErrorKind::DeviceBusy);
        assert_eq!(
            ServiceError::InvalidTransition {
                from: ServiceState::Uninitialized,
                to: ServiceState::Capturing
            }
            .to_string(),
            "Invalid state transition from Uninitialized to Capturing"
        );
    }
}
