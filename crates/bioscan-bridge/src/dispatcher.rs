//! Maps bridge operations onto the biometric service.

use std::sync::Arc;

use bioscan_biometric::{BiometricService, CaptureOptions, ServiceError};
use bioscan_core::ErrorKind;
use bioscan_hardware::DriverShim;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{BridgeRequest, BridgeResponse, Operation};

/// Facts served by the `app.*` operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub app_name: String,
    pub version: String,
    pub environment: String,
    pub backend: String,
    pub log_filter: String,
}

#[derive(Debug, Error)]
enum OperationError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl OperationError {
    fn kind(&self) -> ErrorKind {
        match self {
            OperationError::Service(e) => e.kind(),
            OperationError::Encode(_) => ErrorKind::Internal,
        }
    }
}

/// Runs one validated request to completion against the service.
pub struct Dispatcher<S: DriverShim> {
    service: Arc<BiometricService<S>>,
    app: AppInfo,
}

impl<S: DriverShim> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("service", &self.service)
            .field("app", &self.app)
            .finish()
    }
}

impl<S: DriverShim> Dispatcher<S> {
    pub fn new(service: Arc<BiometricService<S>>, app: AppInfo) -> Self {
        Self { service, app }
    }

    pub fn service(&self) -> &Arc<BiometricService<S>> {
        &self.service
    }

    pub fn app(&self) -> &AppInfo {
        &self.app
    }

    /// Dispatch one request. Never fails: errors become error responses.
    pub async fn dispatch(&self, request: BridgeRequest) -> BridgeResponse {
        let BridgeRequest { id, operation } = request;
        let name = operation.name();
        debug!(operation = name, ?id, "Dispatching request");

        match self.run(operation).await {
            Ok(data) => BridgeResponse::success(id, data),
            Err(e) => {
                let kind = e.kind();
                warn!(operation = name, %kind, error = %e, "Operation failed");
                BridgeResponse::failure(id, kind, e.to_string())
            }
        }
    }

    async fn run(&self, operation: Operation) -> Result<Value, OperationError> {
        let data = match operation {
            Operation::Init => serde_json::to_value(self.service.initialize().await?)?,
            Operation::GetStatus => serde_json::to_value(self.service.status())?,
            Operation::Capture(payload) => {
                let options = CaptureOptions {
                    device_id: payload.device_id,
                    quality: payload.quality,
                };
                serde_json::to_value(self.service.capture_fingerprint(options).await?)?
            }
            Operation::ListDevices => {
                let devices = self.service.list_devices().await?;
                json!({ "devices": devices })
            }
            Operation::ConnectDevice(payload) => {
                serde_json::to_value(self.service.connect_device(payload.device_id).await?)?
            }
            Operation::Disconnect => {
                self.service.shutdown().await;
                json!({ "disconnected": true })
            }
            Operation::Test => {
                let result = self.service.capture_fingerprint(CaptureOptions::default()).await?;
                serde_json::to_value(result)?
            }
            Operation::GetVersion => json!({ "version": self.app.version }),
            Operation::GetEnv => json!({
                "appName": self.app.app_name,
                "environment": self.app.environment,
                "backend": self.app.backend,
                "logFilter": self.app.log_filter,
            }),
        };
        Ok(data)
    }
}
