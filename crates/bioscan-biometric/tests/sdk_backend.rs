//! Service behaviour over the vendor SDK backend with a scripted SDK.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bioscan_biometric::{BiometricService, CaptureConfig, CaptureOptions, ServiceError, ServiceState};
use bioscan_core::constants::SDK_TEMPLATE_BUFFER_BYTES;
use bioscan_core::{DeviceDescriptor, ErrorKind};
use bioscan_hardware::{AnyShim, HardwareError, NativeSdkShim, VendorSdk};

#[derive(Default)]
struct ScriptedSdk {
    init_code: Mutex<i32>,
    capture_codes: Mutex<VecDeque<i32>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSdk {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl VendorSdk for ScriptedSdk {
    fn init(&self) -> i32 {
        self.calls.lock().unwrap().push("init".into());
        *self.init_code.lock().unwrap()
    }

    fn uninit(&self) -> i32 {
        self.calls.lock().unwrap().push("uninit".into());
        0
    }

    fn capture_finger(&self, quality: u8, timeout_ms: u32, template: &mut [u8]) -> i32 {
        self.calls
            .lock()
            .unwrap()
            .push(format!("capture {quality} {timeout_ms} {}", template.len()));
        template.fill(0x5A);
        self.capture_codes.lock().unwrap().pop_front().unwrap_or(0)
    }
}

fn mantra() -> DeviceDescriptor {
    DeviceDescriptor::new(0x2c0f, 0x0005, "Mantra MFS100")
}

fn sdk_service(sdk: &Arc<ScriptedSdk>) -> BiometricService<AnyShim> {
    let shim = NativeSdkShim::new(sdk.clone(), mantra());
    let config = CaptureConfig {
        settle: Duration::ZERO,
        sdk_timeout: Duration::from_millis(4000),
        ..CaptureConfig::default()
    };
    BiometricService::new(AnyShim::NativeSdk(shim), config)
}

#[tokio::test]
async fn test_sdk_init_failure_leaves_disconnected() {
    let sdk = Arc::new(ScriptedSdk::default());
    *sdk.init_code.lock().unwrap() = -1307;
    let service = sdk_service(&sdk);

    let error = service.initialize().await.unwrap_err();

    assert!(matches!(error, ServiceError::Hardware(HardwareError::SdkInit { code: -1307 })));
    assert_eq!(error.kind(), ErrorKind::SdkInit);
    assert_eq!(service.state(), ServiceState::Disconnected);
    assert_eq!(sdk.calls(), vec!["init"]);

    *sdk.init_code.lock().unwrap() = 0;
    assert_eq!(service.initialize().await.unwrap(), mantra());
    assert_eq!(service.state(), ServiceState::Connected);
}

#[tokio::test]
async fn test_sdk_capture_uses_requested_quality_and_timeout() {
    let sdk = Arc::new(ScriptedSdk::default());
    let service = sdk_service(&sdk);
    service.initialize().await.unwrap();

    let result = service
        .capture_fingerprint(CaptureOptions::with_quality(80))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.quality(), Some(80));
    assert_eq!(
        result.template_bytes().unwrap(),
        vec![0x5A; SDK_TEMPLATE_BUFFER_BYTES]
    );
    assert_eq!(service.state(), ServiceState::Connected);
    assert_eq!(sdk.calls(), vec!["init", "capture 80 4000 5120"]);
}

#[tokio::test]
async fn test_sdk_capture_code_is_reported() {
    let sdk = Arc::new(ScriptedSdk::default());
    sdk.capture_codes.lock().unwrap().push_back(-1140);
    let service = sdk_service(&sdk);
    service.initialize().await.unwrap();

    let failed = service.capture_fingerprint(CaptureOptions::default()).await.unwrap();

    assert_eq!(failed.error(), Some("Capture failed: -1140"));
    assert_eq!(service.state(), ServiceState::Connected);

    let retried = service.capture_fingerprint(CaptureOptions::default()).await.unwrap();
    assert!(retried.is_success());
    assert_eq!(retried.quality(), Some(70));
}

#[tokio::test]
async fn test_sdk_shutdown_uninitializes() {
    let sdk = Arc::new(ScriptedSdk::default());
    let service = sdk_service(&sdk);
    service.initialize().await.unwrap();

    service.shutdown().await;
    service.shutdown().await;

    assert_eq!(service.state(), ServiceState::Disconnected);
    assert_eq!(sdk.calls(), vec!["init", "uninit"]);
}
