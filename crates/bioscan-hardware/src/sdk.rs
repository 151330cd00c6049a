//! Native vendor SDK adapter.
//!
//! Some readers (the Mantra MFS100 in particular) do not expose their
//! capture protocol; the vendor ships a library with a blocking
//! `Init()`/`CaptureFinger(quality, timeout, buffer)` pair instead. This
//! module maps that pair onto the [`DriverShim`] contract:
//!
//! | shim operation | SDK call |
//! |----------------|----------|
//! | `enumerate` | reports the configured reader |
//! | `open` | `Init()` |
//! | `send_command` (begin-capture) | arms the session with quality and timeout |
//! | `read_template` | `CaptureFinger(quality, timeout, buffer)` |
//! | `close` | `Uninit()` |
//!
//! Non-zero status codes are passed through verbatim in
//! [`HardwareError::SdkInit`] and [`HardwareError::SdkCapture`].

use std::sync::Arc;

use bioscan_core::DeviceDescriptor;
use bioscan_core::constants::SDK_TEMPLATE_BUFFER_BYTES;
use tracing::{debug, info, warn};

use crate::command::{CaptureParams, VendorCommand};
use crate::error::{HardwareError, Result, TransferFailure};
use crate::traits::DriverShim;

/// Blocking entry points of a vendor fingerprint SDK.
///
/// Implementations are called from tokio's blocking pool, never from an
/// async task directly. Zero means success; anything else is a vendor code.
pub trait VendorSdk: Send + Sync + 'static {
    fn init(&self) -> i32;

    fn uninit(&self) -> i32;

    fn capture_finger(&self, quality: u8, timeout_ms: u32, template: &mut [u8]) -> i32;
}

/// An initialized SDK session.
#[derive(Debug)]
pub struct SdkSession {
    descriptor: DeviceDescriptor,
    armed: Option<CaptureParams>,
}

impl SdkSession {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

/// Driver shim that delegates to a [`VendorSdk`].
#[derive(Clone)]
pub struct NativeSdkShim {
    sdk: Arc<dyn VendorSdk>,
    descriptor: DeviceDescriptor,
}

impl NativeSdkShim {
    /// Wrap an SDK serving the reader described by `descriptor`.
    pub fn new(sdk: Arc<dyn VendorSdk>, descriptor: DeviceDescriptor) -> Self {
        Self { sdk, descriptor }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn check_descriptor(&self, descriptor: &DeviceDescriptor) -> Result<()> {
        if descriptor != &self.descriptor {
            return Err(HardwareError::device_open(
                descriptor.id(),
                format!("SDK backend only serves {}", self.descriptor.id()),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for NativeSdkShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeSdkShim")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

fn join_error(error: tokio::task::JoinError) -> HardwareError {
    HardwareError::transfer(TransferFailure::Other, format!("SDK call failed: {error}"))
}

impl DriverShim for NativeSdkShim {
    type Handle = SdkSession;

    fn backend(&self) -> &'static str {
        "sdk"
    }

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        Ok(vec![self.descriptor.clone()])
    }

    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<SdkSession> {
        self.check_descriptor(descriptor)?;

        let sdk = Arc::clone(&self.sdk);
        let code = tokio::task::spawn_blocking(move || sdk.init())
            .await
            .map_err(|e| HardwareError::device_open(descriptor.id(), e.to_string()))?;

        if code != 0 {
            warn!(device_id = %descriptor.id(), code, "SDK Init rejected");
            return Err(HardwareError::SdkInit { code });
        }

        info!(device_id = %descriptor.id(), "SDK session initialized");
        Ok(SdkSession {
            descriptor: descriptor.clone(),
            armed: None,
        })
    }

    async fn send_command(&self, handle: &mut SdkSession, command: &VendorCommand) -> Result<()> {
        match command.capture {
            Some(params) => {
                debug!(quality = params.quality, timeout_ms = params.timeout.as_millis() as u64, "SDK capture armed");
                handle.armed = Some(params);
                Ok(())
            }
            None => Err(HardwareError::unsupported(format!(
                "raw control request 0x{:02x} on SDK backend",
                command.request
            ))),
        }
    }

    async fn read_template(&self, handle: &mut SdkSession, max_bytes: usize) -> Result<Vec<u8>> {
        let params = handle.armed.take().unwrap_or_default();
        let timeout_ms = u32::try_from(params.timeout.as_millis()).unwrap_or(u32::MAX);
        let sdk = Arc::clone(&self.sdk);

        let (code, template) = tokio::task::spawn_blocking(move || {
            // The vendor routine writes a fixed-size block regardless of what
            // it is handed.
            let mut template = vec![0u8; max_bytes.max(SDK_TEMPLATE_BUFFER_BYTES)];
            let code = sdk.capture_finger(params.quality, timeout_ms, &mut template);
            (code, template)
        })
        .await
        .map_err(join_error)?;

        if code != 0 {
            warn!(device_id = %handle.descriptor.id(), code, "SDK CaptureFinger failed");
            return Err(HardwareError::SdkCapture { code });
        }

        Ok(template)
    }

    async fn close(&self, handle: SdkSession) -> Result<()> {
        let sdk = Arc::clone(&self.sdk);
        let code = tokio::task::spawn_blocking(move || sdk.uninit())
            .await
            .map_err(join_error)?;

        if code != 0 {
            warn!(device_id = %handle.descriptor.id(), code, "SDK Uninit returned non-zero status");
        }
        info!(device_id = %handle.descriptor.id(), "SDK session closed");
        Ok(())
    }
}

/// Mantra MFS100 SDK linked from `MFS100Dll`.
#[cfg(feature = "vendor-sdk")]
pub mod mfs100 {
    use super::VendorSdk;

    #[link(name = "MFS100Dll")]
    unsafe extern "system" {
        fn Init() -> i32;
        fn Uninit() -> i32;
        fn CaptureFinger(quality: i32, timeout: i32, template: *mut u8) -> i32;
    }

    /// The linked MFS100 SDK.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct Mfs100Sdk;

    impl VendorSdk for Mfs100Sdk {
        fn init(&self) -> i32 {
            // SAFETY: no arguments; the library manages its own state.
            unsafe { Init() }
        }

        fn uninit(&self) -> i32 {
            // SAFETY: no arguments; safe to call after a failed Init.
            unsafe { Uninit() }
        }

        fn capture_finger(&self, quality: u8, timeout_ms: u32, template: &mut [u8]) -> i32 {
            if template.len() < super::SDK_TEMPLATE_BUFFER_BYTES {
                return -1;
            }
            let timeout = i32::try_from(timeout_ms).unwrap_or(i32::MAX);
            // SAFETY: the buffer is at least SDK_TEMPLATE_BUFFER_BYTES long,
            // which is the block size CaptureFinger writes.
            unsafe { CaptureFinger(i32::from(quality), timeout, template.as_mut_ptr()) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeSdk {
        init_code: i32,
        capture_code: i32,
        calls: Mutex<Vec<String>>,
    }

    impl VendorSdk for FakeSdk {
        fn init(&self) -> i32 {
            self.calls.lock().unwrap().push("init".into());
            self.init_code
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
            template[..4].copy_from_slice(&[1, 2, 3, 4]);
            self.capture_code
        }
    }

    fn mantra() -> DeviceDescriptor {
        DeviceDescriptor::new(0x2c0f, 0x0005, "Mantra MFS100")
    }

    #[tokio::test]
    async fn test_capture_flow_passes_armed_params() {
        let sdk = Arc::new(FakeSdk::default());
        let shim = NativeSdkShim::new(sdk.clone(), mantra());

        let found = shim.enumerate().await.unwrap();
        assert_eq!(found, vec![mantra()]);

        let mut session = shim.open(&mantra()).await.unwrap();
        let params = CaptureParams {
            quality: 80,
            timeout: Duration::from_millis(4000),
        };
        shim.send_command(&mut session, &VendorCommand::begin_capture(params))
            .await
            .unwrap();
        assert!(session.is_armed());

        let template = shim.read_template(&mut session, 1024).await.unwrap();
        assert_eq!(template.len(), SDK_TEMPLATE_BUFFER_BYTES);
        assert_eq!(&template[..4], &[1, 2, 3, 4]);
        assert!(!session.is_armed());

        shim.close(session).await.unwrap();

        let calls = sdk.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["init", "capture 80 4000 5120", "uninit"]);
    }

    #[tokio::test]
    async fn test_read_returns_at_least_vendor_block() {
        let sdk = Arc::new(FakeSdk::default());
        let shim = NativeSdkShim::new(sdk.clone(), mantra());
        let mut session = shim.open(&mantra()).await.unwrap();

        let small = shim.read_template(&mut session, 64).await.unwrap();
        assert_eq!(small.len(), SDK_TEMPLATE_BUFFER_BYTES);

        let large = shim.read_template(&mut session, 8000).await.unwrap();
        assert_eq!(large.len(), 8000);
    }

    #[tokio::test]
    async fn test_init_failure_keeps_vendor_code() {
        let sdk = Arc::new(FakeSdk {
            init_code: -1307,
            ..Default::default()
        });
        let shim = NativeSdkShim::new(sdk, mantra());

        let error = shim.open(&mantra()).await.unwrap_err();
        assert!(matches!(error, HardwareError::SdkInit { code: -1307 }));
    }

    #[tokio::test]
    async fn test_capture_failure_keeps_vendor_code() {
        let sdk = Arc::new(FakeSdk {
            capture_code: 9,
            ..Default::default()
        });
        let shim = NativeSdkShim::new(sdk, mantra());
        let mut session = shim.open(&mantra()).await.unwrap();

        let error = shim.read_template(&mut session, 1024).await.unwrap_err();
        assert!(matches!(error, HardwareError::SdkCapture { code: 9 }));
        assert!(!error.is_fatal());
    }

    #[tokio::test]
    async fn test_raw_command_is_unsupported() {
        let shim = NativeSdkShim::new(Arc::new(FakeSdk::default()), mantra());
        let mut session = shim.open(&mantra()).await.unwrap();

        let error = shim
            .send_command(&mut session, &VendorCommand::new(0x42, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(error, HardwareError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_open_rejects_other_descriptor() {
        let shim = NativeSdkShim::new(Arc::new(FakeSdk::default()), mantra());
        let other = DeviceDescriptor::new(0x096e, 0x0001, "Hamster");

        let error = shim.open(&other).await.unwrap_err();
        assert!(matches!(error, HardwareError::DeviceOpen { .. }));
    }
}
