//! Mock driver shim implementation.
//!
//! [`MockShim::new`] returns the shim and a [`MockShimHandle`]. The handle
//! attaches and detaches simulated readers and queues the outcome of the
//! next open, command and read calls. Anything not queued falls back to a
//! sensible default: opens and commands succeed, reads time out.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bioscan_core::DeviceDescriptor;
use tracing::debug;

use crate::command::VendorCommand;
use crate::error::{HardwareError, Result, TransferFailure};
use crate::traits::DriverShim;

#[derive(Debug, Default)]
struct MockState {
    attached: Vec<DeviceDescriptor>,
    open_results: VecDeque<Result<()>>,
    command_results: VecDeque<Result<()>>,
    reads: VecDeque<Result<Vec<u8>>>,
    read_delay: Option<Duration>,
    commands: Vec<VendorCommand>,
    open_handles: u64,
    opens: usize,
    closes: usize,
    next_serial: u64,
}

/// Token for a simulated open device.
#[derive(Debug)]
pub struct MockDeviceHandle {
    descriptor: DeviceDescriptor,
    serial: u64,
}

impl MockDeviceHandle {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// Mock driver shim.
///
/// # Examples
///
/// ```
/// use bioscan_core::DeviceDescriptor;
/// use bioscan_hardware::{DriverShim, MockShim};
///
/// #[tokio::main]
/// async fn main() -> bioscan_hardware::Result<()> {
///     let (shim, handle) = MockShim::new();
///     let reader = DeviceDescriptor::new(0x096e, 0x0001, "SecuGen Hamster");
///     handle.attach(reader.clone());
///     handle.queue_read(vec![7u8; 200]);
///
///     let mut device = shim.open(&reader).await?;
///     let bytes = shim.read_template(&mut device, 1024).await?;
///     assert_eq!(bytes.len(), 200);
///     shim.close(device).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockShim {
    state: Arc<Mutex<MockState>>,
}

/// Controls a [`MockShim`].
#[derive(Debug, Clone)]
pub struct MockShimHandle {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    // Poisoning only happens if a test panicked while holding the lock.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockShim {
    /// Create a mock shim with an empty bus.
    pub fn new() -> (Self, MockShimHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockShimHandle { state },
        )
    }

    /// Create a mock shim with `descriptors` already attached.
    pub fn with_devices(descriptors: impl IntoIterator<Item = DeviceDescriptor>) -> (Self, MockShimHandle) {
        let (shim, handle) = Self::new();
        for descriptor in descriptors {
            handle.attach(descriptor);
        }
        (shim, handle)
    }

    fn is_attached(&self, descriptor: &DeviceDescriptor) -> bool {
        lock(&self.state).attached.contains(descriptor)
    }
}

impl MockShimHandle {
    /// Plug a simulated reader in.
    pub fn attach(&self, descriptor: DeviceDescriptor) {
        let mut state = lock(&self.state);
        if !state.attached.contains(&descriptor) {
            state.attached.push(descriptor);
        }
    }

    /// Pull a simulated reader out. Transfers on open handles start failing.
    pub fn detach(&self, descriptor: &DeviceDescriptor) {
        lock(&self.state).attached.retain(|d| d != descriptor);
    }

    /// Outcome of the next `open` call.
    pub fn queue_open_error(&self, error: HardwareError) {
        lock(&self.state).open_results.push_back(Err(error));
    }

    /// Outcome of the next `send_command` call.
    pub fn queue_command_error(&self, error: HardwareError) {
        lock(&self.state).command_results.push_back(Err(error));
    }

    /// Bytes returned by the next `read_template` call.
    pub fn queue_read(&self, bytes: Vec<u8>) {
        lock(&self.state).reads.push_back(Ok(bytes));
    }

    /// Error returned by the next `read_template` call.
    pub fn queue_read_error(&self, error: HardwareError) {
        lock(&self.state).reads.push_back(Err(error));
    }

    /// Make every read take `delay` before completing.
    pub fn set_read_delay(&self, delay: Duration) {
        lock(&self.state).read_delay = Some(delay);
    }

    /// Commands sent so far, oldest first.
    pub fn commands(&self) -> Vec<VendorCommand> {
        lock(&self.state).commands.clone()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).opens
    }

    pub fn close_count(&self) -> usize {
        lock(&self.state).closes
    }

    /// Number of handles currently open.
    pub fn open_handles(&self) -> u64 {
        lock(&self.state).open_handles
    }
}

impl DriverShim for MockShim {
    type Handle = MockDeviceHandle;

    fn backend(&self) -> &'static str {
        "mock"
    }

    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let state = lock(&self.state);
        Ok(state
            .attached
            .iter()
            .filter(|d| d.is_allowed())
            .cloned()
            .collect())
    }

    async fn open(&self, descriptor: &DeviceDescriptor) -> Result<MockDeviceHandle> {
        let mut state = lock(&self.state);

        if let Some(Err(error)) = state.open_results.pop_front() {
            return Err(error);
        }
        if !state.attached.contains(descriptor) {
            return Err(HardwareError::device_open(descriptor.id(), "device is no longer attached"));
        }

        state.opens += 1;
        state.open_handles += 1;
        state.next_serial += 1;
        debug!(device_id = %descriptor.id(), serial = state.next_serial, "Mock device opened");

        Ok(MockDeviceHandle {
            descriptor: descriptor.clone(),
            serial: state.next_serial,
        })
    }

    async fn send_command(&self, handle: &mut MockDeviceHandle, command: &VendorCommand) -> Result<()> {
        if !self.is_attached(&handle.descriptor) {
            return Err(HardwareError::transfer(TransferFailure::Disconnected, "mock device detached"));
        }

        let mut state = lock(&self.state);
        state.commands.push(command.clone());
        match state.command_results.pop_front() {
            Some(result) => result,
            None => Ok(()),
        }
    }

    async fn read_template(&self, handle: &mut MockDeviceHandle, max_bytes: usize) -> Result<Vec<u8>> {
        let delay = lock(&self.state).read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.is_attached(&handle.descriptor) {
            return Err(HardwareError::transfer(TransferFailure::Disconnected, "mock device detached"));
        }

        let next = lock(&self.state).reads.pop_front();
        match next {
            Some(Ok(mut bytes)) => {
                bytes.truncate(max_bytes);
                Ok(bytes)
            }
            Some(Err(error)) => Err(error),
            None => Err(HardwareError::transfer(TransferFailure::Timeout, "no data queued")),
        }
    }

    async fn close(&self, handle: MockDeviceHandle) -> Result<()> {
        let mut state = lock(&self.state);
        state.closes += 1;
        state.open_handles = state.open_handles.saturating_sub(1);
        debug!(device_id = %handle.descriptor.id(), serial = handle.serial, "Mock device closed");
        Ok(())
    }
}
