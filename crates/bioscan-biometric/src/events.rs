use bioscan_core::DeviceDescriptor;

/// Device lifecycle notification broadcast by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected(DeviceDescriptor),
    Disconnected(DeviceDescriptor),
}

impl DeviceEvent {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        match self {
            DeviceEvent::Connected(d) | DeviceEvent::Disconnected(d) => d,
        }
    }
}
