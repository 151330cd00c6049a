//! Capability bridge between the sandboxed UI and the biometric service.
//!
//! The UI never touches hardware. It sends newline-delimited JSON requests
//! naming one of a fixed set of [`OPERATIONS`]; the host answers each with a
//! [`BridgeResponse`] carrying either data or a typed error, and pushes a
//! [`Notification`] whenever a reader connects or disconnects.
//!
//! # Modules
//!
//! - [`protocol`]: request/response/notification shapes and payload schemas
//! - [`codec`]: JSON-lines framing for tokio streams
//! - [`dispatcher`]: operation → service call mapping
//! - [`server`]: the per-UI session loop

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod server;

pub use codec::{BridgeCodec, DEFAULT_MAX_FRAME_SIZE, Inbound, max_template_bytes};
pub use dispatcher::{AppInfo, Dispatcher};
pub use error::{BridgeError, Result};
pub use protocol::{
    BridgeRequest, BridgeResponse, CapturePayload, ConnectPayload, ErrorBody, Notification,
    NotificationEvent, OPERATIONS, Operation, Rejection,
};
pub use server::{BridgeServer, SessionStats};
