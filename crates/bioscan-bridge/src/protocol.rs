//! Bridge wire contract.
//!
//! Three message shapes travel over the bridge, one JSON object per line:
//!
//! ```text
//! UI   -> host  {"id": 7, "operation": "biometric.capture", "payload": {"quality": 80}}
//! host -> UI    {"id": 7, "ok": true, "data": {...}}
//! host -> UI    {"id": 7, "ok": false, "error": {"kind": "DeviceBusyError", "message": "..."}}
//! host -> UI    {"event": "device:connected", "device": {...}}
//! ```
//!
//! The operation set is closed. Every operation declares its payload
//! schema here; unknown operations and unknown payload fields are refused
//! before anything reaches the biometric service.

use bioscan_biometric::DeviceEvent;
use bioscan_core::constants::MAX_QUALITY;
use bioscan_core::{DeviceDescriptor, DeviceId, ErrorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every operation name the bridge accepts.
pub const OPERATIONS: [&str; 9] = [
    "biometric.init",
    "biometric.getStatus",
    "biometric.capture",
    "biometric.listDevices",
    "biometric.connectDevice",
    "biometric.disconnect",
    "biometric.test",
    "app.getVersion",
    "app.getEnv",
];

/// Payload of `biometric.capture`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CapturePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

/// Payload of `biometric.connectDevice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectPayload {
    pub device_id: DeviceId,
}

/// A bridge operation with its validated payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Init,
    GetStatus,
    Capture(CapturePayload),
    ListDevices,
    ConnectDevice(ConnectPayload),
    Disconnect,
    Test,
    GetVersion,
    GetEnv,
}

impl Operation {
    /// Wire name of this operation.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Init => "biometric.init",
            Operation::GetStatus => "biometric.getStatus",
            Operation::Capture(_) => "biometric.capture",
            Operation::ListDevices => "biometric.listDevices",
            Operation::ConnectDevice(_) => "biometric.connectDevice",
            Operation::Disconnect => "biometric.disconnect",
            Operation::Test => "biometric.test",
            Operation::GetVersion => "app.getVersion",
            Operation::GetEnv => "app.getEnv",
        }
    }

    /// Whether this operation touches the reader.
    pub fn is_biometric(&self) -> bool {
        self.name().starts_with("biometric.")
    }

    fn from_parts(name: &str, payload: Option<Value>) -> Result<Self, Rejection> {
        let operation = match name {
            "biometric.init" => no_payload(name, payload, Operation::Init)?,
            "biometric.getStatus" => no_payload(name, payload, Operation::GetStatus)?,
            "biometric.capture" => {
                let capture: CapturePayload = optional_payload(name, payload)?;
                if let Some(quality) = capture.quality
                    && quality > MAX_QUALITY
                {
                    return Err(Rejection::invalid_payload(format!(
                        "{name}: quality {quality} exceeds {MAX_QUALITY}"
                    )));
                }
                Operation::Capture(capture)
            }
            "biometric.listDevices" => no_payload(name, payload, Operation::ListDevices)?,
            "biometric.connectDevice" => Operation::ConnectDevice(required_payload(name, payload)?),
            "biometric.disconnect" => no_payload(name, payload, Operation::Disconnect)?,
            "biometric.test" => no_payload(name, payload, Operation::Test)?,
            "app.getVersion" => no_payload(name, payload, Operation::GetVersion)?,
            "app.getEnv" => no_payload(name, payload, Operation::GetEnv)?,
            other => {
                return Err(Rejection {
                    id: None,
                    kind: ErrorKind::UnknownOperation,
                    message: format!("Unknown operation: {other}"),
                });
            }
        };
        Ok(operation)
    }
}

fn is_empty_payload(payload: &Option<Value>) -> bool {
    match payload {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn no_payload(name: &str, payload: Option<Value>, operation: Operation) -> Result<Operation, Rejection> {
    if is_empty_payload(&payload) {
        Ok(operation)
    } else {
        Err(Rejection::invalid_payload(format!("{name} takes no payload")))
    }
}

fn optional_payload<T: DeserializeOwned + Default>(name: &str, payload: Option<Value>) -> Result<T, Rejection> {
    match payload {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| Rejection::invalid_payload(format!("{name}: {e}"))),
    }
}

fn required_payload<T: DeserializeOwned>(name: &str, payload: Option<Value>) -> Result<T, Rejection> {
    let value = payload
        .filter(|v| !v.is_null())
        .ok_or_else(|| Rejection::invalid_payload(format!("{name} requires a payload")))?;
    serde_json::from_value(value).map_err(|e| Rejection::invalid_payload(format!("{name}: {e}")))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RequestWire {
    #[serde(default)]
    id: Option<u64>,
    operation: String,
    #[serde(default)]
    payload: Option<Value>,
}

/// A request line the bridge refused before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub id: Option<u64>,
    pub kind: ErrorKind,
    pub message: String,
}

impl Rejection {
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: ErrorKind::InvalidPayload,
            message: message.into(),
        }
    }

    fn with_id(self, id: Option<u64>) -> Self {
        Self { id, ..self }
    }
}

/// A validated request from the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequest {
    pub id: Option<u64>,
    pub operation: Operation,
}

impl BridgeRequest {
    pub fn new(id: Option<u64>, operation: Operation) -> Self {
        Self { id, operation }
    }

    /// Parse and validate one request line.
    ///
    /// The request id is recovered from the raw JSON whenever possible so
    /// that even a rejected request can be correlated by the UI.
    ///
    /// # Examples
    ///
    /// ```
    /// use bioscan_bridge::{BridgeRequest, Operation};
    /// use bioscan_core::ErrorKind;
    ///
    /// let request = BridgeRequest::parse(r#"{"id":1,"operation":"biometric.init"}"#).unwrap();
    /// assert_eq!(request.operation, Operation::Init);
    ///
    /// let rejected = BridgeRequest::parse(r#"{"id":2,"operation":"fs.readFile"}"#).unwrap_err();
    /// assert_eq!(rejected.id, Some(2));
    /// assert_eq!(rejected.kind, ErrorKind::UnknownOperation);
    /// ```
    pub fn parse(line: &str) -> Result<Self, Rejection> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| Rejection::invalid_payload(format!("Malformed request: {e}")))?;
        let id = value.get("id").and_then(Value::as_u64);

        let wire: RequestWire = serde_json::from_value(value)
            .map_err(|e| Rejection::invalid_payload(format!("Malformed request: {e}")).with_id(id))?;
        let operation = Operation::from_parts(&wire.operation, wire.payload).map_err(|r| r.with_id(id))?;

        Ok(Self {
            id: wire.id,
            operation,
        })
    }
}

/// Error half of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Reply to exactly one request.
///
/// Carries either data or an error, never both; the constructors are the
/// only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ResponseWire", try_from = "ResponseWire")]
pub struct BridgeResponse {
    id: Option<u64>,
    body: Result<Value, ErrorBody>,
}

impl BridgeResponse {
    pub fn success(id: Option<u64>, data: Value) -> Self {
        Self { id, body: Ok(data) }
    }

    pub fn failure(id: Option<u64>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id,
            body: Err(ErrorBody {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn is_ok(&self) -> bool {
        self.body.is_ok()
    }

    pub fn data(&self) -> Option<&Value> {
        self.body.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        self.body.as_ref().err()
    }
}

impl From<Rejection> for BridgeResponse {
    fn from(rejection: Rejection) -> Self {
        Self::failure(rejection.id, rejection.kind, rejection.message)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResponseWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

impl From<BridgeResponse> for ResponseWire {
    fn from(response: BridgeResponse) -> Self {
        match response.body {
            Ok(data) => ResponseWire {
                id: response.id,
                ok: true,
                data: Some(data),
                error: None,
            },
            Err(error) => ResponseWire {
                id: response.id,
                ok: false,
                data: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<ResponseWire> for BridgeResponse {
    type Error = String;

    fn try_from(wire: ResponseWire) -> Result<Self, Self::Error> {
        let body = match (wire.ok, wire.data, wire.error) {
            (true, data, None) => Ok(data.unwrap_or(Value::Null)),
            (false, None, Some(error)) => Err(error),
            (ok, _, _) => return Err(format!("response with ok={ok} has mismatched data/error")),
        };
        Ok(Self { id: wire.id, body })
    }
}

/// Kind of a one-way device notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationEvent {
    #[serde(rename = "device:connected")]
    DeviceConnected,
    #[serde(rename = "device:disconnected")]
    DeviceDisconnected,
}

/// Host-to-UI push. The UI never answers these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Notification {
    pub event: NotificationEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceDescriptor>,
}

impl From<&DeviceEvent> for Notification {
    fn from(event: &DeviceEvent) -> Self {
        let kind = match event {
            DeviceEvent::Connected(_) => NotificationEvent::DeviceConnected,
            DeviceEvent::Disconnected(_) => NotificationEvent::DeviceDisconnected,
        };
        Self {
            event: kind,
            device: Some(event.descriptor().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(r#"{"operation":"biometric.init"}"#, Operation::Init)]
    #[case(r#"{"operation":"biometric.getStatus","payload":{}}"#, Operation::GetStatus)]
    #[case(r#"{"operation":"biometric.listDevices","payload":null}"#, Operation::ListDevices)]
    #[case(r#"{"operation":"biometric.disconnect"}"#, Operation::Disconnect)]
    #[case(r#"{"operation":"biometric.test"}"#, Operation::Test)]
    #[case(r#"{"operation":"app.getVersion"}"#, Operation::GetVersion)]
    #[case(r#"{"operation":"app.getEnv"}"#, Operation::GetEnv)]
    #[case(
        r#"{"operation":"biometric.capture"}"#,
        Operation::Capture(CapturePayload::default())
    )]
    #[case(
        r#"{"operation":"biometric.capture","payload":{"deviceId":"0x096e_0x0001","quality":80}}"#,
        Operation::Capture(CapturePayload { device_id: Some(DeviceId::new(0x096e, 0x0001)), quality: Some(80) })
    )]
    #[case(
        r#"{"operation":"biometric.connectDevice","payload":{"deviceId":"0x1162_0x0320"}}"#,
        Operation::ConnectDevice(ConnectPayload { device_id: DeviceId::new(0x1162, 0x0320) })
    )]
    fn test_parse_valid(#[case] line: &str, #[case] expected: Operation) {
        let request = BridgeRequest::parse(line).unwrap();
        assert_eq!(request.operation, expected);
        assert_eq!(request.id, None);
    }

    #[rstest]
    #[case(r#"{"id":1,"operation":"shell.exec"}"#, ErrorKind::UnknownOperation)]
    #[case(r#"{"id":1,"operation":"biometric.capture","payload":{"script":"x"}}"#, ErrorKind::InvalidPayload)]
    #[case(r#"{"id":1,"operation":"biometric.capture","payload":{"quality":101}}"#, ErrorKind::InvalidPayload)]
    #[case(r#"{"id":1,"operation":"biometric.capture","payload":{"quality":-5}}"#, ErrorKind::InvalidPayload)]
    #[case(r#"{"id":1,"operation":"biometric.capture","payload":{"deviceId":"usb0"}}"#, ErrorKind::InvalidPayload)]
    #[case(r#"{"id":1,"operation":"biometric.connectDevice"}"#, ErrorKind::InvalidPayload)]
    #[case(r#"{"id":1,"operation":"biometric.init","payload":{"force":true}}"#, ErrorKind::InvalidPayload)]
    #[case(r#"{"id":1,"operation":"app.getEnv","payload":[1]}"#, ErrorKind::InvalidPayload)]
    #[case(r#"{"id":1,"operation":"biometric.init","extra":1}"#, ErrorKind::InvalidPayload)]
    #[case(r#"{"id":1}"#, ErrorKind::InvalidPayload)]
    fn test_parse_rejected(#[case] line: &str, #[case] kind: ErrorKind) {
        let rejection = BridgeRequest::parse(line).unwrap_err();
        assert_eq!(rejection.kind, kind);
        assert_eq!(rejection.id, Some(1));
    }

    #[test]
    fn test_parse_garbage_has_no_id() {
        let rejection = BridgeRequest::parse("not json").unwrap_err();
        assert_eq!(rejection.kind, ErrorKind::InvalidPayload);
        assert_eq!(rejection.id, None);
    }

    #[test]
    fn test_operation_names_are_declared() {
        let operations = [
            Operation::Init,
            Operation::GetStatus,
            Operation::Capture(CapturePayload::default()),
            Operation::ListDevices,
            Operation::ConnectDevice(ConnectPayload {
                device_id: DeviceId::new(0x096e, 0x0001),
            }),
            Operation::Disconnect,
            Operation::Test,
            Operation::GetVersion,
            Operation::GetEnv,
        ];
        let names: Vec<_> = operations.iter().map(Operation::name).collect();
        assert_eq!(names, OPERATIONS);
        assert!(operations[2].is_biometric());
        assert!(!operations[7].is_biometric());
    }

    #[test]
    fn test_response_wire_shapes() {
        let ok = BridgeResponse::success(Some(3), json!({"version": "0.1.0"}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"id": 3, "ok": true, "data": {"version": "0.1.0"}})
        );

        let failed = BridgeResponse::failure(None, ErrorKind::NotInitialized, "Biometric device not initialized");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"ok": false, "error": {"kind": "NotInitializedError", "message": "Biometric device not initialized"}})
        );
    }

    #[test]
    fn test_response_rejects_mixed_shape() {
        let mixed = json!({"ok": false, "data": {}, "error": {"kind": "InternalError", "message": "x"}});
        assert!(serde_json::from_value::<BridgeResponse>(mixed).is_err());

        let missing = json!({"ok": false});
        assert!(serde_json::from_value::<BridgeResponse>(missing).is_err());
    }

    #[test]
    fn test_notification_wire_shape() {
        let event = DeviceEvent::Disconnected(DeviceDescriptor::new(0x096e, 0x0001, "Hamster"));
        let value = serde_json::to_value(Notification::from(&event)).unwrap();

        assert_eq!(value["event"], "device:disconnected");
        assert_eq!(value["device"]["vendorId"], 0x096e);
    }
}
