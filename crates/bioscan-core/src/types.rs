//! Descriptor, device id and capture result types.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_QUALITY, vendor_name};
use crate::error::{Error, Result};

/// One row of the vendor allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorEntry {
    pub name: &'static str,
    pub vendor_id: u16,
}

impl VendorEntry {
    pub const fn new(name: &'static str, vendor_id: u16) -> Self {
        Self { name, vendor_id }
    }
}

/// Stable textual identity of a reader, `0x{vid:04x}_0x{pid:04x}`.
///
/// # Examples
///
/// ```
/// use bioscan_core::DeviceId;
///
/// let id: DeviceId = "0x2c0f_0x0005".parse().unwrap();
/// assert_eq!(id.vendor_id(), 0x2c0f);
/// assert_eq!(id.product_id(), 0x0005);
/// assert!("2c0f:0005".parse::<DeviceId>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId {
    vendor_id: u16,
    product_id: u16,
}

impl DeviceId {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }
}

fn parse_hex_u16(part: &str, whole: &str) -> Result<u16> {
    let digits = part
        .strip_prefix("0x")
        .filter(|d| d.len() == 4)
        .ok_or_else(|| Error::InvalidDeviceId(whole.to_string()))?;
    u16::from_str_radix(digits, 16).map_err(|_| Error::InvalidDeviceId(whole.to_string()))
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (vendor, product) = s
            .split_once('_')
            .ok_or_else(|| Error::InvalidDeviceId(s.to_string()))?;
        Ok(Self::new(
            parse_hex_u16(vendor, s)?,
            parse_hex_u16(product, s)?,
        ))
    }
}

impl TryFrom<String> for DeviceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}_0x{:04x}", self.vendor_id, self.product_id)
    }
}

/// Identity of an attached reader as read from its USB device descriptor.
///
/// Descriptors are values: they are produced by enumeration and never
/// mutated afterwards. Two descriptors naming the same vendor/product pair
/// compare equal regardless of display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub display_name: String,
}

impl DeviceDescriptor {
    pub fn new(vendor_id: u16, product_id: u16, display_name: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            display_name: display_name.into(),
        }
    }

    /// Build a descriptor named after the allow-listed vendor.
    ///
    /// Falls back to the device id when the vendor is not on the list.
    pub fn from_ids(vendor_id: u16, product_id: u16) -> Self {
        let display_name = match vendor_name(vendor_id) {
            Some(vendor) => format!("{vendor} {}", DeviceId::new(vendor_id, product_id)),
            None => DeviceId::new(vendor_id, product_id).to_string(),
        };
        Self::new(vendor_id, product_id, display_name)
    }

    pub fn id(&self) -> DeviceId {
        DeviceId::new(self.vendor_id, self.product_id)
    }

    pub fn vendor_name(&self) -> Option<&'static str> {
        vendor_name(self.vendor_id)
    }

    pub fn is_allowed(&self) -> bool {
        self.vendor_name().is_some()
    }
}

impl PartialEq for DeviceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.vendor_id == other.vendor_id && self.product_id == other.product_id
    }
}

impl Eq for DeviceDescriptor {}

impl std::hash::Hash for DeviceDescriptor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.vendor_id.hash(state);
        self.product_id.hash(state);
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id())
    }
}

/// Outcome of exactly one capture attempt.
///
/// On the wire this is the flat object
/// `{success, template?, quality?, error?}`; in Rust the two legal shapes are
/// separate variants so a half-filled result cannot be constructed.
///
/// # Examples
///
/// ```
/// use bioscan_core::CaptureResult;
///
/// let ok = CaptureResult::from_template(b"ridge-data", 70);
/// let json = serde_json::to_value(&ok).unwrap();
/// assert_eq!(json["success"], true);
/// assert_eq!(json["quality"], 70);
/// assert!(json.get("error").is_none());
///
/// let failed = CaptureResult::failed("Invalid fingerprint captured");
/// let json = serde_json::to_value(&failed).unwrap();
/// assert_eq!(json["success"], false);
/// assert!(json.get("template").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "CaptureResultWire", try_from = "CaptureResultWire")]
pub enum CaptureResult {
    /// Template captured; `template` is standard padded base64.
    Captured { template: String, quality: u8 },
    /// Capture attempt failed with a human-readable reason.
    Failed { error: String },
}

impl CaptureResult {
    /// Encode raw template bytes into a successful result.
    ///
    /// Quality above [`MAX_QUALITY`] is clamped.
    pub fn from_template(bytes: &[u8], quality: u8) -> Self {
        CaptureResult::Captured {
            template: STANDARD.encode(bytes),
            quality: quality.min(MAX_QUALITY),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        CaptureResult::Failed {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaptureResult::Captured { .. })
    }

    pub fn template(&self) -> Option<&str> {
        match self {
            CaptureResult::Captured { template, .. } => Some(template),
            CaptureResult::Failed { .. } => None,
        }
    }

    pub fn quality(&self) -> Option<u8> {
        match self {
            CaptureResult::Captured { quality, .. } => Some(*quality),
            CaptureResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CaptureResult::Captured { .. } => None,
            CaptureResult::Failed { error } => Some(error),
        }
    }

    /// Decode the base64 template back into raw bytes.
    pub fn template_bytes(&self) -> Option<Vec<u8>> {
        self.template().and_then(|t| STANDARD.decode(t).ok())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaptureResultWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<CaptureResult> for CaptureResultWire {
    fn from(result: CaptureResult) -> Self {
        match result {
            CaptureResult::Captured { template, quality } => Self {
                success: true,
                template: Some(template),
                quality: Some(quality),
                error: None,
            },
            CaptureResult::Failed { error } => Self {
                success: false,
                template: None,
                quality: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<CaptureResultWire> for CaptureResult {
    type Error = Error;

    fn try_from(wire: CaptureResultWire) -> Result<Self> {
        match wire {
            CaptureResultWire {
                success: true,
                template: Some(template),
                quality: Some(quality),
                error: None,
            } if quality <= MAX_QUALITY => Ok(CaptureResult::Captured { template, quality }),
            CaptureResultWire {
                success: false,
                template: None,
                quality: None,
                error: Some(error),
            } => Ok(CaptureResult::Failed { error }),
            _ => Err(Error::InvalidCaptureResult(
                "success requires template and quality; failure requires error only".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_device_id_format() {
        let descriptor = DeviceDescriptor::new(0x096e, 0x0001, "Hamster");
        assert_eq!(descriptor.id().to_string(), "0x096e_0x0001");
        assert_eq!(descriptor.to_string(), "Hamster (0x096e_0x0001)");
    }

    #[rstest]
    #[case("0x096e_0x0001", Some((0x096e, 0x0001)))]
    #[case("0x2C0F_0x0005", Some((0x2c0f, 0x0005)))]
    #[case("0x096e-0x0001", None)]
    #[case("096e_0001", None)]
    #[case("0x96e_0x0001", None)]
    #[case("0xzzzz_0x0001", None)]
    #[case("", None)]
    fn test_device_id_parse(#[case] input: &str, #[case] expected: Option<(u16, u16)>) {
        let parsed = input.parse::<DeviceId>().ok();
        assert_eq!(parsed.map(|id| (id.vendor_id(), id.product_id())), expected);
    }

    #[test]
    fn test_from_ids_uses_vendor_name() {
        let descriptor = DeviceDescriptor::from_ids(0x1162, 0x0320);
        assert_eq!(descriptor.display_name, "Futronic 0x1162_0x0320");
        assert!(descriptor.is_allowed());

        let unknown = DeviceDescriptor::from_ids(0x046d, 0xc52b);
        assert_eq!(unknown.display_name, "0x046d_0xc52b");
        assert!(!unknown.is_allowed());
    }

    #[test]
    fn test_descriptor_equality_ignores_display_name() {
        let a = DeviceDescriptor::new(0x096e, 0x0001, "A");
        let b = DeviceDescriptor::new(0x096e, 0x0001, "B");
        assert_eq!(a, b);
    }

    #[test]
    fn test_descriptor_serializes_camel_case() {
        let descriptor = DeviceDescriptor::new(0x096e, 0x0001, "Hamster");
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            json,
            json!({"vendorId": 0x096e, "productId": 1, "displayName": "Hamster"})
        );
    }

    #[test]
    fn test_success_encodes_standard_base64() {
        let result = CaptureResult::from_template(&[0xFF, 0x00, 0x10], 70);
        assert_eq!(result.template(), Some("/wAQ"));
        assert_eq!(result.quality(), Some(70));
        assert_eq!(result.template_bytes(), Some(vec![0xFF, 0x00, 0x10]));
    }

    #[test]
    fn test_quality_is_clamped() {
        let result = CaptureResult::from_template(b"x", 250);
        assert_eq!(result.quality(), Some(MAX_QUALITY));
    }

    #[rstest]
    #[case(json!({"success": true, "template": "AA==", "quality": 70, "error": "x"}))]
    #[case(json!({"success": true, "template": "AA=="}))]
    #[case(json!({"success": false}))]
    #[case(json!({"success": false, "error": "x", "quality": 10}))]
    #[case(json!({"success": true, "template": "AA==", "quality": 101}))]
    fn test_rejects_mixed_shapes(#[case] value: serde_json::Value) {
        assert!(serde_json::from_value::<CaptureResult>(value).is_err());
    }

    proptest! {
        #[test]
        fn prop_exactly_one_shape(bytes in proptest::collection::vec(any::<u8>(), 0..512),
                                  quality in 0u8..=255,
                                  fail in any::<bool>(),
                                  message in "[a-zA-Z ]{1,40}") {
            let result = if fail {
                CaptureResult::failed(message)
            } else {
                CaptureResult::from_template(&bytes, quality)
            };

            let json = serde_json::to_value(&result).unwrap();
            let success = json["success"].as_bool().unwrap();
            let has_template = json.get("template").is_some();
            let has_quality = json.get("quality").is_some();
            let has_error = json.get("error").is_some();

            prop_assert_eq!(success, has_template);
            prop_assert_eq!(success, has_quality);
            prop_assert_eq!(success, !has_error);

            let back: CaptureResult = serde_json::from_value(json).unwrap();
            prop_assert_eq!(back, result);
        }
    }
}
