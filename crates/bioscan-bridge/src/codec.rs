//! Newline-delimited JSON framing for the bridge.
//!
//! [`BridgeCodec`] plugs the wire contract into tokio's `FramedRead` /
//! `FramedWrite`. A malformed line is not a stream error: it decodes to
//! [`Inbound::Rejected`] so the server can answer it and keep reading.
//! Lines over the frame limit are dropped up to the next newline and
//! reported once.
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//! use bioscan_bridge::{BridgeCodec, Inbound, Operation};
//!
//! let mut codec = BridgeCodec::new();
//! let mut buffer = BytesMut::from(&b"{\"operation\":\"app.getVersion\"}\n"[..]);
//!
//! match codec.decode(&mut buffer).unwrap() {
//!     Some(Inbound::Request(request)) => assert_eq!(request.operation, Operation::GetVersion),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{BridgeError, Result};
use crate::protocol::{BridgeRequest, BridgeResponse, Notification, Rejection};

/// Default maximum line length in bytes (64 KiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Frame bytes kept free for everything in a capture response except the
/// template itself.
pub const RESPONSE_ENVELOPE_RESERVE: usize = 1024;

/// Largest raw template whose base64 capture response fits in one frame.
pub const fn max_template_bytes(max_frame_size: usize) -> usize {
    max_frame_size.saturating_sub(RESPONSE_ENVELOPE_RESERVE) / 4 * 3
}

/// One decoded request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Request(BridgeRequest),
    Rejected(Rejection),
}

/// JSON-lines codec for bridge traffic.
#[derive(Debug)]
pub struct BridgeCodec {
    max_frame_size: usize,
    /// Where to resume the newline search in the read buffer.
    next_index: usize,
    /// Inside an oversized line that was already reported.
    discarding: bool,
}

impl BridgeCodec {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn oversized(&self) -> Inbound {
        Inbound::Rejected(Rejection::invalid_payload(format!(
            "Request line exceeds {} bytes",
            self.max_frame_size
        )))
    }

    /// Decode a complete line without its terminator. `None` for blank lines.
    fn decode_line(&self, line: &[u8]) -> Option<Inbound> {
        if line.len() > self.max_frame_size {
            return Some(self.oversized());
        }

        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(_) => {
                return Some(Inbound::Rejected(Rejection::invalid_payload(
                    "Request is not valid UTF-8",
                )));
            }
        };
        if text.is_empty() {
            return None;
        }

        Some(match BridgeRequest::parse(text) {
            Ok(request) => Inbound::Request(request),
            Err(rejection) => Inbound::Rejected(rejection),
        })
    }

    fn encode_json<T: Serialize>(&self, item: &T, dst: &mut BytesMut) -> Result<()> {
        let bytes = serde_json::to_vec(item)?;
        if bytes.len() > self.max_frame_size {
            return Err(BridgeError::FrameTooLarge {
                size: bytes.len(),
                max_size: self.max_frame_size,
            });
        }

        dst.reserve(bytes.len() + 1);
        dst.extend_from_slice(&bytes);
        dst.put_u8(b'\n');
        Ok(())
    }
}

impl Default for BridgeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BridgeCodec {
    type Item = Inbound;
    type Error = BridgeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>> {
        loop {
            let start = self.next_index.min(src.len());
            let Some(offset) = src[start..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_frame_size {
                    src.clear();
                    self.next_index = 0;
                    if !self.discarding {
                        self.discarding = true;
                        return Ok(Some(self.oversized()));
                    }
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(start + offset + 1);
            self.next_index = 0;
            if self.discarding {
                self.discarding = false;
                continue;
            }

            if let Some(inbound) = self.decode_line(&line[..line.len() - 1]) {
                return Ok(Some(inbound));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>> {
        if let Some(inbound) = self.decode(src)? {
            return Ok(Some(inbound));
        }

        // Final line without a terminator.
        let rest = src.split();
        self.next_index = 0;
        if std::mem::take(&mut self.discarding) {
            return Ok(None);
        }
        Ok(self.decode_line(&rest))
    }
}

impl Encoder<BridgeResponse> for BridgeCodec {
    type Error = BridgeError;

    fn encode(&mut self, item: BridgeResponse, dst: &mut BytesMut) -> Result<()> {
        self.encode_json(&item, dst)
    }
}

impl Encoder<Notification> for BridgeCodec {
    type Error = BridgeError;

    fn encode(&mut self, item: Notification, dst: &mut BytesMut) -> Result<()> {
        self.encode_json(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{NotificationEvent, Operation};
    use bioscan_core::{CaptureResult, ErrorKind};

    fn decode_all(codec: &mut BridgeCodec, buffer: &mut BytesMut) -> Vec<Inbound> {
        let mut items = Vec::new();
        while let Some(item) = codec.decode(buffer).unwrap() {
            items.push(item);
        }
        items
    }

    #[test]
    fn test_largest_template_response_fits() {
        let limit = max_template_bytes(DEFAULT_MAX_FRAME_SIZE);
        let result = CaptureResult::from_template(&vec![0xFF; limit], 100);
        let response = BridgeResponse::success(Some(u64::MAX), serde_json::to_value(result).unwrap());

        let mut buffer = BytesMut::new();
        BridgeCodec::new().encode(response, &mut buffer).unwrap();
        assert!(buffer.len() <= DEFAULT_MAX_FRAME_SIZE + 1);

        let too_big = CaptureResult::from_template(&vec![0xFF; DEFAULT_MAX_FRAME_SIZE], 100);
        let response = BridgeResponse::success(Some(1), serde_json::to_value(too_big).unwrap());
        let error = BridgeCodec::new().encode(response, &mut BytesMut::new()).unwrap_err();
        assert!(matches!(error, BridgeError::FrameTooLarge { .. }));
    }

    #[test]
    fn test_codec_defaults() {
        assert_eq!(BridgeCodec::new().max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(BridgeCodec::default().max_frame_size(), 64 * 1024);
    }

    #[test]
    fn test_decode_partial_then_complete() {
        let mut codec = BridgeCodec::new();
        let mut buffer = BytesMut::from(&b"{\"id\":4,\"operation\":\"biom"[..]);
        assert!(codec.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"etric.init\"}\r\n");
        let item = codec.decode(&mut buffer).unwrap();
        assert_eq!(
            item,
            Some(Inbound::Request(BridgeRequest::new(Some(4), Operation::Init)))
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_decode_multiple_lines_skips_blank() {
        let mut codec = BridgeCodec::new();
        let mut buffer = BytesMut::from(
            &b"{\"operation\":\"app.getVersion\"}\n\n   \n{\"operation\":\"nope\"}\n"[..],
        );

        let items = decode_all(&mut codec, &mut buffer);

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Inbound::Request(r) if r.operation == Operation::GetVersion));
        assert!(matches!(&items[1], Inbound::Rejected(r) if r.kind == ErrorKind::UnknownOperation));
    }

    #[test]
    fn test_oversized_line_reported_once() {
        let mut codec = BridgeCodec::with_max_frame_size(32);
        let mut buffer = BytesMut::from(&[b'x'; 40][..]);

        let first = codec.decode(&mut buffer).unwrap();
        assert!(matches!(first, Some(Inbound::Rejected(ref r)) if r.kind == ErrorKind::InvalidPayload));

        buffer.extend_from_slice(&[b'y'; 40]);
        assert!(codec.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"zz\n{\"operation\":\"app.getEnv\"}\n");
        let items = decode_all(&mut codec, &mut buffer);
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Inbound::Request(r) if r.operation == Operation::GetEnv));
    }

    #[test]
    fn test_complete_oversized_line_rejected() {
        let mut codec = BridgeCodec::with_max_frame_size(16);
        let mut buffer = BytesMut::from(&b"{\"operation\":\"app.getVersion\"}\n"[..]);

        let item = codec.decode(&mut buffer).unwrap();
        assert!(matches!(item, Some(Inbound::Rejected(_))));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut codec = BridgeCodec::new();
        let mut buffer = BytesMut::from(&b"\xff\xfe\n"[..]);

        let item = codec.decode(&mut buffer).unwrap();
        assert!(matches!(item, Some(Inbound::Rejected(ref r)) if r.kind == ErrorKind::InvalidPayload));
    }

    #[test]
    fn test_decode_eof_without_newline() {
        let mut codec = BridgeCodec::new();
        let mut buffer = BytesMut::from(&b"{\"operation\":\"biometric.test\"}"[..]);

        let item = codec.decode_eof(&mut buffer).unwrap();
        assert!(matches!(item, Some(Inbound::Request(ref r)) if r.operation == Operation::Test));
        assert!(codec.decode_eof(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_encode_response_and_notification() {
        let mut codec = BridgeCodec::new();
        let mut buffer = BytesMut::new();

        codec
            .encode(
                BridgeResponse::failure(Some(9), ErrorKind::DeviceBusy, "Biometric device busy"),
                &mut buffer,
            )
            .unwrap();
        codec
            .encode(
                Notification {
                    event: NotificationEvent::DeviceConnected,
                    device: None,
                },
                &mut buffer,
            )
            .unwrap();

        let text = std::str::from_utf8(&buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(text.ends_with('\n'));
        assert_eq!(
            lines[0],
            r#"{"id":9,"ok":false,"error":{"kind":"DeviceBusyError","message":"Biometric device busy"}}"#
        );
        assert_eq!(lines[1], r#"{"event":"device:connected"}"#);
    }

    #[test]
    fn test_encode_rejects_oversized_frame() {
        let mut codec = BridgeCodec::with_max_frame_size(8);
        let mut buffer = BytesMut::new();

        let error = codec
            .encode(BridgeResponse::success(None, serde_json::json!({"k": "long value"})), &mut buffer)
            .unwrap_err();

        assert!(matches!(error, BridgeError::FrameTooLarge { max_size: 8, .. }));
        assert!(buffer.is_empty());
    }
}
