//! Benchmarks for the bridge JSON-lines codec.
//!
//! Run with:
//! ```sh
//! cargo bench --bench bridge_codec_bench
//! ```

use bioscan_bridge::{BridgeCodec, BridgeResponse, Inbound};
use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

const STATUS_REQUEST: &str = r#"{"id":1,"operation":"biometric.getStatus"}"#;
const CAPTURE_REQUEST: &str =
    r#"{"id":2,"operation":"biometric.capture","payload":{"deviceId":"0x2c0f_0x0005","quality":80}}"#;

/// A successful capture response carrying a full-size base64 template.
fn capture_response() -> BridgeResponse {
    BridgeResponse::success(
        Some(2),
        json!({
            "success": true,
            "template": "A".repeat(6828),
            "quality": 80,
            "timestamp": "2026-01-01T00:00:00Z",
            "deviceId": "0x2c0f_0x0005",
        }),
    )
}

fn bench_decode_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_request");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [("status", STATUS_REQUEST), ("capture", CAPTURE_REQUEST)] {
        let framed = format!("{line}\n");
        group.bench_with_input(BenchmarkId::from_parameter(name), &framed, |b, framed| {
            b.iter(|| {
                let mut codec = BridgeCodec::new();
                let mut buffer = BytesMut::from(framed.as_bytes());
                let item = codec.decode(&mut buffer).unwrap();
                assert!(matches!(item, Some(Inbound::Request(_))));
                black_box(item);
            });
        });
    }

    group.finish();
}

fn bench_encode_capture_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_capture_response");
    group.throughput(Throughput::Elements(1));

    let response = capture_response();

    group.bench_function("full_template", |b| {
        b.iter(|| {
            let mut codec = BridgeCodec::new();
            let mut buffer = BytesMut::new();
            codec.encode(black_box(response.clone()), &mut buffer).unwrap();
            black_box(buffer);
        });
    });

    group.finish();
}

/// Many pipelined requests arriving in one read.
fn bench_decode_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_batch");

    for batch_size in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(batch_size as u64));

        let mut encoded = String::new();
        for _ in 0..batch_size {
            encoded.push_str(STATUS_REQUEST);
            encoded.push('\n');
        }

        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut codec = BridgeCodec::new();
                let mut buffer = BytesMut::from(encoded.as_bytes());
                let mut count = 0;
                while let Some(item) = codec.decode(&mut buffer).unwrap() {
                    black_box(item);
                    count += 1;
                }
                assert_eq!(count, batch_size);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_decode_request,
    bench_encode_capture_response,
    bench_decode_batch
);
criterion_main!(benches);
