//! Message processing performance benchmarks.
//!
//! Measures wire-codec throughput for the JSON-RPC envelope (component A)
//! and the SSE incremental parser (component B) across a range of payload
//! sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mcp_endpoint_rt::jsonrpc::{JsonRpcMessage, RequestId};
use mcp_endpoint_rt::sse::SseParser;

/// A `tools/call` request carrying a payload of the given size (in KB).
fn create_test_request(size_kb: usize) -> JsonRpcMessage {
    let data = "x".repeat(size_kb * 1024);
    JsonRpcMessage::request(
        RequestId::new_string(format!("req_{size_kb}")),
        "tools/call",
        Some(serde_json::json!({"name": "search", "arguments": {"data": data}})),
    )
}

/// A `notifications/progress` notification carrying a payload of the given
/// size (in KB).
fn create_test_notification(size_kb: usize) -> JsonRpcMessage {
    let data = "y".repeat(size_kb * 1024);
    JsonRpcMessage::notification(
        "notifications/progress",
        Some(serde_json::json!({"progressToken": "t", "progress": 0.5, "message": data})),
    )
}

fn benchmark_message_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_serialization");

    for size_kb in [1, 10, 100].iter() {
        let request = create_test_request(*size_kb);
        let notification = create_test_notification(*size_kb);

        group.throughput(Throughput::Bytes((*size_kb * 1024) as u64));

        group.bench_with_input(BenchmarkId::new("request_to_line", size_kb), size_kb, |b, _| {
            b.iter(|| black_box(request.to_line()).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("notification_to_line", size_kb), size_kb, |b, _| {
            b.iter(|| black_box(notification.to_line()).unwrap());
        });
    }

    group.finish();
}

fn benchmark_message_deserialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_deserialization");

    for size_kb in [1, 10, 100].iter() {
        let request_line = create_test_request(*size_kb).to_line().unwrap();
        let notification_line = create_test_notification(*size_kb).to_line().unwrap();

        group.throughput(Throughput::Bytes((*size_kb * 1024) as u64));

        group.bench_with_input(BenchmarkId::new("request_from_line", size_kb), size_kb, |b, _| {
            b.iter(|| black_box(JsonRpcMessage::from_line(&request_line)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("notification_from_line", size_kb), size_kb, |b, _| {
            b.iter(|| black_box(JsonRpcMessage::from_line(&notification_line)).unwrap());
        });
    }

    group.finish();
}

/// Throughput of feeding a batch of framed SSE `message` events through the
/// incremental parser, as the SSE+HTTP transport's read loop does per chunk.
fn benchmark_sse_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("sse_parsing");

    for batch_len in [8, 64, 512].iter() {
        let frame = create_test_request(1).to_line().unwrap();
        let batch: String = (0..*batch_len).map(|_| format!("event: message\ndata: {frame}\n\n")).collect();
        group.throughput(Throughput::Elements(*batch_len as u64));

        group.bench_with_input(BenchmarkId::new("feed_batch", batch_len), batch_len, |b, _| {
            b.iter(|| {
                let mut parser = SseParser::new();
                let mut count = 0usize;
                for line in batch.lines() {
                    if parser.feed_line(line).is_some() {
                        count += 1;
                    }
                }
                black_box(count)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_message_serialization,
    benchmark_message_deserialization,
    benchmark_sse_parsing
);
criterion_main!(benches);
