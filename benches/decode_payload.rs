/// Benchmarks for per-message work done by the listen loop: decoding and preview rendering.
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use reconnecting_ws::types::{LogLine, Payload};
use reconnecting_ws::ws::{LogLineParser, MessageParser as _};

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload/decode");

    let log_line = r#"{"service":"karaf","line":"2024-05-01 12:00:00,123 | INFO  | FelixStartLevel | Bundle started"}"#;
    group.throughput(Throughput::Bytes(log_line.len() as u64));
    group.bench_function("LogLine", |b| {
        b.iter(|| LogLineParser.decode(std::hint::black_box(log_line).to_owned()));
    });

    let raw = "Connected to log stream for all services";
    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("Raw fallback", |b| {
        b.iter(|| LogLineParser.decode(std::hint::black_box(raw).to_owned()));
    });

    group.finish();
}

fn bench_preview(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload/preview");

    let parsed: Payload<LogLine> = Payload::Parsed(
        LogLine::builder()
            .service("postgresql")
            .line("x".repeat(500))
            .build(),
    );
    group.bench_function("Parsed", |b| {
        b.iter(|| std::hint::black_box(&parsed).preview());
    });

    let raw: Payload<LogLine> = Payload::Raw("y".repeat(500));
    group.bench_function("Raw", |b| {
        b.iter(|| std::hint::black_box(&raw).preview());
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_preview);
criterion_main!(benches);
