//! Encode and decode throughput benchmarks
//!
//! Measures records/sec for:
//! - writing records from JSON documents and from `NativeObject` values
//! - reading them back as written
//! - reading them through a projecting reader schema
//!
//! # Configuration
//!
//! - `BENCH_SAMPLE_SIZE`: Number of samples to collect (default: 100)
//! - `BENCH_MEASUREMENT_TIME`: Measurement time in seconds (default: 5)
//! - `BENCH_WARM_UP_TIME`: Warm-up time in seconds (default: 3)
//!
//! ```bash
//! BENCH_SAMPLE_SIZE=50 BENCH_MEASUREMENT_TIME=3 cargo bench
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

use avro_marshal::{
    new_projecting_reader, new_reader, new_writer, DatumWriter, NativeObject, Schema, WriterConfig,
};
use serde_json::{json, Value};

const WRITER_SCHEMA: &str = r#"{"type": "record", "name": "Event", "fields": [
    {"name": "id", "type": "long"},
    {"name": "kind", "type": {"type": "enum", "name": "Kind", "symbols": ["OPEN", "CLOSE", "MOVE"]}},
    {"name": "user", "type": "string"},
    {"name": "score", "type": "double"},
    {"name": "tags", "type": {"type": "array", "items": "string"}},
    {"name": "attrs", "type": {"type": "map", "values": "int"}},
    {"name": "parent", "type": ["null", "long"]}
]}"#;

const READER_SCHEMA: &str = r#"{"type": "record", "name": "Event", "fields": [
    {"name": "user", "type": "string"},
    {"name": "id", "type": "double"},
    {"name": "region", "type": "string", "default": "unknown"}
]}"#;

/// Configure Criterion based on environment variables
fn configure_criterion() -> Criterion {
    let mut criterion = Criterion::default();

    if let Ok(sample_size) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(size) = sample_size.parse::<usize>() {
            criterion = criterion.sample_size(size);
        } else {
            eprintln!("Warning: Invalid BENCH_SAMPLE_SIZE value: {}", sample_size);
        }
    }

    if let Ok(measurement_time) = std::env::var("BENCH_MEASUREMENT_TIME") {
        if let Ok(secs) = measurement_time.parse::<u64>() {
            criterion = criterion.measurement_time(Duration::from_secs(secs));
        } else {
            eprintln!(
                "Warning: Invalid BENCH_MEASUREMENT_TIME value: {}",
                measurement_time
            );
        }
    }

    if let Ok(warm_up_time) = std::env::var("BENCH_WARM_UP_TIME") {
        if let Ok(secs) = warm_up_time.parse::<u64>() {
            criterion = criterion.warm_up_time(Duration::from_secs(secs));
        } else {
            eprintln!("Warning: Invalid BENCH_WARM_UP_TIME value: {}", warm_up_time);
        }
    }

    criterion
}

fn json_event(i: usize) -> Value {
    json!({
        "id": i,
        "kind": ["OPEN", "CLOSE", "MOVE"][i % 3],
        "user": format!("user-{}", i % 97),
        "score": i as f64 * 0.5,
        "tags": ["a", "bb", "ccc"],
        "attrs": {"x": i % 10, "y": 7},
        "parent": if i % 2 == 0 { Value::Null } else { json!(i - 1) }
    })
}

fn native_event(i: usize) -> NativeObject {
    let i64_value = i as i64;
    NativeObject::map([
        ("id", NativeObject::from(i64_value)),
        ("kind", NativeObject::symbol("Kind", ["OPEN", "CLOSE", "MOVE"][i % 3])),
        ("user", NativeObject::from(format!("user-{}", i % 97))),
        ("score", NativeObject::from(i as f64 * 0.5)),
        (
            "tags",
            NativeObject::list(["a", "bb", "ccc"].into_iter().map(NativeObject::from)),
        ),
        (
            "attrs",
            NativeObject::map([
                ("x", NativeObject::from(i64_value % 10)),
                ("y", NativeObject::from(7)),
            ]),
        ),
        (
            "parent",
            if i % 2 == 0 {
                NativeObject::Null
            } else {
                NativeObject::from(i64_value - 1)
            },
        ),
    ])
}

fn encoded_events(count: usize) -> Vec<u8> {
    let mut writer = new_writer(WRITER_SCHEMA).unwrap();
    let mut bytes = Vec::new();
    for i in 0..count {
        bytes.extend(writer.write(&json_event(i)).unwrap());
    }
    bytes
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");

    for count in [100usize, 10_000] {
        let json_events: Vec<Value> = (0..count).map(json_event).collect();
        let native_events: Vec<NativeObject> = (0..count).map(native_event).collect();
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("json", count), &json_events, |b, events| {
            let mut writer = new_writer(WRITER_SCHEMA).unwrap();
            b.iter(|| {
                for event in events {
                    black_box(writer.write(event).unwrap());
                }
            });
        });

        group.bench_with_input(
            BenchmarkId::new("native", count),
            &native_events,
            |b, events| {
                let mut writer = new_writer(WRITER_SCHEMA).unwrap();
                b.iter(|| {
                    for event in events {
                        black_box(writer.write(event).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_write_small_buffer(c: &mut Criterion) {
    let events: Vec<Value> = (0..1_000).map(json_event).collect();
    let mut group = c.benchmark_group("write_small_buffer");
    group.throughput(Throughput::Elements(events.len() as u64));

    group.bench_function("initial_16_bytes", |b| {
        b.iter(|| {
            // growth starts over on every iteration
            let schema = Schema::parse(WRITER_SCHEMA).unwrap();
            let config = WriterConfig::new().with_initial_buffer_size(16);
            let mut writer = DatumWriter::with_config(schema, config).unwrap();
            for event in &events {
                black_box(writer.write(event).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    for count in [100usize, 10_000] {
        let bytes = encoded_events(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("as_written", count), &bytes, |b, bytes| {
            let mut reader = new_reader(WRITER_SCHEMA).unwrap();
            b.iter(|| black_box(reader.read(bytes).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("projected", count), &bytes, |b, bytes| {
            let mut reader = new_projecting_reader(WRITER_SCHEMA, READER_SCHEMA).unwrap();
            b.iter(|| black_box(reader.read(bytes).unwrap()));
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = bench_write, bench_write_small_buffer, bench_read
}
criterion_main!(benches);
