//! Throughput Benchmark for kvops
//!
//! Measures the pieces every operation goes through: serialization
//! strategies, RESP parsing and command dispatch in the embedded store.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use kvops::embedded::{CommandHandler, Store};
use kvops::protocol::{parse_message, Command, RespValue};
use kvops::{Role, SerializationStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize, Deserialize)]
struct Book {
    name: String,
    price: u32,
    tags: Vec<String>,
}

fn book() -> Book {
    Book {
        name: "Gone with the Wind".to_string(),
        price: 13000,
        tags: vec!["novel".to_string(), "classic".to_string()],
    }
}

/// Benchmark encode/decode per strategy
fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");
    group.throughput(Throughput::Elements(1));

    group.bench_function("raw_string_encode", |b| {
        b.iter(|| {
            black_box(
                SerializationStrategy::RawString
                    .encode(Role::Value, black_box(&13000i64))
                    .unwrap(),
            );
        });
    });

    for (name, strategy) in [
        ("json", SerializationStrategy::Json),
        ("binary", SerializationStrategy::Binary),
    ] {
        group.bench_function(format!("{name}_encode"), |b| {
            let value = book();
            b.iter(|| {
                black_box(strategy.encode(Role::Value, black_box(&value)).unwrap());
            });
        });

        group.bench_function(format!("{name}_decode"), |b| {
            let encoded = strategy.encode(Role::Value, &book()).unwrap();
            b.iter(|| {
                let decoded: Book = strategy.decode(Role::Value, black_box(&encoded)).unwrap();
                black_box(decoded);
            });
        });
    }

    group.finish();
}

/// Benchmark RESP parsing of typical replies
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Elements(1));

    let bulk = RespValue::bulk_string(Bytes::from("x".repeat(1024))).serialize();
    group.bench_function("bulk_1kb", |b| {
        b.iter(|| black_box(parse_message(black_box(&bulk)).unwrap()));
    });

    let array = RespValue::array(
        (0..100)
            .map(|i| RespValue::bulk_string(Bytes::from(format!("member:{i}"))))
            .collect(),
    )
    .serialize();
    group.bench_function("array_100", |b| {
        b.iter(|| black_box(parse_message(black_box(&array)).unwrap()));
    });

    group.finish();
}

/// Benchmark embedded dispatch for each data-structure family
fn bench_embedded(c: &mut Criterion) {
    let handler = CommandHandler::new(Arc::new(Store::new()));

    for i in 0..10_000 {
        handler.execute(
            Command::new("SET")
                .arg(format!("key:{i}"))
                .arg(format!("value:{i}"))
                .into_resp(),
        );
    }

    let mut group = c.benchmark_group("embedded");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let command = Command::new("SET").arg(format!("new:{i}")).arg("value");
            black_box(handler.execute(command.into_resp()));
            i += 1;
        });
    });

    group.bench_function("get", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let command = Command::new("GET").arg(format!("key:{}", i % 10_000));
            black_box(handler.execute(command.into_resp()));
            i += 1;
        });
    });

    group.bench_function("incrby", |b| {
        b.iter(|| {
            let command = Command::new("INCRBY").arg("counter").num(1);
            black_box(handler.execute(command.into_resp()));
        });
    });

    group.bench_function("lpush_rpop", |b| {
        b.iter(|| {
            handler.execute(Command::new("LPUSH").arg("queue").arg("job").into_resp());
            black_box(handler.execute(Command::new("RPOP").arg("queue").into_resp()));
        });
    });

    group.bench_function("zadd", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let command = Command::new("ZADD")
                .arg("ranking")
                .num(i % 1000)
                .arg(format!("member:{}", i % 1000));
            black_box(handler.execute(command.into_resp()));
            i += 1;
        });
    });

    group.bench_function("pfadd", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let command = Command::new("PFADD").arg("visitors").arg(format!("v{i}"));
            black_box(handler.execute(command.into_resp()));
            i += 1;
        });
    });

    group.finish();
}

criterion_group!(benches, bench_serialization, bench_parse, bench_embedded);

criterion_main!(benches);
