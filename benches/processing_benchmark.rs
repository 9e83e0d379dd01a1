use brc_aggregator::processors::hashing::HashPolicy;
use brc_aggregator::processors::parser::{parse_lines, parse_value};
use brc_aggregator::processors::{Coordinator, ProbeStrategy, StationTable};
use brc_aggregator::EngineConfig;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Write;

// Deterministic measurement lines over `stations` distinct names
fn create_measurements(stations: usize, lines: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(lines * 16);
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    for _ in 0..lines {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let station = (state % stations as u64) as usize;
        let tenths = ((state >> 32) % 2000) as i64 - 1000;
        let sign = if tenths < 0 { "-" } else { "" };
        writeln!(
            out,
            "Station {};{}{}.{}",
            station,
            sign,
            tenths.abs() / 10,
            tenths.abs() % 10
        )
        .unwrap();
    }
    out
}

fn benchmark_parse_value(c: &mut Criterion) {
    c.bench_function("parse_value", |b| {
        b.iter(|| {
            for value in [&b"-99.9"[..], b"0.0", b"12.3", b"-4.5"] {
                black_box(parse_value(black_box(value)).unwrap());
            }
        })
    });
}

fn benchmark_hash_policies(c: &mut Criterion) {
    let data = create_measurements(10_000, 100_000);
    let mut group = c.benchmark_group("station_table");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for policy in HashPolicy::all() {
        for probe in [ProbeStrategy::Linear, ProbeStrategy::Quadratic] {
            let config = EngineConfig {
                hash: policy,
                probe,
                ..EngineConfig::default()
            };
            group.bench_with_input(
                BenchmarkId::new(policy.name(), format!("{:?}", probe)),
                &data,
                |b, data| {
                    b.iter(|| {
                        let mut table = StationTable::from_config(&config).unwrap();
                        parse_lines(data, 0, |name, value| table.record(name, value)).unwrap();
                        black_box(table.len())
                    })
                },
            );
        }
    }

    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let data = create_measurements(400, 500_000);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.sample_size(20);

    for workers in [1, 2, 4, 8] {
        let config = EngineConfig {
            workers,
            buffer_size: 256 * 1024,
            buffer_count: workers * 2,
            ..EngineConfig::default()
        };
        group.bench_with_input(BenchmarkId::new("workers", workers), &config, |b, config| {
            b.iter(|| {
                let mut coordinator = Coordinator::with_config(file.path(), config.clone()).unwrap();
                black_box(coordinator.run().unwrap().len())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_parse_value,
    benchmark_hash_policies,
    benchmark_pipeline
);
criterion_main!(benches);
