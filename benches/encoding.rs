//! Benchmarks for Tempest Relay encoding performance

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempest_relay::units::{MetricWxNormalizer, UnitNormalizer};
use tempest_relay::{encode_obs_st, encode_rapid_wind, Record, RelayConfig, StationIdentity};

fn generate_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::new()
                .with("dateTime", 1725909100 + i as i64 * 60)
                .with("usUnits", 1)
                .with("outTemp", 64.0 + (i as f64 % 10.0) * 0.1)
                .with("outHumidity", 80.0)
                .with("pressure", 29.63)
                .with("windSpeed", 1.3 + (i % 5) as f64)
                .with("windGust", 2.1 + (i % 7) as f64)
                .with("windGustDir", (i * 13 % 361) as f64)
                .with("dayRain", 0.0)
                .with("windBatteryStatus", 3.08)
                .with("interval", 5)
        })
        .collect()
}

fn bench_obs_st(c: &mut Criterion) {
    let mut group = c.benchmark_group("obs_st");

    let config = RelayConfig::sample();
    let identity = config.identity();
    let records = generate_records(1000);

    group.throughput(Throughput::Elements(1000));

    group.bench_function("encode_1000_records", |b| {
        b.iter(|| {
            for record in &records {
                let message = encode_obs_st(&identity, record, &config.sensor_map);
                black_box(message.ok());
            }
        })
    });

    group.bench_function("encode_to_json_1000_records", |b| {
        b.iter(|| {
            for record in &records {
                let json = encode_obs_st(&identity, record, &config.sensor_map)
                    .and_then(|m| m.to_json());
                black_box(json.ok());
            }
        })
    });

    group.finish();
}

fn bench_rapid_wind(c: &mut Criterion) {
    let mut group = c.benchmark_group("rapid_wind");

    let identity = StationIdentity::new("ST-00006021", "HB-12345678");
    let packets = generate_records(1000);

    group.throughput(Throughput::Elements(1000));

    group.bench_function("encode_to_json_1000_packets", |b| {
        b.iter(|| {
            for packet in &packets {
                let json = encode_rapid_wind(&identity, packet).and_then(|m| m.to_json());
                black_box(json.ok());
            }
        })
    });

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("units");

    let normalizer = MetricWxNormalizer::default();
    let records = generate_records(1000);

    group.throughput(Throughput::Elements(1000));

    group.bench_function("normalize_1000_us_records", |b| {
        b.iter(|| {
            for record in &records {
                black_box(normalizer.normalize(record));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_obs_st, bench_rapid_wind, bench_normalize);
criterion_main!(benches);
