use std::hint::black_box;
use std::io::{self, Cursor};
use std::thread;

use arkiv_stream::{FanOutOptions, FanOutPump, PumpOptions, copy};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

const TOTAL_BYTES: usize = 8 * 1024 * 1024;

fn fan_out(data: &[u8], readers: usize, capacity: usize) -> u64 {
    let mut pump = FanOutPump::spawn(
        Cursor::new(data.to_vec()),
        readers,
        FanOutOptions::new().capacity(capacity),
        PumpOptions::new().chunk_size(capacity / 2),
    )
    .unwrap();
    let consumers: Vec<_> = pump
        .readers()
        .into_iter()
        .map(|mut reader| thread::spawn(move || copy(&mut reader, &mut io::sink()).unwrap()))
        .collect();
    let total = consumers.into_iter().map(|c| c.join().unwrap()).sum();
    pump.join().unwrap();
    total
}

fn bench_reader_count(c: &mut Criterion) {
    let data = vec![0x5Au8; TOTAL_BYTES];
    let mut group = c.benchmark_group("fanout_readers");
    group.throughput(Throughput::Bytes(TOTAL_BYTES as u64));
    group.sample_size(10);

    for readers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("readers", readers), &readers, |b, &readers| {
            b.iter(|| black_box(fan_out(&data, readers, 64 * 1024)));
        });
    }
    group.finish();
}

fn bench_capacity(c: &mut Criterion) {
    let data = vec![0xA5u8; TOTAL_BYTES];
    let mut group = c.benchmark_group("fanout_capacity");
    group.throughput(Throughput::Bytes(TOTAL_BYTES as u64));
    group.sample_size(10);

    for capacity in [4 * 1024usize, 64 * 1024, 1024 * 1024] {
        group.bench_with_input(BenchmarkId::new("capacity", capacity), &capacity, |b, &capacity| {
            b.iter(|| black_box(fan_out(&data, 3, capacity)));
        });
    }
    group.finish();
}

fn bench_copy(c: &mut Criterion) {
    let data = vec![0x11u8; TOTAL_BYTES];
    let mut group = c.benchmark_group("copy");
    group.throughput(Throughput::Bytes(TOTAL_BYTES as u64));

    group.bench_function("cursor_to_sink", |b| {
        b.iter(|| {
            let mut source = Cursor::new(&data);
            black_box(copy(&mut source, &mut io::sink()).unwrap())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_reader_count, bench_capacity, bench_copy);
criterion_main!(benches);
