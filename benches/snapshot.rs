use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

mod support;

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_ranked");
    group.measurement_time(support::duration_env("RANKMAP_BENCH_MEASUREMENT_SECS", 10.0));
    group.warm_up_time(support::duration_env("RANKMAP_BENCH_WARMUP_SECS", 3.0));
    group.sample_size(support::usize_env("RANKMAP_BENCH_SAMPLE_SIZE", 10));

    for n in [1_000usize, 100_000] {
        let board = support::build_board(&support::uniform_random(n, n as f64 / 4.0));
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(BenchmarkId::new("copies", n), |b| {
            b.iter(|| black_box(board.snapshot_ranked().len()))
        });
        group.bench_function(BenchmarkId::new("rank_pairs", n), |b| {
            b.iter(|| black_box(board.snapshot_ranked_with(|rank, e| (rank, e.score)).len()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_snapshot);
criterion_main!(benches);
