use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use factor::{Factor, Workforce};

fn refine_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("refine");
    for size in [10u32, 16, 20] {
        let conditioned: Vec<u32> = (0..size).collect();
        group.bench_with_input(BenchmarkId::new("serial", size), &size, |b, _| {
            b.iter_batched(
                || Factor::new(conditioned.clone(), vec![], None).unwrap(),
                |mut f| f.refine(0, true, 0.5, Workforce::Serial).unwrap(),
                criterion::BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("parallel", size), &size, |b, _| {
            b.iter_batched(
                || Factor::new(conditioned.clone(), vec![], None).unwrap(),
                |mut f| f.refine(0, true, 0.5, Workforce::Parallel).unwrap(),
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn combine_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine");
    for size in [8u32, 10, 12] {
        let a: Vec<u32> = (0..size).collect();
        let b_args: Vec<u32> = (size..2 * size).collect();
        let fa = Factor::new(a, vec![], None).unwrap();
        let fb = Factor::new(b_args, vec![], None).unwrap();
        group.bench_with_input(BenchmarkId::new("serial", size), &size, |bencher, _| {
            bencher.iter(|| fa.combine(&fb, Workforce::Serial).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("parallel", size), &size, |bencher, _| {
            bencher.iter(|| fa.combine(&fb, Workforce::Parallel).unwrap())
        });
    }
    group.finish();
}

fn marginalize_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("marginalize");
    for size in [10u32, 16, 20] {
        let conditioned: Vec<u32> = (0..size).collect();
        let factor = Factor::new(conditioned, vec![], None).unwrap();
        group.bench_with_input(BenchmarkId::new("serial", size), &size, |bencher, _| {
            bencher.iter(|| factor.marginalize(&[0, 1], Workforce::Serial))
        });
        group.bench_with_input(BenchmarkId::new("parallel", size), &size, |bencher, _| {
            bencher.iter(|| factor.marginalize(&[0, 1], Workforce::Parallel))
        });
    }
    group.finish();
}

criterion_group!(benches, refine_benchmark, combine_benchmark, marginalize_benchmark);
criterion_main!(benches);
