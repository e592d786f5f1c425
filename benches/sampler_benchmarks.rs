//! Benchmarks for derivation and sampling

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use densim::gibbs::{derive, Bounds, DensitySpec, GibbsSampler, HistogramGrid};
use densim::symbolic::Engine;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn fixtures() -> Vec<(&'static str, DensitySpec)> {
    vec![
        (
            "linear",
            DensitySpec::new("(2*x+3*y+2)/28", Bounds::new(0.0, 2.0), Bounds::new(0.0, 2.0)),
        ),
        (
            "quadratic",
            DensitySpec::new("4*x*y", Bounds::new(0.1, 0.9), Bounds::new(0.1, 0.9)),
        ),
        (
            "mixed",
            DensitySpec::new("4*x*(1-y)", Bounds::new(0.1, 0.9), Bounds::new(0.1, 0.9)),
        ),
    ]
}

fn bench_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("derivation");
    let engine = Engine::new();

    for (name, spec) in fixtures() {
        group.bench_with_input(BenchmarkId::new("derive", name), &spec, |b, spec| {
            b.iter(|| derive(&engine, black_box(spec)));
        });
    }

    group.finish();
}

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");
    let engine = Engine::new();

    for (name, spec) in fixtures() {
        let model = match derive(&engine, &spec).model {
            Some(model) => model,
            None => continue,
        };
        let sampler = GibbsSampler::new(&engine, &model).unwrap();
        let start = (spec.x_bounds.midpoint(), spec.y_bounds.midpoint());

        for steps in [1_000usize, 10_000] {
            group.throughput(Throughput::Elements(steps as u64));
            group.bench_with_input(BenchmarkId::new(name, steps), &steps, |b, &steps| {
                let mut rng = StdRng::seed_from_u64(42);
                b.iter(|| sampler.run(start, black_box(steps), 0, &mut rng));
            });
        }
    }

    group.finish();
}

fn bench_histogram(c: &mut Criterion) {
    let bounds = Bounds::new(0.0, 1.0);
    let xs: Vec<f64> = (0..100_000).map(|i| (i % 997) as f64 / 997.0).collect();
    let ys: Vec<f64> = (0..100_000).map(|i| (i % 991) as f64 / 991.0).collect();

    c.bench_function("histogram_20x20", |b| {
        b.iter(|| {
            HistogramGrid::from_samples(black_box(&xs), black_box(&ys), &bounds, &bounds, 20)
        });
    });
}

criterion_group!(benches, bench_derivation, bench_sampling, bench_histogram);
criterion_main!(benches);
