use abundance_filter::{
    BootstrapEnsembleBuilder, FrequencyDistribution, SequenceId, ThresholdEstimator,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// A few dominant sequences over a long tail of low-count noise
fn synthetic_sample() -> FrequencyDistribution {
    let entries = (0..500u64).map(|i| {
        let count = match i {
            0..=9 => 1000 / (i + 1),
            10..=99 => 3,
            _ => 1,
        };
        (SequenceId::new(format!("seq{}", i)), count)
    });
    FrequencyDistribution::from_counts(entries).expect("distinct ids")
}

fn bench_bootstrap(c: &mut Criterion) {
    let sample = synthetic_sample();

    c.bench_function("build_ensemble_100", |b| {
        let builder = BootstrapEnsembleBuilder::new(100).expect("positive replicates");
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| builder.build(black_box(&sample), &mut rng).expect("non-empty sample"))
    });

    c.bench_function("estimate_threshold_1000", |b| {
        let estimator = ThresholdEstimator::default();
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            estimator
                .estimate_with_rng(black_box(&sample), &mut rng)
                .expect("non-empty sample")
        })
    });
}

criterion_group!(benches, bench_bootstrap);
criterion_main!(benches);
