// ========================================================================================
//
//                       AUGUR PER-EXAMPLE UPDATE BENCHMARK
//
// ========================================================================================
//
// Measures the throughput of the single-example EP update and of read-only prediction
// as a function of the number of active features per example.
//
// ========================================================================================

use augur::progress::NoopTrainProgress;
use augur::{EpLogisticRegression, Example, FeatureActivation, ModelConfig};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// --- Benchmark Tuning Parameters ---

/// Size of the feature id space examples draw from.
const FEATURE_SPACE: i64 = 100_000;
/// Examples per measured batch.
const NUM_EXAMPLES: usize = 1_000;
/// Active features per example.
const ACTIVE_FEATURES: [usize; 4] = [4, 16, 64, 256];

fn config() -> ModelConfig {
    ModelConfig::new(0.1).expect("valid beta")
}

fn random_examples(active: usize, seed: u64) -> Vec<Example> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..NUM_EXAMPLES)
        .map(|_| {
            let features = (0..active)
                .map(|_| {
                    FeatureActivation::new(rng.gen_range(0..FEATURE_SPACE), rng.gen_range(0.1..2.0))
                })
                .collect();
            Example::new(features, if rng.gen_bool(0.3) { 1.0 } else { 0.0 })
        })
        .collect()
}

fn benchmark_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");
    for &active in &ACTIVE_FEATURES {
        let examples = random_examples(active, 0x5EED + active as u64);
        group.throughput(Throughput::Elements(NUM_EXAMPLES as u64));
        group.bench_with_input(BenchmarkId::from_parameter(active), &examples, |b, input| {
            b.iter(|| {
                let mut model = EpLogisticRegression::new(config());
                black_box(model.train(input, &mut NoopTrainProgress));
            });
        });
    }
    group.finish();
}

fn benchmark_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    for &active in &ACTIVE_FEATURES {
        let examples = random_examples(active, 0xF00D + active as u64);
        let mut model = EpLogisticRegression::new(config());
        model.train(&examples, &mut NoopTrainProgress);

        group.throughput(Throughput::Elements(NUM_EXAMPLES as u64));
        group.bench_with_input(BenchmarkId::from_parameter(active), &examples, |b, input| {
            b.iter(|| black_box(model.predict_all(input)));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_train, benchmark_predict);
criterion_main!(benches);
