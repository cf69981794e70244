use approx::{assert_abs_diff_eq, assert_relative_eq};
use augur::data::{ExampleReader, LoadOptions};
use augur::gaussian::standard_normal_cdf;
use augur::metrics::{Auc, Metric};
use augur::progress::NoopTrainProgress;
use augur::{EpLogisticRegression, Example, FeatureActivation, GaussianBelief, ModelConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::io::Cursor;
use tempfile::tempdir;

fn init(beta: &str) -> EpLogisticRegression {
    let params = HashMap::from([("beta".to_string(), beta.to_string())]);
    EpLogisticRegression::init(&params).expect("valid params")
}

#[test]
fn single_positive_example_end_to_end() {
    let mut model = init("0.1");
    model
        .train_example(&Example::from_pairs(&[(1, 1.0)], 1.0))
        .unwrap();

    let w = model.belief(1).expect("feature 1 learned");
    assert!(w.mean > 0.0);
    assert!(w.variance < model.config().init_var());
    assert!(model.predict(&[FeatureActivation::new(1, 1.0)]) > 0.5);
}

#[test]
fn unseen_features_predict_phi_zero() {
    let model = init("0.1");
    let p = model.predict(&[FeatureActivation::new(11, 1.0), FeatureActivation::new(12, 3.0)]);
    assert_abs_diff_eq!(p, standard_normal_cdf(0.0), epsilon = 1e-15);
    assert_abs_diff_eq!(p, 0.5, epsilon = 1e-15);
}

#[test]
fn unseen_feature_acts_as_explicit_prior() {
    let mut model = init("0.3");
    model
        .train_example(&Example::from_pairs(&[(1, 1.0)], 1.0))
        .unwrap();
    let features = [FeatureActivation::new(1, 1.0), FeatureActivation::new(99, 2.0)];
    let with_unseen = model.predict(&features);

    let w1 = model.belief(1).unwrap();
    let prior = GaussianBelief::centered(model.config().init_var());
    let mean = w1.mean + 2.0 * prior.mean;
    let variance = w1.variance + 4.0 * prior.variance + model.config().beta();
    assert_relative_eq!(
        with_unseen,
        standard_normal_cdf(mean / variance.sqrt()),
        max_relative = 1e-14
    );
    assert!(model.belief(99).is_none());
}

#[test]
fn repeated_training_converges_to_variance_floor() {
    let mut model = init("0.1");
    let example = Example::from_pairs(&[(1, 1.0)], 1.0);
    let floor = model.config().init_var() * 0.01;
    let mut previous = model.config().init_var();

    for _ in 0..2_000 {
        model.train_example(&example).unwrap();
        let variance = model.belief(1).unwrap().variance;
        assert!(variance >= floor, "variance {variance} fell below floor");
        assert!(variance <= previous + 1e-12);
        previous = variance;
    }
    assert_relative_eq!(previous, floor, max_relative = 0.05);
}

#[test]
fn clear_behaves_like_fresh_model() {
    let mut model = init("0.1");
    let fresh = init("0.1");
    model
        .train_example(&Example::from_pairs(&[(1, 1.0), (2, -0.5)], 1.0))
        .unwrap();
    model.clear();

    assert!(model.store().is_empty());
    let features = [FeatureActivation::new(1, 1.0), FeatureActivation::new(2, -0.5)];
    assert_eq!(model.predict(&features), fresh.predict(&features));
}

#[test]
fn save_load_preserves_predictions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.tsv");

    let mut model = init("0.1");
    let data = "1 1:1 2:0.5\n0 2:1 3:1\n1 1:2 3:-1\n0 4:1\n";
    let examples: Vec<Example> = ExampleReader::new(Cursor::new(data), LoadOptions::default())
        .collect::<Result<_, _>>()
        .unwrap();
    model.train(&examples, &mut NoopTrainProgress);
    model.save_model(&path).unwrap();

    let mut reloaded = init("0.1");
    assert_eq!(reloaded.load_model(&path).unwrap(), model.store().len());
    for (id, belief) in model.store().iter() {
        assert_eq!(reloaded.belief(id), Some(belief));
    }
    assert_eq!(model.predict_all(&examples), reloaded.predict_all(&examples));
}

#[test]
fn learns_separable_signal() {
    let mut rng = StdRng::seed_from_u64(7);
    let true_weights = [1.5, -1.5, 0.8, -0.8, 0.0];
    let make = |rng: &mut StdRng| {
        let features: Vec<FeatureActivation> = (0..true_weights.len())
            .filter(|_| rng.gen_bool(0.6))
            .map(|i| FeatureActivation::new(i as i64, 1.0))
            .collect();
        let score: f64 = features.iter().map(|f| true_weights[f.id as usize]).sum();
        let label = if score + rng.gen_range(-0.3..0.3) > 0.0 { 1.0 } else { -1.0 };
        Example::new(features, label)
    };

    let train: Vec<Example> = (0..2_000).map(|_| make(&mut rng)).collect();
    let test: Vec<Example> = (0..500).map(|_| make(&mut rng)).collect();

    let mut model = EpLogisticRegression::new(ModelConfig::new(0.1).unwrap());
    let summary = model.train(&train, &mut NoopTrainProgress);
    assert_eq!(summary.examples_rejected, 0);

    assert!(model.belief(0).unwrap().mean > 0.0);
    assert!(model.belief(1).unwrap().mean < 0.0);

    let preds = model.predict_all(&test);
    let labels: Vec<f64> = test.iter().map(|e| e.label).collect();
    assert!(preds.iter().all(|p| (0.0..=1.0).contains(p)));
    assert!(Auc.compute(&preds, &labels) > 0.9);
}
