//! # Online EP Logistic Regression
//!
//! The model owns one [`WeightPosteriorStore`] and one [`ModelConfig`]. Training
//! streams examples through the update in [`crate::ep`] one at a time, in order;
//! prediction reads the store and never writes it.
//!
//! An example's update is staged in full before anything is written back, so a
//! numerically failed example leaves every previously learned belief intact.

use crate::config::{ConfigError, ModelConfig};
use crate::ep::{self, ScoreUpdate};
use crate::gaussian::{GaussianBelief, standard_normal_cdf};
use crate::progress::TrainProgressObserver;
use crate::store::{StoreError, WeightPosteriorStore};
use crate::types::{Example, FeatureActivation, FeatureId};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error(
        "Update of feature {feature} produced an invalid belief (mean {mean}, variance {variance}); example rejected."
    )]
    NonFiniteUpdate {
        feature: FeatureId,
        mean: f64,
        variance: f64,
    },
    #[error("Example produced an invalid score posterior (mean {mean}, variance {variance}).")]
    NonFiniteScore { mean: f64, variance: f64 },
}

/// Outcome counts of a pass over a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainSummary {
    pub examples_seen: usize,
    pub examples_trained: usize,
    /// Examples without any active feature.
    pub examples_skipped: usize,
    /// Examples whose update failed and was discarded.
    pub examples_rejected: usize,
}

#[derive(Debug, Clone)]
pub struct EpLogisticRegression {
    config: ModelConfig,
    store: WeightPosteriorStore,
}

impl EpLogisticRegression {
    pub fn new(config: ModelConfig) -> Self {
        log::info!(
            "Initialized EP logistic regression (beta = {}, init_var = {})",
            config.beta(),
            config.init_var()
        );
        Self {
            store: WeightPosteriorStore::new(config.init_var()),
            config,
        }
    }

    /// Parses the string parameter map and allocates an empty store.
    pub fn init(params: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self::new(ModelConfig::from_params(params)?))
    }

    /// Discards all learned beliefs. The configuration is kept.
    pub fn clear(&mut self) {
        log::info!("Clearing {} feature beliefs", self.store.len());
        self.store.clear();
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn store(&self) -> &WeightPosteriorStore {
        &self.store
    }

    /// The learned belief of `id`, or `None` if the feature was never seen.
    pub fn belief(&self, id: FeatureId) -> Option<GaussianBelief> {
        self.store.lookup(id)
    }

    /// Forward aggregate over the store without touching it.
    ///
    /// Activations with a non-finite value carry no usable evidence and are
    /// left out, so the aggregate stays finite.
    pub fn score(&self, features: &[FeatureActivation]) -> GaussianBelief {
        ep::forward_aggregate(
            features
                .iter()
                .filter(|f| f.is_active() && f.value.is_finite())
                .map(|f| (f.value, self.store.get(f.id))),
        )
    }

    /// Probability that the example's label is positive, always in `[0, 1]`.
    pub fn predict(&self, features: &[FeatureActivation]) -> f64 {
        let t = self.score(features).with_added_variance(self.config.beta());
        if t.variance > 0.0 {
            standard_normal_cdf(t.mean / t.std_dev())
        } else if t.mean > 0.0 {
            1.0
        } else if t.mean < 0.0 {
            0.0
        } else {
            0.5
        }
    }

    pub fn predict_all(&self, examples: &[Example]) -> Vec<f64> {
        examples.iter().map(|e| self.predict(&e.features)).collect()
    }

    /// Applies the EP update of a single example.
    ///
    /// Returns `Ok(false)` if the example has no active feature. On error no
    /// belief has been modified.
    pub fn train_example(&mut self, example: &Example) -> Result<bool, TrainError> {
        if example.active_features().next().is_none() {
            return Ok(false);
        }

        let s0 = ep::forward_aggregate(
            example
                .active_features()
                .map(|f| (f.value, self.store.get_or_create(f.id))),
        );
        let update = ep::correct_label(s0, self.config.beta(), example.label);
        if !update.posterior.is_valid() {
            return Err(TrainError::NonFiniteScore {
                mean: update.posterior.mean,
                variance: update.posterior.variance,
            });
        }
        log::debug!(
            "Score prior N({:.6}, {:.6}) -> posterior N({:.6}, {:.6})",
            s0.mean,
            s0.variance,
            update.posterior.mean,
            update.posterior.variance
        );

        let staged = self.stage_updates(example, &update)?;
        for (id, belief) in staged {
            self.store.set(id, belief);
        }
        Ok(true)
    }

    /// Computes the new belief of every active feature. A repeated id sees the
    /// belief staged by its earlier occurrence.
    fn stage_updates(
        &self,
        example: &Example,
        update: &ScoreUpdate,
    ) -> Result<Vec<(FeatureId, GaussianBelief)>, TrainError> {
        let mut staged: Vec<(FeatureId, GaussianBelief)> =
            Vec::with_capacity(example.features.len());
        for feature in example.active_features() {
            let current = staged
                .iter()
                .rev()
                .find(|(id, _)| *id == feature.id)
                .map(|&(_, belief)| belief)
                .unwrap_or_else(|| self.store.get(feature.id));

            let init_var = self.config.init_var();
            let updated = ep::update_weight(update, current, feature.value, init_var);
            if !updated.is_valid() {
                return Err(TrainError::NonFiniteUpdate {
                    feature: feature.id,
                    mean: updated.mean,
                    variance: updated.variance,
                });
            }
            staged.push((feature.id, updated));
        }
        Ok(staged)
    }

    /// Trains on every example in sequence. Failed examples are logged and
    /// skipped; they never abort the pass.
    pub fn train<'a, I, O>(&mut self, examples: I, observer: &mut O) -> TrainSummary
    where
        I: IntoIterator<Item = &'a Example>,
        I::IntoIter: ExactSizeIterator,
        O: TrainProgressObserver + ?Sized,
    {
        let examples = examples.into_iter();
        observer.on_start(examples.len());

        let mut summary = TrainSummary::default();
        for (index, example) in examples.enumerate() {
            summary.examples_seen += 1;
            match self.train_example(example) {
                Ok(true) => summary.examples_trained += 1,
                Ok(false) => summary.examples_skipped += 1,
                Err(err) => {
                    log::warn!("Example {}: {err}", index + 1);
                    summary.examples_rejected += 1;
                }
            }
            observer.on_advance(index + 1);
        }

        log::info!(
            "Trained on {} of {} examples ({} without active features, {} rejected); {} features",
            summary.examples_trained,
            summary.examples_seen,
            summary.examples_skipped,
            summary.examples_rejected,
            self.store.len()
        );
        observer.on_finish(&summary);
        summary
    }

    pub fn save_model(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        self.store.save(path)
    }

    /// Merges the beliefs of a saved model file into the store.
    pub fn load_model(&mut self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        self.store.load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopTrainProgress;
    use approx::assert_relative_eq;

    fn model() -> EpLogisticRegression {
        EpLogisticRegression::new(ModelConfig::new(0.1).unwrap())
    }

    #[test]
    fn init_parses_params() {
        let params = HashMap::from([("beta".to_string(), "0.1".to_string())]);
        let model = EpLogisticRegression::init(&params).unwrap();
        assert_eq!(model.config().beta(), 0.1);
        assert!(model.store().is_empty());
    }

    #[test]
    fn unseen_features_predict_one_half() {
        let model = model();
        let p = model.predict(&[FeatureActivation::new(5, 1.0), FeatureActivation::new(6, -2.0)]);
        assert_relative_eq!(p, 0.5, epsilon = 1e-15);
        assert!(model.store().is_empty());
    }

    #[test]
    fn invalid_params_never_reach_a_model() {
        let negative = HashMap::from([("beta".to_string(), "-5.0".to_string())]);
        assert!(matches!(
            EpLogisticRegression::init(&negative),
            Err(ConfigError::OutOfRange { .. })
        ));

        let params = HashMap::from([
            ("beta".to_string(), "0.1".to_string()),
            ("init_var".to_string(), "0.0".to_string()),
        ]);
        let mut model = EpLogisticRegression::init(&params).unwrap();
        assert_eq!(model.config().init_var(), crate::config::INIT_VAR);
        assert!(model.train_example(&Example::from_pairs(&[(1, 1.0)], 1.0)).unwrap());
    }

    #[test]
    fn non_finite_activations_are_ignored_by_predict() {
        let mut model = model();
        model.train_example(&Example::from_pairs(&[(1, 1.0)], 1.0)).unwrap();
        let clean = model.predict(&[FeatureActivation::new(1, 1.0)]);
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let features = [FeatureActivation::new(1, 1.0), FeatureActivation::new(2, bad)];
            let p = model.predict(&features);
            assert_eq!(p, clean);
            assert!((0.0..=1.0).contains(&p));
        }
        assert_eq!(model.predict(&[FeatureActivation::new(1, f64::NAN)]), 0.5);
    }

    #[test]
    fn empty_prediction_with_zero_noise_is_one_half() {
        let model = EpLogisticRegression::new(ModelConfig::new(0.0).unwrap());
        assert_eq!(model.predict(&[]), 0.5);
    }

    #[test]
    fn example_without_active_features_is_noop() {
        let mut model = model();
        let example = Example::from_pairs(&[(1, 0.0), (2, 0.0)], 1.0);
        assert!(!model.train_example(&example).unwrap());
        assert!(model.store().is_empty());
        assert!(!model.train_example(&Example::new(vec![], 1.0)).unwrap());
    }

    #[test]
    fn zero_valued_features_are_not_updated() {
        let mut model = model();
        model
            .train_example(&Example::from_pairs(&[(1, 1.0), (2, 0.0)], 1.0))
            .unwrap();
        assert!(model.belief(1).is_some());
        assert!(model.belief(2).is_none());
    }

    #[test]
    fn positive_label_raises_mean_and_shrinks_variance() {
        let mut model = model();
        model
            .train_example(&Example::from_pairs(&[(1, 1.0)], 1.0))
            .unwrap();
        let w = model.belief(1).unwrap();
        assert!(w.mean > 0.0);
        assert!(w.variance < 1.0);
        assert!(model.predict(&[FeatureActivation::new(1, 1.0)]) > 0.5);
    }

    #[test]
    fn negative_label_lowers_mean() {
        let mut model = model();
        model
            .train_example(&Example::from_pairs(&[(1, 1.0)], -1.0))
            .unwrap();
        assert!(model.belief(1).unwrap().mean < 0.0);
        assert!(model.predict(&[FeatureActivation::new(1, 1.0)]) < 0.5);
    }

    #[test]
    fn repeated_id_chains_updates() {
        let mut model = model();
        model
            .train_example(&Example::from_pairs(&[(1, 1.0), (1, 1.0)], 1.0))
            .unwrap();

        let prior = GaussianBelief::centered(1.0);
        let s0 = ep::forward_aggregate([(1.0, prior), (1.0, prior)]);
        let update = ep::correct_label(s0, 0.1, 1.0);
        let first = ep::update_weight(&update, prior, 1.0, 1.0);
        let second = ep::update_weight(&update, first, 1.0, 1.0);

        assert_eq!(model.store().len(), 1);
        assert_eq!(model.belief(1).unwrap(), second);
    }

    #[test]
    fn rejected_example_leaves_beliefs_untouched() {
        let mut model = model();
        model
            .train_example(&Example::from_pairs(&[(1, 1.0)], 1.0))
            .unwrap();
        let before = model.belief(1).unwrap();

        let poisoned = Example::from_pairs(&[(1, 1.0), (2, f64::NAN)], 1.0);
        assert!(model.train_example(&poisoned).is_err());
        assert_eq!(model.belief(1).unwrap(), before);
    }

    #[test]
    fn train_counts_outcomes() {
        let mut model = model();
        let examples = vec![
            Example::from_pairs(&[(1, 1.0)], 1.0),
            Example::from_pairs(&[(1, 0.0)], 1.0),
            Example::from_pairs(&[(2, f64::INFINITY)], 0.0),
            Example::from_pairs(&[(3, 0.5), (4, 2.0)], 0.0),
        ];
        let summary = model.train(&examples, &mut NoopTrainProgress);
        assert_eq!(
            summary,
            TrainSummary {
                examples_seen: 4,
                examples_trained: 2,
                examples_skipped: 1,
                examples_rejected: 1,
            }
        );
    }

    #[test]
    fn clear_restores_fresh_predictions() {
        let mut model = model();
        let features = [FeatureActivation::new(1, 1.0)];
        model
            .train_example(&Example::new(features.to_vec(), 1.0))
            .unwrap();
        model.clear();
        assert!(model.store().is_empty());
        assert_eq!(model.predict(&features), 0.5);
        assert_eq!(model.config().beta(), 0.1);
    }
}
