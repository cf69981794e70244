//! Evaluation metrics for predicted probabilities against binary labels.
//!
//! Labels follow the training convention: `label > 0` is the positive class.

/// A scalar quality measure of a batch of predictions.
pub trait Metric {
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64;

    fn higher_is_better(&self) -> bool;

    fn name(&self) -> &'static str;
}

#[inline]
fn target(label: f64) -> f64 {
    if label > 0.0 { 1.0 } else { 0.0 }
}

// =============================================================================
// LogLoss (Binary Cross-Entropy)
// =============================================================================

/// Binary cross-entropy: -mean(y*log(p) + (1-y)*log(1-p))
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLoss;

impl Metric for LogLoss {
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64 {
        debug_assert_eq!(preds.len(), labels.len());
        if preds.is_empty() {
            return 0.0;
        }

        let eps = 1e-15f64; // Clip to avoid log(0)
        preds
            .iter()
            .zip(labels)
            .map(|(&p, &l)| {
                let p = p.clamp(eps, 1.0 - eps);
                let y = target(l);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f64>()
            / preds.len() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "logloss"
    }
}

// =============================================================================
// AUC (Area Under ROC Curve)
// =============================================================================

/// Probability that a random positive is ranked above a random negative.
///
/// Computed from ranks (Mann-Whitney U) with tied scores sharing their average
/// rank. Returns 0.5 when either class is absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Auc;

impl Metric for Auc {
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64 {
        debug_assert_eq!(preds.len(), labels.len());

        let n_pos = labels.iter().filter(|&&l| l > 0.0).count();
        let n_neg = labels.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return 0.5;
        }

        let mut order: Vec<usize> = (0..preds.len()).collect();
        order.sort_by(|&a, &b| preds[a].total_cmp(&preds[b]));

        let mut positive_rank_sum = 0.0;
        let mut start = 0;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len() && preds[order[end]] == preds[order[start]] {
                end += 1;
            }
            // Ranks are 1-based; ties share the mean of their ranks.
            let average_rank = (start + 1 + end) as f64 / 2.0;
            let positives_in_run = order[start..end]
                .iter()
                .filter(|&&i| labels[i] > 0.0)
                .count();
            positive_rank_sum += average_rank * positives_in_run as f64;
            start = end;
        }

        let n_pos = n_pos as f64;
        let n_neg = n_neg as f64;
        (positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "auc"
    }
}

// =============================================================================
// RMSE against {0, 1} targets
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Rmse;

impl Metric for Rmse {
    fn compute(&self, preds: &[f64], labels: &[f64]) -> f64 {
        debug_assert_eq!(preds.len(), labels.len());
        if preds.is_empty() {
            return 0.0;
        }
        let mse = preds
            .iter()
            .zip(labels)
            .map(|(&p, &l)| (p - target(l)).powi(2))
            .sum::<f64>()
            / preds.len() as f64;
        mse.sqrt()
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "rmse"
    }
}
