//! # Expectation-Propagation Update
//!
//! One training example is a tiny factor graph: every active feature weight
//! `w_i ~ N(μ_i, σ²_i)` feeds a linear score `s = Σ x_i w_i`, the score is
//! blurred by observation noise `β` into `t`, and the label observes the sign
//! of `t`. A single forward/backward sweep over that graph is performed:
//!
//! 1. [`forward_aggregate`] sums the weighted weight beliefs into `s`.
//! 2. [`correct_label`] truncates `t` to the label's half-line and sends the
//!    correction back down to a new score posterior.
//! 3. [`update_weight`] divides each feature's own contribution out of the
//!    score update, multiplies the resulting message into the weight belief,
//!    then applies decay toward the prior and the variance floor.

use crate::gaussian::{GaussianBelief, LabelSign};

/// Share of the current belief retained by the dynamics step.
pub const DECAY_RETAIN: f64 = 0.99;
/// Share of the prior mixed back in by the dynamics step.
pub const DECAY_REVERT: f64 = 0.01;
/// The variance floor as a fraction of `init_var`.
pub const VARIANCE_FLOOR_FRACTION: f64 = 0.01;

/// The score beliefs before and after observing a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreUpdate {
    /// Forward aggregate `s0`, before the label was seen.
    pub prior: GaussianBelief,
    /// Posterior aggregate `s = s0 · s2`.
    pub posterior: GaussianBelief,
}

/// Sums independent weight beliefs scaled by their activation values.
///
/// `s.mean = Σ x_i μ_i`, `s.variance = Σ x_i² σ²_i`. Zero-valued activations
/// are skipped.
pub fn forward_aggregate<I>(contributions: I) -> GaussianBelief
where
    I: IntoIterator<Item = (f64, GaussianBelief)>,
{
    contributions
        .into_iter()
        .filter(|(value, _)| *value != 0.0)
        .fold(GaussianBelief::new(0.0, 0.0), |acc, (value, w)| {
            GaussianBelief::new(
                acc.mean + value * w.mean,
                acc.variance + value * value * w.variance,
            )
        })
}

/// Incorporates the binary label into the forward aggregate `s0`.
pub fn correct_label(s0: GaussianBelief, beta: f64, label: f64) -> ScoreUpdate {
    let t = s0.with_added_variance(beta);
    let correction = t.truncated_correction(LabelSign::from_label(label));
    let t = t.product(&correction);
    let s2 = t.with_added_variance(beta);
    ScoreUpdate {
        prior: s0,
        posterior: s0.product(&s2),
    }
}

/// The message from the score back to one weight: the score update with this
/// feature's own contribution removed, undoing the activation scaling.
///
/// `value` must be non-zero.
pub fn backward_message(
    update: &ScoreUpdate,
    weight: GaussianBelief,
    value: f64,
) -> GaussianBelief {
    let s = update.posterior;
    let s0 = update.prior;
    let value_sq = value * value;
    GaussianBelief::new(
        (s.mean - (s0.mean - weight.mean * value)) / value,
        (s.variance + (s0.variance - weight.variance * value_sq)) / value_sq,
    )
}

/// Decays a freshly updated belief toward the prior `(0, init_var)` and clamps
/// its variance at `init_var * VARIANCE_FLOOR_FRACTION`.
///
/// The mean is recomputed from the pre-decay precision in the retained term
/// and the post-decay variance in the prior term.
pub fn apply_dynamics(updated: GaussianBelief, init_var: f64) -> GaussianBelief {
    let prior = GaussianBelief::centered(init_var);
    let v_old = updated.variance;
    let v_new = v_old * prior.variance / (DECAY_RETAIN * prior.variance + DECAY_REVERT * v_old);
    let mean = v_new * (DECAY_RETAIN * updated.mean / v_old + DECAY_REVERT * prior.mean / v_new);
    let floor = init_var * VARIANCE_FLOOR_FRACTION;
    GaussianBelief::new(mean, v_new.max(floor))
}

/// Full backward step for one active feature.
pub fn update_weight(
    update: &ScoreUpdate,
    weight: GaussianBelief,
    value: f64,
    init_var: f64,
) -> GaussianBelief {
    let message = backward_message(update, weight, value);
    apply_dynamics(weight.product(&message), init_var)
}
