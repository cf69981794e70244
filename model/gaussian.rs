//! # Gaussian Belief Algebra
//!
//! Every quantity the model reasons about (a feature weight, the linear score of
//! an example) is summarized by a one-dimensional Gaussian belief. This module
//! owns that value type and the two operations the message-passing update is
//! built from:
//!
//! - **Product**: combining two independent Gaussian messages about the same
//!   quantity. In information form this is just adding precisions and
//!   precision-weighted means.
//! - **Truncated correction**: the Gaussian message which, multiplied into a
//!   score belief, yields the moment-matched approximation of that belief
//!   conditioned on the score having a given sign.
//!
//! The standard-normal primitives (Φ, φ) are thin wrappers over `statrs`.

use statrs::function::erf::erfc;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Below this standardized score, `Φ(z)` is too close to underflow for the
/// ratio `φ(z)/Φ(z)` to be computed by direct division.
const ASYMPTOTIC_CORRECTOR_THRESHOLD: f64 = -20.0;

/// A Gaussian belief over a scalar, stored in moment form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianBelief {
    pub mean: f64,
    pub variance: f64,
}

impl GaussianBelief {
    pub const fn new(mean: f64, variance: f64) -> Self {
        Self { mean, variance }
    }

    /// The zero-mean belief with the given variance.
    pub const fn centered(variance: f64) -> Self {
        Self {
            mean: 0.0,
            variance,
        }
    }

    /// The flat (infinite-variance) message. It is the identity of [`product`](Self::product).
    pub const fn uninformative() -> Self {
        Self {
            mean: 0.0,
            variance: f64::INFINITY,
        }
    }

    pub fn is_uninformative(&self) -> bool {
        self.variance.is_infinite()
    }

    /// Inverse variance.
    pub fn precision(&self) -> f64 {
        self.variance.recip()
    }

    /// `mean / variance`, the natural parameter paired with the precision.
    pub fn precision_mean(&self) -> f64 {
        self.mean / self.variance
    }

    /// Rebuilds a belief from its information-form parameters.
    ///
    /// A non-positive precision carries no information and maps to the
    /// uninformative message.
    pub fn from_information(precision: f64, precision_mean: f64) -> Self {
        if precision <= 0.0 {
            return Self::uninformative();
        }
        Self {
            mean: precision_mean / precision,
            variance: precision.recip(),
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// True when both moments are finite and the variance is strictly positive.
    pub fn is_valid(&self) -> bool {
        self.mean.is_finite() && self.variance.is_finite() && self.variance > 0.0
    }

    /// Combines two independent Gaussian messages about the same quantity.
    ///
    /// ```text
    /// c.variance = a.variance * b.variance / (a.variance + b.variance)
    /// c.mean     = (a.mean * b.variance + b.mean * a.variance) / (a.variance + b.variance)
    /// ```
    ///
    /// Callers guarantee `a.variance + b.variance > 0`. An uninformative operand
    /// returns the other one unchanged.
    pub fn product(&self, other: &Self) -> Self {
        if self.is_uninformative() {
            return *other;
        }
        if other.is_uninformative() {
            return *self;
        }
        let total = self.variance + other.variance;
        Self {
            mean: (self.mean * other.variance + other.mean * self.variance) / total,
            variance: self.variance * other.variance / total,
        }
    }

    /// Returns a copy with `extra` added to the variance (convolution with
    /// zero-mean Gaussian noise).
    pub fn with_added_variance(&self, extra: f64) -> Self {
        Self {
            mean: self.mean,
            variance: self.variance + extra,
        }
    }

    /// The moments of this belief truncated to the half-line selected by `sign`
    /// at zero, approximated by a Gaussian.
    pub fn truncated_moments(&self, sign: LabelSign) -> Self {
        let s = sign.as_f64();
        let sd = self.std_dev();
        let z = s * self.mean / sd;
        let (v, w) = correctors(z);
        Self {
            mean: self.mean + s * sd * v,
            variance: self.variance * (1.0 - w),
        }
    }

    /// The Gaussian message whose product with `self` reproduces
    /// [`truncated_moments`](Self::truncated_moments).
    ///
    /// Obtained by dividing the truncated belief by `self` in information form.
    pub fn truncated_correction(&self, sign: LabelSign) -> Self {
        let truncated = self.truncated_moments(sign);
        Self::from_information(
            truncated.precision() - self.precision(),
            truncated.precision_mean() - self.precision_mean(),
        )
    }
}

/// The half-line an observed label conditions the score onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSign {
    Positive,
    Negative,
}

impl LabelSign {
    /// `label > 0` is positive; everything else (zero included) is negative.
    pub fn from_label(label: f64) -> Self {
        if label > 0.0 {
            Self::Positive
        } else {
            Self::Negative
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

/// Standard normal density φ(z).
pub fn standard_normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

/// Standard normal CDF Φ(z), via the complementary error function so the
/// lower tail keeps full relative precision.
pub fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z * FRAC_1_SQRT_2)
}

/// Corrector functions for a Gaussian truncated at zero:
/// `v(z) = φ(z)/Φ(z)` and `w(z) = v(z) * (v(z) + z)`.
///
/// For `z` far in the lower tail both `φ` and `Φ` vanish; there the asymptotic
/// expansion of the Mills ratio is used instead,
/// `Φ(z)/φ(z) ≈ (1/-z) * (1 - 1/z² + 3/z⁴ - 15/z⁶ + 105/z⁸)`.
pub fn correctors(z: f64) -> (f64, f64) {
    let (v, v_plus_z) = if z < ASYMPTOTIC_CORRECTOR_THRESHOLD {
        let inv_z2 = (z * z).recip();
        // 1 - series, evaluated directly to avoid cancellation in v + z.
        let tail = inv_z2 * (1.0 - inv_z2 * (3.0 - inv_z2 * (15.0 - 105.0 * inv_z2)));
        let series = 1.0 - tail;
        (-z / series, -z * tail / series)
    } else {
        let v = standard_normal_pdf(z) / standard_normal_cdf(z);
        (v, v + z)
    };
    // w lies in [0, 1); rounding must not push the truncated variance to zero.
    let w = (v * v_plus_z).clamp(0.0, 1.0 - f64::EPSILON);
    (v, w)
}
