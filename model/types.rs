// ========================================================================================
//
//                       CORE DATA TYPES FOR THE AUGUR ENGINE
//
// ========================================================================================
//
// This module holds the value types shared across the architectural boundaries of the
// crate (`data`, `ep`, `regression`, `main`). Types used by a single file live there.

/// Sparse feature identifier.
pub type FeatureId = i64;

/// One entry of an example's sparse feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureActivation {
    pub id: FeatureId,
    pub value: f64,
}

impl FeatureActivation {
    pub const fn new(id: FeatureId, value: f64) -> Self {
        Self { id, value }
    }

    /// Zero-valued activations are inert: they neither contribute to the score
    /// nor receive an update.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.value != 0.0
    }
}

/// A labeled sparse example. Only the sign of `label` matters to training.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub features: Vec<FeatureActivation>,
    pub label: f64,
}

impl Example {
    pub fn new(features: Vec<FeatureActivation>, label: f64) -> Self {
        Self { features, label }
    }

    /// Convenience constructor from `(id, value)` pairs.
    pub fn from_pairs(pairs: &[(FeatureId, f64)], label: f64) -> Self {
        Self {
            features: pairs
                .iter()
                .map(|&(id, value)| FeatureActivation::new(id, value))
                .collect(),
            label,
        }
    }

    /// Iterates the activations that take part in aggregation, in input order.
    pub fn active_features(&self) -> impl Iterator<Item = &FeatureActivation> {
        self.features.iter().filter(|f| f.is_active())
    }

    pub fn is_positive(&self) -> bool {
        self.label > 0.0
    }
}
