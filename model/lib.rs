#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod data;
pub mod ep;
pub mod gaussian;
pub mod metrics;
pub mod progress;
pub mod regression;
pub mod store;
pub mod types;

pub use config::{ConfigError, ModelConfig};
pub use gaussian::GaussianBelief;
pub use regression::{EpLogisticRegression, TrainError, TrainSummary};
pub use store::{StoreError, WeightPosteriorStore};
pub use types::{Example, FeatureActivation, FeatureId};
