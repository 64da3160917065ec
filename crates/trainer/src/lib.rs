//! Propval Trainer - offline model selection for the price service
//!
//! Cleans the housing dataset, fits gradient boosting, random forest and
//! extra-trees candidates, and persists the best one by held-out R² together
//! with the feature metadata the serving layer reads.

pub mod candidates;
pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod metrics;
pub mod trainer;

use propval_core::Dataset;
use std::path::Path;

pub use candidates::{BoostingConfig, Candidate, ForestConfig};
pub use dataset::{prepare, FeatureSpec, TrainingSet};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::TrainerError;
pub use trainer::{CandidateReport, ModelTrainer, PersistedArtifacts, TrainingOutcome, TrainingParams};

/// Train every candidate directly from a CSV file with the default feature layout.
pub fn train_from_csv(path: &Path, params: TrainingParams) -> Result<TrainingOutcome, TrainerError> {
    let dataset = Dataset::load(path).map_err(|err| TrainerError::Dataset(err.to_string()))?;
    let spec = FeatureSpec::default();
    let set = prepare(&dataset, &spec)?;
    ModelTrainer::new(params, spec).train(&set)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
