//! Candidate training and best-by-R² selection
//!
//! Fits the preprocessor on the training split only, trains every candidate
//! on the encoded rows and keeps the one with the highest held-out R².

use propval_core::ensemble::{to_fixed, TreeEnsemble, SCALE};
use propval_core::pipeline::{PipelineArtifact, Preprocessor};
use propval_core::{CandidateMetrics, FeatureMetadata};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::candidates::{default_candidates, BoostingConfig, Candidate, ForestConfig};
use crate::dataset::{FeatureSpec, TrainingSet};
use crate::errors::TrainerError;
use crate::metrics;

pub const MODEL_FILE: &str = "best_model.json";
pub const METADATA_FILE: &str = "model_meta.json";

/// Training configuration
#[derive(Clone, Debug)]
pub struct TrainingParams {
    pub seed: i64,
    pub test_fraction: f64,
    pub boosting: BoostingConfig,
    pub forest: ForestConfig,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            seed: 42,
            test_fraction: 0.2,
            boosting: BoostingConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}

/// One evaluated candidate
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateReport {
    pub name: String,
    pub metrics: CandidateMetrics,
}

/// Winning pipeline, its metadata and the full ranking
#[derive(Clone, Debug)]
pub struct TrainingOutcome {
    pub artifact: PipelineArtifact,
    pub metadata: FeatureMetadata,
    /// Sorted by test R², best first
    pub ranking: Vec<CandidateReport>,
}

/// Files written by [`TrainingOutcome::persist`]
#[derive(Clone, Debug)]
pub struct PersistedArtifacts {
    pub model_path: PathBuf,
    pub metadata_path: PathBuf,
    pub model_hash: String,
}

impl TrainingOutcome {
    /// Write the artifact, its digest and the metadata record into `dir`
    pub fn persist(&self, dir: &Path) -> Result<PersistedArtifacts, TrainerError> {
        std::fs::create_dir_all(dir).map_err(propval_core::CoreError::from)?;

        let model_path = dir.join(MODEL_FILE);
        let model_hash = self.artifact.save(&model_path)?;

        let metadata_path = dir.join(METADATA_FILE);
        self.metadata.save(&metadata_path)?;

        Ok(PersistedArtifacts {
            model_path,
            metadata_path,
            model_hash,
        })
    }
}

/// Trains the candidate line-up and selects the winner
pub struct ModelTrainer {
    params: TrainingParams,
    spec: FeatureSpec,
    candidates: Vec<Candidate>,
}

impl ModelTrainer {
    pub fn new(params: TrainingParams, spec: FeatureSpec) -> Self {
        let candidates = default_candidates(&params.boosting, &params.forest);
        Self {
            params,
            spec,
            candidates,
        }
    }

    /// Replace the candidate line-up
    pub fn with_candidates(mut self, candidates: Vec<Candidate>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn train(&self, set: &TrainingSet) -> Result<TrainingOutcome, TrainerError> {
        if self.candidates.is_empty() {
            return Err(TrainerError::Training("no candidates configured".to_string()));
        }

        let (train, test) = set.split(self.params.test_fraction, self.params.seed)?;
        info!(train = train.len(), test = test.len(), "split dataset");

        let preprocessor = Preprocessor::fit(&train.rows, &self.spec.categorical, &self.spec.numeric);
        info!(encoded_width = preprocessor.width(), "preprocessor fitted");

        let x_train = encode(&preprocessor, &train)?;
        let x_test = encode(&preprocessor, &test)?;
        let y_train: Vec<i64> = train.targets.iter().map(|&t| to_fixed(t)).collect();

        let mut best: Option<(f64, &Candidate, TreeEnsemble)> = None;
        let mut ranking = Vec::with_capacity(self.candidates.len());

        for candidate in &self.candidates {
            info!("Training {}...", candidate.name());
            let model = candidate.fit(&x_train, &y_train, self.params.seed)?;

            let metrics = metrics::evaluate(
                &train.targets,
                &predict(&model, &x_train),
                &test.targets,
                &predict(&model, &x_test),
            );
            info!(
                candidate = candidate.name(),
                train_r2 = metrics.train_r2,
                test_r2 = metrics.test_r2,
                test_mae = metrics.test_mae,
                test_rmse = metrics.test_rmse,
                "candidate evaluated"
            );

            // Strictly greater: the earlier candidate keeps a tie
            let improves = best.as_ref().map_or(metrics.test_r2.is_finite(), |(best_r2, _, _)| {
                metrics.test_r2 > *best_r2
            });
            if improves {
                best = Some((metrics.test_r2, candidate, model));
            }

            ranking.push(CandidateReport {
                name: candidate.name().to_string(),
                metrics,
            });
        }

        let (best_r2, winner, model) = best.ok_or_else(|| {
            TrainerError::Training("no candidate produced a finite test R²".to_string())
        })?;

        ranking.sort_by(|a, b| b.metrics.test_r2.total_cmp(&a.metrics.test_r2));
        info!(best_model = winner.name(), test_r2 = best_r2, "best model selected");

        let results: BTreeMap<String, CandidateMetrics> = ranking
            .iter()
            .map(|report| (report.name.clone(), report.metrics.clone()))
            .collect();
        let metadata = self.spec.to_metadata(winner.name(), results);
        let artifact = PipelineArtifact::new(winner.name(), self.spec.features(), preprocessor, model);

        Ok(TrainingOutcome {
            artifact,
            metadata,
            ranking,
        })
    }
}

fn encode(preprocessor: &Preprocessor, set: &TrainingSet) -> Result<Vec<Vec<i64>>, TrainerError> {
    set.rows
        .iter()
        .map(|row| {
            preprocessor
                .encode(row)
                .map_err(|e| TrainerError::Training(e.to_string()))
        })
        .collect()
}

fn predict(model: &TreeEnsemble, x: &[Vec<i64>]) -> Vec<f64> {
    x.iter()
        .map(|row| model.score(row) as f64 / SCALE as f64)
        .collect()
}
