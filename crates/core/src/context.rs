//! Process-wide serving state
//!
//! A [`ServingContext`] bundles the metadata, the pipeline and the optional
//! dataset. It is immutable once built; reload builds a fresh one off to the
//! side and publishes it with a single pointer swap, so a request sees either
//! the old triple or the new one, never a mix.

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::align::FeatureAligner;
use crate::dataset::Dataset;
use crate::errors::{CoreError, Result};
use crate::metadata::FeatureMetadata;
use crate::pipeline::{PipelineArtifact, PricePipeline};

/// Storage locations read on load and reload
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub metadata: PathBuf,
    /// Optional CSV backing the reporting endpoints
    pub dataset: Option<PathBuf>,
    /// Check the artifact against its digest sidecar
    pub verify_hash: bool,
}

impl ArtifactPaths {
    pub fn new(model: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            metadata: metadata.into(),
            dataset: None,
            verify_hash: true,
        }
    }

    pub fn with_dataset(mut self, dataset: impl Into<PathBuf>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }
}

/// One consistent metadata + pipeline + dataset snapshot
pub struct ServingContext {
    metadata: FeatureMetadata,
    pipeline: Arc<dyn PricePipeline>,
    dataset: Option<Arc<Dataset>>,
}

impl std::fmt::Debug for ServingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServingContext")
            .field("model", &self.pipeline.name())
            .field("features", &self.metadata.features.len())
            .field("dataset_rows", &self.dataset.as_ref().map(|d| d.len()))
            .finish()
    }
}

impl ServingContext {
    pub fn new(
        metadata: FeatureMetadata,
        pipeline: Arc<dyn PricePipeline>,
        dataset: Option<Arc<Dataset>>,
    ) -> Self {
        Self {
            metadata,
            pipeline,
            dataset,
        }
    }

    /// Read everything from storage. Missing or inconsistent model files fail;
    /// a missing or malformed dataset only disables reporting.
    #[instrument(skip_all, fields(model = %paths.model.display(), metadata = %paths.metadata.display()))]
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        if !paths.model.exists() {
            return Err(CoreError::ModelNotFound(paths.model.clone()));
        }
        let metadata = FeatureMetadata::load(&paths.metadata)?;
        let artifact = PipelineArtifact::load(&paths.model, paths.verify_hash)?;

        if artifact.features != metadata.features {
            return Err(CoreError::InvalidArtifact {
                path: paths.model.clone(),
                reason: format!(
                    "artifact was fit on {:?} but metadata lists {:?}",
                    artifact.features, metadata.features
                ),
            });
        }

        let dataset = paths.dataset.as_ref().and_then(|path| {
            if !path.exists() {
                warn!(path = %path.display(), "dataset not found, reporting disabled");
                return None;
            }
            match Dataset::load(path) {
                Ok(dataset) => Some(Arc::new(dataset)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "dataset unreadable, reporting disabled");
                    None
                }
            }
        });

        info!(
            model = %artifact.model_name,
            features = metadata.features.len(),
            dataset_rows = ?dataset.as_ref().map(|d| d.len()),
            "serving context loaded"
        );

        Ok(Self::new(metadata, Arc::new(artifact), dataset))
    }

    pub fn metadata(&self) -> &FeatureMetadata {
        &self.metadata
    }

    pub fn pipeline(&self) -> &dyn PricePipeline {
        self.pipeline.as_ref()
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_deref()
    }

    /// Align one raw record and score it
    pub fn predict(&self, input: &Value) -> Result<f64> {
        let row = FeatureAligner::new(&self.metadata).align_json(input)?;
        let prices = self.pipeline.predict(std::slice::from_ref(&row))?;
        prices
            .first()
            .copied()
            .ok_or_else(|| CoreError::Inference("pipeline returned no prediction".to_string()))
    }

    /// Score two records against the same snapshot
    pub fn compare(&self, house1: &Value, house2: &Value) -> Result<Comparison> {
        let house1_price = self.predict(house1)?;
        let house2_price = self.predict(house2)?;
        Ok(Comparison::new(house1_price, house2_price))
    }
}

/// Which input scored higher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Higher {
    #[serde(rename = "House 1")]
    House1,
    #[serde(rename = "House 2")]
    House2,
}

/// Two prices and their signed difference (first minus second)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub house1_price: f64,
    pub house2_price: f64,
    pub difference: f64,
    pub higher: Higher,
}

impl Comparison {
    /// House 1 wins only when strictly greater; ties report House 2
    pub fn new(house1_price: f64, house2_price: f64) -> Self {
        let higher = if house1_price > house2_price {
            Higher::House1
        } else {
            Higher::House2
        };
        Self {
            house1_price,
            house2_price,
            difference: house1_price - house2_price,
            higher,
        }
    }
}

/// Shared handle with lock-free reads and serialised reloads
pub struct ContextHandle {
    paths: ArtifactPaths,
    current: ArcSwapOption<ServingContext>,
    reload_lock: Mutex<()>,
}

impl ContextHandle {
    /// Load once; fails if the model files are unusable
    pub fn open(paths: ArtifactPaths) -> Result<Self> {
        let context = ServingContext::load(&paths)?;
        Ok(Self::with_context(paths, context))
    }

    /// Wrap an already-built context
    pub fn with_context(paths: ArtifactPaths, context: ServingContext) -> Self {
        Self {
            paths,
            current: ArcSwapOption::from_pointee(context),
            reload_lock: Mutex::new(()),
        }
    }

    /// Handle with nothing loaded yet; requests fail until a reload succeeds
    pub fn unloaded(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            current: ArcSwapOption::empty(),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Result<Arc<ServingContext>> {
        self.current.load_full().ok_or(CoreError::ModelNotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    /// Re-read all artifacts and publish them together.
    ///
    /// On failure the previous snapshot stays in place.
    #[instrument(skip(self))]
    pub fn reload(&self) -> Result<Arc<ServingContext>> {
        let _guard = self.reload_lock.lock();
        let fresh = Arc::new(ServingContext::load(&self.paths)?);
        self.current.store(Some(Arc::clone(&fresh)));
        info!(model = %fresh.pipeline().name(), "serving context reloaded");
        Ok(fresh)
    }

    /// Read-only copy of the current metadata
    pub fn metadata(&self) -> Result<FeatureMetadata> {
        Ok(self.snapshot()?.metadata().clone())
    }

    pub fn predict_price(&self, input: &Value) -> Result<f64> {
        self.snapshot()?.predict(input)
    }

    pub fn compare(&self, house1: &Value, house2: &Value) -> Result<Comparison> {
        self.snapshot()?.compare(house1, house2)
    }
}
