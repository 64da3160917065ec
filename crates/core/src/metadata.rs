//! Feature metadata record shared by training and serving
//!
//! The record is written once by the trainer and read by the serving layer at
//! startup. `features` is the exact column order the pipeline was fit on.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::errors::{CoreError, Result};

/// Prefix of the derived per-amenity indicator columns
pub const AMENITY_FLAG_PREFIX: &str = "has_";

/// Name of the derived amenity counter column
pub const AMENITIES_COUNT: &str = "Amenities_count";

/// Name of the raw amenities input field
pub const AMENITIES_FIELD: &str = "Amenities";

/// Held-out metrics recorded per candidate during training
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateMetrics {
    #[serde(rename = "Train_R2")]
    pub train_r2: f64,
    #[serde(rename = "Test_R2")]
    pub test_r2: f64,
    #[serde(rename = "Test_MAE")]
    pub test_mae: f64,
    #[serde(rename = "Test_RMSE")]
    pub test_rmse: f64,
}

/// Persisted feature contract between training and serving
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureMetadata {
    /// Identifier of the winning candidate
    #[serde(default)]
    pub best_model: String,
    /// Column order the pipeline was fit on
    pub features: Vec<String>,
    #[serde(default)]
    pub categorical: Vec<String>,
    #[serde(default)]
    pub numeric: Vec<String>,
    /// Fixed amenity vocabulary (lower-case keywords)
    #[serde(default)]
    pub amenity_flags: Vec<String>,
    /// Per-candidate evaluation, keyed by candidate name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub results: BTreeMap<String, CandidateMetrics>,
}

/// Loose view used to report a missing `features` key distinctly
#[derive(Deserialize)]
struct RawMetadata {
    #[serde(default)]
    best_model: String,
    features: Option<Vec<String>>,
    #[serde(default)]
    categorical: Vec<String>,
    #[serde(default)]
    numeric: Vec<String>,
    #[serde(default)]
    amenity_flags: Vec<String>,
    #[serde(default)]
    results: BTreeMap<String, CandidateMetrics>,
}

impl FeatureMetadata {
    /// Parse a metadata record from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawMetadata = serde_json::from_str(json)
            .map_err(|e| CoreError::InvalidMetadata(format!("failed to parse: {e}")))?;

        let features = raw
            .features
            .ok_or_else(|| CoreError::InvalidMetadata("missing 'features' key".to_string()))?;

        let metadata = Self {
            best_model: raw.best_model,
            features,
            categorical: raw.categorical,
            numeric: raw.numeric,
            amenity_flags: raw.amenity_flags,
            results: raw.results,
        };
        metadata.check_partition();
        Ok(metadata)
    }

    /// Load the metadata record from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::MetadataNotFound(path.to_path_buf()));
        }
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the metadata record as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Derived indicator column name for an amenity keyword
    pub fn flag_column(flag: &str) -> String {
        format!("{AMENITY_FLAG_PREFIX}{flag}")
    }

    /// Warn when `categorical ∪ numeric` does not cover `features`.
    ///
    /// A mismatch is tolerated: alignment defaults stragglers to `0`.
    fn check_partition(&self) {
        let partition: BTreeSet<&str> = self
            .categorical
            .iter()
            .chain(self.numeric.iter())
            .map(String::as_str)
            .collect();
        let features: BTreeSet<&str> = self.features.iter().map(String::as_str).collect();

        for missing in features.difference(&partition) {
            warn!("feature '{}' is neither categorical nor numeric", missing);
        }
        for extra in partition.difference(&features) {
            warn!("partition column '{}' is not in the feature list", extra);
        }
    }
}
