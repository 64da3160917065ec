//! Fitted preprocessing + regression pipeline
//!
//! The persisted artifact is a one-hot/standard-scaling preprocessor followed
//! by a fixed-point tree ensemble. Serving only sees it through
//! [`PricePipeline`], which scores whole aligned rows.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::align::{AlignedRow, Cell};
use crate::canonical::{self, digest_hex};
use crate::ensemble::{to_fixed, TreeEnsemble};
use crate::errors::{CoreError, Result};
use crate::record::RawValue;

/// Current artifact layout version
pub const ARTIFACT_VERSION: u32 = 1;

/// Black-box scorer: one price per aligned row
pub trait PricePipeline: Send + Sync {
    /// Identifier of the trained candidate
    fn name(&self) -> &str;

    /// Column order the pipeline was fit on
    fn features(&self) -> &[String];

    /// Score every row. Fails on a row whose columns differ from `features`.
    fn predict(&self, rows: &[AlignedRow]) -> Result<Vec<f64>>;
}

/// One-hot block for a categorical column. Unseen categories encode to all zeros.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OneHotColumn {
    pub name: String,
    /// Fit-time vocabulary, sorted
    pub categories: Vec<String>,
}

/// Standard scaling for a numeric column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScaledColumn {
    pub name: String,
    pub mean: f64,
    pub std: f64,
}

impl ScaledColumn {
    fn scale(&self, value: f64) -> f64 {
        let std = if self.std > 0.0 { self.std } else { 1.0 };
        (value - self.mean) / std
    }
}

/// Column transformer: categorical block first, numeric block second
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Preprocessor {
    pub one_hot: Vec<OneHotColumn>,
    pub scaled: Vec<ScaledColumn>,
}

impl Preprocessor {
    /// Fit the vocabulary and scaling statistics on training rows
    pub fn fit(rows: &[AlignedRow], categorical: &[String], numeric: &[String]) -> Self {
        let one_hot = categorical
            .iter()
            .map(|name| {
                let mut categories: Vec<String> = rows
                    .iter()
                    .filter_map(|row| row.get(name).map(cell_text))
                    .collect();
                categories.sort();
                categories.dedup();
                OneHotColumn {
                    name: name.clone(),
                    categories,
                }
            })
            .collect();

        let scaled = numeric
            .iter()
            .map(|name| {
                let values: Vec<f64> = rows
                    .iter()
                    .filter_map(|row| row.get(name).and_then(Cell::as_number))
                    .collect();
                let (mean, std) = mean_std(&values);
                ScaledColumn {
                    name: name.clone(),
                    mean,
                    std,
                }
            })
            .collect();

        Self { one_hot, scaled }
    }

    /// Width of the encoded vector
    pub fn width(&self) -> usize {
        self.one_hot.iter().map(|c| c.categories.len()).sum::<usize>() + self.scaled.len()
    }

    /// Human-readable names of the encoded columns
    pub fn output_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for column in &self.one_hot {
            for category in &column.categories {
                names.push(format!("{}={}", column.name, category));
            }
        }
        names.extend(self.scaled.iter().map(|c| c.name.clone()));
        names
    }

    /// Encode one aligned row to real-valued model inputs
    pub fn transform(&self, row: &AlignedRow) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.width());

        for column in &self.one_hot {
            let cell = row.get(&column.name).ok_or_else(|| missing_column(&column.name))?;
            let text = cell_text(cell);
            out.extend(
                column
                    .categories
                    .iter()
                    .map(|category| if *category == text { 1.0 } else { 0.0 }),
            );
        }

        for column in &self.scaled {
            let cell = row.get(&column.name).ok_or_else(|| missing_column(&column.name))?;
            let value = cell.as_number().ok_or_else(|| {
                CoreError::Inference(format!(
                    "could not convert {:?} to a number for column '{}'",
                    cell, column.name
                ))
            })?;
            out.push(column.scale(value));
        }

        Ok(out)
    }

    /// Encode one aligned row to fixed-point model inputs
    pub fn encode(&self, row: &AlignedRow) -> Result<Vec<i64>> {
        Ok(self.transform(row)?.into_iter().map(to_fixed).collect())
    }
}

fn missing_column(name: &str) -> CoreError {
    CoreError::Inference(format!("column '{name}' is missing from the row"))
}

/// Categorical text of a cell; numbers render the way alignment renders them
fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) => s.clone(),
        Cell::Number(n) => RawValue::Float(*n).to_string(),
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Persisted pipeline: preprocessor + ensemble + fit-time column order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineArtifact {
    pub version: u32,
    pub model_name: String,
    pub features: Vec<String>,
    pub preprocessor: Preprocessor,
    pub model: TreeEnsemble,
}

impl PipelineArtifact {
    pub fn new(
        model_name: impl Into<String>,
        features: Vec<String>,
        preprocessor: Preprocessor,
        model: TreeEnsemble,
    ) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            model_name: model_name.into(),
            features,
            preprocessor,
            model,
        }
    }

    /// Structural checks run on every load
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.version != ARTIFACT_VERSION {
            return Err(format!("unsupported artifact version {}", self.version));
        }
        self.model.validate().map_err(|e| e.to_string())?;

        let input_columns = self
            .preprocessor
            .one_hot
            .iter()
            .map(|c| &c.name)
            .chain(self.preprocessor.scaled.iter().map(|c| &c.name));
        for name in input_columns {
            if !self.features.contains(name) {
                return Err(format!("preprocessor column '{name}' is not a feature"));
            }
        }

        let width = self.preprocessor.width();
        let required = self.model.required_width();
        if required > width {
            return Err(format!(
                "ensemble reads {required} inputs but the preprocessor emits {width}"
            ));
        }
        Ok(())
    }

    /// BLAKE3 digest of the canonical artifact
    pub fn hash_hex(&self) -> Result<String> {
        canonical::hash_canonical_hex(self).map_err(canonical_error)
    }

    /// Write canonical JSON plus the digest sidecar; returns the digest
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let path = path.as_ref();
        let digest = canonical::write_with_digest(path, self).map_err(canonical_error)?;
        info!(path = %path.display(), %digest, "pipeline artifact written");
        Ok(digest)
    }

    /// Load, verify and validate an artifact.
    ///
    /// With `verify_hash` set, a present digest sidecar must match the file.
    pub fn load<P: AsRef<Path>>(path: P, verify_hash: bool) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::ModelNotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path)?;

        if verify_hash {
            match canonical::read_digest(path).map_err(canonical_error)? {
                Some(expected) => {
                    let actual = digest_hex(&bytes);
                    if expected != actual {
                        return Err(CoreError::HashMismatch { expected, actual });
                    }
                    debug!(digest = %actual, "artifact digest verified");
                }
                None => debug!(path = %path.display(), "no digest sidecar, skipping verification"),
            }
        }

        let invalid = |reason: String| CoreError::InvalidArtifact {
            path: path.to_path_buf(),
            reason,
        };
        let artifact: Self = serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
        artifact.validate().map_err(invalid)?;
        Ok(artifact)
    }

    fn predict_row(&self, row: &AlignedRow) -> Result<f64> {
        if row.columns() != self.features.as_slice() {
            return Err(CoreError::Inference(format!(
                "shape mismatch: expected {} columns {:?}, got {} columns {:?}",
                self.features.len(),
                self.features,
                row.len(),
                row.columns()
            )));
        }
        let encoded = self.preprocessor.encode(row)?;
        Ok(self.model.predict(&encoded)?)
    }
}

impl PricePipeline for PipelineArtifact {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn features(&self) -> &[String] {
        &self.features
    }

    fn predict(&self, rows: &[AlignedRow]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }
}

fn canonical_error(err: canonical::CanonicalError) -> CoreError {
    match err {
        canonical::CanonicalError::Io(e) => CoreError::Io(e),
        canonical::CanonicalError::Serialization(e) => CoreError::Serialization(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{Node, Tree, SCALE};

    fn row(locality: &str, size: f64) -> AlignedRow {
        AlignedRow::new(
            vec!["Locality".into(), "Size_in_SqFt".into()],
            vec![Cell::Text(locality.into()), Cell::Number(size)],
        )
        .unwrap()
    }

    fn artifact() -> PipelineArtifact {
        let rows = vec![row("Dwarka", 1000.0), row("Rohini", 3000.0)];
        let preprocessor = Preprocessor::fit(
            &rows,
            &["Locality".to_string()],
            &["Size_in_SqFt".to_string()],
        );
        // Encoded layout: [Locality=Dwarka, Locality=Rohini, Size_in_SqFt]
        let tree = Tree::new(
            vec![
                Node::internal(0, 2, 0, 1, 2),
                Node::leaf(1, 40 * SCALE),
                Node::leaf(2, 90 * SCALE),
            ],
            SCALE,
        );
        PipelineArtifact::new(
            "GradientBoosting",
            vec!["Locality".into(), "Size_in_SqFt".into()],
            preprocessor,
            TreeEnsemble::new(vec![tree], 10 * SCALE),
        )
    }

    #[test]
    fn test_fit_vocabulary_and_scaling() {
        let p = artifact().preprocessor;
        assert_eq!(p.one_hot[0].categories, vec!["Dwarka", "Rohini"]);
        assert_eq!(p.scaled[0].mean, 2000.0);
        assert_eq!(p.scaled[0].std, 1000.0);
        assert_eq!(p.width(), 3);
        assert_eq!(
            p.output_names(),
            vec!["Locality=Dwarka", "Locality=Rohini", "Size_in_SqFt"]
        );
    }

    #[test]
    fn test_transform_unknown_category_is_all_zero() {
        let p = artifact().preprocessor;
        assert_eq!(p.transform(&row("Unknown", 2000.0)).unwrap(), vec![0.0, 0.0, 0.0]);
        assert_eq!(p.transform(&row("Rohini", 3000.0)).unwrap(), vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_zero_std_does_not_divide_by_zero() {
        let rows = vec![row("A", 5.0), row("A", 5.0)];
        let p = Preprocessor::fit(&rows, &[], &["Size_in_SqFt".to_string()]);
        assert_eq!(p.transform(&row("A", 7.0)).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_predict_scores_rows() {
        let artifact = artifact();
        let prices = artifact
            .predict(&[row("Dwarka", 1500.0), row("Rohini", 2500.0)])
            .unwrap();
        assert_eq!(prices, vec![50.0, 100.0]);
    }

    #[test]
    fn test_shape_mismatch_is_inference_error() {
        let artifact = artifact();
        let reordered = AlignedRow::new(
            vec!["Size_in_SqFt".into(), "Locality".into()],
            vec![Cell::Number(1.0), Cell::Text("Dwarka".into())],
        )
        .unwrap();
        let err = artifact.predict(&[reordered]).unwrap_err();
        assert!(matches!(err, CoreError::Inference(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_save_load_roundtrip_verifies_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_model.json");
        let artifact = artifact();

        let digest = artifact.save(&path).unwrap();
        assert_eq!(digest, artifact.hash_hex().unwrap());

        let loaded = PipelineArtifact::load(&path, true).unwrap();
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn test_tampered_artifact_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_model.json");
        artifact().save(&path).unwrap();

        let tampered = fs::read_to_string(&path)
            .unwrap()
            .replace("GradientBoosting", "RandomForest");
        fs::write(&path, tampered).unwrap();

        let err = PipelineArtifact::load(&path, true).unwrap_err();
        assert!(matches!(err, CoreError::HashMismatch { .. }));
        assert!(PipelineArtifact::load(&path, false).is_ok());
    }

    #[test]
    fn test_missing_and_malformed_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best_model.json");
        assert!(matches!(
            PipelineArtifact::load(&path, true).unwrap_err(),
            CoreError::ModelNotFound(_)
        ));

        fs::write(&path, "{\"version\": 1}").unwrap();
        assert!(matches!(
            PipelineArtifact::load(&path, true).unwrap_err(),
            CoreError::InvalidArtifact { .. }
        ));
    }

    #[test]
    fn test_validate_rejects_foreign_preprocessor_column() {
        let mut artifact = artifact();
        artifact.features = vec!["Locality".into()];
        assert!(artifact.validate().is_err());
    }
}
