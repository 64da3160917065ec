//! Additive tree ensemble with integer-only inference
//!
//! Gradient boosting, bagged forests and extra-trees all reduce to the same
//! shape: `bias + Σ leaf(tree) * weight(tree) / scale`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tree::Tree;

/// Ensemble errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("Feature vector has {actual} values, model needs at least {required}")]
    FeatureWidth { required: usize, actual: usize },
}

/// Default scale factor for fixed-point arithmetic (1e6)
pub const SCALE: i64 = 1_000_000;

/// Current artifact format version
pub const ENSEMBLE_VERSION: i32 = 1;

/// Tree ensemble in fixed-point representation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeEnsemble {
    /// Format version
    pub version: i32,

    /// Fixed-point scale factor
    pub scale: i64,

    pub trees: Vec<Tree>,

    /// Base score (fixed-point)
    pub bias: i64,
}

impl TreeEnsemble {
    pub fn new(trees: Vec<Tree>, bias: i64) -> Self {
        Self {
            version: ENSEMBLE_VERSION,
            scale: SCALE,
            trees,
            bias,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != ENSEMBLE_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.scale <= 0 {
            return Err(ModelError::ValidationFailed(format!(
                "Invalid scale: {}",
                self.scale
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {i} validation failed: {e}"))
            })?;
        }

        Ok(())
    }

    /// Smallest feature vector every tree can be evaluated on
    pub fn required_width(&self) -> usize {
        self.trees
            .iter()
            .filter_map(Tree::max_feature_index)
            .max()
            .map_or(0, |idx| idx + 1)
    }

    /// Fixed-point score of one encoded feature vector
    pub fn score(&self, features: &[i64]) -> i64 {
        let mut sum = self.bias;

        for tree in &self.trees {
            let leaf_value = tree.evaluate(features);
            let weighted = (leaf_value as i128 * tree.weight as i128) / self.scale as i128;
            sum = sum.saturating_add(weighted.clamp(i64::MIN as i128, i64::MAX as i128) as i64);
        }

        sum
    }

    /// Score rescaled to real units
    pub fn predict(&self, features: &[i64]) -> Result<f64, ModelError> {
        let required = self.required_width();
        if features.len() < required {
            return Err(ModelError::FeatureWidth {
                required,
                actual: features.len(),
            });
        }
        Ok(self.score(features) as f64 / self.scale as f64)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::tree::Node;

    fn create_test_model() -> TreeEnsemble {
        let tree1 = Tree::new(
            vec![
                Node::internal(0, 0, 50 * SCALE, 1, 2),
                Node::leaf(1, 100 * SCALE),
                Node::leaf(2, 200 * SCALE),
            ],
            SCALE,
        );

        let tree2 = Tree::new(
            vec![
                Node::internal(0, 1, 30 * SCALE, 1, 2),
                Node::leaf(1, -50 * SCALE),
                Node::leaf(2, 50 * SCALE),
            ],
            SCALE,
        );

        TreeEnsemble::new(vec![tree1, tree2], 0)
    }

    #[test]
    fn test_model_creation() {
        let model = create_test_model();
        assert_eq!(model.version, ENSEMBLE_VERSION);
        assert_eq!(model.num_trees(), 2);
        assert_eq!(model.required_width(), 2);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_model_inference() {
        let model = create_test_model();

        // Tree 1 goes left (100), tree 2 goes left (-50)
        let score = model.score(&[30 * SCALE, 20 * SCALE]);
        assert_eq!(score, 50 * SCALE);
        assert_eq!(model.predict(&[30 * SCALE, 20 * SCALE]).unwrap(), 50.0);
    }

    #[test]
    fn test_tree_weight_and_bias() {
        // Two averaged trees: weight 0.5 each, bias 10
        let half = SCALE / 2;
        let trees = vec![
            Tree::new(vec![Node::leaf(0, 100 * SCALE)], half),
            Tree::new(vec![Node::leaf(0, 300 * SCALE)], half),
        ];
        let model = TreeEnsemble::new(trees, 10 * SCALE);
        assert_eq!(model.score(&[]), 210 * SCALE);
    }

    #[test]
    fn test_predict_rejects_narrow_vector() {
        let model = create_test_model();
        let err = model.predict(&[SCALE]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::FeatureWidth {
                required: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_model_validation() {
        let mut invalid = create_test_model();
        invalid.scale = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = create_test_model();
        invalid.version = 999;
        assert!(invalid.validate().is_err());
    }
}
