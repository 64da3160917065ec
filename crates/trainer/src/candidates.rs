//! Candidate regressors
//!
//! Every candidate fits a [`TreeEnsemble`] on fixed-point inputs, so the
//! winner can be persisted and served by the same integer evaluator.

use propval_core::ensemble::{Tree, TreeEnsemble, SCALE};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::cart::{CartBuilder, SplitStrategy, TreeConfig};
use crate::deterministic::{derive_seed, LcgRng};
use crate::errors::TrainerError;

/// Gradient boosting configuration
#[derive(Clone, Debug)]
pub struct BoostingConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub learning_rate: i64, // Fixed-point, e.g., 100_000 = 0.1
    pub quant_step: i64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            num_trees: 200,
            max_depth: 5,
            min_samples_leaf: 5,
            learning_rate: 100_000, // 0.1 in fixed-point
            quant_step: 1000,
        }
    }
}

/// Averaged-forest configuration, shared by bagged and extra trees
#[derive(Clone, Debug)]
pub struct ForestConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub quant_step: i64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            num_trees: 60,
            max_depth: 12,
            min_samples_leaf: 2,
            quant_step: 1000,
        }
    }
}

/// A named regressor that can be fit and compared
#[derive(Clone, Debug)]
pub enum Candidate {
    GradientBoosting(BoostingConfig),
    /// Bootstrap-bagged exact trees
    RandomForest(ForestConfig),
    /// Randomised-threshold trees on the full sample
    ExtraTrees(ForestConfig),
}

impl Candidate {
    pub fn name(&self) -> &'static str {
        match self {
            Candidate::GradientBoosting(_) => "GradientBoosting",
            Candidate::RandomForest(_) => "RandomForest",
            Candidate::ExtraTrees(_) => "ExtraTrees",
        }
    }

    /// Fit on encoded rows `x` and fixed-point targets `y`
    pub fn fit(&self, x: &[Vec<i64>], y: &[i64], seed: i64) -> Result<TreeEnsemble, TrainerError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TrainerError::Training(format!(
                "{}: {} rows vs {} targets",
                self.name(),
                x.len(),
                y.len()
            )));
        }

        let model = match self {
            Candidate::GradientBoosting(config) => fit_boosting(config, x, y),
            Candidate::RandomForest(config) => fit_forest(config, SplitStrategy::Exact, true, x, y, seed),
            Candidate::ExtraTrees(config) => fit_forest(config, SplitStrategy::Random, false, x, y, seed),
        };

        model
            .validate()
            .map_err(|e| TrainerError::Training(format!("{}: {e}", self.name())))?;
        Ok(model)
    }
}

/// The default line-up, in evaluation order
pub fn default_candidates(boosting: &BoostingConfig, forest: &ForestConfig) -> Vec<Candidate> {
    vec![
        Candidate::GradientBoosting(boosting.clone()),
        Candidate::RandomForest(forest.clone()),
        Candidate::ExtraTrees(forest.clone()),
    ]
}

fn fit_boosting(config: &BoostingConfig, x: &[Vec<i64>], y: &[i64]) -> TreeEnsemble {
    let bias = mean(y);
    let mut predictions = vec![bias; y.len()];
    let indices: Vec<usize> = (0..y.len()).collect();
    let tree_config = TreeConfig {
        max_depth: config.max_depth,
        min_samples_leaf: config.min_samples_leaf,
        quant_step: config.quant_step,
        strategy: SplitStrategy::Exact,
    };

    let mut trees = Vec::with_capacity(config.num_trees);
    // Exact splits never draw from the generator
    let mut rng = LcgRng::new(0);

    for tree_idx in 0..config.num_trees {
        let residuals: Vec<i64> = y
            .iter()
            .zip(&predictions)
            .map(|(t, p)| t.saturating_sub(*p))
            .collect();

        let tree = CartBuilder::new(x, &residuals, tree_config.clone()).build(
            &indices,
            config.learning_rate,
            &mut rng,
        );

        // Same integer step the ensemble evaluator applies
        for (pred, row) in predictions.iter_mut().zip(x) {
            let step = (tree.evaluate(row) as i128 * tree.weight as i128) / SCALE as i128;
            *pred = pred.saturating_add(step as i64);
        }

        if tree.nodes.len() == 1 {
            debug!(tree = tree_idx + 1, "residuals exhausted, stopping early");
            trees.push(tree);
            break;
        }
        trees.push(tree);
    }

    info!(trees = trees.len(), "gradient boosting fitted");
    TreeEnsemble::new(trees, bias)
}

fn fit_forest(
    config: &ForestConfig,
    strategy: SplitStrategy,
    bootstrap: bool,
    x: &[Vec<i64>],
    y: &[i64],
    seed: i64,
) -> TreeEnsemble {
    let n_trees = config.num_trees.max(1);
    let tree_config = TreeConfig {
        max_depth: config.max_depth,
        min_samples_leaf: config.min_samples_leaf,
        quant_step: config.quant_step,
        strategy,
    };

    // Order-preserving parallel map keeps the result independent of scheduling
    let trees: Vec<Tree> = (0..n_trees)
        .into_par_iter()
        .map(|tree_idx| {
            let mut rng = LcgRng::new(derive_seed(seed, tree_idx));
            let indices: Vec<usize> = if bootstrap {
                (0..y.len()).map(|_| rng.next_index(y.len())).collect()
            } else {
                (0..y.len()).collect()
            };

            let mut tree = CartBuilder::new(x, y, tree_config.clone()).build(&indices, SCALE, &mut rng);
            for node in &mut tree.nodes {
                if let Some(value) = node.leaf.as_mut() {
                    *value = div_round(*value, n_trees as i64);
                }
            }
            tree
        })
        .collect();

    info!(trees = trees.len(), bootstrap, ?strategy, "forest fitted");
    TreeEnsemble::new(trees, 0)
}

fn mean(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let sum: i128 = values.iter().map(|&v| v as i128).sum();
    (sum / values.len() as i128) as i64
}

/// Integer division rounding half away from zero
fn div_round(value: i64, divisor: i64) -> i64 {
    let q = value / divisor;
    let r = value % divisor;
    if 2 * r.abs() >= divisor {
        q + value.signum()
    } else {
        q
    }
}
