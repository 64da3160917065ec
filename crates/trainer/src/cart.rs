//! CART (Classification and Regression Tree) builder
//!
//! Deterministic regression trees over fixed-point features. Splits minimise
//! squared error on the residual targets; gains are compared in i128 so large
//! price sums never overflow.

use propval_core::ensemble::{Node, Tree};
use std::cmp::Ordering;

use crate::deterministic::{LcgRng, SplitTieBreaker};

/// How split thresholds are chosen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Scan every boundary between distinct quantized values
    Exact,
    /// One uniformly drawn threshold per feature (extremely randomized trees)
    Random,
}

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub quant_step: i64,
    pub strategy: SplitStrategy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 5,
            quant_step: 1000,
            strategy: SplitStrategy::Exact,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: i64,
    gain: i128,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: i64, gain: i128) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold),
        }
    }

    /// Higher gain wins; equal gains fall back to the tie-breaker
    fn beats(&self, other: &SplitCandidate) -> bool {
        match self.gain.cmp(&other.gain) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.tie_breaker < other.tie_breaker,
        }
    }
}

/// Running residual sum for one side of a split
#[derive(Debug, Clone, Copy, Default)]
struct Side {
    sum: i128,
    count: usize,
}

impl Side {
    fn push(&mut self, value: i64) {
        self.sum += value as i128;
        self.count += 1;
    }

    /// `S² / n`, the squared-error reduction term
    fn score(&self) -> i128 {
        if self.count == 0 {
            0
        } else {
            self.sum * self.sum / self.count as i128
        }
    }
}

/// Build a regression tree on residual targets
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<i64>],
    residuals: &'a [i64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(features: &'a [Vec<i64>], residuals: &'a [i64], config: TreeConfig) -> Self {
        debug_assert_eq!(features.len(), residuals.len());
        let feature_count = features.first().map_or(0, Vec::len);

        Self {
            config,
            features,
            residuals,
            feature_count,
        }
    }

    /// Build a tree over `indices` (duplicates allowed, e.g. a bootstrap sample)
    pub fn build(&self, indices: &[usize], weight: i64, rng: &mut LcgRng) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(indices, 0, &mut nodes, rng);
        Tree::new(nodes, weight)
    }

    /// Recursively build nodes in pre-order; returns the new node's index
    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        rng: &mut LcgRng,
    ) -> i32 {
        let current_idx = nodes.len() as i32;
        let leaf_value = self.leaf_value(indices);

        let split = if depth >= self.config.max_depth
            || indices.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            None
        } else {
            self.find_best_split(indices, rng)
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(current_idx, leaf_value));
            return current_idx;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&idx| self.features[idx][split.feature_idx] <= split.threshold);

        // Reserve space for current node
        nodes.push(Node::internal(
            current_idx,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));

        let left_idx = self.build_node(&left_indices, depth + 1, nodes, rng);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes, rng);

        let node = &mut nodes[current_idx as usize];
        node.left = left_idx;
        node.right = right_idx;

        current_idx
    }

    fn find_best_split(&self, indices: &[usize], rng: &mut LcgRng) -> Option<SplitCandidate> {
        let mut parent = Side::default();
        for &idx in indices {
            parent.push(self.residuals[idx]);
        }

        let mut best: Option<SplitCandidate> = None;
        for feature_idx in 0..self.feature_count {
            let candidate = match self.config.strategy {
                SplitStrategy::Exact => self.exact_split(indices, feature_idx, &parent),
                SplitStrategy::Random => self.random_split(indices, feature_idx, &parent, rng),
            };
            if let Some(candidate) = candidate {
                if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                    best = Some(candidate);
                }
            }
        }

        best.filter(|split| split.gain > 0)
    }

    /// Sweep sorted values, splitting only between different quantization buckets
    fn exact_split(
        &self,
        indices: &[usize],
        feature_idx: usize,
        parent: &Side,
    ) -> Option<SplitCandidate> {
        let mut sorted: Vec<(i64, i64)> = indices
            .iter()
            .map(|&idx| (self.features[idx][feature_idx], self.residuals[idx]))
            .collect();
        sorted.sort_unstable();

        let min_leaf = self.config.min_samples_leaf.max(1);
        let step = self.config.quant_step.max(1);
        let mut left = Side::default();
        let mut best: Option<SplitCandidate> = None;

        for k in 0..sorted.len().saturating_sub(1) {
            left.push(sorted[k].1);
            let right_count = sorted.len() - left.count;
            if left.count < min_leaf || right_count < min_leaf {
                continue;
            }
            if sorted[k].0.div_euclid(step) == sorted[k + 1].0.div_euclid(step) {
                continue;
            }

            let right = Side {
                sum: parent.sum - left.sum,
                count: right_count,
            };
            let gain = left.score() + right.score() - parent.score();
            let candidate = SplitCandidate::new(feature_idx, sorted[k].0, gain);
            if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                best = Some(candidate);
            }
        }

        best
    }

    /// Draw one threshold in `[min, max)` of the node's values
    fn random_split(
        &self,
        indices: &[usize],
        feature_idx: usize,
        parent: &Side,
        rng: &mut LcgRng,
    ) -> Option<SplitCandidate> {
        let values = indices.iter().map(|&idx| self.features[idx][feature_idx]);
        let min = values.clone().min()?;
        let max = values.max()?;
        if min == max {
            return None;
        }

        let threshold = min.saturating_add(rng.next_range(max.saturating_sub(min)));
        let mut left = Side::default();
        for &idx in indices {
            if self.features[idx][feature_idx] <= threshold {
                left.push(self.residuals[idx]);
            }
        }

        let min_leaf = self.config.min_samples_leaf.max(1);
        let right_count = indices.len() - left.count;
        if left.count < min_leaf || right_count < min_leaf {
            return None;
        }

        let right = Side {
            sum: parent.sum - left.sum,
            count: right_count,
        };
        let gain = left.score() + right.score() - parent.score();
        Some(SplitCandidate::new(feature_idx, threshold, gain))
    }

    /// Mean residual of the node (fixed-point)
    fn leaf_value(&self, indices: &[usize]) -> i64 {
        if indices.is_empty() {
            return 0;
        }
        let sum: i128 = indices.iter().map(|&idx| self.residuals[idx] as i128).sum();
        let mean = sum / indices.len() as i128;
        mean.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}
