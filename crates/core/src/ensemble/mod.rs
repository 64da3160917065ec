//! Fixed-point tree ensembles
//!
//! All model values are integers scaled by `SCALE` (1e6). Traversal compares
//! with `<=`, so the same encoded input always reaches the same leaves.

pub mod model;
pub mod tree;

pub use model::{ModelError, TreeEnsemble, ENSEMBLE_VERSION, SCALE};
pub use tree::{Node, Tree};

/// Convert a real value to fixed-point, saturating at the i64 range
pub fn to_fixed(value: f64) -> i64 {
    let scaled = (value * SCALE as f64).round();
    if scaled.is_nan() {
        0
    } else {
        scaled.clamp(i64::MIN as f64, i64::MAX as f64) as i64
    }
}

/// Convert a fixed-point value back to a real value
pub fn from_fixed(value: i64) -> f64 {
    value as f64 / SCALE as f64
}
