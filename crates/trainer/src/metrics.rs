//! Held-out regression metrics

use propval_core::CandidateMetrics;

/// Coefficient of determination.
///
/// A constant target scores `1.0` when predicted exactly and `0.0` otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn mean_absolute_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / y_true.len() as f64
}

pub fn root_mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mse = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum::<f64>() / y_true.len() as f64;
    mse.sqrt()
}

/// Train R² plus test R², MAE and RMSE
pub fn evaluate(
    train_true: &[f64],
    train_pred: &[f64],
    test_true: &[f64],
    test_pred: &[f64],
) -> CandidateMetrics {
    CandidateMetrics {
        train_r2: r2_score(train_true, train_pred),
        test_r2: r2_score(test_true, test_pred),
        test_mae: mean_absolute_error(test_true, test_pred),
        test_rmse: root_mean_squared_error(test_true, test_pred),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_prediction() {
        let y = [1.0, 2.0, 3.0];
        assert_eq!(r2_score(&y, &y), 1.0);
        assert_eq!(mean_absolute_error(&y, &y), 0.0);
        assert_eq!(root_mean_squared_error(&y, &y), 0.0);
    }

    #[test]
    fn test_mean_prediction_scores_zero() {
        let y = [1.0, 2.0, 3.0];
        assert_eq!(r2_score(&y, &[2.0, 2.0, 2.0]), 0.0);
    }

    #[test]
    fn test_errors() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let p = [2.0, 2.0, 3.0, 2.0];
        assert_eq!(mean_absolute_error(&y, &p), 0.75);
        assert_eq!(root_mean_squared_error(&y, &p), (5.0f64 / 4.0).sqrt());
        assert_eq!(r2_score(&y, &p), 1.0 - 5.0 / 5.0);
    }

    #[test]
    fn test_constant_target() {
        assert_eq!(r2_score(&[5.0, 5.0], &[5.0, 5.0]), 1.0);
        assert_eq!(r2_score(&[5.0, 5.0], &[4.0, 5.0]), 0.0);
    }
}
