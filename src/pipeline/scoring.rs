//! Scores computed for every computation of a split

use std::collections::BTreeMap;

/// Fraction of exact matches.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
pub fn accuracy(truth: &[f64], predictions: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predictions).filter(|(t, p)| t == p).count();
    hits as f64 / truth.len() as f64
}

/// Mean squared error.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_squared_error(truth: &[f64], predictions: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let sum: f64 = truth.iter().zip(predictions).map(|(t, p)| (t - p).powi(2)).sum();
    sum / truth.len() as f64
}

/// Mean absolute error.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_absolute_error(truth: &[f64], predictions: &[f64]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let sum: f64 = truth.iter().zip(predictions).map(|(t, p)| (t - p).abs()).sum();
    sum / truth.len() as f64
}

/// Accuracy for classification pipelines, MSE and MAE otherwise.
#[must_use]
pub fn score(classification: bool, truth: &[f64], predictions: &[f64]) -> BTreeMap<String, f64> {
    if classification {
        BTreeMap::from([("accuracy".to_string(), accuracy(truth, predictions))])
    } else {
        BTreeMap::from([
            ("mae".to_string(), mean_absolute_error(truth, predictions)),
            ("mse".to_string(), mean_squared_error(truth, predictions)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        assert!((accuracy(&[1.0, 0.0, 1.0, 1.0], &[1.0, 1.0, 1.0, 0.0]) - 0.5).abs() < f64::EPSILON);
        assert!(accuracy(&[], &[]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_regression_errors() {
        let truth = [1.0, 2.0, 3.0];
        let predictions = [2.0, 2.0, 1.0];
        assert!((mean_squared_error(&truth, &predictions) - 5.0 / 3.0).abs() < 1e-12);
        assert!((mean_absolute_error(&truth, &predictions) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_score_keys() {
        assert_eq!(score(true, &[1.0], &[1.0]).keys().collect::<Vec<_>>(), ["accuracy"]);
        assert_eq!(score(false, &[1.0], &[1.0]).keys().collect::<Vec<_>>(), ["mae", "mse"]);
    }
}
