//! Figure-of-merit functions and scorer adapters.

use std::sync::Arc;

use ndarray::Array1;

use crate::cross_validation::Scorer;

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) {
    assert_eq!(
        y_true.len(),
        y_pred.len(),
        "metric inputs must have the same length"
    );
}

/// Fraction of predictions matching the targets exactly.
///
/// # Panics
/// Panics when the inputs differ in length.
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    check_lengths(y_true, y_pred);
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(a, b)| a == b)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Mean per-class recall.
///
/// Insensitive to class imbalance: each class contributes equally no matter
/// how many samples it has. Chance level is `1 / n_classes`.
///
/// # Panics
/// Panics when the inputs differ in length.
pub fn balanced_accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    check_lengths(y_true, y_pred);
    let mut classes: Vec<f64> = Vec::new();
    for &v in y_true {
        if !classes.contains(&v) {
            classes.push(v);
        }
    }
    if classes.is_empty() {
        return 0.0;
    }

    let mut recall_sum = 0.0;
    for &label in &classes {
        let mut members = 0usize;
        let mut hits = 0usize;
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t == label {
                members += 1;
                if p == label {
                    hits += 1;
                }
            }
        }
        if members > 0 {
            recall_sum += hits as f64 / members as f64;
        }
    }
    recall_sum / classes.len() as f64
}

/// Fraction of target variance explained by the predictions.
///
/// 1.0 is a perfect fit; 0.0 is no better than predicting the target mean.
///
/// # Panics
/// Panics when the inputs differ in length.
pub fn explained_variance_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    check_lengths(y_true, y_pred);
    if y_true.is_empty() {
        return 0.0;
    }
    let n = y_true.len() as f64;
    let mean = y_true.sum() / n;
    let total_var = y_true.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
    if total_var == 0.0 {
        return 0.0;
    }
    let residuals: Vec<f64> = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| t - p)
        .collect();
    let res_mean = residuals.iter().sum::<f64>() / n;
    let res_var = residuals
        .iter()
        .map(|&r| (r - res_mean) * (r - res_mean))
        .sum::<f64>()
        / n;
    1.0 - res_var / total_var
}

/// Adapt a plain metric function into a shareable [`Scorer`].
pub fn make_scorer(metric: fn(&Array1<f64>, &Array1<f64>) -> f64) -> Scorer {
    Arc::new(metric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let y = array![0.0, 1.0, 1.0, 0.0];
        assert_eq!(accuracy_score(&y, &y), 1.0);
        assert_eq!(accuracy_score(&y, &array![0.0, 1.0, 0.0, 1.0]), 0.5);
    }

    #[test]
    fn test_balanced_accuracy_weights_classes_equally() {
        // 4 of class 0, 1 of class 1; predicting all zeros
        let y_true = array![0.0, 0.0, 0.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(accuracy_score(&y_true, &y_pred), 0.8);
        assert_eq!(balanced_accuracy_score(&y_true, &y_pred), 0.5);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_accuracy_rejects_mismatched_lengths() {
        accuracy_score(&array![0.0, 1.0], &array![0.0]);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_balanced_accuracy_rejects_mismatched_lengths() {
        balanced_accuracy_score(&array![0.0], &array![0.0, 1.0]);
    }

    #[test]
    fn test_explained_variance() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        assert_eq!(explained_variance_score(&y, &y), 1.0);
        let mean_pred = array![2.5, 2.5, 2.5, 2.5];
        assert_eq!(explained_variance_score(&y, &mean_pred), 0.0);
    }
}
