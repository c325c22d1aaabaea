//! k-nearest-neighbors classification.

use ndarray::{Array1, Array2};

use crate::error::{PipelineError, Result};
use crate::pipe::{Caps, EstimatorKind, Pipe, PredictionMethod};

/// Sorted unique class labels of a target vector.
pub(crate) fn class_labels(y: &Array1<f64>) -> Result<Vec<f64>> {
    let mut classes: Vec<f64> = Vec::new();
    for &v in y {
        if !v.is_finite() {
            return Err(PipelineError::Numerical(
                "class labels must be finite".to_string(),
            ));
        }
        if !classes.contains(&v) {
            classes.push(v);
        }
    }
    classes.sort_by(|a, b| a.total_cmp(b));
    Ok(classes)
}

/// Euclidean k-nearest-neighbors classifier.
///
/// Distance ties break on the lower training index and vote ties on the
/// lower class label, so predictions are fully deterministic.
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    k: usize,
    train_x: Option<Array2<f64>>,
    train_y: Option<Array1<f64>>,
    classes: Vec<f64>,
}

impl KnnClassifier {
    /// Create a classifier voting over `k` neighbors.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            train_x: None,
            train_y: None,
            classes: Vec::new(),
        }
    }

    /// Sorted class labels seen during fit.
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    fn fitted(&self, op: &'static str) -> Result<(&Array2<f64>, &Array1<f64>)> {
        match (&self.train_x, &self.train_y) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(PipelineError::NotFitted { op }),
        }
    }

    /// Indices of the `k` nearest training rows to `row`, nearest first.
    fn neighbors(&self, train: &Array2<f64>, row: ndarray::ArrayView1<f64>) -> Vec<usize> {
        let mut dists: Vec<(f64, usize)> = train
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let d = t
                    .iter()
                    .zip(row.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>();
                (d, i)
            })
            .collect();
        dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        dists.into_iter().take(self.k).map(|(_, i)| i).collect()
    }

    /// Per-class vote fractions for one sample.
    fn vote(&self, train_y: &Array1<f64>, neighbors: &[usize]) -> Vec<f64> {
        let mut counts = vec![0usize; self.classes.len()];
        for &i in neighbors {
            if let Some(c) = self
                .classes
                .iter()
                .position(|&label| label == train_y[i])
            {
                counts[c] += 1;
            }
        }
        counts
            .into_iter()
            .map(|c| c as f64 / neighbors.len() as f64)
            .collect()
    }
}

impl Pipe for KnnClassifier {
    fn caps(&self) -> Caps {
        Caps::FIT | Caps::PREDICT | Caps::PREDICT_PROBA
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Classifier
    }

    fn clone_pipe(&self) -> Box<dyn Pipe> {
        Box::new(Self::new(self.k))
    }

    fn fit(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<()> {
        let y = y.ok_or_else(|| {
            PipelineError::EmptyData("targets are required to fit a classifier".to_string())
        })?;
        if y.len() != x.nrows() {
            return Err(PipelineError::InvalidShape {
                expected: format!("{} target values", x.nrows()),
                got: format!("{}", y.len()),
            });
        }
        if self.k == 0 || self.k > x.nrows() {
            return Err(PipelineError::EmptyData(format!(
                "{} neighbors requested but {} training samples available",
                self.k,
                x.nrows()
            )));
        }
        self.classes = class_labels(y)?;
        self.train_x = Some(x.clone());
        self.train_y = Some(y.clone());
        Ok(())
    }

    fn predict(&self, method: PredictionMethod, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (train_x, train_y) = self.fitted(method.name())?;
        if x.ncols() != train_x.ncols() {
            return Err(PipelineError::FeatureMismatch {
                expected: train_x.ncols(),
                got: x.ncols(),
            });
        }

        match method {
            PredictionMethod::Predict => {
                let mut out = Array2::zeros((x.nrows(), 1));
                for (i, row) in x.rows().into_iter().enumerate() {
                    let votes = self.vote(train_y, &self.neighbors(train_x, row));
                    let mut best = 0usize;
                    for (c, &v) in votes.iter().enumerate() {
                        if v > votes[best] {
                            best = c;
                        }
                    }
                    out[[i, 0]] = self.classes[best];
                }
                Ok(out)
            }
            PredictionMethod::PredictProba => {
                let mut out = Array2::zeros((x.nrows(), self.classes.len()));
                for (i, row) in x.rows().into_iter().enumerate() {
                    let votes = self.vote(train_y, &self.neighbors(train_x, row));
                    for (c, v) in votes.into_iter().enumerate() {
                        out[[i, c]] = v;
                    }
                }
                Ok(out)
            }
            other => Err(PipelineError::Unsupported {
                pipe: self.name().to_string(),
                op: other.name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_nearest_neighbor_recovers_training_labels() {
        let x = array![[0.0, 0.0], [0.1, 0.0], [5.0, 5.0], [5.1, 5.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut knn = KnnClassifier::new(1);
        knn.fit(&x, Some(&y)).unwrap();

        let pred = knn.predict(PredictionMethod::Predict, &x).unwrap();
        assert_eq!(pred, array![[0.0], [0.0], [1.0], [1.0]]);
    }

    #[test]
    fn test_proba_rows_sum_to_one() {
        let x = array![[0.0], [1.0], [2.0], [10.0], [11.0], [12.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut knn = KnnClassifier::new(3);
        knn.fit(&x, Some(&y)).unwrap();

        let proba = knn
            .predict(PredictionMethod::PredictProba, &array![[1.0], [11.0]])
            .unwrap();
        assert_eq!(proba.shape(), &[2, 2]);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!(proba[[0, 0]] > proba[[0, 1]]);
        assert!(proba[[1, 1]] > proba[[1, 0]]);
    }

    #[test]
    fn test_fit_rejects_oversized_k() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        let mut knn = KnnClassifier::new(3);
        assert!(knn.fit(&x, Some(&y)).is_err());
    }

    #[test]
    fn test_predict_before_fit_is_rejected() {
        let knn = KnnClassifier::new(1);
        let err = knn
            .predict(PredictionMethod::Predict, &array![[0.0]])
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFitted { .. }));
    }
}
