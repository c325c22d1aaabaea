//! Nearest-centroid classification.

use ndarray::{Array1, Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::pipe::{Caps, EstimatorKind, Pipe, PredictionMethod};
use crate::probes::knn::class_labels;

/// Classifies by distance to per-class feature means.
///
/// Declares hard-label prediction only, which makes it the usual probe for
/// the lowest rung of the transform-method precedence.
#[derive(Debug, Clone, Default)]
pub struct NearestCentroidClassifier {
    classes: Vec<f64>,
    centroids: Option<Array2<f64>>,
}

impl NearestCentroidClassifier {
    /// Create an unfitted classifier.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pipe for NearestCentroidClassifier {
    fn caps(&self) -> Caps {
        Caps::FIT | Caps::PREDICT
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Classifier
    }

    fn clone_pipe(&self) -> Box<dyn Pipe> {
        Box::new(Self::new())
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
        let classes = class_labels(y)?;

        let mut centroids = Array2::zeros((classes.len(), x.ncols()));
        for (c, &label) in classes.iter().enumerate() {
            let members: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, &v)| v == label)
                .map(|(i, _)| i)
                .collect();
            let mean = x.select(Axis(0), &members).mean_axis(Axis(0)).ok_or_else(
                || PipelineError::EmptyData(format!("class {label} has no samples")),
            )?;
            centroids.row_mut(c).assign(&mean);
        }
        self.classes = classes;
        self.centroids = Some(centroids);
        Ok(())
    }

    fn predict(&self, method: PredictionMethod, x: &Array2<f64>) -> Result<Array2<f64>> {
        if method != PredictionMethod::Predict {
            return Err(PipelineError::Unsupported {
                pipe: self.name().to_string(),
                op: method.name(),
            });
        }
        let centroids = self
            .centroids
            .as_ref()
            .ok_or(PipelineError::NotFitted { op: "predict" })?;
        if x.ncols() != centroids.ncols() {
            return Err(PipelineError::FeatureMismatch {
                expected: centroids.ncols(),
                got: x.ncols(),
            });
        }

        let mut out = Array2::zeros((x.nrows(), 1));
        for (i, row) in x.rows().into_iter().enumerate() {
            let mut best = 0usize;
            let mut best_d = f64::INFINITY;
            for (c, centroid) in centroids.rows().into_iter().enumerate() {
                let d = centroid
                    .iter()
                    .zip(row.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>();
                if d < best_d {
                    best = c;
                    best_d = d;
                }
            }
            out[[i, 0]] = self.classes[best];
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_predicts_by_nearest_centroid() {
        let x = array![[0.0, 0.0], [0.2, 0.0], [4.0, 4.0], [4.2, 4.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut clf = NearestCentroidClassifier::new();
        clf.fit(&x, Some(&y)).unwrap();

        let pred = clf
            .predict(PredictionMethod::Predict, &array![[0.1, 0.1], [3.9, 4.1]])
            .unwrap();
        assert_eq!(pred, array![[0.0], [1.0]]);
    }

    #[test]
    fn test_proba_is_not_declared() {
        let clf = NearestCentroidClassifier::new();
        assert!(!clf.caps().contains(Caps::PREDICT_PROBA));
        assert!(clf
            .predict(PredictionMethod::PredictProba, &array![[0.0]])
            .is_err());
    }
}
