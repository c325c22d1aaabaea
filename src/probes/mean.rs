//! Constant-mean regression.

use ndarray::{Array1, Array2};

use crate::error::{PipelineError, Result};
use crate::pipe::{Caps, EstimatorKind, Pipe, PredictionMethod};

/// Predicts the training-target mean for every sample.
#[derive(Debug, Clone, Default)]
pub struct MeanRegressor {
    mean: Option<f64>,
}

impl MeanRegressor {
    /// Create an unfitted regressor.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pipe for MeanRegressor {
    fn caps(&self) -> Caps {
        Caps::FIT | Caps::PREDICT
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Regressor
    }

    fn clone_pipe(&self) -> Box<dyn Pipe> {
        Box::new(Self::new())
    }

    fn fit(&mut self, _x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<()> {
        let y = y.ok_or_else(|| {
            PipelineError::EmptyData("targets are required to fit a regressor".to_string())
        })?;
        if y.is_empty() {
            return Err(PipelineError::EmptyData(
                "cannot fit a regressor on empty targets".to_string(),
            ));
        }
        self.mean = Some(y.sum() / y.len() as f64);
        Ok(())
    }

    fn predict(&self, method: PredictionMethod, x: &Array2<f64>) -> Result<Array2<f64>> {
        if method != PredictionMethod::Predict {
            return Err(PipelineError::Unsupported {
                pipe: self.name().to_string(),
                op: method.name(),
            });
        }
        let mean = self.mean.ok_or(PipelineError::NotFitted { op: "predict" })?;
        Ok(Array2::from_elem((x.nrows(), 1), mean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_predicts_target_mean() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![1.0, 2.0, 6.0];
        let mut reg = MeanRegressor::new();
        reg.fit(&x, Some(&y)).unwrap();

        let pred = reg.predict(PredictionMethod::Predict, &x).unwrap();
        assert_eq!(pred, array![[3.0], [3.0], [3.0]]);
    }

    #[test]
    fn test_fit_requires_targets() {
        let mut reg = MeanRegressor::new();
        assert!(reg.fit(&array![[0.0]], None).is_err());
    }
}
