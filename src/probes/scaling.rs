//! Column standardization.

use ndarray::{Array1, Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::pipe::{Caps, Pipe};

/// Standardizes each column to zero mean and unit variance.
///
/// Constant columns keep a unit divisor so they pass through centered.
#[derive(Debug, Clone, Default)]
pub struct StandardScalerPipe {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScalerPipe {
    /// Create an unfitted scaler.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pipe for StandardScalerPipe {
    fn caps(&self) -> Caps {
        Caps::FIT | Caps::TRANSFORM | Caps::FIT_TRANSFORM
    }

    fn clone_pipe(&self) -> Box<dyn Pipe> {
        Box::new(Self::new())
    }

    fn fit(&mut self, x: &Array2<f64>, _y: Option<&Array1<f64>>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(PipelineError::EmptyData(
                "cannot fit a scaler on an empty matrix".to_string(),
            ));
        }
        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            PipelineError::EmptyData("cannot fit a scaler on an empty matrix".to_string())
        })?;
        let n = x.nrows() as f64;
        let scale = x
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(col, &m)| {
                let var = col.iter().map(|&v| (v - m) * (v - m)).sum::<f64>() / n;
                let sd = var.sqrt();
                if sd > 0.0 {
                    sd
                } else {
                    1.0
                }
            })
            .collect::<Array1<f64>>();
        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = match (&self.mean, &self.scale) {
            (Some(mean), Some(scale)) => (mean, scale),
            _ => return Err(PipelineError::NotFitted { op: "transform" }),
        };
        if x.ncols() != mean.len() {
            return Err(PipelineError::FeatureMismatch {
                expected: mean.len(),
                got: x.ncols(),
            });
        }
        Ok((x - mean) / scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardizes_columns() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let mut scaler = StandardScalerPipe::new();
        let out = scaler.fit_transform(&x, None).unwrap();

        for col in out.axis_iter(Axis(1)) {
            assert!(col.sum().abs() < 1e-12);
            let var = col.iter().map(|&v| v * v).sum::<f64>() / 3.0;
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_is_centered_not_divided() {
        let x = array![[5.0], [5.0], [5.0]];
        let mut scaler = StandardScalerPipe::new();
        let out = scaler.fit_transform(&x, None).unwrap();
        assert_eq!(out, array![[0.0], [0.0], [0.0]]);
    }

    #[test]
    fn test_transform_before_fit_is_rejected() {
        let scaler = StandardScalerPipe::new();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(PipelineError::NotFitted { .. })
        ));
    }
}
