//! Cross-validated channel scoring.

use ndarray::{Array1, Array2};

use crate::channel::Channel;
use crate::cross_validation::{cross_val_score, CvPolicy, Scorer};
use crate::error::Result;
use crate::pipe::Pipe;

/// Scores channels by the cross-validated performance of a probe estimator.
///
/// A fresh probe clone is cross-validated on each channel; the mean fold
/// score estimates how much target signal that channel carries. Useful for
/// ranking channels before routing decisions.
pub struct CvPerformanceScorer {
    probe: Box<dyn Pipe>,
    scorer: Scorer,
    cv: CvPolicy,
    workers: usize,
}

impl CvPerformanceScorer {
    /// Create a scorer around a probe estimator and a figure of merit.
    pub fn new(probe: Box<dyn Pipe>, scorer: Scorer) -> Self {
        Self {
            probe,
            scorer,
            cv: CvPolicy::default(),
            workers: 1,
        }
    }

    /// Set the fold policy used for probing.
    pub fn with_cv_policy(mut self, cv: CvPolicy) -> Self {
        self.cv = cv;
        self
    }

    /// Set the worker count for per-fold probe fits.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Mean cross-validated score of the probe on one feature matrix.
    pub fn score_channel(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let scores = cross_val_score(
            self.probe.as_ref(),
            x,
            y,
            &self.scorer,
            &self.cv,
            self.workers,
        )?;
        Ok(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    /// Score every channel in a list; dead channels score `None`.
    pub fn score_channels(&self, xs: &[Channel], y: &Array1<f64>) -> Result<Vec<Option<f64>>> {
        xs.iter()
            .map(|channel| match channel {
                Some(x) => self.score_channel(x, y).map(Some),
                None => Ok(None),
            })
            .collect()
    }
}
