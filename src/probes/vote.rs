//! Soft-voting classification across channels.

use ndarray::{Array1, Array2};

use crate::channel::Channel;
use crate::error::{PipelineError, Result};
use crate::pipe::{Caps, EstimatorKind, MultichannelPipe, Pipe, PredictionMethod};
use crate::probes::KnnClassifier;

/// Multichannel classifier that soft-votes over per-channel models.
///
/// One k-nearest-neighbors model is fit per live channel; dead channels get
/// no model. Probabilities are averaged across the live channels and hard
/// labels taken by argmax, ties breaking on the lower class label.
pub struct ChannelVoteClassifier {
    k: usize,
    // one slot per channel, None where the channel was dead at fit time
    models: Vec<Option<KnnClassifier>>,
    classes: Vec<f64>,
}

impl ChannelVoteClassifier {
    /// Create a voting classifier with `k` neighbors per channel model.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            models: Vec::new(),
            classes: Vec::new(),
        }
    }

    fn average_proba(&self, xs: &[Channel]) -> Result<Array2<f64>> {
        if self.models.is_empty() {
            return Err(PipelineError::NotFitted { op: "predict" });
        }
        if xs.len() != self.models.len() {
            return Err(PipelineError::ChannelCountMismatch {
                expected: self.models.len(),
                got: xs.len(),
            });
        }

        let mut sum: Option<Array2<f64>> = None;
        let mut voters = 0usize;
        for (channel, model) in xs.iter().zip(&self.models) {
            let (Some(x), Some(model)) = (channel.as_ref(), model) else {
                continue;
            };
            let proba = model.predict(PredictionMethod::PredictProba, x)?;
            sum = Some(match sum {
                Some(acc) => acc + &proba,
                None => proba,
            });
            voters += 1;
        }
        match sum {
            Some(total) => Ok(total / voters as f64),
            None => Err(PipelineError::EmptyData(
                "no live channel has a fitted voter".to_string(),
            )),
        }
    }
}

impl MultichannelPipe for ChannelVoteClassifier {
    fn caps(&self) -> Caps {
        Caps::FIT | Caps::PREDICT | Caps::PREDICT_PROBA
    }

    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Classifier
    }

    fn clone_pipe(&self) -> Box<dyn MultichannelPipe> {
        Box::new(Self::new(self.k))
    }

    fn fit(&mut self, xs: &[Channel], y: Option<&Array1<f64>>) -> Result<()> {
        let y = y.ok_or_else(|| {
            PipelineError::EmptyData("targets are required to fit a classifier".to_string())
        })?;
        let mut models = Vec::with_capacity(xs.len());
        let mut classes = Vec::new();
        for channel in xs {
            match channel {
                Some(x) => {
                    let mut model = KnnClassifier::new(self.k);
                    model.fit(x, Some(y))?;
                    classes = model.classes().to_vec();
                    models.push(Some(model));
                }
                None => models.push(None),
            }
        }
        if classes.is_empty() {
            return Err(PipelineError::EmptyData(
                "cannot fit a voting classifier on all-dead channels".to_string(),
            ));
        }
        self.models = models;
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, method: PredictionMethod, xs: &[Channel]) -> Result<Array2<f64>> {
        match method {
            PredictionMethod::PredictProba => self.average_proba(xs),
            PredictionMethod::Predict => {
                let proba = self.average_proba(xs)?;
                let mut out = Array2::zeros((proba.nrows(), 1));
                for (i, row) in proba.rows().into_iter().enumerate() {
                    let mut best = 0usize;
                    for (c, &v) in row.iter().enumerate() {
                        if v > row[best] {
                            best = c;
                        }
                    }
                    out[[i, 0]] = self.classes[best];
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
