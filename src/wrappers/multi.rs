//! Transform wrappers for multichannel predictors.

use log::debug;
use ndarray::Array1;

use crate::channel::Channel;
use crate::cross_validation::{cross_val_predict_multi, resolve_folds, CvPolicy, Scorer};
use crate::error::{PipelineError, Result};
use crate::pipe::{collapse_to_labels, Caps, EstimatorKind, MultichannelPipe, PredictionMethod};

fn resolve_transform_method(
    pipe: &dyn MultichannelPipe,
    override_method: Option<PredictionMethod>,
) -> Result<PredictionMethod> {
    let caps = pipe.caps();
    if !caps.contains(Caps::FIT) {
        return Err(PipelineError::MissingCapability {
            pipe: pipe.name().to_string(),
            cap: "fit",
        });
    }
    match override_method {
        Some(method) => {
            if caps.contains(method.cap()) {
                Ok(method)
            } else {
                Err(PipelineError::MissingCapability {
                    pipe: pipe.name().to_string(),
                    cap: method.name(),
                })
            }
        }
        None => {
            PredictionMethod::from_precedence(caps).ok_or_else(|| PipelineError::TypeConversion {
                pipe: pipe.name().to_string(),
            })
        }
    }
}

/// Place a converged prediction in the first slot of a channel list.
fn into_first_slot(out: ndarray::Array2<f64>, n_channels: usize) -> Vec<Channel> {
    let mut slots: Vec<Channel> = vec![None; n_channels];
    if let Some(first) = slots.first_mut() {
        *first = Some(out);
    }
    slots
}

/// Gives a multichannel predictor a uniform transform interface.
///
/// A multichannel predictor converges its input channels to one output
/// array; `transform` records that array in the first output slot and leaves
/// the remaining slots dead, following the concatenator convention.
pub struct Multichannel {
    template: Box<dyn MultichannelPipe>,
    transform_method: PredictionMethod,
    kind: EstimatorKind,
    model: Option<Box<dyn MultichannelPipe>>,
}

impl std::fmt::Debug for Multichannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Multichannel({}, {:?})",
            self.template.name(),
            self.transform_method
        )
    }
}

impl Multichannel {
    /// Wrap a multichannel predictor, choosing the transform method by
    /// precedence.
    ///
    /// # Errors
    /// Same construction-time checks as
    /// [`SingleChannel::new`](crate::wrappers::SingleChannel::new).
    pub fn new(pipe: Box<dyn MultichannelPipe>) -> Result<Self> {
        Self::with_transform_method(pipe, None)
    }

    /// Wrap a multichannel predictor with an explicit transform method.
    pub fn with_transform_method(
        pipe: Box<dyn MultichannelPipe>,
        method: Option<PredictionMethod>,
    ) -> Result<Self> {
        let transform_method = resolve_transform_method(pipe.as_ref(), method)?;
        let kind = pipe.kind();
        if kind == EstimatorKind::None {
            return Err(PipelineError::UnknownEstimatorType {
                pipe: pipe.name().to_string(),
            });
        }
        Ok(Self {
            template: pipe,
            transform_method,
            kind,
            model: None,
        })
    }

    /// The prediction method used for transforming.
    pub fn transform_method(&self) -> PredictionMethod {
        self.transform_method
    }

    fn clone_unfitted(&self) -> Self {
        Self {
            template: self.template.clone_pipe(),
            transform_method: self.transform_method,
            kind: self.kind,
            model: None,
        }
    }

    fn fitted_model(&self, op: &'static str) -> Result<&dyn MultichannelPipe> {
        match &self.model {
            Some(model) => Ok(model.as_ref()),
            None => Err(PipelineError::NotFitted { op }),
        }
    }
}

impl MultichannelPipe for Multichannel {
    fn caps(&self) -> Caps {
        Caps::FIT
            | Caps::TRANSFORM
            | Caps::FIT_TRANSFORM
            | (self.template.caps() & Caps::PREDICTION)
    }

    fn kind(&self) -> EstimatorKind {
        self.kind
    }

    fn clone_pipe(&self) -> Box<dyn MultichannelPipe> {
        Box::new(self.clone_unfitted())
    }

    fn fit(&mut self, xs: &[Channel], y: Option<&Array1<f64>>) -> Result<()> {
        let mut model = self.template.clone_pipe();
        model.fit(xs, y)?;
        self.model = Some(model);
        Ok(())
    }

    fn transform(&self, xs: &[Channel]) -> Result<Vec<Channel>> {
        let out = self
            .fitted_model("transform")?
            .predict(self.transform_method, xs)?;
        Ok(into_first_slot(out, xs.len()))
    }

    fn predict(
        &self,
        method: PredictionMethod,
        xs: &[Channel],
    ) -> Result<ndarray::Array2<f64>> {
        self.fitted_model(method.name())?.predict(method, xs)
    }
}

/// [`Multichannel`] plus internal cross-validation on `fit_transform`.
///
/// Train/test indices are computed once from the targets and applied
/// identically to every live channel, preserving cross-channel alignment.
/// When a scorer is configured, per-channel scores are averaged over live
/// output channels into one aggregate.
pub struct MultichannelCv {
    wrapped: Multichannel,
    cv: CvPolicy,
    fold_workers: usize,
    scorer: Option<Scorer>,
    score: Option<f64>,
}

impl MultichannelCv {
    /// Wrap a multichannel predictor with the given fold policy.
    pub fn new(pipe: Box<dyn MultichannelPipe>, cv: CvPolicy) -> Result<Self> {
        Ok(Self {
            wrapped: Multichannel::new(pipe)?,
            cv,
            fold_workers: 1,
            scorer: None,
            score: None,
        })
    }

    /// Set the worker count for per-fold fits.
    pub fn with_fold_workers(mut self, workers: usize) -> Self {
        self.fold_workers = workers;
        self
    }

    /// Score reassembled out-of-fold output against the targets.
    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// The aggregate score retained from the last cross-validated
    /// `fit_transform`.
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    fn clone_unfitted(&self) -> Self {
        Self {
            wrapped: self.wrapped.clone_unfitted(),
            cv: self.cv.clone(),
            fold_workers: self.fold_workers,
            scorer: self.scorer.clone(),
            score: None,
        }
    }
}

impl MultichannelPipe for MultichannelCv {
    fn caps(&self) -> Caps {
        self.wrapped.caps()
    }

    fn kind(&self) -> EstimatorKind {
        self.wrapped.kind()
    }

    fn clone_pipe(&self) -> Box<dyn MultichannelPipe> {
        Box::new(self.clone_unfitted())
    }

    fn fit(&mut self, xs: &[Channel], y: Option<&Array1<f64>>) -> Result<()> {
        self.wrapped.fit(xs, y)
    }

    fn transform(&self, xs: &[Channel]) -> Result<Vec<Channel>> {
        self.wrapped.transform(xs)
    }

    fn fit_transform(&mut self, xs: &[Channel], y: Option<&Array1<f64>>) -> Result<Vec<Channel>> {
        // the full-data fit backs all later inference on new data
        self.wrapped.fit(xs, y)?;

        if !self.cv.is_enabled() {
            return self.wrapped.transform(xs);
        }

        let y = y.ok_or_else(|| {
            PipelineError::EmptyData("targets are required for internal cross-validation".into())
        })?;
        let folds = resolve_folds(&self.cv, y, self.kind())?;
        debug!(
            "{}: internal cv with {} folds",
            self.wrapped.template.name(),
            folds.len()
        );
        let out = cross_val_predict_multi(
            self.wrapped.template.as_ref(),
            xs,
            y,
            self.wrapped.transform_method,
            &folds,
            self.fold_workers,
        )?;
        let outs = into_first_slot(out, xs.len());

        if let Some(scorer) = &self.scorer {
            let mut scores = Vec::new();
            for channel in outs.iter().flatten() {
                let labels = collapse_to_labels(channel, self.wrapped.transform_method);
                scores.push(scorer(y, &labels));
            }
            if !scores.is_empty() {
                self.score = Some(scores.iter().sum::<f64>() / scores.len() as f64);
            }
        }
        Ok(outs)
    }

    fn predict(
        &self,
        method: PredictionMethod,
        xs: &[Channel],
    ) -> Result<ndarray::Array2<f64>> {
        self.wrapped.predict(method, xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{balanced_accuracy_score, make_scorer};
    use crate::probes::ChannelVoteClassifier;
    use crate::synthetic::make_multichannel_classification;

    #[test]
    fn test_transform_places_output_in_first_slot() {
        let (xs, y, _) = make_multichannel_classification(3, 0, 60, 6, 9);
        let mut w = Multichannel::new(Box::new(ChannelVoteClassifier::new(3))).unwrap();
        w.fit(&xs, Some(&y)).unwrap();

        let out = w.transform(&xs).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out[0].is_some());
        assert!(out[1].is_none());
        assert!(out[2].is_none());
    }

    #[test]
    fn test_cv_fit_transform_scores_live_channels() {
        let (xs, y, _) = make_multichannel_classification(3, 0, 90, 6, 21);
        let mut w = MultichannelCv::new(
            Box::new(ChannelVoteClassifier::new(3)),
            CvPolicy::Folds(3),
        )
        .unwrap()
        .with_scorer(make_scorer(balanced_accuracy_score));

        let out = w.fit_transform(&xs, Some(&y)).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out[0].is_some());
        assert!(out.iter().skip(1).all(|c| c.is_none()));
        assert!(w.score().is_some());
    }

    #[test]
    fn test_missing_fit_capability_fails_at_construction() {
        use crate::channel::ChannelConcatenator;

        struct PredictOnly;
        impl MultichannelPipe for PredictOnly {
            fn caps(&self) -> Caps {
                Caps::PREDICT
            }
            fn kind(&self) -> EstimatorKind {
                EstimatorKind::Classifier
            }
            fn clone_pipe(&self) -> Box<dyn MultichannelPipe> {
                Box::new(PredictOnly)
            }
            fn fit(&mut self, _xs: &[Channel], _y: Option<&Array1<f64>>) -> Result<()> {
                Ok(())
            }
        }

        let err = Multichannel::new(Box::new(PredictOnly)).unwrap_err();
        assert!(matches!(err, PipelineError::MissingCapability { .. }));

        // a pure transformer exposes no prediction method to convert
        let err = Multichannel::new(Box::new(ChannelConcatenator::new())).unwrap_err();
        assert!(matches!(err, PipelineError::TypeConversion { .. }));
    }
}
