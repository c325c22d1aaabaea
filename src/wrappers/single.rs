//! Transform wrappers for single-channel predictors.

use log::debug;
use ndarray::{Array1, Array2};

use crate::cross_validation::{cross_val_predict, resolve_folds, CvPolicy, Scorer};
use crate::error::{PipelineError, Result};
use crate::pipe::{collapse_to_labels, Caps, EstimatorKind, Pipe, PredictionMethod};

/// Validate a pipe for wrapping and choose its transform method.
fn resolve_transform_method(
    pipe: &dyn Pipe,
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

/// Gives a single-channel predictor a uniform transform interface.
///
/// `transform` applies the prediction method chosen at construction by
/// capability precedence (probabilities > decision scores >
/// log-probabilities > labels, overridable), and the wrapped pipe's native
/// prediction methods are re-exposed, backed by the stored fitted clone.
///
/// `fit_transform` is fit-then-transform: in-sample inference, intentionally
/// leaky, reserved for terminal or non-stacking use. Use
/// [`SingleChannelCv`] when the output feeds a downstream meta-predictor.
pub struct SingleChannel {
    template: Box<dyn Pipe>,
    transform_method: PredictionMethod,
    kind: EstimatorKind,
    model: Option<Box<dyn Pipe>>,
}

impl std::fmt::Debug for SingleChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SingleChannel({}, {:?})",
            self.template.name(),
            self.transform_method
        )
    }
}

impl SingleChannel {
    /// Wrap a predictor, choosing the transform method by precedence.
    ///
    /// # Errors
    /// [`PipelineError::MissingCapability`] if the pipe cannot fit,
    /// [`PipelineError::TypeConversion`] if it exposes no recognized
    /// prediction method, and [`PipelineError::UnknownEstimatorType`] if it
    /// declares neither classifier nor regressor kind. All are raised here,
    /// never deferred to fit time.
    pub fn new(pipe: Box<dyn Pipe>) -> Result<Self> {
        Self::with_transform_method(pipe, None)
    }

    /// Wrap a predictor with an explicit transform method.
    pub fn with_transform_method(
        pipe: Box<dyn Pipe>,
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

    fn fitted_model(&self, op: &'static str) -> Result<&dyn Pipe> {
        match &self.model {
            Some(model) => Ok(model.as_ref()),
            None => Err(PipelineError::NotFitted { op }),
        }
    }

    pub(crate) fn template(&self) -> &dyn Pipe {
        self.template.as_ref()
    }
}

impl Pipe for SingleChannel {
    fn caps(&self) -> Caps {
        Caps::FIT
            | Caps::TRANSFORM
            | Caps::FIT_TRANSFORM
            | (self.template.caps() & Caps::PREDICTION)
    }

    fn kind(&self) -> EstimatorKind {
        self.kind
    }

    fn clone_pipe(&self) -> Box<dyn Pipe> {
        Box::new(self.clone_unfitted())
    }

    fn fit(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<()> {
        let mut model = self.template.clone_pipe();
        model.fit(x, y)?;
        self.model = Some(model);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fitted_model("transform")?
            .predict(self.transform_method, x)
    }

    fn fit_transform(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<Array2<f64>> {
        // a predictor with its own fused operation keeps it
        if self.template.caps().contains(Caps::FIT_TRANSFORM) {
            let mut model = self.template.clone_pipe();
            let out = model.fit_transform(x, y)?;
            self.model = Some(model);
            return Ok(out);
        }
        self.fit(x, y)?;
        self.transform(x)
    }

    fn predict(&self, method: PredictionMethod, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fitted_model(method.name())?.predict(method, x)
    }
}

/// [`SingleChannel`] plus internal cross-validation on `fit_transform`.
///
/// On `fit_transform` the predictor is fit on the full training set *and*
/// refit independently per fold; the full-data model is stored and backs all
/// later `transform`/`predict` calls, while the per-fold models produce the
/// returned out-of-fold output and are then discarded. No sample's output
/// was produced by a model that had seen that sample's label.
pub struct SingleChannelCv {
    wrapped: SingleChannel,
    cv: CvPolicy,
    fold_workers: usize,
    scorer: Option<Scorer>,
    score: Option<f64>,
}

impl SingleChannelCv {
    /// Wrap a predictor with the given fold policy.
    ///
    /// # Errors
    /// Same construction-time checks as [`SingleChannel::new`].
    pub fn new(pipe: Box<dyn Pipe>, cv: CvPolicy) -> Result<Self> {
        Ok(Self {
            wrapped: SingleChannel::new(pipe)?,
            cv,
            fold_workers: 1,
            scorer: None,
            score: None,
        })
    }

    /// Override the transform method chosen by precedence.
    pub fn with_transform_method(mut self, method: PredictionMethod) -> Result<Self> {
        self.wrapped =
            SingleChannel::with_transform_method(self.wrapped.template.clone_pipe(), Some(method))?;
        Ok(self)
    }

    /// Set the worker count for per-fold fits.
    pub fn with_fold_workers(mut self, workers: usize) -> Self {
        self.fold_workers = workers;
        self
    }

    /// Score the reassembled out-of-fold output against the targets.
    ///
    /// Probability-style outputs are collapsed to hard labels before the
    /// scorer sees them.
    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// The score retained from the last cross-validated `fit_transform`.
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

impl Pipe for SingleChannelCv {
    fn caps(&self) -> Caps {
        self.wrapped.caps()
    }

    fn kind(&self) -> EstimatorKind {
        self.wrapped.kind()
    }

    fn clone_pipe(&self) -> Box<dyn Pipe> {
        Box::new(self.clone_unfitted())
    }

    fn fit(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<()> {
        self.wrapped.fit(x, y)
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.wrapped.transform(x)
    }

    fn fit_transform(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<Array2<f64>> {
        // the full-data fit backs all later inference on new data
        self.wrapped.fit(x, y)?;

        if !self.cv.is_enabled() {
            return self.wrapped.transform(x);
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
        let out = cross_val_predict(
            self.wrapped.template.as_ref(),
            x,
            y,
            self.wrapped.transform_method,
            &folds,
            self.fold_workers,
        )?;

        if let Some(scorer) = &self.scorer {
            let labels = collapse_to_labels(&out, self.wrapped.transform_method);
            self.score = Some(scorer(y, &labels));
        }
        Ok(out)
    }

    fn predict(&self, method: PredictionMethod, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.wrapped.predict(method, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{balanced_accuracy_score, make_scorer};
    use crate::probes::{KnnClassifier, StandardScalerPipe};
    use crate::synthetic::make_classification;

    #[test]
    fn test_wrapped_predict_matches_unwrapped() {
        // 100-sample / 20-feature synthetic set, 5-neighbor classifier
        let (x, y) = make_classification(100, 20, 5, 42);

        let mut plain = KnnClassifier::new(5);
        plain.fit(&x, Some(&y)).unwrap();
        let expected = plain.predict(PredictionMethod::Predict, &x).unwrap();

        let mut wrapped = SingleChannel::new(Box::new(KnnClassifier::new(5))).unwrap();
        wrapped.fit(&x, Some(&y)).unwrap();
        let got = wrapped.predict(PredictionMethod::Predict, &x).unwrap();

        assert_eq!(expected, got);
    }

    #[test]
    fn test_transform_method_precedence() {
        let w = SingleChannel::new(Box::new(KnnClassifier::new(3))).unwrap();
        assert_eq!(w.transform_method(), PredictionMethod::PredictProba);

        let w = SingleChannel::with_transform_method(
            Box::new(KnnClassifier::new(3)),
            Some(PredictionMethod::Predict),
        )
        .unwrap();
        assert_eq!(w.transform_method(), PredictionMethod::Predict);
    }

    #[test]
    fn test_wrapping_a_transformer_fails_at_construction() {
        let err = SingleChannel::new(Box::new(StandardScalerPipe::new())).unwrap_err();
        assert!(matches!(err, PipelineError::TypeConversion { .. }));
    }

    #[test]
    fn test_transform_before_fit_is_rejected() {
        let w = SingleChannel::new(Box::new(KnnClassifier::new(3))).unwrap();
        let (x, _) = make_classification(10, 4, 2, 0);
        assert!(matches!(
            w.transform(&x),
            Err(PipelineError::NotFitted { .. })
        ));
    }

    #[test]
    fn test_cv_fit_transform_output_shape_and_score() {
        let (x, y) = make_classification(100, 20, 5, 7);
        let mut w = SingleChannelCv::new(Box::new(KnnClassifier::new(5)), CvPolicy::Folds(5))
            .unwrap()
            .with_scorer(make_scorer(balanced_accuracy_score));

        let out = w.fit_transform(&x, Some(&y)).unwrap();
        // probability output for two classes
        assert_eq!(out.shape(), &[100, 2]);
        let score = w.score().expect("score retained");
        assert!(score > 0.6, "informative data scored {score}");

        // the stored full-data model still serves inference
        let preds = w.predict(PredictionMethod::Predict, &x).unwrap();
        assert_eq!(preds.nrows(), 100);
    }

    #[test]
    fn test_disabled_cv_falls_back_to_in_sample_transform() {
        let (x, y) = make_classification(40, 8, 3, 3);
        let mut w =
            SingleChannelCv::new(Box::new(KnnClassifier::new(3)), CvPolicy::Disabled).unwrap();
        let out = w.fit_transform(&x, Some(&y)).unwrap();

        let mut plain = SingleChannel::new(Box::new(KnnClassifier::new(3))).unwrap();
        let expected = plain.fit_transform(&x, Some(&y)).unwrap();
        assert_eq!(out, expected);

        let mut w = SingleChannelCv::new(Box::new(KnnClassifier::new(3)), CvPolicy::Folds(1))
            .unwrap()
            .with_scorer(make_scorer(balanced_accuracy_score));
        let out = w.fit_transform(&x, Some(&y)).unwrap();
        assert_eq!(out, expected);
        assert!(w.score().is_none(), "no score without internal cv");
    }
}
