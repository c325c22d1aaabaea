//! The channel router: maps disjoint channel ranges to components and
//! executes fit/transform across all live mappings.
//!
//! A layer holds a fixed channel count. Each mapping binds one contiguous
//! channel range to exactly one component; ranges never overlap and a range
//! wider than one channel requires a multichannel component. During fit,
//! predict-only components are automatically wrapped with a transform
//! wrapper (cross-validated when the fold policy requests internal CV,
//! plain otherwise) so every live mapping produces features.
//!
//! A mapping is live iff at least one of its input channels is live. Dead
//! mappings are skipped entirely: never fit, outputs left dead. Fitting
//! replaces the layer's retained fitted models wholesale; the registered
//! components are read-only templates and only clones are ever fit.

use std::ops::Range;

use log::debug;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::channel::{check_channel_count, has_live, Channel};
use crate::cross_validation::CvPolicy;
use crate::error::{PipelineError, Result};
use crate::pipe::{Caps, Component, EstimatorKind, FitOptions, Pipe, PredictionMethod};
use crate::wrappers::{Multichannel, MultichannelCv, SingleChannel, SingleChannelCv};

/// A contiguous channel range bound to exactly one component.
#[derive(Debug, Clone)]
pub struct ChannelMapping {
    range: Range<usize>,
    component: Component,
}

impl ChannelMapping {
    /// The channel range this mapping consumes and produces.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// The registered component template.
    pub fn component(&self) -> &Component {
        &self.component
    }
}

/// A fitted component clone plus the mapping it was fit on.
///
/// Owned exclusively by the layer that produced it; replaced wholesale on
/// re-fit.
struct FittedModel {
    range: Range<usize>,
    component: Component,
}

/// Result of dispatching a prediction method across a fitted layer.
#[derive(Debug)]
pub enum Prediction {
    /// Exactly one mapping produced output: the typical, converged case.
    Single(Array2<f64>),
    /// Zero or several mappings produced output; one slot per channel,
    /// dead slots where no mapping wrote.
    PerChannel(Vec<Channel>),
}

impl Prediction {
    /// The converged output, if this is the single-output case.
    pub fn into_single(self) -> Option<Array2<f64>> {
        match self {
            Prediction::Single(out) => Some(out),
            Prediction::PerChannel(_) => None,
        }
    }
}

/// Clone a component template, wrapping predict-only components so they can
/// produce transform output.
///
/// `terminal` selects the plain wrapper regardless of the fold policy: a
/// terminal layer needs single-pass transform only, not leakage protection.
fn resolve_component(
    template: &Component,
    cv: &CvPolicy,
    fold_workers: usize,
    terminal: bool,
) -> Result<Component> {
    let caps = template.caps();
    if caps.has_transform() {
        return Ok(template.clone());
    }
    if !caps.is_predictor() {
        return Err(PipelineError::TypeConversion {
            pipe: template.name().to_string(),
        });
    }

    let wrap_cv = !terminal && cv.is_enabled();
    match template {
        Component::Single(pipe) => {
            let clone = pipe.clone_pipe();
            if wrap_cv {
                Ok(Component::Single(Box::new(
                    SingleChannelCv::new(clone, cv.clone())?.with_fold_workers(fold_workers),
                )))
            } else {
                Ok(Component::Single(Box::new(SingleChannel::new(clone)?)))
            }
        }
        Component::Multi(pipe) => {
            let clone = pipe.clone_pipe();
            if wrap_cv {
                Ok(Component::Multi(Box::new(
                    MultichannelCv::new(clone, cv.clone())?.with_fold_workers(fold_workers),
                )))
            } else {
                Ok(Component::Multi(Box::new(Multichannel::new(clone)?)))
            }
        }
    }
}

/// Fit one resolved component on its channel slice and produce its outputs,
/// one slot per channel in the mapping's range.
fn fit_transform_mapping(
    component: &mut Component,
    range: &Range<usize>,
    xs: &[Channel],
    y: Option<&Array1<f64>>,
) -> Result<Vec<Channel>> {
    match component {
        Component::Single(pipe) => {
            let name = pipe.name();
            let Some(x) = xs[range.start].as_ref() else {
                return Ok(vec![None]);
            };
            let out = if pipe.caps().contains(Caps::FIT_TRANSFORM) {
                pipe.fit_transform(x, y)
            } else {
                pipe.fit(x, y).and_then(|()| pipe.transform(x))
            }
            .map_err(|e| PipelineError::fit_failure(name, "fit_transform", e))?;
            Ok(vec![Some(out)])
        }
        Component::Multi(pipe) => {
            let name = pipe.name();
            let slice = &xs[range.start..range.end];
            let outs = if pipe.caps().contains(Caps::FIT_TRANSFORM) {
                pipe.fit_transform(slice, y)
            } else {
                pipe.fit(slice, y).and_then(|()| pipe.transform(slice))
            }
            .map_err(|e| PipelineError::fit_failure(name, "fit_transform", e))?;
            if outs.len() != range.len() {
                return Err(PipelineError::ChannelCountMismatch {
                    expected: range.len(),
                    got: outs.len(),
                });
            }
            Ok(outs)
        }
    }
}

/// Fit one resolved component without producing output.
fn fit_mapping(
    component: &mut Component,
    range: &Range<usize>,
    xs: &[Channel],
    y: Option<&Array1<f64>>,
) -> Result<()> {
    match component {
        Component::Single(pipe) => {
            let name = pipe.name();
            let Some(x) = xs[range.start].as_ref() else {
                return Ok(());
            };
            pipe.fit(x, y)
                .map_err(|e| PipelineError::fit_failure(name, "fit", e))
        }
        Component::Multi(pipe) => {
            let name = pipe.name();
            pipe.fit(&xs[range.start..range.end], y)
                .map_err(|e| PipelineError::fit_failure(name, "fit", e))
        }
    }
}

/// An ordered set of channel mappings over a fixed channel count.
pub struct Layer {
    n_channels: usize,
    mappings: Vec<ChannelMapping>,
    mapped: Vec<bool>,
    models: Vec<FittedModel>,
    fitted: bool,
    methods: Caps,
    kind: EstimatorKind,
}

impl Layer {
    /// Create an empty layer with a fixed channel count.
    pub fn new(n_channels: usize) -> Self {
        Self {
            n_channels,
            mappings: Vec::new(),
            mapped: vec![false; n_channels],
            models: Vec::new(),
            fitted: false,
            methods: Caps::empty(),
            kind: EstimatorKind::None,
        }
    }

    /// The layer's fixed channel count.
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// The registered mappings, in assignment order.
    pub fn mappings(&self) -> &[ChannelMapping] {
        &self.mappings
    }

    /// Whether any fit call has completed on this layer.
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Duplicate the layer's mappings without any fitted state.
    pub fn clone_unfitted(&self) -> Self {
        Self {
            n_channels: self.n_channels,
            mappings: self.mappings.clone(),
            mapped: self.mapped.clone(),
            models: Vec::new(),
            fitted: false,
            methods: Caps::empty(),
            kind: EstimatorKind::None,
        }
    }

    fn check_range(&self, range: &Range<usize>) -> Result<()> {
        if range.is_empty() {
            return Err(PipelineError::EmptyAssignment);
        }
        if range.end > self.n_channels {
            return Err(PipelineError::ChannelOutOfBounds {
                index: range.end - 1,
                n_channels: self.n_channels,
            });
        }
        for i in range.clone() {
            if self.mapped[i] {
                return Err(PipelineError::DuplicateChannelMapping { index: i });
            }
        }
        Ok(())
    }

    /// Register a mapping from a channel range to one component.
    ///
    /// # Errors
    /// [`PipelineError::DuplicateChannelMapping`] if any index in the range
    /// is already mapped, [`PipelineError::InvalidChannelArity`] if the
    /// range is wider than one channel and the component is single-channel,
    /// plus bounds errors for invalid ranges.
    pub fn assign(&mut self, range: Range<usize>, component: Component) -> Result<()> {
        self.check_range(&range)?;
        if range.len() > 1 && !component.is_multichannel() {
            return Err(PipelineError::InvalidChannelArity {
                pipe: component.name().to_string(),
                width: range.len(),
            });
        }
        for i in range.clone() {
            self.mapped[i] = true;
        }
        self.mappings.push(ChannelMapping { range, component });
        Ok(())
    }

    /// Register one single-channel pipe per channel of a range.
    ///
    /// # Errors
    /// [`PipelineError::ArityMismatch`] if the list length differs from the
    /// range width, plus the checks of [`Layer::assign`].
    pub fn assign_each(&mut self, range: Range<usize>, pipes: Vec<Box<dyn Pipe>>) -> Result<()> {
        self.check_range(&range)?;
        if pipes.len() != range.len() {
            return Err(PipelineError::ArityMismatch {
                pipes: pipes.len(),
                width: range.len(),
            });
        }
        for (i, pipe) in range.zip(pipes) {
            self.mapped[i] = true;
            self.mappings.push(ChannelMapping {
                range: i..i + 1,
                component: Component::Single(pipe),
            });
        }
        Ok(())
    }

    /// Collect (mapping index, range, resolved unfitted clone) for every
    /// live mapping; dead mappings are skipped entirely.
    fn live_jobs(
        &self,
        xs: &[Channel],
        cv: &CvPolicy,
        fold_workers: usize,
        terminal: bool,
    ) -> Result<Vec<(usize, Range<usize>, Component)>> {
        let mut jobs = Vec::new();
        for (i, mapping) in self.mappings.iter().enumerate() {
            if has_live(&mapping.range, xs) {
                let resolved = resolve_component(&mapping.component, cv, fold_workers, terminal)?;
                jobs.push((i, mapping.range.clone(), resolved));
            } else {
                debug!(
                    "skipping `{}` on channels {:?}: all inputs dead",
                    mapping.component.name(),
                    mapping.range
                );
            }
        }
        Ok(jobs)
    }

    /// Fit every live mapping and produce the transformed channel list.
    ///
    /// Channels outside any live mapping pass through unchanged. The
    /// retained fitted-model list is replaced wholesale. With
    /// `opts.mapping_workers > 1`, distinct live mappings are fanned out to
    /// a fixed-size worker pool; each worker fits its own clone, so results
    /// are identical to sequential execution.
    pub fn fit_transform(
        &mut self,
        xs: &[Channel],
        y: Option<&Array1<f64>>,
        cv: &CvPolicy,
        opts: &FitOptions,
    ) -> Result<Vec<Channel>> {
        check_channel_count(xs, self.n_channels)?;
        self.models.clear();
        self.fitted = false;
        self.methods = Caps::empty();
        self.kind = EstimatorKind::None;

        let jobs = self.live_jobs(xs, cv, opts.fold_workers, false)?;
        let run = |(i, range, mut component): (usize, Range<usize>, Component)| {
            let outs = fit_transform_mapping(&mut component, &range, xs, y)?;
            Ok((i, range, component, outs))
        };
        let fitted: Vec<(usize, Range<usize>, Component, Vec<Channel>)> =
            if opts.mapping_workers > 1 {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(opts.mapping_workers)
                    .build()
                    .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;
                pool.install(|| jobs.into_par_iter().map(run).collect::<Result<Vec<_>>>())?
            } else {
                jobs.into_iter().map(run).collect::<Result<Vec<_>>>()?
            };

        let mut xs_t = xs.to_vec();
        for (_, range, component, outs) in fitted {
            for (slot, out) in range.clone().zip(outs) {
                xs_t[slot] = out;
            }
            self.models.push(FittedModel { range, component });
        }
        self.fitted = true;
        Ok(xs_t)
    }

    /// Fit every live mapping without producing transformed output.
    ///
    /// Used for a pipeline's terminal layer: predict-only components get the
    /// plain wrapper (single-pass transform, no leakage protection needed),
    /// and the union of prediction methods discovered across the fitted
    /// mappings becomes available through [`Layer::prediction_methods`].
    ///
    /// # Errors
    /// [`PipelineError::MixedEstimatorTypes`] if the fitted mappings include
    /// both a classifier and a regressor.
    pub fn fit_last(
        &mut self,
        xs: &[Channel],
        y: Option<&Array1<f64>>,
        opts: &FitOptions,
    ) -> Result<()> {
        check_channel_count(xs, self.n_channels)?;
        self.models.clear();
        self.fitted = false;
        self.methods = Caps::empty();
        self.kind = EstimatorKind::None;

        let jobs = self.live_jobs(xs, &CvPolicy::Disabled, opts.fold_workers, true)?;
        let run = |(i, range, mut component): (usize, Range<usize>, Component)| {
            fit_mapping(&mut component, &range, xs, y)?;
            Ok((i, range, component))
        };
        let fitted: Vec<(usize, Range<usize>, Component)> = if opts.mapping_workers > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(opts.mapping_workers)
                .build()
                .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;
            pool.install(|| jobs.into_par_iter().map(run).collect::<Result<Vec<_>>>())?
        } else {
            jobs.into_iter().map(run).collect::<Result<Vec<_>>>()?
        };

        let mut methods = Caps::empty();
        let mut saw_classifier = false;
        let mut saw_regressor = false;
        for (_, range, component) in fitted {
            methods |= component.caps() & Caps::PREDICTION;
            match component.kind() {
                EstimatorKind::Classifier => saw_classifier = true,
                EstimatorKind::Regressor => saw_regressor = true,
                EstimatorKind::None => {}
            }
            self.models.push(FittedModel { range, component });
        }
        if saw_classifier && saw_regressor {
            self.models.clear();
            return Err(PipelineError::MixedEstimatorTypes);
        }

        self.methods = methods;
        self.kind = if saw_classifier {
            EstimatorKind::Classifier
        } else if saw_regressor {
            EstimatorKind::Regressor
        } else {
            EstimatorKind::None
        };
        self.fitted = true;
        Ok(())
    }

    /// Replay transform on the retained fitted models.
    ///
    /// # Errors
    /// [`PipelineError::NotFitted`] if invoked before any fit call.
    pub fn transform(&self, xs: &[Channel]) -> Result<Vec<Channel>> {
        if !self.fitted {
            return Err(PipelineError::NotFitted { op: "transform" });
        }
        check_channel_count(xs, self.n_channels)?;

        let mut xs_t = xs.to_vec();
        for model in &self.models {
            match &model.component {
                Component::Single(pipe) => {
                    if let Some(x) = xs[model.range.start].as_ref() {
                        xs_t[model.range.start] = Some(pipe.transform(x)?);
                    }
                }
                Component::Multi(pipe) => {
                    if has_live(&model.range, xs) {
                        let outs = pipe.transform(&xs[model.range.start..model.range.end])?;
                        if outs.len() != model.range.len() {
                            return Err(PipelineError::ChannelCountMismatch {
                                expected: model.range.len(),
                                got: outs.len(),
                            });
                        }
                        for (slot, out) in model.range.clone().zip(outs) {
                            xs_t[slot] = out;
                        }
                    }
                }
            }
        }
        Ok(xs_t)
    }

    /// Prediction methods discovered across the mappings of the last
    /// `fit_last` call.
    pub fn prediction_methods(&self) -> Vec<PredictionMethod> {
        self.methods.prediction_methods()
    }

    /// Estimator kind discovered by the last `fit_last` call.
    pub fn estimator_kind(&self) -> EstimatorKind {
        self.kind
    }

    /// Invoke `method` on every retained mapping that exposes it.
    ///
    /// Returns [`Prediction::Single`] when exactly one mapping produced
    /// output (the converged case), otherwise a per-channel list with dead
    /// slots where nothing was produced.
    ///
    /// # Errors
    /// [`PipelineError::NotFitted`] before fitting;
    /// [`PipelineError::InvalidPredictionMethod`] if no fitted mapping
    /// exposes `method`.
    pub fn dispatch_prediction(
        &self,
        xs: &[Channel],
        method: PredictionMethod,
    ) -> Result<Prediction> {
        if !self.fitted {
            return Err(PipelineError::NotFitted { op: "predict" });
        }
        check_channel_count(xs, self.n_channels)?;
        if !self.methods.contains(method.cap()) {
            return Err(PipelineError::InvalidPredictionMethod { method });
        }

        let mut written: Vec<(usize, Array2<f64>)> = Vec::new();
        for model in &self.models {
            if !model.component.caps().contains(method.cap()) {
                continue;
            }
            match &model.component {
                Component::Single(pipe) => {
                    if let Some(x) = xs[model.range.start].as_ref() {
                        written.push((model.range.start, pipe.predict(method, x)?));
                    }
                }
                Component::Multi(pipe) => {
                    if has_live(&model.range, xs) {
                        let out =
                            pipe.predict(method, &xs[model.range.start..model.range.end])?;
                        written.push((model.range.start, out));
                    }
                }
            }
        }

        // exactly one produced output is the converged case
        match <[(usize, Array2<f64>); 1]>::try_from(written) {
            Ok([(_, out)]) => Ok(Prediction::Single(out)),
            Err(written) => {
                let mut outputs: Vec<Channel> = vec![None; self.n_channels];
                for (slot, out) in written {
                    outputs[slot] = Some(out);
                }
                Ok(Prediction::PerChannel(outputs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::{ChannelVoteClassifier, KnnClassifier, MeanRegressor, StandardScalerPipe};
    use crate::synthetic::{make_classification, make_multichannel_classification};

    fn channels_of(xs: Vec<Array2<f64>>) -> Vec<Channel> {
        xs.into_iter().map(Some).collect()
    }

    #[test]
    fn test_wide_range_requires_multichannel_arity() {
        let mut layer = Layer::new(5);
        let err = layer
            .assign(0..3, Component::single(KnnClassifier::new(5)))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidChannelArity { .. }));

        // multichannel components may take the same range
        layer
            .assign(0..3, Component::multi(ChannelVoteClassifier::new(5)))
            .unwrap();
    }

    #[test]
    fn test_pipe_list_length_must_match_range() {
        let mut layer = Layer::new(5);
        let pipes: Vec<Box<dyn Pipe>> = vec![
            Box::new(KnnClassifier::new(5)),
            Box::new(KnnClassifier::new(5)),
        ];
        let err = layer.assign_each(0..3, pipes).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ArityMismatch { pipes: 2, width: 3 }
        ));
    }

    #[test]
    fn test_duplicate_mapping_rejected() {
        let mut layer = Layer::new(3);
        layer
            .assign(0..2, Component::multi(ChannelVoteClassifier::new(3)))
            .unwrap();
        let err = layer
            .assign(1..2, Component::single(KnnClassifier::new(3)))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DuplicateChannelMapping { index: 1 }
        ));
    }

    #[test]
    fn test_out_of_bounds_and_empty_ranges_rejected() {
        let mut layer = Layer::new(3);
        assert!(matches!(
            layer.assign(2..5, Component::multi(ChannelVoteClassifier::new(3))),
            Err(PipelineError::ChannelOutOfBounds { index: 4, .. })
        ));
        assert!(matches!(
            layer.assign(1..1, Component::single(KnnClassifier::new(3))),
            Err(PipelineError::EmptyAssignment)
        ));
    }

    #[test]
    fn test_dead_mapping_stays_dead_after_fit_transform() {
        let (x, y) = make_classification(60, 4, 2, 5);
        let mut layer = Layer::new(3);
        layer
            .assign(0..1, Component::single(StandardScalerPipe::new()))
            .unwrap();
        layer
            .assign(1..2, Component::single(StandardScalerPipe::new()))
            .unwrap();

        let xs: Vec<Channel> = vec![Some(x), None, None];
        let out = layer
            .fit_transform(&xs, Some(&y), &CvPolicy::Folds(5), &FitOptions::default())
            .unwrap();
        assert!(out[0].is_some());
        assert!(out[1].is_none(), "dead mapping must stay dead");
        assert!(out[2].is_none(), "unmapped dead channel passes through");

        // the dead mapping was never fit: transform replay must also skip it
        let replay = layer.transform(&xs).unwrap();
        assert!(replay[1].is_none());
    }

    #[test]
    fn test_predictors_are_cv_wrapped_during_fit_transform() {
        let (x0, y) = make_classification(90, 6, 3, 11);
        let (x1, _) = make_classification(90, 6, 3, 12);
        let mut layer = Layer::new(2);
        layer
            .assign(0..1, Component::single(KnnClassifier::new(5)))
            .unwrap();
        layer
            .assign(1..2, Component::single(KnnClassifier::new(5)))
            .unwrap();

        let xs = channels_of(vec![x0, x1]);
        let out = layer
            .fit_transform(&xs, Some(&y), &CvPolicy::Folds(3), &FitOptions::default())
            .unwrap();
        // probability output for two classes replaces the raw features
        assert_eq!(out[0].as_ref().unwrap().ncols(), 2);
        assert_eq!(out[1].as_ref().unwrap().ncols(), 2);
        assert_eq!(out[0].as_ref().unwrap().nrows(), 90);
    }

    #[test]
    fn test_mapping_fanout_matches_sequential() {
        let (x0, y) = make_classification(80, 6, 3, 31);
        let (x1, _) = make_classification(80, 6, 3, 32);
        let xs = channels_of(vec![x0, x1]);

        let build = || {
            let mut layer = Layer::new(2);
            layer
                .assign(0..1, Component::single(KnnClassifier::new(5)))
                .unwrap();
            layer
                .assign(1..2, Component::single(KnnClassifier::new(5)))
                .unwrap();
            layer
        };

        let seq = build()
            .fit_transform(&xs, Some(&y), &CvPolicy::Folds(4), &FitOptions::default())
            .unwrap();
        let par_opts = FitOptions {
            mapping_workers: 2,
            fold_workers: 1,
        };
        let par = build()
            .fit_transform(&xs, Some(&y), &CvPolicy::Folds(4), &par_opts)
            .unwrap();
        for (a, b) in seq.iter().zip(&par) {
            assert_eq!(a.as_ref().unwrap(), b.as_ref().unwrap());
        }
    }

    #[test]
    fn test_terminal_layer_rejects_mixed_estimator_kinds() {
        let (x0, y) = make_classification(40, 4, 2, 2);
        let (x1, _) = make_classification(40, 4, 2, 3);
        let mut layer = Layer::new(2);
        layer
            .assign(0..1, Component::single(KnnClassifier::new(3)))
            .unwrap();
        layer
            .assign(1..2, Component::single(MeanRegressor::new()))
            .unwrap();

        let xs = channels_of(vec![x0, x1]);
        let err = layer
            .fit_last(&xs, Some(&y), &FitOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::MixedEstimatorTypes));
        assert!(!layer.is_fitted());
    }

    #[test]
    fn test_fit_last_exposes_discovered_methods() {
        let (x, y) = make_classification(50, 4, 2, 8);
        let mut layer = Layer::new(1);
        layer
            .assign(0..1, Component::single(KnnClassifier::new(5)))
            .unwrap();

        let xs = channels_of(vec![x]);
        layer.fit_last(&xs, Some(&y), &FitOptions::default()).unwrap();
        let methods = layer.prediction_methods();
        assert!(methods.contains(&PredictionMethod::Predict));
        assert!(methods.contains(&PredictionMethod::PredictProba));
        assert_eq!(layer.estimator_kind(), EstimatorKind::Classifier);

        match layer.dispatch_prediction(&xs, PredictionMethod::Predict).unwrap() {
            Prediction::Single(out) => assert_eq!(out.nrows(), 50),
            Prediction::PerChannel(_) => panic!("expected converged output"),
        }
    }

    #[test]
    fn test_dispatch_returns_per_channel_for_multiple_outputs() {
        let (xs, y, _) = make_multichannel_classification(2, 0, 60, 4, 17);
        let mut layer = Layer::new(2);
        layer
            .assign(0..1, Component::single(KnnClassifier::new(5)))
            .unwrap();
        layer
            .assign(1..2, Component::single(KnnClassifier::new(5)))
            .unwrap();

        layer.fit_last(&xs, Some(&y), &FitOptions::default()).unwrap();
        match layer.dispatch_prediction(&xs, PredictionMethod::Predict).unwrap() {
            Prediction::PerChannel(outs) => {
                assert_eq!(outs.len(), 2);
                assert!(outs.iter().all(|c| c.is_some()));
            }
            Prediction::Single(_) => panic!("expected per-channel outputs"),
        }
    }

    #[test]
    fn test_dispatch_on_dead_inputs_yields_dead_channels() {
        let (xs, y, _) = make_multichannel_classification(1, 0, 40, 4, 25);
        let mut layer = Layer::new(1);
        layer
            .assign(0..1, Component::single(KnnClassifier::new(5)))
            .unwrap();
        layer.fit_last(&xs, Some(&y), &FitOptions::default()).unwrap();

        let dead: Vec<Channel> = vec![None];
        match layer.dispatch_prediction(&dead, PredictionMethod::Predict).unwrap() {
            Prediction::PerChannel(outs) => assert!(outs.iter().all(|c| c.is_none())),
            Prediction::Single(_) => panic!("no mapping produced output"),
        }
    }

    #[test]
    fn test_transform_before_fit_is_rejected() {
        let layer = Layer::new(1);
        let xs: Vec<Channel> = vec![None];
        assert!(matches!(
            layer.transform(&xs),
            Err(PipelineError::NotFitted { .. })
        ));
        assert!(matches!(
            layer.dispatch_prediction(&xs, PredictionMethod::Predict),
            Err(PipelineError::NotFitted { .. })
        ));
    }
}
