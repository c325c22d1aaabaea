//! Multilayer orchestration over a fixed channel count.
//!
//! A pipeline owns an ordered stack of [`Layer`]s sharing one channel count.
//! Fitting streams the channel list through the stack: every layer but the
//! last runs `fit_transform` (predict-only components get cross-validated
//! wrappers under the pipeline's fold policy), and the last layer runs
//! `fit_last` so its predictors keep their native prediction methods.
//!
//! A fitted pipeline is itself a [`MultichannelPipe`], so a whole pipeline
//! can be registered as a component inside an outer pipeline's layer.

use log::debug;
use ndarray::{Array1, Array2};

use crate::channel::Channel;
use crate::cross_validation::CvPolicy;
use crate::error::{PipelineError, Result};
use crate::layer::{Layer, Prediction};
use crate::pipe::{Caps, EstimatorKind, FitOptions, MultichannelPipe, PredictionMethod};

/// An ordered stack of channel-routing layers.
pub struct MultichannelPipeline {
    n_channels: usize,
    layers: Vec<Layer>,
    cv: CvPolicy,
    opts: FitOptions,
    fitted: bool,
}

impl MultichannelPipeline {
    /// Create an empty pipeline over a fixed channel count.
    ///
    /// The default fold policy is 5-fold internal cross-validation for
    /// predictors fit in non-terminal layers.
    pub fn new(n_channels: usize) -> Self {
        Self {
            n_channels,
            layers: Vec::new(),
            cv: CvPolicy::default(),
            opts: FitOptions::default(),
            fitted: false,
        }
    }

    /// Set the fold policy applied to predictors in non-terminal layers.
    pub fn with_cv_policy(mut self, cv: CvPolicy) -> Self {
        self.cv = cv;
        self
    }

    /// Set the worker budget threaded through every fit call.
    pub fn with_fit_options(mut self, opts: FitOptions) -> Self {
        self.opts = opts;
        self
    }

    /// The pipeline's fixed channel count.
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// The layer stack, in execution order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Whether fitting has completed.
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Append a layer to the stack.
    ///
    /// # Errors
    /// [`PipelineError::ChannelCountMismatch`] if the layer's channel count
    /// differs from the pipeline's.
    pub fn add_layer(&mut self, layer: Layer) -> Result<()> {
        if layer.n_channels() != self.n_channels {
            return Err(PipelineError::ChannelCountMismatch {
                expected: self.n_channels,
                got: layer.n_channels(),
            });
        }
        self.layers.push(layer);
        Ok(())
    }

    /// Fit the whole stack on a channel list.
    ///
    /// # Errors
    /// [`PipelineError::EmptyPipeline`] if no layers were added; otherwise
    /// whatever the layers report.
    pub fn fit(&mut self, xs: &[Channel], y: Option<&Array1<f64>>) -> Result<()> {
        if self.layers.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }
        self.fitted = false;

        let last = self.layers.len() - 1;
        let mut current = xs.to_vec();
        for (i, layer) in self.layers[..last].iter_mut().enumerate() {
            debug!("fitting layer {i} ({} mappings)", layer.mappings().len());
            current = layer.fit_transform(&current, y, &self.cv, &self.opts)?;
        }
        debug!("fitting terminal layer {last}");
        self.layers[last].fit_last(&current, y, &self.opts)?;
        self.fitted = true;
        Ok(())
    }

    /// Replay transform through every layer, the terminal one included.
    pub fn transform(&self, xs: &[Channel]) -> Result<Vec<Channel>> {
        if !self.fitted {
            return Err(PipelineError::NotFitted { op: "transform" });
        }
        let mut current = xs.to_vec();
        for layer in &self.layers {
            current = layer.transform(&current)?;
        }
        Ok(current)
    }

    /// Transform through the non-terminal layers, then dispatch `method` on
    /// the terminal layer.
    pub fn predict(&self, xs: &[Channel], method: PredictionMethod) -> Result<Prediction> {
        if !self.fitted {
            return Err(PipelineError::NotFitted { op: "predict" });
        }
        let last = self.layers.len() - 1;
        let mut current = xs.to_vec();
        for layer in &self.layers[..last] {
            current = layer.transform(&current)?;
        }
        self.layers[last].dispatch_prediction(&current, method)
    }

    /// Prediction methods exposed by the fitted terminal layer.
    pub fn prediction_methods(&self) -> Vec<PredictionMethod> {
        match self.layers.last() {
            Some(layer) => layer.prediction_methods(),
            None => Vec::new(),
        }
    }

    /// Estimator kind of the fitted terminal layer.
    pub fn estimator_kind(&self) -> EstimatorKind {
        match self.layers.last() {
            Some(layer) => layer.estimator_kind(),
            None => EstimatorKind::None,
        }
    }

    /// Estimator kind declared by the terminal layer's registered
    /// components, readable before fitting.
    fn declared_kind(&self) -> EstimatorKind {
        let Some(last) = self.layers.last() else {
            return EstimatorKind::None;
        };
        let mut kind = EstimatorKind::None;
        for mapping in last.mappings() {
            match mapping.component().kind() {
                EstimatorKind::None => {}
                found => kind = found,
            }
        }
        kind
    }

    /// Prediction-method caps declared across the terminal layer's
    /// registered components, readable before fitting.
    fn declared_methods(&self) -> Caps {
        let Some(last) = self.layers.last() else {
            return Caps::empty();
        };
        let mut caps = Caps::empty();
        for mapping in last.mappings() {
            caps |= mapping.component().caps() & Caps::PREDICTION;
        }
        caps
    }

    fn clone_unfitted(&self) -> Self {
        Self {
            n_channels: self.n_channels,
            layers: self.layers.iter().map(Layer::clone_unfitted).collect(),
            cv: self.cv.clone(),
            opts: self.opts,
            fitted: false,
        }
    }
}

/// Lets a whole pipeline serve as a component in an outer pipeline.
///
/// Capabilities are read from the terminal layer's registered components, so
/// an outer layer can route around a nested pipeline before anything is fit.
impl MultichannelPipe for MultichannelPipeline {
    fn caps(&self) -> Caps {
        Caps::FIT | Caps::TRANSFORM | Caps::FIT_TRANSFORM | self.declared_methods()
    }

    fn kind(&self) -> EstimatorKind {
        self.declared_kind()
    }

    fn name(&self) -> &'static str {
        "MultichannelPipeline"
    }

    fn clone_pipe(&self) -> Box<dyn MultichannelPipe> {
        Box::new(self.clone_unfitted())
    }

    fn fit(&mut self, xs: &[Channel], y: Option<&Array1<f64>>) -> Result<()> {
        MultichannelPipeline::fit(self, xs, y)
    }

    fn transform(&self, xs: &[Channel]) -> Result<Vec<Channel>> {
        MultichannelPipeline::transform(self, xs)
    }

    fn predict(&self, method: PredictionMethod, xs: &[Channel]) -> Result<Array2<f64>> {
        match MultichannelPipeline::predict(self, xs, method)? {
            Prediction::Single(out) => Ok(out),
            Prediction::PerChannel(outs) => {
                let mut live = outs.into_iter().flatten();
                match (live.next(), live.next()) {
                    (Some(out), None) => Ok(out),
                    _ => Err(PipelineError::AmbiguousPrediction { method }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConcatenator;
    use crate::metrics::accuracy_score;
    use crate::pipe::{collapse_to_labels, Component, Pipe};
    use crate::probes::{KnnClassifier, StandardScalerPipe};
    use crate::synthetic::make_multichannel_classification;

    fn stacked_pipeline(n_channels: usize) -> MultichannelPipeline {
        let mut pipeline = MultichannelPipeline::new(n_channels);

        let mut scale = Layer::new(n_channels);
        let scalers: Vec<Box<dyn Pipe>> = (0..n_channels)
            .map(|_| Box::new(StandardScalerPipe::new()) as Box<dyn Pipe>)
            .collect();
        scale.assign_each(0..n_channels, scalers).unwrap();
        pipeline.add_layer(scale).unwrap();

        let mut base = Layer::new(n_channels);
        let knns: Vec<Box<dyn Pipe>> = (0..n_channels)
            .map(|_| Box::new(KnnClassifier::new(5)) as Box<dyn Pipe>)
            .collect();
        base.assign_each(0..n_channels, knns).unwrap();
        pipeline.add_layer(base).unwrap();

        let mut merge = Layer::new(n_channels);
        merge
            .assign(0..n_channels, Component::multi(ChannelConcatenator::new()))
            .unwrap();
        pipeline.add_layer(merge).unwrap();

        let mut meta = Layer::new(n_channels);
        meta.assign(0..1, Component::single(KnnClassifier::new(5)))
            .unwrap();
        pipeline.add_layer(meta).unwrap();

        pipeline
    }

    #[test]
    fn test_stacked_classification_beats_chance() {
        let (xs, y, _) = make_multichannel_classification(3, 2, 120, 6, 42);
        let mut pipeline = stacked_pipeline(5).with_cv_policy(CvPolicy::Folds(3));
        pipeline.fit(&xs, Some(&y)).unwrap();

        let pred = pipeline.predict(&xs, PredictionMethod::Predict).unwrap();
        let out = pred.into_single().expect("meta-predictor converges");
        let labels = collapse_to_labels(&out, PredictionMethod::Predict);
        let acc = accuracy_score(&y, &labels);
        assert!(acc > 0.7, "training accuracy {acc} too low");

        assert_eq!(pipeline.estimator_kind(), EstimatorKind::Classifier);
        assert!(pipeline
            .prediction_methods()
            .contains(&PredictionMethod::PredictProba));
    }

    #[test]
    fn test_dead_channels_flow_through_the_stack() {
        let (mut xs, y, _) = make_multichannel_classification(3, 2, 90, 6, 7);
        xs[1] = None;
        xs[3] = None;
        let mut pipeline = stacked_pipeline(5).with_cv_policy(CvPolicy::Folds(3));
        pipeline.fit(&xs, Some(&y)).unwrap();

        let pred = pipeline.predict(&xs, PredictionMethod::Predict).unwrap();
        assert!(pred.into_single().is_some());
    }

    #[test]
    fn test_fit_rejects_empty_stack() {
        let (xs, y, _) = make_multichannel_classification(1, 0, 30, 4, 3);
        let mut pipeline = MultichannelPipeline::new(1);
        assert!(matches!(
            pipeline.fit(&xs, Some(&y)),
            Err(PipelineError::EmptyPipeline)
        ));
    }

    #[test]
    fn test_layer_width_must_match_pipeline() {
        let mut pipeline = MultichannelPipeline::new(3);
        assert!(matches!(
            pipeline.add_layer(Layer::new(4)),
            Err(PipelineError::ChannelCountMismatch {
                expected: 3,
                got: 4
            })
        ));
    }

    #[test]
    fn test_pipeline_nests_as_component() {
        let (xs, y, _) = make_multichannel_classification(2, 0, 90, 6, 13);

        let mut outer = MultichannelPipeline::new(2);
        let mut layer = Layer::new(2);
        layer
            .assign(0..2, Component::multi(stacked_pipeline(2)))
            .unwrap();
        outer.add_layer(layer).unwrap();

        outer.fit(&xs, Some(&y)).unwrap();
        let pred = outer.predict(&xs, PredictionMethod::Predict).unwrap();
        assert!(pred.into_single().is_some());
    }

    #[test]
    fn test_transform_replays_the_whole_stack() {
        let (xs, y, _) = make_multichannel_classification(2, 1, 60, 5, 19);
        let mut pipeline = stacked_pipeline(3).with_cv_policy(CvPolicy::Folds(3));
        pipeline.fit(&xs, Some(&y)).unwrap();

        let out = pipeline.transform(&xs).unwrap();
        assert_eq!(out.len(), 3);
        // everything converged into the first channel by the terminal layer
        assert!(out[0].is_some());
    }
}
