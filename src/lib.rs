//! Multichannel machine-learning pipelines.
//!
//! Most pipeline libraries push one feature matrix through a chain of
//! processing steps. This crate routes an ordered list of feature matrices
//! (channels) through a stack of layers instead: each layer maps contiguous
//! channel ranges to components, channels flow in parallel, and a missing
//! channel is an ordinary value (`None`) that propagates rather than errors.
//!
//! Predictors placed in non-terminal layers become feature makers
//! automatically: their predictions replace the channel's features. During
//! fitting those predictions come from internal cross-validation, so a
//! downstream meta-predictor never trains on features derived from a
//! sample's own label. That makes multi-level model stacking a matter of
//! layer layout.
//!
//! Components declare what they can do through [`Caps`] descriptors, and
//! prediction dispatch goes through the closed [`PredictionMethod`] tag set.
//! Worker counts for fan-out are always explicit ([`FitOptions`]); identical
//! inputs give bit-identical results at any worker count.
//!
//! ```
//! use multichannel_ml::channel::ChannelConcatenator;
//! use multichannel_ml::probes::KnnClassifier;
//! use multichannel_ml::synthetic::make_multichannel_classification;
//! use multichannel_ml::{
//!     Component, CvPolicy, Layer, MultichannelPipeline, PredictionMethod,
//! };
//!
//! # fn main() -> multichannel_ml::Result<()> {
//! let (xs, y, _) = make_multichannel_classification(3, 2, 120, 6, 0);
//!
//! let mut pipeline = MultichannelPipeline::new(5).with_cv_policy(CvPolicy::Folds(3));
//!
//! // base predictors: their out-of-fold class probabilities become features
//! let mut base = Layer::new(5);
//! for i in 0..5 {
//!     base.assign(i..i + 1, Component::single(KnnClassifier::new(5)))?;
//! }
//! pipeline.add_layer(base)?;
//!
//! let mut merge = Layer::new(5);
//! merge.assign(0..5, Component::multi(ChannelConcatenator::new()))?;
//! pipeline.add_layer(merge)?;
//!
//! let mut meta = Layer::new(5);
//! meta.assign(0..1, Component::single(KnnClassifier::new(5)))?;
//! pipeline.add_layer(meta)?;
//!
//! pipeline.fit(&xs, Some(&y))?;
//! let prediction = pipeline.predict(&xs, PredictionMethod::Predict)?;
//! assert!(prediction.into_single().is_some());
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod cross_validation;
pub mod error;
pub mod layer;
pub mod metrics;
pub mod pipe;
pub mod pipeline;
pub mod probes;
pub mod scoring;
pub mod synthetic;
pub mod wrappers;

pub use channel::Channel;
pub use cross_validation::{CvPolicy, Scorer};
pub use error::{PipelineError, Result};
pub use layer::{ChannelMapping, Layer, Prediction};
pub use pipe::{
    Caps, Component, EstimatorKind, FitOptions, MultichannelPipe, Pipe, PredictionMethod,
};
pub use pipeline::MultichannelPipeline;
