//! Error types for pipeline construction, fitting, and prediction.
//!
//! All errors are hard, non-retried failures: a failed fit poisons the
//! enclosing call rather than silently producing corrupt features. The only
//! graceful-degradation mechanism in this crate is the dead channel (`None`),
//! which is data, not an error.

use thiserror::Error;

use crate::pipe::PredictionMethod;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error type for all pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Two pipes were mapped to the same channel within one layer.
    #[error("two pipes are mapped to channel {index}; max allowed is 1")]
    DuplicateChannelMapping {
        /// The doubly-mapped channel index.
        index: usize,
    },

    /// A single-channel pipe was assigned a channel range wider than one.
    #[error(
        "single-channel pipe `{pipe}` cannot accept {width} input channels; \
         use a multichannel pipe or a width-1 range"
    )]
    InvalidChannelArity {
        /// Name of the offending pipe.
        pipe: String,
        /// Width of the requested channel range.
        width: usize,
    },

    /// A list of single-channel pipes did not match the width of its range.
    #[error("pipe list of length {pipes} does not match channel range of width {width}")]
    ArityMismatch {
        /// Number of pipes in the assigned list.
        pipes: usize,
        /// Width of the channel range being assigned.
        width: usize,
    },

    /// A channel index fell outside the layer's fixed channel count.
    #[error("channel {index} out of bounds for a layer with {n_channels} channels")]
    ChannelOutOfBounds {
        /// The out-of-range index.
        index: usize,
        /// The layer's channel count.
        n_channels: usize,
    },

    /// An empty channel range was assigned.
    #[error("empty channel range in assignment")]
    EmptyAssignment,

    /// The number of channels received does not match the expected count.
    #[error("expected {expected} channels, got {got}")]
    ChannelCountMismatch {
        /// Channel count fixed at construction.
        expected: usize,
        /// Channel count actually received.
        got: usize,
    },

    /// A component raised an error while being fit.
    ///
    /// Identifies the offending component and preserves the original cause.
    #[error("pipe `{pipe}` raised an error on {op}()")]
    FitFailure {
        /// Name of the offending component.
        pipe: String,
        /// The operation that failed (`fit`, `transform`, or `fit_transform`).
        op: &'static str,
        /// The original cause.
        #[source]
        source: Box<PipelineError>,
    },

    /// Transform or predict was attempted before any fit call.
    #[error("{op} attempted before fitting")]
    NotFitted {
        /// The rejected operation.
        op: &'static str,
    },

    /// A predict-only pipe exposes no recognized transform-precedence method.
    #[error("pipe `{pipe}` lacks a recognized method for conversion to a transformer")]
    TypeConversion {
        /// Name of the offending pipe.
        pipe: String,
    },

    /// A wrapper was constructed around a pipe missing a required capability.
    #[error("pipe `{pipe}` is missing the `{cap}` capability required by the wrapper")]
    MissingCapability {
        /// Name of the offending pipe.
        pipe: String,
        /// The missing capability.
        cap: &'static str,
    },

    /// A predictor's estimator kind could not be determined.
    #[error("could not detect an estimator kind (classifier or regressor) for `{pipe}`")]
    UnknownEstimatorType {
        /// Name of the offending pipe.
        pipe: String,
    },

    /// A terminal layer mixed classifier and regressor predictors.
    #[error("all predictors in a layer must share one estimator kind; found both classifier and regressor")]
    MixedEstimatorTypes,

    /// A fold policy failed to cover every sample exactly once.
    #[error(
        "fold policy covered {covered} of {n_samples} samples in its test partitions \
         ({duplicated} covered more than once)"
    )]
    FoldCoverage {
        /// Samples covered by at least one test partition.
        covered: usize,
        /// Total number of samples.
        n_samples: usize,
        /// Samples covered by more than one test partition.
        duplicated: usize,
    },

    /// A disabled or degenerate fold policy reached the executor.
    #[error("invalid fold policy: {0}")]
    InvalidCvPolicy(String),

    /// A prediction method was requested that no fitted mapping exposes.
    #[error("prediction method `{method}` not found in the fitted layer")]
    InvalidPredictionMethod {
        /// The requested method tag.
        method: PredictionMethod,
    },

    /// A single prediction was requested but several mappings produced output.
    #[error("`{method}` produced output on more than one channel; use dispatch to get per-channel results")]
    AmbiguousPrediction {
        /// The dispatched method tag.
        method: PredictionMethod,
    },

    /// A pipeline operation was invoked with no layers present.
    #[error("pipeline has no layers")]
    EmptyPipeline,

    /// The worker pool for parallel fitting could not be built.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),

    // Component-level failures, raised by pipes themselves.
    /// Shape mismatch between expected and actual matrix dimensions.
    #[error("invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Description of the expected shape.
        expected: String,
        /// Description of the shape received.
        got: String,
    },

    /// Feature-dimension mismatch between fit and transform/predict.
    #[error("feature mismatch: expected {expected} features, got {got}")]
    FeatureMismatch {
        /// Features seen during fit.
        expected: usize,
        /// Features in the offered matrix.
        got: usize,
    },

    /// Empty data provided where non-empty was required.
    #[error("empty data: {0}")]
    EmptyData(String),

    /// Numerical computation error.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// A pipe was asked for an operation outside its declared capability set.
    #[error("pipe `{pipe}` does not support {op}")]
    Unsupported {
        /// Name of the pipe.
        pipe: String,
        /// The unsupported operation.
        op: &'static str,
    },
}

impl PipelineError {
    /// Wrap a component-raised error as a fatal fit failure naming the pipe.
    pub fn fit_failure(pipe: &str, op: &'static str, source: PipelineError) -> Self {
        PipelineError::FitFailure {
            pipe: pipe.to_string(),
            op,
            source: Box::new(source),
        }
    }
}
