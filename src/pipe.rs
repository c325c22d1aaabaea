//! Component model: capability descriptors and the pipe traits.
//!
//! A pipe is an opaque unit of computation (transformer or predictor). Instead
//! of probing for methods at call time, every pipe carries an explicit
//! [`Caps`] descriptor declaring the operations it supports, so routing is a
//! single deterministic lookup. Prediction dispatch goes through the closed
//! [`PredictionMethod`] tag set rather than named attributes.
//!
//! Two traits cover the two channel arities:
//! - [`Pipe`]: consumes and produces a single feature matrix.
//! - [`MultichannelPipe`]: consumes and produces an ordered list with one
//!   slot per assigned channel, dead slots as `None`.
//!
//! Registered pipes act as read-only templates; fitting always happens on a
//! clone obtained through `clone_pipe()`, which makes concurrent fitting of
//! distinct clones from one template safe.

use std::any::type_name;
use std::fmt;

use bitflags::bitflags;
use ndarray::{Array1, Array2};

use crate::channel::Channel;
use crate::error::{PipelineError, Result};

bitflags! {
    /// Capability descriptor attached to every pipe.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Caps: u8 {
        /// `fit(x, y)` is supported.
        const FIT = 1;
        /// `transform(x)` is supported.
        const TRANSFORM = 1 << 1;
        /// A fused `fit_transform(x, y)` is supported.
        const FIT_TRANSFORM = 1 << 2;
        /// Class-label / regression prediction.
        const PREDICT = 1 << 3;
        /// Probability estimates per class.
        const PREDICT_PROBA = 1 << 4;
        /// Signed decision scores.
        const DECISION_FUNCTION = 1 << 5;
        /// Log-probability estimates per class.
        const PREDICT_LOG_PROBA = 1 << 6;
    }
}

impl Caps {
    /// All prediction-method bits.
    pub const PREDICTION: Caps = Caps::PREDICT
        .union(Caps::PREDICT_PROBA)
        .union(Caps::DECISION_FUNCTION)
        .union(Caps::PREDICT_LOG_PROBA);

    /// Whether any prediction method is declared.
    pub fn is_predictor(self) -> bool {
        self.intersects(Caps::PREDICTION)
    }

    /// Whether any output-producing transform path is declared.
    pub fn has_transform(self) -> bool {
        self.intersects(Caps::TRANSFORM | Caps::FIT_TRANSFORM)
    }

    /// The declared prediction methods, in tag order.
    pub fn prediction_methods(self) -> Vec<PredictionMethod> {
        PredictionMethod::ALL
            .iter()
            .copied()
            .filter(|m| self.contains(m.cap()))
            .collect()
    }
}

/// Closed tag set of prediction methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictionMethod {
    /// Hard class labels or regression values.
    Predict,
    /// Per-class probability estimates.
    PredictProba,
    /// Signed decision scores.
    DecisionFunction,
    /// Per-class log-probability estimates.
    PredictLogProba,
}

impl PredictionMethod {
    /// Every method tag, in declaration order.
    pub const ALL: [PredictionMethod; 4] = [
        PredictionMethod::Predict,
        PredictionMethod::PredictProba,
        PredictionMethod::DecisionFunction,
        PredictionMethod::PredictLogProba,
    ];

    /// Precedence used when converting a predictor into a transformer.
    ///
    /// Probability estimates carry the most information for downstream
    /// meta-prediction, hard labels the least.
    pub const TRANSFORM_PRECEDENCE: [PredictionMethod; 4] = [
        PredictionMethod::PredictProba,
        PredictionMethod::DecisionFunction,
        PredictionMethod::PredictLogProba,
        PredictionMethod::Predict,
    ];

    /// The capability bit corresponding to this method.
    pub fn cap(self) -> Caps {
        match self {
            PredictionMethod::Predict => Caps::PREDICT,
            PredictionMethod::PredictProba => Caps::PREDICT_PROBA,
            PredictionMethod::DecisionFunction => Caps::DECISION_FUNCTION,
            PredictionMethod::PredictLogProba => Caps::PREDICT_LOG_PROBA,
        }
    }

    /// The conventional method name.
    pub fn name(self) -> &'static str {
        match self {
            PredictionMethod::Predict => "predict",
            PredictionMethod::PredictProba => "predict_proba",
            PredictionMethod::DecisionFunction => "decision_function",
            PredictionMethod::PredictLogProba => "predict_log_proba",
        }
    }

    /// Pick the highest-precedence method declared in `caps`, if any.
    pub fn from_precedence(caps: Caps) -> Option<PredictionMethod> {
        Self::TRANSFORM_PRECEDENCE
            .iter()
            .copied()
            .find(|m| caps.contains(m.cap()))
    }
}

impl fmt::Display for PredictionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Estimator kind declared by a predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorKind {
    /// Predicts discrete class labels.
    Classifier,
    /// Predicts continuous values.
    Regressor,
    /// Not a predictor (pure transformer).
    None,
}

/// Extract the bare struct name from a fully qualified type name.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let before_generic = match full.find('<') {
        Some(pos) => &full[..pos],
        None => full,
    };
    match before_generic.rfind("::") {
        Some(pos) => &before_generic[pos + 2..],
        None => before_generic,
    }
}

/// A single-channel pipeline component.
///
/// Implementors declare their operations through [`Caps`]; default method
/// bodies reject undeclared operations, so a pipe only overrides what it
/// declares. Feature matrices have rows as samples.
pub trait Pipe: Send + Sync {
    /// Capability descriptor for this pipe.
    fn caps(&self) -> Caps;

    /// Declared estimator kind. Pure transformers return [`EstimatorKind::None`].
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::None
    }

    /// Human-readable pipe name used in error reports.
    fn name(&self) -> &'static str {
        short_type_name(type_name::<Self>())
    }

    /// Produce an untrained duplicate of this pipe.
    ///
    /// This is the cloning service used before every fit; pipes with warm
    /// starts or other non-parameter state override it.
    fn clone_pipe(&self) -> Box<dyn Pipe>;

    /// Fit the pipe to training data.
    fn fit(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<()>;

    /// Transform a feature matrix using the fitted state.
    fn transform(&self, _x: &Array2<f64>) -> Result<Array2<f64>> {
        Err(PipelineError::Unsupported {
            pipe: self.name().to_string(),
            op: "transform",
        })
    }

    /// Fused fit-and-produce-output operation.
    ///
    /// The default falls back on `fit` then `transform`; pipes declaring
    /// [`Caps::FIT_TRANSFORM`] may override with a cheaper fused path.
    fn fit_transform(&mut self, x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<Array2<f64>> {
        self.fit(x, y)?;
        self.transform(x)
    }

    /// Invoke a prediction method by tag.
    ///
    /// Output is always 2-D; single-output methods return one column.
    fn predict(&self, method: PredictionMethod, _x: &Array2<f64>) -> Result<Array2<f64>> {
        Err(PipelineError::Unsupported {
            pipe: self.name().to_string(),
            op: method.name(),
        })
    }
}

/// A multichannel pipeline component.
///
/// Consumes an ordered list with one slot per assigned channel; dead slots
/// are `None` and live slots are row-aligned matrices.
pub trait MultichannelPipe: Send + Sync {
    /// Capability descriptor for this pipe.
    fn caps(&self) -> Caps;

    /// Declared estimator kind.
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::None
    }

    /// Human-readable pipe name used in error reports.
    fn name(&self) -> &'static str {
        short_type_name(type_name::<Self>())
    }

    /// Produce an untrained duplicate of this pipe.
    fn clone_pipe(&self) -> Box<dyn MultichannelPipe>;

    /// Fit the pipe to a channel list.
    fn fit(&mut self, xs: &[Channel], y: Option<&Array1<f64>>) -> Result<()>;

    /// Transform a channel list, producing one output slot per input slot.
    fn transform(&self, _xs: &[Channel]) -> Result<Vec<Channel>> {
        Err(PipelineError::Unsupported {
            pipe: self.name().to_string(),
            op: "transform",
        })
    }

    /// Fused fit-and-produce-output operation.
    fn fit_transform(&mut self, xs: &[Channel], y: Option<&Array1<f64>>) -> Result<Vec<Channel>> {
        self.fit(xs, y)?;
        self.transform(xs)
    }

    /// Invoke a prediction method by tag, converging to a single output.
    fn predict(&self, method: PredictionMethod, _xs: &[Channel]) -> Result<Array2<f64>> {
        Err(PipelineError::Unsupported {
            pipe: self.name().to_string(),
            op: method.name(),
        })
    }
}

/// A registered component: one pipe plus its channel-arity variant.
pub enum Component {
    /// Single-channel pipe.
    Single(Box<dyn Pipe>),
    /// Multichannel pipe.
    Multi(Box<dyn MultichannelPipe>),
}

impl Component {
    /// Register a single-channel pipe.
    pub fn single<P: Pipe + 'static>(pipe: P) -> Self {
        Component::Single(Box::new(pipe))
    }

    /// Register a multichannel pipe.
    pub fn multi<P: MultichannelPipe + 'static>(pipe: P) -> Self {
        Component::Multi(Box::new(pipe))
    }

    /// Capability descriptor of the underlying pipe.
    pub fn caps(&self) -> Caps {
        match self {
            Component::Single(p) => p.caps(),
            Component::Multi(p) => p.caps(),
        }
    }

    /// Estimator kind of the underlying pipe.
    pub fn kind(&self) -> EstimatorKind {
        match self {
            Component::Single(p) => p.kind(),
            Component::Multi(p) => p.kind(),
        }
    }

    /// Name of the underlying pipe.
    pub fn name(&self) -> &'static str {
        match self {
            Component::Single(p) => p.name(),
            Component::Multi(p) => p.name(),
        }
    }

    /// Whether the component declares multichannel arity.
    pub fn is_multichannel(&self) -> bool {
        matches!(self, Component::Multi(_))
    }
}

impl Clone for Component {
    /// Produces an untrained duplicate via the pipes' cloning hooks.
    fn clone(&self) -> Self {
        match self {
            Component::Single(p) => Component::Single(p.clone_pipe()),
            Component::Multi(p) => Component::Multi(p.clone_pipe()),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arity = if self.is_multichannel() {
            "multichannel"
        } else {
            "single-channel"
        };
        write!(f, "Component({}, {})", self.name(), arity)
    }
}

/// Whether a component declares itself a classifier.
pub fn is_classifier(component: &Component) -> bool {
    component.kind() == EstimatorKind::Classifier
}

/// Whether a component declares itself a regressor.
pub fn is_regressor(component: &Component) -> bool {
    component.kind() == EstimatorKind::Regressor
}

/// Whether a component declares multichannel arity.
pub fn is_multichannel(component: &Component) -> bool {
    component.is_multichannel()
}

/// Detect the estimator kind of a component.
pub fn detect_estimator_kind(component: &Component) -> EstimatorKind {
    component.kind()
}

/// Options threaded through every fit call that may fan out work.
///
/// Worker counts are explicit and never read from ambient CPU state. Layer
/// mapping fan-out and fold fan-out should not both be active at once; the
/// caller budgets one level at a time (mapping workers when the live-mapping
/// count exceeds the fold count, fold workers otherwise).
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Workers fanning distinct live mappings out during a layer fit.
    pub mapping_workers: usize,
    /// Workers fanning per-fold fits out inside the cross-validation executor.
    pub fold_workers: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            mapping_workers: 1,
            fold_workers: 1,
        }
    }
}

/// Collapse a prediction output to hard labels for scoring.
///
/// Probability-style outputs (multiple columns) collapse by argmax; a single
/// signed-score column collapses at zero, a single probability column at one
/// half (log-probabilities at `ln(1/2)`); a single label column passes
/// through.
pub fn collapse_to_labels(output: &Array2<f64>, method: PredictionMethod) -> Array1<f64> {
    let n = output.nrows();
    if method == PredictionMethod::Predict || output.ncols() == 1 {
        let mut labels = Array1::zeros(n);
        for (i, row) in output.rows().into_iter().enumerate() {
            let v = row[0];
            labels[i] = match method {
                PredictionMethod::Predict => v,
                PredictionMethod::DecisionFunction => {
                    if v > 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                // single-column probability of the positive class
                PredictionMethod::PredictProba => {
                    if v > 0.5 {
                        1.0
                    } else {
                        0.0
                    }
                }
                // log-probability column: threshold in log space, where
                // every value is at most zero
                PredictionMethod::PredictLogProba => {
                    if v > 0.5f64.ln() {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
        }
        labels
    } else {
        let mut labels = Array1::zeros(n);
        for (i, row) in output.rows().into_iter().enumerate() {
            let mut best = 0usize;
            let mut best_v = f64::NEG_INFINITY;
            for (j, &v) in row.iter().enumerate() {
                if v > best_v {
                    best = j;
                    best_v = v;
                }
            }
            labels[i] = best as f64;
        }
        labels
    }
}
