//! Fold construction and fold policies.
//!
//! A fold is a transient (train-indices, test-indices) partition that lives
//! only for the duration of one executor call. Built-in splitters are
//! deterministic and RNG-free: plain contiguous k-fold for regression
//! targets, class-balance-preserving k-fold for classification targets.
//! Externally supplied splitters are used verbatim, but every split plan is
//! checked for exact coverage before use: each sample must land in exactly
//! one test partition.

use std::sync::Arc;

use ndarray::Array1;

use crate::error::{PipelineError, Result};
use crate::pipe::EstimatorKind;

/// One train/test partition used by internal cross-validation.
#[derive(Debug, Clone)]
pub struct Fold {
    /// Sample indices the per-fold model is fit on.
    pub train: Vec<usize>,
    /// Sample indices the per-fold model produces output for.
    pub test: Vec<usize>,
}

/// A fold-splitting strategy.
///
/// Only the contract matters here: the returned folds' test partitions must
/// cover every sample exactly once.
pub trait Splitter: Send + Sync {
    /// Partition `0..y.len()` into folds.
    fn split(&self, y: &Array1<f64>) -> Result<Vec<Fold>>;
}

/// Plain contiguous k-fold splitter.
///
/// The first `n % k` folds receive one extra sample, matching the
/// conventional contiguous assignment.
#[derive(Debug, Clone)]
pub struct KFoldSplit {
    n_splits: usize,
}

impl KFoldSplit {
    /// Create a k-fold splitter. `n_splits` must be at least 2.
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }
}

impl Splitter for KFoldSplit {
    fn split(&self, y: &Array1<f64>) -> Result<Vec<Fold>> {
        let n = y.len();
        if self.n_splits < 2 {
            return Err(PipelineError::InvalidCvPolicy(format!(
                "k-fold requires at least 2 splits, got {}",
                self.n_splits
            )));
        }
        if self.n_splits > n {
            return Err(PipelineError::InvalidCvPolicy(format!(
                "cannot split {} samples into {} folds",
                n, self.n_splits
            )));
        }

        let base = n / self.n_splits;
        let extra = n % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0usize;
        for f in 0..self.n_splits {
            let size = base + usize::from(f < extra);
            let test: Vec<usize> = (start..start + size).collect();
            let train: Vec<usize> = (0..start).chain(start + size..n).collect();
            folds.push(Fold { train, test });
            start += size;
        }
        Ok(folds)
    }
}

/// Class-balance-preserving k-fold splitter.
///
/// Samples of each class are dealt round-robin across folds in encounter
/// order, so every fold's test partition approximates the overall class
/// proportions.
#[derive(Debug, Clone)]
pub struct StratifiedKFoldSplit {
    n_splits: usize,
}

impl StratifiedKFoldSplit {
    /// Create a stratified k-fold splitter. `n_splits` must be at least 2.
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }
}

impl Splitter for StratifiedKFoldSplit {
    fn split(&self, y: &Array1<f64>) -> Result<Vec<Fold>> {
        let n = y.len();
        if self.n_splits < 2 {
            return Err(PipelineError::InvalidCvPolicy(format!(
                "stratified k-fold requires at least 2 splits, got {}",
                self.n_splits
            )));
        }
        if self.n_splits > n {
            return Err(PipelineError::InvalidCvPolicy(format!(
                "cannot split {} samples into {} folds",
                n, self.n_splits
            )));
        }

        // group indices per class in encounter order; labels compared by
        // total order so NaN targets fail loudly below
        let mut classes: Vec<f64> = Vec::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (i, &label) in y.iter().enumerate() {
            if label.is_nan() {
                return Err(PipelineError::Numerical(
                    "classification targets contain NaN".to_string(),
                ));
            }
            match classes.iter().position(|&c| c == label) {
                Some(g) => groups[g].push(i),
                None => {
                    classes.push(label);
                    groups.push(vec![i]);
                }
            }
        }

        let mut test_sets: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for group in &groups {
            for (pos, &i) in group.iter().enumerate() {
                test_sets[pos % self.n_splits].push(i);
            }
        }

        let mut folds = Vec::with_capacity(self.n_splits);
        for mut test in test_sets {
            test.sort_unstable();
            let train: Vec<usize> = (0..n).filter(|i| test.binary_search(i).is_err()).collect();
            folds.push(Fold { train, test });
        }
        Ok(folds)
    }
}

/// Fold policy controlling internal cross-validation.
#[derive(Clone)]
pub enum CvPolicy {
    /// Internal cross-validation is off; wrappers transform in-sample.
    Disabled,
    /// k-fold with `k` splits: class-balance-preserving folds for
    /// classification targets, plain folds for regression targets.
    /// Values below 2 behave like [`CvPolicy::Disabled`].
    Folds(usize),
    /// An externally supplied splitter, used verbatim.
    Splitter(Arc<dyn Splitter>),
}

impl Default for CvPolicy {
    fn default() -> Self {
        CvPolicy::Folds(5)
    }
}

impl CvPolicy {
    /// The conventional default of 5 folds.
    pub fn default_folds() -> Self {
        CvPolicy::Folds(5)
    }

    /// Whether this policy requests internal cross-validation.
    pub fn is_enabled(&self) -> bool {
        match self {
            CvPolicy::Disabled => false,
            CvPolicy::Folds(k) => *k >= 2,
            CvPolicy::Splitter(_) => true,
        }
    }
}

impl std::fmt::Debug for CvPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CvPolicy::Disabled => f.write_str("CvPolicy::Disabled"),
            CvPolicy::Folds(k) => write!(f, "CvPolicy::Folds({k})"),
            CvPolicy::Splitter(_) => f.write_str("CvPolicy::Splitter(..)"),
        }
    }
}

/// Resolve a policy into concrete folds for the given targets.
///
/// Disabled policies must never reach the executor; they are rejected here.
/// The resulting plan is validated: every sample index must appear in
/// exactly one test partition or the call fails with
/// [`PipelineError::FoldCoverage`].
pub fn resolve_folds(
    policy: &CvPolicy,
    y: &Array1<f64>,
    kind: EstimatorKind,
) -> Result<Vec<Fold>> {
    let folds = match policy {
        CvPolicy::Disabled => {
            return Err(PipelineError::InvalidCvPolicy(
                "internal cross-validation is disabled".to_string(),
            ))
        }
        CvPolicy::Folds(k) => {
            if *k < 2 {
                return Err(PipelineError::InvalidCvPolicy(format!(
                    "{k} folds cannot produce out-of-fold output"
                )));
            }
            match kind {
                EstimatorKind::Classifier => StratifiedKFoldSplit::new(*k).split(y)?,
                _ => KFoldSplit::new(*k).split(y)?,
            }
        }
        CvPolicy::Splitter(splitter) => splitter.split(y)?,
    };
    check_coverage(&folds, y.len())?;
    Ok(folds)
}

/// Verify that every sample appears in exactly one test partition.
fn check_coverage(folds: &[Fold], n_samples: usize) -> Result<()> {
    let mut seen = vec![0usize; n_samples];
    let mut out_of_range = false;
    for fold in folds {
        for &i in &fold.test {
            if i >= n_samples {
                out_of_range = true;
            } else {
                seen[i] += 1;
            }
        }
    }
    let covered = seen.iter().filter(|&&c| c >= 1).count();
    let duplicated = seen.iter().filter(|&&c| c > 1).count();
    if out_of_range || covered != n_samples || duplicated > 0 {
        return Err(PipelineError::FoldCoverage {
            covered,
            n_samples,
            duplicated,
        });
    }
    Ok(())
}
