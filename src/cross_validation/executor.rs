//! Fold-partitioned fit+predict execution.
//!
//! The executor runs one estimator over a fold plan, sequentially or fanned
//! across a fixed-size worker pool, and reassembles the out-of-fold outputs
//! in original sample order. One estimator clone is fit per fold regardless
//! of execution mode, and folds share no state, so sequential and parallel
//! execution over the same fold assignment produce bit-identical results.
//!
//! Worker counts are always explicit; nothing here consults ambient CPU
//! state. A failing fold surfaces as a [`PipelineError::FitFailure`] once
//! the pool joins.

use std::sync::Arc;

use log::debug;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::channel::{select_channel_rows, select_rows, select_targets, Channel};
use crate::cross_validation::folds::{resolve_folds, CvPolicy, Fold};
use crate::error::{PipelineError, Result};
use crate::pipe::{collapse_to_labels, Caps, MultichannelPipe, Pipe, PredictionMethod};

/// A figure-of-merit scorer: `scorer(y_true, y_pred) -> score`.
pub type Scorer = Arc<dyn Fn(&Array1<f64>, &Array1<f64>) -> f64 + Send + Sync>;

/// Run one job per fold, sequentially or on a pool of `workers` threads.
///
/// Results come back in fold order either way.
fn run_folds<T, F>(folds: &[Fold], workers: usize, job: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&Fold) -> Result<T> + Send + Sync,
{
    if workers <= 1 {
        folds.iter().map(job).collect()
    } else {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;
        pool.install(|| folds.par_iter().map(job).collect())
    }
}

/// Scatter per-fold test outputs back into original sample order.
fn reassemble(n_samples: usize, folds: &[Fold], outputs: &[Array2<f64>]) -> Result<Array2<f64>> {
    let n_cols = match outputs.first() {
        Some(first) => first.ncols(),
        None => {
            return Err(PipelineError::EmptyData(
                "no folds produced output".to_string(),
            ))
        }
    };

    let mut combined = Array2::zeros((n_samples, n_cols));
    for (fold, out) in folds.iter().zip(outputs) {
        if out.nrows() != fold.test.len() || out.ncols() != n_cols {
            return Err(PipelineError::InvalidShape {
                expected: format!("({}, {})", fold.test.len(), n_cols),
                got: format!("({}, {})", out.nrows(), out.ncols()),
            });
        }
        for (row, &i) in fold.test.iter().enumerate() {
            combined.row_mut(i).assign(&out.row(row));
        }
    }
    Ok(combined)
}

/// Out-of-fold prediction for a single-channel estimator.
///
/// The estimator template is refit independently per fold on that fold's
/// training partition; each fold's test-partition share of output is then
/// reassembled into original sample order. Guarantee: no sample's output was
/// produced by a model that had seen that sample's label.
pub fn cross_val_predict(
    pipe: &dyn Pipe,
    x: &Array2<f64>,
    y: &Array1<f64>,
    method: PredictionMethod,
    folds: &[Fold],
    workers: usize,
) -> Result<Array2<f64>> {
    if x.nrows() != y.len() {
        return Err(PipelineError::InvalidShape {
            expected: format!("{} target values", x.nrows()),
            got: format!("{}", y.len()),
        });
    }
    debug!(
        "cross_val_predict: {} over {} folds ({} workers)",
        pipe.name(),
        folds.len(),
        workers
    );

    let outputs = run_folds(folds, workers, |fold| {
        let mut model = pipe.clone_pipe();
        let x_train = select_rows(x, &fold.train);
        let y_train = select_targets(y, &fold.train);
        model
            .fit(&x_train, Some(&y_train))
            .map_err(|e| PipelineError::fit_failure(pipe.name(), "fit", e))?;
        model.predict(method, &select_rows(x, &fold.test))
    })?;

    reassemble(y.len(), folds, &outputs)
}

/// Out-of-fold prediction for a multichannel estimator.
///
/// Train/test indices are computed once from the targets and reused
/// identically across all channels, preserving cross-channel row alignment.
/// Dead channels stay dead in every fold's input slice.
pub fn cross_val_predict_multi(
    pipe: &dyn MultichannelPipe,
    xs: &[Channel],
    y: &Array1<f64>,
    method: PredictionMethod,
    folds: &[Fold],
    workers: usize,
) -> Result<Array2<f64>> {
    debug!(
        "cross_val_predict_multi: {} over {} folds ({} workers)",
        pipe.name(),
        folds.len(),
        workers
    );

    let outputs = run_folds(folds, workers, |fold| {
        let mut model = pipe.clone_pipe();
        let xs_train = select_channel_rows(xs, &fold.train);
        let y_train = select_targets(y, &fold.train);
        model
            .fit(&xs_train, Some(&y_train))
            .map_err(|e| PipelineError::fit_failure(pipe.name(), "fit", e))?;
        model.predict(method, &select_channel_rows(xs, &fold.test))
    })?;

    reassemble(y.len(), folds, &outputs)
}

/// Pick the method used to score an estimator with a label scorer.
fn scoring_method(caps: Caps, name: &str) -> Result<PredictionMethod> {
    if caps.contains(Caps::PREDICT) {
        Ok(PredictionMethod::Predict)
    } else {
        PredictionMethod::from_precedence(caps).ok_or_else(|| PipelineError::TypeConversion {
            pipe: name.to_string(),
        })
    }
}

/// Per-fold scores for a single-channel estimator.
///
/// One score per fold, in fold order: the estimator is refit on each fold's
/// training partition and scored on its test partition.
pub fn cross_val_score(
    pipe: &dyn Pipe,
    x: &Array2<f64>,
    y: &Array1<f64>,
    scorer: &Scorer,
    policy: &CvPolicy,
    workers: usize,
) -> Result<Vec<f64>> {
    let folds = resolve_folds(policy, y, pipe.kind())?;
    let method = scoring_method(pipe.caps(), pipe.name())?;

    run_folds(&folds, workers, |fold| {
        let mut model = pipe.clone_pipe();
        let x_train = select_rows(x, &fold.train);
        let y_train = select_targets(y, &fold.train);
        model
            .fit(&x_train, Some(&y_train))
            .map_err(|e| PipelineError::fit_failure(pipe.name(), "fit", e))?;
        let out = model.predict(method, &select_rows(x, &fold.test))?;
        let labels = collapse_to_labels(&out, method);
        let y_test = select_targets(y, &fold.test);
        Ok(scorer(&y_test, &labels))
    })
}

/// Per-fold scores for a multichannel estimator.
pub fn cross_val_score_multi(
    pipe: &dyn MultichannelPipe,
    xs: &[Channel],
    y: &Array1<f64>,
    scorer: &Scorer,
    policy: &CvPolicy,
    workers: usize,
) -> Result<Vec<f64>> {
    let folds = resolve_folds(policy, y, pipe.kind())?;
    let method = scoring_method(pipe.caps(), pipe.name())?;

    run_folds(&folds, workers, |fold| {
        let mut model = pipe.clone_pipe();
        let xs_train = select_channel_rows(xs, &fold.train);
        let y_train = select_targets(y, &fold.train);
        model
            .fit(&xs_train, Some(&y_train))
            .map_err(|e| PipelineError::fit_failure(pipe.name(), "fit", e))?;
        let out = model.predict(method, &select_channel_rows(xs, &fold.test))?;
        let labels = collapse_to_labels(&out, method);
        let y_test = select_targets(y, &fold.test);
        Ok(scorer(&y_test, &labels))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_validation::folds::KFoldSplit;
    use crate::cross_validation::Splitter;
    use crate::metrics::{accuracy_score, make_scorer};
    use crate::probes::KnnClassifier;
    use crate::synthetic::make_classification;

    #[test]
    fn test_reassembly_covers_every_sample_once() {
        // n = 97 samples, k = 5 folds (non-divisible)
        let (x, y) = make_classification(97, 20, 4, 11);
        let folds = KFoldSplit::new(5).split(&y).unwrap();
        let pipe = KnnClassifier::new(5);
        let out = cross_val_predict(&pipe, &x, &y, PredictionMethod::Predict, &folds, 1).unwrap();

        assert_eq!(out.shape(), &[97, 1]);
        // every reassembled row was written exactly once with a class label
        for i in 0..97 {
            assert!(out[[i, 0]] == 0.0 || out[[i, 0]] == 1.0);
        }
    }

    #[test]
    fn test_sequential_and_parallel_outputs_are_identical() {
        let (x, y) = make_classification(120, 10, 3, 7);
        let folds = KFoldSplit::new(5).split(&y).unwrap();
        let pipe = KnnClassifier::new(5);

        let seq =
            cross_val_predict(&pipe, &x, &y, PredictionMethod::PredictProba, &folds, 1).unwrap();
        let par =
            cross_val_predict(&pipe, &x, &y, PredictionMethod::PredictProba, &folds, 4).unwrap();
        assert_eq!(seq, par);

        let scorer = make_scorer(accuracy_score);
        let policy = CvPolicy::Splitter(Arc::new(KFoldSplit::new(5)));
        let seq_scores = cross_val_score(&pipe, &x, &y, &scorer, &policy, 1).unwrap();
        let par_scores = cross_val_score(&pipe, &x, &y, &scorer, &policy, 4).unwrap();
        assert_eq!(seq_scores, par_scores);
    }

    #[test]
    fn test_scores_above_chance_on_separable_data() {
        let (x, y) = make_classification(200, 10, 3, 42);
        let pipe = KnnClassifier::new(5);
        let scorer = make_scorer(accuracy_score);
        let scores = cross_val_score(&pipe, &x, &y, &scorer, &CvPolicy::Folds(5), 1).unwrap();
        assert_eq!(scores.len(), 5);
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        assert!(mean > 0.8, "mean accuracy {mean} too low");
    }

    #[test]
    fn test_fold_fit_failure_names_the_pipe() {
        let (x, y) = make_classification(20, 4, 2, 1);
        let folds = KFoldSplit::new(2).split(&y).unwrap();
        let pipe = KnnClassifier::new(50); // k larger than any training fold
        let err =
            cross_val_predict(&pipe, &x, &y, PredictionMethod::Predict, &folds, 1).unwrap_err();
        match err {
            PipelineError::FitFailure { pipe, .. } => assert_eq!(pipe, "KnnClassifier"),
            other => panic!("expected FitFailure, got {other}"),
        }
    }
}
