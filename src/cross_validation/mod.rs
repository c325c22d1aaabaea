//! Internal cross-validation: fold policies and the fold executor.
//!
//! Out-of-fold prediction is the leakage-prevention mechanism behind
//! stacked meta-prediction: each sample's output comes from a model fit on
//! folds that excluded it, so downstream layers never see features derived
//! from a sample's own label.

mod executor;
mod folds;

pub use executor::{
    cross_val_predict, cross_val_predict_multi, cross_val_score, cross_val_score_multi, Scorer,
};
pub use folds::{resolve_folds, CvPolicy, Fold, KFoldSplit, Splitter, StratifiedKFoldSplit};
