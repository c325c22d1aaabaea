//! Small reference estimators used to exercise pipelines.
//!
//! These are deliberately simple models with predictable behavior: enough to
//! drive routing, wrapping and cross-validation end to end, not competitive
//! learners.

mod centroid;
mod knn;
mod mean;
mod scaling;
mod vote;

pub use centroid::NearestCentroidClassifier;
pub use knn::KnnClassifier;
pub use mean::MeanRegressor;
pub use scaling::StandardScalerPipe;
pub use vote::ChannelVoteClassifier;
