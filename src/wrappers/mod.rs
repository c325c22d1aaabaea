//! Wrappers that give predict-only pipes a uniform transform interface.
//!
//! Four variants cover {single-channel, multichannel} × {plain,
//! cross-validated}:
//!
//! - [`SingleChannel`] / [`Multichannel`]: plain fit-then-transform. The
//!   output is in-sample inference and intentionally leaky; reserved for
//!   terminal layers and other non-stacking use.
//! - [`SingleChannelCv`] / [`MultichannelCv`]: `fit_transform` returns
//!   out-of-fold predictions assembled by the cross-validation executor, so
//!   downstream meta-predictors never see features derived from a sample's
//!   own label.
//!
//! All variants re-expose the wrapped pipe's native prediction methods,
//! backed by a clone fit on the full training set. Capability problems
//! (no fit, no recognized prediction method, unknown estimator kind) fail at
//! construction, never at fit time.

mod multi;
mod single;

pub use multi::{Multichannel, MultichannelCv};
pub use single::{SingleChannel, SingleChannelCv};
