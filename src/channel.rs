//! Channel values and helpers.
//!
//! A channel is one slot in a fixed-size ordered list of feature matrices.
//! A live channel carries a matrix with rows as samples; a dead channel is
//! `None`, meaning "no data here"; dead channels propagate through layers
//! rather than erroring. All live channels in one list share identical sample
//! order and count.

use ndarray::{Array1, Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::pipe::{Caps, MultichannelPipe};

/// One channel value: a feature matrix, or `None` for a dead channel.
pub type Channel = Option<Array2<f64>>;

/// Indices within `range` whose channels are live.
pub fn live_indices(range: &std::ops::Range<usize>, xs: &[Channel]) -> Vec<usize> {
    range.clone().filter(|&i| xs[i].is_some()).collect()
}

/// Whether any channel in `range` is live.
pub fn has_live(range: &std::ops::Range<usize>, xs: &[Channel]) -> bool {
    range.clone().any(|i| xs[i].is_some())
}

/// Gather rows of a matrix by index, preserving index order.
pub fn select_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}

/// Gather targets by index, preserving index order.
pub fn select_targets(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    y.select(Axis(0), indices)
}

/// Normalize a 1-D output to a single-column 2-D matrix.
pub fn column(values: Array1<f64>) -> Array2<f64> {
    values.insert_axis(Axis(1))
}

/// Gather the rows of every live channel in a list; dead channels stay dead.
pub fn select_channel_rows(xs: &[Channel], indices: &[usize]) -> Vec<Channel> {
    xs.iter()
        .map(|x| x.as_ref().map(|m| select_rows(m, indices)))
        .collect()
}

/// Check that a channel list has the expected length.
pub fn check_channel_count(xs: &[Channel], expected: usize) -> Result<()> {
    if xs.len() != expected {
        return Err(PipelineError::ChannelCountMismatch {
            expected,
            got: xs.len(),
        });
    }
    Ok(())
}

/// Multichannel transformer that concatenates live channels column-wise.
///
/// The concatenated matrix lands in the first output slot; every other slot
/// is dead. With no live inputs the output is entirely dead.
#[derive(Debug, Clone, Default)]
pub struct ChannelConcatenator;

impl ChannelConcatenator {
    /// Create a new concatenator.
    pub fn new() -> Self {
        ChannelConcatenator
    }
}

impl MultichannelPipe for ChannelConcatenator {
    fn caps(&self) -> Caps {
        Caps::FIT | Caps::TRANSFORM | Caps::FIT_TRANSFORM
    }

    fn clone_pipe(&self) -> Box<dyn MultichannelPipe> {
        Box::new(self.clone())
    }

    fn fit(&mut self, _xs: &[Channel], _y: Option<&Array1<f64>>) -> Result<()> {
        Ok(())
    }

    fn transform(&self, xs: &[Channel]) -> Result<Vec<Channel>> {
        let live: Vec<&Array2<f64>> = xs.iter().flatten().collect();
        let mut out: Vec<Channel> = vec![None; xs.len()];
        if live.is_empty() {
            return Ok(out);
        }
        let views: Vec<_> = live.iter().map(|m| m.view()).collect();
        let merged = ndarray::concatenate(Axis(1), &views)
            .map_err(|e| PipelineError::InvalidShape {
                expected: "row-aligned live channels".to_string(),
                got: e.to_string(),
            })?;
        out[0] = Some(merged);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_live_helpers() {
        let xs: Vec<Channel> = vec![Some(array![[1.0]]), None, Some(array![[2.0]])];
        assert_eq!(live_indices(&(0..3), &xs), vec![0, 2]);
        assert!(has_live(&(0..2), &xs));
        assert!(!has_live(&(1..2), &xs));
    }

    #[test]
    fn test_select_rows_preserves_order() {
        let x = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let picked = select_rows(&x, &[3, 1]);
        assert_eq!(picked, array![[3.0, 3.0], [1.0, 1.0]]);
    }

    #[test]
    fn test_column_normalization() {
        let c = column(array![1.0, 2.0, 3.0]);
        assert_eq!(c.shape(), &[3, 1]);
        assert_eq!(c[[1, 0]], 2.0);
    }

    #[test]
    fn test_concatenator_merges_live_into_slot_zero() {
        let xs: Vec<Channel> = vec![
            Some(array![[1.0], [2.0]]),
            None,
            Some(array![[3.0], [4.0]]),
        ];
        let cat = ChannelConcatenator::new();
        let out = cat.transform(&xs).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap(), &array![[1.0, 3.0], [2.0, 4.0]]);
        assert!(out[1].is_none());
        assert!(out[2].is_none());
    }

    #[test]
    fn test_concatenator_all_dead_stays_dead() {
        let xs: Vec<Channel> = vec![None, None];
        let out = ChannelConcatenator::new().transform(&xs).unwrap();
        assert!(out.iter().all(|c| c.is_none()));
    }
}
