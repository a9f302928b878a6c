//! Partitioning the time axis into train/validation/test segments

use crate::data::DemandTensor;
use crate::error::{Error, Result};
use ndarray::ArrayView4;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Ordered segment lengths along the time axis, starting at index 0.
///
/// The last segment always runs to the end of the series; its declared
/// length is advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitDescriptor {
    lengths: Vec<usize>,
}

impl SplitDescriptor {
    pub fn new(lengths: Vec<usize>) -> Self {
        Self { lengths }
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn num_segments(&self) -> usize {
        self.lengths.len()
    }

    /// Resolve into contiguous index ranges over `total` time steps
    pub fn resolve(&self, total: usize) -> Result<Vec<Range<usize>>> {
        resolve_split(total, &self.lengths)
    }
}

impl From<Vec<usize>> for SplitDescriptor {
    fn from(lengths: Vec<usize>) -> Self {
        Self::new(lengths)
    }
}

/// Resolve segment lengths `[L1, ..., Lk]` into `k` ranges over `[0, total)`.
///
/// Range `i < k-1` covers `[L1 + .. + L(i-1), L1 + .. + Li)`; the last
/// range covers everything from the end of the previous one to `total`.
pub fn resolve_split(total: usize, lengths: &[usize]) -> Result<Vec<Range<usize>>> {
    let (_, leading) = lengths
        .split_last()
        .ok_or_else(|| Error::Config("split descriptor is empty".to_string()))?;

    // None when the leading lengths overflow usize
    let required = leading
        .iter()
        .try_fold(0usize, |acc, &len| acc.checked_add(len));
    match required {
        Some(required) if required <= total => {}
        _ => {
            return Err(Error::SplitOverflow {
                required: required.unwrap_or(usize::MAX),
                available: total,
            })
        }
    }

    let mut ranges = Vec::with_capacity(lengths.len());
    let mut start = 0;
    for &len in leading {
        ranges.push(start..start + len);
        start += len;
    }
    ranges.push(start..total);

    Ok(ranges)
}

/// Views of the tensor for each resolved segment
pub fn split_time_axis<'a>(
    tensor: &'a DemandTensor,
    split: &SplitDescriptor,
) -> Result<Vec<ArrayView4<'a, f64>>> {
    split
        .resolve(tensor.time_steps())?
        .into_iter()
        .map(|range| tensor.time_slice(range.start, range.end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_last_segment_absorbs_remainder() {
        let ranges = resolve_split(12, &[3, 2, 5]).unwrap();
        assert_eq!(ranges, vec![0..3, 3..5, 5..12]);
    }

    #[test]
    fn test_last_segment_may_be_shorter_than_declared() {
        let ranges = resolve_split(8, &[3, 2, 5]).unwrap();
        assert_eq!(ranges, vec![0..3, 3..5, 5..8]);
    }

    #[test]
    fn test_single_segment_spans_everything() {
        assert_eq!(resolve_split(7, &[2]).unwrap(), vec![0..7]);
    }

    #[test]
    fn test_exact_fit_leaves_empty_tail() {
        assert_eq!(resolve_split(5, &[3, 2, 1]).unwrap(), vec![0..3, 3..5, 5..5]);
    }

    #[test]
    fn test_overflow() {
        let err = resolve_split(4, &[3, 2, 5]).unwrap_err();
        assert!(matches!(
            err,
            Error::SplitOverflow {
                required: 5,
                available: 4
            }
        ));
    }

    #[test]
    fn test_lengths_overflowing_usize() {
        let err = resolve_split(12, &[usize::MAX, 2, 5]).unwrap_err();
        assert!(matches!(
            err,
            Error::SplitOverflow {
                required: usize::MAX,
                available: 12
            }
        ));
    }

    #[test]
    fn test_empty_descriptor() {
        assert!(matches!(resolve_split(4, &[]), Err(Error::Config(_))));
    }

    #[test]
    fn test_split_time_axis_views() {
        let tensor = DemandTensor::new(Array4::from_shape_fn((10, 2, 2, 1), |(t, _, _, _)| {
            t as f64
        }))
        .unwrap();
        let parts = split_time_axis(&tensor, &SplitDescriptor::new(vec![6, 2, 2])).unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].dim().0, 6);
        assert_eq!(parts[1][[0, 0, 0, 0]], 6.0);
        assert_eq!(parts[2][[1, 1, 1, 0]], 9.0);
    }
}
