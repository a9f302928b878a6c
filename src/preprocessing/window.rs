//! Windowed tensorization of a demand tensor
//!
//! For every sampled time step `t` and interior cell `(row, col)` the
//! tensorizer emits
//!
//! - the input patch `[t - w .. t, row - pad ..= row + pad, col - pad ..= col + pad, :]`
//! - the target `[t, row, col, :]`
//! - the embedding of location `row * W + col`
//!
//! where `w = input_window_len` and `pad = patch_size / 2`. Cells within
//! `pad` of the border are never sampled, and cells without an embedding
//! are skipped. Samples are ordered by time, then row, then column.

use super::samples::{SamplePosition, SampleSet};
use crate::data::DemandTensor;
use crate::embedding::{location_id, EmbeddingTable};
use crate::error::{Error, Result};
use ndarray::{s, Array1, Array2, Array5, ArrayViewMut4, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Which time steps of a segment may be sampled.
///
/// A sample at `t` reads history `[t - w, t)`, so the policy decides
/// whether that history may reach back into the preceding segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Sample `t ∈ [start + w, end)`: history never leaves the segment.
    /// The first `w` steps of every segment only serve as history.
    #[default]
    WithinSegment,
    /// Sample `t ∈ [max(start, w), end)`: history may come from the
    /// previous segment, so no steps after a split are dropped.
    CarryHistory,
}

impl BoundaryPolicy {
    /// First time step that may be sampled in a segment starting at `start`
    pub fn first_step(&self, start: usize, window: usize) -> usize {
        match self {
            BoundaryPolicy::WithinSegment => start.saturating_add(window),
            BoundaryPolicy::CarryHistory => start.max(window),
        }
    }
}

/// Windowing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Number of past time steps per sample
    pub input_window_len: usize,
    /// Odd edge length of the spatial patch
    pub patch_size: usize,
    pub boundary: BoundaryPolicy,
    /// Fill patches on the rayon thread pool
    pub parallel: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            input_window_len: 6,
            patch_size: 9,
            boundary: BoundaryPolicy::WithinSegment,
            parallel: true,
        }
    }
}

impl WindowConfig {
    /// Check the parameters that do not depend on the tensor shape
    pub fn validate(&self) -> Result<()> {
        if self.input_window_len == 0 {
            return Err(Error::Shape(
                "input_window_len must be at least 1".to_string(),
            ));
        }
        if self.patch_size % 2 == 0 {
            return Err(Error::Shape(format!(
                "patch_size must be odd, got {}",
                self.patch_size
            )));
        }
        Ok(())
    }
}

/// Extracts `(patch, embedding, target)` samples from a demand tensor
#[derive(Debug, Clone)]
pub struct WindowTensorizer {
    config: WindowConfig,
}

impl WindowTensorizer {
    pub fn new(config: WindowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Half-width of the spatial patch
    pub fn pad(&self) -> usize {
        self.config.patch_size / 2
    }

    fn check_tensor(&self, tensor: &DemandTensor) -> Result<()> {
        let smallest = tensor.height().min(tensor.width());
        if self.config.patch_size > smallest {
            return Err(Error::Shape(format!(
                "patch_size {} exceeds the smaller grid side {} (H={}, W={})",
                self.config.patch_size,
                smallest,
                tensor.height(),
                tensor.width()
            )));
        }
        if self.config.input_window_len > tensor.time_steps() {
            return Err(Error::Shape(format!(
                "input_window_len {} exceeds the {} time steps of the tensor",
                self.config.input_window_len,
                tensor.time_steps()
            )));
        }
        Ok(())
    }

    /// Time steps sampled for a segment `[start, end)`
    pub fn sample_times(&self, segment: &Range<usize>, time_steps: usize) -> Result<Range<usize>> {
        if segment.start > segment.end || segment.end > time_steps {
            return Err(Error::Shape(format!(
                "segment [{}, {}) outside the time axis [0, {})",
                segment.start, segment.end, time_steps
            )));
        }
        let first = self
            .config
            .boundary
            .first_step(segment.start, self.config.input_window_len);
        Ok(first.min(segment.end)..segment.end)
    }

    /// Interior rows and columns that may be sampled
    pub fn interior(&self, tensor: &DemandTensor) -> Result<(Range<usize>, Range<usize>)> {
        self.check_tensor(tensor)?;
        let pad = self.pad();
        Ok((
            pad..tensor.height() - pad,
            pad..tensor.width() - pad,
        ))
    }

    /// Number of samples a segment yields when every location has an embedding
    pub fn full_coverage_count(&self, tensor: &DemandTensor, segment: &Range<usize>) -> Result<usize> {
        let times = self.sample_times(segment, tensor.time_steps())?;
        let (rows, cols) = self.interior(tensor)?;
        Ok(times.len() * rows.len() * cols.len())
    }

    /// Enumerate sample positions in generation order, pairing each with
    /// its embedding. Cells without an embedding are left out.
    fn positions<'e>(
        &self,
        tensor: &DemandTensor,
        embeddings: &'e EmbeddingTable,
        segment: &Range<usize>,
    ) -> Result<(Vec<(SamplePosition, &'e Array1<f64>)>, usize)> {
        let times = self.sample_times(segment, tensor.time_steps())?;
        let (rows, cols) = self.interior(tensor)?;
        let width = tensor.width();

        let mut positions = Vec::with_capacity(times.len() * rows.len() * cols.len());
        let mut skipped = 0usize;

        for t in times {
            for row in rows.clone() {
                for col in cols.clone() {
                    let id = location_id(row, col, width);
                    match embeddings.get(id) {
                        Some(vector) => positions.push((SamplePosition { t, row, col, id }, vector)),
                        None => skipped += 1,
                    }
                }
            }
        }

        Ok((positions, skipped))
    }

    /// Build the stacked sample tensors for one segment
    pub fn tensorize(
        &self,
        tensor: &DemandTensor,
        embeddings: &EmbeddingTable,
        segment: &Range<usize>,
    ) -> Result<SampleSet> {
        let (positions, skipped) = self.positions(tensor, embeddings, segment)?;

        let w = self.config.input_window_len;
        let p = self.config.patch_size;
        let pad = self.pad();
        let channels = tensor.channels();
        let n = positions.len();
        let source = tensor.view();

        let mut inputs = Array5::<f64>::zeros((n, w, p, p, channels));
        let fill = |mut slot: ArrayViewMut4<f64>, pos: &SamplePosition| {
            slot.assign(&source.slice(s![
                pos.t - w..pos.t,
                pos.row - pad..pos.row + pad + 1,
                pos.col - pad..pos.col + pad + 1,
                ..
            ]));
        };

        // Each sample owns a pre-indexed slot, so the parallel fill
        // produces the same array as the sequential one.
        if self.config.parallel {
            inputs
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(positions.par_iter())
                .for_each(|(slot, (pos, _))| fill(slot, pos));
        } else {
            inputs
                .axis_iter_mut(Axis(0))
                .zip(positions.iter())
                .for_each(|(slot, (pos, _))| fill(slot, pos));
        }

        let targets = Array2::from_shape_fn((n, channels), |(i, c)| {
            let pos = &positions[i].0;
            source[[pos.t, pos.row, pos.col, c]]
        });

        let mut embedding_rows = Array2::<f64>::zeros((n, embeddings.dimension()));
        for (mut row, (_, vector)) in embedding_rows.outer_iter_mut().zip(positions.iter()) {
            row.assign(*vector);
        }

        debug!(
            "Segment [{}, {}): {} samples, {} cells skipped without embedding",
            segment.start, segment.end, n, skipped
        );

        Ok(SampleSet::new(
            inputs,
            embedding_rows,
            targets,
            positions.into_iter().map(|(pos, _)| pos).collect(),
        ))
    }
}
