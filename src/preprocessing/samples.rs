//! Stacked training/test samples

use crate::error::{Error, Result};
use ndarray::{Array2, Array5, Axis};
use ndarray_npy::write_npy;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where a sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePosition {
    /// Target time step
    pub t: usize,
    pub row: usize,
    pub col: usize,
    /// Location id, `row * W + col`
    pub id: usize,
}

/// Dense sample tensors for one segment, in generation order.
///
/// - `inputs`: `(n, window, patch, patch, channels)`
/// - `embeddings`: `(n, embedding_dim)`
/// - `targets`: `(n, channels)`
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    inputs: Array5<f64>,
    embeddings: Array2<f64>,
    targets: Array2<f64>,
    positions: Vec<SamplePosition>,
}

/// Shapes of a sample set, for metadata output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleShapes {
    pub inputs: Vec<usize>,
    pub embeddings: Vec<usize>,
    pub targets: Vec<usize>,
}

impl SampleSet {
    pub(crate) fn new(
        inputs: Array5<f64>,
        embeddings: Array2<f64>,
        targets: Array2<f64>,
        positions: Vec<SamplePosition>,
    ) -> Self {
        debug_assert_eq!(inputs.len_of(Axis(0)), positions.len());
        debug_assert_eq!(embeddings.nrows(), positions.len());
        debug_assert_eq!(targets.nrows(), positions.len());
        Self {
            inputs,
            embeddings,
            targets,
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn inputs(&self) -> &Array5<f64> {
        &self.inputs
    }

    pub fn embeddings(&self) -> &Array2<f64> {
        &self.embeddings
    }

    pub fn targets(&self) -> &Array2<f64> {
        &self.targets
    }

    pub fn positions(&self) -> &[SamplePosition] {
        &self.positions
    }

    pub fn shapes(&self) -> SampleShapes {
        SampleShapes {
            inputs: self.inputs.shape().to_vec(),
            embeddings: self.embeddings.shape().to_vec(),
            targets: self.targets.shape().to_vec(),
        }
    }

    /// Write `<prefix>_input_patches.npy`, `<prefix>_embeddings.npy` and
    /// `<prefix>_targets.npy` into `dir`
    pub fn write_npy<P: AsRef<Path>>(&self, dir: P, prefix: &str) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let inputs_path = dir.join(format!("{}_input_patches.npy", prefix));
        let embeddings_path = dir.join(format!("{}_embeddings.npy", prefix));
        let targets_path = dir.join(format!("{}_targets.npy", prefix));

        write_npy(&inputs_path, &self.inputs)?;
        write_npy(&embeddings_path, &self.embeddings)?;
        write_npy(&targets_path, &self.targets)?;

        Ok(vec![inputs_path, embeddings_path, targets_path])
    }

    /// Contiguous mini-batches in generation order
    pub fn batches(&self, batch_size: usize) -> Result<Batches<'_>> {
        Batches::new(self, batch_size, (0..self.len()).collect())
    }

    /// Mini-batches over a seeded permutation of the samples
    pub fn shuffled_batches(&self, batch_size: usize, seed: u64) -> Result<Batches<'_>> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        Batches::new(self, batch_size, order)
    }
}

/// One mini-batch
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Array5<f64>,
    pub embeddings: Array2<f64>,
    pub targets: Array2<f64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.targets.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Iterator over mini-batches of a `SampleSet`
#[derive(Debug)]
pub struct Batches<'a> {
    samples: &'a SampleSet,
    order: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl<'a> Batches<'a> {
    fn new(samples: &'a SampleSet, batch_size: usize, order: Vec<usize>) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch size must be > 0".to_string()));
        }
        Ok(Self {
            samples,
            order,
            batch_size,
            cursor: 0,
        })
    }

    /// Number of batches, counting a final partial batch
    pub fn num_batches(&self) -> usize {
        (self.order.len() + self.batch_size - 1) / self.batch_size
    }
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let indices = &self.order[self.cursor..end];
        self.cursor = end;

        Some(Batch {
            inputs: self.samples.inputs.select(Axis(0), indices),
            embeddings: self.samples.embeddings.select(Axis(0), indices),
            targets: self.samples.targets.select(Axis(0), indices),
        })
    }
}
