//! # Preprocessing
//!
//! Turns a demand tensor into supervised training data:
//! - `split` - time-axis partitioning into train/validation/test segments
//! - `normalizer` - invertible range normalization
//! - `window` - extraction of `(patch, embedding, target)` samples
//! - `samples` - stacked sample tensors, batching and export
//!
//! ## Example
//!
//! ```rust
//! use ndarray::{Array1, Array4};
//! use st_demand_prep::data::DemandTensor;
//! use st_demand_prep::embedding::EmbeddingTable;
//! use st_demand_prep::preprocessing::{resolve_split, WindowConfig, WindowTensorizer};
//!
//! let tensor = DemandTensor::new(Array4::ones((12, 5, 5, 1))).unwrap();
//! let table = EmbeddingTable::from_vectors(2, (0..25).map(|id| (id, Array1::zeros(2)))).unwrap();
//!
//! let segments = resolve_split(tensor.time_steps(), &[8, 4]).unwrap();
//! let tensorizer = WindowTensorizer::new(WindowConfig {
//!     input_window_len: 3,
//!     patch_size: 3,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let train = tensorizer.tensorize(&tensor, &table, &segments[0]).unwrap();
//! // t in [3, 8), 3 x 3 interior cells
//! assert_eq!(train.len(), 5 * 9);
//! ```

mod normalizer;
mod samples;
mod split;
mod window;

pub use normalizer::{NormalizationMethod, RangeNormalizer, RangeParams};
pub use samples::{Batch, Batches, SamplePosition, SampleSet, SampleShapes};
pub use split::{resolve_split, split_time_axis, SplitDescriptor};
pub use window::{BoundaryPolicy, WindowConfig, WindowTensorizer};
