//! # Spatiotemporal Demand Preparation
//!
//! Prepares gridded demand counts (taxi, bike or ride-hail trips over a
//! city grid or station graph) as supervised training tensors.
//!
//! A raw `(T, H, W, C)` array is split along time, normalized with
//! statistics fit on the training segment, and cut into samples of
//! `(input window, spatial patch, channels)` with the next time step as
//! target and a per-location embedding alongside.
//!
//! ## Modules
//!
//! - `data` - Demand tensor and raw `.npy` loading
//! - `embedding` - Per-location embedding tables
//! - `preprocessing` - Split, normalization and window tensorization
//! - `config` - Explicit pipeline configuration
//! - `pipeline` - End-to-end orchestration
//!
//! ## Example
//!
//! ```rust,no_run
//! use st_demand_prep::prelude::*;
//!
//! fn main() -> st_demand_prep::Result<()> {
//!     let config = PipelineConfig::load("config.toml")?;
//!     let pipeline = Pipeline::new(config)?;
//!
//!     let prepared = pipeline.run()?;
//!     println!("{} train samples", prepared.train.len());
//!
//!     prepared.write(&pipeline.config().output_dir, pipeline.config())?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod preprocessing;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DatasetConfig, FitScope, NormalizationConfig, PipelineConfig};
    pub use crate::data::{load_demand, DemandTensor};
    pub use crate::embedding::{location_id, EmbeddingTable};
    pub use crate::pipeline::{Pipeline, PreparedData};
    pub use crate::preprocessing::{
        resolve_split, BoundaryPolicy, NormalizationMethod, RangeNormalizer, SampleSet,
        SplitDescriptor, WindowConfig, WindowTensorizer,
    };
    pub use crate::{Error, Result};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
