//! End-to-end preparation: load → split → normalize → tensorize

use crate::config::{FitScope, PipelineConfig};
use crate::data::{load_demand, DemandTensor};
use crate::embedding::EmbeddingTable;
use crate::error::{Error, Result};
use crate::preprocessing::{
    RangeNormalizer, SampleSet, SampleShapes, WindowConfig, WindowTensorizer,
};
use serde::Serialize;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Output of a pipeline run
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train: SampleSet,
    pub test: SampleSet,
    /// Fitted normalizer, needed to map predictions back
    pub normalizer: RangeNormalizer,
    /// Resolved time ranges of every declared segment
    pub segments: Vec<Range<usize>>,
}

/// Summary written next to the exported tensors
#[derive(Debug, Clone, Serialize)]
pub struct PreparationSummary {
    pub dataset: String,
    pub segments: Vec<[usize; 2]>,
    pub train_segment: usize,
    pub test_segment: usize,
    pub window: WindowConfig,
    pub normalizer: RangeNormalizer,
    pub train: SampleShapes,
    pub test: SampleShapes,
}

impl PreparedData {
    fn summary(&self, config: &PipelineConfig) -> PreparationSummary {
        PreparationSummary {
            dataset: config.dataset.name.clone(),
            segments: self.segments.iter().map(|r| [r.start, r.end]).collect(),
            train_segment: config.dataset.train_segment,
            test_segment: config.dataset.test_segment,
            window: config.window.clone(),
            normalizer: self.normalizer.clone(),
            train: self.train.shapes(),
            test: self.test.shapes(),
        }
    }

    /// Write train/test tensors, `normalizer.json` and `metadata.json`
    pub fn write<P: AsRef<Path>>(&self, dir: P, config: &PipelineConfig) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let mut written = self.train.write_npy(dir, "train")?;
        written.extend(self.test.write_npy(dir, "test")?);

        let normalizer_path = dir.join("normalizer.json");
        self.normalizer.save_json(&normalizer_path)?;
        written.push(normalizer_path);

        let metadata_path = dir.join("metadata.json");
        std::fs::write(
            &metadata_path,
            serde_json::to_string_pretty(&self.summary(config))?,
        )?;
        written.push(metadata_path);

        Ok(written)
    }
}

/// Preparation pipeline built from an explicit configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    tensorizer: WindowTensorizer,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let tensorizer = WindowTensorizer::new(config.window.clone())?;
        Ok(Self { config, tensorizer })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the configured files and prepare them
    pub fn run(&self) -> Result<PreparedData> {
        let dataset = &self.config.dataset;
        info!("Preparing dataset '{}'", dataset.name);

        let tensor = load_demand(&dataset.data_files, dataset.channels.as_deref())?;
        let embeddings = EmbeddingTable::load(&dataset.embedding_file)?;
        info!(
            "Loaded {} embeddings (dim {})",
            embeddings.len(),
            embeddings.dimension()
        );

        self.prepare(&tensor, &embeddings)
    }

    /// Prepare an already loaded tensor.
    ///
    /// The normalizer is fit once, applied to the whole tensor, and the
    /// train and test segments are windowed from the normalized values.
    pub fn prepare(&self, tensor: &DemandTensor, embeddings: &EmbeddingTable) -> Result<PreparedData> {
        let dataset = &self.config.dataset;
        let segments = dataset.split.resolve(tensor.time_steps())?;
        debug!("Resolved segments: {:?}", segments);

        let train_range = segment(&segments, dataset.train_segment, "train")?;
        let test_range = segment(&segments, dataset.test_segment, "test")?;

        let mut normalizer = RangeNormalizer::new(self.config.normalization.method);
        match self.config.normalization.fit_scope {
            FitScope::TrainSegment => {
                normalizer.fit(&tensor.time_slice(train_range.start, train_range.end)?)?
            }
            FitScope::FullSeries => normalizer.fit(tensor.as_array())?,
        }
        if let Some(params) = normalizer.params() {
            debug!(
                "Fitted {} normalizer: min={}, max={}, mean={}",
                normalizer.method(),
                params.min,
                params.max,
                params.mean
            );
        }

        let normalized = DemandTensor::new(normalizer.transform(tensor.as_array())?)?;

        let train = self.tensorizer.tensorize(&normalized, embeddings, &train_range)?;
        let test = self.tensorizer.tensorize(&normalized, embeddings, &test_range)?;
        info!(
            "Train samples: {} {:?}, test samples: {} {:?}",
            train.len(),
            train.inputs().shape(),
            test.len(),
            test.inputs().shape()
        );

        Ok(PreparedData {
            train,
            test,
            normalizer,
            segments,
        })
    }
}

fn segment(segments: &[Range<usize>], index: usize, role: &str) -> Result<Range<usize>> {
    segments.get(index).cloned().ok_or_else(|| {
        Error::Config(format!(
            "{} segment {} out of range for {} segments",
            role,
            index,
            segments.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetConfig, NormalizationConfig};
    use crate::preprocessing::{BoundaryPolicy, NormalizationMethod, SplitDescriptor};
    use approx::assert_relative_eq;
    use ndarray::{Array1, Array4};

    fn config(split: Vec<usize>, window: usize, patch: usize) -> PipelineConfig {
        PipelineConfig {
            output_dir: PathBuf::from("output"),
            dataset: DatasetConfig {
                name: "synthetic".to_string(),
                data_files: vec![PathBuf::from("unused.npy")],
                embedding_file: PathBuf::from("unused.txt"),
                channels: None,
                split: SplitDescriptor::new(split),
                train_segment: 0,
                test_segment: 1,
            },
            window: WindowConfig {
                input_window_len: window,
                patch_size: patch,
                boundary: BoundaryPolicy::WithinSegment,
                parallel: true,
            },
            normalization: NormalizationConfig::default(),
        }
    }

    fn tensor() -> DemandTensor {
        DemandTensor::new(Array4::from_shape_fn((12, 5, 5, 1), |(t, r, c, _)| {
            (t * 25 + r * 5 + c) as f64
        }))
        .unwrap()
    }

    fn table() -> EmbeddingTable {
        EmbeddingTable::from_vectors(1, (0..25).map(|id| (id, Array1::from_elem(1, id as f64))))
            .unwrap()
    }

    #[test]
    fn test_train_and_test_windows() {
        let pipeline = Pipeline::new(config(vec![6, 4, 2], 2, 3)).unwrap();
        let prepared = pipeline.prepare(&tensor(), &table()).unwrap();

        assert_eq!(prepared.segments, vec![0..6, 6..10, 10..12]);
        // train t in [2, 6), test t in [8, 10), 9 cells each
        assert_eq!(prepared.train.len(), 4 * 9);
        assert_eq!(prepared.test.len(), 2 * 9);
        assert_eq!(prepared.test.positions()[0].t, 8);
    }

    #[test]
    fn test_normalizer_fit_on_train_segment() {
        let pipeline = Pipeline::new(config(vec![6, 4, 2], 2, 3)).unwrap();
        let prepared = pipeline.prepare(&tensor(), &table()).unwrap();

        let params = prepared.normalizer.params().unwrap();
        assert_eq!(params.min, 0.0);
        assert_eq!(params.max, 149.0);

        // target at t=2, row=1, col=1 is 56 before scaling
        assert_relative_eq!(prepared.train.targets()[[0, 0]], 56.0 / 149.0);
        let restored = prepared
            .normalizer
            .inverse_transform(prepared.test.targets())
            .unwrap();
        assert_relative_eq!(restored[[0, 0]], (8 * 25 + 6) as f64, epsilon = 1e-9);
    }

    #[test]
    fn test_full_series_fit_scope() {
        let mut cfg = config(vec![6, 4, 2], 2, 3);
        cfg.normalization = NormalizationConfig {
            method: NormalizationMethod::MeanCenteredMinMax,
            fit_scope: FitScope::FullSeries,
        };
        let prepared = Pipeline::new(cfg).unwrap().prepare(&tensor(), &table()).unwrap();
        let params = prepared.normalizer.params().unwrap();
        assert_eq!(params.max, 299.0);
        assert_relative_eq!(params.mean, 149.5);
    }

    #[test]
    fn test_split_overflow_propagates() {
        let pipeline = Pipeline::new(config(vec![10, 5, 2], 2, 3)).unwrap();
        let err = pipeline.prepare(&tensor(), &table()).unwrap_err();
        assert!(matches!(err, Error::SplitOverflow { .. }));
    }

    #[test]
    fn test_constant_train_segment_is_degenerate() {
        let flat = DemandTensor::new(Array4::from_elem((12, 5, 5, 1), 3.0)).unwrap();
        let pipeline = Pipeline::new(config(vec![6, 6], 2, 3)).unwrap();
        assert!(matches!(
            pipeline.prepare(&flat, &table()),
            Err(Error::DegenerateRange(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Pipeline::new(config(vec![6, 6], 2, 4)).is_err());
    }
}
