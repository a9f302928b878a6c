//! Configuration management
//!
//! Everything a pipeline run needs is carried by an explicit
//! `PipelineConfig`; nothing is read from the environment.

use crate::error::{Error, Result};
use crate::preprocessing::{NormalizationMethod, SplitDescriptor, WindowConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory for exported tensors
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub normalization: NormalizationConfig,
}

/// Dataset files and time-axis split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset name, used for presets and log output
    pub name: String,
    /// Raw `.npy` arrays, stacked along the channel axis
    pub data_files: Vec<PathBuf>,
    /// Embedding table in `<count> <dim>` text format
    pub embedding_file: PathBuf,
    /// Channels kept after stacking (all when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<usize>>,
    /// Segment lengths along the time axis
    pub split: SplitDescriptor,
    /// Index of the segment used for training
    #[serde(default)]
    pub train_segment: usize,
    /// Index of the segment used for evaluation
    #[serde(default = "default_test_segment")]
    pub test_segment: usize,
}

/// Which data the normalizer is fit on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitScope {
    /// Fit on the training segment only
    #[default]
    TrainSegment,
    /// Fit on the whole series
    FullSeries,
}

/// Normalization settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub method: NormalizationMethod,
    pub fit_scope: FitScope,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_test_segment() -> usize {
    1
}

/// Split used by the citibike preset
pub const CITIBIKE_SPLIT: [usize; 3] = [3672, 240, 480];
/// Split used by the taxi preset
pub const TAXI_SPLIT: [usize; 3] = [11640, 744, 720];
/// Split used by the didi preset
pub const DIDI_SPLIT: [usize; 3] = [2400, 192, 288];

impl DatasetConfig {
    /// Built-in dataset layouts under `datasets_dir`.
    ///
    /// Matching is by substring, so `nyc-taxi` selects the taxi layout.
    pub fn preset(name: &str, datasets_dir: &Path) -> Option<Self> {
        let folder = datasets_dir.join(format!("{}-data", name));

        let (data_files, split) = if name.contains("citibike") {
            let data = folder.join("data");
            (
                vec![data.join("d_station.npy"), data.join("p_station.npy")],
                CITIBIKE_SPLIT,
            )
        } else if name.contains("taxi") {
            (
                vec![folder.join("graph-data").join("nyc_taxi_data.npy")],
                TAXI_SPLIT,
            )
        } else if name.contains("didi") {
            (vec![folder.join("data").join("cd_didi_data.npy")], DIDI_SPLIT)
        } else {
            return None;
        };

        Some(Self::with_layout(name, &folder, data_files, &split))
    }

    fn with_layout(name: &str, folder: &Path, data_files: Vec<PathBuf>, split: &[usize]) -> Self {
        Self {
            name: name.to_string(),
            data_files,
            embedding_file: folder.join(format!("embedding_{}.txt", name)),
            channels: Some(vec![0]),
            split: SplitDescriptor::new(split.to_vec()),
            train_segment: 0,
            test_segment: default_test_segment(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let folder = Path::new("datasets").join("didi-data");
        let data_files = vec![folder.join("data").join("cd_didi_data.npy")];
        Self::for_dataset(DatasetConfig::with_layout("didi", &folder, data_files, &DIDI_SPLIT))
    }
}

impl PipelineConfig {
    /// Default window and normalization settings for a dataset
    pub fn for_dataset(dataset: DatasetConfig) -> Self {
        Self {
            dataset,
            window: WindowConfig::default(),
            normalization: NormalizationConfig::default(),
            output_dir: default_output_dir(),
        }
    }

    /// Load configuration from TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `.toml` or `.json`, chosen by extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if is_toml(path) {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
    }

    /// Save as `.toml` or `.json`, chosen by extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if is_toml(path) {
            self.save_toml(path)
        } else {
            self.save_json(path)
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;

        let dataset = &self.dataset;
        if dataset.data_files.is_empty() {
            return Err(Error::Config("no data files configured".to_string()));
        }
        let segments = dataset.split.num_segments();
        if segments == 0 {
            return Err(Error::Config("split must declare at least one segment".to_string()));
        }
        if dataset.train_segment >= segments || dataset.test_segment >= segments {
            return Err(Error::Config(format!(
                "segment roles (train {}, test {}) out of range for {} segments",
                dataset.train_segment, dataset.test_segment, segments
            )));
        }
        if dataset.train_segment == dataset.test_segment {
            return Err(Error::Config(format!(
                "train and test both use segment {}",
                dataset.train_segment
            )));
        }
        if let Some(channels) = &dataset.channels {
            if channels.is_empty() {
                return Err(Error::Config("channel selection is empty".to_string()));
            }
        }
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::BoundaryPolicy;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.dataset.name, "didi");
        assert_eq!(config.dataset.split.lengths(), &[2400, 192, 288]);
        assert_eq!(config.window.input_window_len, 6);
        assert_eq!(config.window.patch_size, 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let root = Path::new("datasets");
        let citibike = DatasetConfig::preset("citibike", root).unwrap();
        assert_eq!(citibike.split.lengths(), &[3672, 240, 480]);
        assert_eq!(citibike.data_files.len(), 2);

        let taxi = DatasetConfig::preset("nyc-taxi", root).unwrap();
        assert_eq!(taxi.split.lengths(), &[11640, 744, 720]);

        assert!(DatasetConfig::preset("unknown", root).is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = PipelineConfig::default();
        config.window.boundary = BoundaryPolicy::CarryHistory;
        config.normalization.method = NormalizationMethod::MeanCenteredMinMax;
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = PipelineConfig::default();
        config.dataset.channels = None;
        config.save(&path).unwrap();

        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let text = r#"
[dataset]
name = "grid"
data_files = ["grid.npy"]
embedding_file = "embedding.txt"
split = [10, 5]
"#;
        let config: PipelineConfig = toml::from_str(text).unwrap();
        assert_eq!(config.window, WindowConfig::default());
        assert_eq!(config.normalization.method, NormalizationMethod::MinMax);
        assert_eq!(config.normalization.fit_scope, FitScope::TrainSegment);
        assert_eq!(config.dataset.test_segment, 1);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PipelineConfig::default();
        config.dataset.test_segment = 3;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = PipelineConfig::default();
        config.dataset.test_segment = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.window.patch_size = 8;
        assert!(matches!(config.validate(), Err(Error::Shape(_))));

        let mut config = PipelineConfig::default();
        config.dataset.data_files.clear();
        assert!(config.validate().is_err());
    }
}
