//! Command line entry point
//!
//! - `init` writes a configuration file for a dataset preset
//! - `prepare` builds and exports train/test tensors
//! - `inspect` summarizes an embedding table or raw array
//! - `denormalize` maps normalized predictions back to demand counts

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use st_demand_prep::{
    config::{DatasetConfig, PipelineConfig},
    data::load_array,
    embedding::EmbeddingTable,
    pipeline::Pipeline,
    preprocessing::{BoundaryPolicy, NormalizationMethod, RangeNormalizer},
    Error,
};

/// Spatiotemporal demand tensor preparation
#[derive(Parser)]
#[command(name = "st-demand-prep")]
#[command(version)]
#[command(about = "Prepare windowed train/test tensors from gridded demand data")]
struct Cli {
    /// Path to configuration file (.toml or .json)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    MinMax,
    MeanCentered,
    ZScore,
}

impl From<MethodArg> for NormalizationMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::MinMax => NormalizationMethod::MinMax,
            MethodArg::MeanCentered => NormalizationMethod::MeanCenteredMinMax,
            MethodArg::ZScore => NormalizationMethod::ZScore,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum BoundaryArg {
    WithinSegment,
    CarryHistory,
}

impl From<BoundaryArg> for BoundaryPolicy {
    fn from(arg: BoundaryArg) -> Self {
        match arg {
            BoundaryArg::WithinSegment => BoundaryPolicy::WithinSegment,
            BoundaryArg::CarryHistory => BoundaryPolicy::CarryHistory,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file for a dataset preset
    Init {
        /// Dataset preset: citibike, taxi or didi
        #[arg(short, long, default_value = "didi")]
        dataset: String,

        /// Directory holding `<dataset>-data` folders
        #[arg(long, default_value = "datasets")]
        datasets_dir: PathBuf,
    },

    /// Build train/test tensors and write them as .npy files
    Prepare {
        /// Number of input time steps
        #[arg(long)]
        input_steps: Option<usize>,

        /// Spatial patch edge length (odd)
        #[arg(long)]
        patch_size: Option<usize>,

        /// Normalization method
        #[arg(long, value_enum)]
        method: Option<MethodArg>,

        /// Which time steps after a split may be sampled
        #[arg(long, value_enum)]
        boundary: Option<BoundaryArg>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize an embedding table or a raw .npy array
    Inspect {
        /// Embedding table
        #[arg(long)]
        embeddings: Option<PathBuf>,

        /// Raw array
        #[arg(long)]
        array: Option<PathBuf>,
    },

    /// Inverse-transform normalized predictions
    Denormalize {
        /// Saved normalizer.json
        #[arg(short, long)]
        normalizer: PathBuf,

        /// Normalized .npy input
        #[arg(short, long)]
        input: PathBuf,

        /// Output .npy path
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let result = match cli.command {
        Commands::Init {
            dataset,
            datasets_dir,
        } => init_config(&cli.config, &dataset, &datasets_dir),
        Commands::Prepare {
            input_steps,
            patch_size,
            method,
            boundary,
            output,
        } => prepare(
            &cli.config,
            PrepareOverrides {
                input_steps,
                patch_size,
                method: method.map(Into::into),
                boundary: boundary.map(Into::into),
                output,
            },
        ),
        Commands::Inspect { embeddings, array } => inspect(embeddings, array),
        Commands::Denormalize {
            normalizer,
            input,
            output,
        } => denormalize(&normalizer, &input, &output),
    };

    if let Err(err) = &result {
        if let Some(kind) = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<Error>())
            .map(Error::kind)
        {
            error!("{}: {:#}", kind, err);
        }
    }

    result
}

/// Write a preset configuration
fn init_config(path: &Path, dataset: &str, datasets_dir: &Path) -> Result<()> {
    let preset = DatasetConfig::preset(dataset, datasets_dir)
        .with_context(|| format!("Unknown dataset preset '{}'", dataset))?;
    let config = PipelineConfig::for_dataset(preset);

    config
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote configuration for '{}' to {}", dataset, path.display());
    Ok(())
}

struct PrepareOverrides {
    input_steps: Option<usize>,
    patch_size: Option<usize>,
    method: Option<NormalizationMethod>,
    boundary: Option<BoundaryPolicy>,
    output: Option<PathBuf>,
}

/// Run the pipeline and export its tensors
fn prepare(config_path: &Path, overrides: PrepareOverrides) -> Result<()> {
    let mut config = PipelineConfig::load(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    if let Some(steps) = overrides.input_steps {
        config.window.input_window_len = steps;
    }
    if let Some(patch) = overrides.patch_size {
        config.window.patch_size = patch;
    }
    if let Some(method) = overrides.method {
        config.normalization.method = method;
    }
    if let Some(boundary) = overrides.boundary {
        config.window.boundary = boundary;
    }
    if let Some(output) = overrides.output {
        config.output_dir = output;
    }

    let pipeline = Pipeline::new(config)?;
    let prepared = pipeline.run()?;

    let out_dir = &pipeline.config().output_dir;
    let written = prepared
        .write(out_dir, pipeline.config())
        .with_context(|| format!("Failed to write outputs to {}", out_dir.display()))?;
    for path in &written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

/// Print summaries of the given files
fn inspect(embeddings: Option<PathBuf>, array: Option<PathBuf>) -> Result<()> {
    if embeddings.is_none() && array.is_none() {
        anyhow::bail!("Nothing to inspect: pass --embeddings and/or --array");
    }

    if let Some(path) = embeddings {
        let table = EmbeddingTable::load(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let ids = table.ids();
        println!("Embedding table: {}", path.display());
        println!("  entries:   {}", table.len());
        println!("  dimension: {}", table.dimension());
        if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
            println!("  id range:  {}..={}", first, last);
        }
    }

    if let Some(path) = array {
        let data = load_array(&path).with_context(|| format!("Failed to load {}", path.display()))?;
        let finite: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        println!("Array: {}", path.display());
        println!("  shape: {:?}", data.shape());
        println!("  range: [{}, {}]", min, max);
        println!("  non-finite values: {}", data.len() - finite.len());
    }

    Ok(())
}

/// Apply a saved normalizer's inverse transform to an array
fn denormalize(normalizer_path: &Path, input: &Path, output: &Path) -> Result<()> {
    let normalizer = RangeNormalizer::load_json(normalizer_path)
        .with_context(|| format!("Failed to load {}", normalizer_path.display()))?;
    let normalized =
        load_array(input).with_context(|| format!("Failed to load {}", input.display()))?;

    let restored = normalizer.inverse_transform(&normalized)?;
    ndarray_npy::write_npy(output, &restored)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!(
        "Restored {:?} values with {} normalizer into {}",
        restored.shape(),
        normalizer.method(),
        output.display()
    );
    Ok(())
}
