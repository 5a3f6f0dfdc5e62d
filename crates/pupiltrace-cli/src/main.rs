//! pupiltrace CLI: batch pupil measurement from tracker CSV files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pupiltrace::{
    DiameterFormula, HeightModelKind, OutputLayout, PipelineConfig, PixelScale, PupilEstimator,
    WriteOptions,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "pupiltrace")]
#[command(about = "Estimate pupil diameter and center traces from keypoint tracking CSV files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure pupil traces for one or more tracker CSV files.
    Measure(CliMeasureArgs),

    /// Compute a pixel-to-millimetre scale from a reference tracking file.
    Scale(CliScaleArgs),

    /// Print the default pipeline configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliMeasureArgs {
    /// Tracker CSV files to process.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Pipeline configuration (JSON). Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory. Defaults to `<root>/xyPos_diameter/<session>/` next
    /// to each input; with several inputs each gets `<session>/<file stem>/`
    /// below it.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Minimum point likelihood for a frame to count as valid.
    #[arg(long)]
    min_certainty: Option<f64>,

    /// Median filter span in frames (odd).
    #[arg(long)]
    smooth_span: Option<usize>,

    /// Frames added before and after every detected blink.
    #[arg(long)]
    pad_frames: Option<usize>,

    /// How diameter is derived from width and adjusted height.
    #[arg(long, value_enum)]
    diameter: Option<DiameterArg>,

    /// Regressors of the height model.
    #[arg(long, value_enum)]
    height_model: Option<HeightModelArg>,

    /// Write NaN into blink frames of the .npy outputs.
    #[arg(long)]
    mask_blinks: bool,

    /// Tracker CSV of a reference object of known size, for millimetre output.
    #[arg(long)]
    scale_ref: Option<PathBuf>,

    /// Bodypart names of the two reference points.
    #[arg(long, num_args = 2, value_names = ["A", "B"], requires = "scale_ref")]
    ref_points: Option<Vec<String>>,

    /// Physical distance between the reference points (mm).
    #[arg(long, default_value_t = PixelScale::DEFAULT_REFERENCE_MM)]
    ref_size_mm: f64,

    /// Worker threads (0 = one per core).
    #[arg(long, default_value = "0")]
    jobs: usize,

    /// Write a JSON batch summary here.
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliScaleArgs {
    /// Reference tracker CSV.
    file: PathBuf,

    /// Bodypart names of the two reference points.
    #[arg(long, num_args = 2, value_names = ["A", "B"], required = true)]
    ref_points: Vec<String>,

    /// Physical distance between the reference points (mm).
    #[arg(long, default_value_t = PixelScale::DEFAULT_REFERENCE_MM)]
    ref_size_mm: f64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DiameterArg {
    Height,
    Width,
    Mean,
    Geometric,
}

impl DiameterArg {
    fn to_core(self) -> DiameterFormula {
        match self {
            Self::Height => DiameterFormula::Height,
            Self::Width => DiameterFormula::Width,
            Self::Mean => DiameterFormula::Mean,
            Self::Geometric => DiameterFormula::Geometric,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HeightModelArg {
    Linear,
    Quadratic,
}

impl HeightModelArg {
    fn to_core(self) -> HeightModelKind {
        match self {
            Self::Linear => HeightModelKind::Linear,
            Self::Quadratic => HeightModelKind::Quadratic,
        }
    }
}

impl CliMeasureArgs {
    fn to_config(&self) -> CliResult<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(v) = self.min_certainty {
            config.min_certainty = v;
        }
        if let Some(v) = self.smooth_span {
            config.smooth_span = v;
        }
        if let Some(v) = self.pad_frames {
            config.blink.pad_frames = v;
        }
        if let Some(v) = self.diameter {
            config.diameter = v.to_core();
        }
        if let Some(v) = self.height_model {
            config.height_model.kind = v.to_core();
        }
        config.validate()?;
        Ok(config)
    }

    fn to_scale(&self) -> CliResult<Option<PixelScale>> {
        let Some(path) = &self.scale_ref else {
            return Ok(None);
        };
        let points = self
            .ref_points
            .as_deref()
            .ok_or_else(|| -> CliError { "--scale-ref needs --ref-points A B".into() })?;
        let scale = PixelScale::from_reference_csv(path, &points[0], &points[1], self.ref_size_mm)?;
        Ok(Some(scale))
    }

    fn layout_for(&self, file: &Path) -> OutputLayout {
        match &self.out_dir {
            Some(dir) if self.files.len() > 1 => {
                let stem = file.file_stem().unwrap_or(file.as_os_str());
                let session = file.parent().and_then(Path::file_name);
                let base = session.map_or_else(|| dir.clone(), |s| dir.join(s));
                OutputLayout::Explicit(base.join(stem))
            }
            Some(dir) => OutputLayout::Explicit(dir.clone()),
            None => OutputLayout::NextToTracking,
        }
    }
}

/// Resolve every file's output directory before any work starts.
///
/// A directory already claimed by an earlier file in the batch is an error
/// for the later file, so no two runs ever write into the same place.
fn plan_output_dirs(args: &CliMeasureArgs) -> Vec<Result<PathBuf, String>> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    args.files
        .iter()
        .map(|file| -> Result<PathBuf, String> {
            let dir = args
                .layout_for(file)
                .resolve(file)
                .map_err(|e| e.to_string())?;
            if let Some(first) = claimed.get(&dir) {
                return Err(format!(
                    "output directory {} is already used by {}",
                    dir.display(),
                    first.display()
                ));
            }
            claimed.insert(dir.clone(), file);
            Ok(dir)
        })
        .collect()
}

/// Result of one file in a batch.
#[derive(Debug, serde::Serialize)]
struct FileOutcome {
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_frames: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n_blinks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Measure(args) => run_measure(&args),
        Commands::Scale(args) => run_scale(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&PipelineConfig::default())?);
    Ok(())
}

// ── scale ──────────────────────────────────────────────────────────────

fn run_scale(args: &CliScaleArgs) -> CliResult<()> {
    let scale = PixelScale::from_reference_csv(
        &args.file,
        &args.ref_points[0],
        &args.ref_points[1],
        args.ref_size_mm,
    )?;
    println!("{}", serde_json::to_string_pretty(&scale)?);
    Ok(())
}

// ── measure ────────────────────────────────────────────────────────────

fn run_measure(args: &CliMeasureArgs) -> CliResult<()> {
    let outcomes = measure_batch(args)?;

    let n_failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    tracing::info!(
        "Done: {} succeeded, {} failed",
        outcomes.len() - n_failed,
        n_failed
    );

    if let Some(path) = &args.summary {
        std::fs::write(path, serde_json::to_string_pretty(&outcomes)?)?;
        tracing::info!("Summary written to {}", path.display());
    }

    if n_failed > 0 {
        return Err(format!("{} of {} files failed", n_failed, outcomes.len()).into());
    }
    Ok(())
}

/// Run every file on its own pipeline; one outcome per input, in input order.
fn measure_batch(args: &CliMeasureArgs) -> CliResult<Vec<FileOutcome>> {
    let estimator = PupilEstimator::with_config(args.to_config()?);
    let opts = WriteOptions {
        mask_blinks: args.mask_blinks,
        scale: args.to_scale()?,
    };
    let plan = plan_output_dirs(args);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs)
        .build()?;
    tracing::info!(
        "Processing {} files on {} threads",
        args.files.len(),
        pool.current_num_threads()
    );

    Ok(pool.install(|| {
        args.files
            .par_iter()
            .zip(&plan)
            .map(|(file, dir)| measure_one(&estimator, file, dir, &opts))
            .collect()
    }))
}

fn measure_one(
    estimator: &PupilEstimator,
    file: &Path,
    dir: &Result<PathBuf, String>,
    opts: &WriteOptions,
) -> FileOutcome {
    tracing::info!("Measuring {}", file.display());
    let result = dir.clone().and_then(|dir| {
        let out = estimator.estimate_file(file).map_err(|e| e.to_string())?;
        pupiltrace::write_outputs(&out, &dir, opts).map_err(|e| e.to_string())?;
        Ok((dir, out))
    });

    match result {
        Ok((dir, out)) => FileOutcome {
            file: file.to_path_buf(),
            output_dir: Some(dir),
            n_frames: Some(out.estimate.len()),
            n_blinks: Some(out.estimate.intervals.len()),
            error: None,
        },
        Err(e) => {
            tracing::error!("{}: {}", file.display(), e);
            FileOutcome {
                file: file.to_path_buf(),
                output_dir: None,
                n_frames: None,
                n_blinks: None,
                error: Some(e),
            }
        }
    }
}
