use pupiltrace::{write_outputs, PipelineConfig, PupilEstimator, WriteOptions};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <tracking.csv> <out_dir> [config.json]", args[0]);
        std::process::exit(2);
    }

    let config = match args.get(3) {
        Some(path) => PipelineConfig::from_json_file(Path::new(path))?,
        None => PipelineConfig::default(),
    };
    let estimator = PupilEstimator::with_config(config);
    let out = estimator.estimate_file(Path::new(&args[1]))?;

    let c = &out.report.frames;
    println!(
        "{} frames ({} valid), {} blinks, median diameter {:.2} px",
        c.total,
        c.valid,
        out.estimate.intervals.len(),
        out.report.median_diameter_px
    );
    for b in &out.estimate.intervals {
        println!("  blink {:>6} .. {:>6}", b.start, b.stop);
    }

    let written = write_outputs(&out, Path::new(&args[2]), &WriteOptions::default())?;
    println!("Wrote {} files to {}", written.len(), args[2]);
    Ok(())
}
