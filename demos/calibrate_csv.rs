//! Calibrate a pinhole camera from a CSV file of correspondences.
//!
//! The input file needs the header `X,Y,Z,u,v`, one correspondence per row.
//!
//! Usage:
//! ```bash
//! RUST_LOG=info cargo run --example calibrate_csv -- \
//!   --input samples/box_corner_correspondences.csv \
//!   --config samples/calibration_config.yaml \
//!   --output-yaml output/calibrated.yaml \
//!   --output-json output/calibrated.json
//! ```

use clap::Parser;
use dlt_calibration::calibration::{calibrate_with_config, CalibrationConfig};
use dlt_calibration::util::{self, CalibrationReport};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Correspondence CSV file
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Calibration config YAML; defaults are used when omitted
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Ground-truth camera YAML to compare against
    #[arg(short = 'g', long)]
    ground_truth: Option<PathBuf>,

    /// Write the result as YAML
    #[arg(long)]
    output_yaml: Option<PathBuf>,

    /// Write the result and its statistics as JSON
    #[arg(long)]
    output_json: Option<PathBuf>,
}

fn path_str(path: &Path) -> Result<&str, Box<dyn std::error::Error>> {
    Ok(path.to_str().ok_or("Invalid path string")?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CalibrationConfig::load_from_yaml(path_str(path)?)?,
        None => CalibrationConfig::default(),
    };
    info!("Config: {config:?}");

    let correspondences = util::load_correspondences_csv(path_str(&cli.input)?)?;
    let result = calibrate_with_config(&correspondences, &config)?;
    let reprojection_error = result.reprojection_error(&correspondences)?;
    util::display_calibration_result(&result, Some(&reprojection_error));

    let ground_truth_errors = match &cli.ground_truth {
        Some(path) => {
            let truth = dlt_calibration::PinholeCamera::load_from_yaml(path_str(path)?)?;
            util::display_comparison("Against ground truth", &result, &truth);
            Some(util::compare_with_ground_truth(&result, &truth))
        }
        None => None,
    };

    if let Some(path) = &cli.output_yaml {
        result.save_to_yaml(path_str(path)?)?;
        println!("💾 Saved YAML to {}", path.display());
    }

    if let Some(path) = &cli.output_json {
        let report = CalibrationReport {
            result,
            reprojection_error: Some(reprojection_error),
            ground_truth_errors,
        };
        util::export_calibration_json(&report, path_str(path)?)?;
        println!("💾 Saved JSON to {}", path.display());
    }

    Ok(())
}
