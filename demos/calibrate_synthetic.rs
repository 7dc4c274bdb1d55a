//! Synthetic DLT Calibration Example
//!
//! Projects a box-corner calibration target through a known pinhole camera and
//! calibrates from the resulting correspondences three times:
//! - noise-free image points
//! - image points with Gaussian pixel noise
//! - image points shifted by a constant offset while the principal point is
//!   assumed to be the true one
//!
//! Each trial is compared against the ground truth.
//!
//! Usage:
//! ```bash
//! cargo run --example calibrate_synthetic -- \
//!   --sigma 0.5 \
//!   --seed 42 \
//!   --export-csv output/box_corner.csv
//! ```

use clap::Parser;
use dlt_calibration::calibration::{calibrate, calibrate_with_config, CalibrationConfig};
use dlt_calibration::camera::{Intrinsics, PinholeCamera, Resolution};
use dlt_calibration::synthetic::{add_gaussian_noise, calibration_pattern, SyntheticScene};
use dlt_calibration::util;
use flexi_logger::{colored_detailed_format, detailed_format, Duplicate, FileSpec, Logger};
use log::{error, info};
use nalgebra::Vector3;
use std::path::PathBuf;

/// Calibrate a pinhole camera from a synthetic box-corner target
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ground-truth camera YAML; a camera looking at the target corner is used when omitted
    #[arg(short = 'c', long)]
    camera: Option<PathBuf>,

    /// Grid columns per plane
    #[arg(long, default_value_t = 4)]
    cols: usize,

    /// Grid rows per plane
    #[arg(long, default_value_t = 4)]
    rows: usize,

    /// Grid spacing in world units
    #[arg(long, default_value_t = 0.25)]
    spacing: f64,

    /// Standard deviation of the pixel noise
    #[arg(short = 's', long, default_value_t = 0.5)]
    sigma: f64,

    /// Seed of the noise generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Image offset applied in the wrong-center trial, in pixels
    #[arg(long, num_args = 2, default_values_t = [20.0, 12.0])]
    offset: Vec<f64>,

    /// Write the noise-free correspondences to this CSV file
    #[arg(long)]
    export_csv: Option<PathBuf>,
}

fn default_camera() -> Result<PinholeCamera, Box<dyn std::error::Error>> {
    Ok(PinholeCamera::look_at(
        Intrinsics::new(800.0, 780.0, 640.0, 360.0),
        Resolution {
            width: 1280,
            height: 720,
        },
        &Vector3::new(4.0, 3.5, 3.0),
        &Vector3::new(0.5, 0.5, 0.5),
        &Vector3::new(0.0, 0.0, 1.0),
    )?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Logger::try_with_str("info")?
        .log_to_file(
            FileSpec::default()
                .directory("logs")
                .suppress_timestamp()
                .suffix("log"),
        )
        .duplicate_to_stdout(Duplicate::Info)
        .format_for_files(detailed_format)
        .format_for_stdout(colored_detailed_format)
        // error;warn;info;debug;trace
        .set_palette("196;208;76;39;178".to_string())
        .start()?;

    let cli = Cli::parse();

    let camera = match &cli.camera {
        Some(path) => {
            let path_str = path.to_str().ok_or("Invalid camera path string")?;
            info!("Loading ground-truth camera from {path_str}");
            PinholeCamera::load_from_yaml(path_str)?
        }
        None => default_camera()?,
    };
    info!("Ground truth: {:?}", camera.intrinsics);
    info!("Ground truth angles: {:?}", camera.euler_angles());

    let scene = SyntheticScene::new(
        camera.clone(),
        calibration_pattern(cli.cols, cli.rows, cli.spacing)?,
    );
    let clean = scene.correspondences()?;
    info!("Generated {} correspondences", clean.len());

    if let Some(path) = &cli.export_csv {
        let path_str = path.to_str().ok_or("Invalid CSV path string")?;
        util::save_correspondences_csv(&clean, path_str)?;
        println!("💾 Exported correspondences to {path_str}");
    }

    println!("\n🧪 Trial 1: noise-free correspondences");
    let result = calibrate(&clean)?;
    util::display_calibration_result(&result, Some(&result.reprojection_error(&clean)?));
    util::display_comparison("Noise-free", &result, &camera);

    println!(
        "\n🧪 Trial 2: Gaussian noise, sigma = {} px, seed = {}",
        cli.sigma, cli.seed
    );
    let noisy = add_gaussian_noise(&clean, cli.sigma, cli.seed)?;
    match calibrate(&noisy) {
        Ok(result) => {
            util::display_calibration_result(&result, Some(&result.reprojection_error(&noisy)?));
            util::display_comparison("Noisy", &result, &camera);
        }
        Err(e) => error!("Noisy calibration failed: {e}"),
    }

    let (dx, dy) = (cli.offset[0], cli.offset[1]);
    println!("\n🧪 Trial 3: image shifted by ({dx}, {dy}) px, principal point assumed");
    let shifted = clean.with_image_offset(dx, dy);
    let config = CalibrationConfig {
        principal_point: Some([camera.intrinsics.cx, camera.intrinsics.cy]),
        ..Default::default()
    };
    match calibrate_with_config(&shifted, &config) {
        Ok(result) => {
            util::display_calibration_result(
                &result,
                Some(&result.reprojection_error(&shifted)?),
            );
            util::display_comparison("Wrong center", &result, &camera);
        }
        Err(e) => error!("Wrong-center calibration failed: {e}"),
    }

    Ok(())
}
