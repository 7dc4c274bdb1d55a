//! Correspondence files, ground-truth comparison and result reporting.

use crate::calibration::{CalibrationError, CalibrationResult};
use crate::camera::PinholeCamera;
use crate::geometry::{CorrespondenceSet, ImagePoint, ProjectionError, WorldPoint};
use log::info;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("CSV error: {0}")]
    CsvError(String),
    #[error("JSON error: {0}")]
    JsonError(String),
    #[error("IO Error: {0}")]
    IOError(String),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

impl From<std::io::Error> for UtilError {
    fn from(err: std::io::Error) -> Self {
        UtilError::IOError(err.to_string())
    }
}

impl From<csv::Error> for UtilError {
    fn from(err: csv::Error) -> Self {
        UtilError::CsvError(err.to_string())
    }
}

impl From<serde_json::Error> for UtilError {
    fn from(err: serde_json::Error) -> Self {
        UtilError::JsonError(err.to_string())
    }
}

/// One row of a correspondence CSV file: `X,Y,Z,u,v`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct CorrespondenceRecord {
    #[serde(rename = "X")]
    x: f64,
    #[serde(rename = "Y")]
    y: f64,
    #[serde(rename = "Z")]
    z: f64,
    u: f64,
    v: f64,
}

/// Reads correspondences from a CSV file with header `X,Y,Z,u,v`.
///
/// Surrounding whitespace in fields is ignored.
pub fn load_correspondences_csv(path: &str) -> Result<CorrespondenceSet, UtilError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut world = Vec::new();
    let mut image = Vec::new();
    for (line, record) in reader.deserialize::<CorrespondenceRecord>().enumerate() {
        let record = record.map_err(|e| UtilError::CsvError(format!("row {}: {e}", line + 1)))?;
        world.push(WorldPoint::new(record.x, record.y, record.z));
        image.push(ImagePoint::new(record.u, record.v));
    }
    info!("Loaded {} correspondences from {path}", world.len());

    Ok(CorrespondenceSet::from_points(&world, &image)?)
}

/// Writes correspondences as CSV with header `X,Y,Z,u,v`.
pub fn save_correspondences_csv(
    correspondences: &CorrespondenceSet,
    path: &str,
) -> Result<(), UtilError> {
    let mut writer = csv::Writer::from_path(path)?;
    for (world, image) in correspondences.iter() {
        writer.serialize(CorrespondenceRecord {
            x: world.x,
            y: world.y,
            z: world.z,
            u: image.x,
            v: image.y,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Absolute differences between a calibration and the camera that produced
/// the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterErrors {
    pub fx: f64,
    pub fy: f64,
    pub ox: f64,
    pub oy: f64,
    /// Per-angle differences in degrees.
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// Angle of the relative rotation `R_est Rᵗ_true`, in degrees.
    pub rotation_deg: f64,
    /// Euclidean distance between translations, in world units.
    pub translation: f64,
}

pub fn compare_with_ground_truth(
    result: &CalibrationResult,
    truth: &PinholeCamera,
) -> ParameterErrors {
    let truth_angles = truth.euler_angles();
    ParameterErrors {
        fx: (result.fx() - truth.intrinsics.fx).abs(),
        fy: (result.fy() - truth.intrinsics.fy).abs(),
        ox: (result.ox() - truth.intrinsics.cx).abs(),
        oy: (result.oy() - truth.intrinsics.cy).abs(),
        alpha: (result.euler_angles.alpha - truth_angles.alpha).abs(),
        beta: (result.euler_angles.beta - truth_angles.beta).abs(),
        gamma: (result.euler_angles.gamma - truth_angles.gamma).abs(),
        rotation_deg: rotation_angle_deg(&(result.rotation * truth.rotation.transpose())),
        translation: (result.translation - truth.translation).norm(),
    }
}

/// Rotation angle of `r`; atan2 of the skew part keeps small angles accurate.
fn rotation_angle_deg(r: &Matrix3<f64>) -> f64 {
    let sin = 0.5
        * Vector3::new(
            r[(2, 1)] - r[(1, 2)],
            r[(0, 2)] - r[(2, 0)],
            r[(1, 0)] - r[(0, 1)],
        )
        .norm();
    let cos = 0.5 * (r.trace() - 1.0);
    sin.atan2(cos).to_degrees()
}

/// Everything written by [`export_calibration_json`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub result: CalibrationResult,
    pub reprojection_error: Option<ProjectionError>,
    pub ground_truth_errors: Option<ParameterErrors>,
}

pub fn export_calibration_json(report: &CalibrationReport, path: &str) -> Result<(), UtilError> {
    let json = serde_json::to_string_pretty(report)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

pub fn display_calibration_result(
    result: &CalibrationResult,
    reprojection_error: Option<&ProjectionError>,
) {
    println!("\n📷 Recovered Camera Parameters:");
    println!(
        "  Intrinsics: fx={:.6}, fy={:.6}, ox={:.6}, oy={:.6}",
        result.fx(),
        result.fy(),
        result.ox(),
        result.oy()
    );
    println!(
        "  Euler angles (deg): alpha={:.6}, beta={:.6}, gamma={:.6}",
        result.euler_angles.alpha, result.euler_angles.beta, result.euler_angles.gamma
    );
    println!(
        "  Translation: [{:.6}, {:.6}, {:.6}]",
        result.translation.x, result.translation.y, result.translation.z
    );
    if result.euler_angles.is_gimbal_locked() {
        println!("  ⚠️  Gimbal lock: gamma fixed to 0, alpha absorbs the combined roll");
    }

    if let Some(error) = reprojection_error {
        println!("Reprojection Error Statistics:");
        println!("  Mean: {:.8} px", error.mean);
        println!("  RMSE: {:.8} px", error.rmse);
        println!("  Min: {:.8} px", error.min);
        println!("  Max: {:.8} px", error.max);
        println!("  Std Dev: {:.8} px", error.stddev);
        println!("  Median: {:.8} px", error.median);
    }
}

/// Prints estimated parameters side by side with the ground truth.
pub fn display_comparison(label: &str, result: &CalibrationResult, truth: &PinholeCamera) {
    let errors = compare_with_ground_truth(result, truth);
    let truth_angles = truth.euler_angles();
    let rows = [
        ("fx (px)", truth.intrinsics.fx, result.fx(), errors.fx),
        ("fy (px)", truth.intrinsics.fy, result.fy(), errors.fy),
        ("ox (px)", truth.intrinsics.cx, result.ox(), errors.ox),
        ("oy (px)", truth.intrinsics.cy, result.oy(), errors.oy),
        (
            "alpha (deg)",
            truth_angles.alpha,
            result.euler_angles.alpha,
            errors.alpha,
        ),
        (
            "beta (deg)",
            truth_angles.beta,
            result.euler_angles.beta,
            errors.beta,
        ),
        (
            "gamma (deg)",
            truth_angles.gamma,
            result.euler_angles.gamma,
            errors.gamma,
        ),
    ];

    println!("\n📋 {label}");
    println!("┌─────────────────┬─────────────────┬─────────────────┬─────────────────┐");
    println!("│ Parameter       │ Ground Truth    │ Estimated       │ Abs Error       │");
    println!("├─────────────────┼─────────────────┼─────────────────┼─────────────────┤");
    for (name, expected, estimated, error) in rows {
        println!("│ {name:<15} │ {expected:>15.6} │ {estimated:>15.6} │ {error:>15.3e} │");
    }
    println!("└─────────────────┴─────────────────┴─────────────────┴─────────────────┘");
    println!(
        "  Rotation error: {:.3e} deg, translation error: {:.3e}",
        errors.rotation_deg, errors.translation
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::calibrate;
    use crate::camera::{Intrinsics, Resolution};
    use crate::synthetic::{calibration_pattern, SyntheticScene};
    use approx::assert_relative_eq;
    use std::fs;

    fn scene() -> SyntheticScene {
        let camera = PinholeCamera::look_at(
            Intrinsics::new(800.0, 780.0, 640.0, 360.0),
            Resolution {
                width: 1280,
                height: 720,
            },
            &Vector3::new(4.0, 3.5, 3.0),
            &Vector3::new(0.5, 0.5, 0.5),
            &Vector3::new(0.0, 0.0, 1.0),
        )
        .unwrap();
        SyntheticScene::new(camera, calibration_pattern(4, 4, 0.25).unwrap())
    }

    #[test]
    fn test_csv_roundtrip() {
        let set = scene().correspondences().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let path = path.to_str().unwrap();

        save_correspondences_csv(&set, path).unwrap();
        let header = fs::read_to_string(path).unwrap();
        assert!(header.starts_with("X,Y,Z,u,v"));

        let loaded = load_correspondences_csv(path).unwrap();
        assert_eq!(loaded.len(), set.len());
        assert_relative_eq!(*loaded.points2d(), *set.points2d(), epsilon = 1e-9);
        assert_relative_eq!(*loaded.points3d(), *set.points3d(), epsilon = 1e-12);
    }

    #[test]
    fn test_load_sample_csv() {
        let set = load_correspondences_csv("samples/box_corner_correspondences.csv").unwrap();
        assert_eq!(set.len(), 32);
        let result = calibrate(&set).unwrap();
        assert_relative_eq!(result.fx(), 800.0, epsilon = 1e-3);
        assert_relative_eq!(result.fy(), 780.0, epsilon = 1e-3);
    }

    #[test]
    fn test_malformed_csv_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "X,Y,Z,u,v\n0,0,0,1,2\n1,2,oops,3,4\n").unwrap();

        match load_correspondences_csv(path.to_str().unwrap()) {
            Err(UtilError::CsvError(message)) => assert!(message.contains("row 2")),
            other => panic!("expected CsvError, got {other:?}"),
        }
    }

    #[test]
    fn test_compare_with_ground_truth() {
        let scene = scene();
        let result = calibrate(&scene.correspondences().unwrap()).unwrap();
        let errors = compare_with_ground_truth(&result, &scene.camera);

        assert!(errors.fx < 1e-6);
        assert!(errors.oy < 1e-6);
        assert!(errors.rotation_deg < 1e-6);
        assert!(errors.translation < 1e-8);
    }

    #[test]
    fn test_rotation_angle() {
        let r = crate::calibration::EulerAngles::new(0.0, 0.0, 25.0).to_rotation_matrix();
        assert_relative_eq!(rotation_angle_deg(&r), 25.0, epsilon = 1e-9);
        assert_eq!(rotation_angle_deg(&Matrix3::identity()), 0.0);
    }

    #[test]
    fn test_export_json() {
        let scene = scene();
        let set = scene.correspondences().unwrap();
        let result = calibrate(&set).unwrap();
        let report = CalibrationReport {
            reprojection_error: Some(result.reprojection_error(&set).unwrap()),
            ground_truth_errors: Some(compare_with_ground_truth(&result, &scene.camera)),
            result,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        export_calibration_json(&report, path.to_str().unwrap()).unwrap();

        let parsed: CalibrationReport =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_relative_eq!(parsed.result.fx(), report.result.fx(), epsilon = 1e-9);
        assert!(parsed.reprojection_error.is_some());
    }
}
