//! The `calibration` module recovers a pinhole camera from 3D-2D
//! correspondences with the Direct Linear Transform.
//!
//! The pipeline runs in strict sequence and stops at the first error:
//! 1. [`linear_system`]: build the `2N x 12` homogeneous system `A m = 0`.
//! 2. [`null_space`]: take the right singular vector of the smallest singular
//!    value as the projection matrix `M`, rejecting degenerate inputs.
//! 3. [`decompose`]: fix the sign of `M` and split it into zero-skew
//!    intrinsics `K` and a raw pose.
//! 4. [`orthogonalize`]: project the raw rotation onto SO(3).
//! 5. [`euler`]: report the rotation as fixed-axis Euler angles.
//!
//! [`calibrate`] is a pure function of its input. It holds no state between
//! calls and can be used from several threads at once.

use crate::camera::{CameraModel, CameraModelError, Intrinsics, PinholeCamera, Resolution};
use crate::geometry::{compute_reprojection_error, CorrespondenceSet, ProjectionError};
use log::{debug, info};
use nalgebra::{Matrix3, Matrix3x4, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;

pub mod decompose;
pub mod euler;
pub mod linear_system;
pub mod null_space;
pub mod orthogonalize;

pub use decompose::{decompose_projection_matrix, Decomposition};
pub use euler::EulerAngles;
pub use linear_system::{build_linear_system, MIN_CORRESPONDENCES};
pub use null_space::{solve_null_space, NullSpaceSolution};
pub use orthogonalize::orthogonalize_rotation;

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("At least {required} correspondences are required, got {actual}")]
    InsufficientPoints { required: usize, actual: usize },
    #[error("Degenerate point configuration: {0}")]
    DegenerateConfiguration(String),
    #[error("Intrinsics are not positive definite: {parameter}^2 = {radicand}")]
    NonPositiveDefiniteIntrinsic {
        parameter: &'static str,
        radicand: f64,
    },
    #[error("Mismatched correspondences: {world} world points, {image} image points")]
    MismatchedCorrespondences { world: usize, image: usize },
    #[error("Non-finite coordinate in correspondence {index}")]
    NonFiniteInput { index: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CalibrationError {
    fn from(err: std::io::Error) -> Self {
        CalibrationError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CalibrationError {
    fn from(err: serde_yaml::Error) -> Self {
        CalibrationError::YamlError(err.to_string())
    }
}

/// Thresholds and assumptions used by [`calibrate_with_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Minimum `σ_next / σ_min` of the DLT system.
    pub min_singular_ratio: f64,
    /// Relative threshold below which a singular value or a row norm counts as zero.
    pub rank_tolerance: f64,
    /// Widening of the gimbal-lock branches around `r31 = ±1`.
    pub gimbal_tolerance: f64,
    /// Externally assumed principal point `[Ox, Oy]`; computed from `M` when `None`.
    pub principal_point: Option<[f64; 2]>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_singular_ratio: 1.5,
            rank_tolerance: 1e-12,
            gimbal_tolerance: 1e-12,
            principal_point: None,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !self.min_singular_ratio.is_finite() || self.min_singular_ratio < 1.0 {
            return Err(CalibrationError::InvalidConfig(format!(
                "min_singular_ratio must be finite and >= 1, got {}",
                self.min_singular_ratio
            )));
        }
        if !self.rank_tolerance.is_finite() || self.rank_tolerance < 0.0 {
            return Err(CalibrationError::InvalidConfig(format!(
                "rank_tolerance must be finite and >= 0, got {}",
                self.rank_tolerance
            )));
        }
        if !self.gimbal_tolerance.is_finite() || !(0.0..1.0).contains(&self.gimbal_tolerance) {
            return Err(CalibrationError::InvalidConfig(format!(
                "gimbal_tolerance must lie in [0, 1), got {}",
                self.gimbal_tolerance
            )));
        }
        if let Some(pp) = self.principal_point {
            if !pp.iter().all(|v| v.is_finite()) {
                return Err(CalibrationError::InvalidConfig(
                    "principal_point must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Loads a configuration from YAML. Missing fields take their defaults.
    pub fn load_from_yaml(path: &str) -> Result<Self, CalibrationError> {
        let contents = fs::read_to_string(path)?;
        let config: CalibrationConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_yaml(&self, path: &str) -> Result<(), CalibrationError> {
        let yaml_string = serde_yaml::to_string(self)?;
        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;
        Ok(())
    }
}

/// Parameters recovered by one calibration call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub intrinsics: Intrinsics,
    /// Zero-skew calibration matrix.
    pub k: Matrix3<f64>,
    /// World-to-camera rotation, orthonormal with determinant +1.
    pub rotation: Matrix3<f64>,
    /// World-to-camera translation.
    pub translation: Vector3<f64>,
    /// Rotation as Euler angles in degrees.
    pub euler_angles: EulerAngles,
    /// Sign-corrected, unit-norm projection matrix from the null space.
    pub projection: Matrix3x4<f64>,
}

impl CalibrationResult {
    pub fn fx(&self) -> f64 {
        self.intrinsics.fx
    }

    pub fn fy(&self) -> f64 {
        self.intrinsics.fy
    }

    pub fn ox(&self) -> f64 {
        self.intrinsics.cx
    }

    pub fn oy(&self) -> f64 {
        self.intrinsics.cy
    }

    /// Reprojection statistics of `M` against `correspondences`.
    pub fn reprojection_error(
        &self,
        correspondences: &CorrespondenceSet,
    ) -> Result<ProjectionError, CameraModelError> {
        compute_reprojection_error(self, correspondences)
    }

    /// The result as a posed camera with the given image resolution.
    pub fn to_camera(&self, resolution: Resolution) -> Result<PinholeCamera, CameraModelError> {
        PinholeCamera::new(self.intrinsics, resolution, self.rotation, self.translation)
    }

    /// Writes the result as YAML in the `cam0` layout, with the rotation and
    /// projection matrix stored row-major.
    pub fn save_to_yaml(&self, path: &str) -> Result<(), CalibrationError> {
        let rotation: Vec<f64> = self.rotation.transpose().iter().copied().collect();
        let projection: Vec<f64> = self.projection.transpose().iter().copied().collect();
        let cam0 = serde_yaml::Mapping::from_iter([
            (
                serde_yaml::Value::String("camera_model".to_string()),
                serde_yaml::Value::String("pinhole".to_string()),
            ),
            (
                serde_yaml::Value::String("intrinsics".to_string()),
                serde_yaml::to_value(vec![
                    self.intrinsics.fx,
                    self.intrinsics.fy,
                    self.intrinsics.cx,
                    self.intrinsics.cy,
                ])?,
            ),
            (
                serde_yaml::Value::String("euler_angles_deg".to_string()),
                serde_yaml::to_value(vec![
                    self.euler_angles.alpha,
                    self.euler_angles.beta,
                    self.euler_angles.gamma,
                ])?,
            ),
            (
                serde_yaml::Value::String("translation".to_string()),
                serde_yaml::to_value(vec![
                    self.translation.x,
                    self.translation.y,
                    self.translation.z,
                ])?,
            ),
            (
                serde_yaml::Value::String("rotation".to_string()),
                serde_yaml::to_value(rotation)?,
            ),
            (
                serde_yaml::Value::String("projection_matrix".to_string()),
                serde_yaml::to_value(projection)?,
            ),
        ]);
        let yaml = serde_yaml::Mapping::from_iter([(
            serde_yaml::Value::String("cam0".to_string()),
            serde_yaml::Value::Mapping(cam0),
        )]);

        let yaml_string = serde_yaml::to_string(&yaml)?;
        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;
        Ok(())
    }
}

impl CameraModel for CalibrationResult {
    /// Projects through the recovered `M` directly.
    fn project(&self, point_world: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let h = self.projection * point_world.push(1.0);
        if h.z < f64::EPSILON.sqrt() * self.projection.norm() {
            return Err(CameraModelError::PointAtCameraCenter(h.z));
        }
        Ok(Vector2::new(h.x / h.z, h.y / h.z))
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        crate::camera::validation::validate_intrinsics(&self.intrinsics)?;
        crate::camera::validation::validate_rotation(&self.rotation, 1e-9)
    }
}

/// Calibrates with [`CalibrationConfig::default`].
///
/// # Examples
///
/// ```rust
/// use dlt_calibration::calibration::calibrate;
/// use dlt_calibration::camera::{Intrinsics, PinholeCamera, Resolution};
/// use dlt_calibration::synthetic::{calibration_pattern, SyntheticScene};
/// use nalgebra::Vector3;
///
/// let camera = PinholeCamera::look_at(
///     Intrinsics::new(800.0, 780.0, 640.0, 360.0),
///     Resolution { width: 1280, height: 720 },
///     &Vector3::new(4.0, 3.5, 3.0),
///     &Vector3::new(0.5, 0.5, 0.5),
///     &Vector3::new(0.0, 0.0, 1.0),
/// )
/// .unwrap();
/// let scene = SyntheticScene::new(camera, calibration_pattern(4, 4, 0.25).unwrap());
/// let correspondences = scene.correspondences().unwrap();
///
/// let result = calibrate(&correspondences).unwrap();
/// assert!((result.fx() - 800.0).abs() < 1e-4);
/// assert!((result.oy() - 360.0).abs() < 1e-4);
/// ```
pub fn calibrate(
    correspondences: &CorrespondenceSet,
) -> Result<CalibrationResult, CalibrationError> {
    calibrate_with_config(correspondences, &CalibrationConfig::default())
}

/// Runs the full DLT pipeline.
///
/// # Errors
///
/// * [`CalibrationError::InvalidConfig`] if `config` fails validation.
/// * [`CalibrationError::InsufficientPoints`] for fewer than six correspondences.
/// * [`CalibrationError::DegenerateConfiguration`] for coplanar, collinear or
///   otherwise rank-deficient correspondences.
/// * [`CalibrationError::NonPositiveDefiniteIntrinsic`] when the data does not
///   fit a zero-skew pinhole camera (or the assumed principal point is wrong).
pub fn calibrate_with_config(
    correspondences: &CorrespondenceSet,
    config: &CalibrationConfig,
) -> Result<CalibrationResult, CalibrationError> {
    config.validate()?;
    info!(
        "Calibrating from {} correspondences",
        correspondences.len()
    );

    let a = build_linear_system(correspondences)?;
    let solution = solve_null_space(&a, config)?;
    info!(
        "Null space: sigma_min = {:e}, sigma_next = {:e}, sigma_max = {:e}",
        solution.smallest_singular_value,
        solution.next_singular_value,
        solution.largest_singular_value
    );

    let result = calibrate_from_projection(&solution.projection, config)?;
    let euler_angles = result.euler_angles;
    info!(
        "Recovered fx = {:.4}, fy = {:.4}, ox = {:.4}, oy = {:.4}, angles = ({:.4}, {:.4}, {:.4}) deg",
        result.fx(),
        result.fy(),
        result.ox(),
        result.oy(),
        euler_angles.alpha,
        euler_angles.beta,
        euler_angles.gamma
    );
    Ok(result)
}

/// Recovers the camera from a known projection matrix, given up to scale and
/// sign. Runs decomposition, orthogonalization and Euler extraction, then
/// checks the result with [`CameraModel::validate_params`].
pub fn calibrate_from_projection(
    projection: &Matrix3x4<f64>,
    config: &CalibrationConfig,
) -> Result<CalibrationResult, CalibrationError> {
    let decomposition = decompose_projection_matrix(projection, config.principal_point)?;
    debug!("Projection scale rho = {:e}", decomposition.rho);
    let rotation = orthogonalize_rotation(&decomposition.rotation_raw)?;
    let euler_angles = EulerAngles::from_rotation_matrix(&rotation, config.gimbal_tolerance);

    let result = CalibrationResult {
        intrinsics: decomposition.intrinsics,
        k: decomposition.k,
        rotation,
        translation: decomposition.translation,
        euler_angles,
        // Rescaled so the result does not depend on the scale of the input.
        projection: decomposition.projection / decomposition.projection.norm(),
    };
    result
        .validate_params()
        .map_err(|e| CalibrationError::DegenerateConfiguration(e.to_string()))?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CalibrationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let bad_ratio = CalibrationConfig {
            min_singular_ratio: 0.5,
            ..Default::default()
        };
        assert!(matches!(
            bad_ratio.validate(),
            Err(CalibrationError::InvalidConfig(_))
        ));

        let bad_gimbal = CalibrationConfig {
            gimbal_tolerance: -1e-3,
            ..Default::default()
        };
        assert!(bad_gimbal.validate().is_err());

        let bad_center = CalibrationConfig {
            principal_point: Some([f64::NAN, 0.0]),
            ..Default::default()
        };
        assert!(bad_center.validate().is_err());
    }

    #[test]
    fn test_config_load_from_sample_yaml() {
        let config = CalibrationConfig::load_from_yaml("samples/calibration_config.yaml").unwrap();
        assert_eq!(config.min_singular_ratio, 1.5);
        assert_eq!(config.rank_tolerance, 1e-12);
        assert_eq!(config.gimbal_tolerance, 1e-12);
        assert_eq!(config.principal_point, None);
    }

    #[test]
    fn test_config_partial_yaml_uses_defaults() {
        let config: CalibrationConfig =
            serde_yaml::from_str("principal_point: [640.0, 360.0]\n").unwrap();
        assert_eq!(config.principal_point, Some([640.0, 360.0]));
        assert_eq!(config.min_singular_ratio, 1.5);
    }

    #[test]
    fn test_config_yaml_roundtrip() {
        let config = CalibrationConfig {
            min_singular_ratio: 3.0,
            principal_point: Some([320.0, 240.0]),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let path = path.to_str().unwrap();

        config.save_to_yaml(path).unwrap();
        assert_eq!(CalibrationConfig::load_from_yaml(path).unwrap(), config);
    }

    #[test]
    fn test_calibrate_rejects_invalid_config_before_solving() {
        let set = CorrespondenceSet::from_points(&[], &[]).unwrap();
        let config = CalibrationConfig {
            rank_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            calibrate_with_config(&set, &config),
            Err(CalibrationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_result_yaml_export() {
        let camera = PinholeCamera::from_euler_angles(
            Intrinsics::new(600.0, 610.0, 320.0, 240.0),
            Resolution {
                width: 640,
                height: 480,
            },
            &EulerAngles::new(5.0, 10.0, -20.0),
            Vector3::new(0.2, 0.1, 5.0),
        )
        .unwrap();
        let points: Vec<Vector3<f64>> = (0..12)
            .map(|i| {
                let t = i as f64;
                Vector3::new((0.7 * t).sin(), (1.1 * t).cos(), 0.1 * t - 0.5)
            })
            .collect();
        let set = crate::synthetic::SyntheticScene::new(camera, points)
            .correspondences()
            .unwrap();
        let result = calibrate(&set).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.yaml");
        result.save_to_yaml(path.to_str().unwrap()).unwrap();

        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let cam0 = &yaml["cam0"];
        assert_eq!(cam0["camera_model"].as_str(), Some("pinhole"));

        let intrinsics: Vec<f64> = serde_yaml::from_value(cam0["intrinsics"].clone()).unwrap();
        assert!((intrinsics[0] - 600.0).abs() < 1e-6);
        assert!((intrinsics[3] - 240.0).abs() < 1e-6);

        let angles: Vec<f64> = serde_yaml::from_value(cam0["euler_angles_deg"].clone()).unwrap();
        assert!((angles[2] + 20.0).abs() < 1e-6);

        let rotation: Vec<f64> = serde_yaml::from_value(cam0["rotation"].clone()).unwrap();
        assert_eq!(rotation.len(), 9);
        // Row-major: second entry is r12.
        assert_eq!(rotation[1], result.rotation[(0, 1)]);
        let projection: Vec<f64> =
            serde_yaml::from_value(cam0["projection_matrix"].clone()).unwrap();
        assert_eq!(projection[3], result.projection[(0, 3)]);
    }

    #[test]
    fn test_result_params_are_validated() {
        let camera = PinholeCamera::from_euler_angles(
            Intrinsics::new(600.0, 610.0, 320.0, 240.0),
            Resolution {
                width: 640,
                height: 480,
            },
            &EulerAngles::new(5.0, 10.0, -20.0),
            Vector3::new(0.2, 0.1, 5.0),
        )
        .unwrap();
        let result =
            calibrate_from_projection(&camera.projection_matrix(), &CalibrationConfig::default())
                .unwrap();
        assert!(result.validate_params().is_ok());

        let mut scaled = result.clone();
        scaled.rotation *= 2.0;
        assert!(matches!(
            scaled.validate_params(),
            Err(CameraModelError::InvalidRotation(_))
        ));

        let mut reflected = result.clone();
        reflected.rotation.column_mut(2).neg_mut();
        assert!(matches!(
            reflected.validate_params(),
            Err(CameraModelError::InvalidRotation(_))
        ));

        let mut unfocused = result;
        unfocused.intrinsics.fy = 0.0;
        assert!(matches!(
            unfocused.validate_params(),
            Err(CameraModelError::FocalLengthMustBePositive)
        ));
    }

    #[test]
    fn test_calibrate_empty_set_is_insufficient() {
        let set = CorrespondenceSet::from_points(&[], &[]).unwrap();
        assert!(matches!(
            calibrate(&set),
            Err(CalibrationError::InsufficientPoints {
                required: 6,
                actual: 0
            })
        ));
    }
}
