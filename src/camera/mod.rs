//! Camera model types shared by the calibration engine and its callers.
//!
//! The [`pinhole`] submodule holds the full pinhole camera (intrinsics plus
//! world-to-camera pose) used as ground truth for synthetic experiments and as
//! the exported form of a calibration result.

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

pub mod pinhole;

pub use pinhole::PinholeCamera;

/// Zero-skew pinhole intrinsics in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Upper-triangular calibration matrix `K` with zero skew.
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    #[error("Projection is outside the image")]
    ProjectionOutSideImage,
    #[error("Point is at or behind the camera center (depth {0})")]
    PointAtCameraCenter(f64),
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Rotation is not orthonormal with determinant +1: {0}")]
    InvalidRotation(String),
    #[error("Zero projection points")]
    ZeroProjectionPoints,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for CameraModelError {
    fn from(err: yaml_rust::ScanError) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CameraModelError {
    fn from(err: serde_yaml::Error) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

/// Anything that maps world points to pixels.
///
/// Implemented by the ground-truth [`PinholeCamera`] and by
/// [`crate::calibration::CalibrationResult`], so reprojection statistics can be
/// computed the same way for both.
pub trait CameraModel {
    /// Project a 3D world point to 2D pixel coordinates.
    fn project(&self, point_world: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Validate the model parameters.
    fn validate_params(&self) -> Result<(), CameraModelError>;
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraModelError> {
        if intrinsics.fx.is_nan()
            || intrinsics.fy.is_nan()
            || intrinsics.fx <= 0.0
            || intrinsics.fy <= 0.0
        {
            return Err(CameraModelError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraModelError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }

    /// Checks `RᵗR = I` and `det(R) = +1` within `tolerance`.
    pub fn validate_rotation(
        rotation: &Matrix3<f64>,
        tolerance: f64,
    ) -> Result<(), CameraModelError> {
        let orthogonality = (rotation.transpose() * rotation - Matrix3::identity()).norm();
        if orthogonality.is_nan() || orthogonality > tolerance {
            return Err(CameraModelError::InvalidRotation(format!(
                "|R^T R - I| = {orthogonality:e}"
            )));
        }
        let det = rotation.determinant();
        if det.is_nan() || (det - 1.0).abs() > tolerance {
            return Err(CameraModelError::InvalidRotation(format!("det(R) = {det}")));
        }
        Ok(())
    }
}
