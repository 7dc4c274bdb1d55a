//! DLT Calibration Library
//!
//! Recovers the intrinsic and extrinsic parameters of a pinhole camera from
//! known 3D world points and their 2D image projections, using the Direct
//! Linear Transform:
//! - Build the homogeneous linear system and solve it through the SVD null space
//! - Decompose the projection matrix into zero-skew intrinsics and a pose
//! - Project the raw rotation onto SO(3) and report it as Euler angles
//!
//! The library also includes a synthetic box-corner scene generator with
//! seeded Gaussian pixel noise, CSV correspondence files and ground-truth
//! comparison reports.

pub mod calibration;
pub mod camera;
pub mod geometry;
pub mod synthetic;
pub mod util;

// Re-export commonly used types
pub use calibration::{
    calibrate, calibrate_from_projection, calibrate_with_config, CalibrationConfig,
    CalibrationError, CalibrationResult, EulerAngles,
};
pub use camera::{CameraModel, CameraModelError, Intrinsics, PinholeCamera, Resolution};
pub use geometry::{CorrespondenceSet, ProjectionError};
pub use synthetic::{add_gaussian_noise, calibration_pattern, SyntheticError, SyntheticScene};
