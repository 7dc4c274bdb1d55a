//! Splits a projection matrix into zero-skew intrinsics and a raw pose.
//!
//! With `M = [M3 | m4]` and `q1, q2, q3` the rows of `M3`, a pinhole camera
//! satisfies `M3 = ρ K R` with `|q3| = ρ`. Dividing by `ρ` and using the
//! orthonormality of the rows of `R` gives closed forms for the principal
//! point and focal lengths:
//!
//! ```text
//! Ox = q1·q3 / ρ²          Fx = sqrt(q1·q1 / ρ² - Ox²)
//! Oy = q2·q3 / ρ²          Fy = sqrt(q2·q2 / ρ² - Oy²)
//! ```
//!
//! The pose follows as `R_raw = K⁻¹ M3 / ρ` and `T = K⁻¹ m4 / ρ`. `R_raw` is
//! only approximately orthonormal; see [`crate::calibration::orthogonalize`].

use crate::calibration::CalibrationError;
use crate::camera::Intrinsics;
use log::debug;
use nalgebra::{Matrix3, Matrix3x4, Vector3};

/// Output of [`decompose_projection_matrix`].
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub intrinsics: Intrinsics,
    /// Zero-skew calibration matrix built from `intrinsics`.
    pub k: Matrix3<f64>,
    /// `K⁻¹ M3 / ρ`, not yet orthonormalised.
    pub rotation_raw: Matrix3<f64>,
    pub translation: Vector3<f64>,
    /// Input matrix after sign correction, so that `M[3,4] / ρ >= 0`.
    pub projection: Matrix3x4<f64>,
    /// Norm of the third row of `M3`.
    pub rho: f64,
}

/// Decomposes `m` into intrinsics and a raw world-to-camera pose.
///
/// The sign of `M` is arbitrary after the null-space solve, so `M` is negated
/// when `M[3,4] / ρ < 0`; the camera is assumed to see the world origin at
/// positive depth.
///
/// When `principal_point` is given it replaces the computed `(Ox, Oy)` in the
/// focal length radicands and in `K`.
///
/// # Errors
///
/// * [`CalibrationError::DegenerateConfiguration`] if the third row of `M3` is zero.
/// * [`CalibrationError::NonPositiveDefiniteIntrinsic`] if a focal-length
///   radicand is negative, or zero so that `K` has no inverse. The offending
///   radicand is reported as computed.
pub fn decompose_projection_matrix(
    m: &Matrix3x4<f64>,
    principal_point: Option<[f64; 2]>,
) -> Result<Decomposition, CalibrationError> {
    let mut m = *m;
    let mut rho = m.fixed_view::<1, 3>(2, 0).norm();
    if !rho.is_finite() || rho <= 0.0 {
        return Err(CalibrationError::DegenerateConfiguration(format!(
            "third row of M3 has norm {rho}"
        )));
    }

    if m[(2, 3)] / rho < 0.0 {
        m = -m;
        rho = m.fixed_view::<1, 3>(2, 0).norm();
    }

    let q1 = m.fixed_view::<1, 3>(0, 0).transpose();
    let q2 = m.fixed_view::<1, 3>(1, 0).transpose();
    let q3 = m.fixed_view::<1, 3>(2, 0).transpose();
    let rho2 = rho * rho;

    let (ox, oy) = match principal_point {
        Some([ox, oy]) => (ox, oy),
        None => (q1.dot(&q3) / rho2, q2.dot(&q3) / rho2),
    };

    let fy_radicand = q2.dot(&q2) / rho2 - oy * oy;
    let fx_radicand = q1.dot(&q1) / rho2 - ox * ox;
    debug!("Focal radicands: fx^2 = {fx_radicand}, fy^2 = {fy_radicand}");

    let fy = focal_length("fy", fy_radicand)?;
    let fx = focal_length("fx", fx_radicand)?;

    let intrinsics = Intrinsics::new(fx, fy, ox, oy);
    let k = intrinsics.k_matrix();
    let k_inv = k
        .try_inverse()
        .ok_or_else(|| CalibrationError::NonPositiveDefiniteIntrinsic {
            parameter: "K",
            radicand: fx_radicand.min(fy_radicand),
        })?;

    let m3 = m.fixed_view::<3, 3>(0, 0).into_owned();
    let m4 = m.column(3).into_owned();
    let rotation_raw = k_inv * m3 / rho;
    let translation = k_inv * m4 / rho;

    Ok(Decomposition {
        intrinsics,
        k,
        rotation_raw,
        translation,
        projection: m,
        rho,
    })
}

fn focal_length(parameter: &'static str, radicand: f64) -> Result<f64, CalibrationError> {
    if radicand.is_nan() || radicand <= 0.0 {
        return Err(CalibrationError::NonPositiveDefiniteIntrinsic {
            parameter,
            radicand,
        });
    }
    Ok(radicand.sqrt())
}
