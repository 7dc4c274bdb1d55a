//! Nearest rotation to a raw 3x3 estimate (orthogonal Procrustes).

use crate::calibration::CalibrationError;
use log::warn;
use nalgebra::Matrix3;

/// Returns `U Vᵗ` from the SVD `R_raw = U Σ Vᵗ`, the orthonormal matrix
/// closest to `r_raw` in Frobenius norm.
///
/// If `U Vᵗ` is a reflection the last column of `U` is negated, so the result
/// always has determinant +1. Rank-deficient input still yields a rotation,
/// though not a unique one.
pub fn orthogonalize_rotation(r_raw: &Matrix3<f64>) -> Result<Matrix3<f64>, CalibrationError> {
    let svd = r_raw.svd(true, true);
    let missing = || {
        CalibrationError::DegenerateConfiguration(
            "SVD of the raw rotation did not produce U/V^T".to_string(),
        )
    };
    let mut u = svd.u.ok_or_else(missing)?;
    let v_t = svd.v_t.ok_or_else(missing)?;

    if (u * v_t).determinant() < 0.0 {
        warn!("Raw rotation is closer to a reflection, flipping the last singular vector");
        u.column_mut(2).neg_mut();
    }

    Ok(u * v_t)
}
