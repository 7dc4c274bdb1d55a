//! Euler angle extraction from an orthonormal rotation.
//!
//! Angles are reported in degrees as `(alpha, beta, gamma)`: rotations about
//! the fixed X, Y and Z axes applied in that order, so that
//! `R = Rz(gamma) · Ry(beta) · Rx(alpha)`.
//!
//! When `|r31| = 1` the decomposition loses a degree of freedom (gimbal lock).
//! In that case `gamma` is reported as zero and the remaining rotation is
//! folded into `alpha`.

use log::warn;
use nalgebra::{Matrix3, Rotation3};
use serde::{Deserialize, Serialize};

/// Rotation angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    /// Rotation about the X axis.
    pub alpha: f64,
    /// Rotation about the Y axis.
    pub beta: f64,
    /// Rotation about the Z axis.
    pub gamma: f64,
}

impl EulerAngles {
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self { alpha, beta, gamma }
    }

    /// Extracts angles from an orthonormal rotation matrix.
    ///
    /// `gimbal_tolerance` widens the singular branches: `r31 <= -1 + tol`
    /// selects `beta = +90°` and `r31 >= 1 - tol` selects `beta = -90°`.
    /// A tolerance of zero keeps the exact comparison against ±1.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dlt_calibration::calibration::euler::EulerAngles;
    ///
    /// let angles = EulerAngles::new(10.0, -20.0, 30.0);
    /// let r = angles.to_rotation_matrix();
    /// let recovered = EulerAngles::from_rotation_matrix(&r, 0.0);
    /// assert!((recovered.alpha - 10.0).abs() < 1e-9);
    /// assert!((recovered.beta + 20.0).abs() < 1e-9);
    /// assert!((recovered.gamma - 30.0).abs() < 1e-9);
    /// ```
    pub fn from_rotation_matrix(r: &Matrix3<f64>, gimbal_tolerance: f64) -> Self {
        let r31 = r[(2, 0)];
        let tolerance = gimbal_tolerance.max(0.0);

        if r31 <= -1.0 + tolerance {
            if r31 > -1.0 {
                warn!("r31 = {r31} is within {tolerance:e} of -1, using the gimbal-lock branch");
            }
            let alpha = -(-r[(1, 2)]).atan2(r[(1, 1)]);
            return Self::new(alpha.to_degrees(), 90.0, 0.0);
        }

        if r31 >= 1.0 - tolerance {
            if r31 < 1.0 {
                warn!("r31 = {r31} is within {tolerance:e} of +1, using the gimbal-lock branch");
            }
            let alpha = (-r[(1, 2)]).atan2(r[(1, 1)]);
            return Self::new(alpha.to_degrees(), -90.0, 0.0);
        }

        let beta = (-r31).asin();
        let cos_beta = beta.cos();
        let alpha = (r[(2, 1)] / cos_beta).atan2(r[(2, 2)] / cos_beta);
        let gamma = (r[(1, 0)] / cos_beta).atan2(r[(0, 0)] / cos_beta);

        Self::new(alpha.to_degrees(), beta.to_degrees(), gamma.to_degrees())
    }

    /// Recomposes `Rz(gamma) · Ry(beta) · Rx(alpha)`.
    pub fn to_rotation_matrix(&self) -> Matrix3<f64> {
        Rotation3::from_euler_angles(
            self.alpha.to_radians(),
            self.beta.to_radians(),
            self.gamma.to_radians(),
        )
        .into_inner()
    }

    /// Whether the angles sit on the gimbal-lock singularity.
    pub fn is_gimbal_locked(&self) -> bool {
        self.beta.abs() == 90.0
    }
}

impl Default for EulerAngles {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rx(deg: f64) -> Matrix3<f64> {
        let (s, c) = deg.to_radians().sin_cos();
        Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
    }

    fn ry(deg: f64) -> Matrix3<f64> {
        let (s, c) = deg.to_radians().sin_cos();
        Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
    }

    fn rz(deg: f64) -> Matrix3<f64> {
        let (s, c) = deg.to_radians().sin_cos();
        Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn test_regular_branch_recovers_angles() {
        for &(alpha, beta, gamma) in &[
            (10.0, -5.0, 15.0),
            (-131.0, 36.0, 20.0),
            (170.0, 80.0, -175.0),
            (0.0, 0.0, 0.0),
        ] {
            let r = rz(gamma) * ry(beta) * rx(alpha);
            let angles = EulerAngles::from_rotation_matrix(&r, 0.0);
            assert_relative_eq!(angles.alpha, alpha, epsilon = 1e-9);
            assert_relative_eq!(angles.beta, beta, epsilon = 1e-9);
            assert_relative_eq!(angles.gamma, gamma, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_to_rotation_matrix_matches_fixed_axis_order() {
        let angles = EulerAngles::new(25.0, -40.0, 60.0);
        let expected = rz(60.0) * ry(-40.0) * rx(25.0);
        assert_relative_eq!(angles.to_rotation_matrix(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_gimbal_lock_positive_beta_exact() {
        // r31 == -1 exactly.
        let r = Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0);
        let angles = EulerAngles::from_rotation_matrix(&r, 0.0);

        assert_eq!(angles.beta, 90.0);
        assert_eq!(angles.gamma, 0.0);
        assert!(angles.alpha.is_finite());
        assert_relative_eq!(angles.alpha, 0.0, epsilon = 1e-12);
        assert!(angles.is_gimbal_locked());
    }

    #[test]
    fn test_gimbal_lock_positive_beta_folds_alpha_with_mirrored_sign() {
        // Ry(90) · Rx(30) with r31 forced to exactly -1.
        let mut r = ry(90.0) * rx(30.0);
        r[(2, 0)] = -1.0;
        let angles = EulerAngles::from_rotation_matrix(&r, 0.0);

        assert_eq!(angles.beta, 90.0);
        assert_eq!(angles.gamma, 0.0);
        assert_relative_eq!(angles.alpha, -30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gimbal_lock_negative_beta() {
        let mut r = ry(-90.0) * rx(40.0);
        r[(2, 0)] = 1.0;
        let angles = EulerAngles::from_rotation_matrix(&r, 0.0);

        assert_eq!(angles.beta, -90.0);
        assert_eq!(angles.gamma, 0.0);
        assert_relative_eq!(angles.alpha, 40.0, epsilon = 1e-9);
        assert_relative_eq!(angles.to_rotation_matrix(), r, epsilon = 1e-9);
    }

    #[test]
    fn test_gimbal_tolerance_routes_near_singular_rotation() {
        let r = ry(90.0 - 1e-4) * rx(10.0);
        assert!(r[(2, 0)] > -1.0);

        let exact = EulerAngles::from_rotation_matrix(&r, 0.0);
        assert!(!exact.is_gimbal_locked());
        assert!(exact.alpha.is_finite() && exact.gamma.is_finite());

        let widened = EulerAngles::from_rotation_matrix(&r, 1e-9);
        assert!(widened.is_gimbal_locked());
        assert_eq!(widened.gamma, 0.0);
    }

    #[test]
    fn test_out_of_range_r31_never_produces_nan() {
        let mut r = Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0, 0.0, 0.0);
        r[(2, 0)] = -1.0 - 1e-15;
        let angles = EulerAngles::from_rotation_matrix(&r, 0.0);
        assert!(angles.alpha.is_finite());
        assert!(angles.beta.is_finite());
        assert!(angles.gamma.is_finite());
    }
}
