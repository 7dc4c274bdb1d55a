//! Homogeneous DLT system `A m = 0` for a 3x4 projection matrix.

use crate::calibration::CalibrationError;
use crate::geometry::CorrespondenceSet;
use log::debug;
use nalgebra::DMatrix;

/// Twelve unknowns up to scale, two equations per correspondence.
pub const MIN_CORRESPONDENCES: usize = 6;

/// Builds the `2N x 12` DLT matrix.
///
/// For correspondence `i` with world point `(X, Y, Z)` and image point `(u, v)`:
///
/// ```text
/// row 2i   = [X, Y, Z, 1, 0, 0, 0, 0, -uX, -uY, -uZ, -u]
/// row 2i+1 = [0, 0, 0, 0, X, Y, Z, 1, -vX, -vY, -vZ, -v]
/// ```
///
/// `m` is the row-major flattening of the projection matrix `M`.
///
/// # Errors
///
/// [`CalibrationError::InsufficientPoints`] when fewer than
/// [`MIN_CORRESPONDENCES`] pairs are supplied. Nothing is allocated in that case.
pub fn build_linear_system(
    correspondences: &CorrespondenceSet,
) -> Result<DMatrix<f64>, CalibrationError> {
    let n = correspondences.len();
    if n < MIN_CORRESPONDENCES {
        return Err(CalibrationError::InsufficientPoints {
            required: MIN_CORRESPONDENCES,
            actual: n,
        });
    }

    let mut a = DMatrix::<f64>::zeros(2 * n, 12);

    for (i, (pw, pi)) in correspondences.iter().enumerate() {
        let x = pw.x;
        let y = pw.y;
        let z = pw.z;
        let u = pi.x;
        let v = pi.y;

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = z;
        a[(r0, 3)] = 1.0;
        a[(r0, 8)] = -u * x;
        a[(r0, 9)] = -u * y;
        a[(r0, 10)] = -u * z;
        a[(r0, 11)] = -u;

        a[(r1, 4)] = x;
        a[(r1, 5)] = y;
        a[(r1, 6)] = z;
        a[(r1, 7)] = 1.0;
        a[(r1, 8)] = -v * x;
        a[(r1, 9)] = -v * y;
        a[(r1, 10)] = -v * z;
        a[(r1, 11)] = -v;
    }

    debug!("Built {}x{} DLT system", a.nrows(), a.ncols());
    Ok(a)
}
