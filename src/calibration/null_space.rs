//! Least-squares null vector of the DLT system via SVD.

use crate::calibration::{CalibrationConfig, CalibrationError};
use log::{debug, warn};
use nalgebra::{DMatrix, Matrix3x4};

/// Projection matrix recovered from the null space, with the singular values
/// that decided whether it is trustworthy.
#[derive(Debug, Clone)]
pub struct NullSpaceSolution {
    /// Unit Frobenius-norm projection matrix, sign not yet fixed.
    pub projection: Matrix3x4<f64>,
    /// Smallest singular value of `A`, i.e. `|A m|` for the returned `m`.
    pub smallest_singular_value: f64,
    /// Second-smallest singular value of `A`.
    pub next_singular_value: f64,
    /// Largest singular value of `A`.
    pub largest_singular_value: f64,
}

impl NullSpaceSolution {
    /// `σ_next / σ_min`; infinite when the system is solved exactly.
    pub fn separation_ratio(&self) -> f64 {
        if self.smallest_singular_value > 0.0 {
            self.next_singular_value / self.smallest_singular_value
        } else {
            f64::INFINITY
        }
    }
}

/// Extracts the right singular vector of `a` for its smallest singular value
/// and reshapes it row-major into a 3x4 matrix.
///
/// # Errors
///
/// [`CalibrationError::DegenerateConfiguration`] when
/// * `a` has fewer rows than columns or the SVD cannot produce `Vᵗ`,
/// * the second-smallest singular value is numerically zero relative to the
///   largest (`rank_tolerance`), meaning the null space is not one-dimensional,
/// * `σ_next / σ_min` is below `min_singular_ratio`,
/// * the third row of the left 3x3 block of `M` is numerically zero.
///
/// The ratio test only compares the two smallest singular values. Points that
/// lie close to one plane, with pixel noise on top, can still pass it and give
/// meaningless intrinsics. Use a target that spans three dimensions, or raise
/// `min_singular_ratio` when the geometry is marginal.
pub fn solve_null_space(
    a: &DMatrix<f64>,
    config: &CalibrationConfig,
) -> Result<NullSpaceSolution, CalibrationError> {
    if a.ncols() != 12 || a.nrows() < a.ncols() {
        return Err(CalibrationError::DegenerateConfiguration(format!(
            "DLT system must be at least 12x12, got {}x{}",
            a.nrows(),
            a.ncols()
        )));
    }

    let svd = a.clone().svd(false, true);
    let v_t = svd.v_t.ok_or_else(|| {
        CalibrationError::DegenerateConfiguration("SVD did not produce V^T".to_string())
    })?;
    let singular_values = svd.singular_values;

    // Order is not relied upon; pick the two smallest explicitly.
    let mut order: Vec<usize> = (0..singular_values.len()).collect();
    order.sort_by(|&i, &j| singular_values[i].total_cmp(&singular_values[j]));
    let min_index = order[0];
    let smallest = singular_values[order[0]];
    let next = singular_values[order[1]];
    let largest = singular_values[order[order.len() - 1]];

    debug!("DLT singular values: {}", singular_values.transpose());

    if largest.is_nan() || largest <= 0.0 || next <= config.rank_tolerance * largest {
        return Err(CalibrationError::DegenerateConfiguration(format!(
            "null space is not one-dimensional: sigma_next = {next:e}, sigma_max = {largest:e}"
        )));
    }

    let solution = NullSpaceSolution {
        projection: mat34_from_svd_row(&v_t, min_index),
        smallest_singular_value: smallest,
        next_singular_value: next,
        largest_singular_value: largest,
    };

    let ratio = solution.separation_ratio();
    if ratio < config.min_singular_ratio {
        return Err(CalibrationError::DegenerateConfiguration(format!(
            "smallest singular values not separated: sigma_min = {smallest:e}, sigma_next = {next:e}, ratio = {ratio:.3} < {}",
            config.min_singular_ratio
        )));
    }
    if ratio < 2.0 * config.min_singular_ratio {
        warn!("Weakly separated null space: sigma_next / sigma_min = {ratio:.3}");
    }

    let m = &solution.projection;
    let third_row = m.fixed_view::<1, 3>(2, 0).norm();
    if third_row <= config.rank_tolerance * m.norm() {
        return Err(CalibrationError::DegenerateConfiguration(format!(
            "third row of M3 is numerically zero (norm {third_row:e})"
        )));
    }

    Ok(solution)
}

/// Reshapes row `row` of `Vᵗ` into a 3x4 matrix, row-major.
fn mat34_from_svd_row(v_t: &DMatrix<f64>, row: usize) -> Matrix3x4<f64> {
    let mut m = Matrix3x4::zeros();
    for r in 0..3 {
        for c in 0..4 {
            m[(r, c)] = v_t[(row, 4 * r + c)];
        }
    }
    m
}
