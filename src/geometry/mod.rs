//! Point correspondences and reprojection statistics.

use crate::calibration::CalibrationError;
use crate::camera::{CameraModel, CameraModelError};
use log::warn;
use nalgebra::{Matrix2xX, Matrix3xX, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// World point `(X, Y, Z)`.
pub type WorldPoint = Vector3<f64>;
/// Image point `(u, v)` in pixels.
pub type ImagePoint = Vector2<f64>;

/// Index-aligned world/image point pairs.
///
/// Each column of `points3d` corresponds to the same column of `points2d`.
/// The set may hold any number of pairs; the minimum needed for calibration is
/// checked by the calibration pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrespondenceSet {
    points3d: Matrix3xX<f64>,
    points2d: Matrix2xX<f64>,
}

impl CorrespondenceSet {
    /// # Errors
    ///
    /// * [`CalibrationError::MismatchedCorrespondences`] if the column counts differ.
    /// * [`CalibrationError::NonFiniteInput`] if any coordinate is NaN or infinite.
    pub fn new(
        points3d: Matrix3xX<f64>,
        points2d: Matrix2xX<f64>,
    ) -> Result<Self, CalibrationError> {
        if points3d.ncols() != points2d.ncols() {
            return Err(CalibrationError::MismatchedCorrespondences {
                world: points3d.ncols(),
                image: points2d.ncols(),
            });
        }
        for i in 0..points3d.ncols() {
            let finite = points3d.column(i).iter().all(|v| v.is_finite())
                && points2d.column(i).iter().all(|v| v.is_finite());
            if !finite {
                return Err(CalibrationError::NonFiniteInput { index: i });
            }
        }
        Ok(Self { points3d, points2d })
    }

    /// Builds a set from two slices of points.
    pub fn from_points(
        world: &[WorldPoint],
        image: &[ImagePoint],
    ) -> Result<Self, CalibrationError> {
        Self::new(
            Matrix3xX::from_iterator(world.len(), world.iter().flat_map(|p| p.iter().copied())),
            Matrix2xX::from_iterator(image.len(), image.iter().flat_map(|p| p.iter().copied())),
        )
    }

    pub fn len(&self) -> usize {
        self.points3d.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// World points, one per column.
    pub fn points3d(&self) -> &Matrix3xX<f64> {
        &self.points3d
    }

    /// Image points, one per column.
    pub fn points2d(&self) -> &Matrix2xX<f64> {
        &self.points2d
    }

    pub fn iter(&self) -> impl Iterator<Item = (WorldPoint, ImagePoint)> + '_ {
        self.points3d
            .column_iter()
            .zip(self.points2d.column_iter())
            .map(|(pw, pi)| (pw.into_owned(), pi.into_owned()))
    }

    /// Same world points with every image point shifted by `(dx, dy)` pixels.
    pub fn with_image_offset(&self, dx: f64, dy: f64) -> Self {
        let mut points2d = self.points2d.clone();
        for mut column in points2d.column_iter_mut() {
            column[0] += dx;
            column[1] += dy;
        }
        Self {
            points3d: self.points3d.clone(),
            points2d,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProjectionError {
    pub rmse: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub median: f64,
}

impl fmt::Debug for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Projection Error [ rmse: {}, min: {}, max: {}, mean: {}, stddev: {}, median: {} ]",
            self.rmse, self.min, self.max, self.mean, self.stddev, self.median
        )
    }
}

/// Reprojection error statistics of `camera_model` over `correspondences`.
///
/// Points the model cannot project are skipped with a warning.
///
/// # Errors
///
/// [`CameraModelError::ZeroProjectionPoints`] if no point could be projected.
pub fn compute_reprojection_error<T>(
    camera_model: &T,
    correspondences: &CorrespondenceSet,
) -> Result<ProjectionError, CameraModelError>
where
    T: ?Sized + CameraModel,
{
    let mut errors = vec![];
    for (i, (point3d, point2d)) in correspondences.iter().enumerate() {
        match camera_model.project(&point3d) {
            Ok(point2d_projected) => errors.push((point2d_projected - point2d).norm()),
            Err(err) => warn!("Projection failed for point {i}: {err}"),
        }
    }

    if errors.is_empty() {
        return Err(CameraModelError::ZeroProjectionPoints);
    }

    let n = errors.len() as f64;
    let mean = errors.iter().sum::<f64>() / n;
    let variance = errors.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let rmse = (errors.iter().map(|x| x.powi(2)).sum::<f64>() / n).sqrt();

    let min = errors.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = errors.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    let mut sorted_errors = errors;
    sorted_errors.sort_by(f64::total_cmp);
    let mid = sorted_errors.len() / 2;
    let median = if sorted_errors.len() % 2 == 0 {
        (sorted_errors[mid - 1] + sorted_errors[mid]) / 2.0
    } else {
        sorted_errors[mid]
    };

    Ok(ProjectionError {
        rmse,
        min,
        max,
        mean,
        stddev,
        median,
    })
}
