//! Synthetic calibration data: a two-plane target seen by a known camera.
//!
//! A DLT calibration needs non-coplanar world points, so
//! [`calibration_pattern`] lays a grid on each of the planes `X = 0` and
//! `Y = 0`, like the inside corner of a calibration box. Projecting the grid
//! through a ground-truth [`PinholeCamera`] gives exact correspondences, which
//! [`add_gaussian_noise`] can then perturb reproducibly.

use crate::calibration::CalibrationError;
use crate::camera::{CameraModel, CameraModelError, PinholeCamera};
use crate::geometry::{CorrespondenceSet, ImagePoint, WorldPoint};
use log::debug;
use nalgebra::Matrix2xX;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

#[derive(thiserror::Error, Debug)]
pub enum SyntheticError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Noise standard deviation must be finite and non-negative, got {0}")]
    InvalidNoise(f64),
    #[error("Point {index} cannot be projected: {source}")]
    Projection {
        index: usize,
        source: CameraModelError,
    },
    #[error(transparent)]
    Camera(#[from] CameraModelError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

/// World points of a box-corner target.
///
/// Plane `X = 0` holds `(0, i·spacing, j·spacing)` for `i in 0..cols`, plane
/// `Y = 0` holds `(i·spacing, 0, j·spacing)` for `i in 1..=cols`, with
/// `j in 0..rows` on both. The shared edge `X = Y = 0` appears once, so the
/// pattern has `2·cols·rows` points.
///
/// # Errors
///
/// [`SyntheticError::InvalidPattern`] if `cols` or `rows` is zero, or if
/// `spacing` is not finite and positive.
pub fn calibration_pattern(
    cols: usize,
    rows: usize,
    spacing: f64,
) -> Result<Vec<WorldPoint>, SyntheticError> {
    if cols == 0 || rows == 0 {
        return Err(SyntheticError::InvalidPattern(format!(
            "grid must have at least one column and row, got {cols}x{rows}"
        )));
    }
    if !spacing.is_finite() || spacing <= 0.0 {
        return Err(SyntheticError::InvalidPattern(format!(
            "spacing must be finite and positive, got {spacing}"
        )));
    }

    let mut points = Vec::with_capacity(2 * cols * rows);
    for i in 0..cols {
        for j in 0..rows {
            points.push(WorldPoint::new(0.0, i as f64 * spacing, j as f64 * spacing));
        }
    }
    for i in 1..=cols {
        for j in 0..rows {
            points.push(WorldPoint::new(i as f64 * spacing, 0.0, j as f64 * spacing));
        }
    }
    Ok(points)
}

/// A ground-truth camera and the world points it observes.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub camera: PinholeCamera,
    pub world_points: Vec<WorldPoint>,
}

impl SyntheticScene {
    pub fn new(camera: PinholeCamera, world_points: Vec<WorldPoint>) -> Self {
        Self {
            camera,
            world_points,
        }
    }

    /// Noise-free correspondences.
    ///
    /// # Errors
    ///
    /// [`SyntheticError::Projection`] if a point is behind the camera or outside
    /// its image.
    pub fn correspondences(&self) -> Result<CorrespondenceSet, SyntheticError> {
        let image = self
            .world_points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                self.camera
                    .project(point)
                    .map_err(|source| SyntheticError::Projection { index, source })
            })
            .collect::<Result<Vec<ImagePoint>, _>>()?;
        debug!("Projected {} synthetic points", image.len());
        Ok(CorrespondenceSet::from_points(&self.world_points, &image)?)
    }
}

/// Returns a copy of `correspondences` with i.i.d. Gaussian noise of standard
/// deviation `sigma` pixels added to both image coordinates.
///
/// The same `seed` always yields the same noise.
pub fn add_gaussian_noise(
    correspondences: &CorrespondenceSet,
    sigma: f64,
    seed: u64,
) -> Result<CorrespondenceSet, SyntheticError> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(SyntheticError::InvalidNoise(sigma));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let noisy: Matrix2xX<f64> = correspondences
        .points2d()
        .map(|value| value + sigma * standard_normal(&mut rng));
    Ok(CorrespondenceSet::new(
        correspondences.points3d().clone(),
        noisy,
    )?)
}

/// Box-Muller transform.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // u1 in (0, 1] keeps the log finite.
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Intrinsics, Resolution};
    use nalgebra::Vector3;

    fn camera() -> PinholeCamera {
        PinholeCamera::look_at(
            Intrinsics::new(800.0, 780.0, 640.0, 360.0),
            Resolution {
                width: 1280,
                height: 720,
            },
            &Vector3::new(4.0, 3.5, 3.0),
            &Vector3::new(0.5, 0.5, 0.5),
            &Vector3::new(0.0, 0.0, 1.0),
        )
        .unwrap()
    }

    #[test]
    fn test_pattern_layout() {
        let points = calibration_pattern(3, 2, 0.5).unwrap();
        assert_eq!(points.len(), 12);
        assert!(points.iter().all(|p| p.x == 0.0 || p.y == 0.0));

        let on_edge = points.iter().filter(|p| p.x == 0.0 && p.y == 0.0).count();
        assert_eq!(on_edge, 2);

        let off_plane = points.iter().filter(|p| p.x > 0.0).count();
        assert_eq!(off_plane, 6);
    }

    #[test]
    fn test_pattern_rejects_invalid_grid() {
        for (cols, rows, spacing) in [
            (0, 3, 0.25),
            (3, 0, 0.25),
            (3, 3, 0.0),
            (3, 3, -0.1),
            (3, 3, f64::NAN),
            (3, 3, f64::INFINITY),
        ] {
            assert!(
                matches!(
                    calibration_pattern(cols, rows, spacing),
                    Err(SyntheticError::InvalidPattern(_))
                ),
                "{cols}x{rows} spacing {spacing} accepted"
            );
        }
    }

    #[test]
    fn test_scene_projects_every_point() {
        let scene = SyntheticScene::new(camera(), calibration_pattern(4, 4, 0.25).unwrap());
        let set = scene.correspondences().unwrap();
        assert_eq!(set.len(), 32);
        for (world, image) in set.iter() {
            let expected = scene.camera.project(&world).unwrap();
            assert_eq!(image, expected);
        }
    }

    #[test]
    fn test_point_behind_camera_is_reported() {
        let mut points = calibration_pattern(2, 2, 0.25).unwrap();
        points.push(Vector3::new(20.0, 20.0, 20.0));
        let scene = SyntheticScene::new(camera(), points);
        assert!(matches!(
            scene.correspondences(),
            Err(SyntheticError::Projection { index: 8, .. })
        ));
    }

    #[test]
    fn test_noise_is_seeded() {
        let set = SyntheticScene::new(camera(), calibration_pattern(4, 4, 0.25).unwrap())
            .correspondences()
            .unwrap();

        let a = add_gaussian_noise(&set, 0.5, 7).unwrap();
        let b = add_gaussian_noise(&set, 0.5, 7).unwrap();
        let c = add_gaussian_noise(&set, 0.5, 8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.points3d(), set.points3d());

        let diff = a.points2d() - set.points2d();
        let rms = (diff.norm_squared() / diff.len() as f64).sqrt();
        assert!(rms > 0.2 && rms < 1.0, "rms {rms}");
    }

    #[test]
    fn test_zero_noise_is_identity() {
        let set = SyntheticScene::new(camera(), calibration_pattern(3, 3, 0.3).unwrap())
            .correspondences()
            .unwrap();
        assert_eq!(add_gaussian_noise(&set, 0.0, 1).unwrap(), set);
    }

    #[test]
    fn test_rejects_negative_sigma() {
        let set = CorrespondenceSet::from_points(&[], &[]).unwrap();
        assert!(matches!(
            add_gaussian_noise(&set, -1.0, 0),
            Err(SyntheticError::InvalidNoise(_))
        ));
    }
}
