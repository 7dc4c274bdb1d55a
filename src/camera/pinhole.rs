//! Implements the posed pinhole camera.
//!
//! This module provides the [`PinholeCamera`] struct: zero-skew intrinsics, an
//! image resolution and the world-to-camera transform `X_c = R X_w + T`. It is
//! the ground truth that synthetic correspondences are projected through, and
//! the form a [`crate::calibration::CalibrationResult`] is exported to.
//! It adheres to the [`CameraModel`] trait defined in [`crate::camera`].

use crate::calibration::euler::EulerAngles;
use crate::camera::{validation, CameraModel, CameraModelError, Intrinsics, Resolution};
use nalgebra::{Matrix3, Matrix3x4, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use yaml_rust::{Yaml, YamlLoader};

/// Tolerance used when validating the rotation of a camera.
const ROTATION_TOLERANCE: f64 = 1e-6;

/// Represents a pinhole camera with a pose.
///
/// # Examples
///
/// ```rust
/// use nalgebra::{Matrix3, Vector3};
/// use dlt_calibration::camera::{CameraModel, Intrinsics, PinholeCamera, Resolution};
///
/// let camera = PinholeCamera::new(
///     Intrinsics::new(500.0, 500.0, 320.0, 240.0),
///     Resolution { width: 640, height: 480 },
///     Matrix3::identity(),
///     Vector3::new(0.0, 0.0, 2.0),
/// )
/// .unwrap();
///
/// // World point (0.2, 0.4, 0.0) lands at depth 2.0 in the camera frame.
/// let uv = camera.project(&Vector3::new(0.2, 0.4, 0.0)).unwrap();
/// assert!((uv.x - 370.0).abs() < 1e-9);
/// assert!((uv.y - 340.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    /// The intrinsic parameters of the camera, [`Intrinsics`] (fx, fy, cx, cy).
    pub intrinsics: Intrinsics,
    /// The resolution of the camera image. A 0x0 resolution disables the
    /// image-bounds check in [`CameraModel::project`].
    pub resolution: Resolution,
    /// World-to-camera rotation `R`.
    pub rotation: Matrix3<f64>,
    /// World-to-camera translation `T`, in world units.
    pub translation: Vector3<f64>,
}

impl PinholeCamera {
    /// Creates a new [`PinholeCamera`] and validates it.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::FocalLengthMustBePositive`]
    /// * [`CameraModelError::PrincipalPointMustBeFinite`]
    /// * [`CameraModelError::InvalidRotation`] if `rotation` is not a proper rotation.
    /// * [`CameraModelError::InvalidParams`] if `translation` is not finite.
    pub fn new(
        intrinsics: Intrinsics,
        resolution: Resolution,
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
    ) -> Result<Self, CameraModelError> {
        let camera = PinholeCamera {
            intrinsics,
            resolution,
            rotation,
            translation,
        };
        camera.validate_params()?;
        Ok(camera)
    }

    /// Creates a camera whose rotation is given as Euler angles in degrees.
    pub fn from_euler_angles(
        intrinsics: Intrinsics,
        resolution: Resolution,
        angles: &EulerAngles,
        translation: Vector3<f64>,
    ) -> Result<Self, CameraModelError> {
        Self::new(
            intrinsics,
            resolution,
            angles.to_rotation_matrix(),
            translation,
        )
    }

    /// Creates a camera at `eye` whose optical axis points at `target`.
    ///
    /// The image x axis is `forward × up` and the image y axis points "down",
    /// so `up` should not be parallel to the viewing direction.
    pub fn look_at(
        intrinsics: Intrinsics,
        resolution: Resolution,
        eye: &Vector3<f64>,
        target: &Vector3<f64>,
        up: &Vector3<f64>,
    ) -> Result<Self, CameraModelError> {
        let forward = target - eye;
        let right = forward.cross(up);
        if forward.norm() < f64::EPSILON || right.norm() < f64::EPSILON {
            return Err(CameraModelError::InvalidParams(
                "look_at requires distinct eye/target and an up vector not parallel to the view"
                    .to_string(),
            ));
        }
        let z = forward.normalize();
        let x = right.normalize();
        let y = z.cross(&x);

        let rotation = Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]);
        let translation = -(rotation * eye);
        Self::new(intrinsics, resolution, rotation, translation)
    }

    /// Rotation expressed as Euler angles in degrees.
    pub fn euler_angles(&self) -> EulerAngles {
        EulerAngles::from_rotation_matrix(&self.rotation, 0.0)
    }

    /// Projection matrix `M = K [R | T]`.
    pub fn projection_matrix(&self) -> Matrix3x4<f64> {
        let k = self.intrinsics.k_matrix();
        let mut m = Matrix3x4::zeros();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(k * self.rotation));
        m.set_column(3, &(k * self.translation));
        m
    }

    /// Transforms a world point into the camera frame.
    pub fn world_to_camera(&self, point_world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point_world + self.translation
    }

    /// Camera center in world coordinates, `C = -Rᵗ T`.
    pub fn center(&self) -> Vector3<f64> {
        -(self.rotation.transpose() * self.translation)
    }

    /// Loads camera parameters from a YAML file.
    ///
    /// Expected layout:
    ///
    /// ```yaml
    /// cam0:
    ///   camera_model: pinhole
    ///   intrinsics: [fx, fy, cx, cy]
    ///   resolution: [width, height]
    ///   euler_angles_deg: [alpha, beta, gamma]
    ///   translation: [tx, ty, tz]
    /// ```
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::IOError`]: If there's an issue reading the file.
    /// * [`CameraModelError::YamlError`]: If the YAML content is malformed.
    /// * [`CameraModelError::InvalidParams`]: If an expected field is missing
    ///   or has the wrong type.
    /// * Errors from `validate_params` if the loaded parameters are invalid.
    pub fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        let contents = fs::read_to_string(path)?;
        let docs = YamlLoader::load_from_str(&contents)?;
        let doc = docs
            .first()
            .ok_or_else(|| CameraModelError::YamlError("empty YAML document".to_string()))?;
        let cam = &doc["cam0"];

        let intrinsics = read_f64_array::<4>(cam, "intrinsics")?;
        let resolution_yaml = cam["resolution"].as_vec().ok_or_else(|| {
            CameraModelError::InvalidParams("YAML missing 'resolution' or not an array".to_string())
        })?;
        if resolution_yaml.len() != 2 {
            return Err(CameraModelError::InvalidParams(
                "'resolution' must have 2 entries".to_string(),
            ));
        }
        let angles = read_f64_array::<3>(cam, "euler_angles_deg")?;
        let translation = read_f64_array::<3>(cam, "translation")?;

        let resolution = Resolution {
            width: resolution_yaml[0].as_i64().ok_or_else(|| {
                CameraModelError::InvalidParams("Invalid width: not an integer".to_string())
            })? as u32,
            height: resolution_yaml[1].as_i64().ok_or_else(|| {
                CameraModelError::InvalidParams("Invalid height: not an integer".to_string())
            })? as u32,
        };

        Self::from_euler_angles(
            Intrinsics::new(intrinsics[0], intrinsics[1], intrinsics[2], intrinsics[3]),
            resolution,
            &EulerAngles::new(angles[0], angles[1], angles[2]),
            Vector3::new(translation[0], translation[1], translation[2]),
        )
    }

    /// Saves the camera to a YAML file in the layout read by
    /// [`PinholeCamera::load_from_yaml`].
    pub fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError> {
        let angles = self.euler_angles();
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
                serde_yaml::Value::String("resolution".to_string()),
                serde_yaml::to_value(vec![self.resolution.width, self.resolution.height])?,
            ),
            (
                serde_yaml::Value::String("euler_angles_deg".to_string()),
                serde_yaml::to_value(vec![angles.alpha, angles.beta, angles.gamma])?,
            ),
            (
                serde_yaml::Value::String("translation".to_string()),
                serde_yaml::to_value(vec![
                    self.translation.x,
                    self.translation.y,
                    self.translation.z,
                ])?,
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

fn read_f64_array<const N: usize>(cam: &Yaml, key: &str) -> Result<[f64; N], CameraModelError> {
    let values = cam[key].as_vec().ok_or_else(|| {
        CameraModelError::InvalidParams(format!("YAML missing '{key}' or not an array"))
    })?;
    if values.len() != N {
        return Err(CameraModelError::InvalidParams(format!(
            "'{key}' must have {N} entries, found {}",
            values.len()
        )));
    }
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(values) {
        // Integers in YAML (e.g. `0`) are accepted as floats.
        *slot = value
            .as_f64()
            .or_else(|| value.as_i64().map(|v| v as f64))
            .ok_or_else(|| {
                CameraModelError::InvalidParams(format!("Invalid '{key}' entry: not a number"))
            })?;
    }
    Ok(out)
}

impl CameraModel for PinholeCamera {
    /// Projects a world point to pixel coordinates.
    ///
    /// `X_c = R X_w + T`, then `u = fx * x_c / z_c + cx`, `v = fy * y_c / z_c + cy`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::PointAtCameraCenter`]: If the point's depth is too close to zero or negative.
    /// * [`CameraModelError::ProjectionOutSideImage`]: If the resolution is set and the
    ///   projected point falls outside it.
    fn project(&self, point_world: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let point_camera = self.world_to_camera(point_world);
        if point_camera.z < f64::EPSILON.sqrt() {
            return Err(CameraModelError::PointAtCameraCenter(point_camera.z));
        }
        let u = self.intrinsics.fx * point_camera.x / point_camera.z + self.intrinsics.cx;
        let v = self.intrinsics.fy * point_camera.y / point_camera.z + self.intrinsics.cy;

        let bounded = self.resolution.width > 0 && self.resolution.height > 0;
        if bounded
            && (u < 0.0
                || u >= self.resolution.width as f64
                || v < 0.0
                || v >= self.resolution.height as f64)
        {
            return Err(CameraModelError::ProjectionOutSideImage);
        }

        Ok(Vector2::new(u, v))
    }

    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_intrinsics(&self.intrinsics)?;
        validation::validate_rotation(&self.rotation, ROTATION_TOLERANCE)?;
        if !self.translation.iter().all(|t| t.is_finite()) {
            return Err(CameraModelError::InvalidParams(
                "translation must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
