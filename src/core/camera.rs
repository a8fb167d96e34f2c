//! Camera model used by the rasterizer.
//!
//! The rasterizer consumes a camera as a pair of 4×4 matrices (view and the
//! combined view-projection), the camera position, the tangents of the half
//! field of view and the image size. Focal lengths are derived from those.
//!
//! Convention: view space looks down +z, x right, y down, so that a point with
//! positive view-space z is in front of the camera.

use nalgebra::{Matrix3, Matrix4, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// A pinhole camera with a symmetric frustum.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Camera {
    /// Image width (pixels)
    pub width: u32,

    /// Image height (pixels)
    pub height: u32,

    /// tan(fov_x / 2)
    pub tan_fovx: f32,

    /// tan(fov_y / 2)
    pub tan_fovy: f32,

    /// World → view transform
    pub view: Matrix4<f32>,

    /// World → clip transform (projection · view)
    pub full_proj: Matrix4<f32>,

    /// Camera center in world coordinates
    pub position: Vector3<f32>,
}

/// Perspective projection matrix for a symmetric frustum, +z forward.
///
/// Maps view-space x/z into [-1, 1] across the horizontal FOV and stores the
/// view-space depth in w.
pub fn projection_matrix(znear: f32, zfar: f32, tan_fovx: f32, tan_fovy: f32) -> Matrix4<f32> {
    let top = tan_fovy * znear;
    let bottom = -top;
    let right = tan_fovx * znear;
    let left = -right;

    let mut p = Matrix4::zeros();
    p[(0, 0)] = 2.0 * znear / (right - left);
    p[(1, 1)] = 2.0 * znear / (top - bottom);
    p[(0, 2)] = (right + left) / (right - left);
    p[(1, 2)] = (top + bottom) / (top - bottom);
    p[(3, 2)] = 1.0;
    p[(2, 2)] = zfar / (zfar - znear);
    p[(2, 3)] = -(zfar * znear) / (zfar - znear);
    p
}

impl Camera {
    /// Near clip plane used when building the projection matrix.
    pub const ZNEAR: f32 = 0.01;

    /// Far clip plane used when building the projection matrix.
    pub const ZFAR: f32 = 100.0;

    /// Create a camera from a world → camera pose and field of view.
    ///
    /// `rotation`/`translation` map world points into view space:
    /// p_view = R * p_world + t
    pub fn new(
        rotation: Matrix3<f32>,
        translation: Vector3<f32>,
        fov_x: f32,
        fov_y: f32,
        width: u32,
        height: u32,
    ) -> Self {
        let mut view = Matrix4::identity();
        view.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        view.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);

        let tan_fovx = (0.5 * fov_x).tan();
        let tan_fovy = (0.5 * fov_y).tan();
        let proj = projection_matrix(Self::ZNEAR, Self::ZFAR, tan_fovx, tan_fovy);

        Self {
            width,
            height,
            tan_fovx,
            tan_fovy,
            view,
            full_proj: proj * view,
            // Camera center in world: C = -R^T * t
            position: -rotation.transpose() * translation,
        }
    }

    /// Create a camera at `eye` looking at `target`.
    ///
    /// `fov_y` is the vertical field of view in radians; the horizontal one
    /// follows from the aspect ratio.
    pub fn look_at(
        eye: &Vector3<f32>,
        target: &Vector3<f32>,
        up: &Vector3<f32>,
        fov_y: f32,
        width: u32,
        height: u32,
    ) -> Self {
        let forward = (target - eye).normalize();
        // right × down = forward, with down = -up.
        let right = forward.cross(up).normalize();
        let down = forward.cross(&right);

        let rotation = Matrix3::from_rows(&[right.transpose(), down.transpose(), forward.transpose()]);
        let translation = -(rotation * eye);

        let aspect = width as f32 / height as f32;
        let fov_x = 2.0 * ((0.5 * fov_y).tan() * aspect).atan();

        Self::new(rotation, translation, fov_x, fov_y, width, height)
    }

    /// Focal lengths in pixels `(fx, fy)`.
    pub fn focal(&self) -> Vector2<f32> {
        Vector2::new(
            self.width as f32 / (2.0 * self.tan_fovx),
            self.height as f32 / (2.0 * self.tan_fovy),
        )
    }

    /// Tangents of the half field of view `(tan_x, tan_y)`.
    pub fn tan_fov(&self) -> Vector2<f32> {
        Vector2::new(self.tan_fovx, self.tan_fovy)
    }

    /// Transform a point from world coordinates to view coordinates.
    pub fn world_to_view(&self, point_world: &Vector3<f32>) -> Vector3<f32> {
        crate::core::math::transform_point_4x3(&self.view, point_world)
    }

    /// Project a world point to pixel coordinates.
    ///
    /// No frustum test is applied; the homogeneous divide is guarded by a
    /// small epsilon.
    pub fn world_to_pixel(&self, point_world: &Vector3<f32>) -> Vector2<f32> {
        let p_hom = self.full_proj * point_world.push(1.0);
        let p_w = 1.0 / (p_hom.w + 1e-7);
        Vector2::new(
            ndc_to_pixel(p_hom.x * p_w, self.width),
            ndc_to_pixel(p_hom.y * p_w, self.height),
        )
    }

    /// Normalized direction from the camera center to a world point.
    ///
    /// Used for spherical harmonics evaluation (view-dependent color).
    pub fn view_direction(&self, point_world: &Vector3<f32>) -> Vector3<f32> {
        (point_world - self.position).normalize()
    }
}

/// Map a normalized device coordinate to a pixel coordinate.
///
/// Pixel centers land on integer coordinates.
pub fn ndc_to_pixel(v: f32, size: u32) -> f32 {
    ((v + 1.0) * size as f32 - 1.0) * 0.5
}
