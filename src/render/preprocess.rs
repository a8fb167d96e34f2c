//! Per-primitive projection and culling.
//!
//! For every Gaussian, independently:
//! 1. Frustum test in view space (skipped for pre-filtered input)
//! 2. Homogeneous projection of the mean to pixel coordinates
//! 3. 3D covariance (precomputed, or from scale + rotation)
//! 4. EWA projection to a 2D covariance, plus the low-pass inflation
//! 5. Conic, eigen-decomposition and a conservative 3σ radius
//! 6. Tile overlap count
//! 7. Color (precomputed, or from SH)
//!
//! A culled primitive keeps `radius == 0` and `tiles_touched == 0`; nothing
//! downstream looks at its other fields.

use crate::config::RasterSettings;
use crate::core::math::{
    conic_from_cov2d, eigen_decompose_2d, eigenvalues_2d, inflate_cov2d, project_cov2d, Cov3,
};
use crate::core::sh::MAX_SH_DEGREE;
use crate::core::{evaluate_sh, ndc_to_pixel, Camera, Gaussian};
use crate::error::RasterError;
use crate::render::tiles::TileGrid;
use nalgebra::{Vector2, Vector4};
use rayon::prelude::*;

/// View-space depth at or below which a primitive is culled.
pub const NEAR_PLANE: f32 = 0.2;

/// Discriminant floor used when sizing the footprint radius.
pub const RADIUS_EIGEN_FLOOR: f32 = 0.1;

/// Footprint extent in standard deviations.
const RADIUS_SIGMAS: f32 = 3.0;

/// Screen-space attributes of one primitive after projection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenSplat {
    /// View-space depth
    pub depth: f32,

    /// Footprint radius in pixels; 0 means culled
    pub radius: u32,

    /// Center in pixel coordinates
    pub mean: Vector2<f32>,

    /// Inverse 2D covariance `(a, b, c)` and opacity
    pub conic_opacity: Vector4<f32>,

    /// Unit eigenvectors `(v1.x, v1.y, v2.x, v2.y)` of the 2D covariance
    pub eigen_vecs: Vector4<f32>,

    /// Eigenvalues `(λ1, λ2)` of the 2D covariance
    pub eigen_vals: Vector2<f32>,

    /// Number of tiles the footprint overlaps; 0 means culled
    pub tiles_touched: u32,

    /// Linear RGB feature used by the compositor
    pub rgb: [f32; 3],

    /// Per channel: the SH result was negative and got clamped
    pub clamped: [bool; 3],

    /// World-space 3D covariance derived from scale and rotation; left zeroed
    /// when the primitive carried a precomputed one
    pub cov3d: Cov3,
}

impl ScreenSplat {
    /// Whether this primitive survived culling.
    pub fn is_visible(&self) -> bool {
        self.radius > 0 && self.tiles_touched > 0
    }
}

/// Project and cull a single primitive.
pub fn preprocess_one(
    gaussian: &Gaussian,
    camera: &Camera,
    settings: &RasterSettings,
    grid: &TileGrid,
) -> ScreenSplat {
    let mut out = ScreenSplat::default();

    let p_view = camera.world_to_view(&gaussian.position);
    if !settings.prefiltered {
        let beyond_far = settings.far_plane.is_some_and(|far| p_view.z > far);
        if p_view.z <= NEAR_PLANE || beyond_far {
            return out;
        }
    }

    let p_hom = camera.full_proj * gaussian.position.push(1.0);
    let p_w = 1.0 / (p_hom.w + 1e-7);
    let p_proj = p_hom.xyz() * p_w;

    let cov3d = gaussian.covariance(settings.scale_modifier, settings.quaternion_policy);
    if gaussian.cov3d_precomp.is_none() {
        out.cov3d = cov3d;
    }

    let cov = inflate_cov2d(
        &project_cov2d(
            &gaussian.position,
            camera.focal(),
            camera.tan_fov(),
            &cov3d,
            &camera.view,
        ),
        settings.anti_alias.inflation(),
    );

    let Some(conic) = conic_from_cov2d(&cov) else {
        return out;
    };

    let eigen = eigen_decompose_2d(&cov);

    // Sized from floored eigenvalues, which are never smaller than the stored ones.
    let (l1, l2) = eigenvalues_2d(&cov, RADIUS_EIGEN_FLOOR);
    let radius = (RADIUS_SIGMAS * l1.max(l2).sqrt()).ceil() as u32;

    let mean = Vector2::new(
        ndc_to_pixel(p_proj.x, camera.width),
        ndc_to_pixel(p_proj.y, camera.height),
    );
    let rect = grid.tile_rect(&mean, radius);
    if rect.is_empty() {
        return out;
    }

    match gaussian.color_precomp {
        Some(rgb) => out.rgb = rgb,
        None => {
            let color = evaluate_sh(
                &gaussian.sh_coeffs,
                &camera.view_direction(&gaussian.position),
                settings.sh_degree,
            );
            out.rgb = [color.rgb.x, color.rgb.y, color.rgb.z];
            out.clamped = color.clamped;
        }
    }

    out.depth = p_view.z;
    out.radius = radius;
    out.mean = mean;
    out.conic_opacity = Vector4::new(conic.x, conic.y, conic.z, gaussian.opacity);
    out.eigen_vecs = Vector4::from(eigen.vectors);
    out.eigen_vals = Vector2::from(eigen.values);
    out.tiles_touched = rect.area();
    out
}

/// Project and cull every primitive in parallel.
///
/// The returned vector is indexed like `gaussians`.
pub fn preprocess(
    gaussians: &[Gaussian],
    camera: &Camera,
    settings: &RasterSettings,
) -> Result<Vec<ScreenSplat>, RasterError> {
    if camera.width == 0 || camera.height == 0 {
        return Err(RasterError::EmptyImage {
            width: camera.width,
            height: camera.height,
        });
    }
    if settings.sh_degree > MAX_SH_DEGREE {
        return Err(RasterError::ShDegree {
            degree: settings.sh_degree,
            max: MAX_SH_DEGREE,
        });
    }
    let grid = TileGrid::new(camera.width, camera.height);

    let splats: Vec<ScreenSplat> = gaussians
        .par_iter()
        .map(|g| preprocess_one(g, camera, settings, &grid))
        .collect();

    let visible = splats.iter().filter(|s| s.is_visible()).count();
    log::debug!(
        "preprocess: {visible}/{} primitives visible on a {}x{} tile grid",
        splats.len(),
        grid.tiles_x,
        grid.tiles_y
    );

    Ok(splats)
}
