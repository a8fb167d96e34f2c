//! Gaussian primitive and cloud data structure.
//!
//! A Gaussian is parameterized by:
//! - Position (mean μ)
//! - Scale (per-axis standard deviation, before the global scale modifier)
//! - Rotation (quaternion `(w, x, y, z)`, not necessarily unit length)
//! - Opacity (used as-is; clamped by the compositor, not here)
//! - Spherical harmonics coefficients (view-dependent color)
//!
//! Either of the derived quantities (3D covariance, RGB color) may be supplied
//! precomputed, in which case the rasterizer uses it instead of deriving it.

use crate::config::QuaternionPolicy;
use crate::core::math::{compute_cov3d, Cov3};
use crate::core::sh::SH_C0;
use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Number of SH coefficients for the maximum supported degree (3).
pub const MAX_SH_COEFFS: usize = 16;

/// A 3D Gaussian primitive.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Gaussian {
    /// Position (mean μ) in world space
    pub position: Vector3<f32>,

    /// Per-axis scale
    pub scale: Vector3<f32>,

    /// Rotation quaternion, used as supplied unless the settings ask for
    /// normalization
    pub rotation: Quaternion<f32>,

    /// Opacity
    pub opacity: f32,

    /// Spherical harmonics coefficients, one RGB triplet per basis function.
    /// Index 0 is the DC component (view-independent color).
    #[serde(default)]
    pub sh_coeffs: [[f32; 3]; MAX_SH_COEFFS],

    /// Precomputed symmetric 3D covariance `[xx, xy, xz, yy, yz, zz]`
    #[serde(default)]
    pub cov3d_precomp: Option<Cov3>,

    /// Precomputed linear RGB color (skips SH evaluation)
    #[serde(default)]
    pub color_precomp: Option<[f32; 3]>,
}

impl Gaussian {
    /// Create a new Gaussian with given parameters.
    pub fn new(
        position: Vector3<f32>,
        scale: Vector3<f32>,
        rotation: Quaternion<f32>,
        opacity: f32,
        sh_coeffs: [[f32; 3]; MAX_SH_COEFFS],
    ) -> Self {
        Self {
            position,
            scale,
            rotation,
            opacity,
            sh_coeffs,
            cov3d_precomp: None,
            color_precomp: None,
        }
    }

    /// Create a Gaussian whose SH evaluates to `rgb` from every direction.
    pub fn with_constant_color(
        position: Vector3<f32>,
        scale: Vector3<f32>,
        rotation: Quaternion<f32>,
        opacity: f32,
        rgb: [f32; 3],
    ) -> Self {
        Self::new(position, scale, rotation, opacity, sh_from_rgb(rgb))
    }

    /// Rotation as consumed by the covariance builder under `policy`.
    pub fn effective_rotation(&self, policy: QuaternionPolicy) -> Quaternion<f32> {
        match policy {
            QuaternionPolicy::TrustCaller => self.rotation,
            QuaternionPolicy::Normalize => {
                let n = self.rotation.norm();
                if n > 0.0 {
                    self.rotation / n
                } else {
                    Quaternion::identity()
                }
            }
        }
    }

    /// The 3D covariance, either precomputed or built from scale/rotation.
    pub fn covariance(&self, scale_modifier: f32, policy: QuaternionPolicy) -> Cov3 {
        match self.cov3d_precomp {
            Some(cov) => cov,
            None => compute_cov3d(&self.scale, scale_modifier, &self.effective_rotation(policy)),
        }
    }
}

/// DC-only SH coefficients that evaluate to `rgb` (the evaluator adds 0.5).
pub fn sh_from_rgb(rgb: [f32; 3]) -> [[f32; 3]; MAX_SH_COEFFS] {
    let mut sh = [[0.0f32; 3]; MAX_SH_COEFFS];
    sh[0] = [
        (rgb[0] - 0.5) / SH_C0,
        (rgb[1] - 0.5) / SH_C0,
        (rgb[2] - 0.5) / SH_C0,
    ];
    sh
}

/// A collection of Gaussians.
///
/// Array-of-structs layout; the rasterizer writes its derived attributes as
/// separate arrays.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GaussianCloud {
    pub gaussians: Vec<Gaussian>,
}

impl GaussianCloud {
    /// Create a new empty Gaussian cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cloud from a vector of Gaussians.
    pub fn from_gaussians(gaussians: Vec<Gaussian>) -> Self {
        Self { gaussians }
    }

    /// Number of Gaussians in the cloud.
    pub fn len(&self) -> usize {
        self.gaussians.len()
    }

    /// Check if the cloud is empty.
    pub fn is_empty(&self) -> bool {
        self.gaussians.is_empty()
    }

    /// Add a Gaussian to the cloud.
    pub fn push(&mut self, gaussian: Gaussian) {
        self.gaussians.push(gaussian);
    }

    /// Get a reference to the Gaussians.
    pub fn as_slice(&self) -> &[Gaussian] {
        &self.gaussians
    }
}
