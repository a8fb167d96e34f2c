//! Alpha evaluation policies for the compositor.
//!
//! Three models turn a staged splat and a sample position into an opacity:
//! - point sample: Gaussian density at the pixel center
//! - analytic integral: Gaussian mass over the 1×1 pixel box, along the
//!   footprint's eigen-axes
//! - sub-pixel multisample: point samples on an `S×S` grid, each with its own
//!   persisted transmittance (driven by the compositor, sampled here)
//!
//! All models share the same clamp (0.99) and visibility threshold (1/255).

use crate::core::math::normal_cdf;
use nalgebra::{Vector2, Vector4};
use serde::{Deserialize, Serialize};

/// Upper bound on any single primitive's alpha.
pub const MAX_ALPHA: f32 = 0.99;

/// Alphas below this are invisible and skipped.
pub const MIN_ALPHA: f32 = 1.0 / 255.0;

/// Transmittance below which a pixel (or sub-pixel) is saturated.
pub const T_EPSILON: f32 = 1e-4;

/// Area of the `[u - ½, u + ½]²` integration box in pixel units.
const PIXEL_AREA: f32 = 1.0;

/// Sub-pixel grid resolution per axis.
pub const SUBPIXEL_GRID: usize = 3;

/// Sub-pixel cells per pixel.
pub const SUBPIXEL_COUNT: usize = SUBPIXEL_GRID * SUBPIXEL_GRID;

/// Which alpha model the compositor runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaModel {
    /// Mode 0 (and 3).
    #[default]
    PointSample,
    /// Mode 1.
    AnalyticIntegral,
    /// Mode 2.
    SubpixelMultisample,
}

impl AlphaModel {
    /// Map a numeric mode selector to a model.
    ///
    /// Modes 0 and 3 both select point sampling; any other value falls through
    /// to the multisample model, matching the default branch of the selector.
    pub fn from_mode(mode: u32) -> Self {
        match mode {
            0 | 3 => AlphaModel::PointSample,
            1 => AlphaModel::AnalyticIntegral,
            _ => AlphaModel::SubpixelMultisample,
        }
    }

    /// Canonical numeric selector.
    pub fn mode(self) -> u32 {
        match self {
            AlphaModel::PointSample => 0,
            AlphaModel::AnalyticIntegral => 1,
            AlphaModel::SubpixelMultisample => 2,
        }
    }
}

/// Primitive attributes staged once per batch and shared by every pixel of a
/// tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StagedSplat {
    pub id: u32,
    pub xy: Vector2<f32>,
    pub conic_opacity: Vector4<f32>,
    pub eigen_vecs: Vector4<f32>,
    pub eigen_vals: Vector2<f32>,
}

/// Clamp and threshold a raw alpha; `None` means "skip this primitive".
#[inline]
fn finish_alpha(raw: f32) -> Option<f32> {
    let alpha = raw.min(MAX_ALPHA);
    if alpha < MIN_ALPHA {
        None
    } else {
        Some(alpha)
    }
}

/// Exponent of the Gaussian at `pixel`, `-½·dᵀ·Σ⁻¹·d`.
#[inline]
pub fn gaussian_power(pixel: &Vector2<f32>, splat: &StagedSplat) -> f32 {
    let d = splat.xy - pixel;
    let con = &splat.conic_opacity;
    -0.5 * (con.x * d.x * d.x + con.z * d.y * d.y) - con.y * d.x * d.y
}

/// Point-sample alpha at `pixel`.
#[inline]
pub fn point_sample_alpha(pixel: &Vector2<f32>, splat: &StagedSplat) -> Option<f32> {
    let power = gaussian_power(pixel, splat);
    if power > 0.0 {
        return None;
    }
    finish_alpha(splat.conic_opacity.w * power.exp())
}

/// Gaussian mass of a unit interval centered at `u`, standard deviation `sigma`.
#[inline]
fn interval_mass(u: f32, sigma: f32) -> f32 {
    let sigma = sigma.max(1e-12);
    normal_cdf((u + 0.5) / sigma) - normal_cdf((u - 0.5) / sigma)
}

/// Raw (unclamped) analytic-integral alpha at `pixel`.
///
/// The pixel offset is rotated into the footprint's eigenbasis; along each
/// axis the unit pixel interval is normalized by `sqrt(λ)` and integrated with
/// the normal CDF. The product is divided by the box area in pixel units and
/// scaled by `2π·opacity`.
pub fn analytic_integral_raw(pixel: &Vector2<f32>, splat: &StagedSplat) -> f32 {
    let d = splat.xy - pixel;
    let v1 = Vector2::new(splat.eigen_vecs.x, splat.eigen_vecs.y);
    let v2 = Vector2::new(splat.eigen_vecs.z, splat.eigen_vecs.w);

    let u1 = d.dot(&v1);
    let u2 = d.dot(&v2);

    let mass1 = interval_mass(u1, splat.eigen_vals.x.sqrt());
    let mass2 = interval_mass(u2, splat.eigen_vals.y.sqrt());

    std::f32::consts::TAU * splat.conic_opacity.w * mass1 * mass2 / PIXEL_AREA
}

/// Analytic-integral alpha at `pixel`.
#[inline]
pub fn analytic_integral_alpha(pixel: &Vector2<f32>, splat: &StagedSplat) -> Option<f32> {
    finish_alpha(analytic_integral_raw(pixel, splat))
}

/// Offset of sub-cell `k` from the pixel center.
pub fn subpixel_offset(k: usize) -> Vector2<f32> {
    let s = SUBPIXEL_GRID as f32;
    let sx = (k % SUBPIXEL_GRID) as f32;
    let sy = (k / SUBPIXEL_GRID) as f32;
    Vector2::new((sx + 0.5) / s - 0.5, (sy + 0.5) / s - 0.5)
}

/// Per-pixel alpha evaluation, resolved once per tile.
pub trait AlphaStrategy: Sync {
    fn alpha(&self, pixel: &Vector2<f32>, splat: &StagedSplat) -> Option<f32>;
}

/// Density at the pixel center.
pub struct PointSample;

impl AlphaStrategy for PointSample {
    #[inline]
    fn alpha(&self, pixel: &Vector2<f32>, splat: &StagedSplat) -> Option<f32> {
        point_sample_alpha(pixel, splat)
    }
}

/// Gaussian mass over the pixel box.
pub struct AnalyticIntegral;

impl AlphaStrategy for AnalyticIntegral {
    #[inline]
    fn alpha(&self, pixel: &Vector2<f32>, splat: &StagedSplat) -> Option<f32> {
        analytic_integral_alpha(pixel, splat)
    }
}
