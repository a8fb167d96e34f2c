//! Color space conversion for image output.
//!
//! The rasterizer composites in **linear RGB**. Conversion to sRGB happens only
//! when an image leaves the system.
//!
//! **Linear to sRGB**:
//! - if linear <= 0.0031308: sRGB = 12.92 * linear
//! - if linear > 0.0031308: sRGB = 1.055 * linear ^ (1/2.4) - 0.055

use serde::{Deserialize, Serialize};

/// Transfer function applied when quantizing a rendered image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputEncoding {
    /// Official sRGB curve (not gamma 2.2)
    #[default]
    Srgb,
    /// Store linear values directly
    Linear,
}

/// Convert linear f32 (0.0-1.0) to sRGB u8 (0-255).
///
/// # Example
/// ```
/// use splat_raster::core::color::linear_f32_to_srgb_u8;
///
/// // Linear 0.5 is about sRGB 188
/// assert_eq!(linear_f32_to_srgb_u8(0.5), 188);
/// ```
pub fn linear_f32_to_srgb_u8(x: f32) -> u8 {
    let x = x.clamp(0.0, 1.0);
    let cs = if x <= 0.0031308 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    };
    (cs * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Quantize a linear f32 to u8 without a transfer curve.
pub fn linear_f32_to_u8(x: f32) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl OutputEncoding {
    /// Quantize one linear channel value.
    pub fn encode(self, x: f32) -> u8 {
        match self {
            OutputEncoding::Srgb => linear_f32_to_srgb_u8(x),
            OutputEncoding::Linear => linear_f32_to_u8(x),
        }
    }
}
