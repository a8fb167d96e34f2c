//! Rasterizer settings.
//!
//! Everything the kernels need besides the camera and the primitives lives in
//! [`RasterSettings`]. Settings deserialize from JSON with every field
//! optional, so a settings file only has to name what it changes:
//!
//! ```json
//! { "alpha_model": "analytic_integral", "anti_alias": { "kernel_ratio": { "ratio": 2.0 } } }
//! ```

use crate::core::math::LOW_PASS_FILTER;
use crate::render::AlphaModel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How the low-pass inflation of the 2D covariance is sized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntiAliasMode {
    /// Add the fixed low-pass constant to the diagonal.
    #[default]
    Fixed,
    /// Add the low-pass constant scaled by `ratio²`.
    KernelRatio { ratio: f32 },
}

impl AntiAliasMode {
    /// Amount added to each diagonal entry of the projected covariance.
    pub fn inflation(self) -> f32 {
        match self {
            AntiAliasMode::Fixed => LOW_PASS_FILTER,
            AntiAliasMode::KernelRatio { ratio } => LOW_PASS_FILTER * ratio * ratio,
        }
    }
}

/// What to do with rotation quaternions that are not unit length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuaternionPolicy {
    /// Use the quaternion exactly as supplied.
    #[default]
    TrustCaller,
    /// Normalize before building the rotation matrix.
    Normalize,
}

/// Settings for one forward pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterSettings {
    /// Global multiplier applied to every primitive's scale
    pub scale_modifier: f32,

    /// Alpha evaluation policy used by the compositor
    pub alpha_model: AlphaModel,

    /// Low-pass filter sizing
    pub anti_alias: AntiAliasMode,

    /// Primitives were already frustum-culled upstream
    pub prefiltered: bool,

    /// View-space depth beyond which primitives are culled (unbounded if unset)
    pub far_plane: Option<f32>,

    /// Quaternion normalization policy
    pub quaternion_policy: QuaternionPolicy,

    /// Highest SH degree evaluated (0..=3)
    pub sh_degree: u32,

    /// Linear RGB background
    pub background: [f32; 3],
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            scale_modifier: 1.0,
            alpha_model: AlphaModel::PointSample,
            anti_alias: AntiAliasMode::Fixed,
            prefiltered: false,
            far_plane: None,
            quaternion_policy: QuaternionPolicy::TrustCaller,
            sh_degree: 3,
            background: [0.0; 3],
        }
    }
}

impl RasterSettings {
    /// Check values that would make the kernels meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scale_modifier.is_finite() && self.scale_modifier > 0.0) {
            return Err(ConfigError::Invalid {
                field: "scale_modifier",
                reason: format!("must be positive and finite, got {}", self.scale_modifier),
            });
        }
        if self.sh_degree > crate::core::sh::MAX_SH_DEGREE {
            return Err(ConfigError::Invalid {
                field: "sh_degree",
                reason: format!("must be at most 3, got {}", self.sh_degree),
            });
        }
        if let AntiAliasMode::KernelRatio { ratio } = self.anti_alias {
            if !(ratio.is_finite() && ratio > 0.0) {
                return Err(ConfigError::Invalid {
                    field: "anti_alias",
                    reason: format!("kernel ratio must be positive, got {ratio}"),
                });
            }
        }
        if let Some(far) = self.far_plane {
            if !(far > 0.0) {
                return Err(ConfigError::Invalid {
                    field: "far_plane",
                    reason: format!("must be positive, got {far}"),
                });
            }
        }
        Ok(())
    }

    /// Parse and validate settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load and validate settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_json_gives_defaults() {
        let s = RasterSettings::from_json("{}").unwrap();
        assert_eq!(s, RasterSettings::default());
    }

    #[test]
    fn test_partial_json_overrides_fields() {
        let s = RasterSettings::from_json(
            r#"{ "alpha_model": "analytic_integral", "anti_alias": { "kernel_ratio": { "ratio": 2.0 } }, "sh_degree": 1 }"#,
        )
        .unwrap();
        assert_eq!(s.alpha_model, AlphaModel::AnalyticIntegral);
        assert_eq!(s.sh_degree, 1);
        assert_relative_eq!(s.anti_alias.inflation(), 1.2, epsilon = 1e-6);
    }

    #[test]
    fn test_fixed_inflation_is_low_pass_constant() {
        assert_relative_eq!(AntiAliasMode::Fixed.inflation(), 0.3, epsilon = 1e-7);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            RasterSettings::from_json(r#"{ "sh_degree": 4 }"#),
            Err(ConfigError::Invalid { field: "sh_degree", .. })
        ));
        assert!(matches!(
            RasterSettings::from_json(r#"{ "scale_modifier": 0.0 }"#),
            Err(ConfigError::Invalid { field: "scale_modifier", .. })
        ));
        assert!(matches!(
            RasterSettings::from_json("not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
