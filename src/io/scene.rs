//! JSON scene files.
//!
//! A scene bundles a look-at camera, the primitives and (optionally) raster
//! settings:
//!
//! ```json
//! {
//!   "camera": { "position": [0, 0, -4], "target": [0, 0, 0], "fov_y_degrees": 50,
//!               "width": 128, "height": 96 },
//!   "settings": { "alpha_model": "analytic_integral" },
//!   "gaussians": [
//!     { "position": [0, 0, 0], "scale": [0.3, 0.1, 0.1], "rotation": [1, 0, 0, 0],
//!       "opacity": 0.9, "color": [1.0, 0.4, 0.1] }
//!   ]
//! }
//! ```
//!
//! Rotations are `[w, x, y, z]`. A primitive gives either a constant `color`
//! or a full `sh` block (up to 16 RGB triplets, DC first); `cov3d` optionally
//! replaces scale and rotation.

use crate::config::{ConfigError, RasterSettings};
use crate::core::color::OutputEncoding;
use crate::core::math::Cov3;
use crate::core::{sh_from_rgb, Camera, Gaussian, GaussianCloud, MAX_SH_COEFFS};
use crate::render::FrameBuffers;
use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading a scene or saving an image.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid scene JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scene: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Settings(#[from] ConfigError),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

fn default_up() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

/// Look-at camera description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraSpec {
    pub position: [f32; 3],
    pub target: [f32; 3],
    #[serde(default = "default_up")]
    pub up: [f32; 3],
    /// Vertical field of view
    pub fov_y_degrees: f32,
    pub width: u32,
    pub height: u32,
}

impl CameraSpec {
    pub fn to_camera(&self) -> Result<Camera, SceneError> {
        if self.width == 0 || self.height == 0 {
            return Err(SceneError::InvalidFormat(format!(
                "camera image size {}x{} has zero area",
                self.width, self.height
            )));
        }
        if !(self.fov_y_degrees > 0.0 && self.fov_y_degrees < 180.0) {
            return Err(SceneError::InvalidFormat(format!(
                "fov_y_degrees must be in (0, 180), got {}",
                self.fov_y_degrees
            )));
        }
        let eye = Vector3::from(self.position);
        let target = Vector3::from(self.target);
        let up = Vector3::from(self.up);
        let forward = target - eye;
        if forward.norm() < 1e-6 || forward.cross(&up).norm() < 1e-6 {
            return Err(SceneError::InvalidFormat(
                "camera target must differ from position and not be parallel to up".into(),
            ));
        }
        Ok(Camera::look_at(
            &eye,
            &target,
            &up,
            self.fov_y_degrees.to_radians(),
            self.width,
            self.height,
        ))
    }
}

fn default_rotation() -> [f32; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

/// One primitive as written in a scene file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianSpec {
    pub position: [f32; 3],
    #[serde(default)]
    pub scale: [f32; 3],
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 4],
    pub opacity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sh: Vec<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cov3d: Option<Cov3>,
}

impl GaussianSpec {
    pub fn to_gaussian(&self, index: usize) -> Result<Gaussian, SceneError> {
        let sh_coeffs = match (self.color, self.sh.len()) {
            (Some(rgb), 0) => sh_from_rgb(rgb),
            (None, n) if (1..=MAX_SH_COEFFS).contains(&n) => {
                let mut coeffs = [[0.0f32; 3]; MAX_SH_COEFFS];
                coeffs[..n].copy_from_slice(&self.sh);
                coeffs
            }
            (Some(_), _) => {
                return Err(SceneError::InvalidFormat(format!(
                    "gaussian {index}: give either `color` or `sh`, not both"
                )))
            }
            (None, 0) => {
                return Err(SceneError::InvalidFormat(format!(
                    "gaussian {index}: missing `color` or `sh`"
                )))
            }
            (None, n) => {
                return Err(SceneError::InvalidFormat(format!(
                    "gaussian {index}: {n} SH coefficients, at most {MAX_SH_COEFFS} supported"
                )))
            }
        };

        let [w, x, y, z] = self.rotation;
        let mut g = Gaussian::new(
            Vector3::from(self.position),
            Vector3::from(self.scale),
            Quaternion::new(w, x, y, z),
            self.opacity,
            sh_coeffs,
        );
        g.cov3d_precomp = self.cov3d;
        Ok(g)
    }
}

/// Raw scene file contents.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneFile {
    pub camera: CameraSpec,
    #[serde(default)]
    pub settings: Option<RasterSettings>,
    pub gaussians: Vec<GaussianSpec>,
}

/// A scene ready to render.
#[derive(Clone, Debug)]
pub struct Scene {
    pub camera: Camera,
    pub settings: RasterSettings,
    pub gaussians: GaussianCloud,
}

impl Scene {
    /// Parse and validate a scene from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let file: SceneFile = serde_json::from_str(json)?;
        Self::from_file(file)
    }

    pub fn from_file(file: SceneFile) -> Result<Self, SceneError> {
        let settings = file.settings.unwrap_or_default();
        settings.validate()?;

        let gaussians = file
            .gaussians
            .iter()
            .enumerate()
            .map(|(i, g)| g.to_gaussian(i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            camera: file.camera.to_camera()?,
            settings,
            gaussians: GaussianCloud::from_gaussians(gaussians),
        })
    }
}

/// Load a scene from a JSON file.
pub fn load_scene(path: &Path) -> Result<Scene, SceneError> {
    let text = std::fs::read_to_string(path)?;
    let scene = Scene::from_json(&text)?;
    log::info!(
        "Loaded {} gaussians ({}x{}) from {}",
        scene.gaussians.len(),
        scene.camera.width,
        scene.camera.height,
        path.display()
    );
    Ok(scene)
}

/// Encode a frame and write it as PNG.
pub fn save_png(frame: &FrameBuffers, encoding: OutputEncoding, path: &Path) -> Result<(), SceneError> {
    frame
        .to_rgb_image(encoding)
        .save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
