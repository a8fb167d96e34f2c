//! # splat-raster: tile-based forward rasterizer for 3D Gaussian splats
//!
//! Given a cloud of anisotropic 3D Gaussians and a pinhole camera, this crate
//! produces an image, the per-pixel transmittance and the per-pixel
//! contributor count.
//!
//! ## Architecture
//!
//! - `core`: Fundamental data structures (Gaussians, cameras, math, SH)
//! - `render`: Projection, binning, tile compositing and output assembly
//! - `config`: Raster settings loaded from JSON
//! - `io`: Scene files and PNG export
//! - `error` / `logging`: host-boundary errors and logger setup
//!
//! ## Example
//!
//! ```
//! use nalgebra::{Quaternion, Vector3};
//! use splat_raster::{render_frame, Camera, Gaussian, RasterSettings};
//!
//! let camera = Camera::look_at(
//!     &Vector3::new(0.0, 0.0, -4.0),
//!     &Vector3::zeros(),
//!     &Vector3::y(),
//!     0.8,
//!     32,
//!     32,
//! );
//! let splat = Gaussian::with_constant_color(
//!     Vector3::zeros(),
//!     Vector3::repeat(0.3),
//!     Quaternion::identity(),
//!     0.9,
//!     [1.0, 0.5, 0.0],
//! );
//! let out = render_frame(&[splat], &camera, &RasterSettings::default(), None).unwrap();
//! assert_eq!(out.frame.final_t.len(), 32 * 32);
//! ```

// Core data structures and math
pub mod core;

// Settings
pub mod config;

// Host-boundary errors
pub mod error;

// Scene files and image export
pub mod io;

// Logger initialization
pub mod logging;

// Forward rendering pipeline
pub mod render;

// Re-export commonly used types at crate root for convenience
pub use config::{AntiAliasMode, ConfigError, QuaternionPolicy, RasterSettings};
pub use core::{Camera, Gaussian, GaussianCloud};
pub use error::RasterError;
pub use io::{load_scene, Scene, SceneError};
pub use render::{render_frame, AlphaModel, ForwardOutput, FrameBuffers};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
