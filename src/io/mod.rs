//! I/O operations for loading scenes and saving renders.
//!
//! - JSON scene files (camera, primitives, optional settings)
//! - PNG export of rendered frames

mod scene;

// Re-export public types and functions
pub use scene::{load_scene, save_png, CameraSpec, GaussianSpec, Scene, SceneError, SceneFile};
