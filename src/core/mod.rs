//! Core data structures and mathematical operations.
//!
//! This module contains the fundamental types used throughout the system:
//! - `Gaussian`: 3D Gaussian primitive
//! - `Camera`: view / projection matrices and intrinsics
//! - Math utilities: quaternions, covariance projection, eigen-analysis
//! - Spherical harmonics color evaluation
//!
//! All types here are "pure data" - no I/O, no rendering logic.

mod camera;
pub mod color;
mod gaussian;
pub mod math;
pub mod sh;

// Re-export public types
pub use camera::{ndc_to_pixel, projection_matrix, Camera};
pub use gaussian::{sh_from_rgb, Gaussian, GaussianCloud, MAX_SH_COEFFS};
pub use math::{quaternion_to_matrix, Eigen2};
pub use sh::{evaluate_sh, sh_basis, ShColor};
