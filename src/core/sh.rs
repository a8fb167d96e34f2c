//! Spherical harmonics evaluation for view-dependent color.
//!
//! Gaussians store color as real SH coefficients up to degree 3
//! (16 basis functions per channel). The evaluator adds a 0.5 bias and clamps
//! negative channels to zero, remembering which channels were clamped so a
//! backward pass can route gradients correctly.

use nalgebra::Vector3;

/// Y_0^0
pub const SH_C0: f32 = 0.282_094_79;

/// Degree-1 normalization.
pub const SH_C1: f32 = 0.488_602_51;

/// Degree-2 normalizations.
pub const SH_C2: [f32; 5] = [
    1.092_548_4,
    -1.092_548_4,
    0.315_391_57,
    -1.092_548_4,
    0.546_274_2,
];

/// Degree-3 normalizations.
pub const SH_C3: [f32; 7] = [
    -0.590_043_6,
    2.890_611_4,
    -0.457_045_8,
    0.373_176_34,
    -0.457_045_8,
    1.445_305_7,
    -0.590_043_6,
];

/// Highest SH degree the evaluator understands.
pub const MAX_SH_DEGREE: u32 = 3;

/// Evaluate the real SH basis functions up to degree 3.
///
/// The basis functions are ordered as:
/// - Degree 0 (1 function): Y_0^0
/// - Degree 1 (3 functions): Y_1^{-1}, Y_1^0, Y_1^1
/// - Degree 2 (5 functions): Y_2^{-2}, Y_2^{-1}, Y_2^0, Y_2^1, Y_2^2
/// - Degree 3 (7 functions): Y_3^{-3}, ..., Y_3^3
///
/// Signs follow the convention used by the coefficient files (the odd-m
/// degree-1 terms are negated).
pub fn sh_basis(dir: &Vector3<f32>) -> [f32; 16] {
    let (x, y, z) = (dir.x, dir.y, dir.z);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, yz, xz) = (x * y, y * z, x * z);

    [
        SH_C0,
        -SH_C1 * y,
        SH_C1 * z,
        -SH_C1 * x,
        SH_C2[0] * xy,
        SH_C2[1] * yz,
        SH_C2[2] * (2.0 * zz - xx - yy),
        SH_C2[3] * xz,
        SH_C2[4] * (xx - yy),
        SH_C3[0] * y * (3.0 * xx - yy),
        SH_C3[1] * xy * z,
        SH_C3[2] * y * (4.0 * zz - xx - yy),
        SH_C3[3] * z * (2.0 * zz - 3.0 * xx - 3.0 * yy),
        SH_C3[4] * x * (4.0 * zz - xx - yy),
        SH_C3[5] * z * (xx - yy),
        SH_C3[6] * x * (xx - 3.0 * yy),
    ]
}

/// Number of SH coefficients used by a given degree: (degree + 1)².
pub fn sh_coeff_count(degree: u32) -> usize {
    let d = degree.min(MAX_SH_DEGREE) as usize + 1;
    d * d
}

/// Result of SH evaluation for one primitive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShColor {
    /// Linear RGB, each channel ≥ 0
    pub rgb: Vector3<f32>,
    /// Per channel: was the raw value negative before clamping
    pub clamped: [bool; 3],
}

/// Evaluate view-dependent color from SH coefficients.
///
/// `direction` is the vector from the camera center to the primitive; it is
/// normalized here. Only the first `(degree + 1)²` coefficients contribute.
pub fn evaluate_sh(sh_coeffs: &[[f32; 3]; 16], direction: &Vector3<f32>, degree: u32) -> ShColor {
    let dir = direction.normalize();
    let basis = sh_basis(&dir);

    let mut color = Vector3::<f32>::zeros();
    for (b, c) in basis.iter().zip(sh_coeffs.iter()).take(sh_coeff_count(degree)) {
        color += Vector3::new(c[0], c[1], c[2]) * *b;
    }
    color.add_scalar_mut(0.5);

    let clamped = [color.x < 0.0, color.y < 0.0, color.z < 0.0];
    ShColor {
        rgb: color.map(|v| v.max(0.0)),
        clamped,
    }
}
