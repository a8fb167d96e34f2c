//! Mathematical utilities for splat projection.
//!
//! Everything here is a pure function of its inputs:
//! - Quaternion → rotation matrix (no implicit normalization)
//! - 3D covariance from scale + rotation
//! - EWA projection of the 3D covariance to screen space
//! - Conic (inverse 2D covariance) and 2×2 eigen-analysis
//! - `erfc` and the 1D Gaussian CDF used by the analytic alpha model

use nalgebra::{Matrix3, Matrix4, Quaternion, Vector2, Vector3};

/// Low-pass inflation added to the diagonal of every projected covariance.
///
/// Guarantees a minimum footprint of roughly one pixel so that no splat
/// degenerates to a zero-measure ellipse.
pub const LOW_PASS_FILTER: f32 = 0.3;

/// Screen-space guard band, as a multiple of the tangent of the half FOV.
pub const GUARD_BAND: f32 = 1.3;

/// Packed symmetric 3×3 covariance: `[xx, xy, xz, yy, yz, zz]`.
pub type Cov3 = [f32; 6];

/// Packed symmetric 2×2 covariance: `(xx, xy, yy)`.
pub type Cov2 = Vector3<f32>;

/// Convert a quaternion `(w, x, y, z)` to a 3×3 rotation matrix.
///
/// The quaternion is used exactly as supplied. A non-unit quaternion yields a
/// scaled, non-orthogonal matrix; callers decide whether to normalize first.
///
/// R = | 1-2(y²+z²)   2(xy-wz)    2(xz+wy)  |
///     | 2(xy+wz)     1-2(x²+z²)  2(yz-wx)  |
///     | 2(xz-wy)     2(yz+wx)    1-2(x²+y²)|
pub fn quaternion_to_matrix(q: &Quaternion<f32>) -> Matrix3<f32> {
    let (r, x, y, z) = (q.w, q.i, q.j, q.k);

    Matrix3::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - r * z),
        2.0 * (x * z + r * y),
        2.0 * (x * y + r * z),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - r * x),
        2.0 * (x * z - r * y),
        2.0 * (y * z + r * x),
        1.0 - 2.0 * (x * x + y * y),
    )
}

/// Build the world-space 3D covariance from scale and rotation.
///
/// M = S · Rᵀ with S = diag(scale · modifier), Σ = Mᵀ · M = R · S² · Rᵀ.
pub fn compute_cov3d(scale: &Vector3<f32>, modifier: f32, rotation: &Quaternion<f32>) -> Cov3 {
    let s = Matrix3::from_diagonal(&(scale * modifier));
    let r = quaternion_to_matrix(rotation);

    let m = s * r.transpose();
    let sigma = m.transpose() * m;

    [
        sigma[(0, 0)],
        sigma[(0, 1)],
        sigma[(0, 2)],
        sigma[(1, 1)],
        sigma[(1, 2)],
        sigma[(2, 2)],
    ]
}

/// Unpack a symmetric 6-float covariance into a full matrix.
pub fn cov3_to_matrix(cov: &Cov3) -> Matrix3<f32> {
    Matrix3::new(
        cov[0], cov[1], cov[2], //
        cov[1], cov[3], cov[4], //
        cov[2], cov[4], cov[5],
    )
}

/// Transform a point by the upper 3×4 block of a 4×4 matrix.
pub fn transform_point_4x3(m: &Matrix4<f32>, p: &Vector3<f32>) -> Vector3<f32> {
    (m * p.push(1.0)).xyz()
}

/// Project a 3D covariance to screen space (EWA splatting).
///
/// The view-space mean is clamped to the guard band before the Jacobian is
/// formed, so splats far outside the image do not produce extreme values.
///
/// J = | fx/z    0      -fx*x/z² |
///     |  0     fy/z    -fy*y/z² |
///
/// Σ₂d = J · W · Σ · Wᵀ · Jᵀ, upper 2×2 only, before the low-pass inflation.
pub fn project_cov2d(
    mean: &Vector3<f32>,
    focal: Vector2<f32>,
    tan_fov: Vector2<f32>,
    cov3d: &Cov3,
    view: &Matrix4<f32>,
) -> Cov2 {
    let mut t = transform_point_4x3(view, mean);

    let lim_x = GUARD_BAND * tan_fov.x;
    let lim_y = GUARD_BAND * tan_fov.y;
    let txtz = t.x / t.z;
    let tytz = t.y / t.z;
    t.x = txtz.clamp(-lim_x, lim_x) * t.z;
    t.y = tytz.clamp(-lim_y, lim_y) * t.z;

    let z_inv = 1.0 / t.z;
    let z_inv_sq = z_inv * z_inv;
    let j = Matrix3::new(
        focal.x * z_inv,
        0.0,
        -focal.x * t.x * z_inv_sq,
        0.0,
        focal.y * z_inv,
        -focal.y * t.y * z_inv_sq,
        0.0,
        0.0,
        0.0,
    );

    let w = view.fixed_view::<3, 3>(0, 0).into_owned();
    let t_mat = j * w;
    let cov = t_mat * cov3_to_matrix(cov3d) * t_mat.transpose();

    Vector3::new(cov[(0, 0)], cov[(0, 1)], cov[(1, 1)])
}

/// Add the anti-alias inflation to the diagonal of a 2D covariance.
pub fn inflate_cov2d(cov: &Cov2, amount: f32) -> Cov2 {
    Vector3::new(cov.x + amount, cov.y, cov.z + amount)
}

/// Determinant of a packed 2×2 symmetric covariance.
pub fn cov2d_determinant(cov: &Cov2) -> f32 {
    cov.x * cov.z - cov.y * cov.y
}

/// Inverse of a packed 2×2 covariance (the "conic").
///
/// Returns `None` when the determinant is not strictly positive.
pub fn conic_from_cov2d(cov: &Cov2) -> Option<Vector3<f32>> {
    let det = cov2d_determinant(cov);
    if !(det > 0.0) {
        return None;
    }
    let det_inv = 1.0 / det;
    Some(Vector3::new(cov.z * det_inv, -cov.y * det_inv, cov.x * det_inv))
}

/// Eigenvalues of a 2×2 symmetric covariance, larger first.
///
/// `floor` bounds the discriminant from below: 0.0 gives the exact values,
/// 0.1 gives the slightly inflated values used for footprint sizing.
pub fn eigenvalues_2d(cov: &Cov2, floor: f32) -> (f32, f32) {
    let det = cov2d_determinant(cov);
    let mid = 0.5 * (cov.x + cov.z);
    let disc = (mid * mid - det).max(floor).sqrt();
    (mid + disc, mid - disc)
}

/// Eigen-decomposition of a 2D footprint, as stored for the analytic model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Eigen2 {
    /// Unit eigenvectors packed as `(v1.x, v1.y, v2.x, v2.y)`.
    pub vectors: [f32; 4],
    /// Eigenvalues `(λ1, λ2)`, λ1 ≥ λ2 before any sign correction.
    pub values: [f32; 2],
}

fn solve_eigenvector(cov: &Cov2, lambda: f32) -> Option<Vector2<f32>> {
    // (cov.x - λ) vx + cov.y vy = 0
    let a = cov.x - lambda;
    if a != 0.0 {
        let v = Vector2::new(-cov.y / a, 1.0);
        let n = v.norm();
        if n > 0.0 && n.is_finite() {
            return Some(v / n);
        }
    }
    None
}

/// Analytic eigen-decomposition of a 2×2 symmetric covariance.
///
/// Each eigenvector is solved from `(cov.x - λ)·vx + cov.y·vy = 0`. When
/// `cov.x - λ` vanishes the x-axis is the eigenvector for λ1, and the second
/// eigenvector falls back to the perpendicular of the first. A negative
/// eigenvalue is replaced by its absolute value and its vector negated.
pub fn eigen_decompose_2d(cov: &Cov2) -> Eigen2 {
    let (mut l1, mut l2) = eigenvalues_2d(cov, 0.0);

    let mut v1 = solve_eigenvector(cov, l1).unwrap_or_else(|| Vector2::new(1.0, 0.0));
    let mut v2 = solve_eigenvector(cov, l2).unwrap_or_else(|| Vector2::new(-v1.y, v1.x));

    if l1 < 0.0 {
        l1 = -l1;
        v1 = -v1;
    }
    if l2 < 0.0 {
        l2 = -l2;
        v2 = -v2;
    }

    Eigen2 {
        vectors: [v1.x, v1.y, v2.x, v2.y],
        values: [l1, l2],
    }
}

/// Complementary error function.
///
/// Chebyshev fit with fractional error below 1.2e-7 over the whole real line,
/// evaluated in f64 and narrowed.
pub fn erfc(x: f32) -> f32 {
    let x = x as f64;
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    (if x >= 0.0 { ans } else { 2.0 - ans }) as f32
}

/// Standard normal CDF Φ(x) = ½·erfc(-x/√2).
pub fn normal_cdf(x: f32) -> f32 {
    0.5 * erfc(-x * std::f32::consts::FRAC_1_SQRT_2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn unit(q: UnitQuaternion<f32>) -> Quaternion<f32> {
        q.into_inner()
    }

    #[test]
    fn test_quaternion_to_matrix_identity() {
        let r = quaternion_to_matrix(&Quaternion::identity());
        assert_relative_eq!(r, Matrix3::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_quaternion_to_matrix_matches_nalgebra_for_unit_input() {
        let q = UnitQuaternion::from_euler_angles(0.5, -0.3, 1.2);
        let r = quaternion_to_matrix(&unit(q));
        assert_relative_eq!(r, q.to_rotation_matrix().into_inner(), epsilon = 1e-5);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_quaternion_to_matrix_does_not_normalize() {
        // A doubled quaternion no longer gives an orthogonal matrix.
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        let r = quaternion_to_matrix(&q);
        assert_relative_eq!(r, Matrix3::identity(), epsilon = 1e-6);

        let q = unit(UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3)) * 2.0;
        let r = quaternion_to_matrix(&q);
        let product = r * r.transpose();
        assert!((product - Matrix3::identity()).norm() > 1e-2);
    }

    #[test]
    fn test_cov3d_identity_rotation_is_diagonal() {
        let cov = compute_cov3d(&Vector3::new(1.0, 2.0, 3.0), 0.5, &Quaternion::identity());
        assert_relative_eq!(cov[0], 0.25, epsilon = 1e-6);
        assert_relative_eq!(cov[3], 1.0, epsilon = 1e-6);
        assert_relative_eq!(cov[5], 2.25, epsilon = 1e-6);
        assert_relative_eq!(cov[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(cov[2], 0.0, epsilon = 1e-6);
        assert_relative_eq!(cov[4], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cov3d_matches_r_s2_rt() {
        let q = UnitQuaternion::from_euler_angles(0.4, 0.1, -0.7);
        let scale = Vector3::new(0.3, 0.1, 0.05);
        let cov = compute_cov3d(&scale, 1.0, &unit(q));

        let r = q.to_rotation_matrix().into_inner();
        let s2 = Matrix3::from_diagonal(&scale.component_mul(&scale));
        let expected = r * s2 * r.transpose();
        assert_relative_eq!(cov3_to_matrix(&cov), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_project_cov2d_isotropic_on_axis() {
        // Unit sphere at z=2 seen through f=100: σ_px = f·σ/z = 50.
        let cov3 = [1.0, 0.0, 0.0, 1.0, 0.0, 1.0];
        let cov = project_cov2d(
            &Vector3::new(0.0, 0.0, 2.0),
            Vector2::new(100.0, 100.0),
            Vector2::new(1.0, 1.0),
            &cov3,
            &Matrix4::identity(),
        );
        assert_relative_eq!(cov.x, 2500.0, epsilon = 1e-2);
        assert_relative_eq!(cov.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(cov.z, 2500.0, epsilon = 1e-2);
    }

    #[test]
    fn test_project_cov2d_guard_band_clamps_jacobian() {
        let cov3 = [1.0, 0.0, 0.0, 1.0, 0.0, 1.0];
        let focal = Vector2::new(100.0, 100.0);
        let tan_fov = Vector2::new(0.5, 0.5);
        // Both points lie beyond 1.3·tan, so they clamp to the same ray.
        let a = project_cov2d(&Vector3::new(10.0, 0.0, 2.0), focal, tan_fov, &cov3, &Matrix4::identity());
        let b = project_cov2d(&Vector3::new(50.0, 0.0, 2.0), focal, tan_fov, &cov3, &Matrix4::identity());
        assert_relative_eq!(a, b, epsilon = 1e-3);
    }

    #[test]
    fn test_conic_rejects_non_positive_determinant() {
        assert!(conic_from_cov2d(&Vector3::new(1.0, 1.0, 1.0)).is_none());
        assert!(conic_from_cov2d(&Vector3::new(1.0, 2.0, 1.0)).is_none());
        let conic = conic_from_cov2d(&Vector3::new(2.0, 0.0, 4.0)).unwrap();
        assert_relative_eq!(conic, Vector3::new(0.5, 0.0, 0.25), epsilon = 1e-6);
    }

    #[test]
    fn test_eigen_decompose_diagonal() {
        let e = eigen_decompose_2d(&Vector3::new(4.0, 0.0, 1.0));
        assert_relative_eq!(e.values[0], 4.0, epsilon = 1e-6);
        assert_relative_eq!(e.values[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(e.vectors[0].abs(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(e.vectors[3].abs(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_eigen_decompose_isotropic_gives_orthonormal_basis() {
        let e = eigen_decompose_2d(&Vector3::new(2.0, 0.0, 2.0));
        let v1 = Vector2::new(e.vectors[0], e.vectors[1]);
        let v2 = Vector2::new(e.vectors[2], e.vectors[3]);
        assert_relative_eq!(v1.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(v2.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(v1.dot(&v2), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_eigen_decompose_rotated_satisfies_av_eq_lv() {
        let cov = Vector3::new(3.0, 1.2, 2.0);
        let e = eigen_decompose_2d(&cov);
        let a = nalgebra::Matrix2::new(cov.x, cov.y, cov.y, cov.z);
        for k in 0..2 {
            let v = Vector2::new(e.vectors[2 * k], e.vectors[2 * k + 1]);
            assert_relative_eq!(a * v, v * e.values[k], epsilon = 1e-4);
        }
    }

    #[test]
    fn test_eigen_decompose_indefinite_flips_negative_axis() {
        // Eigenvalues 3 and -1; the -1 axis is reported as +1 with its vector negated.
        let cov = Vector3::new(1.0, 2.0, 1.0);
        let e = eigen_decompose_2d(&cov);
        assert_relative_eq!(e.values[0], 3.0, epsilon = 1e-5);
        assert_relative_eq!(e.values[1], 1.0, epsilon = 1e-5);

        let h = std::f32::consts::FRAC_1_SQRT_2;
        let v1 = Vector2::new(e.vectors[0], e.vectors[1]);
        let v2 = Vector2::new(e.vectors[2], e.vectors[3]);
        assert_relative_eq!(v1, Vector2::new(h, h), epsilon = 1e-5);
        assert_relative_eq!(v2, Vector2::new(h, -h), epsilon = 1e-5);

        let a = nalgebra::Matrix2::new(cov.x, cov.y, cov.y, cov.z);
        assert_relative_eq!(a * v1, v1 * e.values[0], epsilon = 1e-4);
        assert_relative_eq!(a * v2, -v2 * e.values[1], epsilon = 1e-4);
    }

    #[test]
    fn test_radius_floor_is_conservative() {
        let cov = Vector3::new(0.3, 0.0, 0.3);
        let (exact, _) = eigenvalues_2d(&cov, 0.0);
        let (floored, _) = eigenvalues_2d(&cov, 0.1);
        assert!(floored > exact);
    }

    #[test]
    fn test_erfc_reference_values() {
        assert_relative_eq!(erfc(0.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(erfc(1.0), 0.157_299_2, epsilon = 1e-6);
        assert_relative_eq!(erfc(-1.0), 1.842_700_8, epsilon = 1e-6);
        assert_relative_eq!(erfc(3.0), 2.209_05e-5, epsilon = 1e-8);
    }

    #[test]
    fn test_normal_cdf_symmetry() {
        assert_relative_eq!(normal_cdf(0.0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(normal_cdf(1.0) + normal_cdf(-1.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(normal_cdf(1.0), 0.841_344_7, epsilon = 1e-5);
    }
}
