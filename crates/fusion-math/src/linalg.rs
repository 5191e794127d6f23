//! Small dense geometry kernels.
//!
//! Cylindrical→Cartesian conversion, unit directions, cross product,
//! Rodrigues rotation and the real quadratic solve used by camera calibration.

use ndarray::{array, Array1, Array2, ArrayView1};

/// Convert cylindrical device coordinates (R, θ, z) to Cartesian (x, y, z).
pub fn cylindrical_to_cartesian(r: f64, theta: f64, z: f64) -> Array1<f64> {
    array![r * theta.cos(), r * theta.sin(), z]
}

/// Euclidean norm.
pub fn norm(v: ArrayView1<f64>) -> f64 {
    v.dot(&v).sqrt()
}

/// Unit vector pointing from `to` towards `from`: (from − to) / |from − to|.
///
/// Returns `None` when the two points coincide.
pub fn unit_direction(from: &Array1<f64>, to: &Array1<f64>) -> Option<Array1<f64>> {
    let diff = from - to;
    let len = norm(diff.view());
    if len < 1e-15 || !len.is_finite() {
        return None;
    }
    Some(diff / len)
}

/// 3-D cross product a × b.
pub fn cross3(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    array![
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0]
    ]
}

/// Rotation by `angle` about the unit `axis` (Rodrigues' formula).
///
/// R = cos θ I + sin θ [k]× + (1 − cos θ) k kᵀ
pub fn rodrigues_rotation(axis: ArrayView1<f64>, angle: f64) -> Array2<f64> {
    let (a, b, c) = (axis[0], axis[1], axis[2]);
    let cc = angle.cos();
    let ss = angle.sin();
    let tt = 1.0 - cc;
    array![
        [tt * a * a + cc, tt * a * b - ss * c, tt * a * c + ss * b],
        [tt * a * b + ss * c, tt * b * b + cc, tt * b * c - ss * a],
        [tt * a * c - ss * b, tt * b * c + ss * a, tt * c * c + cc]
    ]
}

/// Clockwise 2-D rotation in image coordinates: [[cos, sin], [−sin, cos]].
pub fn rotation_2d(angle: f64) -> Array2<f64> {
    let (s, c) = angle.sin_cos();
    array![[c, s], [-s, c]]
}

/// Real roots of a x² + b x + c = 0 as `(plus_root, minus_root)`,
/// i.e. `((−b + √Δ) / 2a, (−b − √Δ) / 2a)`.
///
/// Returns `None` for a negative discriminant or a vanishing leading term.
pub fn quadratic_roots(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    if a.abs() < 1e-300 {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || !disc.is_finite() {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    Some(((-b + sqrt_disc) / (2.0 * a), (-b - sqrt_disc) / (2.0 * a)))
}
