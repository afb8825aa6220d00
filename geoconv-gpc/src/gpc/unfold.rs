//! Triangle unfolding update of the geodesic front.
//!
//! Melvær and Reimers, "Geodesic polar coordinates on polygonal meshes"
//! (CGF 2012). The triangle `(i, j, k)` is unfolded into the plane together
//! with a virtual source that lies at distance `u_j` from `j` and `u_k` from
//! `k`; the distance of `i` is its distance to that source.

use glam::DVec3;
use std::f64::consts::{PI, TAU};

const EPS: f64 = 1e-12;

/// Unsigned angle between two vectors, zero if either vanishes.
fn angle_between(a: DVec3, b: DVec3) -> f64 {
    let norms = a.length() * b.length();
    if norms <= EPS {
        return 0.0;
    }
    (a.dot(b) / norms).clamp(-1.0, 1.0).acos()
}

/// Interpolate from `theta_j` towards `theta_k` along the shorter arc.
pub(crate) fn interpolate_angle(theta_j: f64, theta_k: f64, alpha: f64) -> f64 {
    let mut theta_k = theta_k;
    if theta_k - theta_j > PI {
        theta_k -= TAU;
    } else if theta_j - theta_k > PI {
        theta_k += TAU;
    }
    ((1.0 - alpha) * theta_j + alpha * theta_k).rem_euclid(TAU)
}

/// Edge-walk update from whichever of `j` and `k` gives the shorter path.
fn dijkstra_update(e_j: DVec3, e_k: DVec3, u_j: f64, u_k: f64, theta_j: f64, theta_k: f64) -> (f64, f64) {
    let via_j = u_j + e_j.length();
    let via_k = u_k + e_k.length();
    if via_j <= via_k {
        (via_j, theta_j)
    } else {
        (via_k, theta_k)
    }
}

/// Radial and angular coordinate of `v_i` given the coordinates of the two
/// other corners of its triangle.
///
/// Falls back to the edge-walk update when the triangle is degenerate, the
/// front cannot reach both `j` and `k` from one source, or the virtual source
/// lies outside the wedge spanned at `v_i`.
pub(crate) fn unfold(
    v_i: DVec3,
    v_j: DVec3,
    v_k: DVec3,
    u_j: f64,
    u_k: f64,
    theta_j: f64,
    theta_k: f64,
) -> (f64, f64) {
    let e_j = v_j - v_i;
    let e_k = v_k - v_i;
    let e_kj = v_k - v_j;
    let e_kj_sq = e_kj.length_squared();
    let area = e_j.cross(e_k).length();

    let fallback = || dijkstra_update(e_j, e_k, u_j, u_k, theta_j, theta_k);

    if area <= EPS || e_kj_sq <= EPS {
        return fallback();
    }

    let radicand = (e_kj_sq - (u_j - u_k).powi(2)) * ((u_j + u_k).powi(2) - e_kj_sq);
    if radicand <= 0.0 {
        return fallback();
    }
    let h = radicand.sqrt();

    let u_j_sq = u_j * u_j;
    let u_k_sq = u_k * u_k;
    let x_j = area * (e_kj_sq + u_k_sq - u_j_sq) + e_k.dot(e_kj) * h;
    let x_k = area * (e_kj_sq + u_j_sq - u_k_sq) - e_j.dot(e_kj) * h;
    if x_j < 0.0 || x_k < 0.0 {
        return fallback();
    }

    let denominator = 2.0 * area * e_kj_sq;
    let to_source = e_j * (x_j / denominator) + e_k * (x_k / denominator);
    let distance = to_source.length();

    let source = v_i + to_source;
    let phi_kj = angle_between(v_k - source, v_j - source);
    if phi_kj <= EPS {
        return fallback();
    }
    let phi_ij = angle_between(v_i - source, v_j - source);
    let alpha = phi_ij / phi_kj;

    (distance, interpolate_angle(theta_j, theta_k, alpha))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, SQRT_2};

    #[test]
    fn test_unfold_recovers_planar_source() {
        // Source at the origin, j on the x axis and k on the y axis
        let (u, theta) = unfold(
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            1.0,
            1.0,
            0.0,
            FRAC_PI_2,
        );
        assert!((u - SQRT_2).abs() < 1e-12);
        assert!((theta - FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_unfold_off_axis_source() {
        // Source at (0, 0), j = (2, 0), k = (2, 2), i = (3, 1)
        let v_i = DVec3::new(3.0, 1.0, 0.0);
        let v_j = DVec3::new(2.0, 0.0, 0.0);
        let v_k = DVec3::new(2.0, 2.0, 0.0);
        let (u, theta) = unfold(v_i, v_j, v_k, 2.0, 8f64.sqrt(), 0.0, FRAC_PI_4);
        assert!((u - 10f64.sqrt()).abs() < 1e-9);
        assert!((theta - (1.0f64).atan2(3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_unfold_falls_back_on_degenerate_triangle() {
        let (u, theta) = unfold(
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(3.0, 0.0, 0.0),
            1.0,
            3.0,
            0.3,
            0.7,
        );
        assert_eq!((u, theta), (2.0, 0.3));
    }

    #[test]
    fn test_unfold_falls_back_on_negative_radicand() {
        // |u_j - u_k| exceeds the edge length
        let (u, theta) = unfold(
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            0.1,
            5.0,
            1.0,
            2.0,
        );
        assert!((u - 1.1).abs() < 1e-12);
        assert_eq!(theta, 1.0);
    }

    #[test]
    fn test_interpolate_angle_across_seam() {
        let theta = interpolate_angle(TAU - 0.1, 0.1, 0.5);
        assert!(theta.abs() < 1e-12 || (theta - TAU).abs() < 1e-12);
        let theta = interpolate_angle(0.1, TAU - 0.3, 0.5);
        assert!((theta - (TAU - 0.1)).abs() < 1e-12);
        assert!((interpolate_angle(1.0, 2.0, 0.25) - 1.25).abs() < 1e-12);
    }
}
