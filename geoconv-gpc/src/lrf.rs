//! SHOT local reference frames and the logarithmic map.
//!
//! Frames follow Salti, Tombari and Di Stefano, "SHOT: Unique signatures of
//! histograms for surface and texture description" (CVIU 2014): eigenvectors
//! of a distance-weighted covariance, each axis' sign fixed by the majority
//! of neighbours lying on its positive side.

use crate::distance::Neighborhoods;
use glam::{Vec2, Vec3};
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use ndarray::Array3;

/// An orthonormal, right-handed frame. `z_axis` approximates the surface normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalReferenceFrame {
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
}

impl LocalReferenceFrame {
    pub const IDENTITY: Self = Self {
        x_axis: Vec3::X,
        y_axis: Vec3::Y,
        z_axis: Vec3::Z,
    };

    /// Coordinates of the tangent-plane projection of `v`.
    pub fn project(&self, v: Vec3) -> Vec2 {
        let tangent = v - v.dot(self.z_axis) * self.z_axis;
        Vec2::new(tangent.dot(self.x_axis), tangent.dot(self.y_axis))
    }
}

fn to_glam(v: Vector3<f32>) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

/// Flip `axis` unless at least as many neighbours lie on its positive side
/// as on its negative side.
fn disambiguate(axis: Vec3, neighbors: &[Vec3]) -> Vec3 {
    let positive = neighbors.iter().filter(|n| n.dot(axis) >= 0.0).count();
    let negative = neighbors.iter().filter(|n| n.dot(-axis) > 0.0).count();
    if positive >= negative { axis } else { -axis }
}

fn frame_for(neighbors: &[Vec3], radius: f32) -> LocalReferenceFrame {
    let mut covariance = Matrix3::<f32>::zeros();
    let mut total = 0.0f32;
    for n in neighbors {
        let weight = radius - n.length();
        let v = Vector3::new(n.x, n.y, n.z);
        covariance += v * v.transpose() * weight;
        total += weight;
    }
    if total <= f32::EPSILON {
        return LocalReferenceFrame::IDENTITY;
    }
    covariance /= total;

    let eigen = SymmetricEigen::new(covariance);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

    let z_axis = disambiguate(to_glam(eigen.eigenvectors.column(order[0]).into_owned()), neighbors)
        .normalize_or_zero();
    let x_axis = disambiguate(to_glam(eigen.eigenvectors.column(order[2]).into_owned()), neighbors)
        .normalize_or_zero();
    if z_axis == Vec3::ZERO || x_axis == Vec3::ZERO {
        return LocalReferenceFrame::IDENTITY;
    }
    LocalReferenceFrame {
        x_axis,
        y_axis: z_axis.cross(x_axis),
        z_axis,
    }
}

/// SHOT local reference frame of every neighbourhood.
///
/// Padded slots sit on the boundary and therefore carry zero weight; they are
/// left out of the sign disambiguation.
pub fn shot_lrf(neighborhoods: &Neighborhoods) -> Vec<LocalReferenceFrame> {
    (0..neighborhoods.len())
        .map(|center| {
            let members: Vec<Vec3> = neighborhoods.neighbors(center).map(|(_, c)| c).collect();
            frame_for(&members, neighborhoods.radii[center])
        })
        .collect()
}

/// Project every neighbourhood into the tangent plane of its frame.
///
/// Returns `(points, limit, 2)` coordinates. Each projection is rescaled to the
/// Euclidean length of the original offset, which serves as the geodesic
/// distance approximation.
pub fn logarithmic_map(
    frames: &[LocalReferenceFrame],
    neighborhoods: &Neighborhoods,
) -> Array3<f32> {
    let limit = neighborhoods.limit();
    let mut projections = Array3::zeros((neighborhoods.len(), limit, 2));
    for (center, frame) in frames.iter().enumerate().take(neighborhoods.len()) {
        for slot in 0..limit {
            let offset = neighborhoods.coordinate(center, slot);
            let projected = frame.project(offset);
            let scaled = projected.normalize_or_zero() * offset.length();
            projections[[center, slot, 0]] = scaled.x;
            projections[[center, slot, 1]] = scaled.y;
        }
    }
    projections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::knn_neighborhoods;

    fn tilted_plane() -> Vec<Vec3> {
        // A plane z = 0.5 x, sampled irregularly
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                let x = i as f32 - 2.0 + 0.1 * j as f32;
                let y = j as f32 * 1.3 - 2.6;
                points.push(Vec3::new(x, y, 0.5 * x));
            }
        }
        points
    }

    #[test]
    fn test_frames_are_orthonormal() {
        let points = tilted_plane();
        let hoods = knn_neighborhoods(&points, 10).unwrap();
        for frame in shot_lrf(&hoods) {
            assert!((frame.x_axis.length() - 1.0).abs() < 1e-4);
            assert!((frame.z_axis.length() - 1.0).abs() < 1e-4);
            assert!(frame.x_axis.dot(frame.z_axis).abs() < 1e-4);
            assert!((frame.x_axis.cross(frame.y_axis) - frame.z_axis).length() < 1e-4);
        }
    }

    #[test]
    fn test_normal_of_plane() {
        let points = tilted_plane();
        let hoods = knn_neighborhoods(&points, 12).unwrap();
        let expected = Vec3::new(-0.5, 0.0, 1.0).normalize();
        for frame in shot_lrf(&hoods) {
            assert!(frame.z_axis.dot(expected).abs() > 0.999);
        }
    }

    #[test]
    fn test_logarithmic_map_preserves_length() {
        let points = tilted_plane();
        let hoods = knn_neighborhoods(&points, 8).unwrap();
        let frames = shot_lrf(&hoods);
        let projections = logarithmic_map(&frames, &hoods);
        for center in 0..hoods.len() {
            for slot in 0..hoods.limit() {
                let original = hoods.coordinate(center, slot).length();
                let p = Vec2::new(projections[[center, slot, 0]], projections[[center, slot, 1]]);
                assert!((p.length() - original).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_single_point_has_identity_frame() {
        let hoods = knn_neighborhoods(&[Vec3::ONE], 1).unwrap();
        assert_eq!(shot_lrf(&hoods), vec![LocalReferenceFrame::IDENTITY]);
    }
}
