//! Pairwise distances and vertex neighbourhoods.

use crate::GpcError;
use glam::Vec3;
use ndarray::{Array2, Array3};
use tracing::debug;

/// Full pairwise Euclidean distance matrix.
///
/// Uses the Gram expansion `|a|² - 2a·b + |b|²`. Round-off can push that
/// below zero, so it is clamped before the square root; the diagonal is
/// exactly zero.
pub fn distance_matrix(points: &[Vec3]) -> Array2<f32> {
    let n = points.len();
    let norms: Vec<f32> = points.iter().map(|p| p.length_squared()).collect();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 0.0;
        }
        let squared = norms[i] - 2.0 * points[i].dot(points[j]) + norms[j];
        // `max` also maps NaN to zero
        squared.max(0.0).sqrt()
    })
}

/// Fixed-size neighbourhoods of every point, shifted so that the center lies
/// at the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhoods {
    /// `(points, limit, 3)` neighbour coordinates relative to the center.
    pub coordinates: Array3<f32>,
    /// `(points, limit)` neighbour indices. Padded slots hold the center index.
    pub indices: Array2<usize>,
    /// `(points, limit)` whether a slot holds a real neighbour.
    pub valid: Array2<bool>,
    /// Cutoff radius of every neighbourhood.
    pub radii: Vec<f32>,
}

impl Neighborhoods {
    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.indices.ncols()
    }

    pub fn coordinate(&self, center: usize, slot: usize) -> Vec3 {
        Vec3::new(
            self.coordinates[[center, slot, 0]],
            self.coordinates[[center, slot, 1]],
            self.coordinates[[center, slot, 2]],
        )
    }

    /// Real neighbours of `center` as `(index, relative coordinate)`.
    pub fn neighbors(&self, center: usize) -> impl Iterator<Item = (usize, Vec3)> + '_ {
        (0..self.limit())
            .filter(move |&slot| self.valid[[center, slot]])
            .map(move |slot| (self.indices[[center, slot]], self.coordinate(center, slot)))
    }
}

/// Indices of all points sorted by distance to `center`, ties by lower index.
fn sorted_by_distance(distances: &Array2<f32>, center: usize) -> Vec<usize> {
    let row = distances.row(center);
    let mut order: Vec<usize> = (0..row.len()).collect();
    order.sort_by(|&a, &b| row[a].total_cmp(&row[b]).then(a.cmp(&b)));
    order
}

fn assemble(
    points: &[Vec3],
    selected: Vec<Vec<usize>>,
    radii: Vec<f32>,
    limit: usize,
) -> Neighborhoods {
    let n = points.len();
    let mut coordinates = Array3::zeros((n, limit, 3));
    let mut indices = Array2::zeros((n, limit));
    let mut valid = Array2::from_elem((n, limit), false);

    for (center, members) in selected.iter().enumerate() {
        // Sentinel at the boundary: length exactly the cutoff radius
        let fill = (radii[center] * radii[center] / 3.0).sqrt();
        for slot in 0..limit {
            let offset = match members.get(slot) {
                Some(&m) => {
                    indices[[center, slot]] = m;
                    valid[[center, slot]] = true;
                    points[m] - points[center]
                }
                None => {
                    indices[[center, slot]] = center;
                    Vec3::splat(fill)
                }
            };
            coordinates[[center, slot, 0]] = offset.x;
            coordinates[[center, slot, 1]] = offset.y;
            coordinates[[center, slot, 2]] = offset.z;
        }
    }

    Neighborhoods {
        coordinates,
        indices,
        valid,
        radii,
    }
}

/// Radius-bounded neighbourhoods, closest first, capped at `neighbor_limit`.
///
/// Every point is its own neighbour. Missing slots are padded with a
/// coordinate on the neighbourhood boundary so that distance weights
/// `radius - |x|` give them zero influence.
#[tracing::instrument(skip_all, fields(points = points.len(), neighbor_limit = neighbor_limit))]
pub fn group_neighborhoods(
    points: &[Vec3],
    radii: &[f32],
    neighbor_limit: usize,
    distances: Option<&Array2<f32>>,
) -> Result<Neighborhoods, GpcError> {
    if radii.len() != points.len() {
        return Err(GpcError::InvalidParameter(format!(
            "{} radii for {} points",
            radii.len(),
            points.len()
        )));
    }
    if neighbor_limit == 0 {
        return Err(GpcError::InvalidParameter("neighbor limit must be positive".to_string()));
    }
    if let Some(r) = radii.iter().find(|r| !(r.is_finite() && **r >= 0.0)) {
        return Err(GpcError::InvalidParameter(format!("invalid radius {}", r)));
    }

    let owned;
    let distances = match distances {
        Some(d) => d,
        None => {
            owned = distance_matrix(points);
            &owned
        }
    };

    let selected: Vec<Vec<usize>> = (0..points.len())
        .map(|center| {
            sorted_by_distance(distances, center)
                .into_iter()
                .take_while(|&m| distances[[center, m]] <= radii[center])
                .take(neighbor_limit)
                .collect()
        })
        .collect();

    let padded = selected.iter().filter(|s| s.len() < neighbor_limit).count();
    debug!("{} of {} neighbourhoods padded", padded, points.len());

    Ok(assemble(points, selected, radii.to_vec(), neighbor_limit))
}

/// The `k` nearest points of every point (itself included).
///
/// The radius of each neighbourhood is the distance of its farthest member.
pub fn knn_neighborhoods(points: &[Vec3], k: usize) -> Result<Neighborhoods, GpcError> {
    if k == 0 || k > points.len() {
        return Err(GpcError::InvalidParameter(format!(
            "k = {} for {} points",
            k,
            points.len()
        )));
    }
    let distances = distance_matrix(points);
    let selected: Vec<Vec<usize>> = (0..points.len())
        .map(|center| {
            let mut order = sorted_by_distance(&distances, center);
            order.truncate(k);
            order
        })
        .collect();
    let radii = selected
        .iter()
        .enumerate()
        .map(|(center, members)| distances[[center, members[k - 1]]])
        .collect();
    Ok(assemble(points, selected, radii, k))
}

/// Distance of the `k`-th nearest neighbour of every vertex.
///
/// Index 0 is the vertex itself, so `k = 1` is the closest other vertex.
pub fn kth_neighbor_distances(distances: &Array2<f32>, k: usize) -> Result<Vec<f32>, GpcError> {
    if k >= distances.ncols() {
        return Err(GpcError::InvalidParameter(format!(
            "k = {} for {} vertices",
            k,
            distances.ncols()
        )));
    }
    Ok(distances
        .rows()
        .into_iter()
        .map(|row| {
            let mut sorted = row.to_vec();
            sorted.sort_by(f32::total_cmp);
            sorted[k]
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn test_distance_matrix_values() {
        let d = distance_matrix(&[Vec3::ZERO, Vec3::new(3.0, 4.0, 0.0)]);
        assert_eq!(d[[0, 0]], 0.0);
        assert!((d[[0, 1]] - 5.0).abs() < 1e-5);
        assert_eq!(d[[0, 1]], d[[1, 0]]);
    }

    #[test]
    fn test_distance_matrix_never_nan() {
        // Large, nearly identical points provoke negative round-off
        let p = Vec3::new(1e4, 1e4, 1e4);
        let points = vec![p, p + Vec3::splat(1e-3), p];
        let d = distance_matrix(&points);
        assert!(d.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert_eq!(d[[1, 1]], 0.0);
    }

    #[test]
    fn test_group_neighborhoods_orders_and_caps() {
        let points = line(5);
        let hoods = group_neighborhoods(&points, &[1.5; 5], 3, None).unwrap();
        // Center 2: itself, then 1 and 3 (tie broken by index)
        assert_eq!(hoods.indices.row(2).to_vec(), vec![2, 1, 3]);
        assert!(hoods.valid.row(2).iter().all(|&v| v));
    }

    #[test]
    fn test_group_neighborhoods_pads_at_boundary() {
        let points = line(5);
        let hoods = group_neighborhoods(&points, &[1.5; 5], 4, None).unwrap();
        // Center 0 only has itself and vertex 1
        assert_eq!(hoods.neighbors(0).count(), 2);
        assert!(!hoods.valid[[0, 2]]);
        assert_eq!(hoods.indices[[0, 3]], 0);
        assert!((hoods.coordinate(0, 3).length() - 1.5).abs() < 1e-5);
        assert_eq!(hoods.coordinate(0, 1), Vec3::X);
    }

    #[test]
    fn test_group_neighborhoods_rejects_bad_input() {
        let points = line(3);
        assert!(group_neighborhoods(&points, &[1.0; 2], 3, None).is_err());
        assert!(group_neighborhoods(&points, &[1.0; 3], 0, None).is_err());
        assert!(group_neighborhoods(&points, &[-1.0; 3], 2, None).is_err());
    }

    #[test]
    fn test_knn_neighborhoods() {
        let points = line(6);
        let hoods = knn_neighborhoods(&points, 3).unwrap();
        assert_eq!(hoods.indices.row(0).to_vec(), vec![0, 1, 2]);
        assert_eq!(hoods.radii[0], 2.0);
        assert_eq!(hoods.radii[3], 1.0);
        assert!(knn_neighborhoods(&points, 7).is_err());
    }

    #[test]
    fn test_kth_neighbor_distances() {
        let d = distance_matrix(&line(4));
        assert_eq!(kth_neighbor_distances(&d, 1).unwrap(), vec![1.0, 1.0, 1.0, 1.0]);
        assert_eq!(kth_neighbor_distances(&d, 3).unwrap(), vec![3.0, 2.0, 2.0, 3.0]);
        assert!(kth_neighbor_distances(&d, 4).is_err());
    }
}
