//! Barycentric interpolation of template points in local charts.
//!
//! A chart is a set of 2D points (vertices in GPC or tangent-plane
//! coordinates) with triangles between them. Every template point is located
//! in the chart triangle that contains it most deeply; if none contains it,
//! it snaps to the nearest chart point.

mod point_cloud;

pub use point_cloud::compute_point_cloud_barycentric;

use crate::{GpcError, GpcSystemGroup, Template};
use geoconv_data::{BarycentricCoordinates, BarycentricRecord, GpcSystem, Mesh};
use glam::{DVec2, Vec2};
use rayon::prelude::*;
use tracing::{info, warn};

/// Weights down to this value still count as inside a triangle.
const INSIDE_TOLERANCE: f64 = -1e-6;
const DEGENERATE_EPS: f64 = 1e-12;

/// Barycentric weights of `p` with respect to `(a, b, c)`, `None` for a
/// degenerate triangle.
fn barycentric_weights(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> Option<[f64; 3]> {
    let (p, a, b, c) = (p.as_dvec2(), a.as_dvec2(), b.as_dvec2(), c.as_dvec2());
    let v0: DVec2 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let denominator = v0.perp_dot(v1);
    if denominator.abs() <= DEGENERATE_EPS {
        return None;
    }
    let w1 = v2.perp_dot(v1) / denominator;
    let w2 = v0.perp_dot(v2) / denominator;
    Some([1.0 - w1 - w2, w1, w2])
}

/// Clamp to `[0, 1]` and renormalise so the weights sum to one.
fn normalize_weights(weights: [f64; 3]) -> [f32; 3] {
    let clamped = weights.map(|w| w.clamp(0.0, 1.0));
    let sum: f64 = clamped.iter().sum();
    clamped.map(|w| (w / sum) as f32)
}

pub(crate) struct LocalChart {
    points: Vec<Vec2>,
    /// Vertex index of every chart point.
    ids: Vec<u32>,
    /// Triangles over chart point positions.
    triangles: Vec<[usize; 3]>,
}

impl LocalChart {
    pub(crate) fn new(points: Vec<Vec2>, ids: Vec<u32>, triangles: Vec<[usize; 3]>) -> Self {
        Self {
            points,
            ids,
            triangles,
        }
    }

    /// Triangle containing `p` with the largest minimal weight, ties by the
    /// earlier triangle.
    fn locate(&self, p: Vec2) -> Option<([usize; 3], [f64; 3])> {
        let mut best: Option<([usize; 3], [f64; 3], f64)> = None;
        for &[a, b, c] in &self.triangles {
            let Some(weights) = barycentric_weights(p, self.points[a], self.points[b], self.points[c])
            else {
                continue;
            };
            let depth = weights.iter().copied().fold(f64::INFINITY, f64::min);
            if depth < INSIDE_TOLERANCE {
                continue;
            }
            if best.as_ref().is_none_or(|(_, _, d)| depth > *d) {
                best = Some(([a, b, c], weights, depth));
            }
        }
        best.map(|(triangle, weights, _)| (triangle, weights))
    }

    /// Chart point closest to `p`, ties by the earlier point.
    fn nearest(&self, p: Vec2) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (position, q) in self.points.iter().enumerate() {
            let d = q.distance_squared(p);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((position, d));
            }
        }
        best.map(|(position, _)| position)
    }

    /// One record per template point (radial-major) and the number of points
    /// that fell back to their nearest chart point.
    pub(crate) fn interpolate(
        &self,
        template: &Template,
        center: u32,
    ) -> (Vec<BarycentricRecord>, usize) {
        let mut fallbacks = 0;
        let records = template
            .points()
            .map(|p| match self.locate(p) {
                Some(([a, b, c], weights)) => {
                    let [wa, wb, wc] = normalize_weights(weights);
                    [(self.ids[a], wa), (self.ids[b], wb), (self.ids[c], wc)]
                }
                None => {
                    fallbacks += 1;
                    let id = self.nearest(p).map_or(center, |position| self.ids[position]);
                    [(id, 1.0), (id, 0.0), (id, 0.0)]
                }
            })
            .collect();
        (records, fallbacks)
    }
}

fn mesh_chart(gpc: &GpcSystem, faces: &[[usize; 3]]) -> LocalChart {
    let mut chart_position = vec![None; gpc.len()];
    let mut points = Vec::new();
    let mut ids = Vec::new();
    for vertex in 0..gpc.len() {
        if let Some(p) = gpc.cartesian(vertex) {
            chart_position[vertex] = Some(points.len());
            points.push(p);
            ids.push(vertex as u32);
        }
    }

    // Faces touching an unreached vertex are left out
    let lookup = |v: usize| chart_position.get(v).copied().flatten();
    let triangles = faces
        .iter()
        .filter_map(|&[a, b, c]| Some([lookup(a)?, lookup(b)?, lookup(c)?]))
        .collect();

    LocalChart::new(points, ids, triangles)
}

fn interpolate_system(
    gpc: &GpcSystem,
    faces: &[[usize; 3]],
    template: &Template,
) -> (Vec<BarycentricRecord>, usize) {
    mesh_chart(gpc, faces).interpolate(template, gpc.center() as u32)
}

/// Barycentric records of every template point in one GPC system,
/// radial-major.
pub fn compute_barycentric(
    gpc: &GpcSystem,
    faces: &[[usize; 3]],
    template: &Template,
) -> Vec<BarycentricRecord> {
    interpolate_system(gpc, faces, template).0
}

/// Barycentric coordinates of the template in every GPC system of a mesh.
#[tracing::instrument(skip_all, fields(
    centers = group.len(),
    n_radial = template.n_radial(),
    n_angular = template.n_angular()
))]
pub fn compute_barycentric_coordinates(
    group: &GpcSystemGroup,
    mesh: &Mesh,
    template: &Template,
) -> Result<BarycentricCoordinates, GpcError> {
    let n = mesh.vertex_count();
    if group.len() != n || group.systems().iter().any(|s| s.len() != n) {
        return Err(GpcError::InvalidParameter(format!(
            "GPC systems do not match a mesh with {} vertices",
            n
        )));
    }

    let results: Vec<(Vec<BarycentricRecord>, usize)> = group
        .systems()
        .par_iter()
        .map(|gpc| interpolate_system(gpc, mesh.faces(), template))
        .collect();

    let fallbacks: usize = results.iter().map(|(_, f)| f).sum();
    if fallbacks > 0 {
        warn!(
            "{} of {} template points outside their GPC system; snapped to nearest vertex",
            fallbacks,
            n * template.len()
        );
    }

    let records: Vec<Vec<BarycentricRecord>> = results.into_iter().map(|(r, _)| r).collect();
    let coordinates =
        BarycentricCoordinates::from_records(template.n_radial(), template.n_angular(), &records)?;
    info!("Computed barycentric coordinates for {} centers", n);
    Ok(coordinates)
}

/// Positions of the interpolated template points in the GPC chart.
///
/// Inverse check for [`compute_barycentric`]: records that were located in
/// a triangle reproduce the template point.
pub fn reconstruct_template(gpc: &GpcSystem, records: &[BarycentricRecord]) -> Vec<Vec2> {
    records
        .iter()
        .map(|record| {
            record
                .iter()
                .filter_map(|&(vertex, weight)| Some(gpc.cartesian(vertex as usize)? * weight))
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpc::{GroupOptions, MaxRadius, compute_gpc_system};
    use geoconv_data::grid_mesh;
    use glam::Vec3;
    use std::f32::consts::TAU;

    fn pentagon_fan() -> Mesh {
        let mut vertices = vec![Vec3::ZERO];
        for k in 0..5 {
            let phi = TAU * k as f32 / 5.0;
            vertices.push(Vec3::new(phi.cos(), phi.sin(), 0.0));
        }
        let faces = (0..5).map(|k| [0, 1 + k, 1 + (k + 1) % 5]).collect();
        Mesh::new(vertices, faces).unwrap()
    }

    fn assert_valid_record(record: &BarycentricRecord) {
        let sum: f32 = record.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-5, "weights sum to {}", sum);
        assert!(record.iter().all(|(_, w)| *w >= 0.0));
    }

    #[test]
    fn test_barycentric_weights() {
        let w = barycentric_weights(
            Vec2::new(0.25, 0.25),
            Vec2::ZERO,
            Vec2::X,
            Vec2::Y,
        )
        .unwrap();
        assert!((w[0] - 0.5).abs() < 1e-12);
        assert!((w[1] - 0.25).abs() < 1e-12);
        assert!((w[2] - 0.25).abs() < 1e-12);
        assert!(barycentric_weights(Vec2::ZERO, Vec2::ZERO, Vec2::X, Vec2::X * 2.0).is_none());
    }

    #[test]
    fn test_pentagon_reconstructs_template() {
        let mesh = pentagon_fan();
        let gpc = compute_gpc_system(&mesh, 0, f32::INFINITY).unwrap();
        let template = Template::new(2, 7, 0.6).unwrap();
        let (records, fallbacks) = interpolate_system(&gpc, mesh.faces(), &template);
        assert_eq!(fallbacks, 0);
        assert_eq!(records.len(), 14);
        records.iter().for_each(assert_valid_record);

        let reconstructed = reconstruct_template(&gpc, &records);
        for (p, q) in template.points().zip(reconstructed) {
            assert!(p.distance(q) < 1e-4, "{:?} vs {:?}", p, q);
        }
    }

    #[test]
    fn test_outside_points_snap_to_nearest_vertex() {
        let mesh = pentagon_fan();
        let gpc = compute_gpc_system(&mesh, 0, f32::INFINITY).unwrap();
        let template = Template::new(1, 5, 3.0).unwrap();
        let (records, fallbacks) = interpolate_system(&gpc, mesh.faces(), &template);
        assert_eq!(fallbacks, 5);
        for (j, record) in records.iter().enumerate() {
            // Template angle j coincides with rim vertex j + 1
            let expected = (j + 1) as u32;
            assert_eq!(*record, [(expected, 1.0), (expected, 0.0), (expected, 0.0)]);
        }
    }

    #[test]
    fn test_unreached_neighbourhood_falls_back_to_center() {
        let mesh = pentagon_fan();
        let gpc = compute_gpc_system(&mesh, 0, 0.5).unwrap();
        assert_eq!(gpc.reached_count(), 1);
        let template = Template::new(2, 3, 0.4).unwrap();
        for record in compute_barycentric(&gpc, mesh.faces(), &template) {
            assert_eq!(record, [(0, 1.0), (0, 0.0), (0, 0.0)]);
        }
    }

    #[test]
    fn test_ties_pick_lower_triangle() {
        // Point on the shared edge of two triangles with equal depth
        let chart = LocalChart::new(
            vec![Vec2::new(0.0, -1.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0)],
            vec![10, 11, 12, 13],
            vec![[0, 1, 2], [0, 1, 3]],
        );
        let (triangle, _) = chart.locate(Vec2::ZERO).unwrap();
        assert_eq!(triangle, [0, 1, 2]);
    }

    #[test]
    fn test_mesh_coordinates() {
        let mesh = grid_mesh(5).unwrap();
        let group = GpcSystemGroup::compute(
            &mesh,
            &MaxRadius::Uniform(0.6),
            &GroupOptions::default(),
        )
        .unwrap();
        let template = Template::new(2, 4, 0.2).unwrap();
        let bc = compute_barycentric_coordinates(&group, &mesh, &template).unwrap();
        assert_eq!(bc.indices().shape(), &[25, 2, 4, 3]);
        assert!(bc.max_index().unwrap() < 25);
        for c in 0..25 {
            for i in 0..2 {
                for j in 0..4 {
                    assert_valid_record(&bc.record(c, i, j));
                }
            }
        }
    }

    #[test]
    fn test_mesh_coordinates_reject_mismatched_group() {
        let mesh = grid_mesh(3).unwrap();
        let other = grid_mesh(2).unwrap();
        let group =
            GpcSystemGroup::compute(&other, &MaxRadius::Uniform(1.0), &GroupOptions::default())
                .unwrap();
        let template = Template::new(1, 4, 0.1).unwrap();
        assert!(compute_barycentric_coordinates(&group, &mesh, &template).is_err());
    }
}
