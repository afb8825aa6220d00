//! Barycentric coordinates for point clouds.
//!
//! Without a mesh there are no geodesics. Each neighbourhood is flattened into
//! the tangent plane of its SHOT frame with the logarithmic map, which keeps
//! Euclidean distances to the center, and triangulated there.

use super::LocalChart;
use crate::distance::knn_neighborhoods;
use crate::lrf::{logarithmic_map, shot_lrf};
use crate::{GpcError, Template};
use geoconv_data::{BarycentricCoordinates, BarycentricRecord, triangulate_plane};
use glam::{Vec2, Vec3};
use rayon::prelude::*;
use tracing::{info, warn};

/// Barycentric coordinates of the template around every point.
///
/// `lrf_neighbors` points estimate each local reference frame;
/// `projection_neighbors` points form the triangulated chart.
#[tracing::instrument(skip_all, fields(
    points = points.len(),
    lrf_neighbors = lrf_neighbors,
    projection_neighbors = projection_neighbors
))]
pub fn compute_point_cloud_barycentric(
    points: &[Vec3],
    template: &Template,
    lrf_neighbors: usize,
    projection_neighbors: usize,
) -> Result<BarycentricCoordinates, GpcError> {
    let frames = shot_lrf(&knn_neighborhoods(points, lrf_neighbors)?);
    let neighborhoods = knn_neighborhoods(points, projection_neighbors)?;
    let projections = logarithmic_map(&frames, &neighborhoods);

    let results: Vec<(Vec<BarycentricRecord>, usize)> = (0..points.len())
        .into_par_iter()
        .map(|center| {
            let (chart_points, ids): (Vec<Vec2>, Vec<u32>) = (0..neighborhoods.limit())
                .filter(|&slot| neighborhoods.valid[[center, slot]])
                .map(|slot| {
                    (
                        Vec2::new(projections[[center, slot, 0]], projections[[center, slot, 1]]),
                        neighborhoods.indices[[center, slot]] as u32,
                    )
                })
                .unzip();
            let triangles = triangulate_plane(&chart_points);
            LocalChart::new(chart_points, ids, triangles).interpolate(template, center as u32)
        })
        .collect();

    let fallbacks: usize = results.iter().map(|(_, f)| f).sum();
    if fallbacks > 0 {
        warn!(
            "{} of {} template points outside their tangent-plane chart",
            fallbacks,
            points.len() * template.len()
        );
    }

    let records: Vec<Vec<BarycentricRecord>> = results.into_iter().map(|(r, _)| r).collect();
    let coordinates =
        BarycentricCoordinates::from_records(template.n_radial(), template.n_angular(), &records)?;
    info!("Computed point-cloud barycentric coordinates for {} points", points.len());
    Ok(coordinates)
}
