//! Triangulation of planar point sets and synthetic test meshes.

use crate::{DataError, Mesh};
use delaunator::{Point, triangulate};
use glam::{Vec2, Vec3};
use tracing::debug;

/// Delaunay triangulation of planar points.
///
/// Returns index triplets into `points`, empty for fewer than three points or
/// collinear input.
pub fn triangulate_plane(points: &[Vec2]) -> Vec<[usize; 3]> {
    if points.len() < 3 {
        debug!("{} points, nothing to triangulate", points.len());
        return Vec::new();
    }

    let points: Vec<Point> = points
        .iter()
        .map(|p| Point {
            x: p.x as f64,
            y: p.y as f64,
        })
        .collect();

    triangulate(&points)
        .triangles
        .chunks_exact(3)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect()
}

/// A flat `n x n` grid over the unit square in the XY plane.
///
/// Vertex `x * n + y` sits at `(x, y) / (n - 1)`. Every cell is split along
/// its rising diagonal into two counter-clockwise triangles.
pub fn grid_mesh(n: usize) -> Result<Mesh, DataError> {
    let step = if n > 1 { 1.0 / (n - 1) as f32 } else { 0.0 };
    let vertices: Vec<Vec3> = (0..n)
        .flat_map(|x| (0..n).map(move |y| Vec3::new(x as f32 * step, y as f32 * step, 0.0)))
        .collect();

    let index = |x: usize, y: usize| x * n + y;
    let faces = (0..n.saturating_sub(1))
        .flat_map(|x| (0..n - 1).map(move |y| (x, y)))
        .flat_map(|(x, y)| {
            [
                [index(x, y), index(x + 1, y), index(x + 1, y + 1)],
                [index(x, y), index(x + 1, y + 1), index(x, y + 1)],
            ]
        })
        .collect();
    Mesh::new(vertices, faces)
}
