//! Core data types for meshes, GPC systems and barycentric coordinates.
//!
//! These are CPU-side, immutable representations shared by the preprocessing
//! and tensor crates. None of them is mutated by the convolution core.

use crate::DataError;
use glam::{Vec2, Vec3};
use ndarray::{Array4, Array5, ArrayView4, s};

/// A triangle primitive with three vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex position.
    pub v0: Vec3,
    /// Second vertex position.
    pub v1: Vec3,
    /// Third vertex position.
    pub v2: Vec3,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Compute the center (centroid) of the triangle.
    pub fn center(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Compute the normal of the triangle (not normalized).
    ///
    /// Its length is twice the triangle area, which makes it usable for
    /// area-weighted averaging.
    pub fn normal(&self) -> Vec3 {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(e2)
    }

    /// Compute the normalized normal of the triangle.
    pub fn unit_normal(&self) -> Vec3 {
        self.normal().normalize_or_zero()
    }

    /// Compute the area of the triangle.
    pub fn area(&self) -> f32 {
        self.normal().length() * 0.5
    }
}

impl Default for Triangle {
    fn default() -> Self {
        Self {
            v0: Vec3::ZERO,
            v1: Vec3::X,
            v2: Vec3::Y,
        }
    }
}

/// An indexed triangle mesh with precomputed adjacency.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vec3>,
    faces: Vec<[usize; 3]>,
    vertex_faces: Vec<Vec<usize>>,
    neighbors: Vec<Vec<usize>>,
}

impl Mesh {
    /// Create a mesh, validating that every face references three distinct,
    /// existing vertices.
    pub fn new(vertices: Vec<Vec3>, faces: Vec<[usize; 3]>) -> Result<Self, DataError> {
        let n = vertices.len();
        for (face_idx, face) in faces.iter().enumerate() {
            if let Some(&bad) = face.iter().find(|&&v| v >= n) {
                return Err(DataError::InvalidFace {
                    face: face_idx,
                    reason: format!("vertex index {} out of range for {} vertices", bad, n),
                });
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(DataError::InvalidFace {
                    face: face_idx,
                    reason: format!("repeated vertex index in {:?}", face),
                });
            }
        }

        let mut vertex_faces = vec![Vec::new(); n];
        let mut neighbors = vec![Vec::new(); n];
        for (face_idx, face) in faces.iter().enumerate() {
            for (slot, &v) in face.iter().enumerate() {
                vertex_faces[v].push(face_idx);
                neighbors[v].push(face[(slot + 1) % 3]);
                neighbors[v].push(face[(slot + 2) % 3]);
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        Ok(Self {
            vertices,
            faces,
            vertex_faces,
            neighbors,
        })
    }

    /// Create a mesh without faces, e.g. a point cloud.
    pub fn from_points(vertices: Vec<Vec3>) -> Self {
        let n = vertices.len();
        Self {
            vertices,
            faces: Vec::new(),
            vertex_faces: vec![Vec::new(); n],
            neighbors: vec![Vec::new(); n],
        }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn vertex(&self, index: usize) -> Vec3 {
        self.vertices[index]
    }

    /// Indices of the faces incident to `vertex`, in ascending order.
    pub fn vertex_faces(&self, vertex: usize) -> &[usize] {
        &self.vertex_faces[vertex]
    }

    /// One-ring neighbours of `vertex`, sorted ascending.
    pub fn neighbors(&self, vertex: usize) -> &[usize] {
        &self.neighbors[vertex]
    }

    pub fn triangle(&self, face: usize) -> Triangle {
        let [a, b, c] = self.faces[face];
        Triangle::new(self.vertices[a], self.vertices[b], self.vertices[c])
    }

    /// Area-weighted vertex normal. Zero if all incident faces are degenerate.
    pub fn vertex_normal(&self, vertex: usize) -> Vec3 {
        self.vertex_faces[vertex]
            .iter()
            .map(|&f| self.triangle(f).normal())
            .sum::<Vec3>()
            .normalize_or_zero()
    }

    /// Length of the shortest edge incident to each vertex.
    pub fn shortest_incident_edges(&self) -> Vec<f32> {
        (0..self.vertex_count())
            .map(|v| {
                self.neighbors[v]
                    .iter()
                    .map(|&n| self.vertices[v].distance(self.vertices[n]))
                    .fold(f32::INFINITY, f32::min)
            })
            .collect()
    }
}

/// A local geodesic polar coordinate system around one center vertex.
///
/// Holds one `(radial, angular)` pair per mesh vertex. Vertices that were not
/// reached within the maximal radius carry [`GpcSystem::UNREACHED`] as radial
/// coordinate and `0.0` as angular coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct GpcSystem {
    center: usize,
    radial: Vec<f32>,
    angular: Vec<f32>,
}

impl GpcSystem {
    /// Sentinel radial coordinate of unreached vertices.
    pub const UNREACHED: f32 = f32::INFINITY;

    pub fn new(center: usize, radial: Vec<f32>, angular: Vec<f32>) -> Result<Self, DataError> {
        let invalid = |reason: String| DataError::InvalidGpcSystem { center, reason };
        if radial.len() != angular.len() {
            return Err(invalid(format!(
                "{} radial but {} angular coordinates",
                radial.len(),
                angular.len()
            )));
        }
        if center >= radial.len() {
            return Err(invalid(format!("center outside of {} vertices", radial.len())));
        }
        if radial[center] != 0.0 {
            return Err(invalid(format!(
                "center radial coordinate is {}",
                radial[center]
            )));
        }
        if radial.iter().any(|r| r.is_nan() || *r < 0.0) {
            return Err(invalid("negative or NaN radial coordinate".to_string()));
        }
        Ok(Self {
            center,
            radial,
            angular,
        })
    }

    pub fn center(&self) -> usize {
        self.center
    }

    pub fn radial(&self) -> &[f32] {
        &self.radial
    }

    pub fn angular(&self) -> &[f32] {
        &self.angular
    }

    pub fn len(&self) -> usize {
        self.radial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radial.is_empty()
    }

    pub fn is_reached(&self, vertex: usize) -> bool {
        self.radial[vertex].is_finite()
    }

    pub fn reached_count(&self) -> usize {
        self.radial.iter().filter(|r| r.is_finite()).count()
    }

    /// Cartesian position of `vertex` in the local chart, `None` if unreached.
    pub fn cartesian(&self, vertex: usize) -> Option<Vec2> {
        if !self.is_reached(vertex) {
            return None;
        }
        let (sin, cos) = self.angular[vertex].sin_cos();
        Some(Vec2::new(cos, sin) * self.radial[vertex])
    }
}

/// Three `(vertex index, weight)` pairs interpolating one template point.
pub type BarycentricRecord = [(u32, f32); 3];

/// Largest vertex index an `f32` holds exactly.
const MAX_DENSE_INDEX: f32 = 16_777_216.0;

/// Barycentric coordinates of every template point in every GPC system.
///
/// Both arrays are shaped `(centers, n_radial, n_angular, 3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BarycentricCoordinates {
    indices: Array4<u32>,
    weights: Array4<f32>,
}

impl BarycentricCoordinates {
    pub fn new(indices: Array4<u32>, weights: Array4<f32>) -> Result<Self, DataError> {
        if indices.dim() != weights.dim() || indices.dim().3 != 3 {
            return Err(DataError::ShapeMismatch {
                expected: indices.shape().to_vec(),
                found: weights.shape().to_vec(),
            });
        }
        Ok(Self { indices, weights })
    }

    /// Assemble from per-center record lists laid out radial-major.
    pub fn from_records(
        n_radial: usize,
        n_angular: usize,
        records: &[Vec<BarycentricRecord>],
    ) -> Result<Self, DataError> {
        let per_center = n_radial * n_angular;
        if let Some(bad) = records.iter().find(|r| r.len() != per_center) {
            return Err(DataError::ShapeMismatch {
                expected: vec![per_center],
                found: vec![bad.len()],
            });
        }
        let shape = (records.len(), n_radial, n_angular, 3);
        let indices = Array4::from_shape_fn(shape, |(c, i, j, s)| records[c][i * n_angular + j][s].0);
        let weights = Array4::from_shape_fn(shape, |(c, i, j, s)| records[c][i * n_angular + j][s].1);
        Ok(Self { indices, weights })
    }

    /// Convert from the combined `(centers, n_radial, n_angular, 3, {index, weight})` layout.
    pub fn from_dense(dense: &Array5<f32>) -> Result<Self, DataError> {
        let (c, r, a, s, k) = dense.dim();
        if s != 3 || k != 2 {
            return Err(DataError::ShapeMismatch {
                expected: vec![c, r, a, 3, 2],
                found: dense.shape().to_vec(),
            });
        }
        if let Some(&bad) = dense
            .slice(s![.., .., .., .., 0])
            .iter()
            .find(|&&v| !((0.0..=MAX_DENSE_INDEX).contains(&v) && v.fract() == 0.0))
        {
            return Err(DataError::Format(format!(
                "dense vertex index {} is not an integer in [0, 2^24]",
                bad
            )));
        }
        let shape = (c, r, a, 3);
        let indices = Array4::from_shape_fn(shape, |(c, i, j, s)| dense[[c, i, j, s, 0]] as u32);
        let weights = Array4::from_shape_fn(shape, |(c, i, j, s)| dense[[c, i, j, s, 1]]);
        Ok(Self { indices, weights })
    }

    /// The combined `(centers, n_radial, n_angular, 3, {index, weight})` layout.
    pub fn to_dense(&self) -> Array5<f32> {
        let (c, r, a, _) = self.indices.dim();
        Array5::from_shape_fn((c, r, a, 3, 2), |(c, i, j, s, k)| {
            if k == 0 {
                self.indices[[c, i, j, s]] as f32
            } else {
                self.weights[[c, i, j, s]]
            }
        })
    }

    pub fn n_centers(&self) -> usize {
        self.indices.dim().0
    }

    pub fn n_radial(&self) -> usize {
        self.indices.dim().1
    }

    pub fn n_angular(&self) -> usize {
        self.indices.dim().2
    }

    pub fn indices(&self) -> ArrayView4<'_, u32> {
        self.indices.view()
    }

    pub fn weights(&self) -> ArrayView4<'_, f32> {
        self.weights.view()
    }

    pub fn record(&self, center: usize, radial: usize, angular: usize) -> BarycentricRecord {
        std::array::from_fn(|s| {
            (
                self.indices[[center, radial, angular, s]],
                self.weights[[center, radial, angular, s]],
            )
        })
    }

    /// Largest referenced vertex index, `None` if there are no records.
    pub fn max_index(&self) -> Option<u32> {
        self.indices.iter().copied().max()
    }

    /// Cyclically shift the angular template axis by `steps`.
    ///
    /// Entry `j` of the result holds what entry `j + steps` held before.
    pub fn roll_angular(&self, steps: isize) -> Self {
        let n_angular = self.n_angular() as isize;
        let source = |j: usize| (j as isize + steps).rem_euclid(n_angular.max(1)) as usize;
        let shape = self.indices.dim();
        Self {
            indices: Array4::from_shape_fn(shape, |(c, i, j, s)| self.indices[[c, i, source(j), s]]),
            weights: Array4::from_shape_fn(shape, |(c, i, j, s)| self.weights[[c, i, source(j), s]]),
        }
    }
}
