//! PLY file loading functions

use crate::{DataError, Mesh};
use glam::Vec3;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

// Face structure for PLY files
#[derive(Deserialize, Debug)]
struct PlyFace {
    #[serde(alias = "vertex_index")]
    vertex_indices: Vec<i64>,
}

// PLY file structure
#[derive(Deserialize, Debug)]
struct PlyFile {
    #[serde(rename = "vertex")]
    vertex: Vec<HashMap<String, JsonValue>>,
    #[serde(default, rename = "face")]
    face: Vec<PlyFace>,
}

fn read_ply(path: &Path) -> Result<PlyFile, DataError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    serde_ply::from_reader(reader).map_err(|e| {
        warn!("Failed to parse PLY file: {}", e);
        DataError::Ply(e.to_string())
    })
}

/// Load a triangle mesh from a PLY file.
///
/// Only vertex positions and faces are read. Polygons with more than three
/// corners are fan-triangulated around their first corner.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_mesh_from_ply(path: impl AsRef<Path>) -> Result<Mesh, DataError> {
    debug!("Loading PLY mesh from: {}", path.as_ref().display());
    let ply_data = read_ply(path.as_ref())?;

    info!(
        "PLY file parsed: {} vertices, {} faces",
        ply_data.vertex.len(),
        ply_data.face.len()
    );

    fn get_f32(prop: Option<&JsonValue>) -> Option<f32> {
        prop.and_then(|v| match v {
            JsonValue::Number(n) => n.as_f64().map(|f| f as f32),
            _ => None,
        })
    }

    let mut vertices = Vec::with_capacity(ply_data.vertex.len());
    for (i, vertex) in ply_data.vertex.iter().enumerate() {
        let x = get_f32(vertex.get("x")).ok_or(DataError::MissingProperty {
            property: "x",
            vertex: i,
        })?;
        let y = get_f32(vertex.get("y")).ok_or(DataError::MissingProperty {
            property: "y",
            vertex: i,
        })?;
        let z = get_f32(vertex.get("z")).ok_or(DataError::MissingProperty {
            property: "z",
            vertex: i,
        })?;
        vertices.push(Vec3::new(x, y, z));
    }

    let mut faces = Vec::with_capacity(ply_data.face.len());
    for (face_idx, face) in ply_data.face.iter().enumerate() {
        let corners = face
            .vertex_indices
            .iter()
            .map(|&i| {
                usize::try_from(i).map_err(|_| DataError::InvalidFace {
                    face: face_idx,
                    reason: format!("negative vertex index {}", i),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if corners.len() < 3 {
            return Err(DataError::InvalidFace {
                face: face_idx,
                reason: format!("polygon with {} corners", corners.len()),
            });
        }
        for k in 1..corners.len() - 1 {
            faces.push([corners[0], corners[k], corners[k + 1]]);
        }
    }

    if faces.len() != ply_data.face.len() {
        debug!(
            "Fan-triangulated {} polygons into {} triangles",
            ply_data.face.len(),
            faces.len()
        );
    }

    Mesh::new(vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SQUARE_PLY: &str = "ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
1 1 0
0 1 0
4 0 1 2 3
";

    #[test]
    fn test_load_quad_is_fan_triangulated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SQUARE_PLY.as_bytes()).unwrap();

        let mesh = load_mesh_from_ply(file.path()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.faces(), &[[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.vertex(2), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_load_point_cloud_without_faces() {
        let ply = "ply
format ascii 1.0
element vertex 3
property float x
property float y
property float z
end_header
0 0 0
0.5 0 1
0 2 0
";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ply.as_bytes()).unwrap();

        let cloud = load_mesh_from_ply(file.path()).unwrap();
        assert_eq!(cloud.vertex_count(), 3);
        assert_eq!(cloud.face_count(), 0);
        assert!(cloud.neighbors(1).is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_mesh_from_ply("/nonexistent/mesh.ply");
        assert!(matches!(result, Err(DataError::Io(_))));
    }
}
