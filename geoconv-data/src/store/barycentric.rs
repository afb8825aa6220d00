//! Persistence for barycentric coordinates: `<stem>.json` header plus
//! `<stem>.bin` payload (indices as `u32`, then weights as `f32`).

use super::{FORMAT_VERSION, native_little_endian};
use crate::{BarycentricCoordinates, DataError};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Header {
    version: u32,
    n_centers: usize,
    n_radial: usize,
    n_angular: usize,
    little_endian: bool,
}

/// `<stem>.<extension>`, keeping any dots already in the stem.
fn stem_path(stem: &Path, extension: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

#[tracing::instrument(skip_all, fields(stem = %stem.as_ref().display()))]
pub fn save_barycentric(
    stem: impl AsRef<Path>,
    coordinates: &BarycentricCoordinates,
) -> Result<(), DataError> {
    let stem = stem.as_ref();
    if let Some(parent) = stem.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let header = Header {
        version: FORMAT_VERSION,
        n_centers: coordinates.n_centers(),
        n_radial: coordinates.n_radial(),
        n_angular: coordinates.n_angular(),
        little_endian: native_little_endian(),
    };
    fs::write(stem_path(stem, "json"), serde_json::to_vec_pretty(&header)?)?;

    let indices: Vec<u32> = coordinates.indices().iter().copied().collect();
    let weights: Vec<f32> = coordinates.weights().iter().copied().collect();
    let mut file = File::create(stem_path(stem, "bin"))?;
    file.write_all(bytemuck::cast_slice(&indices))?;
    file.write_all(bytemuck::cast_slice(&weights))?;
    file.sync_all()?;

    info!(
        "Saved barycentric coordinates: {} centers, template {}x{}",
        header.n_centers, header.n_radial, header.n_angular
    );
    Ok(())
}

#[tracing::instrument(skip_all, fields(stem = %stem.as_ref().display()))]
pub fn load_barycentric(stem: impl AsRef<Path>) -> Result<BarycentricCoordinates, DataError> {
    let stem = stem.as_ref();
    let header: Header = serde_json::from_slice(&fs::read(stem_path(stem, "json"))?)?;
    if header.version != FORMAT_VERSION {
        return Err(DataError::Format(format!(
            "unsupported barycentric version {}",
            header.version
        )));
    }
    if header.little_endian != native_little_endian() {
        return Err(DataError::Format(
            "barycentric file was written with a different byte order".to_string(),
        ));
    }

    let shape = (header.n_centers, header.n_radial, header.n_angular, 3);
    let len = shape.0 * shape.1 * shape.2 * shape.3;

    let mut file = File::open(stem_path(stem, "bin"))?;
    let actual_bytes = file.metadata()?.len() as usize;
    let expected_bytes = len * (std::mem::size_of::<u32>() + std::mem::size_of::<f32>());
    if actual_bytes != expected_bytes {
        return Err(DataError::Format(format!(
            "payload has {} bytes, expected {}",
            actual_bytes, expected_bytes
        )));
    }

    let mut indices = vec![0u32; len];
    let mut weights = vec![0.0f32; len];
    file.read_exact(bytemuck::cast_slice_mut(&mut indices))?;
    file.read_exact(bytemuck::cast_slice_mut(&mut weights))?;

    let shape_error = |_| DataError::Format("payload does not match header shape".to_string());
    BarycentricCoordinates::new(
        Array4::from_shape_vec(shape, indices).map_err(shape_error)?,
        Array4::from_shape_vec(shape, weights).map_err(shape_error)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BarycentricRecord;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("nested").join("bc_3_4");
        let records: Vec<Vec<BarycentricRecord>> = (0..2)
            .map(|c| {
                (0..12)
                    .map(|p| [(c, 0.2), (p as u32, 0.3), (7, 0.5 + p as f32 * 1e-3)])
                    .collect()
            })
            .collect();
        let bc = BarycentricCoordinates::from_records(3, 4, &records).unwrap();

        save_barycentric(&stem, &bc).unwrap();
        let loaded = load_barycentric(&stem).unwrap();
        assert_eq!(loaded, bc);
    }

    #[test]
    fn test_truncated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("bc");
        let records = vec![vec![[(0, 1.0), (0, 0.0), (0, 0.0)]; 2]];
        let bc = BarycentricCoordinates::from_records(1, 2, &records).unwrap();
        save_barycentric(&stem, &bc).unwrap();

        let bin = stem_path(&stem, "bin");
        let bytes = fs::read(&bin).unwrap();
        fs::write(&bin, &bytes[..bytes.len() - 4]).unwrap();
        assert!(matches!(load_barycentric(&stem), Err(DataError::Format(_))));
    }

    #[test]
    fn test_dotted_stem_keeps_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("bc_0.03");
        let other = dir.path().join("bc_0.05");
        let records = vec![vec![[(0, 1.0), (0, 0.0), (0, 0.0)]; 2]];
        let bc = BarycentricCoordinates::from_records(1, 2, &records).unwrap();
        let wider = BarycentricCoordinates::from_records(2, 1, &records).unwrap();

        save_barycentric(&stem, &bc).unwrap();
        save_barycentric(&other, &wider).unwrap();
        assert!(dir.path().join("bc_0.03.json").is_file());
        assert!(dir.path().join("bc_0.03.bin").is_file());
        assert!(!dir.path().join("bc_0.json").exists());
        assert_eq!(load_barycentric(&stem).unwrap(), bc);
        assert_eq!(load_barycentric(&other).unwrap(), wider);
    }
}
