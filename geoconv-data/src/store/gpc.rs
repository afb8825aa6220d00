//! Directory store for GPC systems, one record file per center vertex.

use super::{FORMAT_VERSION, native_little_endian};
use crate::{DataError, GpcSystem};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MANIFEST: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    vertex_count: usize,
    little_endian: bool,
}

/// GPC systems persisted under a directory, keyed by center vertex index.
///
/// Records are written atomically (temporary file, then rename), so an
/// interrupted writer never leaves a truncated record behind.
#[derive(Debug, Clone)]
pub struct GpcStore {
    root: PathBuf,
    vertex_count: usize,
}

impl GpcStore {
    /// Create a store for a mesh with `vertex_count` vertices, or reopen an
    /// existing one if it was created for the same vertex count.
    pub fn create(root: impl AsRef<Path>, vertex_count: usize) -> Result<Self, DataError> {
        let root = root.as_ref().to_path_buf();
        if root.join(MANIFEST).exists() {
            let store = Self::open(&root)?;
            if store.vertex_count != vertex_count {
                return Err(DataError::Format(format!(
                    "store at {} holds {} vertices, expected {}",
                    root.display(),
                    store.vertex_count,
                    vertex_count
                )));
            }
            return Ok(store);
        }

        fs::create_dir_all(&root)?;
        let manifest = Manifest {
            version: FORMAT_VERSION,
            vertex_count,
            little_endian: native_little_endian(),
        };
        fs::write(root.join(MANIFEST), serde_json::to_vec_pretty(&manifest)?)?;
        info!("Created GPC store at {} for {} vertices", root.display(), vertex_count);
        Ok(Self { root, vertex_count })
    }

    /// Open an existing store.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, DataError> {
        let root = root.as_ref().to_path_buf();
        let manifest: Manifest = serde_json::from_slice(&fs::read(root.join(MANIFEST))?)?;
        if manifest.version != FORMAT_VERSION {
            return Err(DataError::Format(format!(
                "unsupported store version {}",
                manifest.version
            )));
        }
        if manifest.little_endian != native_little_endian() {
            return Err(DataError::Format(
                "store was written with a different byte order".to_string(),
            ));
        }
        Ok(Self {
            root,
            vertex_count: manifest.vertex_count,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    fn record_path(&self, center: usize) -> PathBuf {
        self.root.join(format!("gpc_{:08}.bin", center))
    }

    pub fn contains(&self, center: usize) -> bool {
        self.record_path(center).is_file()
    }

    /// Persist one GPC system, replacing any previous record for its center.
    pub fn save(&self, system: &GpcSystem) -> Result<(), DataError> {
        if system.len() != self.vertex_count {
            return Err(DataError::ShapeMismatch {
                expected: vec![self.vertex_count],
                found: vec![system.len()],
            });
        }

        let path = self.record_path(system.center());
        let tmp = path.with_extension("bin.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(bytemuck::cast_slice(system.radial()))?;
            file.write_all(bytemuck::cast_slice(system.angular()))?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!("Stored GPC system {}", system.center());
        Ok(())
    }

    /// Load the GPC system of one center vertex.
    pub fn load(&self, center: usize) -> Result<GpcSystem, DataError> {
        if center >= self.vertex_count {
            return Err(DataError::MissingRecord(center));
        }
        let path = self.record_path(center);
        if !path.is_file() {
            return Err(DataError::MissingRecord(center));
        }

        let mut file = File::open(&path)?;
        let expected_bytes = 2 * self.vertex_count * std::mem::size_of::<f32>();
        let actual_bytes = file.metadata()?.len() as usize;
        if actual_bytes != expected_bytes {
            return Err(DataError::Format(format!(
                "record {} has {} bytes, expected {}",
                path.display(),
                actual_bytes,
                expected_bytes
            )));
        }

        let mut radial = vec![0.0f32; self.vertex_count];
        let mut angular = vec![0.0f32; self.vertex_count];
        file.read_exact(bytemuck::cast_slice_mut(&mut radial))?;
        file.read_exact(bytemuck::cast_slice_mut(&mut angular))?;
        GpcSystem::new(center, radial, angular)
    }

    /// Centers that currently have a record, ascending.
    pub fn stored_centers(&self) -> Result<Vec<usize>, DataError> {
        let mut centers = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(index) = name
                .strip_prefix("gpc_")
                .and_then(|rest| rest.strip_suffix(".bin"))
                .and_then(|digits| digits.parse::<usize>().ok())
            {
                centers.push(index);
            }
        }
        centers.sort_unstable();
        Ok(centers)
    }

    /// Load every GPC system, in center order. Fails on the first missing record.
    pub fn load_all(&self) -> Result<Vec<GpcSystem>, DataError> {
        (0..self.vertex_count).map(|c| self.load(c)).collect()
    }
}
