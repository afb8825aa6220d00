//! Geoconv Data Crate
//!
//! Mesh types, PLY loading, triangulation helpers and on-disk stores for
//! preprocessed GPC systems and barycentric coordinates.
//! This crate holds the data model only; the algorithms that produce GPC
//! systems and barycentric coordinates live in geoconv-gpc.

mod error;
pub mod ply;
pub mod store;
pub mod triangulation;
pub mod types;

pub use error::DataError;
pub use ply::load_mesh_from_ply;
pub use store::{GpcStore, load_barycentric, save_barycentric};
pub use triangulation::{grid_mesh, triangulate_plane};
pub use types::{BarycentricCoordinates, BarycentricRecord, GpcSystem, Mesh, Triangle};
