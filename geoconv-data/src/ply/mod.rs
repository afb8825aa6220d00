//! PLY file loading and parsing

mod loader;

pub use loader::load_mesh_from_ply;
