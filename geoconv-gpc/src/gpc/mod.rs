//! Geodesic polar coordinate systems.
//!
//! [`compute_gpc_system`] propagates a geodesic front from one center vertex;
//! [`GpcSystemGroup`] runs it for every vertex of a mesh.

mod builder;
mod group;
mod unfold;

pub use builder::compute_gpc_system;
pub use group::{GpcSystemGroup, GroupOptions, Interrupt, MaxRadius};
