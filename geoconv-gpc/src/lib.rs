//! Geoconv GPC Crate
//!
//! Preprocessing for geodesic convolutions:
//!
//! - [`distance`]: pairwise distances and radius/k-nearest neighbourhoods
//! - [`lrf`]: SHOT local reference frames and the logarithmic map
//! - [`gpc`]: geodesic polar coordinate systems via front propagation
//! - [`template`]: the polar sample grid of a convolution kernel
//! - [`barycentric`]: interpolation coefficients of template points
//!
//! Everything here runs once per mesh; the results are plain arrays consumed
//! by geoconv-nn.

pub mod barycentric;
pub mod distance;
mod error;
pub mod gpc;
pub mod lrf;
pub mod template;

pub use barycentric::{
    compute_barycentric, compute_barycentric_coordinates, compute_point_cloud_barycentric,
    reconstruct_template,
};
pub use distance::{
    Neighborhoods, distance_matrix, group_neighborhoods, knn_neighborhoods, kth_neighbor_distances,
};
pub use error::GpcError;
pub use gpc::{GpcSystemGroup, GroupOptions, Interrupt, MaxRadius, compute_gpc_system};
pub use lrf::{LocalReferenceFrame, logarithmic_map, shot_lrf};
pub use template::Template;
