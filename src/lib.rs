//! Geoconv
//!
//! Geodesic convolution on triangle meshes and point clouds.
//!
//! ## Crates
//!
//! - [`data`]: meshes, PLY loading and on-disk stores
//! - [`gpc`]: geodesic polar coordinates, templates and barycentric coordinates
//! - [`nn`]: signal pullback, convolution and angular max pooling
//!
//! A typical run computes a [`gpc::GpcSystemGroup`] for a mesh once, turns it
//! into barycentric coordinates for the template of a layer, and then feeds
//! vertex signals through [`nn::GeodesicConvLayer`].

pub use geoconv_data as data;
pub use geoconv_gpc as gpc;
pub use geoconv_nn as nn;

pub use geoconv_data::{BarycentricCoordinates, GpcSystem, Mesh};
pub use geoconv_gpc::{GpcSystemGroup, Template};
pub use geoconv_nn::{ConvConfig, ConvWeights, GeodesicConvLayer};
