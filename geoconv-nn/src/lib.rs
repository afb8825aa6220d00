//! Geoconv NN Crate
//!
//! Tensor stages of a geodesic convolution layer, framework-agnostic and
//! built on `ndarray`:
//!
//! ## Modules
//!
//! - [`pullback`]: interpolate vertex signals at template points
//! - [`conv`]: rotation-equivariant geodesic and Dirac convolution
//! - [`pooling`]: angular max pooling
//! - [`layer`]: the three stages bundled with a config and weights
//!
//! Every differentiable stage has an explicit backward function, so the
//! layer can be driven by any training loop. Barycentric weights never
//! receive gradients.

mod config;
pub mod conv;
mod error;
pub mod layer;
pub mod pooling;
pub mod pullback;
mod weights;

pub use config::{Activation, ConvConfig, Variant};
pub use conv::{ConvGradients, ConvOutput, conv_backward, geodesic_conv};
pub use error::NnError;
pub use layer::{GeodesicConvLayer, LayerCache};
pub use pooling::{
    PooledResponse, angular_max_pooling, angular_max_pooling_backward, angular_max_pooling_batch,
};
pub use pullback::{pullback, pullback_backward, pullback_batch};
pub use weights::ConvWeights;
