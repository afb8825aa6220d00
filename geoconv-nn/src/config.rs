//! Layer configuration.

use crate::NnError;
use geoconv_gpc::Template;
use serde::{Deserialize, Serialize};

/// Pointwise nonlinearity applied to the summed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Identity,
    Tanh,
}

impl Activation {
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Identity => x,
            Activation::Tanh => x.tanh(),
        }
    }

    /// Derivative at the pre-activation value `x`.
    pub fn derivative(self, x: f32) -> f32 {
        match self {
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Identity => 1.0,
            Activation::Tanh => 1.0 - x.tanh().powi(2),
        }
    }
}

/// How the kernel is parameterised per template cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// One `output_dim x input_dim` matrix per filter and template cell.
    #[default]
    Geodesic,
    /// One scalar gain per filter and template cell times one shared matrix
    /// per filter.
    Dirac,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvConfig {
    pub n_radial: usize,
    pub n_angular: usize,
    pub template_radius: f32,
    pub output_dim: usize,
    pub filters: usize,
    /// Evaluate every `rotation_delta`-th rotation only.
    pub rotation_delta: usize,
    pub activation: Activation,
    /// Number of vertex chunks processed one after another.
    pub splits: usize,
    pub variant: Variant,
}

impl Default for ConvConfig {
    fn default() -> Self {
        Self {
            n_radial: 5,
            n_angular: 8,
            template_radius: 0.03,
            output_dim: 16,
            filters: 1,
            rotation_delta: 1,
            activation: Activation::Relu,
            splits: 1,
            variant: Variant::Geodesic,
        }
    }
}

impl ConvConfig {
    pub fn validate(&self) -> Result<(), NnError> {
        let positive = [
            ("n_radial", self.n_radial),
            ("n_angular", self.n_angular),
            ("output_dim", self.output_dim),
            ("filters", self.filters),
            ("rotation_delta", self.rotation_delta),
            ("splits", self.splits),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(NnError::InvalidConfig(format!("{} must be positive", name)));
        }
        self.template()?;
        Ok(())
    }

    /// The template this layer samples, rejecting an invalid radius.
    pub fn template(&self) -> Result<Template, NnError> {
        Ok(Template::new(self.n_radial, self.n_angular, self.template_radius)?)
    }

    /// Rotations actually evaluated: `0, k, 2k, ...` below `n_angular`.
    pub fn rotations(&self) -> Vec<usize> {
        (0..self.n_angular).step_by(self.rotation_delta.max(1)).collect()
    }

    pub fn n_rotations(&self) -> usize {
        self.n_angular.div_ceil(self.rotation_delta.max(1))
    }

    /// Vertices per chunk for a mesh with `vertex_count` vertices.
    pub fn chunk_size(&self, vertex_count: usize) -> usize {
        vertex_count.div_ceil(self.splits.max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotations() {
        let config = ConvConfig {
            n_angular: 8,
            rotation_delta: 3,
            ..Default::default()
        };
        assert_eq!(config.rotations(), vec![0, 3, 6]);
        assert_eq!(config.n_rotations(), 3);
    }

    #[test]
    fn test_chunk_size() {
        let config = ConvConfig {
            splits: 3,
            ..Default::default()
        };
        assert_eq!(config.chunk_size(10), 4);
        assert_eq!(config.chunk_size(2), 1);
        assert_eq!(config.chunk_size(0), 1);
    }

    #[test]
    fn test_validate() {
        assert!(ConvConfig::default().validate().is_ok());
        let bad_radius = ConvConfig {
            template_radius: 0.0,
            ..Default::default()
        };
        assert!(matches!(bad_radius.validate(), Err(NnError::Template(_))));
        let no_filters = ConvConfig {
            filters: 0,
            ..Default::default()
        };
        assert!(matches!(no_filters.validate(), Err(NnError::InvalidConfig(_))));
    }

    #[test]
    fn test_json_uses_lowercase_names_and_defaults() {
        let config: ConvConfig =
            serde_json::from_str(r#"{"n_angular": 6, "activation": "tanh", "variant": "dirac"}"#)
                .unwrap();
        assert_eq!(config.n_angular, 6);
        assert_eq!(config.activation, Activation::Tanh);
        assert_eq!(config.variant, Variant::Dirac);
        assert_eq!(config.n_radial, ConvConfig::default().n_radial);
    }

    #[test]
    fn test_activation_derivatives() {
        assert_eq!(Activation::Relu.apply(-1.0), 0.0);
        assert_eq!(Activation::Relu.derivative(2.0), 1.0);
        assert_eq!(Activation::Relu.derivative(-2.0), 0.0);
        assert_eq!(Activation::Identity.derivative(5.0), 1.0);
        assert!((Activation::Tanh.derivative(0.0) - 1.0).abs() < 1e-6);
    }
}
