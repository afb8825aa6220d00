//! A geodesic convolution followed by angular max pooling.

use crate::conv::{ConvGradients, conv_backward, geodesic_conv};
use crate::pooling::{angular_max_pooling, angular_max_pooling_backward};
use crate::{ConvConfig, ConvWeights, NnError};
use geoconv_data::BarycentricCoordinates;
use geoconv_gpc::Template;
use ndarray::{Array2, Array3, ArrayView2};
use tracing::info;

/// Values kept from a forward pass for the backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerCache {
    pub pre_activation: Array3<f32>,
    pub selected: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct GeodesicConvLayer {
    config: ConvConfig,
    template: Template,
    weights: ConvWeights,
}

impl GeodesicConvLayer {
    pub fn new(config: ConvConfig, weights: ConvWeights) -> Result<Self, NnError> {
        config.validate()?;
        weights.check(&config)?;
        let template = config.template()?;
        info!(
            "Geodesic conv layer: {:?}, template {}x{} radius {}, {} parameters",
            config.variant,
            template.n_radial(),
            template.n_angular(),
            template.radius(),
            weights.parameter_count()
        );
        Ok(Self {
            config,
            template,
            weights,
        })
    }

    /// A layer with Glorot-uniform weights.
    pub fn with_glorot(config: ConvConfig, input_dim: usize, seed: u64) -> Result<Self, NnError> {
        let weights = ConvWeights::glorot_uniform(&config, input_dim, seed)?;
        Self::new(config, weights)
    }

    pub fn config(&self) -> &ConvConfig {
        &self.config
    }

    /// The template that barycentric coordinates for this layer must be computed on.
    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn weights(&self) -> &ConvWeights {
        &self.weights
    }

    /// Replace the weights, e.g. after an optimiser step.
    pub fn set_weights(&mut self, weights: ConvWeights) -> Result<(), NnError> {
        weights.check(&self.config)?;
        self.weights = weights;
        Ok(())
    }

    /// Pooled output `(centers, output_dim)` and the cache for [`Self::backward`].
    pub fn forward(
        &self,
        signal: ArrayView2<f32>,
        bc: &BarycentricCoordinates,
    ) -> Result<(Array2<f32>, LayerCache), NnError> {
        let output = geodesic_conv(signal, bc, &self.weights, &self.config)?;
        let pooled = angular_max_pooling(output.response.view())?;
        Ok((
            pooled.values,
            LayerCache {
                pre_activation: output.pre_activation,
                selected: pooled.selected,
            },
        ))
    }

    pub fn backward(
        &self,
        signal: ArrayView2<f32>,
        bc: &BarycentricCoordinates,
        cache: &LayerCache,
        grad_output: ArrayView2<f32>,
    ) -> Result<ConvGradients, NnError> {
        let grad_response = angular_max_pooling_backward(
            grad_output,
            &cache.selected,
            self.config.n_rotations(),
        )?;
        conv_backward(
            signal,
            bc,
            &self.weights,
            &self.config,
            cache.pre_activation.view(),
            grad_response.view(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, Variant};
    use geoconv_data::BarycentricRecord;

    fn config() -> ConvConfig {
        ConvConfig {
            n_radial: 1,
            n_angular: 3,
            template_radius: 0.5,
            output_dim: 2,
            activation: Activation::Identity,
            ..Default::default()
        }
    }

    fn coordinates() -> BarycentricCoordinates {
        let records: Vec<Vec<BarycentricRecord>> = (0..3)
            .map(|c| {
                (0..3)
                    .map(|j| [(((c + j) % 3) as u32, 1.0), (0, 0.0), (0, 0.0)])
                    .collect()
            })
            .collect();
        BarycentricCoordinates::from_records(1, 3, &records).unwrap()
    }

    #[test]
    fn test_forward_shapes() {
        let layer = GeodesicConvLayer::with_glorot(config(), 4, 0).unwrap();
        assert_eq!(layer.template().n_angular(), 3);
        let signal = Array2::from_elem((3, 4), 0.5);
        let (pooled, cache) = layer.forward(signal.view(), &coordinates()).unwrap();
        assert_eq!(pooled.shape(), &[3, 2]);
        assert_eq!(cache.pre_activation.shape(), &[3, 3, 2]);
        assert_eq!(cache.selected.len(), 3);
    }

    #[test]
    fn test_backward_only_touches_selected_rotation() {
        let layer = GeodesicConvLayer::with_glorot(config(), 2, 1).unwrap();
        let signal = Array2::from_shape_fn((3, 2), |(v, f)| v as f32 - f as f32);
        let bc = coordinates();
        let (pooled, cache) = layer.forward(signal.view(), &bc).unwrap();
        let grads = layer
            .backward(signal.view(), &bc, &cache, Array2::ones(pooled.raw_dim()).view())
            .unwrap();
        assert_eq!(grads.signal.shape(), &[3, 2]);
        assert_eq!(grads.weights.variant(), Variant::Geodesic);
        assert_eq!(grads.weights.parameter_count(), layer.weights().parameter_count());
    }

    #[test]
    fn test_rejects_mismatched_weights() {
        let dirac = ConvConfig {
            variant: Variant::Dirac,
            ..config()
        };
        let weights = ConvWeights::zeros(&config(), 2);
        assert!(GeodesicConvLayer::new(dirac, weights).is_err());

        let mut layer = GeodesicConvLayer::with_glorot(config(), 2, 1).unwrap();
        let wider = ConvWeights::zeros(&ConvConfig { output_dim: 5, ..config() }, 2);
        assert!(layer.set_weights(wider).is_err());
    }

    #[test]
    fn test_invalid_template_radius_is_fatal() {
        let config = ConvConfig {
            template_radius: -1.0,
            ..config()
        };
        assert!(matches!(
            GeodesicConvLayer::with_glorot(config, 2, 0),
            Err(NnError::Template(_))
        ));
    }
}
