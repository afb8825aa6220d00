//! Trainable kernel parameters.

use crate::{ConvConfig, NnError, Variant};
use ndarray::{Array3, Array4, Array5, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Kernel weights of one convolution layer, owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConvWeights {
    /// `(filters, n_angular, n_radial, output_dim, input_dim)`
    Geodesic { kernel: Array5<f32> },
    /// `gains: (filters, n_angular, n_radial)`, `matrices: (filters, output_dim, input_dim)`
    Dirac {
        gains: Array3<f32>,
        matrices: Array3<f32>,
    },
}

fn glorot_limit(fan_in: usize, fan_out: usize) -> f32 {
    (6.0 / (fan_in + fan_out) as f32).sqrt()
}

impl ConvWeights {
    /// All-zero weights.
    pub fn zeros(config: &ConvConfig, input_dim: usize) -> Self {
        let (t, a, r, o) = (config.filters, config.n_angular, config.n_radial, config.output_dim);
        match config.variant {
            Variant::Geodesic => ConvWeights::Geodesic {
                kernel: Array5::zeros((t, a, r, o, input_dim)),
            },
            Variant::Dirac => ConvWeights::Dirac {
                gains: Array3::zeros((t, a, r)),
                matrices: Array3::zeros((t, o, input_dim)),
            },
        }
    }

    /// Glorot-uniform initialisation, reproducible from `seed`.
    ///
    /// Geodesic kernels count every template cell towards both fans. Dirac
    /// gains use `n_angular * n_radial` inputs and one output; the shared
    /// matrices use `input_dim` and `output_dim`.
    pub fn glorot_uniform(config: &ConvConfig, input_dim: usize, seed: u64) -> Result<Self, NnError> {
        config.validate()?;
        if input_dim == 0 {
            return Err(NnError::InvalidConfig("input_dim must be positive".to_string()));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let (t, a, r, o) = (config.filters, config.n_angular, config.n_radial, config.output_dim);
        let cells = a * r;

        Ok(match config.variant {
            Variant::Geodesic => {
                let limit = glorot_limit(cells * input_dim, cells * o);
                ConvWeights::Geodesic {
                    kernel: Array5::from_shape_fn((t, a, r, o, input_dim), |_| {
                        rng.gen_range(-limit..=limit)
                    }),
                }
            }
            Variant::Dirac => {
                let gain_limit = glorot_limit(cells, 1);
                let gains = Array3::from_shape_fn((t, a, r), |_| rng.gen_range(-gain_limit..=gain_limit));
                let matrix_limit = glorot_limit(input_dim, o);
                let matrices = Array3::from_shape_fn((t, o, input_dim), |_| {
                    rng.gen_range(-matrix_limit..=matrix_limit)
                });
                ConvWeights::Dirac { gains, matrices }
            }
        })
    }

    pub fn variant(&self) -> Variant {
        match self {
            ConvWeights::Geodesic { .. } => Variant::Geodesic,
            ConvWeights::Dirac { .. } => Variant::Dirac,
        }
    }

    pub fn input_dim(&self) -> usize {
        match self {
            ConvWeights::Geodesic { kernel } => kernel.dim().4,
            ConvWeights::Dirac { matrices, .. } => matrices.dim().2,
        }
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            ConvWeights::Geodesic { kernel } => kernel.len(),
            ConvWeights::Dirac { gains, matrices } => gains.len() + matrices.len(),
        }
    }

    /// Reject weights whose shape does not belong to `config`.
    pub fn check(&self, config: &ConvConfig) -> Result<(), NnError> {
        let (t, a, r, o) = (config.filters, config.n_angular, config.n_radial, config.output_dim);
        if self.variant() != config.variant {
            return Err(NnError::InvalidConfig(format!(
                "{:?} weights for a {:?} layer",
                self.variant(),
                config.variant
            )));
        }
        let f = self.input_dim();
        match self {
            ConvWeights::Geodesic { kernel } => {
                if kernel.dim() != (t, a, r, o, f) {
                    return Err(NnError::shape("kernel", &[t, a, r, o, f], kernel.shape()));
                }
            }
            ConvWeights::Dirac { gains, matrices } => {
                if gains.dim() != (t, a, r) {
                    return Err(NnError::shape("dirac gains", &[t, a, r], gains.shape()));
                }
                if matrices.dim() != (t, o, f) {
                    return Err(NnError::shape("dirac matrices", &[t, o, f], matrices.shape()));
                }
            }
        }
        Ok(())
    }

    /// Kernel summed over filters, `(n_angular, n_radial, output_dim, input_dim)`.
    ///
    /// Filters only ever enter the response through their sum.
    pub fn summed_kernel(&self) -> Array4<f32> {
        match self {
            ConvWeights::Geodesic { kernel } => kernel.sum_axis(Axis(0)),
            ConvWeights::Dirac { gains, matrices } => {
                let (t, a, r) = gains.dim();
                let (_, o, f) = matrices.dim();
                let mut summed = Array4::zeros((a, r, o, f));
                for filter in 0..t {
                    let matrix = matrices.index_axis(Axis(0), filter);
                    for angle in 0..a {
                        for ring in 0..r {
                            let gain = gains[[filter, angle, ring]];
                            summed
                                .slice_mut(ndarray::s![angle, ring, .., ..])
                                .scaled_add(gain, &matrix);
                        }
                    }
                }
                summed
            }
        }
    }

    /// Chain a gradient of the summed kernel back onto these parameters.
    pub(crate) fn gradient_from_summed(&self, summed_grad: &Array4<f32>) -> Self {
        match self {
            ConvWeights::Geodesic { kernel } => {
                let mut grad = Array5::zeros(kernel.raw_dim());
                for mut filter in grad.outer_iter_mut() {
                    filter.assign(summed_grad);
                }
                ConvWeights::Geodesic { kernel: grad }
            }
            ConvWeights::Dirac { gains, matrices } => {
                let (t, a, r) = gains.dim();
                let mut gains_grad = Array3::zeros((t, a, r));
                let mut matrices_grad = Array3::zeros(matrices.raw_dim());
                for filter in 0..t {
                    let matrix = matrices.index_axis(Axis(0), filter);
                    for angle in 0..a {
                        for ring in 0..r {
                            let cell = summed_grad.slice(ndarray::s![angle, ring, .., ..]);
                            gains_grad[[filter, angle, ring]] = (&cell * &matrix).sum();
                            matrices_grad
                                .index_axis_mut(Axis(0), filter)
                                .scaled_add(gains[[filter, angle, ring]], &cell);
                        }
                    }
                }
                ConvWeights::Dirac {
                    gains: gains_grad,
                    matrices: matrices_grad,
                }
            }
        }
    }
}
