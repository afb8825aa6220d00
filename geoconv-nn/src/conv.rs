//! Rotation-equivariant geodesic convolution.
//!
//! For every center `v` and evaluated rotation `r`:
//!
//! ```text
//! response[v, r] = act(Σ_t Σ_i Σ_a W[t, (a + r) mod A, i] · x[v, i, a])
//! ```
//!
//! where `x` is the signal pulled back onto the template. Filters only enter
//! through `Σ_t W[t]`, so the kernel is summed once and then rolled into one
//! `(output_dim, n_radial * n_angular * input_dim)` matrix per rotation. Each
//! response entry is a single dot product of a kernel row with the flattened
//! template of one center, which makes the result independent of how the
//! vertices are chunked.

use crate::pullback::{check_indices, pullback_range, scatter_into};
use crate::{ConvConfig, ConvWeights, NnError};
use geoconv_data::BarycentricCoordinates;
use ndarray::{Array2, Array3, Array4, ArrayView2, ArrayView3};
use tracing::debug;

/// Convolution result before pooling, both `(centers, n_rotations, output_dim)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvOutput {
    pub pre_activation: Array3<f32>,
    pub response: Array3<f32>,
}

/// Gradients of one convolution w.r.t. its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvGradients {
    /// `(vertices, input_dim)`
    pub signal: Array2<f32>,
    /// Same variant and shapes as the weights.
    pub weights: ConvWeights,
}

/// Kernel for `rotation`, `(output_dim, n_radial * n_angular * input_dim)`.
///
/// Column `(i, a, f)` holds `K[(a + rotation) mod A, i, :, f]`, matching the
/// row-major flattening of a pulled-back template `(n_radial, n_angular, input_dim)`.
fn rotated_kernel(summed: &Array4<f32>, rotation: usize) -> Array2<f32> {
    let (a_len, r_len, o_len, f_len) = summed.dim();
    Array2::from_shape_fn((o_len, r_len * a_len * f_len), |(o, column)| {
        let f = column % f_len;
        let a = (column / f_len) % a_len;
        let i = column / (f_len * a_len);
        summed[[(a + rotation) % a_len, i, o, f]]
    })
}

fn validate(
    signal: &ArrayView2<f32>,
    bc: &BarycentricCoordinates,
    weights: &ConvWeights,
    config: &ConvConfig,
) -> Result<(), NnError> {
    config.validate()?;
    weights.check(config)?;
    if signal.ncols() != weights.input_dim() {
        return Err(NnError::shape("signal features", &[weights.input_dim()], &[signal.ncols()]));
    }
    let expected = [config.n_radial, config.n_angular];
    let found = [bc.n_radial(), bc.n_angular()];
    if found != expected {
        return Err(NnError::shape("barycentric template", &expected, &found));
    }
    check_indices(bc, signal.nrows())
}

/// Chunks of `chunk` consecutive centers.
fn chunks(n_centers: usize, chunk: usize) -> impl Iterator<Item = std::ops::Range<usize>> {
    (0..n_centers)
        .step_by(chunk)
        .map(move |start| start..(start + chunk).min(n_centers))
}

/// Convolve `signal` `(vertices, input_dim)` around every center of `bc`.
///
/// Shapes are checked before any numeric work. Centers are processed in
/// `config.splits` chunks; only one chunk of pulled-back templates is held
/// in memory at a time.
#[tracing::instrument(skip_all, fields(
    vertices = signal.nrows(),
    centers = bc.n_centers(),
    splits = config.splits
))]
pub fn geodesic_conv(
    signal: ArrayView2<f32>,
    bc: &BarycentricCoordinates,
    weights: &ConvWeights,
    config: &ConvConfig,
) -> Result<ConvOutput, NnError> {
    validate(&signal, bc, weights, config)?;

    let n_centers = bc.n_centers();
    let rotations = config.rotations();
    let summed = weights.summed_kernel();
    let kernels: Vec<Array2<f32>> = rotations.iter().map(|&r| rotated_kernel(&summed, r)).collect();
    let row_len = config.n_radial * config.n_angular * signal.ncols();

    let mut pre_activation = Array3::zeros((n_centers, rotations.len(), config.output_dim));
    let chunk = config.chunk_size(n_centers);
    for centers in chunks(n_centers, chunk) {
        debug!("Convolving centers {:?}", centers);
        let pulled = pullback_range(&signal, bc, centers.clone());
        let flat = pulled
            .into_shape_with_order((centers.len(), row_len))
            .map_err(|_| NnError::shape("pulled-back chunk", &[centers.len(), row_len], &[]))?;

        for (row, center) in centers.enumerate() {
            let x = flat.row(row);
            for (q, kernel) in kernels.iter().enumerate() {
                for (o, kernel_row) in kernel.outer_iter().enumerate() {
                    pre_activation[[center, q, o]] = kernel_row.dot(&x);
                }
            }
        }
    }

    let activation = config.activation;
    let response = pre_activation.mapv(|z| activation.apply(z));
    Ok(ConvOutput {
        pre_activation,
        response,
    })
}

/// Gradients of [`geodesic_conv`] given the gradient of its `response`.
///
/// `pre_activation` is the one returned by the forward pass for the same
/// inputs. Barycentric weights are treated as constants.
#[tracing::instrument(skip_all, fields(vertices = signal.nrows(), centers = bc.n_centers()))]
pub fn conv_backward(
    signal: ArrayView2<f32>,
    bc: &BarycentricCoordinates,
    weights: &ConvWeights,
    config: &ConvConfig,
    pre_activation: ArrayView3<f32>,
    grad_response: ArrayView3<f32>,
) -> Result<ConvGradients, NnError> {
    validate(&signal, bc, weights, config)?;
    let n_centers = bc.n_centers();
    let rotations = config.rotations();
    let expected = [n_centers, rotations.len(), config.output_dim];
    if pre_activation.shape() != expected {
        return Err(NnError::shape("pre-activation", &expected, pre_activation.shape()));
    }
    if grad_response.shape() != expected {
        return Err(NnError::shape("response gradient", &expected, grad_response.shape()));
    }

    let activation = config.activation;
    let mut grad_pre = grad_response.to_owned();
    grad_pre.zip_mut_with(&pre_activation, |g, &z| *g *= activation.derivative(z));

    let (a_len, r_len, f_len) = (config.n_angular, config.n_radial, signal.ncols());
    let row_len = r_len * a_len * f_len;
    let summed = weights.summed_kernel();
    let kernels: Vec<Array2<f32>> = rotations.iter().map(|&r| rotated_kernel(&summed, r)).collect();

    let mut signal_grad = Array2::zeros((signal.nrows(), f_len));
    // Gradient of every rolled kernel, un-rolled at the end
    let mut kernel_grads: Vec<Array2<f32>> = kernels.iter().map(|k| Array2::zeros(k.raw_dim())).collect();

    let chunk = config.chunk_size(n_centers);
    for centers in chunks(n_centers, chunk) {
        let pulled = pullback_range(&signal, bc, centers.clone());
        let flat = pulled
            .into_shape_with_order((centers.len(), row_len))
            .map_err(|_| NnError::shape("pulled-back chunk", &[centers.len(), row_len], &[]))?;
        let mut pulled_grad = Array2::<f32>::zeros((centers.len(), row_len));

        for (row, center) in centers.clone().enumerate() {
            let x = flat.row(row);
            for (q, kernel) in kernels.iter().enumerate() {
                let g = grad_pre.slice(ndarray::s![center, q, ..]);
                // dX += Kᵀ g, dK += g xᵀ
                pulled_grad.row_mut(row).scaled_add(1.0, &kernel.t().dot(&g));
                for (o, &g_o) in g.iter().enumerate() {
                    if g_o != 0.0 {
                        kernel_grads[q].row_mut(o).scaled_add(g_o, &x);
                    }
                }
            }
        }

        let pulled_grad = pulled_grad
            .into_shape_with_order((centers.len(), r_len, a_len, f_len))
            .map_err(|_| NnError::shape("pulled-back gradient", &[centers.len(), r_len, a_len, f_len], &[]))?;
        scatter_into(&pulled_grad.view(), bc, centers, &mut signal_grad);
    }

    let mut summed_grad = Array4::<f32>::zeros(summed.raw_dim());
    for (&rotation, grad) in rotations.iter().zip(&kernel_grads) {
        for ((o, column), &value) in grad.indexed_iter() {
            let f = column % f_len;
            let a = (column / f_len) % a_len;
            let i = column / (f_len * a_len);
            summed_grad[[(a + rotation) % a_len, i, o, f]] += value;
        }
    }

    Ok(ConvGradients {
        signal: signal_grad,
        weights: weights.gradient_from_summed(&summed_grad),
    })
}
