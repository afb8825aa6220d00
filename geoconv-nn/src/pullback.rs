//! Interpolation of vertex signals at template points.
//!
//! Barycentric weights are constants: gradients flow into the signal only.

use crate::NnError;
use geoconv_data::BarycentricCoordinates;
use ndarray::{Array2, Array4, Array5, ArrayView2, ArrayView3, ArrayView4, ArrayViewMut3, Axis};
use std::ops::Range;

/// Reject barycentric coordinates that reference vertices outside the signal.
pub(crate) fn check_indices(bc: &BarycentricCoordinates, n_vertices: usize) -> Result<(), NnError> {
    match bc.max_index() {
        Some(index) if index as usize >= n_vertices => Err(NnError::IndexOutOfRange {
            index,
            vertices: n_vertices,
        }),
        _ => Ok(()),
    }
}

/// Interpolate the template of one center into `out` `(n_radial, n_angular, features)`.
fn pullback_center(
    signal: &ArrayView2<f32>,
    bc: &BarycentricCoordinates,
    center: usize,
    mut out: ArrayViewMut3<f32>,
) {
    let indices = bc.indices();
    let weights = bc.weights();
    for ((i, a), mut value) in out
        .lanes_mut(Axis(2))
        .into_iter()
        .enumerate()
        .map(|(p, lane)| ((p / bc.n_angular(), p % bc.n_angular()), lane))
    {
        for slot in 0..3 {
            let vertex = indices[[center, i, a, slot]] as usize;
            value.scaled_add(weights[[center, i, a, slot]], &signal.row(vertex));
        }
    }
}

/// Pull back the centers in `centers`, `(centers.len(), n_radial, n_angular, features)`.
pub(crate) fn pullback_range(
    signal: &ArrayView2<f32>,
    bc: &BarycentricCoordinates,
    centers: Range<usize>,
) -> Array4<f32> {
    let features = signal.ncols();
    let mut out = Array4::zeros((centers.len(), bc.n_radial(), bc.n_angular(), features));
    for (center, slice) in centers.zip(out.outer_iter_mut()) {
        pullback_center(signal, bc, center, slice);
    }
    out
}

/// Signal values at every template point of every center,
/// `(centers, n_radial, n_angular, features)`.
pub fn pullback(signal: ArrayView2<f32>, bc: &BarycentricCoordinates) -> Result<Array4<f32>, NnError> {
    check_indices(bc, signal.nrows())?;
    Ok(pullback_range(&signal, bc, 0..bc.n_centers()))
}

/// [`pullback`] for a batch of independent shapes sharing one vertex count.
///
/// `signals` is `(batch, vertices, features)` with one set of barycentric
/// coordinates per shape; the result is `(batch, centers, n_radial, n_angular, features)`.
pub fn pullback_batch(
    signals: ArrayView3<f32>,
    bcs: &[BarycentricCoordinates],
) -> Result<Array5<f32>, NnError> {
    let (batch, vertices, features) = signals.dim();
    if bcs.len() != batch {
        return Err(NnError::shape("barycentric batch", &[batch], &[bcs.len()]));
    }
    let Some(first) = bcs.first() else {
        return Ok(Array5::zeros((0, 0, 0, 0, features)));
    };
    let expected = first.indices().shape().to_vec();
    for bc in bcs {
        if bc.indices().shape() != expected.as_slice() {
            return Err(NnError::shape("barycentric coordinates", &expected, bc.indices().shape()));
        }
        check_indices(bc, vertices)?;
    }

    let mut out = Array5::zeros((batch, first.n_centers(), first.n_radial(), first.n_angular(), features));
    for ((signal, bc), mut slot) in signals.outer_iter().zip(bcs).zip(out.outer_iter_mut()) {
        slot.assign(&pullback_range(&signal, bc, 0..bc.n_centers()));
    }
    Ok(out)
}

/// Scatter a gradient w.r.t. the pulled-back signal onto the vertex signal.
///
/// `grad` has the shape returned by [`pullback`]; the result is `(n_vertices, features)`.
pub fn pullback_backward(
    grad: ArrayView4<f32>,
    bc: &BarycentricCoordinates,
    n_vertices: usize,
) -> Result<Array2<f32>, NnError> {
    let (centers, rings, angles, features) = grad.dim();
    let expected = [bc.n_centers(), bc.n_radial(), bc.n_angular()];
    if [centers, rings, angles] != expected {
        return Err(NnError::shape("pullback gradient", &expected, &[centers, rings, angles]));
    }
    check_indices(bc, n_vertices)?;
    Ok(scatter_range(&grad, bc, 0..centers, n_vertices, features))
}

/// Accumulate the gradient of `centers` (rows of `grad` in order) into a
/// fresh `(n_vertices, features)` array.
pub(crate) fn scatter_range(
    grad: &ArrayView4<f32>,
    bc: &BarycentricCoordinates,
    centers: Range<usize>,
    n_vertices: usize,
    features: usize,
) -> Array2<f32> {
    let mut signal_grad = Array2::zeros((n_vertices, features));
    scatter_into(grad, bc, centers, &mut signal_grad);
    signal_grad
}

pub(crate) fn scatter_into(
    grad: &ArrayView4<f32>,
    bc: &BarycentricCoordinates,
    centers: Range<usize>,
    signal_grad: &mut Array2<f32>,
) {
    let indices = bc.indices();
    let weights = bc.weights();
    for (row, center) in centers.enumerate() {
        for i in 0..bc.n_radial() {
            for a in 0..bc.n_angular() {
                let lane = grad.slice(ndarray::s![row, i, a, ..]);
                for slot in 0..3 {
                    let vertex = indices[[center, i, a, slot]] as usize;
                    signal_grad
                        .row_mut(vertex)
                        .scaled_add(weights[[center, i, a, slot]], &lane);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoconv_data::BarycentricRecord;
    use ndarray::{Array3, array};

    fn coordinates(records: Vec<Vec<BarycentricRecord>>, n_radial: usize, n_angular: usize) -> BarycentricCoordinates {
        BarycentricCoordinates::from_records(n_radial, n_angular, &records).unwrap()
    }

    #[test]
    fn test_unit_weights_retrieve_signal() {
        let signal = array![[1.5, -2.0], [0.25, 4.0], [7.0, 0.5]];
        let records = (0..3)
            .map(|v| vec![[(v as u32, 1.0), (0, 0.0), (0, 0.0)]; 4])
            .collect();
        let bc = coordinates(records, 2, 2);
        let pulled = pullback(signal.view(), &bc).unwrap();
        for v in 0..3 {
            for i in 0..2 {
                for a in 0..2 {
                    assert_eq!(pulled.slice(ndarray::s![v, i, a, ..]), signal.row(v));
                }
            }
        }
    }

    #[test]
    fn test_weighted_sum() {
        let signal = array![[1.0], [2.0], [4.0]];
        let bc = coordinates(vec![vec![[(0, 0.5), (1, 0.25), (2, 0.25)]]], 1, 1);
        let pulled = pullback(signal.view(), &bc).unwrap();
        assert_eq!(pulled[[0, 0, 0, 0]], 0.5 + 0.5 + 1.0);
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let signal = Array2::<f32>::zeros((2, 1));
        let bc = coordinates(vec![vec![[(2, 1.0), (0, 0.0), (0, 0.0)]]], 1, 1);
        assert!(matches!(
            pullback(signal.view(), &bc),
            Err(NnError::IndexOutOfRange { index: 2, vertices: 2 })
        ));
    }

    #[test]
    fn test_batch_matches_single() {
        let signals = Array3::from_shape_fn((2, 3, 2), |(b, v, f)| (b * 10 + v * 2 + f) as f32);
        let bc_a = coordinates(vec![vec![[(0, 0.2), (1, 0.3), (2, 0.5)]; 2]; 3], 1, 2);
        let bc_b = coordinates(vec![vec![[(2, 1.0), (0, 0.0), (0, 0.0)]; 2]; 3], 1, 2);
        let batch = pullback_batch(signals.view(), &[bc_a.clone(), bc_b.clone()]).unwrap();
        assert_eq!(batch.shape(), &[2, 3, 1, 2, 2]);
        let single = pullback(signals.index_axis(Axis(0), 1), &bc_b).unwrap();
        assert_eq!(batch.index_axis(Axis(0), 1), single);

        assert!(pullback_batch(signals.view(), &[bc_a]).is_err());
    }

    #[test]
    fn test_backward_is_adjoint() {
        // <pullback(x), g> == <x, pullback_backward(g)>
        let signal = Array2::from_shape_fn((4, 3), |(v, f)| (v as f32 - 1.5) * (f as f32 + 0.5));
        let records = (0..4)
            .map(|c| {
                (0..6)
                    .map(|p| {
                        let a = ((c + p) % 4) as u32;
                        let b = ((c + 2 * p + 1) % 4) as u32;
                        [(a, 0.6), (b, 0.3), (c as u32, 0.1)]
                    })
                    .collect()
            })
            .collect();
        let bc = coordinates(records, 2, 3);
        let grad = Array4::from_shape_fn((4, 2, 3, 3), |(c, i, a, f)| ((c + i + a + f) % 5) as f32 - 2.0);

        let forward: f32 = (&pullback(signal.view(), &bc).unwrap() * &grad).sum();
        let backward: f32 = (&signal * &pullback_backward(grad.view(), &bc, 4).unwrap()).sum();
        assert!((forward - backward).abs() < 1e-4);
    }
}
