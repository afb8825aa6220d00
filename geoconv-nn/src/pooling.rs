//! Angular max pooling: keep the rotation whose response has the largest norm.

use crate::NnError;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, ArrayView4, Axis};

/// Pooled responses and the rotation each one came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PooledResponse {
    /// `(centers, output_dim)`
    pub values: Array2<f32>,
    /// Selected rotation slot per center.
    pub selected: Vec<usize>,
}

/// First rotation row with the maximal Euclidean norm.
fn argmax_norm(rows: ArrayView2<f32>) -> usize {
    let mut best = 0;
    let mut best_norm = f32::NEG_INFINITY;
    for (q, row) in rows.outer_iter().enumerate() {
        let norm = row.dot(&row);
        if norm > best_norm {
            best = q;
            best_norm = norm;
        }
    }
    best
}

/// Collapse the rotation axis of `response` `(centers, rotations, output_dim)`.
///
/// Ties go to the lowest rotation. The raw response row is returned, not its norm.
/// A response without rotations is rejected.
pub fn angular_max_pooling(response: ArrayView3<f32>) -> Result<PooledResponse, NnError> {
    let (centers, rotations, output_dim) = response.dim();
    if rotations == 0 {
        return Err(NnError::shape("response rotations", &[1], &[0]));
    }
    let mut values = Array2::zeros((centers, output_dim));
    let mut selected = Vec::with_capacity(centers);
    for (center, rows) in response.outer_iter().enumerate() {
        let q = argmax_norm(rows);
        values.row_mut(center).assign(&rows.row(q));
        selected.push(q);
    }
    Ok(PooledResponse { values, selected })
}

/// [`angular_max_pooling`] for `(batch, centers, rotations, output_dim)`.
pub fn angular_max_pooling_batch(
    responses: ArrayView4<f32>,
) -> Result<Vec<PooledResponse>, NnError> {
    responses
        .axis_iter(Axis(0))
        .map(angular_max_pooling)
        .collect()
}

/// Route the gradient of the pooled values to the selected rotations only.
pub fn angular_max_pooling_backward(
    grad: ArrayView2<f32>,
    selected: &[usize],
    n_rotations: usize,
) -> Result<Array3<f32>, NnError> {
    let (centers, output_dim) = grad.dim();
    if selected.len() != centers {
        return Err(NnError::shape("selected rotations", &[centers], &[selected.len()]));
    }
    if let Some(&q) = selected.iter().find(|&&q| q >= n_rotations) {
        return Err(NnError::shape("selected rotation", &[n_rotations], &[q]));
    }
    let mut out = Array3::zeros((centers, n_rotations, output_dim));
    for (center, &q) in selected.iter().enumerate() {
        out.slice_mut(ndarray::s![center, q, ..]).assign(&grad.row(center));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array4, array};

    #[test]
    fn test_selects_max_norm_row() {
        let response = array![
            [[1.0, 0.0], [0.0, -3.0], [2.0, 2.0]],
            [[0.5, 0.5], [0.1, 0.0], [-0.5, 0.0]],
        ];
        let pooled = angular_max_pooling(response.view()).unwrap();
        assert_eq!(pooled.selected, vec![1, 0]);
        assert_eq!(pooled.values, array![[0.0, -3.0], [0.5, 0.5]]);
    }

    #[test]
    fn test_ties_pick_lowest_rotation() {
        let response = array![[[0.0, 1.0], [1.0, 0.0], [0.0, -1.0]]];
        let pooled = angular_max_pooling(response.view()).unwrap();
        assert_eq!(pooled.selected, vec![0]);

        let zeros = Array3::<f32>::zeros((2, 4, 3));
        assert_eq!(angular_max_pooling(zeros.view()).unwrap().selected, vec![0, 0]);
    }

    #[test]
    fn test_rejects_empty_rotation_axis() {
        let empty = Array3::<f32>::zeros((3, 0, 2));
        assert!(matches!(
            angular_max_pooling(empty.view()),
            Err(NnError::ShapeMismatch { what: "response rotations", .. })
        ));
        let batch = Array4::<f32>::zeros((2, 3, 0, 2));
        assert!(angular_max_pooling_batch(batch.view()).is_err());

        let no_centers = Array3::<f32>::zeros((0, 4, 2));
        let pooled = angular_max_pooling(no_centers.view()).unwrap();
        assert_eq!(pooled.values.shape(), &[0, 2]);
        assert!(pooled.selected.is_empty());
    }

    #[test]
    fn test_batch() {
        let responses = Array4::from_shape_fn((2, 3, 4, 2), |(b, v, q, o)| {
            if q == (b + v) % 4 { 1.0 + o as f32 } else { 0.1 }
        });
        let pooled = angular_max_pooling_batch(responses.view()).unwrap();
        assert_eq!(pooled.len(), 2);
        assert_eq!(pooled[1].selected, vec![1, 2, 3]);
        assert_eq!(pooled[0].values.row(2).to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_backward_routes_to_selected() {
        let grad = array![[1.0, 2.0], [3.0, 4.0]];
        let out = angular_max_pooling_backward(grad.view(), &[2, 0], 3).unwrap();
        assert_eq!(out.shape(), &[2, 3, 2]);
        assert_eq!(out.slice(ndarray::s![0, 2, ..]).to_vec(), vec![1.0, 2.0]);
        assert_eq!(out.slice(ndarray::s![1, 0, ..]).to_vec(), vec![3.0, 4.0]);
        assert_eq!(out.sum(), 10.0);

        assert!(angular_max_pooling_backward(grad.view(), &[3, 0], 3).is_err());
        assert!(angular_max_pooling_backward(grad.view(), &[0], 3).is_err());
    }
}
