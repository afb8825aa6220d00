//! The polar sample grid of a geodesic convolution kernel.

use crate::GpcError;
use glam::Vec2;
use ndarray::Array3;
use std::f32::consts::TAU;

/// `n_radial x n_angular` polar sample points.
///
/// Ring `i` lies at radius `radius * (i + 1) / n_radial`, so the innermost
/// ring is off the center and the outermost ring sits exactly at `radius`.
/// Angle `j` is `2π j / n_angular`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Template {
    n_radial: usize,
    n_angular: usize,
    radius: f32,
}

impl Template {
    pub fn new(n_radial: usize, n_angular: usize, radius: f32) -> Result<Self, GpcError> {
        if n_radial == 0 || n_angular == 0 {
            return Err(GpcError::InvalidTemplate(format!(
                "template needs at least one ring and one angle, got {}x{}",
                n_radial, n_angular
            )));
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(GpcError::InvalidTemplate(format!(
                "template radius must be positive and finite, got {}",
                radius
            )));
        }
        Ok(Self {
            n_radial,
            n_angular,
            radius,
        })
    }

    pub fn n_radial(&self) -> usize {
        self.n_radial
    }

    pub fn n_angular(&self) -> usize {
        self.n_angular
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Number of sample points.
    pub fn len(&self) -> usize {
        self.n_radial * self.n_angular
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(radius, angle)` of sample `(i, j)`.
    pub fn polar(&self, i: usize, j: usize) -> (f32, f32) {
        let rho = self.radius * (i + 1) as f32 / self.n_radial as f32;
        let theta = TAU * j as f32 / self.n_angular as f32;
        (rho, theta)
    }

    pub fn cartesian(&self, i: usize, j: usize) -> Vec2 {
        let (rho, theta) = self.polar(i, j);
        let (sin, cos) = theta.sin_cos();
        Vec2::new(rho * cos, rho * sin)
    }

    /// All sample points, radial-major.
    pub fn points(&self) -> impl Iterator<Item = Vec2> + '_ {
        (0..self.n_radial).flat_map(move |i| (0..self.n_angular).map(move |j| self.cartesian(i, j)))
    }

    /// `(n_radial, n_angular, 2)` Cartesian coordinates.
    pub fn to_array(&self) -> Array3<f32> {
        Array3::from_shape_fn((self.n_radial, self.n_angular, 2), |(i, j, c)| {
            let p = self.cartesian(i, j);
            if c == 0 { p.x } else { p.y }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rings_are_linearly_spaced() {
        let template = Template::new(4, 6, 2.0).unwrap();
        let radii: Vec<f32> = (0..4).map(|i| template.polar(i, 0).0).collect();
        assert_eq!(radii, vec![0.5, 1.0, 1.5, 2.0]);
        assert!((template.polar(0, 3).1 - std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_cartesian_layout() {
        let template = Template::new(2, 4, 1.0).unwrap();
        let p = template.cartesian(1, 1);
        assert!(p.x.abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);

        let array = template.to_array();
        assert_eq!(array.shape(), &[2, 4, 2]);
        assert_eq!(array[[0, 0, 0]], 0.5);
        assert_eq!(template.points().count(), template.len());
    }

    #[test]
    fn test_rejects_invalid_template() {
        assert!(matches!(
            Template::new(3, 8, 0.0),
            Err(GpcError::InvalidTemplate(_))
        ));
        assert!(Template::new(3, 8, -1.0).is_err());
        assert!(Template::new(3, 8, f32::NAN).is_err());
        assert!(Template::new(3, 8, f32::INFINITY).is_err());
        assert!(Template::new(0, 8, 1.0).is_err());
        assert!(Template::new(3, 0, 1.0).is_err());
    }
}
