//! Single-center GPC system construction by front propagation.

use super::unfold::unfold;
use crate::GpcError;
use geoconv_data::{GpcSystem, Mesh};
use glam::DVec3;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::f64::consts::TAU;
use tracing::debug;

const PARALLEL_EPS: f64 = 1e-12;

fn position(mesh: &Mesh, vertex: usize) -> DVec3 {
    mesh.vertex(vertex).as_dvec3()
}

/// Normal at `center`: area-weighted, else the cross product of the first two
/// non-parallel one-ring edges, else +Z.
fn center_normal(mesh: &Mesh, center: usize) -> DVec3 {
    let normal = mesh.vertex_normal(center).as_dvec3();
    if normal != DVec3::ZERO {
        return normal;
    }
    let origin = position(mesh, center);
    let edges: Vec<DVec3> = mesh
        .neighbors(center)
        .iter()
        .map(|&n| position(mesh, n) - origin)
        .collect();
    for (a, first) in edges.iter().enumerate() {
        for second in &edges[a + 1..] {
            let cross = first.cross(*second);
            if cross.length() > PARALLEL_EPS {
                return cross.normalize();
            }
        }
    }
    DVec3::Z
}

/// Tangent frame `(zero_axis, normal)`; the zero axis points towards the
/// lowest-index one-ring neighbour at non-zero distance.
fn local_axes(mesh: &Mesh, center: usize) -> Option<(DVec3, DVec3)> {
    let origin = position(mesh, center);
    let normal = center_normal(mesh, center);
    let zero = mesh
        .neighbors(center)
        .iter()
        .map(|&n| position(mesh, n) - origin)
        .find(|e| e.length() > PARALLEL_EPS)?;

    let tangent = zero - zero.dot(normal) * normal;
    let axis = if tangent.length() > PARALLEL_EPS {
        tangent.normalize()
    } else {
        zero.normalize()
    };
    Some((axis, normal))
}

/// Signed angle of `edge` around `normal`, measured from `axis`, in `[0, 2π)`.
fn polar_angle(edge: DVec3, axis: DVec3, normal: DVec3) -> f64 {
    let tangent = edge - edge.dot(normal) * normal;
    if tangent.length() <= PARALLEL_EPS {
        return 0.0;
    }
    let sin = normal.dot(axis.cross(tangent));
    let cos = axis.dot(tangent);
    sin.atan2(cos).rem_euclid(TAU)
}

/// Geodesic polar coordinates of every mesh vertex around `center`.
///
/// Vertices farther than `u_max` stay at [`GpcSystem::UNREACHED`]. `u_max`
/// may be infinite.
#[tracing::instrument(level = "debug", skip_all, fields(center = center))]
pub fn compute_gpc_system(mesh: &Mesh, center: usize, u_max: f32) -> Result<GpcSystem, GpcError> {
    if !(u_max > 0.0) {
        return Err(GpcError::InvalidParameter(format!(
            "maximal radius must be positive, got {}",
            u_max
        )));
    }
    let n = mesh.vertex_count();
    if center >= n {
        return Err(GpcError::InvalidParameter(format!(
            "center {} outside of {} vertices",
            center, n
        )));
    }

    let u_max = u_max as f64;
    let mut radial = vec![f64::INFINITY; n];
    let mut angular = vec![0.0f64; n];
    let mut accepted = vec![false; n];
    let mut heap = BinaryHeap::new();

    radial[center] = 0.0;
    accepted[center] = true;

    if let Some((axis, normal)) = local_axes(mesh, center) {
        let origin = position(mesh, center);
        for &neighbor in mesh.neighbors(center) {
            let edge = position(mesh, neighbor) - origin;
            let distance = edge.length();
            if distance < u_max {
                radial[neighbor] = distance;
                angular[neighbor] = polar_angle(edge, axis, normal);
                heap.push(Reverse((OrderedFloat(distance), neighbor)));
            }
        }
    }

    while let Some(Reverse((OrderedFloat(u_j), j))) = heap.pop() {
        if accepted[j] || u_j != radial[j] {
            continue;
        }
        accepted[j] = true;
        let v_j = position(mesh, j);

        for &face in mesh.vertex_faces(j) {
            let corners = mesh.faces()[face];
            for &i in corners.iter().filter(|&&i| i != j) {
                if accepted[i] {
                    continue;
                }
                let Some(&k) = corners.iter().find(|&&k| k != i && k != j) else {
                    continue;
                };
                // The center's angle carries no direction
                if k == center {
                    continue;
                }

                let v_i = position(mesh, i);
                let (u_i, theta_i) = if radial[k].is_finite() {
                    unfold(
                        v_i,
                        v_j,
                        position(mesh, k),
                        u_j,
                        radial[k],
                        angular[j],
                        angular[k],
                    )
                } else {
                    (u_j + v_i.distance(v_j), angular[j])
                };

                if u_i < u_max && u_i < radial[i] {
                    radial[i] = u_i;
                    angular[i] = theta_i;
                    heap.push(Reverse((OrderedFloat(u_i), i)));
                }
            }
        }
    }

    let radial: Vec<f32> = radial.into_iter().map(|u| u as f32).collect();
    let angular: Vec<f32> = angular
        .into_iter()
        .zip(&radial)
        .map(|(theta, u)| {
            let theta = theta as f32;
            // Rounding to f32 can land exactly on 2π
            if !u.is_finite() || theta >= std::f32::consts::TAU {
                0.0
            } else {
                theta
            }
        })
        .collect();

    let system = GpcSystem::new(center, radial, angular)?;
    debug!("Reached {} of {} vertices", system.reached_count(), n);
    Ok(system)
}
