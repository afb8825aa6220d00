//! Preprocessing stages: PLY → GPC store → barycentric coordinates.

use crate::CliError;
use crate::config::{PreprocessConfig, PreprocessSummary};
use geoconv_data::{DataError, GpcStore, Mesh, load_barycentric, save_barycentric};
use geoconv_gpc::{
    GpcSystemGroup, GroupOptions, MaxRadius, Template, compute_barycentric_coordinates,
    compute_point_cloud_barycentric, distance_matrix, kth_neighbor_distances,
    reconstruct_template,
};
use glam::Vec3;
use std::io::ErrorKind;
use tracing::info;

/// Per-vertex GPC radius and the template radius derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Radii {
    pub per_vertex: Vec<f32>,
    pub template_radius: f32,
}

/// Use the `kth_neighbor` distance of every vertex as its GPC radius and the
/// scaled mean of those distances as the template radius.
#[tracing::instrument(skip_all, fields(points = points.len(), k = config.kth_neighbor))]
pub fn radii(points: &[Vec3], config: &PreprocessConfig) -> Result<Radii, CliError> {
    let distances = distance_matrix(points);
    let per_vertex = kth_neighbor_distances(&distances, config.kth_neighbor)?;
    let mean = per_vertex.iter().map(|&d| d as f64).sum::<f64>() / per_vertex.len() as f64;
    let template_radius = mean as f32 * config.template_scale;
    info!(
        "Mean distance to neighbour {}: {:.6}, template radius {:.6}",
        config.kth_neighbor, mean, template_radius
    );
    Ok(Radii {
        per_vertex,
        template_radius,
    })
}

fn options(config: &PreprocessConfig) -> GroupOptions {
    GroupOptions {
        processes: config.processes,
        ..Default::default()
    }
}

/// Compute the GPC systems still missing from the store under `config.output`.
pub fn run_gpc(mesh: &Mesh, config: &PreprocessConfig) -> Result<PreprocessSummary, CliError> {
    let radii = radii(mesh.vertices(), config)?;
    let store = GpcStore::create(config.gpc_dir(), mesh.vertex_count())?;
    let written = GpcSystemGroup::compute_into_store(
        mesh,
        &MaxRadius::PerVertex(radii.per_vertex),
        &options(config),
        &store,
    )?;
    info!(
        "GPC store {} complete, {} systems written this run",
        store.root().display(),
        written
    );

    let summary = PreprocessSummary {
        vertex_count: mesh.vertex_count(),
        template_radius: radii.template_radius,
        config: config.clone(),
    };
    summary.save()?;
    Ok(summary)
}

/// Barycentric coordinates from a complete GPC store.
///
/// The template radius comes from the summary of the `gpc` stage when that
/// summary was written for the same mesh, scale and neighbour. Otherwise it is
/// recomputed.
pub fn run_barycentric(mesh: &Mesh, config: &PreprocessConfig) -> Result<Template, CliError> {
    let template_radius = match PreprocessSummary::load(config)? {
        Some(summary)
            if summary.vertex_count == mesh.vertex_count()
                && summary.config.template_scale == config.template_scale
                && summary.config.kth_neighbor == config.kth_neighbor =>
        {
            summary.template_radius
        }
        _ => radii(mesh.vertices(), config)?.template_radius,
    };
    let template = Template::new(config.n_radial, config.n_angular, template_radius)?;
    let group = GpcSystemGroup::load(&GpcStore::open(config.gpc_dir())?)?;
    let coordinates = compute_barycentric_coordinates(&group, mesh, &template)?;
    save_barycentric(config.barycentric_stem(), &coordinates)?;
    Ok(template)
}

/// Barycentric coordinates of a point cloud in SHOT tangent planes.
pub fn run_point_cloud(mesh: &Mesh, config: &PreprocessConfig) -> Result<(), CliError> {
    let radii = radii(mesh.vertices(), config)?;
    let template = Template::new(config.n_radial, config.n_angular, radii.template_radius)?;
    let coordinates = compute_point_cloud_barycentric(
        mesh.vertices(),
        &template,
        config.lrf_neighbors,
        config.kth_neighbor,
    )?;
    save_barycentric(config.barycentric_stem(), &coordinates)?;
    PreprocessSummary {
        vertex_count: mesh.vertex_count(),
        template_radius: radii.template_radius,
        config: config.clone(),
    }
    .save()
}

/// Every stage for `mesh`; meshes without faces take the point cloud path.
pub fn run_preprocess(mesh: &Mesh, config: &PreprocessConfig) -> Result<(), CliError> {
    if mesh.face_count() == 0 {
        info!("No faces, preprocessing as a point cloud");
        return run_point_cloud(mesh, config);
    }
    run_gpc(mesh, config)?;
    run_barycentric(mesh, config)?;
    Ok(())
}

/// Text report on a mesh and whatever has been preprocessed for it.
pub fn describe(
    mesh: &Mesh,
    config: &PreprocessConfig,
    center: Option<usize>,
) -> Result<String, CliError> {
    let mut lines = vec![format!(
        "mesh: {} vertices, {} faces",
        mesh.vertex_count(),
        mesh.face_count()
    )];
    let edges = mesh.shortest_incident_edges();
    if let Some(shortest) = edges
        .iter()
        .copied()
        .filter(|e| e.is_finite())
        .min_by(f32::total_cmp)
    {
        lines.push(format!("shortest edge: {:.6}", shortest));
    }

    let store = if config.gpc_dir().join("manifest.json").is_file() {
        let store = GpcStore::open(config.gpc_dir())?;
        lines.push(format!(
            "gpc store: {} of {} systems",
            store.stored_centers()?.len(),
            store.vertex_count()
        ));
        Some(store)
    } else {
        lines.push("gpc store: none".to_string());
        None
    };

    let coordinates = match load_barycentric(config.barycentric_stem()) {
        Ok(coordinates) => {
            lines.push(format!(
                "barycentric coordinates: {} centers, template {}x{}",
                coordinates.n_centers(),
                coordinates.n_radial(),
                coordinates.n_angular()
            ));
            Some(coordinates)
        }
        Err(DataError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            lines.push("barycentric coordinates: none".to_string());
            None
        }
        Err(e) => return Err(e.into()),
    };

    let Some(center) = center else {
        return Ok(lines.join("\n"));
    };
    if center >= mesh.vertex_count() {
        return Err(CliError::CenterOutOfRange {
            center,
            vertices: mesh.vertex_count(),
        });
    }
    if let (Some(store), Some(coordinates)) = (store, coordinates) {
        // coordinates may be left over from an earlier, smaller mesh
        if center >= coordinates.n_centers() {
            return Err(CliError::CenterOutOfRange {
                center,
                vertices: coordinates.n_centers(),
            });
        }
        let gpc = store.load(center)?;
        lines.push(format!(
            "center {}: {} vertices reached",
            center,
            gpc.reached_count()
        ));
        let cells: Vec<(usize, usize)> = (0..coordinates.n_radial())
            .flat_map(|i| (0..coordinates.n_angular()).map(move |j| (i, j)))
            .collect();
        let records: Vec<_> = cells
            .iter()
            .map(|&(i, j)| coordinates.record(center, i, j))
            .collect();
        let reconstructed = reconstruct_template(&gpc, &records);
        for (((i, j), record), point) in cells.iter().zip(&records).zip(reconstructed) {
            lines.push(format!(
                "  ({}, {}): vertices {:?} weights {:?} -> ({:.5}, {:.5})",
                i,
                j,
                record.map(|(v, _)| v),
                record.map(|(_, w)| w),
                point.x,
                point.y
            ));
        }
    }
    Ok(lines.join("\n"))
}
