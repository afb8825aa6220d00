//! GPC systems for every vertex of a mesh, computed on a worker pool.

use super::builder::compute_gpc_system;
use crate::GpcError;
use geoconv_data::{GpcStore, GpcSystem, Mesh};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{info, warn};

/// Shared flag that asks a running computation to stop.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Maximal geodesic radius of the GPC systems.
#[derive(Debug, Clone, PartialEq)]
pub enum MaxRadius {
    Uniform(f32),
    /// One radius per center vertex.
    PerVertex(Vec<f32>),
}

impl MaxRadius {
    fn for_center(&self, center: usize) -> f32 {
        match self {
            MaxRadius::Uniform(r) => *r,
            MaxRadius::PerVertex(radii) => radii[center],
        }
    }

    fn check(&self, vertex_count: usize) -> Result<(), GpcError> {
        match self {
            MaxRadius::PerVertex(radii) if radii.len() != vertex_count => {
                Err(GpcError::InvalidParameter(format!(
                    "{} maximal radii for {} vertices",
                    radii.len(),
                    vertex_count
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupOptions {
    /// Worker threads; 0 lets rayon pick one per core.
    pub processes: usize,
    pub interrupt: Option<Interrupt>,
    /// Log progress every this many finished systems; 0 disables it.
    pub progress_every: usize,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            processes: 0,
            interrupt: None,
            progress_every: 500,
        }
    }
}

struct Progress<'a> {
    options: &'a GroupOptions,
    done: AtomicUsize,
    total: usize,
}

impl<'a> Progress<'a> {
    fn new(options: &'a GroupOptions, total: usize) -> Self {
        Self {
            options,
            done: AtomicUsize::new(0),
            total,
        }
    }

    fn check(&self) -> Result<(), GpcError> {
        match &self.options.interrupt {
            Some(interrupt) if interrupt.is_triggered() => Err(GpcError::Interrupted {
                completed: self.done.load(Ordering::SeqCst),
                total: self.total,
            }),
            _ => Ok(()),
        }
    }

    fn finish_one(&self) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        let every = self.options.progress_every;
        if every > 0 && (done % every == 0 || done == self.total) {
            info!("GPC systems: {}/{}", done, self.total);
        }
    }
}

fn build_pool(processes: usize) -> Result<rayon::ThreadPool, GpcError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(processes)
        .thread_name(|idx| format!("geoconv-gpc-{}", idx))
        .build()?)
}

/// One GPC system per mesh vertex, in vertex order.
#[derive(Debug, Clone, PartialEq)]
pub struct GpcSystemGroup {
    systems: Vec<GpcSystem>,
}

impl GpcSystemGroup {
    pub fn new(systems: Vec<GpcSystem>) -> Result<Self, GpcError> {
        if let Some((position, system)) = systems
            .iter()
            .enumerate()
            .find(|(position, system)| system.center() != *position)
        {
            return Err(GpcError::InvalidParameter(format!(
                "system at position {} has center {}",
                position,
                system.center()
            )));
        }
        Ok(Self { systems })
    }

    /// Compute the GPC system of every vertex.
    ///
    /// An interrupt discards everything computed so far.
    #[tracing::instrument(skip_all, fields(vertices = mesh.vertex_count(), processes = options.processes))]
    pub fn compute(
        mesh: &Mesh,
        max_radius: &MaxRadius,
        options: &GroupOptions,
    ) -> Result<Self, GpcError> {
        let n = mesh.vertex_count();
        max_radius.check(n)?;
        let pool = build_pool(options.processes)?;
        let progress = Progress::new(options, n);

        let systems = pool.install(|| {
            (0..n)
                .into_par_iter()
                .map(|center| -> Result<GpcSystem, GpcError> {
                    progress.check()?;
                    let system = compute_gpc_system(mesh, center, max_radius.for_center(center))?;
                    progress.finish_one();
                    Ok(system)
                })
                .collect::<Result<Vec<_>, GpcError>>()
        })?;

        let unreached = systems.iter().filter(|s| s.reached_count() == 1).count();
        if unreached > 0 {
            warn!("{} centers reached no other vertex", unreached);
        }
        info!("Computed {} GPC systems", systems.len());
        Ok(Self { systems })
    }

    /// Compute every system missing from `store` and persist it immediately.
    ///
    /// Returns the number of systems written. Records already in the store
    /// are kept, so an interrupted run resumes where it stopped.
    #[tracing::instrument(skip_all, fields(store = %store.root().display()))]
    pub fn compute_into_store(
        mesh: &Mesh,
        max_radius: &MaxRadius,
        options: &GroupOptions,
        store: &GpcStore,
    ) -> Result<usize, GpcError> {
        let n = mesh.vertex_count();
        if store.vertex_count() != n {
            return Err(GpcError::InvalidParameter(format!(
                "store holds {} vertices, mesh has {}",
                store.vertex_count(),
                n
            )));
        }
        max_radius.check(n)?;

        let pending: Vec<usize> = (0..n).filter(|&c| !store.contains(c)).collect();
        info!("{} of {} GPC systems already stored", n - pending.len(), n);

        let pool = build_pool(options.processes)?;
        let progress = Progress::new(options, pending.len());
        pool.install(|| {
            pending.par_iter().try_for_each(|&center| {
                progress.check()?;
                let system = compute_gpc_system(mesh, center, max_radius.for_center(center))?;
                store.save(&system)?;
                progress.finish_one();
                Ok::<(), GpcError>(())
            })
        })?;

        Ok(pending.len())
    }

    /// Load a complete group from a store.
    pub fn load(store: &GpcStore) -> Result<Self, GpcError> {
        Ok(Self {
            systems: store.load_all()?,
        })
    }

    /// Write every system to `store`, replacing records already there.
    pub fn save(&self, store: &GpcStore) -> Result<(), GpcError> {
        for system in &self.systems {
            store.save(system)?;
        }
        Ok(())
    }

    pub fn systems(&self) -> &[GpcSystem] {
        &self.systems
    }

    pub fn get(&self, center: usize) -> Option<&GpcSystem> {
        self.systems.get(center)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
