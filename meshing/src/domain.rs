//! Reconstruction volume and initial coarse grid
//!
//! [`SpatialDomainEstimator`] filters the raw observations and bounds them;
//! [`SpatialDomainEstimator::initial_grid`] picks a voxel tiling that is
//! coarse enough to plan over and fine enough for the per-voxel budget.

use crate::config::MeshingSettings;
use crate::dataset::{Dataset, DepthSample};
use crate::search::{GranularitySearch, SearchOutcome};
use crate::tracks::TrackLattice;
use cv_3d::spatial::{Hexahedron, VoxelGrid};
use cv_core::geometry::Camera;
use cv_core::{Error, Result};
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use tracing::{debug, info};

/// Half-size given to an axis on which all samples coincide.
const MIN_HALF_EXTENT: f64 = 1e-3;

/// Filtered observations and the volume that bounds them.
#[derive(Debug, Clone)]
pub struct Scene {
    pub cameras: Vec<Camera>,
    pub samples: Vec<DepthSample>,
    pub domain: Hexahedron,
}

impl Scene {
    pub fn lattice(&self, resolution: u32) -> Result<TrackLattice> {
        TrackLattice::build(&self.domain, resolution, &self.samples)
    }

    /// Track-count estimate of the whole domain at `resolution`.
    pub fn track_count(&self, resolution: u32) -> Result<u64> {
        Ok(self.lattice(resolution)?.len() as u64)
    }

    /// Run `search` over this scene and keep the lattice it accepted.
    pub fn search_lattice(
        &self,
        search: &GranularitySearch,
    ) -> Result<(SearchOutcome, TrackLattice)> {
        let mut last: Option<TrackLattice> = None;
        let outcome = search.run(|resolution| {
            let lattice = self.lattice(resolution)?;
            let count = lattice.len() as u64;
            last = Some(lattice);
            Ok(count)
        })?;
        let lattice = match last {
            Some(lattice) if lattice.resolution() == outcome.resolution => lattice,
            _ => self.lattice(outcome.resolution)?,
        };
        Ok((outcome, lattice))
    }
}

#[derive(Debug, Clone)]
pub struct SpatialDomainEstimator {
    pub sim_threshold: f64,
    pub space_margin: f64,
    pub min_samples_per_camera: usize,
}

impl SpatialDomainEstimator {
    pub fn new(settings: &MeshingSettings) -> Self {
        Self {
            sim_threshold: settings.sim_threshold,
            space_margin: settings.space_margin,
            min_samples_per_camera: settings.min_samples_per_camera,
        }
    }

    pub fn estimate(&self, dataset: Dataset) -> Result<Scene> {
        let total = dataset.samples.len();
        let mut samples: Vec<DepthSample> = dataset
            .samples
            .into_iter()
            .filter(|s| (s.sim as f64) <= self.sim_threshold)
            .collect();

        let mut per_camera: HashMap<u32, usize> = HashMap::new();
        for s in &samples {
            *per_camera.entry(s.camera).or_default() += 1;
        }
        let min_samples = self.min_samples_per_camera.max(1);
        let supported = |id: &u32| per_camera.get(id).copied().unwrap_or(0) >= min_samples;
        samples.retain(|s| supported(&s.camera));
        let cameras: Vec<Camera> = dataset
            .cameras
            .into_iter()
            .filter(|c| supported(&c.id))
            .collect();

        if samples.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no usable depth samples ({} loaded, similarity threshold {})",
                total, self.sim_threshold
            )));
        }

        let domain = self.bound(&samples);
        info!(
            cameras = cameras.len(),
            samples = samples.len(),
            dropped = total - samples.len(),
            extent = ?domain.extent().as_slice(),
            "Estimated reconstruction domain"
        );
        Ok(Scene {
            cameras,
            samples,
            domain,
        })
    }

    fn bound(&self, samples: &[DepthSample]) -> Hexahedron {
        let first = samples[0].position;
        let (mut min, mut max) = (first, first);
        for s in samples {
            let p = s.position;
            for a in 0..3 {
                min[a] = min[a].min(p[a]);
                max[a] = max[a].max(p[a]);
            }
        }

        let extent: Vector3<f64> = max - min;
        let margin = extent.max() * self.space_margin.max(0.0);
        let mut pad = Vector3::repeat(margin);
        for a in 0..3 {
            if extent[a] + 2.0 * pad[a] <= 0.0 {
                pad[a] = MIN_HALF_EXTENT;
            }
        }
        Hexahedron::from_aabb(Point3::from(min.coords - pad), Point3::from(max.coords + pad))
    }

    /// Coarse voxel grid over `lattice`'s domain.
    ///
    /// Voxel counts per axis stay proportional to the domain extents; the
    /// count along the longest axis doubles from 1 until no voxel holds more
    /// than `max_pts_per_voxel` tracks or `max_voxels_per_axis` is reached.
    pub fn initial_grid(
        &self,
        scene: &Scene,
        lattice: &TrackLattice,
        max_pts_per_voxel: u64,
        max_voxels_per_axis: u32,
    ) -> Result<VoxelGrid> {
        let extent = scene.domain.extent();
        let longest = extent.max();
        let cap = max_voxels_per_axis.max(1);

        let mut n = 1u32;
        loop {
            let mut dims = [1u32; 3];
            for (a, d) in dims.iter_mut().enumerate() {
                let v = (n as f64 * extent[a] / longest).round();
                *d = if v >= 1.0 { v as u32 } else { 1 };
            }
            let grid = VoxelGrid::new(scene.domain, dims, lattice.resolution())?;
            let fullest = lattice.voxel_counts(&grid).into_iter().max().unwrap_or(0);
            debug!(?dims, fullest, "Initial grid candidate");

            if fullest <= max_pts_per_voxel || n >= cap {
                info!(?dims, fullest, max_pts_per_voxel, "Initial voxel grid");
                return Ok(grid);
            }
            n = next_voxel_count(n, cap);
        }
    }
}

fn next_voxel_count(n: u32, cap: u32) -> u32 {
    n.saturating_mul(2).min(cap)
}
