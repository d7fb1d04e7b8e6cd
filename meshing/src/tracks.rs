//! Track fusion on a regular lattice
//!
//! At a given grid resolution the domain is cut into cubic track cells
//! (`resolution` cells along its longest axis). Every depth sample falling in
//! a cell is fused into that cell's [`Track`]; the number of occupied cells
//! owned by a region is its track-count estimate.

use crate::dataset::DepthSample;
use cv_3d::spatial::{Hexahedron, VoxelGrid};
use cv_core::{Error, Result};
use nalgebra::{Point3, Vector3};
use std::collections::BTreeMap;

pub type CellKey = [u32; 3];

/// A fused candidate point.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Mean of the fused sample positions.
    pub position: Point3<f64>,
    /// Observing cameras, sorted and de-duplicated.
    pub cameras: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct TrackLattice {
    origin: Point3<f64>,
    step: f64,
    resolution: u32,
    tracks: BTreeMap<CellKey, Track>,
}

impl TrackLattice {
    /// Fuse `samples` into cells of size `longest_extent / resolution`.
    ///
    /// Samples outside `domain` are ignored.
    pub fn build(domain: &Hexahedron, resolution: u32, samples: &[DepthSample]) -> Result<Self> {
        if resolution == 0 {
            return Err(Error::InvalidInput(
                "track lattice resolution must be positive".to_string(),
            ));
        }
        let origin = domain.min();
        let extent = domain.extent();
        let longest = extent.max();
        if longest <= 0.0 {
            return Err(Error::InvalidInput("degenerate domain".to_string()));
        }
        let step = longest / resolution as f64;

        let mut cells = [1u32; 3];
        for (a, c) in cells.iter_mut().enumerate() {
            // Guard against ceil(resolution + epsilon) on the longest axis.
            let n = (extent[a] / step - 1e-9).ceil();
            *c = if n >= 1.0 { n as u32 } else { 1 };
        }

        let mut acc: BTreeMap<CellKey, (Vector3<f64>, usize, Vec<u32>)> = BTreeMap::new();
        for sample in samples {
            if !domain.contains(&sample.position) {
                continue;
            }
            let mut key = [0u32; 3];
            for a in 0..3 {
                let f = ((sample.position[a] - origin[a]) / step).floor();
                key[a] = if f <= 0.0 {
                    0
                } else {
                    (f as u32).min(cells[a] - 1)
                };
            }
            let entry = acc
                .entry(key)
                .or_insert_with(|| (Vector3::zeros(), 0, Vec::new()));
            entry.0 += sample.position.coords;
            entry.1 += 1;
            entry.2.push(sample.camera);
        }

        let tracks = acc
            .into_iter()
            .map(|(key, (sum, n, mut cameras))| {
                cameras.sort_unstable();
                cameras.dedup();
                let position = Point3::from(sum / n as f64);
                (key, Track { position, cameras })
            })
            .collect();

        Ok(Self {
            origin,
            step,
            resolution,
            tracks,
        })
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, key: &CellKey) -> Option<&Track> {
        self.tracks.get(key)
    }

    /// Tracks in ascending cell-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &Track)> {
        self.tracks.iter()
    }

    pub fn cell_center(&self, key: &CellKey) -> Point3<f64> {
        Point3::new(
            self.origin.x + (key[0] as f64 + 0.5) * self.step,
            self.origin.y + (key[1] as f64 + 0.5) * self.step,
            self.origin.z + (key[2] as f64 + 0.5) * self.step,
        )
    }

    /// Voxel of `grid` owning the cell (by cell center).
    pub fn voxel_of(&self, key: &CellKey, grid: &VoxelGrid) -> [u32; 3] {
        grid.voxel_of_point(&self.cell_center(key))
    }

    /// Occupied-cell count per voxel, indexed by [`VoxelGrid::linear_index`].
    pub fn voxel_counts(&self, grid: &VoxelGrid) -> Vec<u64> {
        let mut counts = vec![0u64; grid.num_voxels() as usize];
        for key in self.tracks.keys() {
            counts[grid.linear_index(self.voxel_of(key, grid))] += 1;
        }
        counts
    }

    /// Sorted union of the cameras observing any track.
    pub fn cameras(&self) -> Vec<u32> {
        let mut cams: Vec<u32> = self
            .tracks
            .values()
            .flat_map(|t| t.cameras.iter().copied())
            .collect();
        cams.sort_unstable();
        cams.dedup();
        cams
    }
}
