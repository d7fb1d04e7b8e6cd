//! Dense reconstruction engine seam
//!
//! The orchestrator only needs one capability from an engine: turn a block
//! request into a local mesh with a camera list per vertex.
//! [`LatticeSurfaceEngine`] is the built-in engine; it meshes the occupied
//! track cells directly and does not attempt a graph-cut reconstruction.

use crate::plan::Block;
use crate::tracks::{CellKey, Track, TrackLattice};
use cv_3d::mesh::TriangleMesh;
use cv_3d::spatial::{Hexahedron, VoxelGrid};
use cv_core::Result;
use nalgebra::Vector3;
use std::collections::BTreeMap;
use std::path::Path;

/// Engine output for one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalMeshResult {
    pub mesh: TriangleMesh,
    /// Supporting cameras per vertex, index-aligned with `mesh.vertices`.
    pub point_cameras: Vec<Vec<u32>>,
}

impl LocalMeshResult {
    pub fn num_vertices(&self) -> usize {
        self.mesh.num_vertices()
    }
}

/// Cross-camera consistency filter applied before surface extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyFilter {
    pub min_cameras: usize,
}

impl ConsistencyFilter {
    pub fn accepts(&self, track: &Track) -> bool {
        track.cameras.len() >= self.min_cameras
    }
}

/// Grid and fused tracks a block was planned on.
#[derive(Debug, Clone, Copy)]
pub struct GridHandle<'a> {
    pub grid: &'a VoxelGrid,
    pub tracks: &'a TrackLattice,
}

/// Everything an engine receives for one block.
#[derive(Debug, Clone)]
pub struct BlockRequest<'a> {
    pub block: &'a Block,
    pub neighbors: Vec<&'a Block>,
    pub cameras: &'a [u32],
    pub working_dir: &'a Path,
    pub grid: GridHandle<'a>,
    /// Track cell size per axis.
    pub steps: Vector3<f64>,
    /// Regions left out of the output mesh.
    pub exclude: Option<&'a [Hexahedron]>,
    pub regularization: Option<ConsistencyFilter>,
}

pub trait ReconstructionEngine {
    fn reconstruct(&mut self, request: &BlockRequest<'_>) -> Result<LocalMeshResult>;
}

/// Meshes occupied track cells as axis-aligned quads.
///
/// Every unit square of the lattice whose four corner cells hold usable
/// tracks becomes two triangles; the square belongs to the block owning its
/// minimum corner. Corners may be read from neighbor blocks so that seams
/// between blocks are closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatticeSurfaceEngine;

const PLANES: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];

fn offset(key: &CellKey, axes: &[usize]) -> CellKey {
    let mut k = *key;
    for &a in axes {
        k[a] += 1;
    }
    k
}

impl LatticeSurfaceEngine {
    fn usable<'r>(&self, request: &'r BlockRequest<'_>, key: &CellKey) -> Option<&'r Track> {
        let GridHandle { grid, tracks } = request.grid;
        let track = tracks.get(key)?;
        let voxel = tracks.voxel_of(key, grid);
        let in_reach = request.block.voxels.contains(voxel)
            || request.neighbors.iter().any(|n| n.voxels.contains(voxel));
        if !in_reach {
            return None;
        }
        if let Some(regions) = request.exclude {
            if regions.iter().any(|h| h.contains(&track.position)) {
                return None;
            }
        }
        if let Some(filter) = request.regularization {
            if !filter.accepts(track) {
                return None;
            }
        }
        Some(track)
    }
}

impl ReconstructionEngine for LatticeSurfaceEngine {
    fn reconstruct(&mut self, request: &BlockRequest<'_>) -> Result<LocalMeshResult> {
        let GridHandle { grid, tracks } = request.grid;

        let mut quads: Vec<[CellKey; 4]> = Vec::new();
        for (key, _) in tracks.iter() {
            if !request.block.voxels.contains(tracks.voxel_of(key, grid)) {
                continue;
            }
            if self.usable(request, key).is_none() {
                continue;
            }
            for (a, b) in PLANES {
                let corners = [
                    *key,
                    offset(key, &[a]),
                    offset(key, &[a, b]),
                    offset(key, &[b]),
                ];
                if corners[1..].iter().all(|k| self.usable(request, k).is_some()) {
                    quads.push(corners);
                }
            }
        }

        let mut vertex_of: BTreeMap<CellKey, usize> =
            quads.iter().flatten().map(|k| (*k, 0)).collect();
        let mut result = LocalMeshResult::default();
        for (key, index) in vertex_of.iter_mut() {
            if let Some(track) = tracks.get(key) {
                *index = result.mesh.vertices.len();
                result.mesh.vertices.push(track.position);
                result.point_cameras.push(track.cameras.clone());
            }
        }
        for [k0, k1, k2, k3] in &quads {
            let (v0, v1, v2, v3) = (vertex_of[k0], vertex_of[k1], vertex_of[k2], vertex_of[k3]);
            result.mesh.faces.push([v0, v1, v2]);
            result.mesh.faces.push([v0, v2, v3]);
        }

        tracing::debug!(
            block = %request.block.name,
            vertices = result.mesh.num_vertices(),
            faces = result.mesh.num_faces(),
            "Lattice surface extracted"
        );
        Ok(result)
    }
}
