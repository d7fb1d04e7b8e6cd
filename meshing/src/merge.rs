//! Merging block meshes into one reconstruction

use crate::engine::LocalMeshResult;
use cv_3d::mesh::TriangleMesh;
use cv_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Running concatenation of local results.
///
/// Vertices shared by two blocks stay duplicated; face indices of each
/// merged result are shifted by the vertex count accumulated before it.
#[derive(Debug, Clone, Default)]
pub struct MeshAccumulator {
    mesh: TriangleMesh,
    point_cameras: Vec<Vec<u32>>,
    merged_blocks: usize,
}

impl MeshAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(mut self, local: LocalMeshResult) -> Self {
        self.mesh.append(local.mesh);
        self.point_cameras.extend(local.point_cameras);
        self.merged_blocks += 1;
        self
    }

    pub fn merged_blocks(&self) -> usize {
        self.merged_blocks
    }

    pub fn finish(self) -> Result<MergedReconstruction> {
        if self.mesh.is_empty() {
            return Err(Error::EmptyMesh(format!(
                "merged reconstruction of {} block(s) has no vertices",
                self.merged_blocks
            )));
        }
        if self.point_cameras.len() != self.mesh.num_vertices() {
            return Err(Error::InvalidInput(format!(
                "{} camera lists for {} merged vertices",
                self.point_cameras.len(),
                self.mesh.num_vertices()
            )));
        }
        Ok(MergedReconstruction {
            mesh: self.mesh,
            point_cameras: self.point_cameras,
        })
    }
}

/// Final mesh and its index-aligned per-vertex camera lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedReconstruction {
    pub mesh: TriangleMesh,
    pub point_cameras: Vec<Vec<u32>>,
}

impl MergedReconstruction {
    /// Sorted ids of every camera supporting at least one vertex.
    pub fn used_cameras(&self) -> Vec<u32> {
        let mut cams: Vec<u32> = self.point_cameras.iter().flatten().copied().collect();
        cams.sort_unstable();
        cams.dedup();
        cams
    }
}
