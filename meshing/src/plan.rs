//! Partition planning
//!
//! A [`ReconstructionPlan`] is an ordered list of blocks, each a box of
//! voxels whose track-count estimate fits the per-block budget. Plans for
//! multi-block runs are cached on disk and reused verbatim by later runs.

use crate::tracks::TrackLattice;
use cv_3d::spatial::{Hexahedron, VoxelBox, VoxelGrid};
use cv_core::{Error, Result};
use cv_io::binary::{self, ArtifactKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

/// A spatial sub-region reconstructed in one engine call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub index: usize,
    pub hexahedron: Hexahedron,
    pub voxels: VoxelBox,
    /// Indices of blocks sharing a face patch with this one.
    pub neighbors: Vec<usize>,
    /// Cameras observing the tracks owned by this block.
    pub cameras: Vec<u32>,
    /// Track-count estimate when the plan was made.
    pub estimate: u64,
}

pub fn block_name(index: usize) -> String {
    format!("block_{:04}", index)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionPlan {
    pub grid: VoxelGrid,
    pub budget: u64,
    pub blocks: Vec<Block>,
}

impl ReconstructionPlan {
    /// The whole grid as one block.
    pub fn single_block(grid: VoxelGrid, lattice: &TrackLattice, budget: u64) -> Self {
        let voxels = grid.full_box();
        let block = Block {
            name: block_name(0),
            index: 0,
            hexahedron: grid.domain,
            voxels,
            neighbors: Vec::new(),
            cameras: lattice.cameras(),
            estimate: lattice.len() as u64,
        };
        Self {
            grid,
            budget,
            blocks: vec![block],
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn neighbors_of(&self, block: &Block) -> Vec<&Block> {
        block
            .neighbors
            .iter()
            .filter_map(|&i| self.blocks.get(i))
            .collect()
    }

    /// Owning block per voxel, indexed by [`VoxelGrid::linear_index`].
    pub fn block_of_voxel(&self) -> Vec<Option<usize>> {
        let mut owner = vec![None; self.grid.num_voxels() as usize];
        for block in &self.blocks {
            for v in block.voxels.voxels() {
                owner[self.grid.linear_index(v)] = Some(block.index);
            }
        }
        owner
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        binary::save_binary(path, ArtifactKind::ReconstructionPlan, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        binary::load_binary(path, ArtifactKind::ReconstructionPlan)
    }
}

/// Where a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    Cache,
    Computed,
}

/// Inclusive prefix sums of per-voxel counts, for O(1) box estimates.
struct CountTable {
    dims: [usize; 3],
    prefix: Vec<u64>,
}

impl CountTable {
    fn new(grid: &VoxelGrid, counts: &[u64]) -> Self {
        let [nx, ny, nz] = grid.dims.map(|d| d as usize);
        let dims = [nx + 1, ny + 1, nz + 1];
        let mut table = Self {
            dims,
            prefix: vec![0; dims[0] * dims[1] * dims[2]],
        };
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    let c = counts[(z * ny + y) * nx + x];
                    let v = c + table.at(x, y + 1, z + 1) + table.at(x + 1, y, z + 1)
                        + table.at(x + 1, y + 1, z)
                        - table.at(x, y, z + 1)
                        - table.at(x, y + 1, z)
                        - table.at(x + 1, y, z)
                        + table.at(x, y, z);
                    let i = table.idx(x + 1, y + 1, z + 1);
                    table.prefix[i] = v;
                }
            }
        }
        table
    }

    fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.dims[1] + y) * self.dims[0] + x
    }

    fn at(&self, x: usize, y: usize, z: usize) -> u64 {
        self.prefix[self.idx(x, y, z)]
    }

    fn sum(&self, b: &VoxelBox) -> u64 {
        let [x0, y0, z0] = b.min.map(|v| v as usize);
        let [x1, y1, z1] = b.max.map(|v| v as usize);
        let plus =
            self.at(x1, y1, z1) + self.at(x0, y0, z1) + self.at(x0, y1, z0) + self.at(x1, y0, z0);
        let minus =
            self.at(x0, y1, z1) + self.at(x1, y0, z1) + self.at(x1, y1, z0) + self.at(x0, y0, z0);
        plus - minus
    }
}

/// Unordered pairs of distinct blocks owning face-adjacent voxels.
fn face_adjacent_blocks(grid: &VoxelGrid, owner: &[Option<usize>]) -> BTreeSet<(usize, usize)> {
    let mut pairs = BTreeSet::new();
    for v in grid.full_box().voxels() {
        let Some(a) = owner[grid.linear_index(v)] else {
            continue;
        };
        for axis in 0..3 {
            if v[axis] + 1 >= grid.dims[axis] {
                continue;
            }
            let mut w = v;
            w[axis] += 1;
            if let Some(b) = owner[grid.linear_index(w)] {
                if a != b {
                    pairs.insert((a.min(b), a.max(b)));
                }
            }
        }
    }
    pairs
}

pub struct PartitionPlanner<'a> {
    grid: &'a VoxelGrid,
    lattice: &'a TrackLattice,
    budget: u64,
}

impl<'a> PartitionPlanner<'a> {
    pub fn new(grid: &'a VoxelGrid, lattice: &'a TrackLattice, budget: u64) -> Self {
        Self {
            grid,
            lattice,
            budget,
        }
    }

    /// Split the grid into blocks that each fit the budget.
    ///
    /// Boxes over budget are halved across their longest axis, low half
    /// first, so the block order is a deterministic function of the grid
    /// and the track counts. Boxes without tracks are kept so the blocks
    /// tile the whole grid.
    pub fn plan(&self) -> Result<ReconstructionPlan> {
        if self.budget == 0 {
            return Err(Error::Configuration(
                "track budget must be positive".to_string(),
            ));
        }
        let counts = self.lattice.voxel_counts(self.grid);
        let table = CountTable::new(self.grid, &counts);

        let mut boxes: Vec<(VoxelBox, u64)> = Vec::new();
        let mut pending = vec![self.grid.full_box()];
        while let Some(b) = pending.pop() {
            let estimate = table.sum(&b);
            if estimate <= self.budget {
                boxes.push((b, estimate));
                continue;
            }
            match b.split() {
                Some((low, high)) => {
                    pending.push(high);
                    pending.push(low);
                }
                None => {
                    return Err(Error::SizingSearchFailure {
                        resolution: self.grid.resolution,
                        estimate,
                        budget: self.budget,
                        reason: format!(
                            "voxel {:?} alone exceeds the block budget; raise the voxel count",
                            b.min
                        ),
                    })
                }
            }
        }

        let blocks: Vec<Block> = boxes
            .iter()
            .enumerate()
            .map(|(index, (voxels, estimate))| Block {
                name: block_name(index),
                index,
                hexahedron: self.grid.box_hexahedron(voxels),
                voxels: *voxels,
                neighbors: Vec::new(),
                cameras: Vec::new(),
                estimate: *estimate,
            })
            .collect();

        let mut plan = ReconstructionPlan {
            grid: self.grid.clone(),
            budget: self.budget,
            blocks,
        };

        let owner = plan.block_of_voxel();
        for (i, j) in face_adjacent_blocks(self.grid, &owner) {
            plan.blocks[i].neighbors.push(j);
            plan.blocks[j].neighbors.push(i);
        }
        for block in plan.blocks.iter_mut() {
            block.neighbors.sort_unstable();
        }

        let mut cameras: Vec<BTreeSet<u32>> = vec![BTreeSet::new(); plan.blocks.len()];
        for (key, track) in self.lattice.iter() {
            let v = self.lattice.voxel_of(key, self.grid);
            if let Some(b) = owner[self.grid.linear_index(v)] {
                cameras[b].extend(track.cameras.iter().copied());
            }
        }
        for (block, cams) in plan.blocks.iter_mut().zip(cameras) {
            block.cameras = cams.into_iter().collect();
        }

        info!(
            blocks = plan.blocks.len(),
            voxels = self.grid.num_voxels(),
            budget = self.budget,
            "Partition plan computed"
        );
        Ok(plan)
    }

    /// Reuse the plan stored at `path`, or compute and store one.
    ///
    /// A stored plan is never invalidated: when it was made for another
    /// budget, domain or resolution a warning is logged and it is used as is.
    pub fn plan_cached(&self, path: &Path) -> Result<(ReconstructionPlan, PlanSource)> {
        if path.exists() {
            let plan = ReconstructionPlan::load(path)?;
            if plan.budget != self.budget {
                warn!(
                    cached = plan.budget,
                    current = self.budget,
                    "Cached plan was made for another track budget"
                );
            }
            if plan.grid.domain != self.grid.domain {
                warn!("Cached plan was made for another reconstruction domain");
            }
            if plan.grid.resolution != self.grid.resolution {
                warn!(
                    cached = plan.grid.resolution,
                    current = self.grid.resolution,
                    "Cached plan was made at another grid resolution"
                );
            }
            info!(
                path = %path.display(),
                blocks = plan.blocks.len(),
                "Reusing cached partition plan"
            );
            return Ok((plan, PlanSource::Cache));
        }

        let plan = self.plan()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| Error::persistence(dir, e))?;
        }
        plan.save(path)?;
        info!(path = %path.display(), "Partition plan cached");
        Ok((plan, PlanSource::Computed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DepthSample;
    use nalgebra::Point3;
    use tempfile::tempdir;

    /// One track per unit cell on the `z = 0.5` plane of an 8x4x1 box.
    fn fixture(dims: [u32; 3]) -> (VoxelGrid, TrackLattice) {
        let domain = Hexahedron::from_aabb(Point3::origin(), Point3::new(8.0, 4.0, 1.0));
        let samples: Vec<DepthSample> = (0..32)
            .map(|i| DepthSample {
                position: Point3::new((i % 8) as f64 + 0.5, (i / 8) as f64 + 0.5, 0.5),
                camera: (i % 8) as u32 / 2,
                sim: -1.0,
            })
            .collect();
        let lattice = TrackLattice::build(&domain, 8, &samples).unwrap();
        let grid = VoxelGrid::new(domain, dims, 8).unwrap();
        (grid, lattice)
    }

    fn covered_once(plan: &ReconstructionPlan) -> bool {
        plan.grid.full_box().voxels().all(|v| {
            plan.blocks.iter().filter(|b| b.voxels.contains(v)).count() == 1
        })
    }

    #[test]
    fn test_blocks_tile_grid_within_budget() {
        let (grid, lattice) = fixture([8, 4, 1]);
        for budget in [1u64, 3, 5, 8, 13, 32, 100] {
            let plan = PartitionPlanner::new(&grid, &lattice, budget).plan().unwrap();
            assert!(covered_once(&plan), "budget {}", budget);
            assert!(plan.blocks.iter().all(|b| b.estimate <= budget));
            let total: u64 = plan.blocks.iter().map(|b| b.estimate).sum();
            assert_eq!(total, 32);
        }
    }

    #[test]
    fn test_split_order_and_neighbors() {
        let (grid, lattice) = fixture([8, 4, 1]);
        let plan = PartitionPlanner::new(&grid, &lattice, 8).plan().unwrap();

        let boxes: Vec<_> = plan.blocks.iter().map(|b| (b.voxels.min, b.voxels.max)).collect();
        assert_eq!(
            boxes,
            vec![
                ([0, 0, 0], [2, 4, 1]),
                ([2, 0, 0], [4, 4, 1]),
                ([4, 0, 0], [6, 4, 1]),
                ([6, 0, 0], [8, 4, 1]),
            ]
        );
        assert_eq!(plan.blocks[0].name, "block_0000");
        assert_eq!(plan.blocks[0].neighbors, vec![1]);
        assert_eq!(plan.blocks[1].neighbors, vec![0, 2]);
        assert_eq!(plan.blocks[1].cameras, vec![1]);
        assert_eq!(plan.blocks[3].hexahedron.min(), Point3::new(6.0, 0.0, 0.0));
    }

    #[test]
    fn test_unsplittable_voxel_is_sizing_failure() {
        let (grid, lattice) = fixture([2, 1, 1]);
        let err = PartitionPlanner::new(&grid, &lattice, 4).plan().unwrap_err();
        assert!(matches!(err, Error::SizingSearchFailure { estimate: 16, .. }));
    }

    #[test]
    fn test_single_block_plan() {
        let (grid, lattice) = fixture([2, 1, 1]);
        let plan = ReconstructionPlan::single_block(grid.clone(), &lattice, 10);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.blocks[0].hexahedron, grid.domain);
        assert_eq!(plan.blocks[0].cameras, vec![0, 1, 2, 3]);
        assert!(plan.blocks[0].neighbors.is_empty());
    }

    #[test]
    fn test_cache_is_reused_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("space").join("hexahsToReconstruct.bin");
        let (grid, lattice) = fixture([8, 4, 1]);

        let (first, source) = PartitionPlanner::new(&grid, &lattice, 8)
            .plan_cached(&path)
            .unwrap();
        assert_eq!(source, PlanSource::Computed);
        assert!(path.exists());

        // A different budget does not invalidate the stored plan.
        let (second, source) = PartitionPlanner::new(&grid, &lattice, 1)
            .plan_cached(&path)
            .unwrap();
        assert_eq!(source, PlanSource::Cache);
        assert_eq!(second, first);
    }

    #[test]
    fn test_neighbors_match_face_contact() {
        let domain = Hexahedron::from_aabb(Point3::origin(), Point3::new(4.0, 4.0, 4.0));
        let samples: Vec<DepthSample> = (0..64)
            .map(|i| DepthSample {
                position: Point3::new(
                    (i % 4) as f64 + 0.5,
                    ((i / 4) % 4) as f64 + 0.5,
                    (i / 16) as f64 + 0.5,
                ),
                camera: 0,
                sim: -1.0,
            })
            .collect();
        let lattice = TrackLattice::build(&domain, 4, &samples).unwrap();
        let grid = VoxelGrid::new(domain, [4, 4, 4], 4).unwrap();

        for budget in [1u64, 3, 8, 20] {
            let plan = PartitionPlanner::new(&grid, &lattice, budget).plan().unwrap();
            assert!(covered_once(&plan));
            for block in &plan.blocks {
                let touching: Vec<usize> = plan
                    .blocks
                    .iter()
                    .filter(|o| o.index != block.index && block.voxels.touches(&o.voxels))
                    .map(|o| o.index)
                    .collect();
                assert_eq!(block.neighbors, touching, "budget {}", budget);
            }
        }
    }
}
