//! Per-block engine dispatch
//!
//! Blocks are reconstructed one after the other in plan order. Each local
//! result is validated and handed to a caller-supplied fold, which lets the
//! merge accumulator be threaded through by value. Blocks that own no
//! tracks are part of the tiling but are never sent to the engine.

use crate::engine::{
    BlockRequest, ConsistencyFilter, GridHandle, LocalMeshResult, ReconstructionEngine,
};
use crate::plan::{Block, ReconstructionPlan};
use crate::tracks::TrackLattice;
use cv_3d::spatial::Hexahedron;
use cv_core::{Error, Result};
use std::path::PathBuf;
use tracing::{debug, info};

/// Working directory given to the engine for each block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkingDirs {
    /// Every block works in the same directory.
    Shared(PathBuf),
    /// One sub-directory per block, named after it.
    PerBlock(PathBuf),
}

impl WorkingDirs {
    pub fn for_block(&self, block: &Block) -> PathBuf {
        match self {
            WorkingDirs::Shared(dir) => dir.clone(),
            WorkingDirs::PerBlock(root) => root.join(&block.name),
        }
    }
}

pub struct ReconstructionDispatcher<'a> {
    plan: &'a ReconstructionPlan,
    lattice: &'a TrackLattice,
    working_dirs: WorkingDirs,
    exclude: Option<&'a [Hexahedron]>,
    regularization: Option<ConsistencyFilter>,
}

impl<'a> ReconstructionDispatcher<'a> {
    pub fn new(
        plan: &'a ReconstructionPlan,
        lattice: &'a TrackLattice,
        working_dirs: WorkingDirs,
    ) -> Self {
        Self {
            plan,
            lattice,
            working_dirs,
            exclude: None,
            regularization: None,
        }
    }

    pub fn with_exclusion(mut self, regions: &'a [Hexahedron]) -> Self {
        self.exclude = Some(regions);
        self
    }

    pub fn with_regularization(mut self, filter: ConsistencyFilter) -> Self {
        self.regularization = Some(filter);
        self
    }

    /// Reconstruct a single block.
    pub fn dispatch_block<E: ReconstructionEngine>(
        &self,
        engine: &mut E,
        block: &Block,
    ) -> Result<LocalMeshResult> {
        let working_dir = self.working_dirs.for_block(block);
        std::fs::create_dir_all(&working_dir).map_err(|e| Error::persistence(&working_dir, e))?;

        let request = BlockRequest {
            block,
            neighbors: self.plan.neighbors_of(block),
            cameras: &block.cameras,
            working_dir: &working_dir,
            grid: GridHandle {
                grid: &self.plan.grid,
                tracks: self.lattice,
            },
            steps: self.plan.grid.track_steps(),
            exclude: self.exclude,
            regularization: self.regularization,
        };
        let local = engine.reconstruct(&request)?;

        if local.num_vertices() == 0 {
            return Err(Error::EmptyMesh(format!(
                "engine produced no vertices for {}",
                block.name
            )));
        }
        if local.point_cameras.len() != local.num_vertices() {
            return Err(Error::InvalidInput(format!(
                "{}: {} camera lists for {} vertices",
                block.name,
                local.point_cameras.len(),
                local.num_vertices()
            )));
        }

        info!(
            block = %block.name,
            estimate = block.estimate,
            cameras = block.cameras.len(),
            vertices = local.num_vertices(),
            faces = local.mesh.num_faces(),
            "Block reconstructed"
        );
        Ok(local)
    }

    /// Reconstruct every occupied block in plan order, folding each result
    /// into `init`.
    ///
    /// Stops at the first failing block.
    pub fn run<E, T, F>(&self, engine: &mut E, init: T, mut fold: F) -> Result<T>
    where
        E: ReconstructionEngine,
        F: FnMut(T, &Block, LocalMeshResult) -> Result<T>,
    {
        let mut acc = init;
        for block in &self.plan.blocks {
            if block.estimate == 0 || block.cameras.is_empty() {
                debug!(block = %block.name, "Block holds no tracks, skipped");
                continue;
            }
            let local = self.dispatch_block(engine, block)?;
            acc = fold(acc, block, local)?;
        }
        Ok(acc)
    }
}
