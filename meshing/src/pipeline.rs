//! End-to-end meshing run
//!
//! Two mutually exclusive strategies:
//!
//! - single block: search a grid resolution whose whole-domain estimate fits
//!   `max_pts`, then reconstruct everything in one engine call with the
//!   consistency filter and exclusion regions applied
//! - auto: plan blocks over a coarse voxel grid at the base resolution, each
//!   within `max_pts`, and reconstruct them one by one

use crate::config::MeshingSettings;
use crate::dataset::DatasetProvider;
use crate::dispatch::{ReconstructionDispatcher, WorkingDirs};
use crate::domain::{Scene, SpatialDomainEstimator};
use crate::engine::{ConsistencyFilter, ReconstructionEngine};
use crate::export::OutputLayout;
use crate::merge::{MeshAccumulator, MergedReconstruction};
use crate::plan::{PartitionPlanner, PlanSource, ReconstructionPlan};
use crate::search::GranularitySearch;
use crate::tracks::TrackLattice;
use cv_3d::spatial::{Hexahedron, VoxelGrid};
use cv_core::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, info_span, warn};

pub const DEFAULT_MAX_PTS: u64 = 6_000_000;
pub const DEFAULT_MAX_PTS_PER_VOXEL: u64 = 6_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitioningMode {
    #[default]
    SingleBlock,
    Auto,
}

impl FromStr for PartitioningMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "singleBlock" => Ok(PartitioningMode::SingleBlock),
            "auto" => Ok(PartitioningMode::Auto),
            other => Err(Error::InvalidPartitioningMode(other.to_string())),
        }
    }
}

impl fmt::Display for PartitioningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitioningMode::SingleBlock => write!(f, "singleBlock"),
            PartitioningMode::Auto => write!(f, "auto"),
        }
    }
}

/// What to produce and under which budgets.
#[derive(Debug, Clone)]
pub struct MeshingJob {
    pub output_mesh: PathBuf,
    /// Track budget for the whole run (single block) or per block (auto).
    pub max_pts: u64,
    pub max_pts_per_voxel: u64,
    pub partitioning: PartitioningMode,
    /// Regions removed from the single-block output.
    pub exclude: Vec<Hexahedron>,
}

impl MeshingJob {
    pub fn new(output_mesh: impl Into<PathBuf>) -> Self {
        Self {
            output_mesh: output_mesh.into(),
            max_pts: DEFAULT_MAX_PTS,
            max_pts_per_voxel: DEFAULT_MAX_PTS_PER_VOXEL,
            partitioning: PartitioningMode::default(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub mode: PartitioningMode,
    pub resolution: u32,
    pub blocks: usize,
    pub vertices: usize,
    pub faces: usize,
    /// Set in auto mode only.
    pub plan_source: Option<PlanSource>,
}

pub struct MeshingPipeline {
    pub settings: MeshingSettings,
    pub job: MeshingJob,
}

impl MeshingPipeline {
    pub fn new(settings: MeshingSettings, job: MeshingJob) -> Self {
        Self { settings, job }
    }

    pub fn run<P, E>(&self, provider: &P, engine: &mut E) -> Result<RunSummary>
    where
        P: DatasetProvider,
        E: ReconstructionEngine,
    {
        let _span = info_span!("meshing", mode = %self.job.partitioning).entered();

        let layout =
            OutputLayout::from_output_mesh(&self.job.output_mesh, &self.settings.base_dir_name)?;
        let dataset = provider.load()?;
        let scene = SpatialDomainEstimator::new(&self.settings).estimate(dataset)?;

        match self.job.partitioning {
            PartitioningMode::Auto => self.run_auto(&layout, &scene, engine),
            PartitioningMode::SingleBlock => self.run_single_block(&layout, &scene, engine),
        }
    }

    fn run_auto<E: ReconstructionEngine>(
        &self,
        layout: &OutputLayout,
        scene: &Scene,
        engine: &mut E,
    ) -> Result<RunSummary> {
        let estimator = SpatialDomainEstimator::new(&self.settings);
        let cache = layout.plan_cache_path();

        let mut lattice = scene.lattice(self.settings.grid_level0)?;
        let grid = estimator.initial_grid(
            scene,
            &lattice,
            self.job.max_pts_per_voxel,
            self.settings.max_voxels_per_axis,
        )?;
        let (plan, source) =
            PartitionPlanner::new(&grid, &lattice, self.job.max_pts).plan_cached(&cache)?;
        // A reused plan keeps the resolution it was made at.
        if plan.grid.resolution != lattice.resolution() {
            lattice =
                TrackLattice::build(&plan.grid.domain, plan.grid.resolution, &scene.samples)?;
        }

        let dirs = WorkingDirs::PerBlock(layout.blocks_dir());
        let dispatcher = ReconstructionDispatcher::new(&plan, &lattice, dirs);
        let merged = self.dispatch_and_merge(&dispatcher, engine)?;
        layout.persist(&merged)?;

        Ok(self.summary(&plan, &merged, Some(source)))
    }

    fn run_single_block<E: ReconstructionEngine>(
        &self,
        layout: &OutputLayout,
        scene: &Scene,
        engine: &mut E,
    ) -> Result<RunSummary> {
        let search = GranularitySearch::new(
            self.settings.grid_level0,
            self.job.max_pts,
            self.settings.min_grid_level,
        );
        let (outcome, lattice) = scene.search_lattice(&search)?;
        let grid = VoxelGrid::new(scene.domain, [1, 1, 1], outcome.resolution)?;
        let plan = ReconstructionPlan::single_block(grid, &lattice, self.job.max_pts);

        let filter = ConsistencyFilter {
            min_cameras: self.settings.min_cams_per_track,
        };
        let dirs = WorkingDirs::Shared(layout.out_dir.clone());
        let dispatcher = ReconstructionDispatcher::new(&plan, &lattice, dirs)
            .with_exclusion(&self.job.exclude)
            .with_regularization(filter);
        let merged = self.dispatch_and_merge(&dispatcher, engine)?;

        if self.settings.export_debug {
            layout.export_debug(&merged, self.settings.min_cams_per_track)?;
        }
        layout.persist(&merged)?;

        Ok(self.summary(&plan, &merged, None))
    }

    fn dispatch_and_merge<E: ReconstructionEngine>(
        &self,
        dispatcher: &ReconstructionDispatcher<'_>,
        engine: &mut E,
    ) -> Result<MergedReconstruction> {
        let acc = dispatcher.run(engine, MeshAccumulator::new(), |acc, _, local| {
            Ok(acc.merge(local))
        })?;
        if acc.merged_blocks() == 0 {
            warn!("Plan has no blocks");
        }
        acc.finish()
    }

    fn summary(
        &self,
        plan: &ReconstructionPlan,
        merged: &MergedReconstruction,
        plan_source: Option<PlanSource>,
    ) -> RunSummary {
        let summary = RunSummary {
            mode: self.job.partitioning,
            resolution: plan.grid.resolution,
            blocks: plan.blocks.len(),
            vertices: merged.mesh.num_vertices(),
            faces: merged.mesh.num_faces(),
            plan_source,
        };
        info!(
            resolution = summary.resolution,
            blocks = summary.blocks,
            vertices = summary.vertices,
            faces = summary.faces,
            "Meshing finished"
        );
        summary
    }
}
