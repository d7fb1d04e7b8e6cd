//! Large-scale partitioned meshing
//!
//! Reconstructs one surface mesh from filtered depth maps while keeping every
//! engine call under a track-count budget. The volume is either meshed as a
//! single block at a coarsened resolution or split into blocks that are
//! reconstructed one at a time and merged.

pub mod config;
pub mod dataset;
pub mod dispatch;
pub mod domain;
pub mod engine;
pub mod export;
pub mod merge;
pub mod pipeline;
pub mod plan;
pub mod runtime;
pub mod search;
pub mod tracks;

pub use config::{MeshingConfig, MeshingSettings};
pub use dataset::{Dataset, DatasetProvider, DepthMapFolders, DepthSample};
pub use dispatch::{ReconstructionDispatcher, WorkingDirs};
pub use domain::{Scene, SpatialDomainEstimator};
pub use engine::{
    BlockRequest, ConsistencyFilter, LatticeSurfaceEngine, LocalMeshResult, ReconstructionEngine,
};
pub use export::OutputLayout;
pub use merge::{MergedReconstruction, MeshAccumulator};
pub use pipeline::{MeshingJob, MeshingPipeline, PartitioningMode, RunSummary};
pub use plan::{Block, PartitionPlanner, PlanSource, ReconstructionPlan};
pub use runtime::init_thread_pool;
pub use search::{GranularitySearch, Narrowing, SearchOutcome};
pub use tracks::{Track, TrackLattice};

pub use cv_core::{Error, Result};
