//! Multi-view stereo meshing for the `cv` crates.
//!
//! Facade over the workspace members; the orchestrator lives in
//! [`meshing`].

pub use cv_3d as three_d;
pub use cv_core as core;
pub use cv_io as io;
pub use cv_meshing as meshing;

pub use cv_meshing::{init_thread_pool, MeshingJob, MeshingPipeline, PartitioningMode};
