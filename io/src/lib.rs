//! 3D File I/O Module
//!
//! - OBJ (Wavefront Object) mesh export
//! - PLY (Polygon File Format) meshes with vertex colors
//! - Binary snapshots (bincode with a checked header)
//! - Depth-map dataset text files

pub mod binary;
pub mod depth_map;
pub mod mesh;
pub mod obj;
pub mod ply;

pub use binary::{load_binary, save_binary, ArtifactKind};
pub use depth_map::DepthMap;
pub use mesh::TriangleMesh;
pub use obj::{load_obj, read_obj, save_obj, write_obj};
pub use ply::{save_ply_colored, write_ply_colored};

pub use cv_core::{Error, Result};
