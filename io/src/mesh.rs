//! Triangle Mesh Data Structure
//!
//! Re-exports TriangleMesh from cv-3d, which is the authoritative source.

pub use cv_3d::mesh::TriangleMesh;
