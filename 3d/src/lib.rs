pub mod mesh;
pub mod spatial;

pub use mesh::TriangleMesh;
pub use spatial::{Hexahedron, VoxelBox, VoxelGrid};
