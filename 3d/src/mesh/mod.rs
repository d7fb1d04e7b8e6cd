//! Triangle Mesh Data Structure
//!
//! Vertex positions are kept in double precision: large-scale scenes are
//! assembled from many blocks far from the world origin.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Triangle mesh with vertices and face indices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<[usize; 3]>,
}

impl TriangleMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vertices_and_faces(vertices: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Self {
        Self { vertices, faces }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Append `other` after the current vertices, shifting its face indices.
    ///
    /// Returns the offset applied to `other`'s vertex indices. Coincident
    /// vertices are kept as distinct entries.
    pub fn append(&mut self, other: TriangleMesh) -> usize {
        let offset = self.vertices.len();
        self.vertices.extend(other.vertices);
        self.faces.extend(
            other
                .faces
                .into_iter()
                .map(|[a, b, c]| [a + offset, b + offset, c + offset]),
        );
        offset
    }

    /// Check that every face references an existing vertex.
    pub fn faces_in_range(&self) -> bool {
        let n = self.vertices.len();
        self.faces.iter().all(|f| f.iter().all(|&i| i < n))
    }

    /// Calculate surface area
    pub fn surface_area(&self) -> f64 {
        let mut area = 0.0;
        for face in &self.faces {
            let v0 = self.vertices[face[0]];
            let v1 = self.vertices[face[1]];
            let v2 = self.vertices[face[2]];

            let e1 = v1 - v0;
            let e2 = v2 - v0;

            area += e1.cross(&e2).norm() * 0.5;
        }
        area
    }
}
