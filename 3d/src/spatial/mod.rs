//! Spatial tilings of a reconstruction volume
//!
//! - [`Hexahedron`]: eight-corner volume used for domains and blocks
//! - [`VoxelGrid`]: regular `dims[0] x dims[1] x dims[2]` tiling of a domain
//! - [`VoxelBox`]: half-open range of voxels inside a grid

use cv_core::{Error, Result};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A volume described by its 8 corner points.
///
/// Corner `i` sits on the +X face when bit 0 of `i` is set, on the +Y face
/// for bit 1 and on the +Z face for bit 2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hexahedron {
    pub corners: [Point3<f64>; 8],
}

impl Hexahedron {
    pub fn from_aabb(min: Point3<f64>, max: Point3<f64>) -> Self {
        let mut corners = [min; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = Point3::new(
                if i & 1 != 0 { max.x } else { min.x },
                if i & 2 != 0 { max.y } else { min.y },
                if i & 4 != 0 { max.z } else { min.z },
            );
        }
        Self { corners }
    }

    pub fn min(&self) -> Point3<f64> {
        self.corners[1..].iter().fold(self.corners[0], |acc, c| {
            Point3::new(acc.x.min(c.x), acc.y.min(c.y), acc.z.min(c.z))
        })
    }

    pub fn max(&self) -> Point3<f64> {
        self.corners[1..].iter().fold(self.corners[0], |acc, c| {
            Point3::new(acc.x.max(c.x), acc.y.max(c.y), acc.z.max(c.z))
        })
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max() - self.min()
    }

    pub fn longest_extent(&self) -> f64 {
        self.extent().max()
    }

    /// Inclusive bounding-box containment test.
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        let (min, max) = (self.min(), self.max());
        (0..3).all(|a| p[a] >= min[a] && p[a] <= max[a])
    }
}

/// Half-open voxel range `[min, max)` on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelBox {
    pub min: [u32; 3],
    pub max: [u32; 3],
}

impl VoxelBox {
    pub fn new(min: [u32; 3], max: [u32; 3]) -> Self {
        Self { min, max }
    }

    pub fn len(&self, axis: usize) -> u32 {
        self.max[axis].saturating_sub(self.min[axis])
    }

    pub fn count(&self) -> u64 {
        (0..3).map(|a| self.len(a) as u64).product()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Longest axis in voxel counts; ties go to the lowest axis index.
    pub fn longest_axis(&self) -> usize {
        let mut best = 0;
        for a in 1..3 {
            if self.len(a) > self.len(best) {
                best = a;
            }
        }
        best
    }

    /// Split at the middle of the longest axis. `None` for a single voxel.
    pub fn split(&self) -> Option<(VoxelBox, VoxelBox)> {
        let axis = self.longest_axis();
        let len = self.len(axis);
        if len < 2 {
            return None;
        }
        let mid = self.min[axis] + len / 2;
        let mut low = *self;
        let mut high = *self;
        low.max[axis] = mid;
        high.min[axis] = mid;
        Some((low, high))
    }

    pub fn contains(&self, v: [u32; 3]) -> bool {
        (0..3).all(|a| v[a] >= self.min[a] && v[a] < self.max[a])
    }

    /// True when the two boxes share a face patch of positive area.
    pub fn touches(&self, other: &VoxelBox) -> bool {
        (0..3).any(|a| {
            let adjacent = self.max[a] == other.min[a] || other.max[a] == self.min[a];
            adjacent
                && (0..3)
                    .filter(|&b| b != a)
                    .all(|b| self.min[b] < other.max[b] && other.min[b] < self.max[b])
        })
    }

    pub fn voxels(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        (self.min[2]..self.max[2]).flat_map(move |z| {
            (self.min[1]..self.max[1])
                .flat_map(move |y| (self.min[0]..self.max[0]).map(move |x| [x, y, z]))
        })
    }
}

/// Regular tiling of an axis-aligned domain.
///
/// `resolution` is the number of track cells along the longest domain axis;
/// it is carried here so every consumer of the grid counts tracks the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxelGrid {
    pub domain: Hexahedron,
    pub dims: [u32; 3],
    pub resolution: u32,
}

impl VoxelGrid {
    pub fn new(domain: Hexahedron, dims: [u32; 3], resolution: u32) -> Result<Self> {
        if dims.iter().any(|&d| d == 0) {
            return Err(Error::InvalidInput(format!(
                "voxel grid needs at least one cell per axis, got {:?}",
                dims
            )));
        }
        if resolution == 0 {
            return Err(Error::InvalidInput(
                "grid resolution must be positive".to_string(),
            ));
        }
        Ok(Self {
            domain,
            dims,
            resolution,
        })
    }

    pub fn num_voxels(&self) -> u64 {
        self.dims.iter().map(|&d| d as u64).product()
    }

    pub fn full_box(&self) -> VoxelBox {
        VoxelBox::new([0; 3], self.dims)
    }

    /// Coordinate of the `i`-th cell boundary along `axis` (`0..=dims[axis]`).
    pub fn boundary(&self, axis: usize, i: u32) -> f64 {
        let (min, max) = (self.domain.min()[axis], self.domain.max()[axis]);
        if i >= self.dims[axis] {
            return max;
        }
        min + (max - min) * (i as f64) / (self.dims[axis] as f64)
    }

    pub fn box_bounds(&self, b: &VoxelBox) -> (Point3<f64>, Point3<f64>) {
        let lo = Point3::new(
            self.boundary(0, b.min[0]),
            self.boundary(1, b.min[1]),
            self.boundary(2, b.min[2]),
        );
        let hi = Point3::new(
            self.boundary(0, b.max[0]),
            self.boundary(1, b.max[1]),
            self.boundary(2, b.max[2]),
        );
        (lo, hi)
    }

    pub fn box_hexahedron(&self, b: &VoxelBox) -> Hexahedron {
        let (lo, hi) = self.box_bounds(b);
        Hexahedron::from_aabb(lo, hi)
    }

    /// Voxel holding `p`; points outside the domain are clamped to the border.
    pub fn voxel_of_point(&self, p: &Point3<f64>) -> [u32; 3] {
        let (min, ext) = (self.domain.min(), self.domain.extent());
        let mut v = [0u32; 3];
        for a in 0..3 {
            let d = self.dims[a];
            if ext[a] <= 0.0 {
                continue;
            }
            let f = ((p[a] - min[a]) / ext[a] * d as f64).floor();
            v[a] = if f <= 0.0 {
                0
            } else {
                (f as u32).min(d - 1)
            };
        }
        v
    }

    pub fn linear_index(&self, v: [u32; 3]) -> usize {
        let [nx, ny, _] = self.dims;
        (v[2] as usize * ny as usize + v[1] as usize) * nx as usize + v[0] as usize
    }

    /// Track cell size along each axis.
    pub fn track_steps(&self) -> Vector3<f64> {
        let step = self.domain.longest_extent() / self.resolution as f64;
        Vector3::new(step, step, step)
    }
}
