use cv_3d::mesh::TriangleMesh;
use cv_3d::spatial::{Hexahedron, VoxelBox, VoxelGrid};
use nalgebra::Point3;

fn unit_triangle() -> TriangleMesh {
    TriangleMesh::with_vertices_and_faces(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
        vec![[0, 1, 2]],
    )
}

#[test]
fn test_mesh_area() {
    let mesh = unit_triangle();

    let area = mesh.surface_area();
    assert!((area - 0.5).abs() < 1e-12);
}

#[test]
fn test_append_offsets_faces() {
    let mut mesh = unit_triangle();
    let mut other = unit_triangle();
    for v in other.vertices.iter_mut() {
        v.z = 2.0;
    }

    let offset = mesh.append(other);

    assert_eq!(offset, 3);
    assert_eq!(mesh.num_vertices(), 6);
    assert_eq!(mesh.faces, vec![[0, 1, 2], [3, 4, 5]]);
    assert!(mesh.faces_in_range());
    assert!((mesh.surface_area() - 1.0).abs() < 1e-12);
}

#[test]
fn test_append_keeps_coincident_vertices() {
    let mut mesh = unit_triangle();
    mesh.append(unit_triangle());
    assert_eq!(mesh.num_vertices(), 6);
    assert_eq!(mesh.vertices[0], mesh.vertices[3]);
}

#[test]
fn test_repeated_split_tiles_grid() {
    let domain = Hexahedron::from_aabb(Point3::origin(), Point3::new(8.0, 4.0, 2.0));
    let grid = VoxelGrid::new(domain, [8, 4, 2], 64).unwrap();

    let mut pending = vec![grid.full_box()];
    let mut leaves: Vec<VoxelBox> = Vec::new();
    while let Some(b) = pending.pop() {
        match b.split() {
            Some((low, high)) if b.count() > 4 => {
                pending.push(high);
                pending.push(low);
            }
            _ => leaves.push(b),
        }
    }

    let total: u64 = leaves.iter().map(|b| b.count()).sum();
    assert_eq!(total, grid.num_voxels());

    for v in grid.full_box().voxels() {
        let owners = leaves.iter().filter(|b| b.contains(v)).count();
        assert_eq!(owners, 1, "voxel {:?} owned {} times", v, owners);
    }
}

#[test]
fn test_track_steps_follow_longest_axis() {
    let domain = Hexahedron::from_aabb(Point3::origin(), Point3::new(10.0, 5.0, 2.0));
    let grid = VoxelGrid::new(domain, [2, 1, 1], 100).unwrap();
    let steps = grid.track_steps();
    assert!((steps.x - 0.1).abs() < 1e-12);
    assert!((steps.z - 0.1).abs() < 1e-12);
    assert_eq!(grid.linear_index([1, 0, 0]), 1);
}
