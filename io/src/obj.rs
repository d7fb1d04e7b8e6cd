//! OBJ (Wavefront Object) I/O
//!
//! Triangle meshes only; face indices are 1-based on disk.

use crate::mesh::TriangleMesh;
use crate::Result;
use cv_core::Error;
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

fn parse_coord(s: &str) -> Result<f64> {
    s.parse()
        .map_err(|_| Error::Parse(format!("Invalid coordinate: {}", s)))
}

/// Read a triangle mesh from OBJ. Polygons are fan-triangulated.
pub fn read_obj<R: BufRead>(reader: R) -> Result<TriangleMesh> {
    let mut mesh = TriangleMesh::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "v" if parts.len() >= 4 => {
                mesh.vertices.push(Point3::new(
                    parse_coord(parts[1])?,
                    parse_coord(parts[2])?,
                    parse_coord(parts[3])?,
                ));
            }
            "f" if parts.len() >= 4 => {
                // Handle v/vt/vn format
                let face: Vec<usize> = parts[1..]
                    .iter()
                    .map(|p| {
                        let idx_str = p.split('/').next().unwrap_or(p);
                        match idx_str.parse::<usize>() {
                            Ok(i) if i > 0 => Ok(i - 1),
                            _ => Err(Error::Parse(format!("Invalid face index: {}", p))),
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                for i in 1..(face.len() - 1) {
                    mesh.faces.push([face[0], face[i], face[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if !mesh.faces_in_range() {
        return Err(Error::Parse(
            "face references a vertex that does not exist".to_string(),
        ));
    }

    Ok(mesh)
}

/// Write a triangle mesh to OBJ format
pub fn write_obj<W: Write>(writer: &mut W, mesh: &TriangleMesh) -> Result<()> {
    writeln!(
        writer,
        "# {} vertices, {} faces",
        mesh.num_vertices(),
        mesh.num_faces()
    )?;
    for v in &mesh.vertices {
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for [a, b, c] in &mesh.faces {
        writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    Ok(())
}

pub fn save_obj(path: &Path, mesh: &TriangleMesh) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::persistence(path, e))?;
    let mut writer = BufWriter::new(file);
    write_obj(&mut writer, mesh)?;
    writer.flush().map_err(|e| Error::persistence(path, e))
}

pub fn load_obj(path: &Path) -> Result<TriangleMesh> {
    let file = File::open(path).map_err(|e| Error::persistence(path, e))?;
    read_obj(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_is_fan_triangulated() {
        let src = "# quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1/1 2/2 3/3 4/4\n";
        let mesh = read_obj(src.as_bytes()).unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_zero_index_is_rejected() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nf 0 1 2\n";
        assert!(read_obj(src.as_bytes()).is_err());
    }

    #[test]
    fn test_written_faces_are_one_based() {
        let mesh = TriangleMesh::with_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let mut out = Vec::new();
        write_obj(&mut out, &mesh).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().any(|l| l == "f 1 2 3"));
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 3);
    }
}
