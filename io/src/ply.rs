//! PLY (Polygon File Format) output
//!
//! ASCII meshes with one RGB color per vertex, used for inspection exports.

use crate::mesh::TriangleMesh;
use crate::Result;
use cv_core::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write a mesh with per-vertex colors to ASCII PLY
pub fn write_ply_colored<W: Write>(
    writer: &mut W,
    mesh: &TriangleMesh,
    colors: &[[u8; 3]],
) -> Result<()> {
    if colors.len() != mesh.num_vertices() {
        return Err(Error::InvalidInput(format!(
            "{} colors for {} vertices",
            colors.len(),
            mesh.num_vertices()
        )));
    }

    // Write header
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", mesh.num_vertices())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "property uchar red")?;
    writeln!(writer, "property uchar green")?;
    writeln!(writer, "property uchar blue")?;
    writeln!(writer, "element face {}", mesh.num_faces())?;
    writeln!(writer, "property list uchar int vertex_indices")?;
    writeln!(writer, "end_header")?;

    // Write data
    for (p, [r, g, b]) in mesh.vertices.iter().zip(colors) {
        writeln!(writer, "{} {} {} {} {} {}", p.x, p.y, p.z, r, g, b)?;
    }
    for [a, b, c] in &mesh.faces {
        writeln!(writer, "3 {} {} {}", a, b, c)?;
    }

    Ok(())
}

pub fn save_ply_colored(path: &Path, mesh: &TriangleMesh, colors: &[[u8; 3]]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::persistence(path, e))?;
    let mut writer = BufWriter::new(file);
    write_ply_colored(&mut writer, mesh, colors)?;
    writer.flush().map_err(|e| Error::persistence(path, e))
}
