//! Output layout and persistence of the merged reconstruction
//!
//! ```text
//! <outDir>/
//!   <mesh>.obj
//!   denseReconstruction.bin
//!   meshPtsCamsFromDGC.bin
//!   tmp/<baseDirName>/
//!     hexahsToReconstruct.bin
//!     blocks/block_NNNN/
//! ```

use crate::merge::MergedReconstruction;
use cv_core::{Error, Result};
use cv_io::binary::{self, ArtifactKind};
use cv_io::{obj, ply};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const PLAN_CACHE_FILE: &str = "hexahsToReconstruct.bin";
pub const DENSE_SNAPSHOT_FILE: &str = "denseReconstruction.bin";
pub const POINT_CAMERAS_FILE: &str = "meshPtsCamsFromDGC.bin";
pub const CONSISTENCY_DEBUG_FILE: &str = "meshColoredbyCamsConsistency_postprocess.ply";
pub const VISIBILITY_DEBUG_FILE: &str = "meshColoredByVisibility_postprocess.ply";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub mesh_path: PathBuf,
    pub out_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub space_dir: PathBuf,
}

impl OutputLayout {
    /// Layout around `mesh_path`; its parent directory is created if needed.
    pub fn from_output_mesh(mesh_path: &Path, base_dir_name: &str) -> Result<Self> {
        let out_dir = match mesh_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&out_dir).map_err(|e| Error::persistence(&out_dir, e))?;
        let tmp_dir = out_dir.join("tmp");
        let space_dir = tmp_dir.join(base_dir_name);
        Ok(Self {
            mesh_path: mesh_path.to_path_buf(),
            out_dir,
            tmp_dir,
            space_dir,
        })
    }

    pub fn plan_cache_path(&self) -> PathBuf {
        self.space_dir.join(PLAN_CACHE_FILE)
    }

    pub fn blocks_dir(&self) -> PathBuf {
        self.space_dir.join("blocks")
    }

    pub fn dense_snapshot_path(&self) -> PathBuf {
        self.out_dir.join(DENSE_SNAPSHOT_FILE)
    }

    pub fn point_cameras_path(&self) -> PathBuf {
        self.out_dir.join(POINT_CAMERAS_FILE)
    }

    /// Write the mesh snapshot, the camera-visibility array and the OBJ.
    pub fn persist(&self, merged: &MergedReconstruction) -> Result<()> {
        let snapshot = self.dense_snapshot_path();
        binary::save_binary(&snapshot, ArtifactKind::MeshSnapshot, &merged.mesh)?;

        let cams = self.point_cameras_path();
        binary::save_binary(&cams, ArtifactKind::PointCameras, &merged.point_cameras)?;

        obj::save_obj(&self.mesh_path, &merged.mesh)?;

        info!(
            mesh = %self.mesh_path.display(),
            vertices = merged.mesh.num_vertices(),
            faces = merged.mesh.num_faces(),
            cameras = merged.used_cameras().len(),
            "Reconstruction saved"
        );
        Ok(())
    }

    /// Colored PLY exports for inspecting camera support.
    pub fn export_debug(&self, merged: &MergedReconstruction, min_cameras: usize) -> Result<()> {
        let consistency: Vec<[u8; 3]> = merged
            .point_cameras
            .iter()
            .map(|c| {
                if c.len() >= min_cameras {
                    [0, 255, 0]
                } else {
                    [255, 0, 0]
                }
            })
            .collect();
        ply::save_ply_colored(
            &self.out_dir.join(CONSISTENCY_DEBUG_FILE),
            &merged.mesh,
            &consistency,
        )?;

        let most = merged.point_cameras.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let visibility: Vec<[u8; 3]> = merged
            .point_cameras
            .iter()
            .map(|c| {
                let v = (c.len().min(most) * 255 / most) as u8;
                [v, v, 255 - v]
            })
            .collect();
        ply::save_ply_colored(
            &self.out_dir.join(VISIBILITY_DEBUG_FILE),
            &merged.mesh,
            &visibility,
        )?;

        tracing::debug!(dir = %self.out_dir.display(), "Debug meshes exported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_3d::mesh::TriangleMesh;
    use nalgebra::Point3;
    use tempfile::tempdir;

    fn merged() -> MergedReconstruction {
        MergedReconstruction {
            mesh: TriangleMesh::with_vertices_and_faces(
                vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
                vec![[0, 1, 2]],
            ),
            point_cameras: vec![vec![0, 1], vec![1], vec![]],
        }
    }

    #[test]
    fn test_layout_paths() {
        let dir = tempdir().unwrap();
        let mesh = dir.path().join("out").join("mesh.obj");
        let layout = OutputLayout::from_output_mesh(&mesh, "root01024").unwrap();

        assert!(layout.out_dir.is_dir());
        assert_eq!(
            layout.plan_cache_path(),
            dir.path()
                .join("out/tmp/root01024")
                .join("hexahsToReconstruct.bin")
        );
        assert_eq!(layout.blocks_dir(), dir.path().join("out/tmp/root01024/blocks"));
    }

    #[test]
    fn test_persist_writes_all_artifacts() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::from_output_mesh(&dir.path().join("mesh.obj"), "space").unwrap();
        let m = merged();
        layout.persist(&m).unwrap();

        let mesh: TriangleMesh =
            binary::load_binary(&layout.dense_snapshot_path(), ArtifactKind::MeshSnapshot).unwrap();
        assert_eq!(mesh, m.mesh);
        let cams: Vec<Vec<u32>> =
            binary::load_binary(&layout.point_cameras_path(), ArtifactKind::PointCameras).unwrap();
        assert_eq!(cams, m.point_cameras);
        assert_eq!(obj::load_obj(&layout.mesh_path).unwrap(), m.mesh);
    }

    #[test]
    fn test_debug_exports() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::from_output_mesh(&dir.path().join("mesh.obj"), "space").unwrap();
        layout.export_debug(&merged(), 2).unwrap();

        let text = fs::read_to_string(dir.path().join(CONSISTENCY_DEBUG_FILE)).unwrap();
        assert!(text.contains("0 0 0 0 255 0\n"));
        assert!(text.contains("1 0 0 255 0 0\n"));
        let text = fs::read_to_string(dir.path().join(VISIBILITY_DEBUG_FILE)).unwrap();
        assert!(text.contains("0 0 0 255 255 0\n"));
        assert!(text.contains("0 1 0 0 0 255\n"));
    }
}
