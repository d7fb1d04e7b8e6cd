//! Binary snapshots
//!
//! Every artifact starts with a small bincode-encoded header (magic, format
//! version, payload kind) followed by the bincode-encoded payload. Writes go
//! to a `.tmp` sibling which is then renamed over the destination, so a
//! reader never observes a partially written file.

use cv_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

pub const MAGIC: [u8; 4] = *b"CVMS";
pub const FORMAT_VERSION: u32 = 1;

/// Payload tag stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    ReconstructionPlan,
    MeshSnapshot,
    PointCameras,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub kind: ArtifactKind,
}

impl ArtifactHeader {
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            kind,
        }
    }

    fn check(&self, expected: ArtifactKind, path: &Path) -> Result<()> {
        if self.magic != MAGIC {
            return Err(Error::Format(format!(
                "{}: bad magic {:?}",
                path.display(),
                self.magic
            )));
        }
        if self.version != FORMAT_VERSION {
            return Err(Error::Format(format!(
                "{}: unsupported version {} (expected {})",
                path.display(),
                self.version,
                FORMAT_VERSION
            )));
        }
        if self.kind != expected {
            return Err(Error::Format(format!(
                "{}: holds {:?}, expected {:?}",
                path.display(),
                self.kind,
                expected
            )));
        }
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` to `path` through a temporary sibling file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = tmp_sibling(path);
    {
        let mut file = File::create(&tmp_path).map_err(|e| Error::persistence(&tmp_path, e))?;
        file.write_all(bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| Error::persistence(&tmp_path, e))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| Error::persistence(path, e))
}

pub fn save_binary<T: Serialize>(path: &Path, kind: ArtifactKind, value: &T) -> Result<()> {
    let mut bytes = bincode::serialize(&ArtifactHeader::new(kind))
        .map_err(|e| Error::Format(e.to_string()))?;
    bincode::serialize_into(&mut bytes, value).map_err(|e| Error::Format(e.to_string()))?;
    write_atomic(path, &bytes)
}

pub fn load_binary<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<T> {
    let file = File::open(path).map_err(|e| Error::persistence(path, e))?;
    let mut reader = BufReader::new(file);

    let header: ArtifactHeader = bincode::deserialize_from(&mut reader)
        .map_err(|e| Error::Format(format!("{}: unreadable header: {}", path.display(), e)))?;
    header.check(kind, path)?;

    bincode::deserialize_from(&mut reader)
        .map_err(|e| Error::Format(format!("{}: unreadable payload: {}", path.display(), e)))
}
