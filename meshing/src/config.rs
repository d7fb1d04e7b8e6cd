//! Meshing configuration
//!
//! The configuration file is a sectioned `key = value` file read with the
//! `toml` parser. Every lookup carries its own default, so an empty file is a
//! valid configuration.
//!
//! Only the TOML subset of INI syntax is accepted: string values must be
//! quoted, comments start with `#`, and keys may not repeat within a section.
//! An `mvs.ini` written for INI readers (bare `baseDirName=root01024`, `;`
//! comments) has to be converted first; it is rejected with a configuration
//! error rather than read partially.

use cv_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Default)]
pub struct MeshingConfig {
    table: toml::Table,
}

impl MeshingConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        text.parse()
            .map_err(|e: Error| Error::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Typed lookup of a dotted `section.key`, `default` when absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        let mut parts = key.split('.');
        let Some(first) = parts.next() else {
            return Ok(default);
        };
        let mut value = match self.table.get(first) {
            Some(v) => v,
            None => return Ok(default),
        };
        for part in parts {
            value = match value.get(part) {
                Some(v) => v,
                None => return Ok(default),
            };
        }
        value
            .clone()
            .try_into()
            .map_err(|e| Error::Configuration(format!("{}: {}", key, e)))
    }

    pub fn settings(&self) -> Result<MeshingSettings> {
        let defaults = MeshingSettings::default();
        Ok(MeshingSettings {
            sim_threshold: self.get("global.simThr", defaults.sim_threshold)?,
            grid_level0: self.get("largeScale.gridLevel0", defaults.grid_level0)?,
            base_dir_name: self.get("largeScale.baseDirName", defaults.base_dir_name)?,
            min_grid_level: self.get("largeScale.minGridLevel", defaults.min_grid_level)?,
            max_voxels_per_axis: self
                .get("largeScale.maxVoxelsPerAxis", defaults.max_voxels_per_axis)?,
            space_margin: self.get("largeScale.spaceMargin", defaults.space_margin)?,
            min_samples_per_camera: self.get(
                "largeScale.minSamplesPerCamera",
                defaults.min_samples_per_camera,
            )?,
            export_debug: self.get("delaunaycut.exportDebugGC", defaults.export_debug)?,
            min_cams_per_track: self
                .get("delaunaycut.minCamsPerTrack", defaults.min_cams_per_track)?,
            pixel_step: self.get("depthMap.pixelStep", defaults.pixel_step)?,
        })
    }
}

impl FromStr for MeshingConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let table = s
            .parse::<toml::Table>()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        Ok(Self { table })
    }
}

/// Resolved parameters used by the meshing run.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshingSettings {
    /// Samples with a similarity score above this are ignored.
    pub sim_threshold: f64,
    /// Starting grid resolution (cells along the longest domain axis).
    pub grid_level0: u32,
    /// Name of the working space under `<outDir>/tmp`.
    pub base_dir_name: String,
    /// Lowest resolution the sizing search may reach.
    pub min_grid_level: u32,
    pub max_voxels_per_axis: u32,
    /// Domain padding as a fraction of its longest extent.
    pub space_margin: f64,
    pub min_samples_per_camera: usize,
    pub export_debug: bool,
    pub min_cams_per_track: usize,
    pub pixel_step: usize,
}

impl Default for MeshingSettings {
    fn default() -> Self {
        Self {
            sim_threshold: 0.0,
            grid_level0: 1024,
            base_dir_name: "root01024".to_string(),
            min_grid_level: 16,
            max_voxels_per_axis: 64,
            space_margin: 0.01,
            min_samples_per_camera: 1,
            export_debug: false,
            min_cams_per_track: 2,
            pixel_step: 1,
        }
    }
}
