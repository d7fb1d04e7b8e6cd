//! Calibrated cameras and their depth samples
//!
//! A [`DatasetProvider`] supplies the raw observations; [`DepthMapFolders`]
//! is the default provider reading the text dataset layout of
//! [`cv_io::depth_map`].

use cv_core::geometry::Camera;
use cv_core::{Error, Result};
use cv_io::depth_map::{self, DepthMap};
use nalgebra::Point3;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Similarity assigned to samples from views without a similarity map.
pub const PERFECT_SIMILARITY: f32 = -1.0;

/// One back-projected depth pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSample {
    pub position: Point3<f64>,
    pub camera: u32,
    /// Lower is better, -1 is a perfect match.
    pub sim: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub cameras: Vec<Camera>,
    pub samples: Vec<DepthSample>,
}

impl Dataset {
    pub fn from_parts(cameras: Vec<Camera>, samples: Vec<DepthSample>) -> Self {
        Self { cameras, samples }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

pub trait DatasetProvider {
    fn load(&self) -> Result<Dataset>;
}

/// Cameras from `depth_map_dir`, filtered depth and similarity maps from
/// `filtered_dir`.
#[derive(Debug, Clone)]
pub struct DepthMapFolders {
    pub depth_map_dir: PathBuf,
    pub filtered_dir: PathBuf,
    /// Only every `pixel_step`-th pixel along each image axis is used.
    pub pixel_step: usize,
}

impl DepthMapFolders {
    pub fn new(depth_map_dir: impl Into<PathBuf>, filtered_dir: impl Into<PathBuf>) -> Self {
        Self {
            depth_map_dir: depth_map_dir.into(),
            filtered_dir: filtered_dir.into(),
            pixel_step: 1,
        }
    }

    pub fn with_pixel_step(mut self, step: usize) -> Self {
        self.pixel_step = step.max(1);
        self
    }

    fn load_view(&self, id: u32) -> Result<(Camera, Vec<DepthSample>)> {
        let camera = depth_map::load_camera(&self.depth_map_dir, id)?;
        let depth = depth_map::load_depth_map(&depth_map::depth_map_file(&self.filtered_dir, id))?;
        let sim = depth_map::load_sim_map(&self.filtered_dir, id)?;

        check_size(&camera, &depth, "depth map")?;
        if let Some(sim) = &sim {
            check_size(&camera, sim, "similarity map")?;
        }

        let step = self.pixel_step.max(1);
        let mut samples = Vec::new();
        for y in (0..depth.height).step_by(step) {
            for x in (0..depth.width).step_by(step) {
                let d = depth.get(x, y);
                if d <= 0.0 {
                    continue;
                }
                samples.push(DepthSample {
                    position: camera.back_project(x as f64, y as f64, d as f64),
                    camera: id,
                    sim: sim.as_ref().map_or(PERFECT_SIMILARITY, |s| s.get(x, y)),
                });
            }
        }
        debug!(view = id, samples = samples.len(), "Loaded depth map");
        Ok((camera, samples))
    }
}

fn check_size(camera: &Camera, map: &DepthMap, what: &str) -> Result<()> {
    let k = &camera.intrinsics;
    if map.width != k.width || map.height != k.height {
        return Err(Error::InvalidInput(format!(
            "view {}: {} is {}x{} but the camera is {}x{}",
            camera.id, what, map.width, map.height, k.width, k.height
        )));
    }
    Ok(())
}

impl DatasetProvider for DepthMapFolders {
    fn load(&self) -> Result<Dataset> {
        let ids = depth_map::list_view_ids(&self.depth_map_dir)?;
        if ids.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no cameras found in {}",
                self.depth_map_dir.display()
            )));
        }

        // Collected in view order regardless of scheduling.
        let views = ids
            .par_iter()
            .map(|&id| self.load_view(id))
            .collect::<Result<Vec<_>>>()?;

        let mut dataset = Dataset::default();
        for (camera, samples) in views {
            dataset.cameras.push(camera);
            dataset.samples.extend(samples);
        }
        info!(
            views = dataset.cameras.len(),
            samples = dataset.samples.len(),
            "Loaded depth maps"
        );
        Ok(dataset)
    }
}
