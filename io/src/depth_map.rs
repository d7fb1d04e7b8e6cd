//! Depth-map dataset files
//!
//! A dataset is two folders of plain-text files keyed by view id:
//!
//! - `<id>_cam.txt`: `fx fy cx cy width height`, three rotation rows and a
//!   translation row (world to camera)
//! - `<id>_depthMap.txt`: `width height` followed by row-major depths,
//!   non-positive values mark invalid pixels
//! - `<id>_simMap.txt`: optional similarity map with the depth-map layout

use cv_core::geometry::{Camera, CameraExtrinsics, CameraIntrinsics};
use cv_core::{Error, Result};
use nalgebra::{Matrix3, Vector3};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const CAMERA_SUFFIX: &str = "_cam.txt";

pub fn camera_file(dir: &Path, id: u32) -> PathBuf {
    dir.join(format!("{}{}", id, CAMERA_SUFFIX))
}

pub fn depth_map_file(dir: &Path, id: u32) -> PathBuf {
    dir.join(format!("{}_depthMap.txt", id))
}

pub fn sim_map_file(dir: &Path, id: u32) -> PathBuf {
    dir.join(format!("{}_simMap.txt", id))
}

fn parse_numbers<T: std::str::FromStr>(text: &str, what: &str) -> Result<Vec<T>> {
    text.split_whitespace()
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| Error::Parse(format!("Invalid number in {}: {}", what, s)))
        })
        .collect()
}

fn read_text<R: Read>(mut reader: R) -> Result<String> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}

/// Ids of every view that has a camera file in `dir`, ascending.
pub fn list_view_ids(dir: &Path) -> Result<Vec<u32>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::persistence(dir, e))?;
    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(stem) = name.strip_suffix(CAMERA_SUFFIX) {
            if let Ok(id) = stem.parse::<u32>() {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

pub fn read_camera<R: Read>(id: u32, reader: R) -> Result<Camera> {
    let what = format!("camera {}", id);
    let v: Vec<f64> = parse_numbers(&read_text(reader)?, &what)?;
    if v.len() != 18 {
        return Err(Error::Parse(format!(
            "{}: expected 18 values, found {}",
            what,
            v.len()
        )));
    }
    if v[4] < 1.0 || v[5] < 1.0 || v[4].fract() != 0.0 || v[5].fract() != 0.0 {
        return Err(Error::Parse(format!(
            "{}: invalid image size {}x{}",
            what, v[4], v[5]
        )));
    }
    let intrinsics = CameraIntrinsics::new(v[0], v[1], v[2], v[3], v[4] as u32, v[5] as u32);
    let rotation = Matrix3::from_row_slice(&v[6..15]);
    let translation = Vector3::new(v[15], v[16], v[17]);
    Ok(Camera::new(
        id,
        intrinsics,
        CameraExtrinsics::new(rotation, translation),
    ))
}

pub fn write_camera<W: Write>(writer: &mut W, camera: &Camera) -> Result<()> {
    let k = &camera.intrinsics;
    writeln!(
        writer,
        "{} {} {} {} {} {}",
        k.fx, k.fy, k.cx, k.cy, k.width, k.height
    )?;
    let r = &camera.extrinsics.rotation;
    for row in 0..3 {
        writeln!(writer, "{} {} {}", r[(row, 0)], r[(row, 1)], r[(row, 2)])?;
    }
    let t = &camera.extrinsics.translation;
    writeln!(writer, "{} {} {}", t.x, t.y, t.z)?;
    Ok(())
}

pub fn load_camera(dir: &Path, id: u32) -> Result<Camera> {
    let path = camera_file(dir, id);
    let file = fs::File::open(&path).map_err(|e| Error::persistence(&path, e))?;
    read_camera(id, file)
}

/// Row-major per-pixel values.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl DepthMap {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if values.len() != expected {
            return Err(Error::InvalidInput(format!(
                "{}x{} map needs {} values, got {}",
                width,
                height,
                expected,
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Map of the given size with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            values: vec![value; width as usize * height as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }
}

pub fn read_depth_map<R: Read>(reader: R) -> Result<DepthMap> {
    let text = read_text(reader)?;
    let mut tokens = text.split_whitespace();
    let mut dim = || -> Result<u32> {
        tokens
            .next()
            .ok_or_else(|| Error::Parse("depth map header is truncated".to_string()))?
            .parse()
            .map_err(|_| Error::Parse("depth map header is not `width height`".to_string()))
    };
    let width = dim()?;
    let height = dim()?;
    let values: Vec<f32> = tokens
        .map(|s| {
            s.parse()
                .map_err(|_| Error::Parse(format!("Invalid depth value: {}", s)))
        })
        .collect::<Result<_>>()?;
    DepthMap::new(width, height, values)
}

pub fn write_depth_map<W: Write>(writer: &mut W, map: &DepthMap) -> Result<()> {
    writeln!(writer, "{} {}", map.width, map.height)?;
    for row in map.values.chunks(map.width.max(1) as usize) {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", line.join(" "))?;
    }
    Ok(())
}

pub fn load_depth_map(path: &Path) -> Result<DepthMap> {
    let file = fs::File::open(path).map_err(|e| Error::persistence(path, e))?;
    read_depth_map(file)
}

/// Similarity map for `id`, or `None` when the folder has none.
pub fn load_sim_map(dir: &Path, id: u32) -> Result<Option<DepthMap>> {
    let path = sim_map_file(dir, id);
    if !path.exists() {
        return Ok(None);
    }
    load_depth_map(&path).map(Some)
}
