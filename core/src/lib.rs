//! Core types shared across the cv workspace.
//!
//! Holds the workspace-wide [`Error`] type and the calibrated camera model
//! used to lift depth maps into world space.

pub mod error;
pub mod geometry;

pub use error::{Error, Result};
pub use geometry::{Camera, CameraExtrinsics, CameraIntrinsics};
