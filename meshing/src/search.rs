//! Grid resolution search
//!
//! Coarsens the track lattice until the whole-domain track-count estimate
//! fits the budget. The narrowing rule is deliberately simple and is not
//! guaranteed to land on the finest admissible resolution:
//!
//! - `estimate / budget < 2.0`: step down by [`SLOW_STEP`]
//! - otherwise: halve the resolution

use cv_core::{Error, Result};
use std::fmt;
use tracing::info;

pub const SLOW_STEP: u32 = 100;
pub const FAST_RATIO: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Narrowing {
    Slow,
    Fast,
}

impl fmt::Display for Narrowing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Narrowing::Slow => write!(f, "slow"),
            Narrowing::Fast => write!(f, "fast"),
        }
    }
}

/// Resolution to try after `resolution` produced `estimate` tracks.
///
/// May be zero or negative; the caller decides whether that is acceptable.
pub fn next_resolution(resolution: u32, estimate: u64, budget: u64) -> (i64, Narrowing) {
    let ratio = estimate as f64 / budget as f64;
    if ratio < FAST_RATIO {
        (resolution as i64 - SLOW_STEP as i64, Narrowing::Slow)
    } else {
        ((resolution as f64 * 0.5).floor() as i64, Narrowing::Fast)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchStep {
    pub resolution: u32,
    pub estimate: u64,
    /// `None` on the accepted step.
    pub narrowing: Option<Narrowing>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub resolution: u32,
    pub estimate: u64,
    pub steps: Vec<SearchStep>,
}

#[derive(Debug, Clone, Copy)]
pub struct GranularitySearch {
    pub start: u32,
    pub budget: u64,
    /// Lowest resolution the search may try.
    pub floor: u32,
}

impl GranularitySearch {
    pub fn new(start: u32, budget: u64, floor: u32) -> Self {
        Self {
            start,
            budget,
            floor,
        }
    }

    /// Run the search with `estimate(resolution)` as the track-count oracle.
    pub fn run<F>(&self, mut estimate: F) -> Result<SearchOutcome>
    where
        F: FnMut(u32) -> Result<u64>,
    {
        if self.budget == 0 {
            return Err(Error::Configuration(
                "track budget must be positive".to_string(),
            ));
        }
        let floor = self.floor.max(1);
        if self.start < floor {
            return Err(Error::SizingSearchFailure {
                resolution: self.start,
                estimate: 0,
                budget: self.budget,
                reason: format!("start resolution is below the minimum {}", floor),
            });
        }

        let mut steps = Vec::new();
        let mut resolution = self.start;
        loop {
            let count = estimate(resolution)?;
            if count <= self.budget {
                info!(
                    resolution,
                    estimate = count,
                    budget = self.budget,
                    "Grid resolution accepted"
                );
                steps.push(SearchStep {
                    resolution,
                    estimate: count,
                    narrowing: None,
                });
                return Ok(SearchOutcome {
                    resolution,
                    estimate: count,
                    steps,
                });
            }

            let (next, narrowing) = next_resolution(resolution, count, self.budget);
            info!(
                resolution,
                estimate = count,
                budget = self.budget,
                %narrowing,
                next,
                "Track estimate over budget"
            );
            steps.push(SearchStep {
                resolution,
                estimate: count,
                narrowing: Some(narrowing),
            });

            if next < floor as i64 {
                return Err(Error::SizingSearchFailure {
                    resolution,
                    estimate: count,
                    budget: self.budget,
                    reason: format!(
                        "next resolution {} is below the minimum {}",
                        next, floor
                    ),
                });
            }
            resolution = next as u32;
        }
    }
}
