//! Regular latitude/longitude grids.
//!
//! This module provides:
//! - [`GridAxes`]: accessor trait through which the algorithms see a grid
//! - [`RegularGrid`]: an owned, validated pair of axes
//! - [`check_regular`]: uniform-spacing validation
//! - [`sample_axis`] / [`SupersampledGrid`]: the finer sample axes used for
//!   overlap estimation
//!
//! Algorithms never look coordinates up by name. Whatever holds the grid
//! (a [`Dataset`](crate::dataset::Dataset), a `RegularGrid`, a test fixture)
//! hands the axes over through [`GridAxes`].

mod regular;
mod supersample;

pub use regular::{SPACING_TOLERANCE, axis_spacing, check_regular};
pub use supersample::{DEFAULT_FACTOR, SupersampledGrid, sample_axis};

use crate::error::MaskError;
use crate::io::GeoBoundingBox;

/// Read access to the latitude and longitude axes of a grid.
pub trait GridAxes {
    /// Latitude cell centres, in degrees.
    fn lat(&self) -> &[f64];

    /// Longitude cell centres, in degrees.
    fn lon(&self) -> &[f64];

    /// Grid shape as (n_lat, n_lon).
    fn shape(&self) -> (usize, usize) {
        (self.lat().len(), self.lon().len())
    }

    /// Geographic extent covered by the grid cells (centres ± half a cell).
    ///
    /// Returns `None` if either axis is shorter than two points.
    fn cell_bounds(&self) -> Option<GeoBoundingBox> {
        let (lat_lo, lat_hi) = axis_edges(self.lat())?;
        let (lon_lo, lon_hi) = axis_edges(self.lon())?;
        Some(GeoBoundingBox::new(lon_lo, lat_lo, lon_hi, lat_hi))
    }
}

/// Outer cell edges of an axis, sorted ascending.
fn axis_edges(axis: &[f64]) -> Option<(f64, f64)> {
    let d = axis_spacing(axis).ok()?.abs();
    let first = axis[0];
    let last = axis[axis.len() - 1];
    Some((first.min(last) - d / 2.0, first.max(last) + d / 2.0))
}

/// An owned regular grid whose axes passed [`check_regular`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegularGrid {
    lat: Vec<f64>,
    lon: Vec<f64>,
}

impl RegularGrid {
    /// Create a grid, validating both axes.
    pub fn new(lat: Vec<f64>, lon: Vec<f64>) -> Result<Self, MaskError> {
        check_regular(&lat)?;
        check_regular(&lon)?;
        Ok(Self { lat, lon })
    }

    /// Copy the axes of any grid, validating them.
    pub fn from_axes<G: GridAxes + ?Sized>(grid: &G) -> Result<Self, MaskError> {
        Self::new(grid.lat().to_vec(), grid.lon().to_vec())
    }

    /// Evenly spaced grid of `n_lat` × `n_lon` cell centres.
    pub fn uniform(lat0: f64, dlat: f64, n_lat: usize, lon0: f64, dlon: f64, n_lon: usize) -> Self {
        Self {
            lat: (0..n_lat).map(|j| lat0 + j as f64 * dlat).collect(),
            lon: (0..n_lon).map(|i| lon0 + i as f64 * dlon).collect(),
        }
    }
}

impl GridAxes for RegularGrid {
    fn lat(&self) -> &[f64] {
        &self.lat
    }

    fn lon(&self) -> &[f64] {
        &self.lon
    }
}
