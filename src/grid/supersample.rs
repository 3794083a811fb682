//! Supersampled axes for area estimation.
//!
//! Each original cell is split into `factor` sub-cells per axis and one
//! sample point is placed at the centre of every sub-cell. The outermost
//! samples therefore sit `d / (2 * factor)` inside the outer cell edges,
//! and no sample ever lands exactly on a cell edge.

use super::regular::{axis_spacing, check_regular};
use super::GridAxes;
use crate::error::MaskError;

/// Default number of samples per cell along each axis.
pub const DEFAULT_FACTOR: usize = 10;

/// Supersample a uniform axis by `factor`.
///
/// For an axis of `n` points with spacing `d`, returns `factor * n` evenly
/// spaced points from `axis[0] - d/2 + d/(2 factor)` to
/// `axis[n-1] + d/2 - d/(2 factor)`. Sample `p` lies inside original cell
/// `p / factor`.
///
/// # Example
///
/// ```
/// use gridmask_rs::grid::sample_axis;
///
/// let fine = sample_axis(&[0.0, 10.0], 10).unwrap();
/// assert_eq!(fine.len(), 20);
/// assert!((fine[0] + 4.5).abs() < 1e-9);
/// assert!((fine[19] - 14.5).abs() < 1e-9);
/// ```
pub fn sample_axis(axis: &[f64], factor: usize) -> Result<Vec<f64>, MaskError> {
    if factor == 0 {
        return Err(MaskError::InvalidFactor(factor));
    }
    let d = axis_spacing(axis)?;
    let f = factor as f64;

    let start = axis[0] - d / 2.0 + d / (2.0 * f);
    let end = axis[axis.len() - 1] + d / 2.0 - d / (2.0 * f);
    let count = factor * axis.len();
    let step = (end - start) / (count - 1) as f64;

    Ok((0..count).map(|p| start + p as f64 * step).collect())
}

/// Supersampled latitude and longitude axes of a grid.
#[derive(Debug, Clone)]
pub struct SupersampledGrid {
    /// Sample latitudes (`factor * n_lat` points)
    pub lat: Vec<f64>,
    /// Sample longitudes (`factor * n_lon` points)
    pub lon: Vec<f64>,
    /// Samples per cell along each axis
    pub factor: usize,
}

impl SupersampledGrid {
    /// Validate the grid's axes and supersample both.
    pub fn new<G: GridAxes + ?Sized>(grid: &G, factor: usize) -> Result<Self, MaskError> {
        check_regular(grid.lat())?;
        check_regular(grid.lon())?;

        Ok(Self {
            lat: sample_axis(grid.lat(), factor)?,
            lon: sample_axis(grid.lon(), factor)?,
            factor,
        })
    }

    /// Supersampled shape as (n_lat, n_lon).
    pub fn shape(&self) -> (usize, usize) {
        (self.lat.len(), self.lon.len())
    }

    /// Shape of the original grid.
    pub fn coarse_shape(&self) -> (usize, usize) {
        (self.lat.len() / self.factor, self.lon.len() / self.factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RegularGrid;

    #[test]
    fn test_sample_axis_two_points() {
        let fine = sample_axis(&[0.0, 10.0], 10).unwrap();
        assert_eq!(fine.len(), 20);
        assert!((fine[0] - (-4.5)).abs() < 1e-9);
        assert!((fine[19] - 14.5).abs() < 1e-9);
        for pair in fine.windows(2) {
            assert!((pair[1] - pair[0] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_samples_fall_inside_their_cell() {
        let axis = [100.0, 100.05, 100.1, 100.15];
        let factor = 7;
        let fine = sample_axis(&axis, factor).unwrap();
        let d = 0.05;

        for (p, &x) in fine.iter().enumerate() {
            let centre = axis[p / factor];
            let offset = (x - centre).abs();
            // Strictly inside the half-cell, never on the edge
            assert!(offset < d / 2.0 - 1e-9, "sample {p} at {x} outside cell");
        }
    }

    #[test]
    fn test_descending_axis() {
        let fine = sample_axis(&[1.0, 0.0], 2).unwrap();
        assert_eq!(fine.len(), 4);
        assert!((fine[0] - 1.25).abs() < 1e-12);
        assert!((fine[3] - (-0.25)).abs() < 1e-12);
    }

    #[test]
    fn test_factor_one_returns_axis() {
        let axis = [0.0, 1.0, 2.0];
        let fine = sample_axis(&axis, 1).unwrap();
        for (a, b) in fine.iter().zip(axis.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_errors() {
        assert!(matches!(sample_axis(&[1.0], 10), Err(MaskError::DegenerateAxis { len: 1 })));
        assert!(matches!(sample_axis(&[0.0, 1.0], 0), Err(MaskError::InvalidFactor(0))));
    }

    #[test]
    fn test_supersampled_grid() {
        let grid = RegularGrid::uniform(-30.0, 0.05, 3, 140.0, 0.05, 5);
        let fine = SupersampledGrid::new(&grid, 4).unwrap();
        assert_eq!(fine.shape(), (12, 20));
        assert_eq!(fine.coarse_shape(), (3, 5));
    }
}
