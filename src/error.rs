//! Error type for the masking pipeline.
//!
//! Every failure is fatal for a run: nothing is retried and no partial
//! output is written. I/O errors from the shapefile and NetCDF layers are
//! wrapped so callers only handle one type.

use thiserror::Error;

use crate::io::RegionError;
#[cfg(feature = "netcdf")]
use crate::io::NetCDFError;

/// Error type for grid validation, overlap estimation, masking and subsetting.
#[derive(Debug, Error)]
pub enum MaskError {
    /// Coordinate spacing is not uniform (or the axis is not strictly monotonic)
    #[error("Irregular grid: spacing varies from {min_step} to {max_step} (1% tolerance)")]
    GridIrregular {
        /// Smallest consecutive difference
        min_step: f64,
        /// Largest consecutive difference
        max_step: f64,
    },

    /// Axis too short to define a spacing
    #[error("Axis with {len} point(s) has no defined spacing")]
    DegenerateAxis {
        /// Number of points on the axis
        len: usize,
    },

    /// Supersampling factor of zero
    #[error("Supersampling factor must be at least 1, got {0}")]
    InvalidFactor(usize),

    /// Overlap or influence threshold outside (0, 1]
    #[error("Threshold {value} for {name} must be in (0, 1]")]
    InvalidThreshold {
        /// Which threshold was rejected
        name: &'static str,
        /// Rejected value
        value: f64,
    },

    /// Required lat/lon coordinate missing
    #[error("Missing coordinate: {0}")]
    MissingCoordinate(String),

    /// A processing block is not a whole number of supersampled cells
    #[error("Block extent {extent} is not a multiple of the supersampling factor {factor}")]
    ChunkAlignment {
        /// Offending extent in supersampled points
        extent: usize,
        /// Supersampling factor
        factor: usize,
    },

    /// Arrays that must share a grid do not
    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Description of the mismatched array
        what: String,
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        actual: Vec<usize>,
    },

    /// Weight value outside {0, 1, 3}
    #[error("Invalid observation weight {value}: expected one of 0, 1, 3")]
    InvalidWeight {
        /// Offending value
        value: f64,
    },

    /// Weight series without any time steps
    #[error("Observation weights contain no time steps")]
    EmptyTimeAxis,

    /// Requested variable not present in the dataset
    #[error("Missing variable: {0}")]
    MissingVariable(String),

    /// Array construction failed
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Shapefile loading error
    #[error(transparent)]
    Regions(#[from] RegionError),

    /// NetCDF read/write error
    #[cfg(feature = "netcdf")]
    #[error(transparent)]
    NetCDF(#[from] NetCDFError),
}
