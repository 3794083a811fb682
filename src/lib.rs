//! # gridmask-rs
//!
//! Region and observation masks for regular latitude/longitude datasets.
//!
//! This crate provides the building blocks for masking gridded climate data:
//! - Regular grid validation and supersampling
//! - Polygon regions from shapefiles
//! - Area-weighted overlap fractions by supersample-and-aggregate
//! - Threshold masks with a single-region or multi-region layout
//! - Dataset masking and trimming
//! - Observation influence fractions from analysis weights
//! - NetCDF reading and atomic writing (`netcdf` feature)
//!
//! # Example
//!
//! ```ignore
//! use gridmask_rs::{OverlapConfig, ProgressReporter, RegularGrid, Regions, overlap_mask};
//!
//! let grid = RegularGrid::uniform(-44.0, 0.05, 681, 112.0, 0.05, 841);
//! let regions = Regions::load("data/aus_states.shp")?;
//! let (mask, fractions) = overlap_mask(
//!     &grid,
//!     &regions,
//!     0.5,
//!     &OverlapConfig::default(),
//!     &mut ProgressReporter::new("overlap", 0, 10),
//! )?;
//! ```

pub mod dataset;
pub mod error;
pub mod grid;
pub mod io;
pub mod logging;
pub mod mask;
pub mod pipeline;
pub mod progress;
pub mod subset;
pub mod types;

// Re-export main types for convenience
pub use dataset::{
    AttrValue, Attributes, AuxVariable, AxisNames, Coordinate, DataType, Dataset, Variable,
};
pub use error::MaskError;
pub use grid::{
    DEFAULT_FACTOR, GridAxes, RegularGrid, SupersampledGrid, axis_spacing, check_regular,
    sample_axis,
};
pub use io::{GeoBoundingBox, Region, RegionError, Regions};
pub use mask::{
    DEFAULT_FRACTION_THRESHOLD, FractionAccumulator, FractionRaster, InfluenceAccumulator,
    MaskStatistics, RegionLabels, RegionMask, aggregate, influence_fraction, label,
    threshold_mask,
};
pub use pipeline::{
    FRACTION_LONG_NAME, FRACTION_VAR, MaskRunConfig, OverlapConfig, apply_masks,
    overlap_fractions, overlap_mask,
};
#[cfg(feature = "netcdf")]
pub use pipeline::{WeightFractionConfig, run_apply_mask, run_weight_fraction};
pub use progress::ProgressReporter;
pub use subset::{apply, apply_centroid, centroid_mask};
pub use types::RegionId;
