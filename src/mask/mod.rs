//! Region overlap estimation and mask construction.
//!
//! Overlap fractions are estimated by supersampling: every cell is split
//! into `factor × factor` points, each point is labelled with the region
//! containing it ([`label`]), and labels are block-counted back onto the
//! original grid ([`aggregate`], [`FractionAccumulator`]). Fractions are
//! then thresholded into boolean masks ([`RegionMask`], [`threshold_mask`]).
//!
//! The same thresholding serves the temporal observation influence
//! fraction ([`influence_fraction`]).

pub mod builder;
pub mod fraction;
pub mod influence;
pub mod rasterize;

pub use builder::{MaskStatistics, RegionMask, threshold_mask, validate_threshold};
pub use fraction::{FractionAccumulator, FractionRaster, aggregate};
pub use influence::{
    DEFAULT_FRACTION_THRESHOLD, INFLUENCE_WEIGHT_MIN, InfluenceAccumulator, influence_fraction,
};
pub use rasterize::{RegionLabels, label};
