//! Strongly-typed identifiers shared across the masking pipeline.
//!
//! Region ids flow from the shapefile loader through the rasterizer into
//! the region axis of fraction rasters and masks. Wrapping them in a
//! newtype keeps them from being confused with grid indices.
//!
//! # Example
//!
//! ```
//! use gridmask_rs::types::RegionId;
//!
//! let id = RegionId::new(3);
//! assert_eq!(id.get(), 3);
//! assert_eq!(format!("{}", id), "R3");
//! ```

mod region_id;

pub use region_id::RegionId;
