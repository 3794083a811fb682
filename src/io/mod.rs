//! I/O for region shapefiles and gridded datasets.
//!
//! This module provides:
//! - **Regions**: polygon regions from shapefiles with point-in-region lookup
//! - **Bounding boxes**: geographic extents for filtering regions by grid
//! - **Provenance**: `history` attribute log entries
//! - **NetCDF I/O**: gridded dataset reader and atomic writer (requires `netcdf` feature)
//!
//! # Example
//!
//! ```ignore
//! use gridmask_rs::io::{DatasetReader, GeoBoundingBox, Regions};
//!
//! let ds = DatasetReader::new().read("agcd_precip_2020.nc")?;
//! let bbox = GeoBoundingBox::new(112.0, -44.0, 154.0, -10.0);
//! let regions = Regions::load_within("data/aus_states.shp", &bbox)?;
//! println!("{}", regions.statistics());
//! ```

mod bbox;
mod history;
#[cfg(feature = "netcdf")]
mod netcdf_io;
mod regions;

pub use bbox::GeoBoundingBox;
pub use history::{command_line, new_log, new_log_at};
#[cfg(feature = "netcdf")]
pub use netcdf_io::{
    DatasetReader, FILL_VALUE_F32, FILL_VALUE_F64, NetCDFError, NetCDFWriterConfig, is_valid,
    write_dataset,
};
pub use regions::{Region, RegionError, RegionStatistics, Regions};
