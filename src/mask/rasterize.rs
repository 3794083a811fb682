//! Region labelling of supersampled points.
//!
//! Every point of the supersampled grid is tested against the regions and
//! labelled with the id of the first region containing it. Rows are
//! independent, so with the `parallel` feature they are labelled across
//! threads.

use std::collections::BTreeSet;

use ndarray::Array2;

use crate::error::MaskError;
use crate::io::Regions;
use crate::types::RegionId;

/// Region label raster over a set of sample points.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionLabels {
    /// Containing region per point, indexed `[lat, lon]`
    pub labels: Array2<Option<RegionId>>,
    /// Sorted distinct ids that occur in `labels`
    pub present: Vec<RegionId>,
}

impl RegionLabels {
    /// Number of labelled (non-null) points.
    pub fn labelled_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_some()).count()
    }
}

/// Label every `(lon, lat)` sample point with its containing region.
///
/// The output is indexed `[lat, lon]`. Ids that never occur are not listed
/// in [`RegionLabels::present`].
pub fn label(regions: &Regions, lons: &[f64], lats: &[f64]) -> Result<RegionLabels, MaskError> {
    let n_lon = lons.len();
    let mut flat: Vec<Option<RegionId>> = vec![None; lats.len() * n_lon];

    if n_lon > 0 {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            flat.par_chunks_mut(n_lon)
                .zip(lats.par_iter())
                .for_each(|(row, &lat)| label_row(regions, lons, lat, row));
        }

        #[cfg(not(feature = "parallel"))]
        {
            flat.chunks_mut(n_lon)
                .zip(lats.iter())
                .for_each(|(row, &lat)| label_row(regions, lons, lat, row));
        }
    }

    let present: Vec<RegionId> = flat
        .iter()
        .flatten()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let labels = Array2::from_shape_vec((lats.len(), n_lon), flat)?;
    Ok(RegionLabels { labels, present })
}

/// Label one row of sample points at a fixed latitude.
#[inline]
fn label_row(regions: &Regions, lons: &[f64], lat: f64, row: &mut [Option<RegionId>]) {
    for (cell, &lon) in row.iter_mut().zip(lons) {
        *cell = regions.locate(lon, lat);
    }
}
