//! Block aggregation of region labels into overlap fractions.
//!
//! A cell's overlap fraction with a region is the share of the cell's
//! `factor × factor` supersampled points labelled with that region. This
//! is exact for axis-aligned rectangles at supersampling resolution and
//! smooths curved or diagonal boundaries by up to about `1 / factor`.
//!
//! Labels can be fed in row tiles through [`FractionAccumulator`]. A tile
//! must span whole cells, so its row count has to be a multiple of the
//! factor; counts are integers and merge exactly across tiles.

use std::collections::HashMap;

use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::error::MaskError;
use crate::types::RegionId;

/// Overlap fractions indexed `[region, lat, lon]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FractionRaster {
    /// Region axis labels
    pub ids: Vec<RegionId>,
    /// Fractions in [0, 1]
    pub fractions: Array3<f64>,
    /// Supersampling factor used
    pub factor: usize,
}

impl FractionRaster {
    /// Number of regions on the region axis.
    pub fn n_regions(&self) -> usize {
        self.ids.len()
    }

    /// Spatial shape as (n_lat, n_lon).
    pub fn spatial_shape(&self) -> (usize, usize) {
        let (_, n_lat, n_lon) = self.fractions.dim();
        (n_lat, n_lon)
    }

    /// Fraction field for one region.
    pub fn region(&self, id: RegionId) -> Option<ArrayView2<'_, f64>> {
        let k = self.ids.iter().position(|&r| r == id)?;
        Some(self.fractions.index_axis(Axis(0), k))
    }

    /// Per-cell sum of fractions over all regions.
    pub fn total(&self) -> Array2<f64> {
        let (n_lat, n_lon) = self.spatial_shape();
        if self.ids.is_empty() {
            return Array2::zeros((n_lat, n_lon));
        }
        self.fractions.sum_axis(Axis(0))
    }
}

/// Accumulates label counts tile by tile.
#[derive(Debug, Clone)]
pub struct FractionAccumulator {
    ids: Vec<RegionId>,
    index: HashMap<RegionId, usize>,
    counts: Array3<u32>,
    factor: usize,
}

impl FractionAccumulator {
    /// Create an accumulator for `ids` on a grid of `shape` = (n_lat, n_lon).
    pub fn new(ids: &[RegionId], shape: (usize, usize), factor: usize) -> Result<Self, MaskError> {
        if factor == 0 {
            return Err(MaskError::InvalidFactor(factor));
        }

        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        let index = ids.iter().enumerate().map(|(k, &id)| (id, k)).collect();

        Ok(Self {
            counts: Array3::zeros((ids.len(), shape.0, shape.1)),
            ids,
            index,
            factor,
        })
    }

    /// Add a tile of supersampled labels whose first row belongs to
    /// original grid row `lat_start`.
    ///
    /// The tile must span the full supersampled longitude axis and a whole
    /// number of cells in latitude.
    pub fn add_tile(
        &mut self,
        labels: ArrayView2<'_, Option<RegionId>>,
        lat_start: usize,
    ) -> Result<(), MaskError> {
        let f = self.factor;
        let (_, n_lat, n_lon) = self.counts.dim();
        let (rows, cols) = labels.dim();

        if rows % f != 0 {
            return Err(MaskError::ChunkAlignment { extent: rows, factor: f });
        }
        if cols % f != 0 {
            return Err(MaskError::ChunkAlignment { extent: cols, factor: f });
        }
        if cols / f != n_lon || lat_start + rows / f > n_lat {
            return Err(MaskError::ShapeMismatch {
                what: "label tile".to_string(),
                expected: vec![(n_lat - lat_start.min(n_lat)) * f, n_lon * f],
                actual: vec![rows, cols],
            });
        }

        for ((p, q), label) in labels.indexed_iter() {
            let Some(id) = label else { continue };
            if let Some(&k) = self.index.get(id) {
                self.counts[[k, lat_start + p / f, q / f]] += 1;
            }
        }

        Ok(())
    }

    /// Finish with every requested id on the region axis.
    pub fn finish(self) -> FractionRaster {
        let per_cell = (self.factor * self.factor) as f64;
        FractionRaster {
            fractions: self.counts.mapv(|c| c as f64 / per_cell),
            ids: self.ids,
            factor: self.factor,
        }
    }

    /// Finish keeping only ids with at least one labelled point.
    pub fn finish_observed(self) -> FractionRaster {
        let observed: Vec<usize> = self
            .counts
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, plane)| plane.iter().any(|&c| c > 0))
            .map(|(k, _)| k)
            .collect();

        let per_cell = (self.factor * self.factor) as f64;
        FractionRaster {
            fractions: self
                .counts
                .select(Axis(0), &observed)
                .mapv(|c| c as f64 / per_cell),
            ids: observed.iter().map(|&k| self.ids[k]).collect(),
            factor: self.factor,
        }
    }
}

/// Block-average a full label raster into overlap fractions.
///
/// The label raster must be exactly `factor` times the original grid along
/// each axis.
pub fn aggregate(
    labels: ArrayView2<'_, Option<RegionId>>,
    region_ids: &[RegionId],
    factor: usize,
) -> Result<FractionRaster, MaskError> {
    if factor == 0 {
        return Err(MaskError::InvalidFactor(factor));
    }
    let (rows, cols) = labels.dim();
    for extent in [rows, cols] {
        if extent % factor != 0 {
            return Err(MaskError::ChunkAlignment { extent, factor });
        }
    }

    let mut acc = FractionAccumulator::new(region_ids, (rows / factor, cols / factor), factor)?;
    acc.add_tile(labels, 0)?;
    Ok(acc.finish())
}
