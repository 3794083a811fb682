//! Threshold masks from overlap fractions.
//!
//! [`threshold_mask`] is the single place a continuous field becomes a
//! boolean mask; it serves both region overlap fractions and observation
//! influence fractions. A cell is selected only if its value is strictly
//! greater than the threshold.

use std::fmt;

use ndarray::{Array, Array2, Array3, ArrayView, ArrayView2, Axis, Dimension};

use super::fraction::FractionRaster;
use crate::error::MaskError;
use crate::types::RegionId;

/// Check that a threshold lies in (0, 1].
pub fn validate_threshold(name: &'static str, value: f64) -> Result<f64, MaskError> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(MaskError::InvalidThreshold { name, value })
    }
}

/// Select cells whose value is strictly greater than `threshold`.
///
/// `NaN` values are never selected.
pub fn threshold_mask<D: Dimension>(
    values: ArrayView<'_, f64, D>,
    name: &'static str,
    threshold: f64,
) -> Result<Array<bool, D>, MaskError> {
    let threshold = validate_threshold(name, threshold)?;
    Ok(values.mapv(|v| v > threshold))
}

/// Boolean inclusion mask derived from a fraction raster.
///
/// The region axis is kept only when more than one region was observed.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionMask {
    /// Exactly one region present: a plain spatial mask
    Single {
        /// The only region on the axis
        id: RegionId,
        /// Mask indexed `[lat, lon]`
        mask: Array2<bool>,
    },
    /// Zero or several regions: one spatial mask per region
    Multi {
        /// Region axis labels
        ids: Vec<RegionId>,
        /// Mask indexed `[region, lat, lon]`
        mask: Array3<bool>,
    },
}

impl RegionMask {
    /// Threshold a fraction raster at `min_overlap`.
    pub fn build(raster: &FractionRaster, min_overlap: f64) -> Result<Self, MaskError> {
        let mask = threshold_mask(raster.fractions.view(), "shape_overlap", min_overlap)?;

        if let [id] = raster.ids.as_slice() {
            return Ok(RegionMask::Single {
                id: *id,
                mask: mask.index_axis_move(Axis(0), 0),
            });
        }

        Ok(RegionMask::Multi {
            ids: raster.ids.clone(),
            mask,
        })
    }

    /// Region ids on the (possibly dropped) region axis.
    pub fn ids(&self) -> Vec<RegionId> {
        match self {
            RegionMask::Single { id, .. } => vec![*id],
            RegionMask::Multi { ids, .. } => ids.clone(),
        }
    }

    /// Mask of one region.
    pub fn region(&self, id: RegionId) -> Option<ArrayView2<'_, bool>> {
        match self {
            RegionMask::Single { id: only, mask } => (*only == id).then(|| mask.view()),
            RegionMask::Multi { ids, mask } => {
                let k = ids.iter().position(|&r| r == id)?;
                Some(mask.index_axis(Axis(0), k))
            }
        }
    }

    /// Cells selected for any region.
    pub fn spatial(&self) -> Array2<bool> {
        match self {
            RegionMask::Single { mask, .. } => mask.clone(),
            RegionMask::Multi { mask, .. } => {
                mask.map_axis(Axis(0), |cell| cell.iter().any(|&m| m))
            }
        }
    }
}

/// Statistics about a spatial mask.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskStatistics {
    /// Total number of grid cells
    pub total_cells: usize,
    /// Cells kept by the mask
    pub selected_cells: usize,
    /// Cells removed by the mask
    pub excluded_cells: usize,
    /// Cells only partly covered by regions (0 < total fraction < 1)
    pub partial_cells: usize,
}

impl MaskStatistics {
    /// Count selected cells, and partial cells if fractions are given.
    pub fn compute(mask: ArrayView2<'_, bool>, fractions: Option<&FractionRaster>) -> Self {
        let total_cells = mask.len();
        let selected_cells = mask.iter().filter(|&&m| m).count();
        let partial_cells = fractions.map_or(0, |raster| {
            raster
                .total()
                .iter()
                .filter(|&&f| f > 0.0 && f < 1.0)
                .count()
        });

        Self {
            total_cells,
            selected_cells,
            excluded_cells: total_cells - selected_cells,
            partial_cells,
        }
    }
}

impl fmt::Display for MaskStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = |n: usize| {
            if self.total_cells == 0 {
                0.0
            } else {
                100.0 * n as f64 / self.total_cells as f64
            }
        };
        writeln!(f, "Mask Statistics:")?;
        writeln!(f, "  Total cells: {}", self.total_cells)?;
        let (selected, excluded) = (self.selected_cells, self.excluded_cells);
        writeln!(f, "  Selected cells: {} ({:.1}%)", selected, pct(selected))?;
        writeln!(f, "  Excluded cells: {} ({:.1}%)", excluded, pct(excluded))?;
        write!(f, "  Partial cells: {}", self.partial_cells)
    }
}
