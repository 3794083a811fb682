//! Observation influence fraction.
//!
//! Gridded analysis weight files assign each grid point and time step:
//!
//! | weight | meaning                                      |
//! |--------|----------------------------------------------|
//! | 0      | observations have no influence on the value  |
//! | 1      | observations have minimal influence          |
//! | 3      | observations influence the analysed value    |
//!
//! The influence fraction of a point is the share of time steps with
//! weight above 1. Points whose fraction does not exceed a threshold
//! (default 0.9) are masked through the same
//! [`threshold_mask`](super::threshold_mask) used for region overlap.
//!
//! Counting is additive, so weight series split along time (one file per
//! year, say) are accumulated chunk by chunk and merged.

use ndarray::{Array2, ArrayView3, Axis, Zip};

use crate::error::MaskError;

/// Default influence fraction threshold.
pub const DEFAULT_FRACTION_THRESHOLD: f64 = 0.9;

/// Weights above this value count as observation-influenced.
pub const INFLUENCE_WEIGHT_MIN: f64 = 1.0;

/// Allowed weight values.
const ALLOWED_WEIGHTS: [f64; 3] = [0.0, 1.0, 3.0];

/// Running influence counts over one or more time chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct InfluenceAccumulator {
    counts: Array2<u32>,
    n_steps: usize,
}

impl InfluenceAccumulator {
    /// Create an empty accumulator for a grid of `shape` = (n_lat, n_lon).
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            counts: Array2::zeros(shape),
            n_steps: 0,
        }
    }

    /// Add a chunk of weights indexed `[time, lat, lon]`.
    ///
    /// Missing (`NaN`) weights count as time steps without influence.
    /// Any other value outside {0, 1, 3} is rejected.
    pub fn add(&mut self, weights: ArrayView3<'_, f64>) -> Result<(), MaskError> {
        let (n_t, n_lat, n_lon) = weights.dim();
        if (n_lat, n_lon) != self.counts.dim() {
            return Err(MaskError::ShapeMismatch {
                what: "weight chunk".to_string(),
                expected: vec![n_t, self.counts.nrows(), self.counts.ncols()],
                actual: vec![n_t, n_lat, n_lon],
            });
        }

        if let Some(&value) = weights
            .iter()
            .find(|w| !w.is_nan() && !ALLOWED_WEIGHTS.contains(w))
        {
            return Err(MaskError::InvalidWeight { value });
        }

        for step in weights.axis_iter(Axis(0)) {
            Zip::from(&mut self.counts).and(&step).for_each(|count, &w| {
                if w > INFLUENCE_WEIGHT_MIN {
                    *count += 1;
                }
            });
        }
        self.n_steps += n_t;

        Ok(())
    }

    /// Merge counts from another accumulator over the same grid.
    pub fn merge(&mut self, other: &InfluenceAccumulator) -> Result<(), MaskError> {
        if other.counts.dim() != self.counts.dim() {
            return Err(MaskError::ShapeMismatch {
                what: "influence counts".to_string(),
                expected: vec![self.counts.nrows(), self.counts.ncols()],
                actual: vec![other.counts.nrows(), other.counts.ncols()],
            });
        }
        self.counts += &other.counts;
        self.n_steps += other.n_steps;
        Ok(())
    }

    /// Number of time steps accumulated so far.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Fraction of influenced time steps per grid point.
    pub fn finish(&self) -> Result<Array2<f64>, MaskError> {
        if self.n_steps == 0 {
            return Err(MaskError::EmptyTimeAxis);
        }
        let total = self.n_steps as f64;
        Ok(self.counts.mapv(|c| c as f64 / total))
    }
}

/// Influence fraction of a complete weight series indexed `[time, lat, lon]`.
pub fn influence_fraction(weights: ArrayView3<'_, f64>) -> Result<Array2<f64>, MaskError> {
    let (_, n_lat, n_lon) = weights.dim();
    let mut acc = InfluenceAccumulator::new((n_lat, n_lon));
    acc.add(weights)?;
    acc.finish()
}
