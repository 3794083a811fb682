//! Uniform-spacing validation for coordinate axes.

use crate::error::MaskError;

/// Relative tolerance between the largest and smallest axis step.
pub const SPACING_TOLERANCE: f64 = 0.01;

/// Check that an axis is strictly monotonic with uniform spacing.
///
/// The largest and smallest consecutive differences must agree within
/// [`SPACING_TOLERANCE`] relative to the larger magnitude. Axes with fewer
/// than two points have no spacing to disagree about and are accepted.
///
/// # Example
///
/// ```
/// use gridmask_rs::grid::check_regular;
///
/// assert!(check_regular(&[0.0, 1.0, 2.0, 3.0]).is_ok());
/// assert!(check_regular(&[0.0, 1.0, 3.0, 4.0]).is_err());
/// ```
pub fn check_regular(axis: &[f64]) -> Result<(), MaskError> {
    if axis.len() < 2 {
        return Ok(());
    }

    let mut min_step = f64::INFINITY;
    let mut max_step = f64::NEG_INFINITY;
    for pair in axis.windows(2) {
        let step = pair[1] - pair[0];
        min_step = min_step.min(step);
        max_step = max_step.max(step);
    }

    let irregular = MaskError::GridIrregular { min_step, max_step };

    // Zero, NaN or sign-changing steps: not a monotonic axis
    let same_sign = (min_step > 0.0 && max_step > 0.0) || (min_step < 0.0 && max_step < 0.0);
    if !same_sign {
        return Err(irregular);
    }

    let scale = min_step.abs().max(max_step.abs());
    if (max_step - min_step).abs() > SPACING_TOLERANCE * scale {
        return Err(irregular);
    }

    Ok(())
}

/// Mean spacing of an axis: `(last - first) / (n - 1)`.
///
/// Negative for descending axes.
pub fn axis_spacing(axis: &[f64]) -> Result<f64, MaskError> {
    if axis.len() < 2 {
        return Err(MaskError::DegenerateAxis { len: axis.len() });
    }
    Ok((axis[axis.len() - 1] - axis[0]) / (axis.len() - 1) as f64)
}
