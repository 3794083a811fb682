//! Applying boolean masks to datasets.
//!
//! Values outside the mask become `NaN`. Trimming afterwards shrinks the
//! grid to the part that still holds data:
//!
//! - [`apply`] keeps the contiguous bounding rectangle between the first
//!   and last surviving rows and columns, so null rows inside it remain.
//! - [`apply_centroid`] drops every all-null row and column individually.

use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::MaskError;
use crate::grid::GridAxes;
use crate::io::Regions;

/// Mask the selected variables and optionally trim to the data extent.
///
/// An empty `variables` slice selects every data variable. Trimming
/// re-slices every variable and coordinate, not only the selected ones.
pub fn apply(
    dataset: &Dataset,
    mask: ArrayView2<'_, bool>,
    variables: &[String],
    trim: bool,
) -> Result<Dataset, MaskError> {
    check_mask_shape(dataset, mask)?;
    let selection = dataset.resolve_selection(variables)?;

    let mut out = dataset.clone();
    for name in &selection {
        if let Some(var) = out.variable_mut(name) {
            mask_variable(&mut var.data, mask);
        }
    }

    if !trim {
        return Ok(out);
    }

    let (rows, cols) = surviving_lines(&out, &selection);
    let lat_idx = bounding_range(&rows);
    let lon_idx = bounding_range(&cols);
    debug!(
        "Trimming to {} of {} rows, {} of {} columns",
        lat_idx.len(),
        rows.len(),
        lon_idx.len(),
        cols.len()
    );

    Ok(out.select(&lat_idx, &lon_idx))
}

/// Cells whose centre lies inside any region.
pub fn centroid_mask<G: GridAxes + ?Sized>(grid: &G, regions: &Regions) -> Array2<bool> {
    let (lat, lon) = (grid.lat(), grid.lon());
    Array2::from_shape_fn((lat.len(), lon.len()), |(j, i)| {
        regions.contains_any(lon[i], lat[j])
    })
}

/// Mask every variable by cell-centre containment and drop null lines.
pub fn apply_centroid(dataset: &Dataset, regions: &Regions) -> Result<Dataset, MaskError> {
    let mask = centroid_mask(dataset, regions);

    let mut out = dataset.clone();
    for var in &mut out.variables {
        mask_variable(&mut var.data, mask.view());
    }

    let selection = out.variable_names();
    let (rows, cols) = surviving_lines(&out, &selection);
    let lat_idx: Vec<usize> = kept_indices(&rows);
    let lon_idx: Vec<usize> = kept_indices(&cols);

    Ok(out.select(&lat_idx, &lon_idx))
}

fn check_mask_shape(dataset: &Dataset, mask: ArrayView2<'_, bool>) -> Result<(), MaskError> {
    let expected = dataset.shape();
    if mask.dim() != expected {
        return Err(MaskError::ShapeMismatch {
            what: "mask".to_string(),
            expected: vec![expected.0, expected.1],
            actual: vec![mask.nrows(), mask.ncols()],
        });
    }
    Ok(())
}

/// Set values outside `mask` to `NaN` in every time slice.
fn mask_variable(data: &mut Array3<f64>, mask: ArrayView2<'_, bool>) {
    for mut slice in data.axis_iter_mut(Axis(0)) {
        Zip::from(&mut slice).and(&mask).for_each(|v, &keep| {
            if !keep {
                *v = f64::NAN;
            }
        });
    }
}

/// Flags for rows and columns holding at least one non-null value in any
/// of the named variables.
fn surviving_lines(dataset: &Dataset, selection: &[String]) -> (Vec<bool>, Vec<bool>) {
    let (n_lat, n_lon) = dataset.shape();
    let mut rows = vec![false; n_lat];
    let mut cols = vec![false; n_lon];

    for var in selection.iter().filter_map(|name| dataset.variable(name)) {
        for ((_, j, i), v) in var.data.indexed_iter() {
            if !v.is_nan() {
                rows[j] = true;
                cols[i] = true;
            }
        }
    }

    (rows, cols)
}

/// Indices from the first to the last set flag, inclusive.
fn bounding_range(flags: &[bool]) -> Vec<usize> {
    match (
        flags.iter().position(|&f| f),
        flags.iter().rposition(|&f| f),
    ) {
        (Some(first), Some(last)) => (first..=last).collect(),
        _ => Vec::new(),
    }
}

fn kept_indices(flags: &[bool]) -> Vec<usize> {
    flags
        .iter()
        .enumerate()
        .filter(|(_, f)| **f)
        .map(|(k, _)| k)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Coordinate, Variable};
    use geo::{MultiPolygon, polygon};

    fn dataset(n_lat: usize, n_lon: usize) -> Dataset {
        let lat = (0..n_lat).map(|j| -40.0 + j as f64).collect();
        let lon = (0..n_lon).map(|i| 140.0 + i as f64).collect();
        let data = Array3::from_shape_fn((2, n_lat, n_lon), |(t, j, i)| (t + j + i) as f64);
        Dataset::new(Coordinate::new("lat", lat), Coordinate::new("lon", lon))
            .with_time(Coordinate::new("time", vec![0.0, 1.0]))
            .with_variable(Variable::new("tas", data))
            .unwrap()
    }

    #[test]
    fn test_apply_without_trim() {
        let ds = dataset(3, 3);
        let mut mask = Array2::from_elem((3, 3), true);
        mask[[1, 1]] = false;

        let out = apply(&ds, mask.view(), &[], false).unwrap();
        let tas = out.variable("tas").unwrap();
        assert_eq!(tas.data.dim(), (2, 3, 3));
        assert!(tas.data[[0, 1, 1]].is_nan());
        assert!(tas.data[[1, 1, 1]].is_nan());
        assert_eq!(tas.data[[1, 0, 0]], 1.0);
    }

    #[test]
    fn test_trim_keeps_interior_null_row() {
        let ds = dataset(8, 4);
        let mut mask = Array2::from_elem((8, 4), false);
        for j in [2, 3, 5] {
            mask.row_mut(j).fill(true);
        }

        let out = apply(&ds, mask.view(), &[], true).unwrap();
        assert_eq!(out.lat.values, vec![-38.0, -37.0, -36.0, -35.0]);
        assert_eq!(out.lon.len(), 4);
        let tas = out.variable("tas").unwrap();
        assert!(tas.data.index_axis(Axis(1), 2).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_trim_columns() {
        let ds = dataset(3, 5);
        let mut mask = Array2::from_elem((3, 5), false);
        mask[[0, 1]] = true;
        mask[[2, 3]] = true;

        let out = apply(&ds, mask.view(), &[], true).unwrap();
        assert_eq!(out.lat.len(), 3);
        assert_eq!(out.lon.values, vec![141.0, 142.0, 143.0]);
    }

    #[test]
    fn test_unselected_variables_untouched() {
        let mut ds = dataset(2, 2);
        ds.add_variable(Variable::new("pr", Array3::from_elem((2, 2, 2), 5.0)))
            .unwrap();
        let mask = Array2::from_elem((2, 2), false);

        let out = apply(&ds, mask.view(), &["tas".to_string()], false).unwrap();
        assert!(out.variable("tas").unwrap().data.iter().all(|v| v.is_nan()));
        assert!(out.variable("pr").unwrap().data.iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_empty_mask_trims_everything() {
        let ds = dataset(3, 3);
        let mask = Array2::from_elem((3, 3), false);
        let out = apply(&ds, mask.view(), &[], true).unwrap();
        assert!(out.lat.is_empty());
        assert!(out.lon.is_empty());
        assert_eq!(out.variable("tas").unwrap().data.dim(), (2, 0, 0));
    }

    #[test]
    fn test_mask_shape_mismatch() {
        let ds = dataset(3, 3);
        let mask = Array2::from_elem((3, 2), true);
        assert!(matches!(
            apply(&ds, mask.view(), &[], false),
            Err(MaskError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_variable() {
        let ds = dataset(2, 2);
        let mask = Array2::from_elem((2, 2), true);
        assert!(matches!(
            apply(&ds, mask.view(), &["zg".to_string()], false),
            Err(MaskError::MissingVariable(_))
        ));
    }

    #[test]
    fn test_apply_centroid_drops_lines_individually() {
        let ds = dataset(5, 5);
        // Two blocks of centres: (lat -40, lon 140) and (lat -37, lon 143)
        let regions = Regions::from_polygons(vec![
            MultiPolygon(vec![polygon![
                (x: 139.5, y: -40.5),
                (x: 140.5, y: -40.5),
                (x: 140.5, y: -39.5),
                (x: 139.5, y: -39.5),
                (x: 139.5, y: -40.5),
            ]]),
            MultiPolygon(vec![polygon![
                (x: 142.5, y: -37.5),
                (x: 143.5, y: -37.5),
                (x: 143.5, y: -36.5),
                (x: 142.5, y: -36.5),
                (x: 142.5, y: -37.5),
            ]]),
        ]);

        let out = apply_centroid(&ds, &regions).unwrap();
        assert_eq!(out.lat.values, vec![-40.0, -37.0]);
        assert_eq!(out.lon.values, vec![140.0, 143.0]);

        let tas = out.variable("tas").unwrap();
        assert_eq!(tas.data[[0, 0, 0]], 0.0);
        assert!(tas.data[[0, 0, 1]].is_nan());
        assert_eq!(tas.data[[0, 1, 1]], 6.0);
    }
}
