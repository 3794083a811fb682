//! End-to-end masking runs.
//!
//! The in-memory stages are:
//!
//! 1. [`overlap_fractions`]: supersample the grid, label the samples tile by
//!    tile and accumulate per-region overlap fractions
//! 2. [`overlap_mask`]: threshold the fractions into a [`RegionMask`]
//! 3. [`apply_masks`]: mask (and trim) a dataset by region and by
//!    observation influence
//!
//! With the `netcdf` feature, [`run_apply_mask`] and [`run_weight_fraction`]
//! wrap these with file reading, provenance and atomic output.

use ndarray::{Array2, ArrayView2, Axis};
use tracing::{debug, info};

use crate::dataset::{AxisNames, Dataset};
use crate::error::MaskError;
use crate::grid::{DEFAULT_FACTOR, GridAxes, SupersampledGrid};
use crate::io::{Region, Regions};
use crate::mask::{
    DEFAULT_FRACTION_THRESHOLD, FractionAccumulator, FractionRaster, MaskStatistics, RegionMask,
    label, threshold_mask, validate_threshold,
};
use crate::progress::ProgressReporter;
use crate::subset;
use crate::types::RegionId;

/// Name of the observation influence fraction variable.
pub const FRACTION_VAR: &str = "fraction";

/// `long_name` of the observation influence fraction variable.
pub const FRACTION_LONG_NAME: &str = "fraction of times influenced by observations";

/// Tolerance for matching coordinate values between two grids.
const COORD_MATCH_TOLERANCE: f64 = 1.0e-6;

// ============================================================================
// Overlap estimation
// ============================================================================

/// Configuration for overlap fraction estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapConfig {
    /// Samples per cell along each axis
    pub factor: usize,
    /// Supersampled rows labelled per tile (`None` = whole grid at once)
    pub tile_rows: Option<usize>,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            factor: DEFAULT_FACTOR,
            tile_rows: None,
        }
    }
}

impl OverlapConfig {
    /// Set the supersampling factor.
    pub fn with_factor(mut self, factor: usize) -> Self {
        self.factor = factor;
        self
    }

    /// Label the supersampled grid in tiles of `rows` rows.
    ///
    /// `rows` must be a positive multiple of the factor.
    pub fn with_tile_rows(mut self, rows: usize) -> Self {
        self.tile_rows = Some(rows);
        self
    }

    /// Tile height for a supersampled grid of `total_rows` rows.
    fn tile_rows_for(&self, total_rows: usize) -> Result<usize, MaskError> {
        match self.tile_rows {
            None => Ok(total_rows.max(1)),
            Some(rows) if rows == 0 || rows % self.factor != 0 => Err(MaskError::ChunkAlignment {
                extent: rows,
                factor: self.factor,
            }),
            Some(rows) => Ok(rows),
        }
    }
}

/// Estimate per-region overlap fractions for every grid cell.
///
/// Regions whose extent misses the grid are skipped before labelling, and
/// regions that cover no sample point are dropped from the region axis.
pub fn overlap_fractions<G: GridAxes + ?Sized>(
    grid: &G,
    regions: &Regions,
    config: &OverlapConfig,
    progress: &mut ProgressReporter,
) -> Result<FractionRaster, MaskError> {
    if config.factor == 0 {
        return Err(MaskError::InvalidFactor(config.factor));
    }
    let fine = SupersampledGrid::new(grid, config.factor)?;
    let tile_rows = config.tile_rows_for(fine.lat.len())?;

    let candidates = match grid.cell_bounds() {
        Some(bounds) => regions.within(&bounds),
        None => regions.clone(),
    };
    info!(
        "{} of {} region(s) intersect the grid",
        candidates.len(),
        regions.len()
    );

    let (n_lat, n_lon) = grid.shape();
    let (fine_lat, fine_lon) = fine.shape();
    info!(
        "Supersampling {}x{} cells by {} to {}x{} points",
        n_lat, n_lon, config.factor, fine_lat, fine_lon
    );

    let ids: Vec<RegionId> = candidates.iter().map(Region::id).collect();
    let mut acc = FractionAccumulator::new(&ids, (n_lat, n_lon), config.factor)?;

    progress.set_total(fine_lat.div_ceil(tile_rows));
    for start in (0..fine_lat).step_by(tile_rows) {
        let end = (start + tile_rows).min(fine_lat);
        let tile = label(&candidates, &fine.lon, &fine.lat[start..end])?;
        debug!(
            "Rows {}..{}: {} labelled point(s)",
            start,
            end,
            tile.labelled_count()
        );
        acc.add_tile(tile.labels.view(), start / config.factor)?;
        progress.advance(1);
    }
    progress.finish();

    Ok(acc.finish_observed())
}

/// Overlap fractions thresholded at `min_overlap`.
///
/// The threshold is validated before any sampling is done.
pub fn overlap_mask<G: GridAxes + ?Sized>(
    grid: &G,
    regions: &Regions,
    min_overlap: f64,
    config: &OverlapConfig,
    progress: &mut ProgressReporter,
) -> Result<(RegionMask, FractionRaster), MaskError> {
    validate_threshold("shape_overlap", min_overlap)?;
    let raster = overlap_fractions(grid, regions, config, progress)?;
    let mask = RegionMask::build(&raster, min_overlap)?;
    Ok((mask, raster))
}

// ============================================================================
// Dataset masking
// ============================================================================

/// Configuration for a masking run.
#[derive(Debug, Clone)]
pub struct MaskRunConfig {
    /// Variables to mask (all data variables if empty)
    pub variables: Vec<String>,
    /// Minimum overlap fraction for area-weighted region masking;
    /// `None` selects cells by centre point instead
    pub shape_overlap: Option<f64>,
    /// Trim the output to the bounding rectangle of surviving data
    pub trim: bool,
    /// Observation influence fraction threshold
    pub fraction_threshold: f64,
    /// Overlap estimation settings
    pub overlap: OverlapConfig,
    /// Dimension names in the input files
    pub axes: AxisNames,
    /// Command line recorded in the output history
    pub command: String,
}

impl Default for MaskRunConfig {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            shape_overlap: None,
            trim: true,
            fraction_threshold: DEFAULT_FRACTION_THRESHOLD,
            overlap: OverlapConfig::default(),
            axes: AxisNames::default(),
            command: crate::io::command_line(),
        }
    }
}

impl MaskRunConfig {
    /// Set the variables to mask.
    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.variables = variables;
        self
    }

    /// Use area-weighted region masking at `min_overlap`.
    pub fn with_shape_overlap(mut self, min_overlap: f64) -> Self {
        self.shape_overlap = Some(min_overlap);
        self
    }

    /// Enable or disable trimming.
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Set the observation influence fraction threshold.
    pub fn with_fraction_threshold(mut self, threshold: f64) -> Self {
        self.fraction_threshold = threshold;
        self
    }

    /// Set the overlap estimation settings.
    pub fn with_overlap(mut self, overlap: OverlapConfig) -> Self {
        self.overlap = overlap;
        self
    }

    /// Set the dimension names.
    pub fn with_axes(mut self, axes: AxisNames) -> Self {
        self.axes = axes;
        self
    }

    /// Set the command recorded in the history.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

/// Mask a dataset by regions and/or observation influence.
///
/// Region masking comes first. With a `shape_overlap` the area-weighted
/// mask is applied to the selected variables (and trimmed if enabled);
/// without one every variable is masked by cell centre and all-null rows
/// and columns are dropped. The observation fraction grid is then matched
/// to the remaining grid by coordinate value and thresholded.
pub fn apply_masks(
    dataset: &Dataset,
    regions: Option<&Regions>,
    obs_fraction: Option<&Dataset>,
    config: &MaskRunConfig,
    progress: &mut ProgressReporter,
) -> Result<Dataset, MaskError> {
    if let Some(min_overlap) = config.shape_overlap {
        validate_threshold("shape_overlap", min_overlap)?;
    }
    if obs_fraction.is_some() {
        validate_threshold("fraction_threshold", config.fraction_threshold)?;
    }

    let selection = dataset.resolve_selection(&config.variables)?;
    if let Some(first) = selection.first().and_then(|name| dataset.variable(name)) {
        info!("Array size: {:?}", first.data.shape());
    }

    let mut out = match (regions, config.shape_overlap) {
        (Some(regions), Some(min_overlap)) => {
            let (mask, raster) =
                overlap_mask(dataset, regions, min_overlap, &config.overlap, progress)?;
            let spatial = mask.spatial();
            info!("{}", MaskStatistics::compute(spatial.view(), Some(&raster)));
            subset::apply(dataset, spatial.view(), &selection, config.trim)?
        }
        (Some(regions), None) => subset::apply_centroid(dataset, regions)?,
        (None, _) => dataset.clone(),
    };

    if let Some(obs) = obs_fraction {
        let fraction = aligned_fraction(&out, obs)?;
        let mask = threshold_mask(
            fraction.view(),
            "fraction_threshold",
            config.fraction_threshold,
        )?;
        info!("{}", MaskStatistics::compute(mask.view(), None));
        out = subset::apply(&out, mask.view(), &selection, false)?;
    }

    Ok(out)
}

/// Observation fraction field resampled onto `target`'s grid points.
fn aligned_fraction(target: &Dataset, obs: &Dataset) -> Result<Array2<f64>, MaskError> {
    let var = obs
        .variable(FRACTION_VAR)
        .ok_or_else(|| MaskError::MissingVariable(FRACTION_VAR.to_string()))?;
    let fraction: ArrayView2<'_, f64> = var.first_slice();

    let mismatch = || MaskError::ShapeMismatch {
        what: "observation fraction grid".to_string(),
        expected: vec![target.lat.len(), target.lon.len()],
        actual: vec![obs.lat.len(), obs.lon.len()],
    };
    let lat_idx = match_coordinates(&target.lat.values, &obs.lat.values).ok_or_else(mismatch)?;
    let lon_idx = match_coordinates(&target.lon.values, &obs.lon.values).ok_or_else(mismatch)?;

    Ok(fraction.select(Axis(0), &lat_idx).select(Axis(1), &lon_idx))
}

/// Index into `source` of every `target` value, if all are present.
fn match_coordinates(target: &[f64], source: &[f64]) -> Option<Vec<usize>> {
    target
        .iter()
        .map(|&t| {
            source
                .iter()
                .position(|&s| (s - t).abs() <= COORD_MATCH_TOLERANCE)
        })
        .collect()
}

// ============================================================================
// File runs
// ============================================================================

#[cfg(feature = "netcdf")]
pub use file_runs::{WeightFractionConfig, run_apply_mask, run_weight_fraction};

#[cfg(feature = "netcdf")]
mod file_runs {
    use std::path::{Path, PathBuf};

    use tracing::info;

    use super::{FRACTION_LONG_NAME, FRACTION_VAR, MaskRunConfig, apply_masks};
    use crate::dataset::{AxisNames, DataType, Dataset, Variable};
    use crate::error::MaskError;
    use crate::grid::GridAxes;
    use crate::io::{
        DatasetReader, NetCDFWriterConfig, Regions, command_line, new_log, write_dataset,
    };
    use crate::mask::InfluenceAccumulator;
    use crate::progress::ProgressReporter;

    /// Mask `infile` and write the result to `outfile`.
    ///
    /// `shapefile` supplies the regions; `obs_fraction_file` a `fraction`
    /// field written by [`run_weight_fraction`]. The output history starts
    /// with the invoking command, followed by the input file's history.
    pub fn run_apply_mask(
        infile: &Path,
        outfile: &Path,
        shapefile: Option<&Path>,
        obs_fraction_file: Option<&Path>,
        config: &MaskRunConfig,
        progress: &mut ProgressReporter,
    ) -> Result<(), MaskError> {
        let dataset = DatasetReader::new()
            .with_axes(config.axes.clone())
            .read(infile)?;

        let regions = match shapefile {
            Some(path) => {
                let regions = match dataset.cell_bounds() {
                    Some(bounds) => Regions::load_within(path, &bounds)?,
                    None => Regions::load(path)?,
                };
                info!("{}", regions.statistics());
                Some(regions)
            }
            None => None,
        };

        let obs_fraction = obs_fraction_file
            .map(|path| {
                DatasetReader::new()
                    .with_axes(config.axes.clone())
                    .with_variables(vec![FRACTION_VAR.to_string()])
                    .read(path)
            })
            .transpose()?;

        let mut out = apply_masks(
            &dataset,
            regions.as_ref(),
            obs_fraction.as_ref(),
            config,
            progress,
        )?;

        let prior: Vec<(String, String)> = dataset
            .history()
            .map(|h| vec![(infile.display().to_string(), h.to_string())])
            .unwrap_or_default();
        out.set_history(new_log(&config.command, &prior));

        write_dataset(&out, &NetCDFWriterConfig::new(outfile))?;
        Ok(())
    }

    /// Configuration for an observation influence fraction run.
    #[derive(Debug, Clone)]
    pub struct WeightFractionConfig {
        /// Name of the weight variable
        pub weight_var: String,
        /// Dimension names in the input files
        pub axes: AxisNames,
        /// Command line recorded in the output history
        pub command: String,
    }

    impl Default for WeightFractionConfig {
        fn default() -> Self {
            Self {
                weight_var: "weight".to_string(),
                axes: AxisNames::default(),
                command: command_line(),
            }
        }
    }

    impl WeightFractionConfig {
        /// Set the weight variable name.
        pub fn with_weight_var(mut self, name: impl Into<String>) -> Self {
            self.weight_var = name.into();
            self
        }

        /// Set the dimension names.
        pub fn with_axes(mut self, axes: AxisNames) -> Self {
            self.axes = axes;
            self
        }

        /// Set the command recorded in the history.
        pub fn with_command(mut self, command: impl Into<String>) -> Self {
            self.command = command.into();
            self
        }
    }

    /// Compute the observation influence fraction over the concatenated
    /// time axis of `infiles` and write it to `outfile`.
    pub fn run_weight_fraction(
        infiles: &[PathBuf],
        outfile: &Path,
        config: &WeightFractionConfig,
        progress: &mut ProgressReporter,
    ) -> Result<(), MaskError> {
        let reader = DatasetReader::new()
            .with_axes(config.axes.clone())
            .with_variables(vec![config.weight_var.clone()]);

        progress.set_total(infiles.len());
        let mut grid: Option<(Dataset, InfluenceAccumulator)> = None;
        for path in infiles {
            let ds = reader.read(path)?;
            let weights = ds
                .variable(&config.weight_var)
                .ok_or_else(|| MaskError::MissingVariable(config.weight_var.clone()))?
                .data
                .view();

            let (_, acc) = grid.get_or_insert_with(|| {
                let acc = InfluenceAccumulator::new(ds.shape());
                (Dataset::new(ds.lat.clone(), ds.lon.clone()), acc)
            });
            acc.add(weights)?;
            progress.advance(1);
        }
        progress.finish();

        let (mut out, acc) = grid.ok_or(MaskError::EmptyTimeAxis)?;
        info!(
            "Accumulated {} time step(s) from {} file(s)",
            acc.n_steps(),
            infiles.len()
        );

        // Written as double so k/T compares exactly against the threshold
        let fraction = Variable::spatial(FRACTION_VAR, acc.finish()?)
            .with_dtype(DataType::Double)
            .with_attribute("long_name", FRACTION_LONG_NAME);
        out.add_variable(fraction)?;
        out.set_history(new_log(&config.command, &[]));

        write_dataset(&out, &NetCDFWriterConfig::new(outfile))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Coordinate, Variable};
    use crate::grid::RegularGrid;
    use crate::mask::influence_fraction;
    use geo::{MultiPolygon, polygon};
    use ndarray::{Array3, s};

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]])
    }

    fn dataset() -> Dataset {
        // Cells of 1 degree centred on lat 0..3, lon 10..13
        let lat = vec![0.0, 1.0, 2.0, 3.0];
        let lon = vec![10.0, 11.0, 12.0, 13.0];
        let data = Array3::from_elem((2, 4, 4), 1.0);
        Dataset::new(Coordinate::new("lat", lat), Coordinate::new("lon", lon))
            .with_time(Coordinate::new("time", vec![0.0, 1.0]))
            .with_variable(Variable::new("pr", data))
            .unwrap()
    }

    fn silent() -> ProgressReporter {
        ProgressReporter::silent()
    }

    #[test]
    fn test_tile_rows_must_align() {
        let grid = RegularGrid::uniform(0.0, 1.0, 3, 0.0, 1.0, 3);
        let regions = Regions::from_polygons(vec![square(-0.5, -0.5, 2.5, 2.5)]);
        let config = OverlapConfig::default().with_factor(4).with_tile_rows(6);

        let result = overlap_fractions(&grid, &regions, &config, &mut silent());
        assert!(matches!(result, Err(MaskError::ChunkAlignment { extent: 6, factor: 4 })));
    }

    #[test]
    fn test_tiled_matches_untiled() {
        let grid = RegularGrid::uniform(0.0, 1.0, 5, 0.0, 1.0, 4);
        let triangle = polygon![
            (x: -0.5, y: -0.5),
            (x: 3.2, y: 0.7),
            (x: 1.0, y: 4.5),
            (x: -0.5, y: -0.5),
        ];
        let regions = Regions::from_polygons(vec![
            MultiPolygon(vec![triangle]),
            square(2.0, 2.0, 3.5, 4.5),
        ]);

        let whole =
            overlap_fractions(&grid, &regions, &OverlapConfig::default(), &mut silent()).unwrap();
        let tiled = overlap_fractions(
            &grid,
            &regions,
            &OverlapConfig::default().with_tile_rows(20),
            &mut silent(),
        )
        .unwrap();
        assert_eq!(whole, tiled);
    }

    #[test]
    fn test_regions_outside_grid_are_dropped() {
        let grid = RegularGrid::uniform(0.0, 1.0, 2, 0.0, 1.0, 2);
        let regions = Regions::from_polygons(vec![
            square(50.0, 50.0, 51.0, 51.0),
            square(-0.5, -0.5, 1.5, 1.5),
        ]);

        let (mask, raster) =
            overlap_mask(&grid, &regions, 0.5, &OverlapConfig::default(), &mut silent()).unwrap();
        assert_eq!(raster.ids, vec![RegionId::new(1)]);
        assert!(matches!(mask, RegionMask::Single { .. }));
    }

    #[test]
    fn test_invalid_overlap_rejected_before_sampling() {
        let grid = RegularGrid::uniform(0.0, 1.0, 2, 0.0, 1.0, 2);
        let regions = Regions::default();
        let result = overlap_mask(&grid, &regions, 1.5, &OverlapConfig::default(), &mut silent());
        assert!(matches!(result, Err(MaskError::InvalidThreshold { .. })));
    }

    #[test]
    fn test_apply_masks_overlap_with_trim() {
        let ds = dataset();
        let regions = Regions::from_polygons(vec![square(9.5, 0.5, 11.5, 2.5)]);
        let config = MaskRunConfig::default().with_shape_overlap(0.5).with_command("test");

        let out = apply_masks(&ds, Some(&regions), None, &config, &mut silent()).unwrap();
        assert_eq!(out.lat.values, vec![1.0, 2.0]);
        assert_eq!(out.lon.values, vec![10.0, 11.0]);
        assert!(out.variable("pr").unwrap().data.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_apply_masks_centroid() {
        let ds = dataset();
        let regions = Regions::from_polygons(vec![square(11.5, 2.5, 13.5, 3.5)]);
        let config = MaskRunConfig::default().with_command("test");

        let out = apply_masks(&ds, Some(&regions), None, &config, &mut silent()).unwrap();
        assert_eq!(out.lat.values, vec![3.0]);
        assert_eq!(out.lon.values, vec![12.0, 13.0]);
    }

    #[test]
    fn test_apply_masks_obs_fraction_after_trim() {
        let ds = dataset();
        let regions = Regions::from_polygons(vec![square(9.5, -0.5, 11.5, 3.5)]);

        let mut fraction = Array2::from_elem((4, 4), 0.95);
        fraction[[2, 1]] = 0.5;
        let obs = Dataset::new(ds.lat.clone(), ds.lon.clone())
            .with_variable(Variable::spatial(FRACTION_VAR, fraction))
            .unwrap();

        let config = MaskRunConfig::default().with_shape_overlap(0.5).with_command("test");
        let out = apply_masks(&ds, Some(&regions), Some(&obs), &config, &mut silent()).unwrap();

        assert_eq!(out.lon.values, vec![10.0, 11.0]);
        let pr = out.variable("pr").unwrap();
        assert!(pr.data[[0, 2, 1]].is_nan());
        assert_eq!(pr.data[[0, 2, 0]], 1.0);
    }

    #[test]
    fn test_fraction_equal_to_threshold_is_masked() {
        let ds = Dataset::new(
            Coordinate::new("lat", vec![0.0]),
            Coordinate::new("lon", vec![10.0, 11.0, 12.0]),
        )
        .with_variable(Variable::new("pr", Array3::from_elem((1, 1, 3), 2.0)))
        .unwrap();

        // 3, 6 and 7 influenced steps out of 10
        let mut weights = Array3::zeros((10, 1, 3));
        weights.slice_mut(s![0..3, 0, 0]).fill(3.0);
        weights.slice_mut(s![0..6, 0, 1]).fill(3.0);
        weights.slice_mut(s![0..7, 0, 2]).fill(3.0);
        let fraction = influence_fraction(weights.view()).unwrap();
        let obs = Dataset::new(ds.lat.clone(), ds.lon.clone())
            .with_variable(Variable::spatial(FRACTION_VAR, fraction))
            .unwrap();

        let at_03 = MaskRunConfig::default().with_fraction_threshold(0.3).with_command("test");
        let out = apply_masks(&ds, None, Some(&obs), &at_03, &mut silent()).unwrap();
        let pr = out.variable("pr").unwrap();
        assert!(pr.data[[0, 0, 0]].is_nan());
        assert_eq!(pr.data[[0, 0, 1]], 2.0);

        let at_06 = MaskRunConfig::default().with_fraction_threshold(0.6).with_command("test");
        let out = apply_masks(&ds, None, Some(&obs), &at_06, &mut silent()).unwrap();
        let pr = out.variable("pr").unwrap();
        assert!(pr.data[[0, 0, 1]].is_nan());
        assert_eq!(pr.data[[0, 0, 2]], 2.0);
    }

    #[test]
    fn test_obs_fraction_grid_mismatch() {
        let ds = dataset();
        let obs = Dataset::new(
            Coordinate::new("lat", vec![0.0, 1.0]),
            Coordinate::new("lon", vec![10.0]),
        )
        .with_variable(Variable::spatial(FRACTION_VAR, Array2::from_elem((2, 1), 1.0)))
        .unwrap();

        let config = MaskRunConfig::default().with_command("test");
        let result = apply_masks(&ds, None, Some(&obs), &config, &mut silent());
        assert!(matches!(result, Err(MaskError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_invalid_fraction_threshold() {
        let ds = dataset();
        let obs = ds.clone();
        let config = MaskRunConfig::default().with_fraction_threshold(0.0).with_command("test");
        let result = apply_masks(&ds, None, Some(&obs), &config, &mut silent());
        assert!(matches!(
            result,
            Err(MaskError::InvalidThreshold { name: "fraction_threshold", .. })
        ));
    }
}
