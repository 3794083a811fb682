//! Apply region and observation-influence masks to a gridded NetCDF file.
//!
//! Usage: `gridmask-apply <infile> [variables...] <outfile> [--shapefile SHP]
//! [--shape_overlap F] [--no_trim] [--obs_fraction_file NC] [--fraction_threshold F]`

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing::{error, info};

use gridmask_rs::logging::init_logging;
use gridmask_rs::{
    AxisNames, DEFAULT_FACTOR, MaskRunConfig, OverlapConfig, ProgressReporter, io, run_apply_mask,
};

#[derive(Parser, Debug)]
#[command(name = "gridmask-apply")]
#[command(about = "Apply a region mask and/or an observation influence mask to gridded data")]
struct Args {
    /// Input file, variables to mask (all if none) and output file
    #[arg(value_name = "INFILE [VARIABLES...] OUTFILE", num_args = 2.., required = true)]
    paths: Vec<String>,

    /// Shapefile with the regions to keep
    #[arg(long = "shapefile", alias = "land_boundary")]
    shapefile: Option<PathBuf>,

    /// Minimum fraction of a cell inside the regions, in (0, 1];
    /// without it cells are selected by their centre point
    #[arg(long = "shape_overlap")]
    shape_overlap: Option<f64>,

    /// Keep the full grid instead of trimming to the masked extent
    #[arg(long = "no_trim")]
    no_trim: bool,

    /// File with the fraction of times influenced by observations
    #[arg(long = "obs_fraction_file")]
    obs_fraction_file: Option<PathBuf>,

    /// Observation fraction at or below which points are masked
    #[arg(long = "fraction_threshold", alias = "obs_fraction_threshold", default_value_t = 0.9)]
    fraction_threshold: f64,

    /// Samples per cell along each axis for overlap estimation
    #[arg(long = "supersample_factor", default_value_t = DEFAULT_FACTOR)]
    supersample_factor: usize,

    /// Supersampled rows labelled at a time (multiple of the factor)
    #[arg(long = "tile_rows")]
    tile_rows: Option<usize>,

    /// Name of the latitude dimension
    #[arg(long = "lat_dim", default_value = "lat")]
    lat_dim: String,

    /// Name of the longitude dimension
    #[arg(long = "lon_dim", default_value = "lon")]
    lon_dim: String,

    /// Name of the time dimension
    #[arg(long = "time_dim", default_value = "time")]
    time_dim: String,
}

fn main() {
    init_logging();

    let args = Args::parse();

    let Some((infile, rest)) = args.paths.split_first() else {
        error!("Missing input file");
        process::exit(1);
    };
    let Some((outfile, variables)) = rest.split_last() else {
        error!("Missing output file");
        process::exit(1);
    };

    let mut overlap = OverlapConfig::default().with_factor(args.supersample_factor);
    if let Some(rows) = args.tile_rows {
        overlap = overlap.with_tile_rows(rows);
    }

    let mut config = MaskRunConfig::default()
        .with_variables(variables.to_vec())
        .with_trim(!args.no_trim)
        .with_fraction_threshold(args.fraction_threshold)
        .with_overlap(overlap)
        .with_axes(
            AxisNames::default()
                .with_lat(&args.lat_dim)
                .with_lon(&args.lon_dim)
                .with_time(&args.time_dim),
        )
        .with_command(io::command_line());
    if let Some(min_overlap) = args.shape_overlap {
        config = config.with_shape_overlap(min_overlap);
    }

    let mut progress = ProgressReporter::new("overlap", 0, 10);
    if let Err(e) = run_apply_mask(
        Path::new(infile),
        Path::new(outfile),
        args.shapefile.as_deref(),
        args.obs_fraction_file.as_deref(),
        &config,
        &mut progress,
    ) {
        error!("{}", e);
        process::exit(1);
    }

    info!("Done");
}
