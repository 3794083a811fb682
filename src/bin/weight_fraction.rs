//! Fraction of time steps at which observations influenced each grid point.
//!
//! Analysis weight files assign 0 (no influence), 1 (minimal influence) or
//! 3 (observations influence the analysed value) per point and time step.
//! The output `fraction` variable can be passed to `gridmask-apply
//! --obs_fraction_file`.
//!
//! Usage: `gridmask-weight-fraction <infiles...> <outfile> [--weight_var NAME]`

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info};

use gridmask_rs::logging::init_logging;
use gridmask_rs::{AxisNames, ProgressReporter, WeightFractionConfig, io, run_weight_fraction};

#[derive(Parser, Debug)]
#[command(name = "gridmask-weight-fraction")]
#[command(about = "Calculate the fraction of times each grid point was influenced by observations")]
struct Args {
    /// Input weight files (concatenated along time) followed by the output file
    #[arg(value_name = "INFILES... OUTFILE", num_args = 2.., required = true)]
    paths: Vec<PathBuf>,

    /// Name of the weight variable
    #[arg(long = "weight_var", default_value = "weight")]
    weight_var: String,

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

    let Some((outfile, infiles)) = args.paths.split_last() else {
        error!("Missing output file");
        process::exit(1);
    };

    let config = WeightFractionConfig::default()
        .with_weight_var(&args.weight_var)
        .with_axes(
            AxisNames::default()
                .with_lat(&args.lat_dim)
                .with_lon(&args.lon_dim)
                .with_time(&args.time_dim),
        )
        .with_command(io::command_line());

    let mut progress = ProgressReporter::new("weight files", infiles.len(), 10);
    if let Err(e) = run_weight_fraction(infiles, outfile, &config, &mut progress) {
        error!("{}", e);
        process::exit(1);
    }

    info!("Done");
}
