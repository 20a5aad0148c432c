//! roimetrics -- command line front end for pooling scalar metrics within brain regions.
//!
//! Examples:
//!   roimetrics extract -s sub-01 -l aparc+aseg.nii.gz --scalar FA=dti_FA.nii.gz -o sub-01.csv
//!   roimetrics extract-masks -s sub-01 -m lh.cst.nii.gz -m rh.cst.nii.gz --scalar FA=dti_FA.nii.gz -o cst.csv
//!   roimetrics ratio --t1 T1w.nii.gz --t2 T2w.nii.gz --mask nagm.nii.gz -o sR1.nii.gz
//!   roimetrics run -c sub-01.toml

use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use std::path::{Path, PathBuf};
use std::process;

use roimetrics::util::volume_stem;
use roimetrics::{
    aggregate_masks, aggregate_with_tolerance, read_label_volume, read_mask_volume, read_scalar_volume,
    standardized_ratio, write_scalar_volume, ColorLut, GridTolerance, MetricVolumes, Result, RunConfig,
};

/// Pool scalar neuroimaging metrics within labeled brain regions.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mean metrics for every region of a label volume
    Extract {
        #[arg(short, long)]
        subject: String,

        /// Label volume (atlas or segmentation) in the space of the scalar images
        #[arg(short, long, value_name = "FILE")]
        labels: PathBuf,

        /// A scalar image as NAME=PATH; repeat for more metrics
        #[arg(long = "scalar", value_name = "NAME=PATH", value_parser = parse_scalar, required = true)]
        scalars: Vec<(String, PathBuf)>,

        /// Color lookup table to name regions
        #[arg(long, value_name = "FILE")]
        lut: Option<PathBuf>,

        /// Output CSV file
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
    },

    /// Mean metrics within separate binary ROI masks, each named after its file
    ExtractMasks {
        #[arg(short, long)]
        subject: String,

        /// Binary ROI mask; repeat for more regions
        #[arg(short, long = "mask", value_name = "FILE", required = true)]
        masks: Vec<PathBuf>,

        /// A scalar image as NAME=PATH; repeat for more metrics
        #[arg(long = "scalar", value_name = "NAME=PATH", value_parser = parse_scalar, required = true)]
        scalars: Vec<(String, PathBuf)>,

        /// Output CSV file
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
    },

    /// Standardized T1w/T2w ratio map
    Ratio {
        #[arg(long, value_name = "FILE")]
        t1: PathBuf,

        #[arg(long, value_name = "FILE")]
        t2: PathBuf,

        /// Reference tissue mask used to match T2 to T1 intensities
        #[arg(long, value_name = "FILE")]
        mask: PathBuf,

        /// Output NIfTI file
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
    },

    /// Extract region metrics as described by a TOML or JSON run file
    Run {
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
}

fn parse_scalar(arg: &str) -> std::result::Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok((name.to_string(), PathBuf::from(path))),
        _ => Err(format!("expected NAME=PATH, got '{}'", arg)),
    }
}

/// Log to stderr. `RUST_LOG` overrides the level chosen by `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Could not install log subscriber.");
    }
}

fn load_metrics(scalars: &[(String, PathBuf)]) -> Result<MetricVolumes> {
    let mut metrics = MetricVolumes::new();
    for (name, path) in scalars {
        metrics.insert(name.clone(), read_scalar_volume(path)?)?;
    }
    Ok(metrics)
}

fn extract(
    subject: &str,
    labels: &Path,
    metrics: &MetricVolumes,
    lut: Option<&Path>,
    out: &Path,
    tol: &GridTolerance,
) -> Result<()> {
    let labels = read_label_volume(labels)?;
    info!("{}", labels);
    let mut table = aggregate_with_tolerance(&labels, metrics, subject, tol)?;
    if let Some(lut) = lut {
        let lut = ColorLut::from_file(lut)?;
        info!("{}", lut);
        table.rename_regions(&lut);
    }
    table.to_csv_file(out)?;
    info!("Saved {} rows to '{}'.", table.len(), out.display());
    Ok(())
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Extract { subject, labels, scalars, lut, out } => {
            let metrics = load_metrics(&scalars)?;
            extract(&subject, &labels, &metrics, lut.as_deref(), &out, &GridTolerance::default())
        }
        Command::ExtractMasks { subject, masks, scalars, out } => {
            let metrics = load_metrics(&scalars)?;
            let mut named = Vec::with_capacity(masks.len());
            for path in masks.iter() {
                named.push((volume_stem(path), read_mask_volume(path)?));
            }
            let table = aggregate_masks(&named, &metrics, &subject)?;
            table.to_csv_file(&out)?;
            info!("Saved {} rows to '{}'.", table.len(), out.display());
            Ok(())
        }
        Command::Ratio { t1, t2, mask, out } => {
            let t1 = read_scalar_volume(&t1)?;
            let t2 = read_scalar_volume(&t2)?;
            let mask = read_mask_volume(&mask)?;
            let ratio = standardized_ratio(&t1, &t2, &mask)?;
            write_scalar_volume(&out, &ratio)?;
            info!("Saved ratio map to '{}'.", out.display());
            Ok(())
        }
        Command::Run { config } => {
            let cfg = RunConfig::from_file(&config)?;
            let metrics = cfg.load_metrics()?;
            extract(&cfg.subject, &cfg.labels, &metrics, cfg.lut.as_deref(), &cfg.output, &cfg.tolerance)
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args.command) {
        error!("{}", e);
        process::exit(1);
    }
}
