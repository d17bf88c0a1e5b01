//! ptuflim command-line interface.
//!
//! Inspects PTU headers and turns FLIM acquisitions into histograms and
//! phasor tables.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand};

use ptuflim_algorithms::{
    apply_mask, apply_median_filter, apply_time_mask, histogram_phasor, intensity_mask, time_mask,
};
use ptuflim_io::{DataFileWriter, FlimData, ProcessingConfig, PtuFileReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    PtuflimIo(#[from] ptuflim_io::Error),

    #[error("PTU error: {0}")]
    Ptu(#[from] ptuflim_ptu::Error),

    #[error("Core error: {0}")]
    Core(#[from] ptuflim_core::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// PicoQuant PTU decoder and FLIM phasor processor.
#[derive(Parser)]
#[command(name = "ptuflim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with decoder, assembler and phasor settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise the log level (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header tags, record type and record count of a PTU file
    Info {
        /// Input PTU file
        input: PathBuf,

        /// Print the header as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the FLIM histogram and write it (.csv or raw .bin + .json sidecar)
    Histogram {
        /// Input PTU file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Compute per-pixel phasors and write them as CSV
    Phasor {
        /// Input PTU file
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Harmonic (overrides the config file)
        #[arg(long)]
        harmonic: Option<usize>,

        /// Mask pixels with fewer photons than this (G and S become NaN)
        #[arg(long)]
        threshold: Option<u64>,

        /// Drop microtime bins before the most common decay peak
        #[arg(long = "time-mask")]
        use_time_mask: bool,

        /// Passes of the 3x3 median filter over G and S (overrides the config file)
        #[arg(long)]
        median: Option<usize>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(path: Option<&Path>) -> Result<ProcessingConfig> {
    match path {
        Some(path) => {
            log::info!("loading config from {}", path.display());
            Ok(ProcessingConfig::from_file(path)?)
        }
        None => Ok(ProcessingConfig::default()),
    }
}

fn read_flim(input: &Path, config: ProcessingConfig) -> Result<FlimData> {
    let start = Instant::now();
    let data = PtuFileReader::open(input)?
        .with_config(config)
        .read_flim()?;
    let [rows, cols, channels, bins] = data.histogram.shape();
    println!(
        "Assembled {}x{} image, {} channels, {} microtime bins in {:.2}s",
        cols,
        rows,
        channels,
        bins,
        start.elapsed().as_secs_f64()
    );
    println!(
        "Photons: {} binned, {} dropped, {} outside lines; {} frames, {} lines",
        data.stats.photons_binned,
        data.stats.photons_dropped,
        data.stats.photons_outside,
        data.stats.frames,
        data.stats.lines
    );
    Ok(data)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { input, json } => {
            let reader = PtuFileReader::open(&input)?;
            let header = reader.header();

            if json {
                println!("{}", serde_json::to_string_pretty(&header.to_json())?);
                return Ok(());
            }

            let file_size = reader.file_size();
            println!("File: {}", input.display());
            println!(
                "Size: {} bytes ({:.2} MB)",
                file_size,
                file_size as f64 / 1_000_000.0
            );
            println!("Version: {}", header.version());
            println!("Record type: {}", header.record_type()?);
            println!("Records: {}", header.record_count()?);

            match header.imaging_params() {
                Ok(params) => {
                    println!("Image: {}x{} pixels", params.pixels_x, params.pixels_y);
                    println!(
                        "Markers: line start {}, line stop {}, frame {}",
                        params.markers.line_start, params.markers.line_stop, params.markers.frame
                    );
                    println!("Laser frequency: {:.3} MHz", params.laser_frequency_mhz());
                }
                Err(e) => println!("Image: n/a ({e})"),
            }

            println!();
            for tag in header.tags() {
                println!("{:<40} {}", tag.key(), tag.value);
            }
        }

        Commands::Histogram { input, output } => {
            let data = read_flim(&input, config)?;
            let mut writer = DataFileWriter::create(&output)?;

            let is_csv = output
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if is_csv {
                writer.write_histogram_csv(&data.histogram)?;
                println!("Wrote {}", output.display());
            } else {
                writer.write_histogram_raw(&data.histogram)?;
                let sidecar =
                    writer.write_histogram_sidecar(&data.histogram, &data.metadata_json())?;
                println!("Wrote {} and {}", output.display(), sidecar.display());
            }
        }

        Commands::Phasor {
            input,
            output,
            harmonic,
            threshold,
            use_time_mask,
            median,
        } => {
            let settings = config.phasor().clone();
            let harmonic = harmonic.unwrap_or(settings.harmonic);
            let median = median.unwrap_or(settings.median_iterations);
            let data = read_flim(&input, config)?;

            let masked;
            let histogram = if use_time_mask || settings.time_mask {
                let mask = time_mask(data.histogram.as_array())?;
                log::info!(
                    "time mask keeps {} of {} microtime bins",
                    mask.iter().filter(|&&keep| keep).count(),
                    mask.len()
                );
                masked = apply_time_mask(&data.histogram, &mask)?;
                &masked
            } else {
                &data.histogram
            };

            let mut image = histogram_phasor(histogram, harmonic)?;
            if median > 0 {
                image = apply_median_filter(&image, median)?;
            }
            if let Some(threshold) = threshold {
                let mask = intensity_mask(&data.histogram, threshold);
                log::info!(
                    "{} of {} pixels at or above {} photons",
                    mask.iter().filter(|&&keep| keep).count(),
                    mask.len(),
                    threshold
                );
                apply_mask(&mut image, &mask)?;
            }

            DataFileWriter::create(&output)?.write_phasor_csv(&image)?;
            println!(
                "Wrote harmonic {} phasors for {} pixel channels to {}",
                harmonic,
                image.len(),
                output.display()
            );
        }
    }

    Ok(())
}
