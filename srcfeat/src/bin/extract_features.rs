//! Multi-channel source feature extraction
//!
//! Reads source cutouts from a JSON document, or generates a synthetic
//! Gaussian cube, and writes one feature row per source.
//!
//! Usage:
//! ```
//! cargo run --release --bin extract_features -- extract --input cubes.json --output features.dat
//! cargo run --release --bin extract_features -- demo --size 64 --scales 1.0,0.5,0.2
//! ```

use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Deserialize;

use shared::image_proc::test_patterns::{gaussian_cube, noisy_gaussian_cube};
use srcfeat::{ExtractorConfig, FeatureExtractor, FeatureExtractorHelper, ImageCube, SourceInfo};

/// One cutout of the input document
#[derive(Debug, Deserialize)]
struct CubeEntry {
    #[serde(flatten)]
    info: SourceInfo,
    /// Pixels as `[row][col][channel]`
    data: Vec<Vec<Vec<f64>>>,
}

#[derive(Parser, Debug)]
#[command(
    name = "extract_features",
    about = "Extract morphological and photometric features of multi-channel source cutouts",
    long_about = None
)]
struct Args {
    /// JSON configuration file (defaults are used when absent)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract features from cutouts stored in a JSON document
    Extract {
        /// JSON array of {sname, label, classid, data}
        #[arg(short, long)]
        input: PathBuf,

        /// Output table (stdout when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many images
        #[arg(long)]
        max_images: Option<usize>,

        /// Column delimiter
        #[arg(long, default_value = " ")]
        delimiter: String,
    },
    /// Run the pipeline on a synthetic Gaussian source
    Demo {
        /// Cutout side in pixels
        #[arg(long, default_value_t = 64)]
        size: usize,

        /// Gaussian sigma in pixels
        #[arg(long, default_value_t = 5.0)]
        sigma: f64,

        /// Peak amplitude of the first channel
        #[arg(long, default_value_t = 100.0)]
        amplitude: f64,

        /// Per-channel amplitude scales (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "1.0,0.5,0.2")]
        scales: Vec<f64>,

        /// Standard deviation of added Gaussian noise (0 disables)
        #[arg(long, default_value_t = 0.0)]
        noise: f64,

        /// Noise seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ExtractorConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Ok(ExtractorConfig::load_from_file(path)?)
        }
        None => Ok(ExtractorConfig::default()),
    }
}

fn run_extract(
    mut config: ExtractorConfig,
    input: PathBuf,
    output: Option<PathBuf>,
    max_images: Option<usize>,
    delimiter: &str,
) -> Result<(), Box<dyn Error>> {
    if max_images.is_some() {
        config.max_images = max_images;
    }

    info!("Reading cutouts from {}", input.display());
    let entries: Vec<CubeEntry> = serde_json::from_reader(io::BufReader::new(File::open(&input)?))?;
    info!("Read {} cutouts", entries.len());

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        match ImageCube::from_nested(&entry.data) {
            Ok(cube) => items.push((cube, entry.info)),
            Err(e) => error!("Skipping cutout {}: {e}", entry.info.sname),
        }
    }

    let table = FeatureExtractor::new(config)?.run(items);

    match output {
        Some(path) => {
            table.write_to(BufWriter::new(File::create(&path)?), delimiter)?;
            info!("Wrote {} rows to {}", table.len(), path.display());
        }
        None => table.write_to(io::stdout().lock(), delimiter)?,
    }
    Ok(())
}

fn run_demo(
    config: ExtractorConfig,
    size: usize,
    sigma: f64,
    amplitude: f64,
    scales: &[f64],
    noise: f64,
    seed: u64,
) -> Result<(), Box<dyn Error>> {
    let data = if noise > 0.0 {
        noisy_gaussian_cube(size, sigma, amplitude, scales, noise, seed)?
    } else {
        gaussian_cube(size, sigma, amplitude, scales)
    };
    let cube = ImageCube::new(data)?;

    let helper = FeatureExtractorHelper::new(config)?;
    let record = helper.extract(&cube, &SourceInfo::new("demo", "synthetic", Default::default()))?;

    let mut out = io::stdout().lock();
    for (name, value) in record.names().zip(record.values()) {
        writeln!(out, "{name:>24} {value}")?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = load_config(args.config.as_ref()).and_then(|config| match args.command {
        Command::Extract {
            input,
            output,
            max_images,
            delimiter,
        } => run_extract(config, input, output, max_images, &delimiter),
        Command::Demo {
            size,
            sigma,
            amplitude,
            scales,
            noise,
            seed,
        } => run_demo(config, size, sigma, amplitude, &scales, noise, seed),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
