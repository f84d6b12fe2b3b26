//! emdconv CLI
//!
//! Converts microscopy acquisitions to EMD containers.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{ArgAction, Parser, Subcommand};
use emdconv_core::{BinningFactor, FieldMap};
use emdconv_io::{
    convert_single_image, convert_stack_with_progress, SerFileReader, StackOptions, StackProgress,
};
use emdconv_ser::{ElementTag, ImageElementHeader, SerHeader};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    EmdconvIo(#[from] emdconv_io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convert microscopy acquisitions to EMD containers.
#[derive(Parser)]
#[command(name = "emdconv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a single greyscale raster image (TIFF, PNG, ...) to EMD
    Single {
        /// Input image
        input: PathBuf,

        /// Output EMD file (replaced if it exists)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Combine a directory of SER/EMI acquisitions into a z-stack
    Stack {
        /// Directory holding `<name>.emi` / `<name>_1.ser` pairs
        input: PathBuf,

        /// Output EMD file (replaced if it exists)
        #[arg(short, long)]
        output: PathBuf,

        /// Binning factor; invalid values fall back to 1
        #[arg(short, long, allow_hyphen_values = true)]
        bin: Option<String>,

        /// Only accept even binning factors
        #[arg(long)]
        even_only: bool,

        /// JSON file with stack options
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Sidecar field holding the stage coordinate of each slice
        #[arg(long)]
        stage_field: Option<String>,
    },

    /// Show information about a SER file
    Info {
        /// Input SER file
        input: PathBuf,

        /// EMI sidecar to read fields from
        #[arg(long)]
        emi: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct SeriesInfo<'a> {
    path: &'a Path,
    file_size: usize,
    header: &'a SerHeader,
    element: Option<ImageElementHeader>,
    tag: Option<ElementTag>,
    fields: FieldMap,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn stack_options(
    config: Option<&Path>,
    bin: Option<&str>,
    even_only: bool,
    stage_field: Option<String>,
) -> Result<StackOptions> {
    let mut options = match config {
        Some(path) => StackOptions::from_json_file(path)?,
        None => StackOptions::default(),
    };
    let requested = bin.map_or_else(|| options.binning.to_string(), str::to_string);
    options.binning = BinningFactor::parse_lenient(&requested, even_only);
    if let Some(field) = stage_field {
        options.stage_field = field;
    }
    Ok(options)
}

fn info(input: &Path, emi: Option<&Path>, json: bool) -> Result<()> {
    let reader = match emi {
        Some(emi) => SerFileReader::open_pair(input, emi)?,
        None => SerFileReader::open(input)?,
    };
    let header = reader.header();

    let (element, tag) = if header.is_single_image() {
        (Some(reader.element_header(0)?), reader.tag(0)?)
    } else {
        (None, None)
    };
    let info = SeriesInfo {
        path: input,
        file_size: reader.file_size(),
        header,
        element,
        tag,
        fields: reader
            .sidecar()
            .map(|sidecar| sidecar.fields().clone())
            .unwrap_or_default(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File: {}", input.display());
    println!(
        "Size: {} bytes ({:.2} MB)",
        info.file_size,
        info.file_size as f64 / 1_000_000.0
    );
    println!("Series version: {:#06x}", header.series_version);
    println!("Data type: {:#06x}", header.data_type_id);
    println!("Tag type: {:#06x}", header.tag_type_id);
    println!(
        "Elements: {} valid / {} total",
        header.valid_elements, header.total_elements
    );
    for dimension in &header.dimensions {
        println!(
            "Series dimension: {} x {} {}",
            dimension.size, dimension.description, dimension.units
        );
    }
    match &info.element {
        Some(element) => {
            let (rows, cols) = element.shape();
            println!("Image: {} x {} {}", rows, cols, element.element_type);
            println!(
                "Calibration x: offset {} delta {} element {}",
                element.calibration_x.offset,
                element.calibration_x.delta,
                element.calibration_x.element
            );
            println!(
                "Calibration y: offset {} delta {} element {}",
                element.calibration_y.offset,
                element.calibration_y.delta,
                element.calibration_y.element
            );
        }
        None => println!("Image: not a single 2D element series"),
    }
    if let Some(tag) = &info.tag {
        println!("Time: {}", tag.time);
        if let Some((x, y)) = tag.position {
            println!("Position: ({}, {})", x, y);
        }
    }
    for (name, value) in &info.fields {
        println!("{}: {}", name, value);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Single { input, output } => {
            log::info!("converting {} to {}", input.display(), output.display());
            let report = convert_single_image(&input, &output)?;
            println!("{report}");
        }

        Commands::Stack {
            input,
            output,
            bin,
            even_only,
            config,
            stage_field,
        } => {
            let options =
                stack_options(config.as_deref(), bin.as_deref(), even_only, stage_field)?;
            log::info!(
                "stacking {} with binning factor {}, stage field '{}'",
                input.display(),
                options.binning,
                options.stage_field
            );
            let report = convert_stack_with_progress(&input, &output, &options, |event| {
                if let StackProgress::Slice { index, total, path } = event {
                    eprintln!("[{}/{}] {}", index + 1, total, path.display());
                }
            })?;
            println!("{report}");
        }

        Commands::Info { input, emi, json } => info(&input, emi.as_deref(), json)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
