use clap::{Parser, Subcommand};
use image_shelf::imaging::{CropBox, RustBackend};
use image_shelf::pipeline::ImagePipeline;
use image_shelf::types::StoredImagePath;
use image_shelf::{config, output};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "image-shelf")]
#[command(about = "Sharded image storage with resized derivatives")]
#[command(long_about = "\
Sharded image storage with resized derivatives

Uploads are stored under a random three-level shard directory together with
an untouched copy of the original and one resized file per configured size:

  images/
  └── 3/7/1/
      ├── 01hq3k9x2m.jpg            # master (the stored path you keep)
      ├── 01hq3k9x2m_original.jpg   # untouched upload, source for crops
      └── small_01hq3k9x2m.jpg      # derivative for size prefix \"small_\"

Run 'image-shelf gen-config' to generate a documented image-shelf.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = "image-shelf.toml", global = true)]
    config: PathBuf,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store an image file and generate its derivatives
    Ingest {
        /// Image to ingest
        file: PathBuf,
        /// Declared extension (defaults to the file's own)
        #[arg(long)]
        extension: Option<String>,
    },
    /// Re-crop a stored image from its original and refresh derivatives
    Crop {
        /// Stored path, e.g. 3/7/1/01hq3k9x2m.jpg
        stored: String,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// Clockwise rotation in degrees, applied after cropping
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        rotate: f32,
    },
    /// Delete a stored image with all derivatives and its original
    Reclaim {
        /// Stored path, e.g. 3/7/1/01hq3k9x2m.jpg
        stored: String,
    },
    /// Print the public URL of a stored image (or the placeholder)
    Url {
        /// Stored path; omit for the no-image placeholder
        stored: Option<String>,
        /// Size prefix, e.g. small_
        #[arg(long)]
        size: Option<String>,
    },
    /// Print a stock image-shelf.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    match cli.command {
        Command::Ingest { file, extension } => {
            let extension = extension
                .or_else(|| file.extension().map(|e| e.to_string_lossy().to_string()))
                .ok_or_else(|| format!("{} has no extension; pass --extension", file.display()))?;
            let pipeline = build_pipeline(&cli.config)?;
            let mut upload = std::fs::File::open(&file)?;
            let report = pipeline.replace(None, &mut upload, &extension, &())?;
            emit(cli.json, &report, || output::print_ingested(&report))?;
        }
        Command::Crop {
            stored,
            x,
            y,
            width,
            height,
            rotate,
        } => {
            let stored = StoredImagePath::parse(&stored)?;
            let pipeline = build_pipeline(&cli.config)?;
            let report = pipeline.crop(&stored, CropBox::new(x, y, width, height), rotate, &())?;
            emit(cli.json, &report, || output::print_cropped(&report))?;
        }
        Command::Reclaim { stored } => {
            let stored = StoredImagePath::parse(&stored)?;
            let report = build_pipeline(&cli.config)?.remove(&stored, &());
            emit(cli.json, &report, || output::print_reclaimed(&stored, &report))?;
        }
        Command::Url { stored, size } => {
            let stored = stored.as_deref().map(StoredImagePath::parse).transpose()?;
            let url = build_pipeline(&cli.config)?.image_src(stored.as_ref(), size.as_deref(), &());
            emit(cli.json, &url, || println!("{}", url))?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config and assemble the pipeline with the pure-Rust backend.
fn build_pipeline(path: &Path) -> Result<ImagePipeline<RustBackend>, config::ConfigError> {
    let config = config::load_config(path)?;
    init_thread_pool(&config.processing);
    Ok(ImagePipeline::new(config, RustBackend::new()))
}

/// Print `report` as JSON, or run the human-readable printer.
fn emit<T: Serialize>(
    json: bool,
    report: &T,
    print: impl FnOnce(),
) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print();
    }
    Ok(())
}

/// Route `tracing` output to stderr so stdout stays machine-readable.
///
/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
