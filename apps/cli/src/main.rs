//! Kestrel CLI - YOLOv8 training pipeline
//!
//! Downloads a dataset export, validates it, trains a detector, evaluates it
//! and exports it for deployment. Progress and results go to the log; the
//! exit code is `0` on success and `1` on failure.

mod commands;
mod logging;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Download and check the dataset
    Download,
    /// Train, evaluate and export
    Train,
    /// Download, prepare, train, evaluate and export
    All,
    /// Check a local dataset root
    Validate,
}

/// YOLOv8 training pipeline
#[derive(Parser, Debug)]
#[command(name = "kestrel", author, version, about = "Kestrel - YOLOv8 training pipeline")]
struct Args {
    /// Settings file
    #[arg(long, default_value = "config/settings.yml")]
    config: PathBuf,

    /// Operation to run
    #[arg(long, value_enum)]
    mode: Mode,

    /// Dataset manifest for `train` (discovered from the download directory if omitted)
    #[arg(long = "data_yaml")]
    data_yaml: Option<PathBuf>,

    /// Download even if the dataset already exists
    #[arg(long)]
    force: bool,

    /// Dataset root for `validate` (defaults to paths.data_dir)
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `kestrel_core=trace` (overrides RUST_LOG and the logging file)
    #[arg(long)]
    log_level: Option<String>,
}

async fn run(args: Args) -> anyhow::Result<bool> {
    match args.mode {
        Mode::Download => commands::download::execute(&args.config, args.force).await,
        Mode::Train => commands::train::execute(&args.config, args.data_yaml.as_deref()).await,
        Mode::All => commands::pipeline::execute(&args.config, args.force).await,
        Mode::Validate => commands::validate::execute(&args.config, args.dataset.as_deref()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    if let Err(e) = logging::init(args.log_level.as_deref()) {
        eprintln!("failed to initialize logging: {e:#}");
        std::process::exit(1);
    }

    let code = match run(args).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!("{e:#}");
            1
        }
    };
    std::process::exit(code);
}
