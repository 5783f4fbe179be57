//! Subscriber setup for the `kestrel` binary.
//!
//! Settings come from an optional YAML file (`config/logging.yml`, or the
//! path in `$LOG_CFG`) with keys `level`, `dir`, `file` and `format`.
//! Events go to stderr and to `<dir>/<file>`.

use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

pub const DEFAULT_LOGGING_CONFIG: &str = "config/logging.yml";
pub const LOGGING_CONFIG_ENV: &str = "LOG_CFG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub dir: PathBuf,
    pub file: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: PathBuf::from("logs"),
            file: "kestrel.log".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LogSettings {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let value = kestrel_core::config::load(path)?;
        Ok(serde_yaml::from_value(value)?)
    }

    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
}

fn config_path() -> PathBuf {
    std::env::var_os(LOGGING_CONFIG_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_LOGGING_CONFIG), PathBuf::from)
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn console_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer().with_writer(std::io::stderr).with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    }
}

fn file_layer(format: LogFormat, file: File) -> BoxedLayer {
    let writer = Mutex::new(file);
    match format {
        LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).with_ansi(false).boxed(),
    }
}

/// Install the global subscriber.
///
/// Level precedence: `cli_level`, then `RUST_LOG`, then the settings file.
pub fn init(cli_level: Option<&str>) -> anyhow::Result<()> {
    let path = config_path();
    let mut pending = Vec::new();

    let settings = if path.exists() {
        match LogSettings::from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                pending.push(format!(
                    "failed to load logging settings from {}: {e:#}; using defaults",
                    path.display()
                ));
                LogSettings::default()
            }
        }
    } else {
        pending.push(format!("logging settings not found at {}; using defaults", path.display()));
        LogSettings::default()
    };

    let filter = match cli_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&settings.level))?,
    };

    let mut layers = vec![console_layer(settings.format)];
    let log_path = settings.log_path();
    match open_log_file(&log_path) {
        Ok(file) => layers.push(file_layer(settings.format, file)),
        Err(e) => pending.push(format!("cannot write log file {}: {e}", log_path.display())),
    }

    tracing_subscriber::registry().with(layers).with(filter).try_init()?;

    for message in pending {
        warn!("{message}");
    }
    info!(config = %path.display(), file = %log_path.display(), "logging configured");
    Ok(())
}
