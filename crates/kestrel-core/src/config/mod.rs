//! Configuration loading for Kestrel.
//!
//! Settings are plain YAML. Every string value may embed `${VAR}` or
//! `${VAR:default}`, resolved from the process environment at load time.
//! Consumers check the fields they need with [`Requirements`] and then project
//! typed records out of the mapping.

pub mod loader;
pub mod requirements;
pub mod settings;

pub use loader::{load, substitute, substitute_str, substitute_str_with, substitute_with};
pub use requirements::{lookup, validate, Requirements, ValueKind};
pub use settings::{section, DownloaderSettings, RoboflowSettings};
