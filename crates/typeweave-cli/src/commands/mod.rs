pub mod backends;
pub mod generate;
pub mod ir;

use anyhow::Context;
use std::path::Path;
use typeweave::{Config, Unit};

/// Looked up in the working directory when `--config` is not given.
const DEFAULT_CONFIG: &str = "typeweave.toml";

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            tracing::debug!(path = DEFAULT_CONFIG, "using config from working directory");
            Ok(Config::load(Path::new(DEFAULT_CONFIG))?)
        }
        None => Ok(Config::default()),
    }
}

pub fn load_unit(path: &Path) -> anyhow::Result<Unit> {
    Unit::load(path).with_context(|| format!("loading unit {}", path.display()))
}
