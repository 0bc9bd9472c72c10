//! `typeweave.toml` configuration.
//!
//! ```toml
//! [convert]
//! date_names = ["Date", "Day"]
//!
//! [typescript]
//! readonly = true
//!
//! [[targets]]
//! backend = "typescript"
//! output = "web/src/types.ts"
//! ```

use crate::convert::ConvertOptions;
use crate::registry::get_backend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(feature = "backend-dart")]
use crate::output::dart::DartOptions;
#[cfg(any(
    feature = "backend-go-json",
    feature = "backend-go-scan",
    feature = "backend-go-enums"
))]
use crate::output::GoOptions;
#[cfg(any(feature = "backend-sql", feature = "backend-go-scan"))]
use crate::output::SqlOptions;
#[cfg(feature = "backend-typescript")]
use crate::output::typescript::TypeScriptOptions;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown backend `{0}`")]
    UnknownBackend(String),
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub backend: String,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub convert: ConvertOptions,
    #[cfg(feature = "backend-typescript")]
    pub typescript: TypeScriptOptions,
    #[cfg(feature = "backend-dart")]
    pub dart: DartOptions,
    #[cfg(any(
        feature = "backend-go-json",
        feature = "backend-go-scan",
        feature = "backend-go-enums"
    ))]
    pub go: GoOptions,
    #[cfg(any(feature = "backend-sql", feature = "backend-go-scan"))]
    pub sql: SqlOptions,
    pub targets: Vec<Target>,
}

impl Config {
    /// Parse a TOML document; every target must name a known backend.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(source)?;
        if let Some(target) = config
            .targets
            .iter()
            .find(|t| get_backend(&t.backend).is_none())
        {
            return Err(ConfigError::UnknownBackend(target.backend.clone()));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.convert, ConvertOptions::default());
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_convert_section() {
        let config = Config::from_toml(
            r#"
            [convert]
            date_names = ["Day"]
            "#,
        )
        .unwrap();
        assert_eq!(config.convert.date_names, ["Day"]);
        assert_eq!(config.convert.extern_tag, "extern");
    }

    #[cfg(feature = "backend-sql")]
    #[test]
    fn test_targets() {
        let config = Config::from_toml(
            r#"
            [sql]
            table_suffix = ""

            [[targets]]
            backend = "sql"
            output = "schema.sql"
            "#,
        )
        .unwrap();
        assert_eq!(config.sql.table_suffix, "");
        assert_eq!(config.targets[0].output, PathBuf::from("schema.sql"));
    }

    #[test]
    fn test_unknown_backend() {
        let err = Config::from_toml(
            r#"
            [[targets]]
            backend = "cobol"
            output = "out.cob"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(name) if name == "cobol"));
    }
}
