//! Traits for code generation backends.

use crate::config::Config;
use crate::convert::Conversion;
use crate::error::Error;

/// Category of backend output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCategory {
    /// Pure type definitions (interfaces, classes, aliases).
    Types,
    /// Types plus serialization functions for an interchange format.
    Codecs,
    /// Storage schemas and row access code.
    Schema,
}

impl BackendCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendCategory::Types => "types",
            BackendCategory::Codecs => "codecs",
            BackendCategory::Schema => "schema",
        }
    }
}

/// A code generation backend.
///
/// Backends render a converted unit into source code for a target language.
/// The conversion is made with this backend's [`tag`](Backend::tag), so field
/// names already follow the backend's naming overrides.
///
/// ```ignore
/// use typeweave::{Backend, BackendCategory, Config, Conversion, Error};
///
/// struct Outline;
///
/// impl Backend for Outline {
///     fn name(&self) -> &'static str { "outline" }
///     fn language(&self) -> &'static str { "text" }
///     fn extension(&self) -> &'static str { "txt" }
///     fn category(&self) -> BackendCategory { BackendCategory::Types }
///     fn generate(&self, conversion: &Conversion, config: &Config) -> Result<String, Error> {
///         Ok(conversion.roots.iter().map(|r| r.name.clone()).collect::<Vec<_>>().join("\n"))
///     }
/// }
/// ```
pub trait Backend: Send + Sync {
    /// Unique backend identifier (e.g., "typescript", "go-json", "sql").
    fn name(&self) -> &'static str;

    /// Target language (e.g., "typescript", "dart", "go").
    fn language(&self) -> &'static str;

    /// File extension for generated code (e.g., "ts", "dart", "sql").
    fn extension(&self) -> &'static str;

    fn category(&self) -> BackendCategory;

    /// Struct tag consulted before `json` when naming fields.
    fn tag(&self) -> Option<&'static str> {
        None
    }

    /// Render a converted unit.
    fn generate(&self, conversion: &Conversion, config: &Config) -> Result<String, Error>;
}
