//! Polyglot declarations and codecs from one set of source types.
//!
//! `typeweave` reads the type graph of a compilation unit, converts it into
//! a backend-agnostic IR and renders that IR as type declarations, schemas
//! and serialization code for several consumers.
//!
//! # Architecture
//!
//! ```text
//! Input              Core                          Output Backends
//! ─────────────      ─────────────────────         ─────────────────
//!                    convert  ──> Ir ──> emit ──┬─> TypeScript types
//! TypeOracle    ───> interfaces      (registry) ├─> Dart classes + JSON
//! (input::Unit)                                 ├─> Go JSON wrappers
//!                                               ├─> Go row scanners + CRUD
//!                                               ├─> Go enum labels
//!                                               └─> SQL schema
//! ```
//!
//! # Example
//!
//! ```
//! use typeweave::input::UnitBuilder;
//! use typeweave::oracle::{BasicKind, StructField};
//! use typeweave::{Config, generate, get_backend};
//!
//! let mut b = UnitBuilder::new("geo");
//! let int = b.basic(BasicKind::Int);
//! let shape = b.structure(vec![
//!     StructField::new("X", int).tag(r#"json:"x""#),
//!     StructField::new("Y", int).tag(r#"json:"y""#),
//! ]);
//! b.named("Point", shape);
//! let unit = b.build().unwrap();
//!
//! let backend = get_backend("typescript").unwrap();
//! let ts = generate(&unit, backend, &Config::default()).unwrap();
//! assert!(ts.contains("export interface Point {"));
//! ```
//!
//! # Feature Flags
//!
//! Backend flags (use `backend-*` prefix):
//! - `backend-typescript` - TypeScript interfaces and enums
//! - `backend-dart` - Dart classes with JSON convertors
//! - `backend-go-json` - Go JSON wrappers for interface values
//! - `backend-go-scan` - Go `database/sql` row scanners and CRUD helpers
//! - `backend-go-enums` - Go enum label tables
//! - `backend-sql` - PostgreSQL `CREATE TABLE` statements and constraints
//!
//! Language umbrella flags (convenience):
//! - `typescript` - backend-typescript
//! - `dart` - backend-dart
//! - `go` - backend-go-json + backend-go-scan + backend-go-enums
//! - `sql` - backend-sql

pub mod config;
pub mod convert;
pub mod declarations;
pub mod emit;
pub mod error;
pub mod input;
pub mod interfaces;
pub mod ir;
pub mod oracle;
pub mod output;
pub mod registry;
pub mod traits;
pub mod wire;

pub use config::{Config, ConfigError, Target};
pub use convert::{Conversion, ConvertOptions, Warning, convert_unit};
pub use declarations::{Declaration, DeclarationRegistry};
pub use error::{Error, InvariantViolation, OracleError};
pub use input::{Unit, UnitBuilder};
pub use ir::{Ir, IrId, IrNode};
pub use oracle::TypeOracle;

// Re-export traits
pub use traits::{Backend, BackendCategory};

// Re-export registry functions
pub use registry::{
    backend_names, backends, backends_by_category, backends_for_language, get_backend,
};

// Re-export generators
#[cfg(feature = "backend-typescript")]
pub use output::generate_typescript_types;

#[cfg(feature = "backend-dart")]
pub use output::generate_dart;

#[cfg(feature = "backend-go-json")]
pub use output::generate_go_json;

#[cfg(feature = "backend-go-scan")]
pub use output::generate_go_scan;

#[cfg(feature = "backend-go-enums")]
pub use output::generate_go_enums;

#[cfg(feature = "backend-sql")]
pub use output::generate_sql;

/// Convert `oracle` with the backend's field tag and render it.
pub fn generate(
    oracle: &dyn TypeOracle,
    backend: &dyn Backend,
    config: &Config,
) -> Result<String, Error> {
    let options = config.convert.clone().with_tag(backend.tag());
    let conversion = convert_unit(oracle, &options)?;
    backend.generate(&conversion, config)
}
