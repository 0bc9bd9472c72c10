//! Output backends for code generation.
//!
//! Each backend implements a [`Dialect`](crate::emit::Dialect) over the
//! converted IR and the [`Backend`](crate::traits::Backend) trait for
//! uniform access via the registry.

#[cfg(any(
    feature = "backend-go-json",
    feature = "backend-go-scan",
    feature = "backend-go-enums"
))]
use crate::convert::Conversion;
#[cfg(any(
    feature = "backend-go-json",
    feature = "backend-go-scan",
    feature = "backend-go-enums"
))]
use crate::ir::{Container, IrId, IrNode, Length, Primitive};
#[cfg(any(
    feature = "backend-go-json",
    feature = "backend-go-scan",
    feature = "backend-go-enums"
))]
use serde::{Deserialize, Serialize};

// TypeScript
#[cfg(feature = "backend-typescript")]
pub mod typescript;

#[cfg(feature = "backend-typescript")]
pub use typescript::{TypeScriptBackend, TypeScriptOptions, generate_typescript_types};

// Dart (types and JSON codecs)
#[cfg(feature = "backend-dart")]
pub mod dart;

#[cfg(feature = "backend-dart")]
pub use dart::{DartBackend, DartOptions, generate_dart};

// Go JSON wrappers for unions
#[cfg(feature = "backend-go-json")]
pub mod go_json;

#[cfg(feature = "backend-go-json")]
pub use go_json::{GoJsonBackend, generate_go_json};

// Go row scanners
#[cfg(feature = "backend-go-scan")]
pub mod go_scan;

#[cfg(feature = "backend-go-scan")]
pub use go_scan::{GoScanBackend, generate_go_scan};

// SQL schema
#[cfg(feature = "backend-go-enums")]
pub mod go_enums;

#[cfg(feature = "backend-go-enums")]
pub use go_enums::{GoEnumsBackend, generate_go_enums};

#[cfg(feature = "backend-sql")]
pub mod sql;

#[cfg(feature = "backend-sql")]
pub use sql::{SqlBackend, generate_sql};

// Table layout shared by the row backends
#[cfg(any(feature = "backend-sql", feature = "backend-go-scan"))]
pub mod schema;

#[cfg(any(feature = "backend-sql", feature = "backend-go-scan"))]
pub use schema::SqlOptions;

/// Options shared by the Go backends.
#[cfg(any(
    feature = "backend-go-json",
    feature = "backend-go-scan",
    feature = "backend-go-enums"
))]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoOptions {
    /// Package clause; defaults to the last segment of the unit's package.
    pub package: Option<String>,
}

#[cfg(any(
    feature = "backend-go-json",
    feature = "backend-go-scan",
    feature = "backend-go-enums"
))]
impl GoOptions {
    pub fn package_name<'a>(&'a self, unit_package: &'a str) -> &'a str {
        self.package
            .as_deref()
            .unwrap_or_else(|| unit_package.rsplit('/').next().unwrap_or(unit_package))
    }
}

/// Go spelling of an IR node, as seen from the generated package.
#[cfg(any(
    feature = "backend-go-json",
    feature = "backend-go-scan",
    feature = "backend-go-enums"
))]
pub(crate) fn go_reference(conversion: &Conversion, id: IrId) -> String {
    match &conversion.ir[id] {
        IrNode::Primitive { primitive } => match primitive {
            Primitive::Boolean => "bool",
            Primitive::Integer => "int",
            Primitive::Float => "float64",
            Primitive::String => "string",
            Primitive::Time => "time.Time",
            Primitive::Date => "Date",
            Primitive::Opaque => "interface{}",
        }
        .to_string(),
        IrNode::Container(Container::Array { elem, len }) => match len {
            Length::Fixed(n) => format!("[{}]{}", n, go_reference(conversion, *elem)),
            Length::Dynamic => format!("[]{}", go_reference(conversion, *elem)),
        },
        IrNode::Container(Container::Map { key, elem }) => format!(
            "map[{}]{}",
            go_reference(conversion, *key),
            go_reference(conversion, *elem)
        ),
        IrNode::Nullable { inner } => go_reference(conversion, *inner),
        node => match (node.name(), node.origin()) {
            (Some(name), Some(origin)) if origin.package != conversion.package => {
                qualified_go_name(&origin.package, name)
            }
            (name, _) => name.unwrap_or_default().to_string(),
        },
    }
}

#[cfg(any(
    feature = "backend-go-json",
    feature = "backend-go-scan",
    feature = "backend-go-enums"
))]
fn qualified_go_name(package: &str, name: &str) -> String {
    match package.rsplit('/').next() {
        Some(last) if !last.is_empty() => format!("{}.{}", last, name),
        _ => name.to_string(),
    }
}

/// Double-quoted string literal with JSON escapes, which TypeScript, Go and
/// Dart all read the same way.
#[cfg(any(
    feature = "backend-typescript",
    feature = "backend-dart",
    feature = "backend-go-json",
    feature = "backend-go-enums"
))]
pub(crate) fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

#[cfg(feature = "backend-dart")]
pub(crate) fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(any(feature = "backend-dart", feature = "backend-go-scan"))]
pub(crate) fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `UserID` -> `user_id`, `HTTPServer` -> `http_server`.
#[cfg(any(feature = "backend-sql", feature = "backend-go-scan"))]
pub(crate) fn snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if i > 0 && (prev_lower || (prev_upper && next_lower)) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
