//! Go label tables for the enums of a package.
//!
//! Each local enum `E` gets an `ELabels` variable mapping its constants to
//! their labels, all in one `var` block sorted by enum name.

use crate::config::Config;
use crate::convert::Conversion;
use crate::declarations::{Declaration, DeclarationRegistry};
use crate::emit::{self, Dialect};
use crate::error::{Error, InvariantViolation};
use crate::ir::{Enum, IrId, IrNode};
use crate::oracle::EnumLiteral;
use crate::output::{GoOptions, go_reference, quoted};
use crate::traits::{Backend, BackendCategory};
use std::fmt::Write;

/// Static instance of the Go enum labels backend for registry.
pub static GO_ENUMS_BACKEND: GoEnumsBackend = GoEnumsBackend;

/// Go enum labels backend implementing the Backend trait.
pub struct GoEnumsBackend;

impl Backend for GoEnumsBackend {
    fn name(&self) -> &'static str {
        "go-enums"
    }

    fn language(&self) -> &'static str {
        "go"
    }

    fn extension(&self) -> &'static str {
        "go"
    }

    fn category(&self) -> BackendCategory {
        BackendCategory::Types
    }

    fn generate(&self, conversion: &Conversion, config: &Config) -> Result<String, Error> {
        Ok(generate_go_enums(conversion, &config.go)?)
    }
}

/// Render the label tables of the conversion's own enums.
pub fn generate_go_enums(
    conversion: &Conversion,
    options: &GoOptions,
) -> Result<String, InvariantViolation> {
    emit::render(&GoEnums { options }, conversion)
}

struct GoEnums<'a> {
    options: &'a GoOptions,
}

impl GoEnums<'_> {
    /// Integer enums with non-negative values index an array.
    fn indexed(enumeration: &Enum) -> bool {
        enumeration.integer_backed
            && enumeration
                .variants
                .iter()
                .all(|v| matches!(v.value, EnumLiteral::Int(n) if n >= 0))
    }

    fn labels(enumeration: &Enum) -> String {
        let name = &enumeration.name;
        let mut code = if Self::indexed(enumeration) {
            format!("\t{}Labels = [...]string{{\n", name)
        } else {
            format!("\t{}Labels = map[{}]string{{\n", name, name)
        };
        let width = enumeration
            .variants
            .iter()
            .map(|v| v.name.len())
            .max()
            .unwrap_or(0);
        for variant in &enumeration.variants {
            writeln!(
                code,
                "\t\t{}:{:pad$} {},",
                variant.name,
                "",
                quoted(&variant.label),
                pad = width - variant.name.len()
            )
            .unwrap();
        }
        code.push_str("\t}");
        code
    }
}

impl Dialect for GoEnums<'_> {
    fn reference(&self, conversion: &Conversion, id: IrId) -> String {
        go_reference(conversion, id)
    }

    fn roots(&self, conversion: &Conversion) -> Vec<IrId> {
        let mut enums: Vec<(&str, IrId)> = conversion
            .roots
            .iter()
            .filter_map(|root| match &conversion.ir[root.node] {
                IrNode::Enum(e) if e.origin.package == conversion.package => {
                    Some((e.name.as_str(), root.node))
                }
                _ => None,
            })
            .collect();
        enums.sort();
        enums.into_iter().map(|(_, id)| id).collect()
    }

    fn declare(&self, conversion: &Conversion, id: IrId, out: &mut Vec<Declaration>) {
        if let IrNode::Enum(enumeration) = &conversion.ir[id] {
            out.push(Declaration::new(
                format!("{}Labels", enumeration.name),
                Self::labels(enumeration),
            ));
        }
    }

    fn header(&self, conversion: &Conversion, registry: &DeclarationRegistry) -> String {
        let mut out = String::from("// Code generated by typeweave. DO NOT EDIT.\n\n");
        writeln!(out, "package {}\n", self.options.package_name(&conversion.package)).unwrap();
        if !registry.is_empty() {
            out.push_str("var (\n");
        }
        out
    }

    fn footer(&self, _conversion: &Conversion, registry: &DeclarationRegistry) -> String {
        if registry.is_empty() {
            String::new()
        } else {
            String::from(")\n")
        }
    }
}
