//! TypeScript type definitions.
//!
//! Records become interfaces, enums get a companion label table, and unions
//! are written as `{ Kind, Data }` envelopes with an index-valued `Kind` enum.

use crate::config::Config;
use crate::convert::Conversion;
use crate::declarations::{Declaration, DeclarationRegistry};
use crate::emit::{self, Dialect};
use crate::error::Error;
use crate::ir::{Container, IrId, IrNode, Primitive};
use crate::oracle::EnumLiteral;
use crate::output::quoted;
use crate::traits::{Backend, BackendCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Static instance of the TypeScript backend for registry.
pub static TYPESCRIPT_BACKEND: TypeScriptBackend = TypeScriptBackend;

/// TypeScript backend implementing the Backend trait.
pub struct TypeScriptBackend;

impl Backend for TypeScriptBackend {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn language(&self) -> &'static str {
        "typescript"
    }

    fn extension(&self) -> &'static str {
        "ts"
    }

    fn category(&self) -> BackendCategory {
        BackendCategory::Types
    }

    fn tag(&self) -> Option<&'static str> {
        Some("ts")
    }

    fn generate(&self, conversion: &Conversion, config: &Config) -> Result<String, Error> {
        Ok(generate_typescript_types(conversion, &config.typescript)?)
    }
}

/// Options for TypeScript generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeScriptOptions {
    /// Add `export` to every declaration.
    pub export: bool,
    /// Mark interface fields `readonly`.
    pub readonly: bool,
}

impl Default for TypeScriptOptions {
    fn default() -> Self {
        Self {
            export: true,
            readonly: false,
        }
    }
}

/// Id of the shared date/time branded string declarations.
const TIMES_ID: &str = "__times_string_def";

const TIMES: &str = r#"class DateTag {
  private _: "D" = "D";
}

class TimeTag {
  private _: "T" = "T";
}

// YYYY-MM-DD date format
export type Date_ = string & DateTag;

// ISO date-time string
export type Time = string & TimeTag;
"#;

/// Global type names a declaration must not shadow.
const RESERVED: &[&str] = &["String", "Number", "Boolean", "Object", "Array", "Symbol"];

/// Render a conversion as TypeScript declarations.
pub fn generate_typescript_types(
    conversion: &Conversion,
    options: &TypeScriptOptions,
) -> Result<String, crate::error::InvariantViolation> {
    emit::render(&TypeScript { options }, conversion)
}

struct TypeScript<'a> {
    options: &'a TypeScriptOptions,
}

impl TypeScript<'_> {
    fn export(&self) -> &'static str {
        if self.options.export { "export " } else { "" }
    }

    fn type_name(name: &str) -> String {
        if RESERVED.contains(&name) {
            format!("{}_", name)
        } else {
            name.to_string()
        }
    }

    fn property(name: &str) -> String {
        let valid = name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
            && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
        if valid {
            name.to_string()
        } else {
            quoted(name)
        }
    }
}

impl Dialect for TypeScript<'_> {
    fn reference(&self, conversion: &Conversion, id: IrId) -> String {
        match &conversion.ir[id] {
            IrNode::Primitive { primitive } => match primitive {
                Primitive::Boolean => "boolean".into(),
                Primitive::Integer | Primitive::Float => "number".into(),
                Primitive::String => "string".into(),
                Primitive::Time => "Time".into(),
                Primitive::Date => "Date_".into(),
                Primitive::Opaque => "any".into(),
            },
            IrNode::Alias(a) => Self::type_name(&a.name),
            IrNode::Record(r) => Self::type_name(&r.name),
            IrNode::Enum(e) => Self::type_name(&e.name),
            IrNode::Union(u) => Self::type_name(&u.name),
            IrNode::External(e) => Self::type_name(&e.name),
            IrNode::Container(Container::Array { elem, .. }) => {
                let elem = self.reference(conversion, *elem);
                if elem.contains(' ') {
                    format!("({})[]", elem)
                } else {
                    format!("{}[]", elem)
                }
            }
            IrNode::Container(Container::Map { key, elem }) => format!(
                "{{ [key: {}]: {} }}",
                self.reference(conversion, *key),
                self.reference(conversion, *elem)
            ),
            IrNode::Nullable { inner } => format!("{} | null", self.reference(conversion, *inner)),
        }
    }

    fn declare(&self, conversion: &Conversion, id: IrId, out: &mut Vec<Declaration>) {
        let export = self.export();
        match &conversion.ir[id] {
            IrNode::Primitive {
                primitive: Primitive::Time | Primitive::Date,
            } => out.push(Declaration::new(TIMES_ID, TIMES)),

            IrNode::Alias(alias) => {
                let name = Self::type_name(&alias.name);
                out.push(Declaration::new(
                    name.clone(),
                    format!(
                        "// {}\n{}type {} = {};\n",
                        alias.origin,
                        export,
                        name,
                        self.reference(conversion, alias.underlying)
                    ),
                ));
            }

            IrNode::Record(record) => {
                let name = Self::type_name(&record.name);
                let readonly = if self.options.readonly { "readonly " } else { "" };
                let mut code = format!("// {}\n{}interface {} {{\n", record.origin, export, name);
                for field in &record.fields {
                    writeln!(
                        code,
                        "  {}{}: {};",
                        readonly,
                        Self::property(&field.name),
                        self.reference(conversion, field.ty)
                    )
                    .unwrap();
                }
                code.push_str("}\n");
                out.push(Declaration::new(name, code));
            }

            IrNode::Enum(enumeration) => {
                let name = Self::type_name(&enumeration.name);
                let mut code = format!("// {}\n{}enum {} {{\n", enumeration.origin, export, name);
                for variant in &enumeration.variants {
                    let value = match &variant.value {
                        EnumLiteral::Int(v) => v.to_string(),
                        EnumLiteral::Str(s) => quoted(s),
                    };
                    writeln!(code, "  {} = {},", variant.name, value).unwrap();
                }
                code.push_str("}\n\n");
                writeln!(
                    code,
                    "{}const {}Labels: {{ [key in {}]: string }} = {{",
                    export, name, name
                )
                .unwrap();
                for variant in &enumeration.variants {
                    writeln!(
                        code,
                        "  [{}.{}]: {},",
                        name,
                        variant.name,
                        quoted(&variant.label)
                    )
                    .unwrap();
                }
                code.push_str("};\n");
                out.push(Declaration::new(name, code));
            }

            IrNode::Union(union) => {
                let name = Self::type_name(&union.name);
                let kind = format!("{}Kind", name);
                let mut code = format!("// {}\n{}enum {} {{\n", union.origin, export, kind);
                for member in &union.members {
                    writeln!(
                        code,
                        "  {} = {},",
                        self.reference(conversion, member.ty),
                        member.index
                    )
                    .unwrap();
                }
                code.push_str("}\n\n");
                let data: Vec<String> = union
                    .members
                    .iter()
                    .map(|m| self.reference(conversion, m.ty))
                    .collect();
                let data = if data.is_empty() {
                    "never".to_string()
                } else {
                    data.join(" | ")
                };
                writeln!(code, "{}interface {} {{", export, name).unwrap();
                writeln!(code, "  Kind: {};", kind).unwrap();
                writeln!(code, "  Data: {};", data).unwrap();
                code.push_str("}\n");
                out.push(Declaration::new(name, code));
            }

            IrNode::Primitive { .. }
            | IrNode::Container(_)
            | IrNode::Nullable { .. }
            | IrNode::External(_) => {}
        }
    }

    fn header(&self, conversion: &Conversion, _registry: &DeclarationRegistry) -> String {
        let mut out = String::from("// Code generated by typeweave. DO NOT EDIT.\n\n");

        let imports: BTreeSet<(&str, String)> = conversion
            .ir
            .iter()
            .filter_map(|(_, node)| match node {
                IrNode::External(e) => Some((e.import.as_str(), Self::type_name(&e.name))),
                _ => None,
            })
            .collect();
        for (import, name) in &imports {
            writeln!(out, "import type {{ {} }} from {};", name, quoted(import)).unwrap();
        }
        if !imports.is_empty() {
            out.push('\n');
        }
        out
    }
}
