//! The type graph consumed by the converter.
//!
//! A [`TypeOracle`] exposes one compilation unit: its top-level declarations in
//! source order, the nodes reachable from them, and the enumeration constants
//! declared alongside. Implementations own the graph; the converter only reads it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Handle to a node of the source type graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Predeclared scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
}

impl BasicKind {
    pub fn is_boolean(self) -> bool {
        matches!(self, BasicKind::Bool)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            BasicKind::Int | BasicKind::Int8 | BasicKind::Int16 | BasicKind::Int32 | BasicKind::Int64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BasicKind::Float32 | BasicKind::Float64)
    }

    pub fn is_string(self) -> bool {
        matches!(self, BasicKind::String)
    }

    /// Source spelling, used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::String => "string",
            BasicKind::UnsafePointer => "unsafe.Pointer",
        }
    }
}

/// Source location of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A declared (named) type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedType {
    pub name: String,
    #[serde(default)]
    pub package: String,
    pub underlying: NodeId,
    /// Method names declared on the type (value and pointer receivers).
    #[serde(default)]
    pub methods: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Special comments attached to the declaration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<Directive>,
}

/// A `// <tag>:<content>` comment written above a type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub tag: String,
    pub content: String,
}

impl NamedType {
    /// `package.Name`, or just the name for the unit's own package.
    pub fn qualified(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }
}

/// One field of a struct node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: NodeId,
    /// Raw tag string, e.g. `json:"id,omitempty" sql:"-"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub embedded: bool,
    /// Defaults to "starts with an uppercase letter" when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported: Option<bool>,
}

impl StructField {
    pub fn new(name: impl Into<String>, ty: NodeId) -> Self {
        Self {
            name: name.into(),
            ty,
            tag: String::new(),
            embedded: false,
            exported: None,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn is_exported(&self) -> bool {
        self.exported.unwrap_or_else(|| is_exported_name(&self.name))
    }

    /// Value of `key` in this field's tag.
    pub fn tag_value(&self, key: &str) -> Option<String> {
        lookup_tag(&self.tag, key)
    }
}

/// A node of the source type graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeNode {
    Basic { basic: BasicKind },
    Named(NamedType),
    Struct { fields: Vec<StructField> },
    Pointer { elem: NodeId },
    Array { elem: NodeId, len: u64 },
    Slice { elem: NodeId },
    Map { key: NodeId, elem: NodeId },
    Interface { methods: BTreeSet<String> },
    /// Channels, functions and anything else without an IR mapping.
    Unsupported { description: String },
}

impl TypeNode {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeNode::Basic { .. } => "basic",
            TypeNode::Named(_) => "named",
            TypeNode::Struct { .. } => "struct",
            TypeNode::Pointer { .. } => "pointer",
            TypeNode::Array { .. } => "array",
            TypeNode::Slice { .. } => "slice",
            TypeNode::Map { .. } => "map",
            TypeNode::Interface { .. } => "interface",
            TypeNode::Unsupported { .. } => "unsupported",
        }
    }

    /// Direct children, in a fixed order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            TypeNode::Basic { .. } | TypeNode::Interface { .. } | TypeNode::Unsupported { .. } => {
                Vec::new()
            }
            TypeNode::Named(named) => vec![named.underlying],
            TypeNode::Struct { fields } => fields.iter().map(|f| f.ty).collect(),
            TypeNode::Pointer { elem } | TypeNode::Slice { elem } => vec![*elem],
            TypeNode::Array { elem, .. } => vec![*elem],
            TypeNode::Map { key, elem } => vec![*key, *elem],
        }
    }

    pub fn as_named(&self) -> Option<&NamedType> {
        match self {
            TypeNode::Named(named) => Some(named),
            _ => None,
        }
    }
}

/// Literal value of an enumeration constant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumLiteral {
    Int(i64),
    Str(String),
}

impl fmt::Display for EnumLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumLiteral::Int(v) => write!(f, "{}", v),
            EnumLiteral::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// One constant of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub var_name: String,
    pub value: EnumLiteral,
    #[serde(default)]
    pub label: String,
}

/// Constants declared for one enumeration type, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumSource {
    pub values: Vec<EnumValue>,
}

/// Enumeration sources keyed by type name.
pub type EnumTable = BTreeMap<String, EnumSource>;

/// Read-only view of one compilation unit's type graph.
pub trait TypeOracle {
    /// Package the unit was loaded from.
    fn package(&self) -> &str;

    /// Top-level declarations in source order. Each is a [`TypeNode::Named`].
    fn declarations(&self) -> &[NodeId];

    fn node(&self, id: NodeId) -> &TypeNode;

    fn enums(&self) -> &EnumTable;

    /// Method names of a node. Interfaces (named or not) report their
    /// required methods, named types their declared ones.
    fn method_set(&self, id: NodeId) -> BTreeSet<String> {
        match self.node(id) {
            TypeNode::Interface { methods } => methods.clone(),
            TypeNode::Named(named) => match self.node(named.underlying) {
                TypeNode::Interface { methods } => methods.clone(),
                _ => named.methods.clone(),
            },
            _ => BTreeSet::new(),
        }
    }

    /// Whether `member`'s method set contains every method of `interface`.
    fn satisfies(&self, member: NodeId, interface: NodeId) -> bool {
        let required = self.method_set(interface);
        let provided = self.method_set(member);
        required.is_subset(&provided)
    }

    /// Tag lookup on a struct field.
    fn field_tag(&self, field: &StructField, key: &str) -> Option<String> {
        field.tag_value(key)
    }
}

/// Exported-ness of a source identifier.
pub fn is_exported_name(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Looks `key` up in a raw `key:"value" key2:"value2"` tag string.
///
/// Follows the conventional struct-tag grammar: keys are runs of non-space,
/// non-quote, non-colon characters; values are double-quoted with backslash
/// escapes. A malformed tail ends the lookup.
pub fn lookup_tag(tag: &str, key: &str) -> Option<String> {
    let mut rest = tag;
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return None;
        }

        let name_len = rest
            .find(|c: char| c <= ' ' || c == ':' || c == '"' || c == '\x7f')
            .unwrap_or(rest.len());
        if name_len == 0 || !rest[name_len..].starts_with(":\"") {
            return None;
        }
        let name = &rest[..name_len];
        rest = &rest[name_len + 1..];

        let bytes = rest.as_bytes();
        let mut end = 1;
        while end < bytes.len() && bytes[end] != b'"' {
            if bytes[end] == b'\\' {
                end += 1;
            }
            end += 1;
        }
        if end >= bytes.len() {
            return None;
        }
        let quoted = &rest[1..end];
        rest = &rest[end + 1..];

        if name == key {
            return Some(unescape(quoted));
        }
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// How a struct field surfaces in the exposed view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldName {
    Ignored,
    Exposed(String),
}

/// Resolves a field's exposed name: the backend tag, then `json`, then the
/// declared identifier. Options after the first comma are dropped and `-`
/// marks the field as ignored.
pub fn field_name(oracle: &dyn TypeOracle, field: &StructField, backend_tag: Option<&str>) -> FieldName {
    let value = backend_tag
        .into_iter()
        .chain(std::iter::once("json"))
        .filter_map(|key| oracle.field_tag(field, key))
        .find(|value| !value.is_empty());

    let name = value
        .as_deref()
        .and_then(|v| v.split(',').next())
        .unwrap_or_default();
    match name {
        "-" => FieldName::Ignored,
        "" => FieldName::Exposed(field.name.clone()),
        other => FieldName::Exposed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_tag() {
        let tag = r#"json:"id,omitempty" sql:"-" ts:"identifier""#;
        assert_eq!(lookup_tag(tag, "json").as_deref(), Some("id,omitempty"));
        assert_eq!(lookup_tag(tag, "sql").as_deref(), Some("-"));
        assert_eq!(lookup_tag(tag, "ts").as_deref(), Some("identifier"));
        assert_eq!(lookup_tag(tag, "dart"), None);
    }

    #[test]
    fn test_lookup_tag_escapes_and_garbage() {
        assert_eq!(lookup_tag(r#"a:"x\"y""#, "a").as_deref(), Some("x\"y"));
        assert_eq!(lookup_tag("not a tag", "a"), None);
        assert_eq!(lookup_tag(r#"a:"unterminated"#, "a"), None);
        assert_eq!(lookup_tag("", "a"), None);
    }

    #[test]
    fn test_basic_kind_classes() {
        assert!(BasicKind::Uint8.is_integer());
        assert!(BasicKind::Uint8.is_unsigned());
        assert!(!BasicKind::Float64.is_integer());
        assert!(BasicKind::Float32.is_float());
        assert!(!BasicKind::Complex64.is_float());
        assert!(BasicKind::Bool.is_boolean());
    }

    #[test]
    fn test_exported_default() {
        assert!(StructField::new("Name", NodeId(0)).is_exported());
        assert!(!StructField::new("name", NodeId(0)).is_exported());
        let mut forced = StructField::new("name", NodeId(0));
        forced.exported = Some(true);
        assert!(forced.is_exported());
    }

    #[test]
    fn test_type_node_json_shape() {
        let node: TypeNode = serde_json::from_str(
            r#"{"kind":"struct","fields":[{"name":"X","type":3,"tag":"json:\"x\""}]}"#,
        )
        .unwrap();
        let TypeNode::Struct { fields } = node else {
            panic!("expected struct");
        };
        assert_eq!(fields[0].ty, NodeId(3));
        assert_eq!(fields[0].tag_value("json").as_deref(), Some("x"));
        assert!(!fields[0].embedded);
    }
}
