//! JSON encoding of values, driven by the IR.
//!
//! This is the interchange format the generated codecs speak, usable from
//! Rust directly: a union value is an object with exactly two members, the
//! discriminator under `Kind` and the member payload under `Data`.
//!
//! ```
//! use typeweave::convert::{ConvertOptions, convert_unit};
//! use typeweave::input::UnitBuilder;
//! use typeweave::oracle::{BasicKind, StructField};
//! use typeweave::wire::{Discriminator, Value, WireCodec};
//!
//! let mut b = UnitBuilder::new("geo");
//! let int = b.basic(BasicKind::Int);
//! let shape = b.structure(vec![StructField::new("X", int).tag(r#"json:"x""#)]);
//! b.named("Point", shape);
//! let unit = b.build().unwrap();
//!
//! let conversion = convert_unit(&unit, &ConvertOptions::default()).unwrap();
//! let codec = WireCodec::new(&conversion, Discriminator::Name);
//! let point = conversion.root("Point").unwrap();
//! let value = Value::Record(vec![("x".into(), Value::Int(3))]);
//! assert_eq!(codec.encode_str(point, &value).unwrap(), r#"{"x":3}"#);
//! ```

use crate::convert::Conversion;
use crate::ir::{Container, IrId, IrNode, Length, Primitive};
use crate::oracle::EnumLiteral;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as Json};
use std::collections::BTreeMap;

/// Key under which a union value carries its discriminator.
pub const KIND_KEY: &str = "Kind";
/// Key under which a union value carries its payload.
pub const DATA_KEY: &str = "Data";

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unknown discriminator {discriminator} for union `{union}`")]
    UnknownDiscriminator {
        union: String,
        discriminator: String,
    },

    #[error("`{member}` is not a member of union `{union}`")]
    UnknownMember { union: String, member: String },

    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing field `{field}` in `{record}`")]
    MissingField { record: String, field: String },

    #[error("{value} is not a value of enum `{enumeration}`")]
    UnknownEnumValue { enumeration: String, value: String },

    #[error("expected {expected} elements, found {found}")]
    Length { expected: u64, found: usize },

    #[error("type `{0}` has no structure to encode")]
    Unresolvable(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// How the member of a union value is identified on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discriminator {
    /// The member's declared name, as a string.
    #[default]
    Name,
    /// The member's zero-based position, as an integer.
    Index,
}

/// Map keys. JSON object keys are strings; integer keys are written in
/// decimal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Key {
    Int(i64),
    String(String),
}

/// A value of some IR type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// The only value a float type accepts.
    Float(f64),
    /// Strings, and times and dates in their textual form.
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<Key, Value>),
    /// Fields by exposed name.
    Record(Vec<(String, Value)>),
    /// A union value holding `member`.
    Variant { member: String, value: Box<Value> },
    Enum(EnumLiteral),
    /// Opaque and external types pass through untouched.
    Opaque(Json),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Variant { .. } => "variant",
            Value::Enum(_) => "enum",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Field of a record value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Encoder and decoder for the types of one conversion.
pub struct WireCodec<'a> {
    conversion: &'a Conversion,
    discriminator: Discriminator,
}

impl<'a> WireCodec<'a> {
    pub fn new(conversion: &'a Conversion, discriminator: Discriminator) -> Self {
        Self {
            conversion,
            discriminator,
        }
    }

    /// Follows aliases. A chain that never reaches a structural node is
    /// an error.
    fn strip(&self, mut id: IrId) -> Result<IrId, WireError> {
        let ir = &self.conversion.ir;
        for _ in 0..=ir.len() {
            match &ir[id] {
                IrNode::Alias(alias) => id = alias.underlying,
                _ => return Ok(id),
            }
        }
        Err(WireError::Unresolvable(
            ir[id].name().unwrap_or_default().to_string(),
        ))
    }

    fn mismatch(expected: &'static str, value: &Value) -> WireError {
        WireError::Mismatch {
            expected,
            found: value.kind_name(),
        }
    }

    fn unexpected(expected: &'static str, json: &Json) -> WireError {
        WireError::Mismatch {
            expected,
            found: json_kind(json),
        }
    }

    pub fn encode(&self, id: IrId, value: &Value) -> Result<Json, WireError> {
        let id = self.strip(id)?;
        match (&self.conversion.ir[id], value) {
            (IrNode::Nullable { .. }, Value::Null) => Ok(Json::Null),
            (IrNode::Nullable { inner }, value) => self.encode(*inner, value),

            (IrNode::Primitive { primitive }, value) => match (primitive, value) {
                (Primitive::Boolean, Value::Bool(b)) => Ok(Json::Bool(*b)),
                (Primitive::Integer, Value::Int(i)) => Ok(Json::from(*i)),
                (Primitive::Float, Value::Float(f)) => Number::from_f64(*f)
                    .map(Json::Number)
                    .ok_or(Self::mismatch("finite float", value)),
                (Primitive::String | Primitive::Time | Primitive::Date, Value::String(s)) => {
                    Ok(Json::String(s.clone()))
                }
                (Primitive::Opaque, Value::Opaque(json)) => Ok(json.clone()),
                (Primitive::Boolean, _) => Err(Self::mismatch("bool", value)),
                (Primitive::Integer, _) => Err(Self::mismatch("int", value)),
                (Primitive::Float, _) => Err(Self::mismatch("float", value)),
                (Primitive::String | Primitive::Time | Primitive::Date, _) => {
                    Err(Self::mismatch("string", value))
                }
                (Primitive::Opaque, _) => Err(Self::mismatch("opaque", value)),
            },

            (IrNode::External(_), Value::Opaque(json)) => Ok(json.clone()),

            (IrNode::Enum(enumeration), Value::Enum(literal)) => {
                if !enumeration.variants.iter().any(|v| v.value == *literal) {
                    return Err(WireError::UnknownEnumValue {
                        enumeration: enumeration.name.clone(),
                        value: literal.to_string(),
                    });
                }
                Ok(match literal {
                    EnumLiteral::Int(i) => Json::from(*i),
                    EnumLiteral::Str(s) => Json::String(s.clone()),
                })
            }

            (IrNode::Record(record), Value::Record(_)) => {
                let mut out = Map::new();
                for field in &record.fields {
                    let inner = value.field(&field.name).ok_or_else(|| WireError::MissingField {
                        record: record.name.clone(),
                        field: field.name.clone(),
                    })?;
                    out.insert(field.name.clone(), self.encode(field.ty, inner)?);
                }
                Ok(Json::Object(out))
            }

            (IrNode::Union(union), Value::Variant { member, value }) => {
                let found = union
                    .member_by_name(member)
                    .ok_or_else(|| WireError::UnknownMember {
                        union: union.name.clone(),
                        member: member.clone(),
                    })?;
                let kind = match self.discriminator {
                    Discriminator::Name => Json::String(found.name.clone()),
                    Discriminator::Index => Json::from(found.index),
                };
                let mut out = Map::new();
                out.insert(KIND_KEY.to_string(), kind);
                out.insert(DATA_KEY.to_string(), self.encode(found.ty, value)?);
                Ok(Json::Object(out))
            }

            (IrNode::Container(Container::Array { elem, len }), Value::List(items)) => {
                if let Length::Fixed(n) = len {
                    if items.len() as u64 != *n {
                        return Err(WireError::Length {
                            expected: *n,
                            found: items.len(),
                        });
                    }
                }
                items
                    .iter()
                    .map(|item| self.encode(*elem, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Json::Array)
            }

            (IrNode::Container(Container::Map { elem, .. }), Value::Map(entries)) => {
                let mut out = Map::new();
                for (key, item) in entries {
                    let key = match key {
                        Key::Int(i) => i.to_string(),
                        Key::String(s) => s.clone(),
                    };
                    out.insert(key, self.encode(*elem, item)?);
                }
                Ok(Json::Object(out))
            }

            (IrNode::External(_), _) => Err(Self::mismatch("opaque", value)),
            (IrNode::Enum(_), _) => Err(Self::mismatch("enum", value)),
            (IrNode::Record(_), _) => Err(Self::mismatch("record", value)),
            (IrNode::Union(_), _) => Err(Self::mismatch("variant", value)),
            (IrNode::Container(Container::Array { .. }), _) => Err(Self::mismatch("list", value)),
            (IrNode::Container(Container::Map { .. }), _) => Err(Self::mismatch("map", value)),
            (IrNode::Alias(alias), _) => Err(WireError::Unresolvable(alias.name.clone())),
        }
    }

    pub fn decode(&self, id: IrId, json: &Json) -> Result<Value, WireError> {
        let id = self.strip(id)?;
        match &self.conversion.ir[id] {
            IrNode::Nullable { inner } => match json {
                Json::Null => Ok(Value::Null),
                json => self.decode(*inner, json),
            },

            IrNode::Primitive { primitive } => match primitive {
                Primitive::Boolean => json
                    .as_bool()
                    .map(Value::Bool)
                    .ok_or(Self::unexpected("bool", json)),
                Primitive::Integer => json
                    .as_i64()
                    .map(Value::Int)
                    .ok_or(Self::unexpected("integer", json)),
                Primitive::Float => json
                    .as_f64()
                    .map(Value::Float)
                    .ok_or(Self::unexpected("number", json)),
                Primitive::String | Primitive::Time | Primitive::Date => json
                    .as_str()
                    .map(|s| Value::String(s.to_string()))
                    .ok_or(Self::unexpected("string", json)),
                Primitive::Opaque => Ok(Value::Opaque(json.clone())),
            },

            IrNode::External(_) => Ok(Value::Opaque(json.clone())),

            IrNode::Enum(enumeration) => {
                let literal = match json {
                    Json::Number(n) => n
                        .as_i64()
                        .map(EnumLiteral::Int)
                        .ok_or(Self::unexpected("integer", json))?,
                    Json::String(s) => EnumLiteral::Str(s.clone()),
                    other => return Err(Self::unexpected("enum literal", other)),
                };
                if !enumeration.variants.iter().any(|v| v.value == literal) {
                    return Err(WireError::UnknownEnumValue {
                        enumeration: enumeration.name.clone(),
                        value: json.to_string(),
                    });
                }
                Ok(Value::Enum(literal))
            }

            IrNode::Record(record) => {
                let object = json.as_object().ok_or(Self::unexpected("object", json))?;
                let mut fields = Vec::with_capacity(record.fields.len());
                for field in &record.fields {
                    let inner = object.get(&field.name).ok_or_else(|| WireError::MissingField {
                        record: record.name.clone(),
                        field: field.name.clone(),
                    })?;
                    fields.push((field.name.clone(), self.decode(field.ty, inner)?));
                }
                Ok(Value::Record(fields))
            }

            IrNode::Union(union) => {
                let object = json.as_object().ok_or(Self::unexpected("object", json))?;
                let missing = |field: &str| WireError::MissingField {
                    record: union.name.clone(),
                    field: field.to_string(),
                };
                let kind = object.get(KIND_KEY).ok_or_else(|| missing(KIND_KEY))?;
                let member = match self.discriminator {
                    Discriminator::Name => {
                        let name = kind.as_str().ok_or(Self::unexpected("string", kind))?;
                        union.member_by_name(name)
                    }
                    Discriminator::Index => {
                        let index = kind.as_u64().ok_or(Self::unexpected("integer", kind))?;
                        union.member_by_index(index)
                    }
                };
                let member = member.ok_or_else(|| WireError::UnknownDiscriminator {
                    union: union.name.clone(),
                    discriminator: kind.to_string(),
                })?;
                let data = object.get(DATA_KEY).ok_or_else(|| missing(DATA_KEY))?;
                Ok(Value::Variant {
                    member: member.name.clone(),
                    value: Box::new(self.decode(member.ty, data)?),
                })
            }

            IrNode::Container(Container::Array { elem, len }) => {
                let items = json.as_array().ok_or(Self::unexpected("array", json))?;
                if let Length::Fixed(n) = len {
                    if items.len() as u64 != *n {
                        return Err(WireError::Length {
                            expected: *n,
                            found: items.len(),
                        });
                    }
                }
                items
                    .iter()
                    .map(|item| self.decode(*elem, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }

            IrNode::Container(Container::Map { key, elem }) => {
                let object = json.as_object().ok_or(Self::unexpected("object", json))?;
                let integral = match &self.conversion.ir[self.strip(*key)?] {
                    IrNode::Primitive { primitive } => *primitive == Primitive::Integer,
                    IrNode::Enum(e) => e.integer_backed,
                    _ => false,
                };
                let mut entries = BTreeMap::new();
                for (k, item) in object {
                    let k = if integral {
                        Key::Int(k.parse().map_err(|_| WireError::Mismatch {
                            expected: "integer key",
                            found: "string",
                        })?)
                    } else {
                        Key::String(k.clone())
                    };
                    entries.insert(k, self.decode(*elem, item)?);
                }
                Ok(Value::Map(entries))
            }

            IrNode::Alias(alias) => Err(WireError::Unresolvable(alias.name.clone())),
        }
    }

    pub fn encode_str(&self, id: IrId, value: &Value) -> Result<String, WireError> {
        Ok(serde_json::to_string(&self.encode(id, value)?)?)
    }

    pub fn decode_str(&self, id: IrId, source: &str) -> Result<Value, WireError> {
        let json: Json = serde_json::from_str(source)?;
        self.decode(id, &json)
    }
}
