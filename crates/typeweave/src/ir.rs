//! Backend-agnostic intermediate representation.
//!
//! Nodes live in an [`Ir`] arena and refer to each other by [`IrId`], so
//! self-referential records are plain back edges rather than owned cycles.

use crate::oracle::{Directive, EnumLiteral, Position};
use serde::Serialize;
use std::fmt;
use std::ops::Index;

/// Handle to a node in an [`Ir`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct IrId(pub u32);

impl IrId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scalar types every backend knows how to spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Boolean,
    Integer,
    Float,
    String,
    /// Calendar date and time.
    Time,
    /// Calendar date without time of day.
    Date,
    /// No faithful mapping; backends fall back to their dynamic type.
    Opaque,
}

impl Primitive {
    pub fn is_number(self) -> bool {
        matches!(self, Primitive::Integer | Primitive::Float)
    }
}

/// Where a named node was declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub package: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.package, self.name)
        }
    }
}

/// An exposed record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    /// Name on the wire / in the target language.
    pub name: String,
    /// Identifier in the source struct.
    pub source_name: String,
    pub ty: IrId,
}

/// Entry of a record's physical field list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclaredField {
    Column {
        source_name: String,
        name: String,
        ty: IrId,
        exported: bool,
        /// Raw struct tag, for keys only one backend reads.
        #[serde(skip_serializing_if = "String::is_empty")]
        tag: String,
    },
    /// Ignored or unsupported; keeps its slot so positions line up.
    Discard { source_name: String },
}

impl DeclaredField {
    pub fn source_name(&self) -> &str {
        match self {
            DeclaredField::Column { source_name, .. } | DeclaredField::Discard { source_name } => {
                source_name
            }
        }
    }

    pub fn is_discard(&self) -> bool {
        matches!(self, DeclaredField::Discard { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub name: String,
    pub origin: Origin,
    /// Exposed fields in declared order, embedded records spliced in place.
    pub fields: Vec<Field>,
    /// Every physical field, one entry per source field after flattening.
    pub declared: Vec<DeclaredField>,
    /// Unions this record is a member of, sorted by name.
    pub unions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumVariant {
    pub name: String,
    pub value: EnumLiteral,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enum {
    pub name: String,
    pub origin: Origin,
    pub integer_backed: bool,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnionMember {
    pub ty: IrId,
    /// Declared name, the string discriminator.
    pub name: String,
    /// Zero-based position, the integer discriminator.
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Union {
    pub name: String,
    pub origin: Origin,
    /// Sorted by name; filled in once the whole unit has been scanned.
    pub members: Vec<UnionMember>,
}

impl Union {
    pub fn member_by_name(&self, name: &str) -> Option<&UnionMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_by_index(&self, index: u64) -> Option<&UnionMember> {
        self.members.iter().find(|m| u64::from(m.index) == index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Length {
    Fixed(u64),
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Container {
    Array { elem: IrId, len: Length },
    Map { key: IrId, elem: IrId },
}

/// A named non-record, non-union type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alias {
    pub name: String,
    pub origin: Origin,
    pub underlying: IrId,
}

/// A type supplied by hand-written code outside the generated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct External {
    pub name: String,
    /// Backend-specific import hint, e.g. a module path.
    pub import: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum IrNode {
    Primitive { primitive: Primitive },
    Alias(Alias),
    Record(Record),
    Enum(Enum),
    Union(Union),
    Container(Container),
    /// Admits an absent value at the wire level.
    Nullable { inner: IrId },
    External(External),
}

impl IrNode {
    /// Declared name of named kinds.
    pub fn name(&self) -> Option<&str> {
        match self {
            IrNode::Alias(a) => Some(&a.name),
            IrNode::Record(r) => Some(&r.name),
            IrNode::Enum(e) => Some(&e.name),
            IrNode::Union(u) => Some(&u.name),
            IrNode::External(e) => Some(&e.name),
            IrNode::Primitive { .. } | IrNode::Container(_) | IrNode::Nullable { .. } => None,
        }
    }

    pub fn origin(&self) -> Option<&Origin> {
        match self {
            IrNode::Alias(a) => Some(&a.origin),
            IrNode::Record(r) => Some(&r.origin),
            IrNode::Enum(e) => Some(&e.origin),
            IrNode::Union(u) => Some(&u.origin),
            _ => None,
        }
    }
}

/// Arena of IR nodes for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ir {
    nodes: Vec<IrNode>,
}

impl Ir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: IrNode) -> IrId {
        let id = IrId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: IrId) -> &IrNode {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: IrId) -> &mut IrNode {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IrId, &IrNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (IrId(i as u32), node))
    }

    /// Nodes a node refers to, in field/member order.
    pub fn children(&self, id: IrId) -> Vec<IrId> {
        match self.get(id) {
            IrNode::Primitive { .. } | IrNode::External(_) => Vec::new(),
            IrNode::Alias(a) => vec![a.underlying],
            IrNode::Record(r) => {
                let mut out: Vec<IrId> = r.fields.iter().map(|f| f.ty).collect();
                for declared in &r.declared {
                    if let DeclaredField::Column { ty, .. } = declared {
                        if !out.contains(ty) {
                            out.push(*ty);
                        }
                    }
                }
                out
            }
            IrNode::Enum(_) => Vec::new(),
            IrNode::Union(u) => u.members.iter().map(|m| m.ty).collect(),
            IrNode::Container(Container::Array { elem, .. }) => vec![*elem],
            IrNode::Container(Container::Map { key, elem }) => vec![*key, *elem],
            IrNode::Nullable { inner } => vec![*inner],
        }
    }

    /// Follows nullable wrappers and aliases down to the structural node.
    pub fn resolve(&self, mut id: IrId) -> IrId {
        // An alias chain longer than the arena is a cycle.
        for _ in 0..=self.nodes.len() {
            match self.get(id) {
                IrNode::Nullable { inner } => id = *inner,
                IrNode::Alias(a) => id = a.underlying,
                _ => break,
            }
        }
        id
    }

    pub fn record(&self, id: IrId) -> Option<&Record> {
        match self.get(id) {
            IrNode::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn union(&self, id: IrId) -> Option<&Union> {
        match self.get(id) {
            IrNode::Union(u) => Some(u),
            _ => None,
        }
    }

    pub fn is_nullable(&self, id: IrId) -> bool {
        matches!(self.get(id), IrNode::Nullable { .. })
    }
}

impl Index<IrId> for Ir {
    type Output = IrNode;

    fn index(&self, id: IrId) -> &IrNode {
        self.get(id)
    }
}
