//! Conversion of an oracle's type graph into the IR.
//!
//! One [`convert_unit`] call is one run: the memo table, the interface
//! analyzer and the IR arena are created for it and dropped with it.
//!
//! Named structs get their (empty) record registered in the memo before any
//! field is converted, so self-referential types resolve to a back edge on
//! the placeholder instead of recursing. Aliases use the same placeholder
//! scheme, which also makes alias chains that loop back on themselves
//! terminate.
//!
//! Embedded fields are spliced once every declaration has been converted, so
//! the flattened layout of a record does not depend on declaration order.

use crate::error::{InvariantViolation, Site};
use crate::interfaces::InterfaceAnalyzer;
use crate::ir::{
    Alias, Container, DeclaredField, Enum, EnumVariant, External, Field, Ir, IrId, IrNode,
    Length, Origin, Primitive, Record, Union, UnionMember,
};
use crate::oracle::{
    BasicKind, EnumLiteral, EnumSource, FieldName, NamedType, NodeId, Position, StructField,
    TypeNode, TypeOracle, field_name, is_exported_name,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Conversion settings shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Backend tag consulted before `json` when naming fields.
    #[serde(skip)]
    pub tag: Option<String>,
    /// Named types rendered as calendar dates.
    pub date_names: Vec<String>,
    /// Tag key marking a field as an externally supplied declaration.
    pub extern_tag: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            tag: None,
            date_names: vec!["Date".to_string()],
            extern_tag: "extern".to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn with_tag(mut self, tag: Option<&str>) -> Self {
        self.tag = tag.map(str::to_string);
        self
    }
}

/// A top-level declaration and the node it converted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Root {
    pub name: String,
    pub node: IrId,
}

/// A type that was degraded to [`Primitive::Opaque`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub declaration: Option<String>,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declaration {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Result of converting one unit.
#[derive(Debug, Serialize)]
pub struct Conversion {
    pub package: String,
    pub ir: Ir,
    /// Top-level declarations in source order.
    pub roots: Vec<Root>,
    pub warnings: Vec<Warning>,
}

impl Conversion {
    /// IR node of a top-level declaration.
    pub fn root(&self, name: &str) -> Option<IrId> {
        self.roots.iter().find(|r| r.name == name).map(|r| r.node)
    }
}

/// Convert every declaration of `oracle`.
pub fn convert_unit(
    oracle: &dyn TypeOracle,
    options: &ConvertOptions,
) -> Result<Conversion, InvariantViolation> {
    let mut engine = Engine::new(oracle, options);

    for &id in oracle.declarations() {
        engine.analyzer.register(oracle, id)?;
    }

    let mut roots = Vec::with_capacity(oracle.declarations().len());
    for &id in oracle.declarations() {
        let name = oracle
            .node(id)
            .as_named()
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string());
        tracing::debug!(declaration = %name, "converting");
        let node = engine.convert(id)?;
        roots.push(Root { name, node });
    }

    engine.flatten_records();
    engine.analyzer.resolve();
    engine.link_unions()?;

    Ok(Conversion {
        package: oracle.package().to_string(),
        ir: engine.ir,
        roots,
        warnings: engine.warnings,
    })
}

struct Engine<'a> {
    oracle: &'a dyn TypeOracle,
    options: &'a ConvertOptions,
    analyzer: InterfaceAnalyzer,
    ir: Ir,
    memo: HashMap<NodeId, IrId>,
    primitives: HashMap<Primitive, IrId>,
    /// Field layout of every record, embeds not yet spliced.
    layouts: HashMap<IrId, Vec<Slot>>,
    /// Union placeholders awaiting their members.
    unions: Vec<(NodeId, IrId)>,
    /// Enclosing named declarations, innermost last.
    scope: Vec<(String, Option<Position>)>,
    warnings: Vec<Warning>,
}

impl<'a> Engine<'a> {
    fn new(oracle: &'a dyn TypeOracle, options: &'a ConvertOptions) -> Self {
        Self {
            oracle,
            options,
            analyzer: InterfaceAnalyzer::new(),
            ir: Ir::new(),
            memo: HashMap::new(),
            primitives: HashMap::new(),
            layouts: HashMap::new(),
            unions: Vec::new(),
            scope: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn site(&self) -> Site {
        match self.scope.last() {
            Some((name, position)) => Site {
                declaration: Some(name.clone()),
                position: position.clone(),
            },
            None => Site::default(),
        }
    }

    fn warn(&mut self, message: String) {
        let declaration = self.scope.last().map(|(name, _)| name.clone());
        tracing::warn!(declaration = declaration.as_deref().unwrap_or("-"), "{}", message);
        self.warnings.push(Warning {
            declaration,
            message,
        });
    }

    fn primitive(&mut self, primitive: Primitive) -> IrId {
        if let Some(&id) = self.primitives.get(&primitive) {
            return id;
        }
        let id = self.ir.push(IrNode::Primitive { primitive });
        self.primitives.insert(primitive, id);
        id
    }

    fn is_opaque(&self, id: IrId) -> bool {
        matches!(
            self.ir.get(id),
            IrNode::Primitive {
                primitive: Primitive::Opaque
            }
        )
    }

    fn convert(&mut self, id: NodeId) -> Result<IrId, InvariantViolation> {
        if let Some(&ir) = self.memo.get(&id) {
            tracing::trace!(node = %id, "memo hit");
            return Ok(ir);
        }

        let oracle = self.oracle;
        let ir = match oracle.node(id) {
            TypeNode::Basic { basic } => self.basic(*basic),
            TypeNode::Named(named) => {
                self.scope.push((named.name.clone(), named.position.clone()));
                let result = self.named(id, named);
                self.scope.pop();
                return result;
            }
            TypeNode::Struct { .. } => {
                return Err(InvariantViolation::AnonymousStruct { site: self.site() });
            }
            TypeNode::Interface { .. } => {
                return Err(InvariantViolation::AnonymousInterface { site: self.site() });
            }
            TypeNode::Pointer { elem } => self.convert(*elem)?,
            TypeNode::Array { elem, len } => {
                let elem = self.convert(*elem)?;
                self.ir.push(IrNode::Container(Container::Array {
                    elem,
                    len: Length::Fixed(*len),
                }))
            }
            TypeNode::Slice { elem } => {
                let elem = self.convert(*elem)?;
                let array = self.ir.push(IrNode::Container(Container::Array {
                    elem,
                    len: Length::Dynamic,
                }));
                self.ir.push(IrNode::Nullable { inner: array })
            }
            TypeNode::Map { key, elem } => {
                let key = self.convert(*key)?;
                let elem = self.convert(*elem)?;
                let map = self.ir.push(IrNode::Container(Container::Map { key, elem }));
                self.ir.push(IrNode::Nullable { inner: map })
            }
            TypeNode::Unsupported { description } => {
                self.warn(format!("unsupported type {}, using opaque", description));
                self.primitive(Primitive::Opaque)
            }
        };

        self.memo.insert(id, ir);
        Ok(ir)
    }

    fn basic(&mut self, basic: BasicKind) -> IrId {
        let primitive = if basic.is_boolean() {
            Primitive::Boolean
        } else if basic.is_integer() {
            Primitive::Integer
        } else if basic.is_float() {
            Primitive::Float
        } else if basic.is_string() {
            Primitive::String
        } else {
            self.warn(format!("unsupported basic type {}, using opaque", basic.name()));
            Primitive::Opaque
        };
        self.primitive(primitive)
    }

    fn origin(named: &NamedType) -> Origin {
        Origin {
            package: named.package.clone(),
            name: named.name.clone(),
            position: named.position.clone(),
        }
    }

    fn named(&mut self, id: NodeId, named: &'a NamedType) -> Result<IrId, InvariantViolation> {
        let oracle = self.oracle;
        let underlying = oracle.node(named.underlying);

        if is_time(oracle, named) {
            let ir = self.primitive(Primitive::Time);
            self.memo.insert(id, ir);
            return Ok(ir);
        }
        if self.options.date_names.iter().any(|n| *n == named.name) {
            let ir = self.primitive(Primitive::Date);
            self.memo.insert(id, ir);
            return Ok(ir);
        }
        if let Some(source) = oracle.enums().get(&named.name) {
            let ir = self.ir.push(IrNode::Enum(enumeration(named, underlying, source)));
            self.memo.insert(id, ir);
            return Ok(ir);
        }

        match underlying {
            TypeNode::Interface { .. } => {
                let ir = if self.analyzer.is_interface(id) {
                    let ir = self.ir.push(IrNode::Union(Union {
                        name: named.name.clone(),
                        origin: Self::origin(named),
                        members: Vec::new(),
                    }));
                    self.unions.push((id, ir));
                    ir
                } else {
                    self.warn(format!(
                        "interface {} is not declared in this unit, using opaque",
                        named.qualified()
                    ));
                    self.primitive(Primitive::Opaque)
                };
                self.memo.insert(id, ir);
                Ok(ir)
            }
            TypeNode::Struct { fields } => {
                let ir = self.ir.push(IrNode::Record(Record {
                    name: named.name.clone(),
                    origin: Self::origin(named),
                    fields: Vec::new(),
                    declared: Vec::new(),
                    unions: Vec::new(),
                    directives: named.directives.clone(),
                }));
                self.memo.insert(id, ir);
                let slots = self.fields(fields)?;
                self.layouts.insert(ir, slots);
                Ok(ir)
            }
            _ => {
                // Self-reference until the underlying node exists.
                let ir = IrId(self.ir.len() as u32);
                self.ir.push(IrNode::Alias(Alias {
                    name: named.name.clone(),
                    origin: Self::origin(named),
                    underlying: ir,
                }));
                self.memo.insert(id, ir);

                let target = self.convert(named.underlying)?;
                if let IrNode::Alias(alias) = self.ir.get_mut(ir) {
                    alias.underlying = target;
                }
                Ok(ir)
            }
        }
    }

    fn fields(&mut self, fields: &'a [StructField]) -> Result<Vec<Slot>, InvariantViolation> {
        let oracle = self.oracle;
        let mut slots = Vec::with_capacity(fields.len());

        for field in fields {
            let name = match field_name(oracle, field, self.options.tag.as_deref()) {
                FieldName::Ignored => {
                    slots.push(Slot::Own {
                        exposed: None,
                        declared: DeclaredField::Discard {
                            source_name: field.name.clone(),
                        },
                    });
                    continue;
                }
                FieldName::Exposed(name) => name,
            };

            let ty = match oracle.field_tag(field, &self.options.extern_tag) {
                Some(import) => self.external(field, import),
                None => self.convert(field.ty)?,
            };

            let declared = if self.is_opaque(ty) {
                DeclaredField::Discard {
                    source_name: field.name.clone(),
                }
            } else {
                DeclaredField::Column {
                    source_name: field.name.clone(),
                    name: name.clone(),
                    ty,
                    exported: field.is_exported(),
                    tag: field.tag.clone(),
                }
            };
            let exposed = field.is_exported().then(|| Field {
                name,
                source_name: field.name.clone(),
                ty,
            });

            if field.embedded && self.ir.record(ty).is_some() {
                slots.push(Slot::Embed {
                    record: ty,
                    exposed,
                    declared,
                });
            } else {
                slots.push(Slot::Own { exposed, declared });
            }
        }
        Ok(slots)
    }

    /// Splice embedded records into their parents.
    fn flatten_records(&mut self) {
        let layouts = std::mem::take(&mut self.layouts);
        let mut ids: Vec<IrId> = layouts.keys().copied().collect();
        ids.sort();

        let mut done = HashMap::new();
        for &id in &ids {
            flatten(id, &layouts, &mut done, &mut HashSet::new());
        }
        for (id, (fields, declared)) in done {
            if let IrNode::Record(record) = self.ir.get_mut(id) {
                record.fields = fields;
                record.declared = declared;
            }
        }
    }

    /// A reference to hand-written code, named after the field's type.
    fn external(&mut self, field: &StructField, import: String) -> IrId {
        let name = type_name(self.oracle, field.ty).unwrap_or_else(|| field.name.clone());
        self.ir.push(IrNode::External(External { name, import }))
    }

    fn link_unions(&mut self) -> Result<(), InvariantViolation> {
        for (itf, ir) in std::mem::take(&mut self.unions) {
            let union_name = self.ir.get(ir).name().unwrap_or_default().to_string();
            let mut members = Vec::new();
            for candidate in self.analyzer.members(itf)? {
                let ty = *self.memo.get(&candidate.node).ok_or_else(|| {
                    InvariantViolation::MissingMember {
                        union: union_name.clone(),
                        member: candidate.name.clone(),
                    }
                })?;
                members.push(UnionMember {
                    ty,
                    name: candidate.name.clone(),
                    index: candidate.index,
                });
            }

            for member in &members {
                if let IrNode::Record(record) = self.ir.get_mut(member.ty) {
                    if !record.unions.contains(&union_name) {
                        record.unions.push(union_name.clone());
                        record.unions.sort();
                    }
                }
            }
            if let IrNode::Union(union) = self.ir.get_mut(ir) {
                union.members = members;
            }
        }
        Ok(())
    }
}

/// One declared field of a record before embeds are spliced.
enum Slot {
    Own {
        exposed: Option<Field>,
        declared: DeclaredField,
    },
    /// An embedded record; `exposed`/`declared` are used when embedding loops.
    Embed {
        record: IrId,
        exposed: Option<Field>,
        declared: DeclaredField,
    },
}

type Layout = (Vec<Field>, Vec<DeclaredField>);

/// Flattened layout of `id`, or `None` when `id` is already being flattened.
fn flatten(
    id: IrId,
    layouts: &HashMap<IrId, Vec<Slot>>,
    done: &mut HashMap<IrId, Layout>,
    stack: &mut HashSet<IrId>,
) -> Option<Layout> {
    if let Some(layout) = done.get(&id) {
        return Some(layout.clone());
    }
    let slots = layouts.get(&id)?;
    if !stack.insert(id) {
        return None;
    }

    let (mut fields, mut declared) = (Vec::new(), Vec::new());
    for slot in slots {
        let (exposed, own) = match slot {
            Slot::Embed { record, exposed, declared: own } => {
                match flatten(*record, layouts, done, stack) {
                    Some((inner_fields, inner_declared)) => {
                        fields.extend(inner_fields);
                        declared.extend(inner_declared);
                        continue;
                    }
                    None => (exposed, own),
                }
            }
            Slot::Own { exposed, declared: own } => (exposed, own),
        };
        fields.extend(exposed.iter().cloned());
        declared.push(own.clone());
    }

    stack.remove(&id);
    done.insert(id, (fields.clone(), declared.clone()));
    Some((fields, declared))
}

fn enumeration(named: &NamedType, underlying: &TypeNode, source: &EnumSource) -> Enum {
    let integer_backed = match underlying {
        TypeNode::Basic { basic } => basic.is_integer(),
        _ => source
            .values
            .iter()
            .all(|v| matches!(v.value, EnumLiteral::Int(_))),
    };
    let variants = source
        .values
        .iter()
        .filter(|v| is_exported_name(&v.var_name))
        .map(|v| EnumVariant {
            name: v.var_name.clone(),
            value: v.value.clone(),
            label: v.label.clone(),
        })
        .collect();
    Enum {
        name: named.name.clone(),
        origin: Engine::origin(named),
        integer_backed,
        variants,
    }
}

/// `time.Time`, or any named type laid out like it.
fn is_time(oracle: &dyn TypeOracle, named: &NamedType) -> bool {
    if named.package == "time" && named.name == "Time" {
        return true;
    }
    let TypeNode::Struct { fields } = oracle.node(named.underlying) else {
        return false;
    };
    let [wall, ext, loc] = fields.as_slice() else {
        return false;
    };
    let basic = |field: &StructField, kind: BasicKind| {
        matches!(oracle.node(field.ty), TypeNode::Basic { basic } if *basic == kind)
    };
    wall.name == "wall"
        && basic(wall, BasicKind::Uint64)
        && ext.name == "ext"
        && basic(ext, BasicKind::Int64)
        && loc.name == "loc"
        && matches!(oracle.node(loc.ty), TypeNode::Pointer { .. })
}

/// Name of the named type behind pointers.
fn type_name(oracle: &dyn TypeOracle, mut id: NodeId) -> Option<String> {
    loop {
        match oracle.node(id) {
            TypeNode::Pointer { elem } => id = *elem,
            TypeNode::Named(named) => return Some(named.name.clone()),
            _ => return None,
        }
    }
}
