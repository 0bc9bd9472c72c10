//! In-memory compilation unit.
//!
//! [`Unit`] is the oracle shipped with the crate. It is either deserialized
//! from the JSON dump produced by an external type checker or assembled with
//! [`UnitBuilder`].

use crate::error::OracleError;
use crate::oracle::{
    BasicKind, Directive, EnumLiteral, EnumSource, EnumTable, EnumValue, NamedType, NodeId,
    Position, StructField, TypeNode, TypeOracle,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

/// A validated type graph for one package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Unit {
    package: String,
    declarations: Vec<NodeId>,
    nodes: Vec<TypeNode>,
    #[serde(default, skip_serializing_if = "EnumTable::is_empty")]
    enums: EnumTable,
}

impl Unit {
    /// Parse and validate a JSON unit.
    pub fn from_json(source: &str) -> Result<Self, OracleError> {
        let unit: Unit = serde_json::from_str(source)?;
        unit.validate()?;
        Ok(unit)
    }

    /// Read a JSON unit from disk.
    pub fn load(path: &Path) -> Result<Self, OracleError> {
        let source = std::fs::read_to_string(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&source)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Find a top-level declaration by name.
    pub fn declaration(&self, name: &str) -> Option<NodeId> {
        self.declarations.iter().copied().find(|id| {
            self.nodes[id.index()]
                .as_named()
                .is_some_and(|named| named.name == name)
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn validate(&self) -> Result<(), OracleError> {
        for (index, node) in self.nodes.iter().enumerate() {
            let from = NodeId(index as u32);
            for child in node.children() {
                if child.index() >= self.nodes.len() {
                    return Err(OracleError::DanglingNode {
                        from,
                        missing: child,
                    });
                }
            }
        }
        self.check_cycles()?;

        let mut names = HashSet::new();
        for &id in &self.declarations {
            let node = self
                .nodes
                .get(id.index())
                .ok_or(OracleError::DanglingNode {
                    from: id,
                    missing: id,
                })?;
            let named = node
                .as_named()
                .ok_or(OracleError::NotNamed(id, node.kind_name()))?;
            if !names.insert(named.name.as_str()) {
                return Err(OracleError::DuplicateDeclaration(named.name.clone()));
            }
        }
        Ok(())
    }

    /// Every cycle in the graph must pass through a named node.
    fn check_cycles(&self) -> Result<(), OracleError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Open,
            Done,
        }

        let is_named = |index: usize| self.nodes[index].as_named().is_some();
        let mut marks = vec![Mark::New; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if marks[start] != Mark::New || is_named(start) {
                continue;
            }
            marks[start] = Mark::Open;
            let mut stack = vec![(start, self.nodes[start].children())];
            while let Some((index, children)) = stack.last_mut() {
                let Some(child) = children.pop() else {
                    marks[*index] = Mark::Done;
                    stack.pop();
                    continue;
                };
                let next = child.index();
                if is_named(next) {
                    continue;
                }
                match marks[next] {
                    Mark::Open => return Err(OracleError::UnnamedCycle(child)),
                    Mark::Done => {}
                    Mark::New => {
                        marks[next] = Mark::Open;
                        stack.push((next, self.nodes[next].children()));
                    }
                }
            }
        }
        Ok(())
    }
}

impl TypeOracle for Unit {
    fn package(&self) -> &str {
        &self.package
    }

    fn declarations(&self) -> &[NodeId] {
        &self.declarations
    }

    fn node(&self, id: NodeId) -> &TypeNode {
        &self.nodes[id.index()]
    }

    fn enums(&self) -> &EnumTable {
        &self.enums
    }
}

/// Programmatic construction of a [`Unit`].
///
/// Self-referential types are declared first and defined once their
/// underlying shape exists:
///
/// ```
/// use typeweave::input::UnitBuilder;
/// use typeweave::oracle::StructField;
///
/// let mut b = UnitBuilder::new("tree");
/// let node = b.declare("Node");
/// let children = b.slice(node);
/// let shape = b.structure(vec![StructField::new("Children", children)]);
/// b.define(node, shape);
/// let unit = b.build().unwrap();
/// assert_eq!(unit.declaration("Node"), Some(node));
/// ```
#[derive(Debug, Default)]
pub struct UnitBuilder {
    package: String,
    nodes: Vec<Option<TypeNode>>,
    pending: HashMap<NodeId, (String, String)>,
    declarations: Vec<NodeId>,
    basics: HashMap<BasicKind, NodeId>,
    enums: EnumTable,
    time: Option<NodeId>,
}

impl UnitBuilder {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Default::default()
        }
    }

    fn push(&mut self, node: TypeNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        id
    }

    pub fn basic(&mut self, kind: BasicKind) -> NodeId {
        if let Some(&id) = self.basics.get(&kind) {
            return id;
        }
        let id = self.push(TypeNode::Basic { basic: kind });
        self.basics.insert(kind, id);
        id
    }

    pub fn structure(&mut self, fields: Vec<StructField>) -> NodeId {
        self.push(TypeNode::Struct { fields })
    }

    pub fn pointer(&mut self, elem: NodeId) -> NodeId {
        self.push(TypeNode::Pointer { elem })
    }

    pub fn array(&mut self, elem: NodeId, len: u64) -> NodeId {
        self.push(TypeNode::Array { elem, len })
    }

    pub fn slice(&mut self, elem: NodeId) -> NodeId {
        self.push(TypeNode::Slice { elem })
    }

    pub fn map(&mut self, key: NodeId, elem: NodeId) -> NodeId {
        self.push(TypeNode::Map { key, elem })
    }

    pub fn interface(&mut self, methods: &[&str]) -> NodeId {
        self.push(TypeNode::Interface {
            methods: methods.iter().map(|m| m.to_string()).collect(),
        })
    }

    pub fn unsupported(&mut self, description: impl Into<String>) -> NodeId {
        self.push(TypeNode::Unsupported {
            description: description.into(),
        })
    }

    /// Reserve a top-level named type; its shape comes later via [`define`](Self::define).
    pub fn declare(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(None);
        let package = self.package.clone();
        self.pending.insert(id, (package, name.into()));
        self.declarations.push(id);
        id
    }

    pub fn define(&mut self, named: NodeId, underlying: NodeId) -> &mut Self {
        if let Some((package, name)) = self.pending.remove(&named) {
            self.nodes[named.index()] = Some(TypeNode::Named(NamedType {
                name,
                package,
                underlying,
                methods: BTreeSet::new(),
                position: None,
                directives: Vec::new(),
            }));
        }
        self
    }

    /// Declare and define a top-level named type in one step.
    pub fn named(&mut self, name: impl Into<String>, underlying: NodeId) -> NodeId {
        let id = self.declare(name);
        self.define(id, underlying);
        id
    }

    /// A named type from another package. Not part of the unit's declarations.
    pub fn foreign(
        &mut self,
        package: impl Into<String>,
        name: impl Into<String>,
        underlying: NodeId,
    ) -> NodeId {
        self.push(TypeNode::Named(NamedType {
            name: name.into(),
            package: package.into(),
            underlying,
            methods: BTreeSet::new(),
            position: None,
            directives: Vec::new(),
        }))
    }

    fn named_mut(&mut self, id: NodeId) -> Option<&mut NamedType> {
        match self.nodes.get_mut(id.index()) {
            Some(Some(TypeNode::Named(named))) => Some(named),
            _ => None,
        }
    }

    /// Attach a method to a defined named type.
    pub fn method(&mut self, named: NodeId, method: impl Into<String>) -> &mut Self {
        if let Some(named) = self.named_mut(named) {
            named.methods.insert(method.into());
        }
        self
    }

    pub fn position(&mut self, named: NodeId, file: impl Into<String>, line: u32) -> &mut Self {
        if let Some(named) = self.named_mut(named) {
            named.position = Some(Position {
                file: file.into(),
                line,
            });
        }
        self
    }

    /// Attach a `// tag:content` directive to a defined named type.
    pub fn directive(
        &mut self,
        named: NodeId,
        tag: impl Into<String>,
        content: impl Into<String>,
    ) -> &mut Self {
        if let Some(named) = self.named_mut(named) {
            named.directives.push(Directive {
                tag: tag.into(),
                content: content.into(),
            });
        }
        self
    }

    /// Register enumeration constants `(var_name, value, label)` for a type name.
    pub fn enumeration<'a>(
        &mut self,
        type_name: impl Into<String>,
        values: impl IntoIterator<Item = (&'a str, EnumLiteral, &'a str)>,
    ) -> &mut Self {
        let source = self.enums.entry(type_name.into()).or_insert_with(EnumSource::default);
        source
            .values
            .extend(values.into_iter().map(|(var_name, value, label)| EnumValue {
                var_name: var_name.to_string(),
                value,
                label: label.to_string(),
            }));
        self
    }

    /// The standard library's calendar time type.
    pub fn time(&mut self) -> NodeId {
        if let Some(id) = self.time {
            return id;
        }
        let empty = self.structure(Vec::new());
        let location = self.foreign("time", "Location", empty);
        let wall = self.basic(BasicKind::Uint64);
        let ext = self.basic(BasicKind::Int64);
        let loc = self.pointer(location);
        let shape = self.structure(vec![
            StructField::new("wall", wall),
            StructField::new("ext", ext),
            StructField::new("loc", loc),
        ]);
        let id = self.foreign("time", "Time", shape);
        self.time = Some(id);
        id
    }

    pub fn build(self) -> Result<Unit, OracleError> {
        if let Some(id) = self.declarations.iter().find(|id| self.pending.contains_key(id)) {
            let (_, name) = &self.pending[id];
            return Err(OracleError::Undefined(name.clone()));
        }
        let nodes = self.nodes.into_iter().flatten().collect();
        let unit = Unit {
            package: self.package,
            declarations: self.declarations,
            nodes,
            enums: self.enums,
        };
        unit.validate()?;
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{FieldName, field_name};

    fn point_unit() -> Unit {
        let mut b = UnitBuilder::new("geo");
        let int = b.basic(BasicKind::Int);
        let shape = b.structure(vec![StructField::new("X", int), StructField::new("Y", int)]);
        b.named("Point", shape);
        b.build().unwrap()
    }

    #[test]
    fn test_builder_shares_basics() {
        let mut b = UnitBuilder::new("p");
        assert_eq!(b.basic(BasicKind::Int), b.basic(BasicKind::Int));
        assert_ne!(b.basic(BasicKind::Int), b.basic(BasicKind::String));
    }

    #[test]
    fn test_undefined_declaration() {
        let mut b = UnitBuilder::new("p");
        b.declare("Ghost");
        let err = b.build().unwrap_err();
        assert!(matches!(err, OracleError::Undefined(name) if name == "Ghost"));
    }

    #[test]
    fn test_json_round_trip() {
        let unit = point_unit();
        let reloaded = Unit::from_json(&unit.to_json()).unwrap();
        assert_eq!(reloaded.package(), "geo");
        assert_eq!(reloaded.declarations().len(), 1);
        assert!(reloaded.declaration("Point").is_some());
    }

    #[test]
    fn test_dangling_node_rejected() {
        let source = r#"{
            "package": "p",
            "declarations": [1],
            "nodes": [
                {"kind": "slice", "elem": 7},
                {"kind": "named", "name": "L", "underlying": 0}
            ]
        }"#;
        let err = Unit::from_json(source).unwrap_err();
        assert!(matches!(
            err,
            OracleError::DanglingNode {
                from: NodeId(0),
                missing: NodeId(7)
            }
        ));
    }

    #[test]
    fn test_unnamed_cycle_rejected() {
        let source = r#"{
            "package": "p",
            "declarations": [],
            "nodes": [
                {"kind": "slice", "elem": 1},
                {"kind": "pointer", "elem": 0}
            ]
        }"#;
        let err = Unit::from_json(source).unwrap_err();
        assert!(matches!(err, OracleError::UnnamedCycle(_)));

        let self_loop = r#"{
            "package": "p",
            "declarations": [],
            "nodes": [{"kind": "pointer", "elem": 0}]
        }"#;
        let err = Unit::from_json(self_loop).unwrap_err();
        assert!(matches!(err, OracleError::UnnamedCycle(NodeId(0))));
    }

    #[test]
    fn test_cycle_through_named_type_accepted() {
        let source = r#"{
            "package": "p",
            "declarations": [0],
            "nodes": [
                {"kind": "named", "name": "List", "underlying": 1},
                {"kind": "slice", "elem": 0}
            ]
        }"#;
        let unit = Unit::from_json(source).unwrap();
        assert!(unit.declaration("List").is_some());
    }

    #[test]
    fn test_declaration_must_be_named() {
        let source = r#"{
            "package": "p",
            "declarations": [0],
            "nodes": [{"kind": "basic", "basic": "int"}]
        }"#;
        let err = Unit::from_json(source).unwrap_err();
        assert!(matches!(err, OracleError::NotNamed(NodeId(0), "basic")));
    }

    #[test]
    fn test_field_name_chain() {
        let unit = point_unit();
        let int = NodeId(0);
        let plain = StructField::new("Count", int);
        let json = StructField::new("Count", int).tag(r#"json:"count,omitempty""#);
        let both = StructField::new("Count", int).tag(r#"json:"count" ts:"total""#);
        let ignored = StructField::new("Count", int).tag(r#"json:"-""#);
        let options_only = StructField::new("Count", int).tag(r#"ts:",omitempty" json:"c""#);

        assert_eq!(
            field_name(&unit, &plain, Some("ts")),
            FieldName::Exposed("Count".into())
        );
        assert_eq!(
            field_name(&unit, &json, Some("ts")),
            FieldName::Exposed("count".into())
        );
        assert_eq!(
            field_name(&unit, &both, Some("ts")),
            FieldName::Exposed("total".into())
        );
        assert_eq!(
            field_name(&unit, &both, None),
            FieldName::Exposed("count".into())
        );
        assert_eq!(field_name(&unit, &ignored, Some("ts")), FieldName::Ignored);
        assert_eq!(
            field_name(&unit, &options_only, Some("ts")),
            FieldName::Exposed("Count".into())
        );
    }

    #[test]
    fn test_satisfies_method_sets() {
        let mut b = UnitBuilder::new("shapes");
        let itf = b.interface(&["isShape"]);
        let shape = b.named("Shape", itf);
        let empty = b.structure(Vec::new());
        let circle = b.named("Circle", empty);
        b.method(circle, "isShape").method(circle, "Area");
        let line = b.named("Line", empty);
        let unit = b.build().unwrap();

        assert!(unit.satisfies(circle, shape));
        assert!(!unit.satisfies(line, shape));
        assert!(unit.satisfies(shape, shape));
    }
}
