//! Structural interface resolution.
//!
//! Unions are declared as named interfaces; their members are the named types
//! of the same unit whose method set contains the interface's. Members may be
//! declared after the interface, so the analyzer works in two phases:
//! [`register`](InterfaceAnalyzer::register) every top-level declaration, then
//! [`resolve`](InterfaceAnalyzer::resolve) once the whole unit has been seen.

use crate::error::InvariantViolation;
use crate::oracle::{NodeId, TypeNode, TypeOracle};
use std::collections::{BTreeMap, BTreeSet};

/// Precomputed method-name set of a named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub name: String,
    pub methods: BTreeSet<String>,
}

impl Capability {
    /// Whether `self` provides every method `required` asks for.
    pub fn covers(&self, required: &Capability) -> bool {
        required.methods.is_subset(&self.methods)
    }
}

/// A resolved union member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub node: NodeId,
    pub name: String,
    pub index: u32,
}

#[derive(Debug, Default)]
pub struct InterfaceAnalyzer {
    interfaces: BTreeMap<NodeId, Capability>,
    members: BTreeMap<NodeId, Capability>,
    resolved: Option<BTreeMap<NodeId, Vec<Candidate>>>,
}

impl InterfaceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a top-level declaration as interface or member candidate.
    /// Anything that is not a named type is ignored.
    pub fn register(&mut self, oracle: &dyn TypeOracle, id: NodeId) -> Result<(), InvariantViolation> {
        let Some(named) = oracle.node(id).as_named() else {
            return Ok(());
        };
        if self.resolved.is_some() {
            return Err(InvariantViolation::LateRegistration(named.name.clone()));
        }

        let capability = Capability {
            name: named.name.clone(),
            methods: oracle.method_set(id),
        };
        if matches!(oracle.node(named.underlying), TypeNode::Interface { .. }) {
            self.interfaces.insert(id, capability);
        } else {
            self.members.insert(id, capability);
        }
        Ok(())
    }

    pub fn is_interface(&self, id: NodeId) -> bool {
        self.interfaces.contains_key(&id)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Match every interface against every member candidate.
    pub fn resolve(&mut self) {
        let mut resolved = BTreeMap::new();
        for (&itf, required) in &self.interfaces {
            let mut matches: Vec<(&str, NodeId)> = self
                .members
                .iter()
                .filter(|(_, provided)| provided.covers(required))
                .map(|(&node, provided)| (provided.name.as_str(), node))
                .collect();
            matches.sort();

            let candidates: Vec<Candidate> = matches
                .into_iter()
                .enumerate()
                .map(|(index, (name, node))| Candidate {
                    node,
                    name: name.to_string(),
                    index: index as u32,
                })
                .collect();
            tracing::debug!(
                union = %required.name,
                members = candidates.len(),
                "resolved union"
            );
            resolved.insert(itf, candidates);
        }
        self.resolved = Some(resolved);
    }

    /// Members of a registered interface, sorted by name.
    pub fn members(&self, itf: NodeId) -> Result<&[Candidate], InvariantViolation> {
        self.resolved
            .as_ref()
            .and_then(|resolved| resolved.get(&itf))
            .map(Vec::as_slice)
            .ok_or_else(|| {
                let name = self
                    .interfaces
                    .get(&itf)
                    .map_or_else(|| itf.to_string(), |c| c.name.clone());
                InvariantViolation::PrematureResolution(name)
            })
    }

    /// Names of the interfaces `member` belongs to, sorted.
    pub fn implementations(&self, member: NodeId) -> Vec<&str> {
        let Some(resolved) = &self.resolved else {
            return Vec::new();
        };
        let mut names: Vec<&str> = resolved
            .iter()
            .filter(|(_, candidates)| candidates.iter().any(|c| c.node == member))
            .map(|(itf, _)| self.interfaces[itf].name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Registered interfaces, sorted by name.
    pub fn interfaces(&self) -> Vec<(NodeId, &Capability)> {
        let mut out: Vec<_> = self.interfaces.iter().map(|(&id, c)| (id, c)).collect();
        out.sort_by(|a, b| a.1.name.cmp(&b.1.name));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::UnitBuilder;

    #[test]
    fn test_forward_declared_members() {
        let mut b = UnitBuilder::new("shapes");
        let itf = b.interface(&["isShape"]);
        let shape = b.named("Shape", itf);
        let empty = b.structure(Vec::new());
        let square = b.named("Square", empty);
        let circle = b.named("Circle", empty);
        let line = b.named("Line", empty);
        b.method(square, "isShape").method(circle, "isShape");
        let unit = b.build().unwrap();

        let mut analyzer = InterfaceAnalyzer::new();
        for &id in unit.declarations() {
            analyzer.register(&unit, id).unwrap();
        }
        assert!(analyzer.members(shape).is_err());
        analyzer.resolve();

        let members = analyzer.members(shape).unwrap();
        let names: Vec<_> = members.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Circle", "Square"]);
        assert_eq!(members[0].index, 0);
        assert_eq!(members[1].index, 1);
        assert_eq!(analyzer.implementations(circle), ["Shape"]);
        assert!(analyzer.implementations(line).is_empty());
    }

    #[test]
    fn test_premature_query_names_the_union() {
        let mut b = UnitBuilder::new("p");
        let itf = b.interface(&["m"]);
        let event = b.named("Event", itf);
        let unit = b.build().unwrap();

        let mut analyzer = InterfaceAnalyzer::new();
        analyzer.register(&unit, event).unwrap();
        let err = analyzer.members(event).unwrap_err();
        assert!(matches!(err, InvariantViolation::PrematureResolution(name) if name == "Event"));
    }

    #[test]
    fn test_registration_after_resolution() {
        let mut b = UnitBuilder::new("p");
        let int = b.basic(crate::oracle::BasicKind::Int);
        let id = b.named("Id", int);
        let unit = b.build().unwrap();

        let mut analyzer = InterfaceAnalyzer::new();
        analyzer.resolve();
        assert!(matches!(
            analyzer.register(&unit, id),
            Err(InvariantViolation::LateRegistration(_))
        ));
    }
}
