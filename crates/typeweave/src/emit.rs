//! Render driver shared by all backends.
//!
//! The driver walks the IR from the conversion roots, dependencies first, and
//! hands each node to a [`Dialect`] for its declarations. A seen-set stops
//! the walk on back edges and the [`DeclarationRegistry`] collapses blocks
//! reached through several paths, so cyclic and shared graphs render once.

use crate::convert::Conversion;
use crate::declarations::{Declaration, DeclarationRegistry};
use crate::error::InvariantViolation;
use crate::ir::IrId;
use std::collections::HashSet;

/// Target-language spelling of IR nodes.
pub trait Dialect {
    /// How the node is written wherever it is referenced.
    fn reference(&self, conversion: &Conversion, id: IrId) -> String;

    /// Declarations the node contributes by itself. Referenced nodes are
    /// visited separately.
    fn declare(&self, conversion: &Conversion, id: IrId, out: &mut Vec<Declaration>);

    /// Nodes the walk starts from. Defaults to every top-level declaration.
    fn roots(&self, conversion: &Conversion) -> Vec<IrId> {
        conversion.roots.iter().map(|r| r.node).collect()
    }

    fn header(&self, _conversion: &Conversion, _registry: &DeclarationRegistry) -> String {
        String::new()
    }

    fn footer(&self, _conversion: &Conversion, _registry: &DeclarationRegistry) -> String {
        String::new()
    }
}

/// Serialization bodies for interchange backends.
///
/// Both return an expression converting `value`, itself an expression.
pub trait Codec: Dialect {
    fn encoder(&self, conversion: &Conversion, id: IrId, value: &str) -> String;

    fn decoder(&self, conversion: &Conversion, id: IrId, value: &str) -> String;
}

/// Collect every declaration reachable from the dialect's roots.
pub fn declarations(
    dialect: &dyn Dialect,
    conversion: &Conversion,
) -> Result<DeclarationRegistry, InvariantViolation> {
    let mut registry = DeclarationRegistry::new();
    let mut seen = HashSet::new();
    for root in dialect.roots(conversion) {
        visit(dialect, conversion, root, &mut seen, &mut registry)?;
    }
    Ok(registry)
}

fn visit(
    dialect: &dyn Dialect,
    conversion: &Conversion,
    id: IrId,
    seen: &mut HashSet<IrId>,
    registry: &mut DeclarationRegistry,
) -> Result<(), InvariantViolation> {
    if !seen.insert(id) {
        return Ok(());
    }
    for child in conversion.ir.children(id) {
        visit(dialect, conversion, child, seen, registry)?;
    }

    let mut own = Vec::new();
    dialect.declare(conversion, id, &mut own);
    for declaration in own {
        registry.add(declaration)?;
    }
    Ok(())
}

/// Header, every declaration in registry order, footer.
pub fn render(dialect: &dyn Dialect, conversion: &Conversion) -> Result<String, InvariantViolation> {
    let registry = declarations(dialect, conversion)?;
    let mut out = dialect.header(conversion, &registry);
    out.push_str(&registry.render());
    out.push_str(&dialect.footer(conversion, &registry));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConvertOptions, convert_unit};
    use crate::input::UnitBuilder;
    use crate::ir::{Container, IrNode};
    use crate::oracle::{BasicKind, StructField};

    /// Declares every record as `name -> [field element types]`.
    struct Outline;

    fn element(conversion: &Conversion, mut id: IrId) -> IrId {
        loop {
            match &conversion.ir[id] {
                IrNode::Nullable { inner } => id = *inner,
                IrNode::Container(Container::Array { elem, .. }) => id = *elem,
                _ => return id,
            }
        }
    }

    impl Dialect for Outline {
        fn reference(&self, conversion: &Conversion, id: IrId) -> String {
            conversion.ir[id]
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("_{}", id.0))
        }

        fn declare(&self, conversion: &Conversion, id: IrId, out: &mut Vec<Declaration>) {
            if let IrNode::Record(record) = &conversion.ir[id] {
                let fields: Vec<_> = record
                    .fields
                    .iter()
                    .map(|f| self.reference(conversion, element(conversion, f.ty)))
                    .collect();
                out.push(Declaration::new(
                    record.name.clone(),
                    format!("{} -> [{}]", record.name, fields.join(", ")),
                ));
            }
        }

        fn header(&self, _: &Conversion, registry: &DeclarationRegistry) -> String {
            format!("# {}\n", registry.len())
        }
    }

    #[test]
    fn test_dependencies_first_and_cycles_terminate() {
        let mut b = UnitBuilder::new("p");
        let int = b.basic(BasicKind::Int);
        let node = b.declare("Node");
        let children = b.slice(node);
        let leaf_shape = b.structure(vec![StructField::new("N", int)]);
        let leaf = b.declare("Leaf");
        let shape = b.structure(vec![
            StructField::new("Children", children),
            StructField::new("Leaf", leaf),
        ]);
        b.define(node, shape);
        b.define(leaf, leaf_shape);
        let unit = b.build().unwrap();

        let conversion = convert_unit(&unit, &ConvertOptions::default()).unwrap();
        let out = render(&Outline, &conversion).unwrap();
        assert_eq!(out, "# 2\nLeaf -> [_4]\nNode -> [Node, Leaf]\n");
    }
}
