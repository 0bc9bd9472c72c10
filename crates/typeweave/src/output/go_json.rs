//! Go JSON support for interface-typed values.
//!
//! `encoding/json` cannot decode into an interface, so every union gets a
//! `<Union>Wrapper` carrying the member name next to the payload:
//! `{"Kind": "Circle", "Data": {...}}`. Records holding a union field and
//! named slices of a union get `MarshalJSON`/`UnmarshalJSON` methods going
//! through the wrapper.

use crate::config::Config;
use crate::convert::Conversion;
use crate::declarations::{Declaration, DeclarationRegistry};
use crate::emit::{self, Codec, Dialect};
use crate::error::{Error, InvariantViolation};
use crate::ir::{Alias, Container, IrId, IrNode, Length, Record, Union};
use crate::output::{GoOptions, go_reference, quoted};
use crate::traits::{Backend, BackendCategory};
use std::fmt::Write;

/// Static instance of the Go JSON backend for registry.
pub static GO_JSON_BACKEND: GoJsonBackend = GoJsonBackend;

/// Go JSON backend implementing the Backend trait.
pub struct GoJsonBackend;

impl Backend for GoJsonBackend {
    fn name(&self) -> &'static str {
        "go-json"
    }

    fn language(&self) -> &'static str {
        "go"
    }

    fn extension(&self) -> &'static str {
        "go"
    }

    fn category(&self) -> BackendCategory {
        BackendCategory::Codecs
    }

    fn tag(&self) -> Option<&'static str> {
        Some("json")
    }

    fn generate(&self, conversion: &Conversion, config: &Config) -> Result<String, Error> {
        Ok(generate_go_json(conversion, &config.go)?)
    }
}

/// Render the JSON helpers for the unions of a conversion.
pub fn generate_go_json(
    conversion: &Conversion,
    options: &GoOptions,
) -> Result<String, InvariantViolation> {
    emit::render(&GoJson { options }, conversion)
}

struct GoJson<'a> {
    options: &'a GoOptions,
}

impl GoJson<'_> {
    fn is_local(conversion: &Conversion, id: IrId) -> bool {
        conversion.ir[id]
            .origin()
            .is_some_and(|o| o.package == conversion.package)
    }

    fn kind_const(member: &str, union: &str) -> String {
        format!("{}{}Kind", member, union)
    }

    fn union(&self, conversion: &Conversion, union: &Union) -> String {
        let name = &union.name;
        let wrapper = format!("{}Wrapper", name);

        let mut code = format!(
            "// {wrapper} may be used as replacements for {name}\n// when working with JSON\ntype {wrapper} struct {{\n\tData {name}\n}}\n\n"
        );

        writeln!(code, "func (out *{}) UnmarshalJSON(src []byte) error {{", wrapper).unwrap();
        code.push_str("\tif string(src) == \"null\" {\n\t\treturn nil\n\t}\n");
        code.push_str("\tvar wr struct {\n\t\tKind string\n\t\tData json.RawMessage\n\t}\n");
        code.push_str("\terr := json.Unmarshal(src, &wr)\n\tif err != nil {\n\t\treturn err\n\t}\n");
        code.push_str("\tswitch wr.Kind {\n");
        for member in &union.members {
            writeln!(code, "\tcase {}:", Self::kind_const(&member.name, name)).unwrap();
            writeln!(code, "\t\tvar data {}", go_reference(conversion, member.ty)).unwrap();
            code.push_str("\t\terr = json.Unmarshal(wr.Data, &data)\n");
            code.push_str("\t\tout.Data = data\n");
        }
        code.push_str("\tdefault:\n\t\tpanic(\"exhaustive switch\")\n\t}\n\treturn err\n}\n\n");

        writeln!(code, "func (item {}) MarshalJSON() ([]byte, error) {{", wrapper).unwrap();
        code.push_str("\ttype wrapper struct {\n\t\tData interface{}\n\t\tKind string\n\t}\n");
        code.push_str("\tvar wr wrapper\n");
        if union.members.is_empty() {
            code.push_str("\tswitch item.Data.(type) {\n");
        } else {
            code.push_str("\tswitch data := item.Data.(type) {\n");
        }
        for member in &union.members {
            writeln!(code, "\tcase {}:", go_reference(conversion, member.ty)).unwrap();
            writeln!(
                code,
                "\t\twr = wrapper{{Kind: {}, Data: data}}",
                Self::kind_const(&member.name, name)
            )
            .unwrap();
        }
        code.push_str("\tcase nil:\n\t\treturn []byte(\"null\"), nil\n");
        code.push_str("\tdefault:\n\t\tpanic(\"exhaustive switch\")\n\t}\n");
        code.push_str("\treturn json.Marshal(wr)\n}\n\n");

        code.push_str("const (\n");
        for member in &union.members {
            writeln!(
                code,
                "\t{} = {}",
                Self::kind_const(&member.name, name),
                quoted(&member.name)
            )
            .unwrap();
        }
        code.push_str(")\n");
        code
    }

    /// Methods shadowing the union fields of a record with their wrapper.
    fn record(&self, conversion: &Conversion, record: &Record) -> Option<String> {
        let wrapped: Vec<_> = record
            .fields
            .iter()
            .filter(|f| conversion.ir.union(f.ty).is_some())
            .collect();
        if wrapped.is_empty() {
            return None;
        }

        let name = &record.name;
        let mut shadow = String::new();
        for field in &wrapped {
            writeln!(
                shadow,
                "\t\t{} {}Wrapper `json:{}`",
                field.source_name,
                go_reference(conversion, field.ty),
                quoted(&field.name)
            )
            .unwrap();
        }

        let mut code = format!("func (item {}) MarshalJSON() ([]byte, error) {{\n", name);
        writeln!(code, "\ttype alias {}", name).unwrap();
        code.push_str("\twr := struct {\n\t\talias\n");
        code.push_str(&shadow);
        code.push_str("\t}{\n\t\talias: alias(item),\n");
        for field in &wrapped {
            let access = format!("item.{}", field.source_name);
            writeln!(
                code,
                "\t\t{}: {},",
                field.source_name,
                self.encoder(conversion, field.ty, &access)
            )
            .unwrap();
        }
        code.push_str("\t}\n\treturn json.Marshal(wr)\n}\n\n");

        writeln!(code, "func (item *{}) UnmarshalJSON(src []byte) error {{", name).unwrap();
        writeln!(code, "\ttype alias {}", name).unwrap();
        code.push_str("\tvar wr struct {\n\t\t*alias\n");
        code.push_str(&shadow);
        code.push_str("\t}\n\twr.alias = (*alias)(item)\n");
        code.push_str("\tif err := json.Unmarshal(src, &wr); err != nil {\n\t\treturn err\n\t}\n");
        for field in &wrapped {
            let access = format!("wr.{}", field.source_name);
            writeln!(
                code,
                "\titem.{} = {}",
                field.source_name,
                self.decoder(conversion, field.ty, &access)
            )
            .unwrap();
        }
        code.push_str("\treturn nil\n}\n");
        Some(code)
    }

    /// Methods for `type Shapes []Shape`.
    fn union_slice(&self, conversion: &Conversion, alias: &Alias) -> Option<String> {
        let IrNode::Container(Container::Array {
            elem,
            len: Length::Dynamic,
        }) = &conversion.ir[conversion.ir.resolve(alias.underlying)]
        else {
            return None;
        };
        let union = conversion.ir.union(*elem)?;
        let (name, member) = (&alias.name, &union.name);
        Some(format!(
            "func (ct {name}) MarshalJSON() ([]byte, error) {{
\ttmp := make([]{member}Wrapper, len(ct))
\tfor i, v := range ct {{
\t\ttmp[i].Data = v
\t}}
\treturn json.Marshal(tmp)
}}

func (ct *{name}) UnmarshalJSON(data []byte) error {{
\tvar tmp []{member}Wrapper
\terr := json.Unmarshal(data, &tmp)
\t*ct = make({name}, len(tmp))
\tfor i, v := range tmp {{
\t\t(*ct)[i] = v.Data
\t}}
\treturn err
}}
"
        ))
    }
}

impl Dialect for GoJson<'_> {
    fn reference(&self, conversion: &Conversion, id: IrId) -> String {
        go_reference(conversion, id)
    }

    fn declare(&self, conversion: &Conversion, id: IrId, out: &mut Vec<Declaration>) {
        match &conversion.ir[id] {
            IrNode::Union(union) => {
                out.push(Declaration::new(
                    format!("{}Wrapper", union.name),
                    self.union(conversion, union),
                ));
            }
            IrNode::Record(record) if Self::is_local(conversion, id) => {
                if let Some(code) = self.record(conversion, record) {
                    out.push(Declaration::new(format!("{}_json", record.name), code));
                }
            }
            IrNode::Alias(alias) if Self::is_local(conversion, id) => {
                if let Some(code) = self.union_slice(conversion, alias) {
                    out.push(Declaration::new(format!("{}_json", alias.name), code));
                }
            }
            _ => {}
        }
    }

    fn header(&self, conversion: &Conversion, registry: &DeclarationRegistry) -> String {
        let mut out = String::from("// Code generated by typeweave. DO NOT EDIT.\n\n");
        writeln!(out, "package {}\n", self.options.package_name(&conversion.package)).unwrap();
        if !registry.is_empty() {
            out.push_str("import \"encoding/json\"\n\n");
        }
        out
    }
}

impl Codec for GoJson<'_> {
    fn encoder(&self, conversion: &Conversion, id: IrId, value: &str) -> String {
        match conversion.ir.union(id) {
            Some(union) => format!("{}Wrapper{{{}}}", union.name, value),
            None => value.to_string(),
        }
    }

    fn decoder(&self, conversion: &Conversion, id: IrId, value: &str) -> String {
        match conversion.ir.union(id) {
            Some(_) => format!("{}.Data", value),
            None => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConvertOptions, convert_unit};
    use crate::input::{Unit, UnitBuilder};
    use crate::oracle::{BasicKind, StructField};

    fn render(unit: &Unit) -> String {
        let conversion =
            convert_unit(unit, &ConvertOptions::default().with_tag(Some("json"))).unwrap();
        generate_go_json(&conversion, &GoOptions::default()).unwrap()
    }

    fn shapes() -> UnitBuilder {
        let mut b = UnitBuilder::new("example.com/geo");
        let methods = b.interface(&["isShape"]);
        let shape = b.named("Shape", methods);
        let float = b.basic(BasicKind::Float64);
        let circle_shape = b.structure(vec![StructField::new("R", float)]);
        let circle = b.named("Circle", circle_shape);
        b.method(circle, "isShape");
        let square_shape = b.structure(vec![StructField::new("Side", float)]);
        let square = b.named("Square", square_shape);
        b.method(square, "isShape");
        let list = b.slice(shape);
        b.named("Shapes", list);
        let text = b.basic(BasicKind::String);
        let drawing = b.structure(vec![
            StructField::new("Title", text).tag(r#"json:"title""#),
            StructField::new("Main", shape).tag(r#"json:"main""#),
        ]);
        b.named("Drawing", drawing);
        b
    }

    #[test]
    fn test_union_wrapper() {
        let out = render(&shapes().build().unwrap());
        assert!(out.starts_with(
            "// Code generated by typeweave. DO NOT EDIT.\n\npackage geo\n\nimport \"encoding/json\"\n\n"
        ));
        assert!(out.contains("type ShapeWrapper struct {\n\tData Shape\n}\n"));
        assert!(out.contains(
            "\tcase CircleShapeKind:\n\t\tvar data Circle\n\t\terr = json.Unmarshal(wr.Data, &data)\n\t\tout.Data = data\n"
        ));
        assert!(out.contains("\tcase Square:\n\t\twr = wrapper{Kind: SquareShapeKind, Data: data}\n"));
        assert!(out.contains("const (\n\tCircleShapeKind = \"Circle\"\n\tSquareShapeKind = \"Square\"\n)\n"));
        assert_eq!(out.matches("panic(\"exhaustive switch\")").count(), 2);
    }

    #[test]
    fn test_record_with_union_field() {
        let out = render(&shapes().build().unwrap());
        assert!(out.contains("func (item Drawing) MarshalJSON() ([]byte, error) {\n\ttype alias Drawing\n"));
        assert!(out.contains("\t\tMain ShapeWrapper `json:\"main\"`\n"));
        assert!(out.contains("\t\tMain: ShapeWrapper{item.Main},\n"));
        assert!(out.contains("\titem.Main = wr.Main.Data\n"));
        assert!(!out.contains("Title ShapeWrapper"));
        // Members hold no union field.
        assert!(!out.contains("func (item Circle)"));
    }

    #[test]
    fn test_named_slice_of_union() {
        let out = render(&shapes().build().unwrap());
        assert!(out.contains("func (ct Shapes) MarshalJSON() ([]byte, error) {\n\ttmp := make([]ShapeWrapper, len(ct))\n"));
        assert!(out.contains("\t*ct = make(Shapes, len(tmp))\n"));
    }

    #[test]
    fn test_no_unions_no_import() {
        let mut b = UnitBuilder::new("p");
        let int = b.basic(BasicKind::Int);
        let shape = b.structure(vec![StructField::new("X", int)]);
        b.named("Point", shape);
        let out = render(&b.build().unwrap());
        assert_eq!(out, "// Code generated by typeweave. DO NOT EDIT.\n\npackage p\n\n");
    }

    #[test]
    fn test_package_override() {
        let conversion = convert_unit(&shapes().build().unwrap(), &ConvertOptions::default()).unwrap();
        let options = GoOptions {
            package: Some("wire".into()),
        };
        let out = generate_go_json(&conversion, &options).unwrap();
        assert!(out.contains("\npackage wire\n"));
    }
}
