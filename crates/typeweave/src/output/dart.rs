//! Dart classes with JSON convertors.
//!
//! Every type gets a pair of top-level `<id>FromJson`/`<id>ToJson` functions,
//! where `<id>` is the type's function id (`listInt`, `dictStringPoint`, ...).
//! Aliases reuse the functions of their underlying type.

use crate::config::Config;
use crate::convert::Conversion;
use crate::declarations::{Declaration, DeclarationRegistry};
use crate::emit::{self, Codec, Dialect};
use crate::error::{Error, InvariantViolation};
use crate::ir::{Container, Enum, IrId, IrNode, Primitive, Record, Union};
use crate::oracle::EnumLiteral;
use crate::output::{lower_first, quoted, upper_first};
use crate::traits::{Backend, BackendCategory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;

/// Static instance of the Dart backend for registry.
pub static DART_BACKEND: DartBackend = DartBackend;

/// Dart backend implementing the Backend trait.
pub struct DartBackend;

impl Backend for DartBackend {
    fn name(&self) -> &'static str {
        "dart"
    }

    fn language(&self) -> &'static str {
        "dart"
    }

    fn extension(&self) -> &'static str {
        "dart"
    }

    fn category(&self) -> BackendCategory {
        BackendCategory::Codecs
    }

    fn tag(&self) -> Option<&'static str> {
        Some("dart")
    }

    fn generate(&self, conversion: &Conversion, config: &Config) -> Result<String, Error> {
        Ok(generate_dart(conversion, &config.dart)?)
    }
}

/// Options for Dart generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DartOptions {
    /// Add a `label()` accessor to enum extensions.
    pub labels: bool,
}

impl Default for DartOptions {
    fn default() -> Self {
        Self { labels: true }
    }
}

/// Render a conversion as Dart classes and JSON functions.
pub fn generate_dart(
    conversion: &Conversion,
    options: &DartOptions,
) -> Result<String, InvariantViolation> {
    emit::render(&Dart { options }, conversion)
}

/// Dart string literal; `$` would otherwise start an interpolation.
fn dart_string(s: &str) -> String {
    quoted(s).replace('$', "\\$")
}

struct Dart<'a> {
    options: &'a DartOptions,
}

impl Dart<'_> {
    fn function_id(&self, conversion: &Conversion, id: IrId) -> String {
        self.fid(conversion, id, &mut HashSet::new())
    }

    fn fid(&self, conversion: &Conversion, id: IrId, aliases: &mut HashSet<IrId>) -> String {
        match &conversion.ir[id] {
            IrNode::Primitive { primitive } => match primitive {
                Primitive::Boolean => "bool",
                Primitive::Integer => "int",
                Primitive::Float => "double",
                Primitive::String => "string",
                Primitive::Time => "dateTime",
                Primitive::Date => "date",
                Primitive::Opaque => "dynamic",
            }
            .to_string(),
            IrNode::Alias(alias) => {
                if aliases.insert(id) {
                    self.fid(conversion, alias.underlying, aliases)
                } else {
                    lower_first(&alias.name)
                }
            }
            IrNode::Record(r) => lower_first(&r.name),
            IrNode::Enum(e) => lower_first(&e.name),
            IrNode::Union(u) => lower_first(&u.name),
            IrNode::External(e) => lower_first(&e.name),
            IrNode::Container(Container::Array { elem, .. }) => {
                format!("list{}", upper_first(&self.fid(conversion, *elem, aliases)))
            }
            IrNode::Container(Container::Map { key, elem }) => format!(
                "dict{}{}",
                upper_first(&self.fid(conversion, *key, aliases)),
                upper_first(&self.fid(conversion, *elem, aliases))
            ),
            IrNode::Nullable { inner } => self.fid(conversion, *inner, aliases),
        }
    }

    fn field_name(name: &str) -> String {
        let name: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        lower_first(&name)
    }

    fn primitive(primitive: Primitive) -> &'static str {
        match primitive {
            Primitive::Boolean => {
                "bool boolFromJson(dynamic json) => json as bool;\n\nbool boolToJson(bool item) => item;\n"
            }
            Primitive::Integer => {
                "int intFromJson(dynamic json) => json as int;\n\nint intToJson(int item) => item;\n"
            }
            // Integral JSON numbers decode as int.
            Primitive::Float => {
                "double doubleFromJson(dynamic json) => (json as num).toDouble();\n\ndouble doubleToJson(double item) => item;\n"
            }
            Primitive::String => {
                "String stringFromJson(dynamic json) => json == null ? \"\" : json as String;\n\nString stringToJson(String item) => item;\n"
            }
            Primitive::Time => {
                "DateTime dateTimeFromJson(dynamic json) => DateTime.parse(json as String);\n\ndynamic dateTimeToJson(DateTime dt) => dt.toUtc().toIso8601String();\n"
            }
            Primitive::Date => {
                "DateTime dateFromJson(dynamic json) => DateTime.parse(json as String);\n\ndynamic dateToJson(DateTime dt) => dt.toIso8601String().substring(0, 10);\n"
            }
            Primitive::Opaque => {
                "dynamic dynamicFromJson(dynamic json) => json;\n\ndynamic dynamicToJson(dynamic item) => item;\n"
            }
        }
    }

    /// Spelling through aliases. Helpers are shared by function id, which
    /// ignores aliases, so their signatures must too.
    fn canonical(&self, conversion: &Conversion, id: IrId, aliases: &mut HashSet<IrId>) -> String {
        match &conversion.ir[id] {
            IrNode::Alias(alias) if aliases.insert(id) => {
                self.canonical(conversion, alias.underlying, aliases)
            }
            IrNode::Container(Container::Array { elem, .. }) => {
                format!("List<{}>", self.canonical(conversion, *elem, aliases))
            }
            IrNode::Container(Container::Map { key, elem }) => format!(
                "Map<{}, {}>",
                self.canonical(conversion, *key, aliases),
                self.canonical(conversion, *elem, aliases)
            ),
            IrNode::Nullable { inner } => self.canonical(conversion, *inner, aliases),
            _ => self.reference(conversion, id),
        }
    }

    fn list(&self, conversion: &Conversion, id: IrId, elem: IrId) -> String {
        let name = self.canonical(conversion, id, &mut HashSet::new());
        let fid = self.function_id(conversion, id);
        format!(
            "{name} {fid}FromJson(dynamic json) {{
  if (json == null) {{
    return [];
  }}
  return (json as List<dynamic>).map((v) => {decode}).toList();
}}

List<dynamic> {fid}ToJson({name} item) {{
  return item.map((v) => {encode}).toList();
}}
",
            decode = self.decoder(conversion, elem, "v"),
            encode = self.encoder(conversion, elem, "v"),
        )
    }

    fn dict(&self, conversion: &Conversion, id: IrId, key: IrId, elem: IrId) -> String {
        let name = self.canonical(conversion, id, &mut HashSet::new());
        let fid = self.function_id(conversion, id);
        // Object keys are always strings on the wire.
        let integral_key = match &conversion.ir[conversion.ir.resolve(key)] {
            IrNode::Primitive { primitive } => *primitive == Primitive::Integer,
            IrNode::Enum(e) => e.integer_backed,
            _ => false,
        };
        let key_from = if integral_key {
            self.decoder(conversion, key, "int.parse(k)")
        } else {
            self.decoder(conversion, key, "k")
        };
        format!(
            "{name} {fid}FromJson(dynamic json) {{
  if (json == null) {{
    return {{}};
  }}
  return (json as JSON).map((k, v) => MapEntry({key_from}, {decode}));
}}

Map<String, dynamic> {fid}ToJson({name} item) {{
  return item.map((k, v) => MapEntry({key_to}.toString(), {encode}));
}}
",
            decode = self.decoder(conversion, elem, "v"),
            key_to = self.encoder(conversion, key, "k"),
            encode = self.encoder(conversion, elem, "v"),
        )
    }

    fn class(&self, conversion: &Conversion, record: &Record, fid: &str) -> String {
        let names: Vec<String> = record
            .fields
            .iter()
            .map(|f| Self::field_name(&f.name))
            .collect();

        let mut code = format!("// {}\nclass {}", record.origin, record.name);
        if !record.unions.is_empty() {
            write!(code, " implements {}", record.unions.join(", ")).unwrap();
        }
        code.push_str(" {\n");
        for (field, name) in record.fields.iter().zip(&names) {
            writeln!(code, "  final {} {};", self.reference(conversion, field.ty), name).unwrap();
        }
        if !names.is_empty() {
            code.push('\n');
        }
        let init: Vec<String> = names.iter().map(|n| format!("this.{}", n)).collect();
        writeln!(code, "  const {}({});\n", record.name, init.join(", ")).unwrap();
        let interpolated: Vec<String> = names.iter().map(|n| format!("${}", n)).collect();
        code.push_str("  @override\n  String toString() {\n");
        writeln!(
            code,
            "    return \"{}({})\";",
            record.name,
            interpolated.join(", ")
        )
        .unwrap();
        code.push_str("  }\n}\n\n");

        writeln!(code, "{} {}FromJson(dynamic json_) {{", record.name, fid).unwrap();
        code.push_str("  final json = (json_ as JSON);\n");
        writeln!(code, "  return {}(", record.name).unwrap();
        for field in &record.fields {
            let access = format!("json[{}]", dart_string(&field.name));
            writeln!(code, "    {},", self.decoder(conversion, field.ty, &access)).unwrap();
        }
        code.push_str("  );\n}\n\n");

        writeln!(code, "JSON {}ToJson({} item) {{", fid, record.name).unwrap();
        code.push_str("  return {\n");
        for (field, name) in record.fields.iter().zip(&names) {
            let access = format!("item.{}", name);
            writeln!(
                code,
                "    {}: {},",
                dart_string(&field.name),
                self.encoder(conversion, field.ty, &access)
            )
            .unwrap();
        }
        code.push_str("  };\n}\n");
        code
    }

    fn enumeration(&self, enumeration: &Enum, fid: &str) -> String {
        let name = upper_first(&enumeration.name);
        let value_type = if enumeration.integer_backed { "int" } else { "String" };
        let variants: Vec<String> = enumeration
            .variants
            .iter()
            .map(|v| lower_first(&v.name))
            .collect();
        let values: Vec<String> = enumeration
            .variants
            .iter()
            .map(|v| match &v.value {
                EnumLiteral::Int(i) => i.to_string(),
                EnumLiteral::Str(s) => dart_string(s),
            })
            .collect();

        let mut code = format!("// {}\nenum {} {{ {} }}\n\n", enumeration.origin, name, variants.join(", "));
        writeln!(code, "extension _{}Ext on {} {{", name, name).unwrap();
        writeln!(code, "  static const _values = [{}];", values.join(", ")).unwrap();
        writeln!(code, "  static {} fromValue({} v) {{", name, value_type).unwrap();
        writeln!(code, "    return {}.values[_values.indexOf(v)];", name).unwrap();
        code.push_str("  }\n\n");
        writeln!(code, "  {} toValue() {{", value_type).unwrap();
        code.push_str("    return _values[index];\n  }\n");
        if self.options.labels {
            let labels: Vec<String> = enumeration
                .variants
                .iter()
                .map(|v| dart_string(&v.label))
                .collect();
            writeln!(code, "\n  static const _labels = [{}];", labels.join(", ")).unwrap();
            code.push_str("  String label() {\n    return _labels[index];\n  }\n");
        }
        code.push_str("}\n\n");

        writeln!(
            code,
            "{} {}FromJson(dynamic json) => _{}Ext.fromValue(json as {});\n",
            name, fid, name, value_type
        )
        .unwrap();
        writeln!(code, "dynamic {}ToJson({} item) => item.toValue();", fid, name).unwrap();
        code
    }

    fn union(&self, conversion: &Conversion, union: &Union, fid: &str) -> String {
        let mut code = format!("// {}\nabstract class {} {{}}\n\n", union.origin, union.name);

        writeln!(code, "{} {}FromJson(dynamic json_) {{", union.name, fid).unwrap();
        code.push_str("  final json = json_ as JSON;\n");
        code.push_str("  final kind = json['Kind'] as String;\n");
        code.push_str("  final data = json['Data'];\n");
        code.push_str("  switch (kind) {\n");
        for member in &union.members {
            writeln!(code, "    case {}:", dart_string(&member.name)).unwrap();
            writeln!(code, "      return {};", self.decoder(conversion, member.ty, "data")).unwrap();
        }
        code.push_str("    default:\n      throw (\"unexpected type\");\n  }\n}\n\n");

        writeln!(code, "JSON {}ToJson({} item) {{", fid, union.name).unwrap();
        for (i, member) in union.members.iter().enumerate() {
            let keyword = if i == 0 { "  if" } else { " else if" };
            writeln!(
                code,
                "{} (item is {}) {{",
                keyword,
                self.reference(conversion, member.ty)
            )
            .unwrap();
            writeln!(
                code,
                "    return {{'Kind': {}, 'Data': {}}};",
                dart_string(&member.name),
                self.encoder(conversion, member.ty, "item")
            )
            .unwrap();
            code.push_str("  }");
        }
        if union.members.is_empty() {
            code.push_str("  throw (\"unexpected type\");\n}\n");
        } else {
            code.push_str(" else {\n    throw (\"unexpected type\");\n  }\n}\n");
        }
        code
    }
}

impl Dialect for Dart<'_> {
    fn reference(&self, conversion: &Conversion, id: IrId) -> String {
        match &conversion.ir[id] {
            IrNode::Primitive { primitive } => match primitive {
                Primitive::Boolean => "bool",
                Primitive::Integer => "int",
                Primitive::Float => "double",
                Primitive::String => "String",
                Primitive::Time | Primitive::Date => "DateTime",
                Primitive::Opaque => "dynamic",
            }
            .to_string(),
            IrNode::Alias(a) => a.name.clone(),
            IrNode::Record(r) => r.name.clone(),
            IrNode::Enum(e) => upper_first(&e.name),
            IrNode::Union(u) => u.name.clone(),
            IrNode::External(e) => e.name.clone(),
            IrNode::Container(Container::Array { elem, .. }) => {
                format!("List<{}>", self.reference(conversion, *elem))
            }
            IrNode::Container(Container::Map { key, elem }) => format!(
                "Map<{}, {}>",
                self.reference(conversion, *key),
                self.reference(conversion, *elem)
            ),
            // Absent lists and maps decode as empty ones.
            IrNode::Nullable { inner } => self.reference(conversion, *inner),
        }
    }

    fn declare(&self, conversion: &Conversion, id: IrId, out: &mut Vec<Declaration>) {
        let fid = self.function_id(conversion, id);
        match &conversion.ir[id] {
            IrNode::Primitive { primitive } => {
                out.push(Declaration::new(format!("_json_{}", fid), Self::primitive(*primitive)));
            }
            IrNode::Container(Container::Array { elem, .. }) => {
                out.push(Declaration::new(
                    format!("_json_{}", fid),
                    self.list(conversion, id, *elem),
                ));
            }
            IrNode::Container(Container::Map { key, elem }) => {
                out.push(Declaration::new(
                    format!("_json_{}", fid),
                    self.dict(conversion, id, *key, *elem),
                ));
            }
            IrNode::Alias(alias) => {
                out.push(Declaration::new(
                    alias.name.clone(),
                    format!(
                        "// {}\ntypedef {} = {};\n",
                        alias.origin,
                        alias.name,
                        self.reference(conversion, alias.underlying)
                    ),
                ));
            }
            IrNode::Record(record) => {
                out.push(Declaration::new(
                    record.name.clone(),
                    self.class(conversion, record, &fid),
                ));
            }
            IrNode::Enum(enumeration) => {
                out.push(Declaration::new(
                    enumeration.name.clone(),
                    self.enumeration(enumeration, &fid),
                ));
            }
            IrNode::Union(union) => {
                out.push(Declaration::new(
                    union.name.clone(),
                    self.union(conversion, union, &fid),
                ));
            }
            IrNode::Nullable { .. } | IrNode::External(_) => {}
        }
    }

    fn header(&self, conversion: &Conversion, _registry: &DeclarationRegistry) -> String {
        let mut out = String::from("// Code generated by typeweave. DO NOT EDIT.\n\n");
        let imports: BTreeSet<&str> = conversion
            .ir
            .iter()
            .filter_map(|(_, node)| match node {
                IrNode::External(e) => Some(e.import.as_str()),
                _ => None,
            })
            .collect();
        for import in &imports {
            writeln!(out, "import {};", dart_string(import)).unwrap();
        }
        if !imports.is_empty() {
            out.push('\n');
        }
        out.push_str("typedef JSON = Map<String, dynamic>; // alias to shorten JSON convertors\n\n");
        out
    }
}

impl Codec for Dart<'_> {
    fn encoder(&self, conversion: &Conversion, id: IrId, value: &str) -> String {
        format!("{}ToJson({})", self.function_id(conversion, id), value)
    }

    fn decoder(&self, conversion: &Conversion, id: IrId, value: &str) -> String {
        format!("{}FromJson({})", self.function_id(conversion, id), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConvertOptions, convert_unit};
    use crate::input::UnitBuilder;
    use crate::oracle::{BasicKind, StructField};

    fn render(unit: &crate::input::Unit) -> String {
        let conversion =
            convert_unit(unit, &ConvertOptions::default().with_tag(Some("dart"))).unwrap();
        generate_dart(&conversion, &DartOptions::default()).unwrap()
    }

    #[test]
    fn test_class_with_list_field() {
        let mut b = UnitBuilder::new("shop");
        let int = b.basic(BasicKind::Int);
        let ids = b.slice(int);
        let shape = b.structure(vec![
            StructField::new("ID", int).tag(r#"json:"id""#),
            StructField::new("Items", ids),
        ]);
        b.named("Cart", shape);
        let unit = b.build().unwrap();

        let out = render(&unit);
        assert!(out.contains("class Cart {\n  final int id;\n  final List<int> items;\n"));
        assert!(out.contains("  const Cart(this.id, this.items);\n"));
        assert!(out.contains("    return \"Cart($id, $items)\";\n"));
        assert!(out.contains(
            "    intFromJson(json[\"id\"]),\n    listIntFromJson(json[\"Items\"]),\n"
        ));
        assert!(out.contains("    \"Items\": listIntToJson(item.items),\n"));
        assert!(out.contains("List<int> listIntFromJson(dynamic json) {\n  if (json == null) {\n    return [];\n"));
        assert_eq!(out.matches("int intFromJson").count(), 1);
    }

    #[test]
    fn test_dict_with_integer_keys() {
        let mut b = UnitBuilder::new("p");
        let int = b.basic(BasicKind::Int);
        let text = b.basic(BasicKind::String);
        let dict = b.map(int, text);
        let shape = b.structure(vec![StructField::new("Names", dict)]);
        b.named("Index", shape);
        let unit = b.build().unwrap();

        let out = render(&unit);
        assert!(out.contains("Map<int, String> dictIntStringFromJson(dynamic json) {"));
        assert!(out.contains("MapEntry(intFromJson(int.parse(k)), stringFromJson(v))"));
        assert!(out.contains("    return {};\n"));
    }

    #[test]
    fn test_enum_extension() {
        let mut b = UnitBuilder::new("p");
        let text = b.basic(BasicKind::String);
        b.named("role", text);
        b.enumeration(
            "role",
            [
                ("Admin", EnumLiteral::Str("admin".into()), "Administrator"),
                ("Guest", EnumLiteral::Str("guest".into()), "Visitor"),
            ],
        );
        let unit = b.build().unwrap();

        let out = render(&unit);
        assert!(out.contains("enum Role { admin, guest }\n"));
        assert!(out.contains("  static const _values = [\"admin\", \"guest\"];\n"));
        assert!(out.contains("  static Role fromValue(String v) {\n"));
        assert!(out.contains("  static const _labels = [\"Administrator\", \"Visitor\"];\n"));
        assert!(out.contains("Role roleFromJson(dynamic json) => _RoleExt.fromValue(json as String);"));
    }

    #[test]
    fn test_enum_strings_are_dart_literals() {
        let mut b = UnitBuilder::new("p");
        let text = b.basic(BasicKind::String);
        b.named("Fee", text);
        b.enumeration(
            "Fee",
            [("Flat", EnumLiteral::Str("$flat".into()), "Flat $5\u{1}")],
        );
        let unit = b.build().unwrap();

        let out = render(&unit);
        assert!(out.contains("  static const _values = [\"\\$flat\"];\n"));
        assert!(out.contains("  static const _labels = [\"Flat \\$5\\u0001\"];\n"));
    }

    #[test]
    fn test_enum_without_labels() {
        let mut b = UnitBuilder::new("p");
        let int = b.basic(BasicKind::Int);
        b.named("Level", int);
        b.enumeration("Level", [("Low", EnumLiteral::Int(1), "low")]);
        let unit = b.build().unwrap();

        let conversion = convert_unit(&unit, &ConvertOptions::default()).unwrap();
        let out = generate_dart(&conversion, &DartOptions { labels: false }).unwrap();
        assert!(out.contains("  static Level fromValue(int v) {\n"));
        assert!(!out.contains("_labels"));
    }

    #[test]
    fn test_union_dispatch() {
        let mut b = UnitBuilder::new("geo");
        let methods = b.interface(&["isShape"]);
        b.named("Shape", methods);
        let float = b.basic(BasicKind::Float64);
        let circle_shape = b.structure(vec![StructField::new("R", float)]);
        let circle = b.named("Circle", circle_shape);
        b.method(circle, "isShape");
        let square_shape = b.structure(vec![StructField::new("Side", float)]);
        let square = b.named("Square", square_shape);
        b.method(square, "isShape");
        let unit = b.build().unwrap();

        let out = render(&unit);
        assert!(out.contains("class Circle implements Shape {"));
        assert!(out.contains("abstract class Shape {}\n"));
        assert!(out.contains("    case \"Circle\":\n      return circleFromJson(data);\n"));
        assert!(out.contains(
            "  if (item is Circle) {\n    return {'Kind': \"Circle\", 'Data': circleToJson(item)};\n  } else if (item is Square) {"
        ));
        assert!(out.contains("    default:\n      throw (\"unexpected type\");\n"));
        // Members are declared before the union.
        assert!(out.find("class Square").unwrap() < out.find("abstract class Shape").unwrap());
    }

    #[test]
    fn test_alias_reuses_underlying_functions() {
        let mut b = UnitBuilder::new("p");
        let text = b.basic(BasicKind::String);
        let list = b.slice(text);
        let tags = b.named("Tags", list);
        let shape = b.structure(vec![StructField::new("Tags", tags)]);
        b.named("Post", shape);
        let unit = b.build().unwrap();

        let out = render(&unit);
        assert!(out.contains("// p.Tags\ntypedef Tags = List<String>;\n"));
        assert!(out.contains("    listStringFromJson(json[\"Tags\"]),\n"));
        assert!(out.starts_with(
            "// Code generated by typeweave. DO NOT EDIT.\n\ntypedef JSON = Map<String, dynamic>;"
        ));
    }

    #[test]
    fn test_alias_and_plain_containers_share_helpers() {
        let mut b = UnitBuilder::new("p");
        let text = b.basic(BasicKind::String);
        let key = b.named("Key", text);
        let plain = b.slice(text);
        let keys = b.slice(key);
        let by_key = b.map(text, key);
        let by_text = b.map(text, text);
        let shape = b.structure(vec![
            StructField::new("A", plain),
            StructField::new("B", keys),
            StructField::new("M", by_key),
            StructField::new("N", by_text),
        ]);
        b.named("Doc", shape);
        let unit = b.build().unwrap();

        let out = render(&unit);
        assert_eq!(out.matches("List<String> listStringFromJson(").count(), 1);
        assert_eq!(
            out.matches("Map<String, String> dictStringStringFromJson(").count(),
            1
        );
        assert!(out.contains("  final List<Key> b;\n"));
        assert!(out.contains("    listStringFromJson(json[\"B\"]),\n"));
    }
}
