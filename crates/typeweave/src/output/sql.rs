//! PostgreSQL schema.
//!
//! One `CREATE TABLE` per top-level record, one column per declared column.
//! Scalars and arrays of scalars map to native types, everything else is
//! stored as `jsonb`. Foreign keys and `sql` directives follow the last
//! table as `ALTER TABLE` statements.

use crate::config::Config;
use crate::convert::Conversion;
use crate::declarations::{Declaration, DeclarationRegistry};
use crate::emit::{self, Dialect};
use crate::error::{DirectiveError, Error};
use crate::ir::{IrId, IrNode, Record};
use crate::output::schema::{self, SQL_DIRECTIVE, SqlOptions, Table};
use crate::traits::{Backend, BackendCategory};
use std::fmt::Write;

/// Static instance of the SQL backend for registry.
pub static SQL_BACKEND: SqlBackend = SqlBackend;

/// SQL backend implementing the Backend trait.
pub struct SqlBackend;

impl Backend for SqlBackend {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn language(&self) -> &'static str {
        "sql"
    }

    fn extension(&self) -> &'static str {
        "sql"
    }

    fn category(&self) -> BackendCategory {
        BackendCategory::Schema
    }

    fn tag(&self) -> Option<&'static str> {
        Some("sql")
    }

    fn generate(&self, conversion: &Conversion, config: &Config) -> Result<String, Error> {
        generate_sql(conversion, &config.sql)
    }
}

/// Render `CREATE TABLE` statements for every top-level record, followed by
/// the deferred foreign keys and table directives.
pub fn generate_sql(conversion: &Conversion, options: &SqlOptions) -> Result<String, Error> {
    let constraints = constraints(conversion, options)?;
    Ok(emit::render(
        &Sql {
            options,
            constraints,
        },
        conversion,
    )?)
}

/// `ALTER TABLE` statements, emitted once every table exists.
fn constraints(conversion: &Conversion, options: &SqlOptions) -> Result<Vec<String>, DirectiveError> {
    let mut out = Vec::new();
    for id in schema::tables(conversion) {
        let Some(record) = conversion.ir.record(id) else {
            continue;
        };
        let table = Table::new(conversion, record, options);
        for column in table.foreign_keys() {
            let mut line = format!(
                "ALTER TABLE {} ADD FOREIGN KEY({}) REFERENCES {}",
                table.name,
                column.name,
                column.references.as_deref().unwrap_or_default()
            );
            if let Some(action) = &column.on_delete {
                write!(line, " ON DELETE {}", action).unwrap();
            }
            line.push(';');
            out.push(line);
        }
        for directive in record.directives.iter().filter(|d| d.tag == SQL_DIRECTIVE) {
            let content = substitute_constants(conversion, &record.name, &directive.content)?;
            out.push(format!("ALTER TABLE {} {};", table.name, content.trim()));
        }
    }
    Ok(out)
}

/// Replaces every `#Type.Variant` with the SQL literal of that enum constant.
fn substitute_constants(
    conversion: &Conversion,
    declaration: &str,
    content: &str,
) -> Result<String, DirectiveError> {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(at) = rest.find('#') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        let type_len = after.find(|c| !is_ident(c)).unwrap_or(after.len());
        let variant = after[type_len..]
            .strip_prefix('.')
            .map(|tail| tail.find(|c| !is_ident(c)).unwrap_or(tail.len()))
            .filter(|&len| type_len > 0 && len > 0);
        let Some(variant_len) = variant else {
            out.push('#');
            rest = after;
            continue;
        };
        let constant = &after[..type_len + 1 + variant_len];
        let (type_name, variant_name) = (&after[..type_len], &constant[type_len + 1..]);
        let value = conversion
            .ir
            .iter()
            .find_map(|(_, node)| match node {
                IrNode::Enum(e) if e.name == type_name => {
                    e.variants.iter().find(|v| v.name == variant_name)
                }
                _ => None,
            })
            .ok_or_else(|| DirectiveError::UnknownConstant {
                declaration: declaration.to_string(),
                constant: constant.to_string(),
            })?;
        out.push_str(&schema::literal(&value.value));
        rest = &after[constant.len()..];
    }
    out.push_str(rest);
    Ok(out)
}

struct Sql<'a> {
    options: &'a SqlOptions,
    constraints: Vec<String>,
}

impl Sql<'_> {
    fn table(&self, conversion: &Conversion, record: &Record) -> String {
        let table = Table::new(conversion, record, self.options);
        let mut lines = Vec::new();
        for column in &table.columns {
            if column.primary {
                lines.push(format!("  {} serial PRIMARY KEY", column.name));
                continue;
            }
            let mut line = format!("  {} {}", column.name, column.sql.ty);
            if let Some(check) = &column.sql.check {
                write!(line, " {}", check).unwrap();
            }
            if !column.sql.nullable {
                line.push_str(" NOT NULL");
            }
            lines.push(line);
        }

        format!(
            "-- {}\nCREATE TABLE {} (\n{}\n);\n",
            record.origin,
            table.name,
            lines.join(",\n")
        )
    }
}

impl Dialect for Sql<'_> {
    fn reference(&self, conversion: &Conversion, id: IrId) -> String {
        schema::column_type(conversion, id, "value").ty
    }

    fn roots(&self, conversion: &Conversion) -> Vec<IrId> {
        schema::tables(conversion)
    }

    fn declare(&self, conversion: &Conversion, id: IrId, out: &mut Vec<Declaration>) {
        if !schema::is_table(conversion, id) {
            return;
        }
        if let Some(record) = conversion.ir.record(id) {
            out.push(Declaration::new(record.name.clone(), self.table(conversion, record)));
        }
    }

    fn header(&self, _conversion: &Conversion, _registry: &DeclarationRegistry) -> String {
        "-- Code generated by typeweave. DO NOT EDIT.\n\n".to_string()
    }

    fn footer(&self, _conversion: &Conversion, _registry: &DeclarationRegistry) -> String {
        if self.constraints.is_empty() {
            return String::new();
        }
        format!("{}\n", self.constraints.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConvertOptions, convert_unit};
    use crate::input::UnitBuilder;
    use crate::oracle::{BasicKind, EnumLiteral, StructField};

    fn render(unit: &crate::input::Unit) -> String {
        let conversion =
            convert_unit(unit, &ConvertOptions::default().with_tag(Some("sql"))).unwrap();
        generate_sql(&conversion, &SqlOptions::default()).unwrap()
    }

    #[test]
    fn test_create_table() {
        let mut b = UnitBuilder::new("shop");
        let int = b.basic(BasicKind::Int64);
        let text = b.basic(BasicKind::String);
        let float = b.basic(BasicKind::Float64);
        let time = b.time();
        let tags = b.slice(text);
        let rgb = b.array(int, 3);
        let kind = b.named("Kind", int);
        b.enumeration(
            "Kind",
            [
                ("Book", EnumLiteral::Int(1), "book"),
                ("Music", EnumLiteral::Int(2), "music"),
            ],
        );
        let shape = b.structure(vec![
            StructField::new("ID", int).tag(r#"json:"id""#),
            StructField::new("Title", text).tag(r#"json:"title""#),
            StructField::new("Price", float).tag(r#"sql:"price""#),
            StructField::new("Kind", kind).tag(r#"json:"kind""#),
            StructField::new("Tags", tags).tag(r#"json:"tags""#),
            StructField::new("Color", rgb).tag(r#"json:"color""#),
            StructField::new("Released", time).tag(r#"json:"released""#),
            StructField::new("Draft", text).tag(r#"sql:"-""#),
        ]);
        b.named("ShopItem", shape);
        let unit = b.build().unwrap();

        insta::assert_snapshot!(render(&unit), @r"
        -- Code generated by typeweave. DO NOT EDIT.

        -- shop.ShopItem
        CREATE TABLE shop_items (
          id serial PRIMARY KEY,
          title varchar NOT NULL,
          price real NOT NULL,
          kind integer CHECK (kind IN (1, 2)) NOT NULL,
          tags varchar[],
          color integer[] CHECK (array_length(color, 1) = 3) NOT NULL,
          released timestamp (0) with time zone
        );
        ");
    }

    #[test]
    fn test_string_enum_and_jsonb_fallback() {
        let mut b = UnitBuilder::new("p");
        let text = b.basic(BasicKind::String);
        let status = b.named("Status", text);
        b.enumeration(
            "Status",
            [
                ("Open", EnumLiteral::Str("open".into()), "Open"),
                ("Done", EnumLiteral::Str("it's done".into()), "Done"),
            ],
        );
        let int = b.basic(BasicKind::Int);
        let meta = b.map(text, int);
        let inner = b.structure(vec![StructField::new("N", int)]);
        let note = b.named("Note", inner);
        let notes = b.slice(note);
        let shape = b.structure(vec![
            StructField::new("Status", status),
            StructField::new("Meta", meta),
            StructField::new("Notes", notes),
        ]);
        b.named("Task", shape);
        let unit = b.build().unwrap();

        let out = render(&unit);
        assert!(out.contains("  Status varchar CHECK (Status IN ('open', 'it''s done')) NOT NULL,\n"));
        assert!(out.contains("  Meta jsonb,\n"));
        assert!(out.contains("  Notes jsonb\n"));
        assert!(out.contains("CREATE TABLE notes (\n  N integer NOT NULL\n);\n"));
        assert!(out.contains("CREATE TABLE tasks ("));
    }

    #[test]
    fn test_table_suffix() {
        let mut b = UnitBuilder::new("p");
        let int = b.basic(BasicKind::Int);
        let shape = b.structure(vec![StructField::new("N", int)]);
        b.named("Counter", shape);
        let unit = b.build().unwrap();

        let conversion = convert_unit(&unit, &ConvertOptions::default()).unwrap();
        let options = SqlOptions {
            table_suffix: String::new(),
        };
        assert!(generate_sql(&conversion, &options)
            .unwrap()
            .contains("CREATE TABLE counter (\n"));
    }

    fn lesson_unit(check: &str) -> crate::input::Unit {
        let mut b = UnitBuilder::new("school");
        let int = b.basic(BasicKind::Int64);
        let text = b.basic(BasicKind::String);
        let level = b.named("Level", text);
        b.enumeration(
            "Level",
            [
                ("Beginner", EnumLiteral::Str("beginner".into()), "Beginner"),
                ("Expert", EnumLiteral::Str("expert".into()), "Expert"),
            ],
        );
        let tutor = b.structure(vec![StructField::new("Id", int).tag(r#"sql:"id""#)]);
        b.named("Tutor", tutor);
        let shape = b.structure(vec![
            StructField::new("Id", int).tag(r#"sql:"id""#),
            StructField::new("IdTutor", int).tag(r#"sql:"id_tutor" sql_foreign:"CASCADE""#),
            StructField::new("Level", level).tag(r#"sql:"level""#),
        ]);
        let lesson = b.named("Lesson", shape);
        b.directive(lesson, "sql", check)
            .directive(lesson, "sql", "ADD UNIQUE(id_tutor)")
            .directive(lesson, "json", "ignored");
        b.build().unwrap()
    }

    #[test]
    fn test_deferred_constraints() {
        let out = render(&lesson_unit("ADD CHECK(level <> #Level.Expert OR id_tutor > 0)"));
        assert!(out.ends_with(
            "ALTER TABLE lessons ADD FOREIGN KEY(id_tutor) REFERENCES tutors ON DELETE CASCADE;
ALTER TABLE lessons ADD CHECK(level <> 'expert' OR id_tutor > 0);
ALTER TABLE lessons ADD UNIQUE(id_tutor);
"
        ));
        // Constraints follow every table.
        let tables = out.rfind("CREATE TABLE").unwrap();
        assert!(out.find("ALTER TABLE").unwrap() > tables);
    }

    #[test]
    fn test_unknown_enum_constant() {
        let unit = lesson_unit("ADD CHECK(level <> #Level.Master)");
        let conversion =
            convert_unit(&unit, &ConvertOptions::default().with_tag(Some("sql"))).unwrap();
        let err = generate_sql(&conversion, &SqlOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Directive(DirectiveError::UnknownConstant { ref declaration, ref constant })
                if declaration == "Lesson" && constant == "Level.Master"
        ));
    }

    #[test]
    fn test_hash_without_constant_is_kept() {
        let out = render(&lesson_unit("ADD CHECK(level <> '#1' AND level <> '#.x')"));
        assert!(out.contains("ALTER TABLE lessons ADD CHECK(level <> '#1' AND level <> '#.x');\n"));
    }

    #[test]
    fn test_foreign_key_needs_target_table() {
        let mut b = UnitBuilder::new("p");
        let int = b.basic(BasicKind::Int);
        let shape = b.structure(vec![StructField::new("IdGhost", int)]);
        b.named("Haunt", shape);
        let unit = b.build().unwrap();
        assert!(!render(&unit).contains("FOREIGN KEY"));
    }
}
