//! Physical table layout shared by the SQL schema and the Go row code.
//!
//! Both backends read a record's columns from [`Table`], so the column order
//! of a `CREATE TABLE` is exactly the destination order of its scanner.
//! Discarded fields have no column in either.

use crate::convert::Conversion;
use crate::ir::{Container, DeclaredField, Enum, IrId, IrNode, Length, Primitive, Record};
use crate::oracle::{EnumLiteral, lookup_tag};
use crate::output::snake_case;
use serde::{Deserialize, Serialize};

/// Options for the table layout, read by `sql` and `go-scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlOptions {
    /// Appended to the snake-cased record name to form the table name.
    pub table_suffix: String,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            table_suffix: "s".to_string(),
        }
    }
}

impl SqlOptions {
    /// `ShopItem` -> `shop_items`.
    pub fn table_name(&self, record: &str) -> String {
        format!("{}{}", snake_case(record), self.table_suffix)
    }
}

pub(crate) const JSONB: &str = "jsonb";

/// Directive tag carrying table constraints.
pub(crate) const SQL_DIRECTIVE: &str = "sql";

/// A column type with its inline constraint.
pub(crate) struct ColumnType {
    pub ty: String,
    pub check: Option<String>,
    pub nullable: bool,
}

impl ColumnType {
    fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            check: None,
            nullable: false,
        }
    }

    pub fn is_json(&self) -> bool {
        self.ty == JSONB
    }

    /// Native PostgreSQL array.
    pub fn is_array(&self) -> bool {
        self.ty.ends_with("[]")
    }
}

pub(crate) struct Column<'a> {
    /// SQL name.
    pub name: &'a str,
    /// Field of the source struct.
    pub source_name: &'a str,
    pub ty: IrId,
    pub exported: bool,
    /// Integer `id`, rendered `serial PRIMARY KEY`.
    pub primary: bool,
    pub sql: ColumnType,
    /// Table referenced by an `Id<Record>` field.
    pub references: Option<String>,
    /// Unique on its own through an `ADD UNIQUE(col)` directive.
    pub unique: bool,
    /// `ON DELETE` action of the foreign key, from the `sql_foreign` tag key.
    pub on_delete: Option<String>,
}

pub(crate) struct Table<'a> {
    pub record: &'a Record,
    pub name: String,
    pub columns: Vec<Column<'a>>,
}

impl<'a> Table<'a> {
    pub fn new(conversion: &Conversion, record: &'a Record, options: &SqlOptions) -> Self {
        let unique = unique_columns(record);
        let columns = record
            .declared
            .iter()
            .filter_map(|field| {
                let DeclaredField::Column {
                    source_name,
                    name,
                    ty,
                    exported,
                    tag,
                } = field
                else {
                    return None;
                };
                let integer = is_integer(conversion, *ty);
                let primary = integer && name.eq_ignore_ascii_case("id");
                let references = if integer && !primary {
                    foreign_target(conversion, source_name).map(|t| options.table_name(t))
                } else {
                    None
                };
                Some(Column {
                    name: name.as_str(),
                    source_name: source_name.as_str(),
                    ty: *ty,
                    exported: *exported,
                    primary,
                    sql: column_type(conversion, *ty, name),
                    references,
                    unique: unique.contains(&name.as_str()),
                    on_delete: lookup_tag(tag, "sql_foreign").filter(|a| !a.is_empty()),
                })
            })
            .collect();
        Self {
            record,
            name: options.table_name(&record.name),
            columns,
        }
    }

    pub fn primary(&self) -> Option<&Column<'a>> {
        self.columns.iter().find(|c| c.primary)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &Column<'a>> {
        self.columns.iter().filter(|c| c.references.is_some())
    }

    /// Exported columns other than the primary key.
    pub fn writable(&self) -> impl Iterator<Item = &Column<'a>> {
        self.columns.iter().filter(|c| c.exported && !c.primary)
    }
}

/// Top-level records, the ones that get a table.
pub(crate) fn tables(conversion: &Conversion) -> Vec<IrId> {
    conversion
        .roots
        .iter()
        .map(|r| r.node)
        .filter(|&id| conversion.ir.record(id).is_some())
        .collect()
}

pub(crate) fn is_table(conversion: &Conversion, id: IrId) -> bool {
    conversion.roots.iter().any(|r| r.node == id) && conversion.ir.record(id).is_some()
}

/// `IdOwner` names the `Owner` record, when the unit declares one.
fn foreign_target<'c>(conversion: &'c Conversion, source_name: &str) -> Option<&'c str> {
    let rest = source_name.strip_prefix("Id")?;
    if !rest.starts_with(char::is_uppercase) {
        return None;
    }
    conversion
        .roots
        .iter()
        .find(|r| r.name == rest && conversion.ir.record(r.node).is_some())
        .map(|r| r.name.as_str())
}

fn unique_columns(record: &Record) -> Vec<&str> {
    const KEYWORD: &str = "ADD UNIQUE";
    record
        .directives
        .iter()
        .filter(|d| d.tag == SQL_DIRECTIVE)
        .filter_map(|d| {
            let start = d.content.to_ascii_uppercase().find(KEYWORD)? + KEYWORD.len();
            let rest = d.content[start..].trim_start().strip_prefix('(')?;
            let inner = &rest[..rest.find(')')?];
            (!inner.contains(',')).then(|| inner.trim())
        })
        .collect()
}

/// Strips aliases, noting whether a nullable wrapper was crossed.
pub(crate) fn unwrap(conversion: &Conversion, mut id: IrId) -> (IrId, bool) {
    let mut nullable = false;
    for _ in 0..=conversion.ir.len() {
        match &conversion.ir[id] {
            IrNode::Nullable { inner } => {
                nullable = true;
                id = *inner;
            }
            IrNode::Alias(alias) => id = alias.underlying,
            _ => break,
        }
    }
    (id, nullable)
}

fn is_integer(conversion: &Conversion, id: IrId) -> bool {
    let (id, _) = unwrap(conversion, id);
    matches!(
        conversion.ir[id],
        IrNode::Primitive {
            primitive: Primitive::Integer
        }
    )
}

fn builtin(primitive: Primitive) -> Option<&'static str> {
    match primitive {
        Primitive::Boolean => Some("boolean"),
        Primitive::Integer => Some("integer"),
        Primitive::Float => Some("real"),
        Primitive::String => Some("varchar"),
        Primitive::Time | Primitive::Date | Primitive::Opaque => None,
    }
}

/// SQL literal of an enum value.
pub(crate) fn literal(value: &EnumLiteral) -> String {
    match value {
        EnumLiteral::Int(v) => v.to_string(),
        EnumLiteral::Str(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

fn enumeration(enumeration: &Enum, column: &str) -> ColumnType {
    let ty = if enumeration.integer_backed { "integer" } else { "varchar" };
    let values: Vec<String> = enumeration
        .variants
        .iter()
        .map(|v| literal(&v.value))
        .collect();
    ColumnType {
        ty: ty.to_string(),
        check: Some(format!("CHECK ({} IN ({}))", column, values.join(", "))),
        nullable: false,
    }
}

pub(crate) fn column_type(conversion: &Conversion, id: IrId, column: &str) -> ColumnType {
    let (id, nullable) = unwrap(conversion, id);
    let mut out = match &conversion.ir[id] {
        IrNode::Primitive { primitive } => match primitive {
            // The zero time is stored as NULL.
            Primitive::Time => ColumnType {
                nullable: true,
                ..ColumnType::new("timestamp (0) with time zone")
            },
            Primitive::Date => ColumnType::new("date"),
            other => ColumnType::new(builtin(*other).unwrap_or(JSONB)),
        },
        IrNode::Enum(e) => enumeration(e, column),
        IrNode::Container(Container::Array { elem, len }) => {
            let (elem, _) = unwrap(conversion, *elem);
            let native = match &conversion.ir[elem] {
                IrNode::Primitive { primitive } => builtin(*primitive),
                _ => None,
            };
            match native {
                Some(native) => ColumnType {
                    check: match len {
                        Length::Fixed(n) => {
                            Some(format!("CHECK (array_length({}, 1) = {})", column, n))
                        }
                        Length::Dynamic => None,
                    },
                    ..ColumnType::new(format!("{}[]", native))
                },
                None => ColumnType::new(JSONB),
            }
        }
        _ => ColumnType::new(JSONB),
    };
    out.nullable |= nullable;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConvertOptions, convert_unit};
    use crate::input::UnitBuilder;
    use crate::oracle::{BasicKind, StructField};

    #[test]
    fn test_table_layout() {
        let mut b = UnitBuilder::new("school");
        let int = b.basic(BasicKind::Int64);
        let text = b.basic(BasicKind::String);
        let tutor = b.structure(vec![StructField::new("Id", int)]);
        b.named("Tutor", tutor);
        let shape = b.structure(vec![
            StructField::new("Id", int),
            StructField::new("IdTutor", int),
            StructField::new("IdMissing", int),
            StructField::new("Identity", int),
            StructField::new("Note", text).tag(r#"sql:"-""#),
            StructField::new("room", text),
        ]);
        let class = b.named("Class", shape);
        b.directive(class, "sql", "ADD UNIQUE(IdTutor)")
            .directive(class, "sql", "ADD UNIQUE (Id, room)");
        let unit = b.build().unwrap();

        let conversion =
            convert_unit(&unit, &ConvertOptions::default().with_tag(Some("sql"))).unwrap();
        let class = conversion.root("Class").unwrap();
        let record = conversion.ir.record(class).unwrap();
        let table = Table::new(&conversion, record, &SqlOptions::default());

        assert_eq!(table.name, "classs");
        let names: Vec<&str> = table.columns.iter().map(|c| c.name).collect();
        assert_eq!(names, ["Id", "IdTutor", "IdMissing", "Identity", "room"]);
        assert_eq!(table.primary().map(|c| c.source_name), Some("Id"));

        let keys: Vec<(&str, Option<&str>)> = table
            .foreign_keys()
            .map(|c| (c.name, c.references.as_deref()))
            .collect();
        assert_eq!(keys, [("IdTutor", Some("tutors"))]);
        assert!(table.columns[1].unique);
        assert!(!table.columns[4].unique);

        let writable: Vec<&str> = table.writable().map(|c| c.name).collect();
        assert_eq!(writable, ["IdTutor", "IdMissing", "Identity"]);
    }
}
