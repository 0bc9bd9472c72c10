//! Go data access for `database/sql` and `github.com/lib/pq`.
//!
//! Each top-level record gets row scanners and CRUD helpers over the table
//! the `sql` backend creates for it. Records with an integer `id` column are
//! keyed by it; records without one are link tables, identified by their
//! foreign keys. Scan destinations follow the shared table layout one to one.
//!
//! Columns stored as `jsonb` need `sql.Scanner`/`driver.Valuer`: local named
//! types get the two methods, anything else goes through `jsonColumn`.

use crate::config::Config;
use crate::convert::Conversion;
use crate::declarations::{Declaration, DeclarationRegistry};
use crate::emit::{self, Dialect};
use crate::error::{Error, InvariantViolation};
use crate::ir::{Alias, DeclaredField, IrId, IrNode, Record};
use crate::output::schema::{self, Column, SqlOptions, Table};
use crate::output::{GoOptions, go_reference, lower_first};
use crate::traits::{Backend, BackendCategory};
use std::fmt::Write;

/// Static instance of the Go data access backend for registry.
pub static GO_SCAN_BACKEND: GoScanBackend = GoScanBackend;

/// Go data access backend implementing the Backend trait.
pub struct GoScanBackend;

impl Backend for GoScanBackend {
    fn name(&self) -> &'static str {
        "go-scan"
    }

    fn language(&self) -> &'static str {
        "go"
    }

    fn extension(&self) -> &'static str {
        "go"
    }

    fn category(&self) -> BackendCategory {
        BackendCategory::Schema
    }

    fn tag(&self) -> Option<&'static str> {
        Some("sql")
    }

    fn generate(&self, conversion: &Conversion, config: &Config) -> Result<String, Error> {
        Ok(generate_go_scan(conversion, &config.go, &config.sql)?)
    }
}

/// Render scanners and CRUD helpers for every top-level record.
pub fn generate_go_scan(
    conversion: &Conversion,
    go: &GoOptions,
    sql: &SqlOptions,
) -> Result<String, InvariantViolation> {
    emit::render(&GoScan { go, sql }, conversion)
}

const IMPORTS: &str = "import (
\t\"database/sql\"
\t\"database/sql/driver\"
\t\"encoding/json\"
\t\"errors\"

\t\"github.com/lib/pq\"
)

";

const HELPERS: &str = "type scanner interface {
\tScan(...interface{}) error
}

// DB groups transaction like objects.
type DB interface {
\tExec(query string, args ...interface{}) (sql.Result, error)
\tQuery(query string, args ...interface{}) (*sql.Rows, error)
\tQueryRow(query string, args ...interface{}) *sql.Row
\tPrepare(query string) (*sql.Stmt, error)
}

func loadJSON(out interface{}, src interface{}) error {
\tif src == nil {
\t\treturn nil
\t}
\tbs, ok := src.([]byte)
\tif !ok {
\t\treturn errors.New(\"not a []byte\")
\t}
\treturn json.Unmarshal(bs, out)
}

func dumpJSON(s interface{}) (driver.Value, error) {
\tb, err := json.Marshal(s)
\tif err != nil {
\t\treturn nil, err
\t}
\treturn driver.Value(string(b)), nil
}

// jsonColumn stores the value pointed to as jsonb.
type jsonColumn struct{ v interface{} }

func (c jsonColumn) Scan(src interface{}) error { return loadJSON(c.v, src) }

func (c jsonColumn) Value() (driver.Value, error) { return dumpJSON(c.v) }

// IDs is a list of primary keys.
type IDs []int64

func (ids IDs) AsSQL() pq.Int64Array {
\treturn pq.Int64Array(ids)
}

// ScanIDs scans the result of a query returning a list of ids.
func ScanIDs(rs *sql.Rows) (ids IDs, err error) {
\tdefer func() {
\t\terrClose := rs.Close()
\t\tif err == nil {
\t\t\terr = errClose
\t\t}
\t}()
\tids = make(IDs, 0, 16)
\tfor rs.Next() {
\t\tvar id int64
\t\tif err = rs.Scan(&id); err != nil {
\t\t\treturn nil, err
\t\t}
\t\tids = append(ids, id)
\t}
\tif err = rs.Err(); err != nil {
\t\treturn nil, err
\t}
\treturn ids, nil
}
";

/// How a column value crosses the driver boundary.
enum Binding {
    Plain,
    /// Native PostgreSQL array.
    Array,
    /// Unnamed or foreign jsonb value.
    Json,
}

/// Local named type that gets `Scan`/`Value` methods for its jsonb column.
fn json_named(conversion: &Conversion, mut id: IrId) -> Option<&str> {
    while let IrNode::Nullable { inner } = &conversion.ir[id] {
        id = *inner;
    }
    match &conversion.ir[id] {
        IrNode::Record(Record { origin, name, .. }) | IrNode::Alias(Alias { origin, name, .. })
            if origin.package == conversion.package =>
        {
            Some(name.as_str())
        }
        _ => None,
    }
}

fn binding(conversion: &Conversion, column: &Column) -> Binding {
    if column.sql.is_array() {
        Binding::Array
    } else if column.sql.is_json() && json_named(conversion, column.ty).is_none() {
        Binding::Json
    } else {
        Binding::Plain
    }
}

/// Scan destination for `s`.
fn destination(conversion: &Conversion, column: &Column) -> String {
    let field = format!("s.{}", column.source_name);
    match binding(conversion, column) {
        Binding::Plain => format!("&{}", field),
        Binding::Array => format!("pq.Array(&{})", field),
        Binding::Json => format!("jsonColumn{{&{}}}", field),
    }
}

/// Query argument for `item`.
fn argument(conversion: &Conversion, column: &Column) -> String {
    let field = format!("item.{}", column.source_name);
    match binding(conversion, column) {
        Binding::Plain => field,
        Binding::Array => format!("pq.Array({})", field),
        Binding::Json => format!("jsonColumn{{&{}}}", field),
    }
}

fn scan_many(name: &str, init: &str, store: &str) -> String {
    format!(
        "func Scan{name}s(rs *sql.Rows) (structs {name}s, err error) {{
\tdefer func() {{
\t\terrClose := rs.Close()
\t\tif err == nil {{
\t\t\terr = errClose
\t\t}}
\t}}()
\tstructs = {init}
\tfor rs.Next() {{
\t\tvar s {name}
\t\ts, err = scanOne{name}(rs)
\t\tif err != nil {{
\t\t\treturn nil, err
\t\t}}
\t\t{store}
\t}}
\tif err = rs.Err(); err != nil {{
\t\treturn nil, err
\t}}
\treturn structs, nil
}}
"
    )
}

/// A table with its column list spelled for queries.
struct Query<'t, 'a> {
    table: &'t Table<'a>,
    columns: String,
}

impl<'t, 'a> Query<'t, 'a> {
    fn new(table: &'t Table<'a>) -> Self {
        let columns: Vec<&str> = table.columns.iter().map(|c| c.name).collect();
        Self {
            table,
            columns: columns.join(", "),
        }
    }

    fn name(&self) -> &str {
        &self.table.record.name
    }

    fn select(&self, filter: &str) -> String {
        format!("SELECT {} FROM {}{}", self.columns, self.table.name, filter)
    }
}

struct GoScan<'a> {
    go: &'a GoOptions,
    sql: &'a SqlOptions,
}

impl GoScan<'_> {
    fn record(&self, conversion: &Conversion, record: &Record) -> String {
        let table = Table::new(conversion, record, self.sql);
        let query = Query::new(&table);
        let mut out = Self::scanners(conversion, &query);
        match table.primary() {
            Some(primary) => Self::keyed(conversion, &query, primary, &mut out),
            None => Self::links(conversion, &query, &mut out),
        }
        for column in table.foreign_keys() {
            Self::by_foreign_key(&query, column, &mut out);
        }
        out
    }

    fn scanners(conversion: &Conversion, query: &Query) -> String {
        let name = query.name();
        let mut targets = String::new();
        for column in &query.table.columns {
            writeln!(targets, "\t\t{},", destination(conversion, column)).unwrap();
        }
        let select = query.select("");

        format!(
            "func scanOne{name}(row scanner) ({name}, error) {{
\tvar s {name}
\terr := row.Scan(
{targets}\t)
\treturn s, err
}}

func Scan{name}(row *sql.Row) ({name}, error) {{
\treturn scanOne{name}(row)
}}

func SelectAll{name}s(tx DB) ({name}s, error) {{
\trows, err := tx.Query(\"{select}\")
\tif err != nil {{
\t\treturn nil, err
\t}}
\treturn Scan{name}s(rows)
}}
"
        )
    }

    /// Tables with an integer primary key.
    fn keyed(conversion: &Conversion, query: &Query, primary: &Column, out: &mut String) {
        let name = query.name();
        let table = &query.table.name;
        let (pk, key) = (primary.name, primary.source_name);
        let columns = &query.columns;
        let one = query.select(&format!(" WHERE {} = $1", pk));
        let many = query.select(&format!(" WHERE {} = ANY($1)", pk));

        write!(
            out,
            "
// Select{name} returns the entry matching id.
func Select{name}(tx DB, id int64) ({name}, error) {{
\trow := tx.QueryRow(\"{one}\", id)
\treturn Scan{name}(row)
}}

// Select{name}s returns the entries matching ids.
func Select{name}s(tx DB, ids ...int64) ({name}s, error) {{
\trows, err := tx.Query(\"{many}\", pq.Int64Array(ids))
\tif err != nil {{
\t\treturn nil, err
\t}}
\treturn Scan{name}s(rows)
}}

type {name}s map[int64]{name}

// IDs returns the keys of the map, in no particular order.
func (m {name}s) IDs() IDs {{
\tout := make(IDs, 0, len(m))
\tfor id := range m {{
\t\tout = append(out, id)
\t}}
\treturn out
}}

"
        )
        .unwrap();
        out.push_str(&scan_many(
            name,
            &format!("make({}s, 16)", name),
            &format!("structs[int64(s.{})] = s", key),
        ));

        let writable: Vec<&Column> = query.table.writable().collect();
        let names: Vec<&str> = writable.iter().map(|c| c.name).collect();
        let args: String = writable
            .iter()
            .map(|c| format!(", {}", argument(conversion, c)))
            .collect();
        let insert = if writable.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, columns)
        } else {
            let placeholders: Vec<String> =
                (1..=writable.len()).map(|i| format!("${}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                table,
                names.join(", "),
                placeholders.join(", "),
                columns
            )
        };
        write!(
            out,
            "
// Insert {name} in the database and returns the item with id filled.
func (item {name}) Insert(tx DB) ({name}, error) {{
\trow := tx.QueryRow(\"{insert}\"{args})
\treturn Scan{name}(row)
}}
"
        )
        .unwrap();

        if !writable.is_empty() {
            let set: Vec<String> = names
                .iter()
                .enumerate()
                .map(|(i, n)| format!("{} = ${}", n, i + 2))
                .collect();
            let update = format!(
                "UPDATE {} SET {} WHERE {} = $1 RETURNING {}",
                table,
                set.join(", "),
                pk,
                columns
            );
            write!(
                out,
                "
// Update {name} in the database and returns the new version.
func (item {name}) Update(tx DB) ({name}, error) {{
\trow := tx.QueryRow(\"{update}\", item.{key}{args})
\treturn Scan{name}(row)
}}
"
            )
            .unwrap();
        }

        write!(
            out,
            "
// Delete{name}ByID deletes the entry matching id and returns it.
func Delete{name}ByID(tx DB, id int64) ({name}, error) {{
\trow := tx.QueryRow(\"DELETE FROM {table} WHERE {pk} = $1 RETURNING {columns}\", id)
\treturn Scan{name}(row)
}}

// Delete{name}sByIDs deletes the entries matching ids and returns the ids removed.
func Delete{name}sByIDs(tx DB, ids ...int64) (IDs, error) {{
\trows, err := tx.Query(\"DELETE FROM {table} WHERE {pk} = ANY($1) RETURNING {pk}\", pq.Int64Array(ids))
\tif err != nil {{
\t\treturn nil, err
\t}}
\treturn ScanIDs(rows)
}}
"
        )
        .unwrap();
    }

    /// Tables without a primary key.
    fn links(conversion: &Conversion, query: &Query, out: &mut String) {
        let name = query.name();
        let table = &query.table.name;
        write!(out, "\ntype {name}s []{name}\n\n").unwrap();
        out.push_str(&scan_many(
            name,
            &format!("make({}s, 0, 16)", name),
            "structs = append(structs, s)",
        ));

        let writable: Vec<&Column> = query.table.writable().collect();
        if !writable.is_empty() {
            let names: String = writable.iter().map(|c| format!(", \"{}\"", c.name)).collect();
            let args: Vec<String> = writable.iter().map(|c| argument(conversion, c)).collect();
            let args = args.join(", ");
            write!(
                out,
                "
// InsertMany{name}s inserts the links in the database.
func InsertMany{name}s(tx *sql.Tx, items ...{name}) error {{
\tif len(items) == 0 {{
\t\treturn nil
\t}}
\tstmt, err := tx.Prepare(pq.CopyIn(\"{table}\"{names}))
\tif err != nil {{
\t\treturn err
\t}}
\tfor _, item := range items {{
\t\tif _, err = stmt.Exec({args}); err != nil {{
\t\t\treturn err
\t\t}}
\t}}
\tif _, err = stmt.Exec(); err != nil {{
\t\treturn err
\t}}
\treturn stmt.Close()
}}
"
            )
            .unwrap();
        }

        let keys: Vec<&Column> = query.table.foreign_keys().collect();
        if keys.is_empty() {
            return;
        }
        let conditions: Vec<String> = keys
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if c.sql.nullable {
                    format!("({0} IS NULL OR {0} = ${1})", c.name, i + 1)
                } else {
                    format!("{} = ${}", c.name, i + 1)
                }
            })
            .collect();
        let fields: Vec<&str> = keys.iter().map(|c| c.source_name).collect();
        let args: String = keys.iter().map(|c| format!(", item.{}", c.source_name)).collect();
        write!(
            out,
            "
// Delete removes the link from the database, matching on {fields}.
func (item {name}) Delete(tx DB) error {{
\t_, err := tx.Exec(\"DELETE FROM {table} WHERE {conditions}\"{args})
\treturn err
}}
",
            fields = fields.join(" and "),
            conditions = conditions.join(" AND "),
        )
        .unwrap();

        for column in keys.iter().filter(|c| !c.sql.nullable) {
            let field = column.source_name;
            if column.unique {
                write!(
                    out,
                    "
// By{field} indexes the links by {field}, unique per link.
func (items {name}s) By{field}() map[int64]{name} {{
\tout := make(map[int64]{name}, len(items))
\tfor _, target := range items {{
\t\tout[int64(target.{field})] = target
\t}}
\treturn out
}}
"
                )
                .unwrap();
            } else {
                write!(
                    out,
                    "
// By{field} groups the links by {field}.
func (items {name}s) By{field}() map[int64]{name}s {{
\tout := make(map[int64]{name}s)
\tfor _, target := range items {{
\t\tkey := int64(target.{field})
\t\tout[key] = append(out[key], target)
\t}}
\treturn out
}}
"
                )
                .unwrap();
            }
        }
    }

    fn by_foreign_key(query: &Query, column: &Column, out: &mut String) {
        let name = query.name();
        let table = &query.table.name;
        let (field, col) = (column.source_name, column.name);
        let var = lower_first(field);

        if column.unique {
            let one = query.select(&format!(" WHERE {} = $1", col));
            write!(
                out,
                "
// Select{name}By{field} returns the entry matching {var}; {col} is unique.
func Select{name}By{field}(tx DB, {var} int64) (item {name}, found bool, err error) {{
\trow := tx.QueryRow(\"{one}\", {var})
\titem, err = Scan{name}(row)
\tif err == sql.ErrNoRows {{
\t\treturn item, false, nil
\t}}
\treturn item, true, err
}}
"
            )
            .unwrap();
        }

        let many = query.select(&format!(" WHERE {} = ANY($1)", col));
        write!(
            out,
            "
// Select{name}sBy{field}s returns the entries whose {col} is one of {var}s.
func Select{name}sBy{field}s(tx DB, {var}s ...int64) ({name}s, error) {{
\trows, err := tx.Query(\"{many}\", pq.Int64Array({var}s))
\tif err != nil {{
\t\treturn nil, err
\t}}
\treturn Scan{name}s(rows)
}}
"
        )
        .unwrap();

        match query.table.primary() {
            Some(primary) => write!(
                out,
                "
// Delete{name}sBy{field}s deletes the entries whose {col} is one of {var}s and returns their ids.
func Delete{name}sBy{field}s(tx DB, {var}s ...int64) (IDs, error) {{
\trows, err := tx.Query(\"DELETE FROM {table} WHERE {col} = ANY($1) RETURNING {pk}\", pq.Int64Array({var}s))
\tif err != nil {{
\t\treturn nil, err
\t}}
\treturn ScanIDs(rows)
}}
",
                pk = primary.name,
            )
            .unwrap(),
            None => write!(
                out,
                "
// Delete{name}sBy{field}s deletes the entries whose {col} is one of {var}s and returns them.
func Delete{name}sBy{field}s(tx DB, {var}s ...int64) ({name}s, error) {{
\trows, err := tx.Query(\"DELETE FROM {table} WHERE {col} = ANY($1) RETURNING {columns}\", pq.Int64Array({var}s))
\tif err != nil {{
\t\treturn nil, err
\t}}
\treturn Scan{name}s(rows)
}}
",
                columns = query.columns,
            )
            .unwrap(),
        }
    }

    fn json_methods(conversion: &Conversion, record: &Record, out: &mut Vec<Declaration>) {
        for field in &record.declared {
            let DeclaredField::Column { name, ty, .. } = field else {
                continue;
            };
            if !schema::column_type(conversion, *ty, name).is_json() {
                continue;
            }
            if let Some(ty) = json_named(conversion, *ty) {
                out.push(Declaration::new(
                    format!("json_value{}", ty),
                    format!(
                        "func (s *{ty}) Scan(src interface{{}}) error {{ return loadJSON(s, src) }}

func (s {ty}) Value() (driver.Value, error) {{ return dumpJSON(s) }}
"
                    ),
                ));
            }
        }
    }
}

impl Dialect for GoScan<'_> {
    fn reference(&self, conversion: &Conversion, id: IrId) -> String {
        go_reference(conversion, id)
    }

    fn roots(&self, conversion: &Conversion) -> Vec<IrId> {
        schema::tables(conversion)
    }

    fn declare(&self, conversion: &Conversion, id: IrId, out: &mut Vec<Declaration>) {
        if !schema::is_table(conversion, id) {
            return;
        }
        if let Some(record) = conversion.ir.record(id) {
            out.push(Declaration::new("__helpers", HELPERS));
            out.push(Declaration::new(
                format!("{}_crud", record.name),
                self.record(conversion, record),
            ));
            Self::json_methods(conversion, record, out);
        }
    }

    fn header(&self, conversion: &Conversion, registry: &DeclarationRegistry) -> String {
        let mut out = String::from("// Code generated by typeweave. DO NOT EDIT.\n\n");
        writeln!(out, "package {}\n", self.go.package_name(&conversion.package)).unwrap();
        if !registry.is_empty() {
            out.push_str(IMPORTS);
        }
        out
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
            convert_unit(unit, &ConvertOptions::default().with_tag(Some("sql"))).unwrap();
        generate_go_scan(&conversion, &GoOptions::default(), &SqlOptions::default()).unwrap()
    }

    #[test]
    fn test_scanner_follows_table_columns() {
        let mut b = UnitBuilder::new("app/models");
        let int = b.basic(BasicKind::Int64);
        let text = b.basic(BasicKind::String);
        let address = b.structure(vec![StructField::new("City", text)]);
        let address = b.named("Address", address);
        let shape = b.structure(vec![
            StructField::new("ID", int).tag(r#"json:"id""#),
            StructField::new("Password", text).tag(r#"json:"-""#),
            StructField::new("Name", text),
            StructField::new("Address", address).embedded(),
        ]);
        b.named("User", shape);
        let out = render(&b.build().unwrap());

        assert!(out.contains("package models\n\nimport (\n\t\"database/sql\"\n"));
        assert!(out.contains("\t\"github.com/lib/pq\"\n)\n"));
        assert!(out.contains("\terr := row.Scan(\n\t\t&s.ID,\n\t\t&s.Name,\n\t\t&s.City,\n\t)\n"));
        assert!(out.contains("rows, err := tx.Query(\"SELECT id, Name, City FROM users\")"));
        assert!(out.contains("func ScanUsers(rs *sql.Rows) (structs Users, err error) {"));
        assert!(out.contains("\t\tstructs[int64(s.ID)] = s\n"));
        // Address is a root record too.
        assert!(out.contains("func scanOneAddress(row scanner) (Address, error) {"));
        assert_eq!(out.matches("type scanner interface").count(), 1);
        assert_eq!(out.matches("type DB interface").count(), 1);
    }

    #[test]
    fn test_keyed_table_crud() {
        let mut b = UnitBuilder::new("shop");
        let int = b.basic(BasicKind::Int64);
        let text = b.basic(BasicKind::String);
        let tags = b.slice(text);
        let shape = b.structure(vec![
            StructField::new("Id", int).tag(r#"sql:"id""#),
            StructField::new("Title", text).tag(r#"sql:"title""#),
            StructField::new("Tags", tags).tag(r#"sql:"tags""#),
            StructField::new("secret", text),
        ]);
        b.named("Item", shape);
        let out = render(&b.build().unwrap());

        assert!(out.contains("\t\t&s.Id,\n\t\t&s.Title,\n\t\tpq.Array(&s.Tags),\n\t\t&s.secret,\n"));
        assert!(out.contains(
            "row := tx.QueryRow(\"SELECT id, title, tags, secret FROM items WHERE id = $1\", id)"
        ));
        assert!(out.contains("func SelectItems(tx DB, ids ...int64) (Items, error) {"));
        assert!(out.contains("type Items map[int64]Item\n"));
        assert!(out.contains(
            "\trow := tx.QueryRow(\"INSERT INTO items (title, tags) VALUES ($1, $2) RETURNING id, title, tags, secret\", item.Title, pq.Array(item.Tags))\n"
        ));
        assert!(out.contains(
            "\trow := tx.QueryRow(\"UPDATE items SET title = $2, tags = $3 WHERE id = $1 RETURNING id, title, tags, secret\", item.Id, item.Title, pq.Array(item.Tags))\n"
        ));
        assert!(out.contains("func DeleteItemByID(tx DB, id int64) (Item, error) {"));
        assert!(out.contains(
            "rows, err := tx.Query(\"DELETE FROM items WHERE id = ANY($1) RETURNING id\", pq.Int64Array(ids))"
        ));
        assert!(!out.contains("InsertMany"));
    }

    #[test]
    fn test_link_table_crud() {
        let mut b = UnitBuilder::new("school");
        let int = b.basic(BasicKind::Int64);
        let nullable = b.pointer(int);
        let tutor = b.structure(vec![StructField::new("Id", int)]);
        b.named("Tutor", tutor);
        let class = b.structure(vec![StructField::new("Id", int)]);
        b.named("Class", class);
        let shape = b.structure(vec![
            StructField::new("IdTutor", int).tag(r#"sql:"id_tutor""#),
            StructField::new("IdClass", nullable).tag(r#"sql:"id_class""#),
        ]);
        let link = b.named("TutorClass", shape);
        b.directive(link, "sql", "ADD UNIQUE(id_tutor)");
        let out = render(&b.build().unwrap());

        assert!(out.contains("type TutorClasss []TutorClass\n"));
        assert!(out.contains("\t\tstructs = append(structs, s)\n"));
        assert!(out.contains(
            "stmt, err := tx.Prepare(pq.CopyIn(\"tutor_classs\", \"id_tutor\", \"id_class\"))"
        ));
        assert!(out.contains("if _, err = stmt.Exec(item.IdTutor, item.IdClass); err != nil {"));
        assert!(out.contains(
            "_, err := tx.Exec(\"DELETE FROM tutor_classs WHERE id_tutor = $1 AND (id_class IS NULL OR id_class = $2)\", item.IdTutor, item.IdClass)"
        ));
        assert!(out.contains(
            "func SelectTutorClassByIdTutor(tx DB, idTutor int64) (item TutorClass, found bool, err error) {"
        ));
        assert!(!out.contains("func SelectTutorClassByIdClass("));
        assert!(out.contains(
            "func SelectTutorClasssByIdClasss(tx DB, idClasss ...int64) (TutorClasss, error) {"
        ));
        assert!(out.contains(
            "func DeleteTutorClasssByIdTutors(tx DB, idTutors ...int64) (TutorClasss, error) {"
        ));
        // Unique key indexes, nullable key has no lookup.
        assert!(out.contains("func (items TutorClasss) ByIdTutor() map[int64]TutorClass {"));
        assert!(!out.contains("ByIdClass()"));
    }

    #[test]
    fn test_json_columns() {
        let mut b = UnitBuilder::new("app/notes");
        let int = b.basic(BasicKind::Int);
        let text = b.basic(BasicKind::String);
        let body = b.structure(vec![StructField::new("Text", text)]);
        let body = b.named("Body", body);
        let optional = b.pointer(body);
        let meta = b.map(text, int);
        let labels = b.named("Labels", meta);
        let inner = b.structure(vec![StructField::new("N", int)]);
        let foreign = b.foreign("lib/audit", "Trail", inner);
        let shape = b.structure(vec![
            StructField::new("Body", optional),
            StructField::new("Labels", labels),
            StructField::new("Meta", meta),
            StructField::new("Trail", foreign),
        ]);
        b.named("Note", shape);
        let out = render(&b.build().unwrap());

        assert!(out.contains(
            "\t\t&s.Body,\n\t\t&s.Labels,\n\t\tjsonColumn{&s.Meta},\n\t\tjsonColumn{&s.Trail},\n"
        ));
        assert!(out.contains(
            "func (s *Labels) Scan(src interface{}) error { return loadJSON(s, src) }\n\nfunc (s Labels) Value() (driver.Value, error) { return dumpJSON(s) }\n"
        ));
        assert!(out.contains("func (s *Body) Scan(src interface{}) error"));
        assert!(!out.contains("func (s *Trail) Scan"));
        assert_eq!(out.matches("func (c jsonColumn) Scan").count(), 1);
    }

    #[test]
    fn test_nested_records_get_no_scanner() {
        let mut b = UnitBuilder::new("p");
        let int = b.basic(BasicKind::Int);
        let inner = b.structure(vec![StructField::new("N", int)]);
        let config = b.foreign("other", "Config", inner);
        let shape = b.structure(vec![StructField::new("Config", config)]);
        b.named("Job", shape);
        let out = render(&b.build().unwrap());
        assert!(out.contains("func ScanJob("));
        assert!(!out.contains("ScanConfig"));
    }

    #[test]
    fn test_empty_unit_has_no_imports() {
        let unit = UnitBuilder::new("p").build().unwrap();
        assert_eq!(render(&unit), "// Code generated by typeweave. DO NOT EDIT.\n\npackage p\n\n");
    }
}
