//! Records: the in-memory row representation.
//!
//! A record is either simple (one table's row, tagged with its schema) or
//! joined (fields remember the source table or alias they came from). Both
//! variants are copy-by-value; nothing here shares storage with a page.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::parser::{DataType, Value};
use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Simple(SimpleRecord),
    Joined(JoinedRecord),
}

impl Record {
    /// Resolve a bare column name. On a joined record the name must be
    /// unique across all sources.
    pub fn get(&self, column: &str) -> Result<&Value> {
        match self {
            Record::Simple(r) => r.get(column),
            Record::Joined(r) => r.get(column),
        }
    }

    /// Resolve a scoped `source.column` name. Simple records have no source
    /// scope, so scoped lookup on one is a name error.
    pub fn get_scoped(&self, source: &str, column: &str) -> Result<&Value> {
        match self {
            Record::Simple(_) => Err(Error::Name(format!(
                "scoped name '{source}.{column}' cannot be resolved against a single-source record"
            ))),
            Record::Joined(r) => r.get_scoped(source, column),
        }
    }
}

/// A single table's row, with values aligned to the schema's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleRecord {
    pub schema: Rc<Schema>,
    pub values: Vec<Value>,
}

impl SimpleRecord {
    pub fn get(&self, column: &str) -> Result<&Value> {
        self.schema
            .column_position(column)
            .map(|pos| &self.values[pos])
            .ok_or_else(|| Error::Name(format!("no column '{column}'")))
    }

    /// The primary-key value, used as the row's B-tree key.
    pub fn primary_key(&self) -> Result<i64> {
        match self.values[self.schema.primary_key_position()] {
            Value::Integer(key) => Ok(key),
            ref other => Err(Error::Fatal(format!(
                "primary key of '{}' is not an integer: {other}",
                self.schema.name
            ))),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .zip(self.values.iter())
    }
}

/// One field of a joined record: the value plus the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedField {
    pub source: String,
    pub column: String,
    pub value: Value,
}

/// A record produced by a join. Field order is left sources first, then the
/// most recently joined right source.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub fields: Vec<JoinedField>,
}

impl JoinedRecord {
    /// Join two simple records; both source names must be supplied since
    /// simple records carry no origin of their own.
    pub fn from_simple_records(
        left: &SimpleRecord,
        right: &SimpleRecord,
        left_source: &str,
        right_source: &str,
    ) -> Self {
        let mut fields = Vec::with_capacity(left.values.len() + right.values.len());
        push_simple_fields(&mut fields, left, left_source);
        push_simple_fields(&mut fields, right, right_source);
        JoinedRecord { fields }
    }

    /// Extend an existing joined record with a simple record. Only the right
    /// source name is needed; the joined side already carries per-field
    /// origins.
    pub fn from_joined_and_simple(
        joined: &JoinedRecord,
        right: &SimpleRecord,
        right_source: &str,
    ) -> Self {
        let mut fields = Vec::with_capacity(joined.fields.len() + right.values.len());
        fields.extend(joined.fields.iter().cloned());
        push_simple_fields(&mut fields, right, right_source);
        JoinedRecord { fields }
    }

    /// Bare lookup; ambiguity across sources is a name error.
    pub fn get(&self, column: &str) -> Result<&Value> {
        self.field(column).map(|f| &f.value)
    }

    pub fn get_scoped(&self, source: &str, column: &str) -> Result<&Value> {
        self.field_scoped(source, column).map(|f| &f.value)
    }

    /// The field a bare column name resolves to.
    pub fn field(&self, column: &str) -> Result<&JoinedField> {
        let mut found: Option<&JoinedField> = None;
        for field in &self.fields {
            if field.column == column {
                if let Some(first) = found {
                    return Err(Error::Name(format!(
                        "column '{column}' is ambiguous: present in '{}' and '{}'",
                        first.source, field.source
                    )));
                }
                found = Some(field);
            }
        }
        found.ok_or_else(|| Error::Name(format!("no column '{column}' in joined record")))
    }

    /// The field a scoped `source.column` name resolves to.
    pub fn field_scoped(&self, source: &str, column: &str) -> Result<&JoinedField> {
        self.fields
            .iter()
            .find(|f| f.source == source && f.column == column)
            .ok_or_else(|| Error::Name(format!("no column '{source}.{column}' in joined record")))
    }

    /// The distinct source names this record's fields originate from, in
    /// first-appearance order.
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for field in &self.fields {
            if !sources.contains(&field.source.as_str()) {
                sources.push(&field.source);
            }
        }
        sources
    }
}

fn push_simple_fields(fields: &mut Vec<JoinedField>, record: &SimpleRecord, source: &str) {
    for (column, value) in record.fields() {
        fields.push(JoinedField {
            source: source.to_string(),
            column: column.to_string(),
            value: value.clone(),
        });
    }
}

/// Pairwise join of two simple records.
pub fn join_records(
    left: &SimpleRecord,
    right: &SimpleRecord,
    left_source: &str,
    right_source: &str,
) -> JoinedRecord {
    JoinedRecord::from_simple_records(left, right, left_source, right_source)
}

/// Build a validated record from an INSERT's column and value lists.
///
/// Every named column must exist in the schema, values must match column
/// types (integers widen into REAL columns), non-nullable columns must be
/// given non-null values, and unnamed nullable columns default to null.
pub fn create_record(
    column_names: &[String],
    values: &[Value],
    schema: &Rc<Schema>,
) -> Result<SimpleRecord> {
    if column_names.len() != values.len() {
        return Err(Error::Type(format!(
            "{} columns named but {} values given",
            column_names.len(),
            values.len()
        )));
    }

    let mut row: Vec<Option<Value>> = vec![None; schema.columns.len()];
    for (name, value) in column_names.iter().zip(values) {
        let pos = schema
            .column_position(name)
            .ok_or_else(|| Error::Name(format!("no column '{name}' in table '{}'", schema.name)))?;
        if row[pos].is_some() {
            return Err(Error::Name(format!("column '{name}' specified twice")));
        }
        row[pos] = Some(coerce_value(value, &schema.columns[pos])?);
    }

    let mut out = Vec::with_capacity(schema.columns.len());
    for (column, slot) in schema.columns.iter().zip(row) {
        match slot {
            Some(value) => out.push(value),
            None if column.is_nullable => out.push(Value::Null),
            None => {
                return Err(Error::Type(format!(
                    "column '{}' requires a value",
                    column.name
                )))
            }
        }
    }

    Ok(SimpleRecord {
        schema: Rc::clone(schema),
        values: out,
    })
}

/// Build a catalog row for a newly created table.
pub fn create_catalog_record(
    pkey: i64,
    name: &str,
    root_pagenum: u32,
    sql_text: &str,
    catalog_schema: &Rc<Schema>,
) -> SimpleRecord {
    SimpleRecord {
        schema: Rc::clone(catalog_schema),
        values: vec![
            Value::Integer(pkey),
            Value::Text(name.to_string()),
            Value::Integer(root_pagenum as i64),
            Value::Text(sql_text.to_string()),
        ],
    }
}

fn coerce_value(value: &Value, column: &crate::schema::Column) -> Result<Value> {
    match (value, column.data_type) {
        (Value::Null, _) => {
            if column.is_nullable {
                Ok(Value::Null)
            } else {
                Err(Error::Type(format!(
                    "column '{}' is not nullable",
                    column.name
                )))
            }
        }
        (Value::Integer(_), DataType::Integer) => Ok(value.clone()),
        (Value::Integer(i), DataType::Real) => Ok(Value::Real(*i as f64)),
        (Value::Real(_), DataType::Real) => Ok(value.clone()),
        (Value::Text(_), DataType::Text) => Ok(value.clone()),
        _ => Err(Error::Type(format!(
            "value {value} does not fit column '{}' ({})",
            column.name,
            column.data_type.ddl_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_program, Statement};
    use crate::schema::generate_schema;

    fn schema(sql: &str) -> Rc<Schema> {
        let program = parse_program(sql).unwrap();
        match program.statements.into_iter().next().unwrap() {
            Statement::Create(create) => Rc::new(generate_schema(&create).unwrap()),
            other => panic!("expected create, got {other:?}"),
        }
    }

    fn record(schema: &Rc<Schema>, columns: &[&str], values: Vec<Value>) -> SimpleRecord {
        let names: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
        create_record(&names, &values, schema).unwrap()
    }

    #[test]
    fn test_create_record_fills_and_orders() {
        let s = schema("CREATE TABLE p (id INT PRIMARY KEY, n TEXT, score REAL)");
        let r = record(
            &s,
            &["n", "id"],
            vec![Value::Text("a".into()), Value::Integer(7)],
        );
        assert_eq!(r.values[0], Value::Integer(7));
        assert_eq!(r.values[1], Value::Text("a".into()));
        assert_eq!(r.values[2], Value::Null);
        assert_eq!(r.primary_key().unwrap(), 7);
    }

    #[test]
    fn test_create_record_validation() {
        let s = schema("CREATE TABLE p (id INT PRIMARY KEY, n TEXT NOT NULL)");
        let names = |cols: &[&str]| cols.iter().map(|c| c.to_string()).collect::<Vec<_>>();

        // missing required column
        let err = create_record(&names(&["id"]), &[Value::Integer(1)], &s).unwrap_err();
        assert!(matches!(err, Error::Type(_)));
        // unknown column
        let err = create_record(&names(&["id", "bogus"]), &[Value::Integer(1), Value::Null], &s)
            .unwrap_err();
        assert!(matches!(err, Error::Name(_)));
        // wrong type
        let err = create_record(
            &names(&["id", "n"]),
            &[Value::Text("x".into()), Value::Text("y".into())],
            &s,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Type(_)));
        // null into NOT NULL
        let err = create_record(&names(&["id", "n"]), &[Value::Integer(1), Value::Null], &s)
            .unwrap_err();
        assert!(matches!(err, Error::Type(_)));
    }

    #[test]
    fn test_create_record_widens_integer_into_real() {
        let s = schema("CREATE TABLE p (id INT PRIMARY KEY, score REAL)");
        let r = record(&s, &["id", "score"], vec![Value::Integer(1), Value::Integer(3)]);
        assert_eq!(r.values[1], Value::Real(3.0));
    }

    #[test]
    fn test_joined_record_lookup_and_origin() {
        let ls = schema("CREATE TABLE l (id INT PRIMARY KEY, x INT)");
        let rs = schema("CREATE TABLE r (id INT PRIMARY KEY, y INT)");
        let lr = record(&ls, &["id", "x"], vec![Value::Integer(1), Value::Integer(10)]);
        let rr = record(&rs, &["id", "y"], vec![Value::Integer(1), Value::Integer(100)]);

        let joined = JoinedRecord::from_simple_records(&lr, &rr, "l", "r");
        assert_eq!(joined.sources(), vec!["l", "r"]);
        assert_eq!(joined.get("x").unwrap(), &Value::Integer(10));
        assert_eq!(joined.get_scoped("r", "y").unwrap(), &Value::Integer(100));
        // `id` exists under both sources
        assert!(matches!(joined.get("id"), Err(Error::Name(_))));

        let ms = schema("CREATE TABLE m (id INT PRIMARY KEY, z INT)");
        let mr = record(&ms, &["id", "z"], vec![Value::Integer(1), Value::Integer(1000)]);
        let wider = JoinedRecord::from_joined_and_simple(&joined, &mr, "m");
        assert_eq!(wider.sources(), vec!["l", "r", "m"]);
        assert_eq!(wider.get_scoped("l", "x").unwrap(), &Value::Integer(10));
        assert_eq!(wider.get_scoped("r", "y").unwrap(), &Value::Integer(100));
        assert_eq!(wider.get_scoped("m", "z").unwrap(), &Value::Integer(1000));
        assert_eq!(wider.fields.len(), 6);
    }

    #[test]
    fn test_scoped_lookup_on_simple_record_is_name_error() {
        let s = schema("CREATE TABLE p (id INT PRIMARY KEY)");
        let r = Record::Simple(record(&s, &["id"], vec![Value::Integer(1)]));
        assert!(matches!(r.get_scoped("p", "id"), Err(Error::Name(_))));
    }
}
