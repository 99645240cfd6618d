//! Table schemas: generation from parsed DDL, validation, and the canonical
//! DDL text stored in the catalog.

use crate::error::{Error, Result};
use crate::parser::{CreateStmnt, DataType};

/// The reserved, case-insensitive name of the system catalog.
pub const CATALOG_TABLE_NAME: &str = "catalog";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub is_primary_key: bool,
    pub is_nullable: bool,
}

/// A named, ordered list of columns. Exactly one column is the primary key;
/// its values are the table's B-tree keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Position of the primary-key column. Valid schemas always have one.
    pub fn primary_key_position(&self) -> usize {
        self.columns
            .iter()
            .position(|c| c.is_primary_key)
            .unwrap_or(0)
    }

    pub fn primary_key_column(&self) -> &Column {
        &self.columns[self.primary_key_position()]
    }
}

/// Generate a validated schema from a CREATE statement.
///
/// Rejects duplicate column names, zero or multiple primary keys, and
/// non-integer primary keys (the key must be totally ordered to serve as a
/// B-tree key).
pub fn generate_schema(stmnt: &CreateStmnt) -> Result<Schema> {
    if stmnt.table_name.eq_ignore_ascii_case(CATALOG_TABLE_NAME) {
        return Err(Error::Schema(format!(
            "table name '{}' is reserved",
            stmnt.table_name
        )));
    }

    let mut columns = Vec::with_capacity(stmnt.columns.len());
    for def in &stmnt.columns {
        if columns.iter().any(|c: &Column| c.name == def.name) {
            return Err(Error::Schema(format!("duplicate column '{}'", def.name)));
        }
        columns.push(Column {
            name: def.name.clone(),
            data_type: def.data_type,
            is_primary_key: def.is_primary_key,
            is_nullable: def.is_nullable,
        });
    }

    let pk_cols: Vec<&Column> = columns.iter().filter(|c| c.is_primary_key).collect();
    if pk_cols.len() != 1 {
        return Err(Error::Schema(format!(
            "table '{}' must have exactly one primary key column, found {}",
            stmnt.table_name,
            pk_cols.len()
        )));
    }
    let pk = pk_cols[0];
    if pk.data_type != DataType::Integer {
        return Err(Error::Schema(format!(
            "primary key column '{}' must be INTEGER",
            pk.name
        )));
    }

    Ok(Schema {
        name: stmnt.table_name.clone(),
        columns,
    })
}

/// Render a schema back to canonical DDL. This is the text persisted in the
/// catalog; re-parsing it regenerates an equal schema.
pub fn schema_to_ddl(schema: &Schema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", c.name, c.data_type.ddl_name());
            if c.is_primary_key {
                def.push_str(" PRIMARY KEY");
            } else if !c.is_nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", schema.name, columns)
}

/// The fixed schema of the system catalog. Not user-defined; its tree lives
/// at a root page known a priori.
pub fn catalog_schema() -> Schema {
    Schema {
        name: CATALOG_TABLE_NAME.to_string(),
        columns: vec![
            Column {
                name: "pkey".to_string(),
                data_type: DataType::Integer,
                is_primary_key: true,
                is_nullable: false,
            },
            Column {
                name: "name".to_string(),
                data_type: DataType::Text,
                is_primary_key: false,
                is_nullable: false,
            },
            Column {
                name: "root_pagenum".to_string(),
                data_type: DataType::Integer,
                is_primary_key: false,
                is_nullable: false,
            },
            Column {
                name: "sql_text".to_string(),
                data_type: DataType::Text,
                is_primary_key: false,
                is_nullable: false,
            },
        ],
    }
}
