//! Cell codec: serialize records into B-tree cells and back.
//!
//! Cell layout (big-endian): the 8-byte primary key, then one tagged field
//! per schema column. Integers are 8 bytes, reals are their 8-byte bit
//! pattern, text is a u32 length followed by UTF-8 bytes.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::parser::{DataType, Value};
use crate::record::SimpleRecord;
use crate::schema::Schema;

const TAG_NULL: u8 = 0;
const TAG_INTEGER: u8 = 1;
const TAG_REAL: u8 = 2;
const TAG_TEXT: u8 = 3;

/// Serialize a record into a cell, keyed by its primary-key value.
pub fn serialize_record(record: &SimpleRecord) -> Result<Vec<u8>> {
    let key = record.primary_key()?;
    let mut cell = key.to_be_bytes().to_vec();

    for (column, value) in record.schema.columns.iter().zip(&record.values) {
        match (value, column.data_type) {
            (Value::Null, _) => cell.push(TAG_NULL),
            (Value::Integer(i), DataType::Integer) => {
                cell.push(TAG_INTEGER);
                cell.extend_from_slice(&i.to_be_bytes());
            }
            (Value::Real(r), DataType::Real) => {
                cell.push(TAG_REAL);
                cell.extend_from_slice(&r.to_bits().to_be_bytes());
            }
            (Value::Text(t), DataType::Text) => {
                cell.push(TAG_TEXT);
                cell.extend_from_slice(&(t.len() as u32).to_be_bytes());
                cell.extend_from_slice(t.as_bytes());
            }
            (value, _) => {
                return Err(Error::Serde(format!(
                    "value {value} does not match column '{}' ({})",
                    column.name,
                    column.data_type.ddl_name()
                )))
            }
        }
    }
    Ok(cell)
}

/// Deserialize a cell against a schema.
pub fn deserialize_cell(cell: &[u8], schema: &Rc<Schema>) -> Result<SimpleRecord> {
    let mut reader = Reader { cell, offset: 0 };
    let key = reader.read_i64()?;

    let mut values = Vec::with_capacity(schema.columns.len());
    for column in &schema.columns {
        let tag = reader.read_u8()?;
        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_INTEGER if column.data_type == DataType::Integer => {
                Value::Integer(reader.read_i64()?)
            }
            TAG_REAL if column.data_type == DataType::Real => {
                Value::Real(f64::from_bits(reader.read_i64()? as u64))
            }
            TAG_TEXT if column.data_type == DataType::Text => {
                let len = reader.read_u32()? as usize;
                let bytes = reader.read_bytes(len)?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| Error::Serde(format!("invalid UTF-8 in text field: {e}")))?;
                Value::Text(text.to_string())
            }
            other => {
                return Err(Error::Serde(format!(
                    "tag {other} does not match column '{}' ({})",
                    column.name,
                    column.data_type.ddl_name()
                )))
            }
        };
        values.push(value);
    }

    if reader.offset != cell.len() {
        return Err(Error::Serde(format!(
            "{} trailing bytes after the last field",
            cell.len() - reader.offset
        )));
    }

    let record = SimpleRecord {
        schema: Rc::clone(schema),
        values,
    };
    if record.primary_key()? != key {
        return Err(Error::Serde(format!(
            "cell key {key} disagrees with the primary-key field"
        )));
    }
    Ok(record)
}

struct Reader<'a> {
    cell: &'a [u8],
    offset: usize,
}

impl Reader<'_> {
    fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        if self.offset + len > self.cell.len() {
            return Err(Error::Serde(format!(
                "cell truncated at byte {} (wanted {len} more)",
                self.offset
            )));
        }
        let bytes = &self.cell[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(u32::from_be_bytes(buf))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(buf))
    }
}
