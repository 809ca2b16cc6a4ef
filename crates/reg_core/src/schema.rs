//! Record introspection and the tabular view handed to engines
//!
//! A record type describes its fields through [`Record`]. Only three column
//! kinds are accepted (text, boolean, 32-bit float); anything else can be
//! declared as [`FieldType::Unsupported`] and is rejected when a system is
//! built over the type.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{RegressionError, Result};

/// Kind of a column a regression system can consume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Text,
    Boolean,
    Float32,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Text => f.write_str("text"),
            ColumnKind::Boolean => f.write_str("boolean"),
            ColumnKind::Float32 => f.write_str("float32"),
        }
    }
}

/// Declared type of a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Boolean,
    Float32,
    /// Any other shape (nested object, integer, timestamp...)
    Unsupported { type_name: &'static str },
}

impl FieldType {
    /// Column kind for supported field types
    pub fn column_kind(&self) -> Option<ColumnKind> {
        match self {
            FieldType::Text => Some(ColumnKind::Text),
            FieldType::Boolean => Some(ColumnKind::Boolean),
            FieldType::Float32 => Some(ColumnKind::Float32),
            FieldType::Unsupported { .. } => None,
        }
    }
}

/// Name and declared type of one record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type }
    }
}

/// Value held by a supported field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    Text(String),
    Boolean(bool),
    Float32(f32),
}

impl ColumnValue {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnValue::Text(_) => ColumnKind::Text,
            ColumnValue::Boolean(_) => ColumnKind::Boolean,
            ColumnValue::Float32(_) => ColumnKind::Float32,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ColumnValue::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ColumnValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Plain data shape a regression system is trained on.
///
/// Implementations enumerate their fields in declaration order and expose
/// each supported field's current value by name.
///
/// ```ignore
/// impl Record for House {
///     fn fields() -> Vec<FieldDescriptor> {
///         vec![
///             FieldDescriptor::new("district", FieldType::Text),
///             FieldDescriptor::new("garden", FieldType::Boolean),
///             FieldDescriptor::new("price", FieldType::Float32),
///         ]
///     }
///
///     fn value(&self, field: &str) -> Option<ColumnValue> {
///         match field {
///             "district" => Some(ColumnValue::Text(self.district.clone())),
///             "garden" => Some(ColumnValue::Boolean(self.garden)),
///             "price" => Some(ColumnValue::Float32(self.price)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Record: Clone + Send + Sync + 'static {
    /// All fields of the type, in declaration order
    fn fields() -> Vec<FieldDescriptor>;

    /// Current value of a supported field
    fn value(&self, field: &str) -> Option<ColumnValue>;

    /// Look a field up by name
    fn has_field(name: &str) -> bool {
        Self::fields().iter().any(|f| f.name == name)
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered set of columns describing a record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Build the schema of `T`, rejecting fields of unsupported types
    pub fn of<T: Record>() -> Result<Self> {
        let mut columns = Vec::new();
        for field in T::fields() {
            let kind = field.field_type.column_kind().ok_or_else(|| {
                let type_name = match field.field_type {
                    FieldType::Unsupported { type_name } => type_name,
                    _ => "unknown",
                };
                RegressionError::invalid(
                    "TData",
                    format!(
                        "Type of field {} ({}) is not supported. Only text, boolean and float32 are allowed.",
                        field.name, type_name
                    ),
                )
            })?;
            columns.push(Column {
                name: field.name.to_string(),
                kind,
            });
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Same column names and kinds, in the same order
    pub fn is_compatible_with(&self, other: &Schema) -> bool {
        self.columns == other.columns
    }

    /// Convert a record into a row aligned with this schema
    pub fn row_of<T: Record>(&self, record: &T) -> Result<DataRow> {
        let mut values = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = record.value(&column.name).ok_or_else(|| {
                RegressionError::invalid(
                    "record",
                    format!("field {} returned no value", column.name),
                )
            })?;
            if value.kind() != column.kind {
                return Err(RegressionError::invalid(
                    "record",
                    format!(
                        "field {} holds a {} value but is declared as {}",
                        column.name,
                        value.kind(),
                        column.kind
                    ),
                ));
            }
            values.push(value);
        }
        Ok(DataRow { values })
    }

    /// Convert a batch of records into a view sharing this schema
    pub fn view_of<T: Record>(self: &Arc<Self>, records: &[T]) -> Result<DataView> {
        let rows = records
            .iter()
            .map(|r| self.row_of(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(DataView::new(Arc::clone(self), rows))
    }
}

/// One record's values, ordered like its schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    values: Vec<ColumnValue>,
}

impl DataRow {
    pub fn new(values: Vec<ColumnValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[ColumnValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&ColumnValue> {
        self.values.get(index)
    }
}

/// Rows plus the schema they conform to
#[derive(Debug, Clone)]
pub struct DataView {
    schema: Arc<Schema>,
    rows: Vec<DataRow>,
}

impl DataView {
    pub fn new(schema: Arc<Schema>, rows: Vec<DataRow>) -> Self {
        Self { schema, rows }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<DataRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Float32 column values by name; `None` when the column is missing or not float32
    pub fn float_column(&self, name: &str) -> Option<Vec<f32>> {
        let index = self.schema.index_of(name)?;
        self.rows
            .iter()
            .map(|row| row.get(index).and_then(ColumnValue::as_f32))
            .collect()
    }
}
