//! Column descriptors for user tables.
//!
//! Every column of a user table is described by a [`ColumnRecord`] in the
//! `columns` meta-table. Stored columns have a physical SQLite column;
//! computed columns (formulas) are evaluated by the store whenever rows are
//! read or recomputed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::{FieldKind, FieldSpec, Record, RecordSchema};

/// Name of the table backing [`ColumnRecord`].
pub const COLUMN_TABLE: &str = "columns";

// ─── Field types ─────────────────────────────────────────────────────────────

/// The underlying SQLite storage class of a stored column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
  Text,
  Real,
  Integer,
}

impl StorageType {
  pub fn sql_type(self) -> &'static str {
    match self {
      Self::Text => "TEXT",
      Self::Real => "REAL",
      Self::Integer => "INTEGER",
    }
  }
}

/// The user-facing type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
  Text,
  Title,
  Number,
  Checkbox,
  /// Star rating stored as a whole number.
  Rating,
  Date,
  Url,
  Select,
  MultiSelect,
  File,
  Formula,
}

impl FieldType {
  /// Whether values of this type are derived rather than stored.
  pub fn is_computed(self) -> bool { matches!(self, Self::Formula) }

  /// The storage class of the physical column; `None` for computed types.
  pub fn storage_type(self) -> Option<StorageType> {
    match self {
      Self::Formula => None,
      Self::Number => Some(StorageType::Real),
      Self::Checkbox | Self::Rating => Some(StorageType::Integer),
      Self::Text
      | Self::Title
      | Self::Date
      | Self::Url
      | Self::Select
      | Self::MultiSelect
      | Self::File => Some(StorageType::Text),
    }
  }

  /// Whether moving from `old` to `new` changes how values are stored.
  ///
  /// Types sharing a storage class (e.g. `text` and `url`) are not a change.
  pub fn storage_changed(new: Self, old: Self) -> bool {
    new.storage_type() != old.storage_type()
  }
}

// ─── Column record ───────────────────────────────────────────────────────────

/// Type-specific column settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnProperty {
  /// SQL expression over the table's physical columns; formula columns only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub formula: Option<String>,
  #[serde(flatten)]
  pub extra:   Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
  /// `<table_name>.<table_column_name>`.
  pub id:                String,
  /// Display name.
  pub name:              String,
  #[serde(rename = "type")]
  pub field_type:        FieldType,
  /// Raw name of the owning table (`tb_<id>`).
  pub table_name:        String,
  /// Physical column name, and the key used in row snapshots.
  pub table_column_name: String,
  #[serde(default)]
  pub property:          ColumnProperty,
}

impl ColumnRecord {
  pub fn new(
    table_name: impl Into<String>,
    table_column_name: impl Into<String>,
    name: impl Into<String>,
    field_type: FieldType,
  ) -> Self {
    let table_name = table_name.into();
    let table_column_name = table_column_name.into();
    Self {
      id: Self::column_id(&table_name, &table_column_name),
      name: name.into(),
      field_type,
      table_name,
      table_column_name,
      property: ColumnProperty::default(),
    }
  }

  /// A formula column evaluating `expression`.
  pub fn formula(
    table_name: impl Into<String>,
    table_column_name: impl Into<String>,
    name: impl Into<String>,
    expression: impl Into<String>,
  ) -> Self {
    let mut column = Self::new(table_name, table_column_name, name, FieldType::Formula);
    column.property.formula = Some(expression.into());
    column
  }

  pub fn column_id(table_name: &str, table_column_name: &str) -> String {
    format!("{table_name}.{table_column_name}")
  }

  pub fn is_computed(&self) -> bool { self.field_type.is_computed() }
}

impl Record for ColumnRecord {
  const SCHEMA: RecordSchema = RecordSchema {
    table:       COLUMN_TABLE,
    primary_key: "id",
    fields:      &[
      FieldSpec::new("id", FieldKind::Text),
      FieldSpec::new("name", FieldKind::Text),
      FieldSpec::new("type", FieldKind::Text),
      FieldSpec::new("table_name", FieldKind::Text),
      FieldSpec::new("table_column_name", FieldKind::Text),
      FieldSpec::new("property", FieldKind::Json),
    ],
  };

  fn id(&self) -> &str { &self.id }
}
