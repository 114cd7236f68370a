//! Typed records and their table schemas.
//!
//! A [`Record`] type declares a static [`RecordSchema`]: the backing table, the
//! primary-key field, and the ordered list of persisted fields. Fields of kind
//! [`FieldKind::Json`] are *structured*: they hold arbitrary nested data that
//! is stored as compact JSON text and parsed back on read.
//!
//! The codec functions in this module convert between a record's serde
//! representation and the flat [`SqlValue`] columns written to the store.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Number, Value};

use crate::{
  Error, Result,
  row::{ROW_ID, Row},
};

// ─── SQL values ──────────────────────────────────────────────────────────────

/// A single column value as exchanged with the relational store.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl From<&str> for SqlValue {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for SqlValue {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for SqlValue {
  fn from(i: i64) -> Self { Self::Integer(i) }
}

/// Quote an identifier for inclusion in SQL text.
pub fn quote_ident(ident: &str) -> String {
  format!("\"{}\"", ident.replace('"', "\"\""))
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// How a field is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  Integer,
  Real,
  /// Stored as `0` / `1`.
  Boolean,
  /// Structured value stored as JSON text.
  Json,
}

impl FieldKind {
  pub fn sql_type(self) -> &'static str {
    match self {
      Self::Text | Self::Json => "TEXT",
      Self::Integer => "INTEGER",
      Self::Real => "REAL",
      Self::Boolean => "BOOLEAN",
    }
  }
}

/// One persisted field of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
  pub name:    &'static str,
  pub kind:    FieldKind,
  /// SQL literal used as the column default.
  pub default: Option<&'static str>,
}

impl FieldSpec {
  pub const fn new(name: &'static str, kind: FieldKind) -> Self {
    Self { name, kind, default: None }
  }

  pub const fn with_default(self, default: &'static str) -> Self {
    Self { default: Some(default), ..self }
  }

  pub fn is_structured(&self) -> bool { self.kind == FieldKind::Json }
}

/// The table layout of a record type.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
  pub table:       &'static str,
  /// Name of the primary-key field; must appear in `fields`.
  pub primary_key: &'static str,
  /// Persisted fields in column order.
  pub fields:      &'static [FieldSpec],
}

impl RecordSchema {
  pub fn field(&self, name: &str) -> Option<&FieldSpec> {
    self.fields.iter().find(|f| f.name == name)
  }

  pub fn structured_fields(&self) -> impl Iterator<Item = &FieldSpec> + '_ {
    self.fields.iter().filter(|f| f.is_structured())
  }

  /// Position of the primary key within `fields`.
  pub fn primary_key_index(&self) -> Option<usize> {
    self.fields.iter().position(|f| f.name == self.primary_key)
  }

  /// Comma-separated, quoted column list in field order.
  pub fn column_list(&self) -> String {
    self
      .fields
      .iter()
      .map(|f| quote_ident(f.name))
      .collect::<Vec<_>>()
      .join(", ")
  }

  /// Idempotent DDL for the backing table, including the bookkeeping
  /// timestamp columns.
  pub fn create_table_sql(&self) -> String {
    let mut columns: Vec<String> = self
      .fields
      .iter()
      .map(|f| {
        let mut column = format!("{} {}", quote_ident(f.name), f.kind.sql_type());
        if f.name == self.primary_key {
          column.push_str(" PRIMARY KEY");
        }
        if let Some(default) = f.default {
          column.push_str(" DEFAULT ");
          column.push_str(default);
        }
        column
      })
      .collect();
    columns.push("created_at TEXT".to_owned());
    columns.push("updated_at TEXT".to_owned());

    format!(
      "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
      quote_ident(self.table),
      columns.join(",\n    ")
    )
  }
}

/// A typed record persisted by a meta-table.
///
/// The serde representation must be a JSON object whose keys include every
/// field named in [`Record::SCHEMA`]. Absent keys are stored as `NULL`, and
/// `NULL` columns are omitted on read, so optional fields should carry
/// `#[serde(default)]`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
  const SCHEMA: RecordSchema;

  /// The caller-assigned primary key.
  fn id(&self) -> &str;
}

// ─── Field codec ─────────────────────────────────────────────────────────────

fn invalid(spec: &FieldSpec, expected: &'static str) -> Error {
  Error::InvalidValue { field: spec.name.to_owned(), expected }
}

/// Encode one field value for storage.
pub fn encode_field(spec: &FieldSpec, value: &Value) -> Result<SqlValue> {
  if value.is_null() {
    return Ok(SqlValue::Null);
  }
  match spec.kind {
    FieldKind::Json => serde_json::to_string(value)
      .map(SqlValue::Text)
      .map_err(|source| Error::Serialization { field: spec.name.to_owned(), source }),
    FieldKind::Text => value
      .as_str()
      .map(SqlValue::from)
      .ok_or_else(|| invalid(spec, "a string")),
    FieldKind::Integer => value
      .as_i64()
      .map(SqlValue::Integer)
      .ok_or_else(|| invalid(spec, "an integer")),
    FieldKind::Real => value
      .as_f64()
      .map(SqlValue::Real)
      .ok_or_else(|| invalid(spec, "a number")),
    FieldKind::Boolean => value
      .as_bool()
      .map(|b| SqlValue::Integer(i64::from(b)))
      .ok_or_else(|| invalid(spec, "a boolean")),
  }
}

/// Decode one stored column. `NULL` decodes to `None`.
pub fn decode_field(spec: &FieldSpec, value: SqlValue) -> Result<Option<Value>> {
  let decoded = match (spec.kind, value) {
    (_, SqlValue::Null) => return Ok(None),
    (FieldKind::Json, SqlValue::Text(text)) => serde_json::from_str(&text)
      .map_err(|source| Error::Serialization { field: spec.name.to_owned(), source })?,
    (FieldKind::Boolean, SqlValue::Integer(i)) => Value::Bool(i != 0),
    (_, SqlValue::Integer(i)) => Value::from(i),
    (_, SqlValue::Real(f)) => Number::from_f64(f)
      .map(Value::Number)
      .ok_or_else(|| invalid(spec, "a finite number"))?,
    (_, SqlValue::Text(text)) => Value::String(text),
  };
  Ok(Some(decoded))
}

// ─── Record codec ────────────────────────────────────────────────────────────

fn to_object<R: Record>(record: &R) -> Result<Map<String, Value>> {
  let value = serde_json::to_value(record).map_err(|source| Error::Serialization {
    field: R::SCHEMA.table.to_owned(),
    source,
  })?;
  match value {
    Value::Object(map) => Ok(map),
    _ => Err(Error::InvalidValue {
      field:    R::SCHEMA.table.to_owned(),
      expected: "a JSON object",
    }),
  }
}

/// Encode every schema field of `record`, in schema order.
pub fn encode_record<R: Record>(record: &R) -> Result<Vec<SqlValue>> {
  let map = to_object(record)?;
  R::SCHEMA
    .fields
    .iter()
    .map(|spec| encode_field(spec, map.get(spec.name).unwrap_or(&Value::Null)))
    .collect()
}

/// Decode a record from columns read in schema order.
pub fn decode_record<R: Record>(values: Vec<SqlValue>) -> Result<R> {
  let mut map = Map::new();
  for (spec, value) in R::SCHEMA.fields.iter().zip(values) {
    if let Some(decoded) = decode_field(spec, value)? {
      map.insert(spec.name.to_owned(), decoded);
    }
  }
  serde_json::from_value(Value::Object(map)).map_err(|source| Error::Serialization {
    field: R::SCHEMA.table.to_owned(),
    source,
  })
}

/// The record as a row snapshot suitable for a change signal.
///
/// The primary key is mirrored into `_id` so that row caches can key meta
/// records the same way as user-table rows.
pub fn record_snapshot<R: Record>(record: &R) -> Result<Row> {
  let mut map = to_object(record)?;
  map
    .entry(ROW_ID)
    .or_insert_with(|| Value::String(record.id().to_owned()));
  Ok(map)
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use serde::Deserialize;
  use serde_json::json;

  use super::*;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Note {
    id:      String,
    title:   String,
    #[serde(default)]
    pinned:  bool,
    #[serde(default)]
    score:   Option<f64>,
    #[serde(default)]
    tags:    Vec<String>,
    #[serde(default)]
    extra:   BTreeMap<String, Value>,
  }

  impl Record for Note {
    const SCHEMA: RecordSchema = RecordSchema {
      table:       "notes",
      primary_key: "id",
      fields:      &[
        FieldSpec::new("id", FieldKind::Text),
        FieldSpec::new("title", FieldKind::Text),
        FieldSpec::new("pinned", FieldKind::Boolean).with_default("0"),
        FieldSpec::new("score", FieldKind::Real),
        FieldSpec::new("tags", FieldKind::Json),
        FieldSpec::new("extra", FieldKind::Json),
      ],
    };

    fn id(&self) -> &str { &self.id }
  }

  fn note() -> Note {
    Note {
      id:     "n1".into(),
      title:  "Groceries".into(),
      pinned: true,
      score:  Some(0.5),
      tags:   vec!["home".into(), "weekly".into()],
      extra:  BTreeMap::from([
        ("nested".to_owned(), json!({ "a": [1, 2, { "b": null }] })),
        ("flag".to_owned(), json!(false)),
      ]),
    }
  }

  #[test]
  fn record_roundtrip_preserves_structured_fields() {
    let original = note();
    let columns = encode_record(&original).unwrap();
    assert_eq!(columns.len(), Note::SCHEMA.fields.len());
    assert_eq!(columns[2], SqlValue::Integer(1));
    assert!(matches!(&columns[4], SqlValue::Text(t) if t == r#"["home","weekly"]"#));

    let decoded: Note = decode_record(columns).unwrap();
    assert_eq!(decoded, original);
  }

  #[test]
  fn null_columns_decode_as_absent() {
    let columns = vec![
      SqlValue::from("n2"),
      SqlValue::from("Empty"),
      SqlValue::Null,
      SqlValue::Null,
      SqlValue::Null,
      SqlValue::Null,
    ];
    let decoded: Note = decode_record(columns).unwrap();
    assert!(!decoded.pinned);
    assert_eq!(decoded.score, None);
    assert!(decoded.tags.is_empty());
  }

  #[test]
  fn malformed_structured_column_names_the_field() {
    let columns = vec![
      SqlValue::from("n3"),
      SqlValue::from("Broken"),
      SqlValue::Integer(0),
      SqlValue::Null,
      SqlValue::from("[not json"),
      SqlValue::Null,
    ];
    let err = decode_record::<Note>(columns).unwrap_err();
    assert!(matches!(err, Error::Serialization { ref field, .. } if field == "tags"));
  }

  #[test]
  fn scalar_type_mismatch_is_rejected() {
    let spec = FieldSpec::new("pinned", FieldKind::Boolean);
    let err = encode_field(&spec, &json!("yes")).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { expected: "a boolean", .. }));
  }

  #[test]
  fn create_table_sql_marks_primary_key_and_defaults() {
    let sql = Note::SCHEMA.create_table_sql();
    assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"notes\""));
    assert!(sql.contains("\"id\" TEXT PRIMARY KEY"));
    assert!(sql.contains("\"pinned\" BOOLEAN DEFAULT 0"));
    assert!(sql.contains("updated_at TEXT"));
  }

  #[test]
  fn snapshot_mirrors_id() {
    let snapshot = record_snapshot(&note()).unwrap();
    assert_eq!(snapshot.get(ROW_ID), Some(&json!("n1")));
    assert_eq!(snapshot.get("title"), Some(&json!("Groceries")));
  }

  #[test]
  fn quote_ident_escapes_quotes() {
    assert_eq!(quote_ident("plain"), "\"plain\"");
    assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
  }
}
