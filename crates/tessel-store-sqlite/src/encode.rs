//! Encoding and decoding helpers between Tessel values and SQLite values.
//!
//! Meta-table columns are exchanged as [`SqlValue`]s. User-table rows are JSON
//! objects: scalars map to the matching SQLite storage class, booleans to
//! `0` / `1`, and arrays or objects to compact JSON text. Timestamps are stored
//! as RFC 3339 strings.

use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value as SqliteValue;
use serde_json::{Number, Value};
use tessel_core::{record::SqlValue, row::Row};

// ─── SqlValue ↔ rusqlite ─────────────────────────────────────────────────────

pub fn to_sqlite(value: SqlValue) -> SqliteValue {
  match value {
    SqlValue::Null => SqliteValue::Null,
    SqlValue::Integer(i) => SqliteValue::Integer(i),
    SqlValue::Real(f) => SqliteValue::Real(f),
    SqlValue::Text(s) => SqliteValue::Text(s),
  }
}

pub fn from_sqlite(value: SqliteValue) -> SqlValue {
  match value {
    SqliteValue::Null => SqlValue::Null,
    SqliteValue::Integer(i) => SqlValue::Integer(i),
    SqliteValue::Real(f) => SqlValue::Real(f),
    SqliteValue::Text(s) => SqlValue::Text(s),
    SqliteValue::Blob(b) => SqlValue::Text(String::from_utf8_lossy(&b).into_owned()),
  }
}

// ─── JSON ↔ SqlValue ─────────────────────────────────────────────────────────

pub fn json_to_sql(value: &Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
    Value::Number(n) => match n.as_i64() {
      Some(i) => SqlValue::Integer(i),
      None => n.as_f64().map_or(SqlValue::Null, SqlValue::Real),
    },
    Value::String(s) => SqlValue::Text(s.clone()),
    Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
  }
}

/// Largest magnitude below which every integer is exactly representable.
const EXACT_F64_INT: f64 = 9_007_199_254_740_992.0;

/// Integral reals come back as JSON integers, so a number written as `5` reads
/// back as `5` despite `REAL` column affinity.
pub fn sql_to_json(value: SqlValue) -> Value {
  match value {
    SqlValue::Null => Value::Null,
    SqlValue::Integer(i) => Value::from(i),
    SqlValue::Real(f) if f.fract() == 0.0 && f.abs() < EXACT_F64_INT => Value::from(f as i64),
    SqlValue::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
    SqlValue::Text(s) => Value::String(s),
  }
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

pub fn now() -> String { Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true) }

// ─── Result sets ─────────────────────────────────────────────────────────────

/// Rows returned by [`SqliteStore::query`](crate::SqliteStore::query).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
  pub columns: Vec<String>,
  pub values:  Vec<Vec<SqlValue>>,
}

impl Rows {
  pub fn len(&self) -> usize { self.values.len() }

  pub fn is_empty(&self) -> bool { self.values.is_empty() }

  /// Convert every row into a JSON object keyed by column name.
  pub fn into_json(self) -> Vec<Row> {
    let Rows { columns, values } = self;
    values
      .into_iter()
      .map(|row| {
        columns
          .iter()
          .cloned()
          .zip(row.into_iter().map(sql_to_json))
          .collect()
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn json_scalars_map_to_storage_classes() {
    assert_eq!(json_to_sql(&json!(true)), SqlValue::Integer(1));
    assert_eq!(json_to_sql(&json!(5)), SqlValue::Integer(5));
    assert_eq!(json_to_sql(&json!(2.5)), SqlValue::Real(2.5));
    assert_eq!(json_to_sql(&json!("x")), SqlValue::Text("x".into()));
    assert_eq!(json_to_sql(&json!(["a", 1])), SqlValue::Text(r#"["a",1]"#.into()));
  }

  #[test]
  fn rows_into_json_keys_by_column() {
    let rows = Rows {
      columns: vec!["_id".into(), "val".into()],
      values:  vec![
        vec![SqlValue::Text("r1".into()), SqlValue::Real(5.0)],
        vec![SqlValue::Text("r2".into()), SqlValue::Null],
      ],
    };
    let json = rows.into_json();
    assert_eq!(json.len(), 2);
    assert_eq!(json[0]["_id"], "r1");
    assert_eq!(json[0]["val"], json!(5));
    assert!(json[1]["val"].is_null());
  }

  #[test]
  fn integral_reals_read_back_as_integers() {
    assert_eq!(sql_to_json(SqlValue::Real(10.0)), json!(10));
    assert_eq!(sql_to_json(SqlValue::Real(-3.0)), json!(-3));
    assert_eq!(sql_to_json(SqlValue::Real(2.5)), json!(2.5));
    assert_eq!(sql_to_json(SqlValue::Real(1e300)), json!(1e300));
    assert_eq!(sql_to_json(SqlValue::Real(f64::NAN)), Value::Null);
  }
}
