//! Row snapshots and table naming.
//!
//! A row is a JSON object keyed by physical column name. Every row carries its
//! identifier in the [`ROW_ID`] column. User tables are stored under a raw name
//! of the form `tb_<table id>`; caches are keyed by the table id.

use serde_json::{Map, Value};

/// A row snapshot: physical column name → value.
pub type Row = Map<String, Value>;

/// Column holding a row's identifier.
pub const ROW_ID: &str = "_id";

/// Prefix of every user table's raw name.
pub const TABLE_PREFIX: &str = "tb_";

/// The identifier of `row`, if it carries a string `_id`.
pub fn row_id(row: &Row) -> Option<&str> { row.get(ROW_ID).and_then(Value::as_str) }

/// Strip the `tb_` prefix from a raw table name.
///
/// Names without the prefix (meta-tables such as `scripts`) are their own id.
pub fn table_id_from_raw_name(raw: &str) -> &str {
  raw.strip_prefix(TABLE_PREFIX).unwrap_or(raw)
}

/// The raw table name for a table id.
pub fn raw_table_name(table_id: &str) -> String { format!("{TABLE_PREFIX}{table_id}") }
