//! Change signals: one committed mutation against the store.
//!
//! On the wire a signal is
//!
//! ```json
//! { "type": "Update", "payload": { "table": "tb_1", "new": { … }, "old": { … } } }
//! ```
//!
//! Row signals carry row snapshots; column signals carry serialized
//! [`ColumnRecord`](crate::column::ColumnRecord)s. A `type` this version does
//! not know decodes to [`SignalKind::Unknown`], which consumers must ignore.

use serde::{Deserialize, Serialize};

use crate::row::{Row, row_id};

// ─── Kind ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalKind {
  AddColumn,
  UpdateColumn,
  Insert,
  Update,
  Delete,
  /// A kind introduced by a newer writer.
  Unknown(String),
}

impl SignalKind {
  pub fn as_str(&self) -> &str {
    match self {
      Self::AddColumn => "AddColumn",
      Self::UpdateColumn => "UpdateColumn",
      Self::Insert => "Insert",
      Self::Update => "Update",
      Self::Delete => "Delete",
      Self::Unknown(other) => other,
    }
  }
}

impl From<String> for SignalKind {
  fn from(s: String) -> Self {
    match s.as_str() {
      "AddColumn" => Self::AddColumn,
      "UpdateColumn" => Self::UpdateColumn,
      "Insert" => Self::Insert,
      "Update" => Self::Update,
      "Delete" => Self::Delete,
      _ => Self::Unknown(s),
    }
  }
}

impl From<SignalKind> for String {
  fn from(kind: SignalKind) -> Self {
    match kind {
      SignalKind::Unknown(other) => other,
      known => known.as_str().to_owned(),
    }
  }
}

// ─── Signal ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPayload {
  /// Raw name of the affected table.
  pub table: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub new:   Option<Row>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub old:   Option<Row>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSignal {
  #[serde(rename = "type")]
  pub kind:    SignalKind,
  pub payload: SignalPayload,
}

impl ChangeSignal {
  fn new(kind: SignalKind, table: impl Into<String>, new: Option<Row>, old: Option<Row>) -> Self {
    Self { kind, payload: SignalPayload { table: table.into(), new, old } }
  }

  pub fn insert(table: impl Into<String>, new: Row) -> Self {
    Self::new(SignalKind::Insert, table, Some(new), None)
  }

  pub fn update(table: impl Into<String>, new: Row, old: Row) -> Self {
    Self::new(SignalKind::Update, table, Some(new), Some(old))
  }

  pub fn delete(table: impl Into<String>, old: Row) -> Self {
    Self::new(SignalKind::Delete, table, None, Some(old))
  }

  pub fn add_column(table: impl Into<String>, column: Row) -> Self {
    Self::new(SignalKind::AddColumn, table, Some(column), None)
  }

  pub fn update_column(table: impl Into<String>, new: Row, old: Row) -> Self {
    Self::new(SignalKind::UpdateColumn, table, Some(new), Some(old))
  }

  /// Raw name of the affected table.
  pub fn table(&self) -> &str { &self.payload.table }

  /// `_id` of the new row snapshot.
  pub fn new_row_id(&self) -> Option<&str> { self.payload.new.as_ref().and_then(row_id) }

  /// `_id` of the prior row snapshot.
  pub fn old_row_id(&self) -> Option<&str> { self.payload.old.as_ref().and_then(row_id) }

  pub fn to_json(&self) -> serde_json::Result<String> { serde_json::to_string(self) }

  pub fn from_json(s: &str) -> serde_json::Result<Self> { serde_json::from_str(s) }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn row(value: serde_json::Value) -> Row { value.as_object().cloned().unwrap() }

  #[test]
  fn wire_shape_is_exact() {
    let signal = ChangeSignal::update(
      "tb_1",
      row(json!({ "_id": "r1", "val": 7 })),
      row(json!({ "_id": "r1", "val": 5 })),
    );
    let value = serde_json::to_value(&signal).unwrap();
    assert_eq!(
      value,
      json!({
        "type": "Update",
        "payload": {
          "table": "tb_1",
          "new": { "_id": "r1", "val": 7 },
          "old": { "_id": "r1", "val": 5 }
        }
      })
    );
  }

  #[test]
  fn insert_omits_old() {
    let signal = ChangeSignal::insert("tb_1", row(json!({ "_id": "r1" })));
    let value = serde_json::to_value(&signal).unwrap();
    assert!(value["payload"].get("old").is_none());
    assert_eq!(signal.new_row_id(), Some("r1"));
    assert_eq!(signal.old_row_id(), None);
  }

  #[test]
  fn unknown_type_decodes_and_reencodes() {
    let text = r#"{"type":"Truncate","payload":{"table":"tb_9"}}"#;
    let signal = ChangeSignal::from_json(text).unwrap();
    assert_eq!(signal.kind, SignalKind::Unknown("Truncate".into()));
    assert_eq!(signal.table(), "tb_9");
    assert_eq!(signal.to_json().unwrap(), text);
  }
}
