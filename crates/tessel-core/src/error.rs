//! Error types for `tessel-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The operation targeted a record or row that does not exist.
  #[error("{table}: no record with id {id:?}")]
  NotFound { table: String, id: String },

  /// Duplicate primary key, unknown field, or another schema violation.
  #[error("constraint violation: {0}")]
  Constraint(String),

  /// Backing table creation or migration failed.
  #[error("schema error: {0}")]
  Schema(String),

  /// A structured field failed to marshal or unmarshal.
  #[error("serialization error in {field}: {source}")]
  Serialization {
    field:  String,
    #[source]
    source: serde_json::Error,
  },

  /// A scalar field received a value of the wrong shape.
  #[error("invalid value for {field}: expected {expected}")]
  InvalidValue { field: String, expected: &'static str },

  #[error("unknown script status: {0:?}")]
  UnknownStatus(String),
}

impl Error {
  pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
    Self::NotFound { table: table.into(), id: id.into() }
  }

  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }

  pub fn is_constraint(&self) -> bool { matches!(self, Self::Constraint(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
