//! Error type for `tessel-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] tessel_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("table not found: {0}")]
  TableNotFound(String),
}

impl Error {
  /// A missing record, row, column, or table.
  pub fn is_not_found(&self) -> bool {
    match self {
      Self::Core(e) => e.is_not_found(),
      Self::TableNotFound(_) => true,
      _ => false,
    }
  }

  /// A duplicate key or other schema violation.
  pub fn is_constraint(&self) -> bool { matches!(self, Self::Core(e) if e.is_constraint()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
