//! [`SqliteStore`]: the relational store every other component talks to.

use std::{fmt, path::Path};

use rusqlite::{ErrorCode, params_from_iter, types::Value as SqliteValue};
use tessel_core::{record::SqlValue, signal::ChangeSignal};
use tessel_signal::ChangeSignalBus;

use crate::{
  Error, Result,
  encode::{Rows, from_sqlite, to_sqlite},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tessel data space backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and the signal bus are
/// reference-counted, and clones publish on the same bus.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  bus:  ChangeSignalBus,
}

impl fmt::Debug for SqliteStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SqliteStore").field("bus", &self.bus).finish_non_exhaustive()
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path` with a fresh signal bus.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_bus(path, ChangeSignalBus::new()).await
  }

  /// Open (or create) a store at `path` publishing on `bus`.
  pub async fn open_with_bus(path: impl AsRef<Path>, bus: ChangeSignalBus) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, bus).await
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, ChangeSignalBus::new()).await
  }

  async fn init(conn: tokio_rusqlite::Connection, bus: ChangeSignalBus) -> Result<Self> {
    let store = Self { conn, bus };
    store
      .execute_batch(SCHEMA)
      .await
      .map_err(|e| tessel_core::Error::Schema(format!("connection setup failed: {e}")))?;
    Ok(store)
  }

  /// The bus this store publishes change signals on.
  pub fn bus(&self) -> &ChangeSignalBus { &self.bus }

  pub(crate) fn publish(&self, signal: ChangeSignal) {
    let reached = self.bus.publish(signal);
    tracing::trace!(reached, "change signal dispatched");
  }

  /// Close the underlying connection. Later calls on any clone fail.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  // ── Relational-store interface ────────────────────────────────────────────

  /// Run one parameterized mutation; returns the number of affected rows.
  pub async fn execute(&self, sql: impl Into<String>, params: Vec<SqlValue>) -> Result<usize> {
    let sql = sql.into();
    let params: Vec<SqliteValue> = params.into_iter().map(to_sqlite).collect();
    self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, params_from_iter(params.iter()))?))
      .await
      .map_err(classify)
  }

  /// Run one or more parameterless statements.
  pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<()> {
    let sql = sql.into();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await
      .map_err(classify)
  }

  /// Run one parameterized query and collect every row.
  pub async fn query(&self, sql: impl Into<String>, params: Vec<SqlValue>) -> Result<Rows> {
    let sql = sql.into();
    let params: Vec<SqliteValue> = params.into_iter().map(to_sqlite).collect();
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> =
          stmt.column_names().into_iter().map(str::to_owned).collect();
        let width = columns.len();

        let values = stmt
          .query_map(params_from_iter(params.iter()), |row| {
            (0..width)
              .map(|i| row.get::<_, SqliteValue>(i).map(from_sqlite))
              .collect::<rusqlite::Result<Vec<_>>>()
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Rows { columns, values })
      })
      .await
      .map_err(classify)
  }

  /// Whether a table named `name` exists.
  pub async fn table_exists(&self, name: &str) -> Result<bool> {
    let rows = self
      .query(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        vec![SqlValue::from(name)],
      )
      .await?;
    Ok(!rows.is_empty())
  }
}

/// Surface constraint violations as [`tessel_core::Error::Constraint`].
fn classify(err: tokio_rusqlite::Error) -> Error {
  if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, message)) = &err
    && failure.code == ErrorCode::ConstraintViolation
  {
    let detail = message.clone().unwrap_or_else(|| failure.to_string());
    return tessel_core::Error::Constraint(detail).into();
  }
  Error::Database(err)
}
