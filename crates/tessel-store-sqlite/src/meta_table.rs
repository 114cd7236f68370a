//! [`MetaTable`]: generic persistence for typed [`Record`]s.
//!
//! One implementation serves every record type; the record's
//! [`RecordSchema`](tessel_core::record::RecordSchema) supplies the table
//! name, primary key, column order, and which fields are structured. Every
//! mutation publishes the matching change signal.

use std::{fmt, marker::PhantomData};

use serde_json::{Value, json};
use tessel_core::{
  Error as CoreError,
  record::{
    Record, SqlValue, decode_record, encode_field, encode_record, quote_ident,
    record_snapshot,
  },
  row::{ROW_ID, Row},
  signal::ChangeSignal,
};

use crate::{Result, SqliteStore, encode::now};

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Equality conditions for [`MetaTable::list`], combined with `AND`.
#[derive(Debug, Clone, Default)]
pub struct Filter {
  conditions: Vec<(String, Value)>,
}

impl Filter {
  pub fn new() -> Self { Self::default() }

  pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.conditions.push((field.into(), value.into()));
    self
  }

  pub fn is_empty(&self) -> bool { self.conditions.is_empty() }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

/// A record that could not be decoded during a listing.
#[derive(Debug)]
pub struct RecordFailure {
  pub id:    String,
  pub error: CoreError,
}

/// The result of [`MetaTable::list`].
///
/// A record whose columns fail to decode lands in `failures`; it never hides
/// the records that decoded successfully.
#[derive(Debug)]
pub struct Listing<R> {
  pub records:  Vec<R>,
  pub failures: Vec<RecordFailure>,
}

impl<R> Listing<R> {
  /// The decoded records, logging any failures.
  pub fn into_records(self) -> Vec<R> {
    for failure in &self.failures {
      tracing::warn!(id = %failure.id, error = %failure.error, "skipping undecodable record");
    }
    self.records
  }
}

// ─── Meta-table ──────────────────────────────────────────────────────────────

/// Typed access to the table backing `R`.
pub struct MetaTable<R: Record> {
  store:   SqliteStore,
  _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for MetaTable<R> {
  fn clone(&self) -> Self { Self { store: self.store.clone(), _record: PhantomData } }
}

impl<R: Record> fmt::Debug for MetaTable<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetaTable").field("table", &R::SCHEMA.table).finish()
  }
}

impl<R: Record> MetaTable<R> {
  /// Bind to `store`, creating the backing table if needed.
  ///
  /// A schema failure is returned here, so no other operation can run against
  /// a table that does not exist.
  pub async fn open(store: SqliteStore) -> Result<Self> {
    let table = Self { store, _record: PhantomData };
    table.ensure_schema().await?;
    Ok(table)
  }

  pub fn name(&self) -> &'static str { R::SCHEMA.table }

  pub fn store(&self) -> &SqliteStore { &self.store }

  /// Create the backing table if it does not exist.
  pub async fn ensure_schema(&self) -> Result<()> {
    self
      .store
      .execute_batch(R::SCHEMA.create_table_sql())
      .await
      .map_err(|e| CoreError::Schema(format!("creating {}: {e}", R::SCHEMA.table)))?;
    Ok(())
  }

  fn select_sql(&self) -> String {
    format!("SELECT {} FROM {}", R::SCHEMA.column_list(), quote_ident(R::SCHEMA.table))
  }

  fn pk_column(&self) -> String { quote_ident(R::SCHEMA.primary_key) }

  fn unknown_field(&self, field: &str) -> CoreError {
    CoreError::Constraint(format!("{} has no field {field:?}", R::SCHEMA.table))
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Insert `record`. Fails with a constraint error if the id is taken.
  pub async fn insert(&self, record: &R) -> Result<()> {
    let mut params = encode_record(record)?;
    let at = now();
    params.push(SqlValue::Text(at.clone()));
    params.push(SqlValue::Text(at));

    let placeholders = (1..=params.len())
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "INSERT INTO {} ({}, created_at, updated_at) VALUES ({placeholders})",
      quote_ident(R::SCHEMA.table),
      R::SCHEMA.column_list(),
    );
    self.store.execute(sql, params).await?;

    tracing::debug!(table = R::SCHEMA.table, id = record.id(), "record inserted");
    self
      .store
      .publish(ChangeSignal::insert(R::SCHEMA.table, record_snapshot(record)?));
    Ok(())
  }

  /// Overwrite one field of the record `id` and return the updated record.
  ///
  /// Structured fields are serialized before writing. The primary key cannot
  /// be changed.
  pub async fn update_field(&self, id: &str, field: &str, value: Value) -> Result<R> {
    let spec = R::SCHEMA.field(field).ok_or_else(|| self.unknown_field(field))?;
    if spec.name == R::SCHEMA.primary_key {
      return Err(
        CoreError::Constraint(format!("{}: primary key is immutable", R::SCHEMA.table)).into(),
      );
    }
    let encoded = encode_field(spec, &value)?;

    let old = self.get_by_id(id).await?;

    let sql = format!(
      "UPDATE {} SET {} = ?1, updated_at = ?2 WHERE {} = ?3",
      quote_ident(R::SCHEMA.table),
      quote_ident(spec.name),
      self.pk_column(),
    );
    let changed = self
      .store
      .execute(sql, vec![encoded, SqlValue::Text(now()), SqlValue::from(id)])
      .await?;
    if changed == 0 {
      return Err(CoreError::not_found(R::SCHEMA.table, id).into());
    }

    let new = self.get_by_id(id).await?;
    tracing::debug!(table = R::SCHEMA.table, id, field, "record field updated");
    self.store.publish(ChangeSignal::update(
      R::SCHEMA.table,
      record_snapshot(&new)?,
      record_snapshot(&old)?,
    ));
    Ok(new)
  }

  /// Delete the record `id`. Returns whether a record existed.
  pub async fn delete(&self, id: &str) -> Result<bool> {
    // The prior snapshot is best-effort: a record that no longer decodes can
    // still be deleted.
    let old: Row = match self.find(id).await {
      Ok(Some(record)) => record_snapshot(&record)?,
      Ok(None) => return Ok(false),
      Err(e) => {
        tracing::warn!(table = R::SCHEMA.table, id, error = %e, "deleting undecodable record");
        let mut row = Row::new();
        row.insert(ROW_ID.to_owned(), json!(id));
        row.insert(R::SCHEMA.primary_key.to_owned(), json!(id));
        row
      }
    };

    let sql = format!(
      "DELETE FROM {} WHERE {} = ?1",
      quote_ident(R::SCHEMA.table),
      self.pk_column()
    );
    let removed = self.store.execute(sql, vec![SqlValue::from(id)]).await? > 0;
    if removed {
      tracing::debug!(table = R::SCHEMA.table, id, "record deleted");
      self.store.publish(ChangeSignal::delete(R::SCHEMA.table, old));
    }
    Ok(removed)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Fetch the record `id`, or `None` if absent.
  pub async fn find(&self, id: &str) -> Result<Option<R>> {
    let sql = format!("{} WHERE {} = ?1", self.select_sql(), self.pk_column());
    let rows = self.store.query(sql, vec![SqlValue::from(id)]).await?;
    Ok(rows.values.into_iter().next().map(decode_record::<R>).transpose()?)
  }

  /// Fetch the record `id`; a missing record is a not-found error.
  pub async fn get_by_id(&self, id: &str) -> Result<R> {
    self
      .find(id)
      .await?
      .ok_or_else(|| CoreError::not_found(R::SCHEMA.table, id).into())
  }

  /// List records matching `filter`, oldest first.
  pub async fn list(&self, filter: &Filter) -> Result<Listing<R>> {
    let pk_index = R::SCHEMA.primary_key_index().ok_or_else(|| {
      CoreError::Schema(format!("{}: primary key is not a declared field", R::SCHEMA.table))
    })?;

    let mut clauses = Vec::with_capacity(filter.conditions.len());
    let mut params = Vec::with_capacity(filter.conditions.len());
    for (field, value) in &filter.conditions {
      let spec = R::SCHEMA.field(field).ok_or_else(|| self.unknown_field(field))?;
      if spec.is_structured() {
        return Err(
          CoreError::Constraint(format!("cannot filter on structured field {field:?}")).into(),
        );
      }
      params.push(encode_field(spec, value)?);
      clauses.push(format!("{} = ?{}", quote_ident(spec.name), params.len()));
    }

    let mut sql = self.select_sql();
    if !clauses.is_empty() {
      sql.push_str(" WHERE ");
      sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at, rowid");

    let rows = self.store.query(sql, params).await?;

    let mut listing = Listing { records: Vec::with_capacity(rows.len()), failures: Vec::new() };
    for values in rows.values {
      let id = match values.get(pk_index) {
        Some(SqlValue::Text(id)) => id.clone(),
        Some(other) => format!("{other:?}"),
        None => String::new(),
      };
      match decode_record::<R>(values) {
        Ok(record) => listing.records.push(record),
        Err(error) => listing.failures.push(RecordFailure { id, error }),
      }
    }
    Ok(listing)
  }
}
