//! [`DataSpace`]: user tables, their column catalog, and computed-column
//! evaluation.
//!
//! A user table with id `x` is stored as `tb_x` with a `_id` primary key and
//! one physical column per stored column. Formula columns have no physical
//! column: their expressions are projected whenever rows are read, which is
//! what [`RecomputeEngine::recompute`] does for a set of row ids.

use std::collections::HashSet;

use serde_json::Value;
use tessel_core::{
  Error as CoreError,
  column::{ColumnProperty, ColumnRecord, FieldType},
  recompute::RecomputeEngine,
  record::{SqlValue, quote_ident, record_snapshot},
  row::{ROW_ID, Row, raw_table_name, row_id},
  signal::ChangeSignal,
};
use uuid::Uuid;

use crate::{
  Error, Filter, MetaTable, Result, SqliteStore,
  encode::json_to_sql,
};

/// User tables and their columns.
#[derive(Debug, Clone)]
pub struct DataSpace {
  store:   SqliteStore,
  columns: MetaTable<ColumnRecord>,
}

impl DataSpace {
  pub async fn open(store: SqliteStore) -> Result<Self> {
    let columns = MetaTable::open(store.clone()).await?;
    Ok(Self { store, columns })
  }

  pub fn store(&self) -> &SqliteStore { &self.store }

  // ── Tables ────────────────────────────────────────────────────────────────

  /// Create a table with a generated id and return the id.
  pub async fn create_table(&self) -> Result<String> {
    let table_id = Uuid::new_v4().simple().to_string();
    self.create_table_with_id(&table_id).await?;
    Ok(table_id)
  }

  /// Create the table `table_id` if it does not exist.
  pub async fn create_table_with_id(&self, table_id: &str) -> Result<()> {
    let raw = raw_table_name(table_id);
    let sql = format!(
      "CREATE TABLE IF NOT EXISTS {} ({} TEXT PRIMARY KEY)",
      quote_ident(&raw),
      quote_ident(ROW_ID)
    );
    self
      .store
      .execute_batch(sql)
      .await
      .map_err(|e| CoreError::Schema(format!("creating {raw}: {e}")))?;
    tracing::info!(table = %raw, "table created");
    Ok(())
  }

  async fn require_table(&self, table_id: &str) -> Result<String> {
    let raw = raw_table_name(table_id);
    if self.store.table_exists(&raw).await? {
      Ok(raw)
    } else {
      Err(Error::TableNotFound(raw))
    }
  }

  // ── Columns ───────────────────────────────────────────────────────────────

  /// Every column of `table_id`, in creation order.
  pub async fn columns(&self, table_id: &str) -> Result<Vec<ColumnRecord>> {
    let filter = Filter::new().eq("table_name", raw_table_name(table_id));
    Ok(self.columns.list(&filter).await?.into_records())
  }

  pub async fn column(&self, table_id: &str, table_column_name: &str) -> Result<ColumnRecord> {
    let id = ColumnRecord::column_id(&raw_table_name(table_id), table_column_name);
    self.columns.get_by_id(&id).await
  }

  async fn computed_columns(&self, table_id: &str) -> Result<Vec<ColumnRecord>> {
    let mut columns = self.columns(table_id).await?;
    columns.retain(ColumnRecord::is_computed);
    Ok(columns)
  }

  async fn stored_column_names(&self, table_id: &str) -> Result<HashSet<String>> {
    Ok(
      self
        .columns(table_id)
        .await?
        .into_iter()
        .filter(|c| !c.is_computed())
        .map(|c| c.table_column_name)
        .collect(),
    )
  }

  /// Add `column` to its table and publish `AddColumn`.
  pub async fn add_column(&self, column: ColumnRecord) -> Result<()> {
    let table_id = tessel_core::row::table_id_from_raw_name(&column.table_name).to_owned();
    let raw = self.require_table(&table_id).await?;
    if column.table_column_name == ROW_ID {
      return Err(CoreError::Constraint(format!("{ROW_ID} is reserved")).into());
    }

    match column.field_type.storage_type() {
      Some(storage) => {
        let sql = format!(
          "ALTER TABLE {} ADD COLUMN {} {}",
          quote_ident(&raw),
          quote_ident(&column.table_column_name),
          storage.sql_type()
        );
        self.store.execute_batch(sql).await?;
      }
      None => require_formula(&column)?,
    }

    self.columns.insert(&column).await?;
    tracing::debug!(table = %raw, column = %column.table_column_name, "column added");
    self
      .store
      .publish(ChangeSignal::add_column(raw, record_snapshot(&column)?));
    Ok(())
  }

  /// Change a column's type and settings and publish `UpdateColumn`.
  ///
  /// Physical storage follows the new type: a column becoming computed loses
  /// its physical column, a column becoming stored gains one, and a storage
  /// class change casts the existing values.
  pub async fn update_column(
    &self,
    table_id: &str,
    table_column_name: &str,
    field_type: FieldType,
    property: ColumnProperty,
  ) -> Result<ColumnRecord> {
    let raw = self.require_table(table_id).await?;
    let old = self.column(table_id, table_column_name).await?;
    let new = ColumnRecord { field_type, property, ..old.clone() };
    if new.is_computed() {
      require_formula(&new)?;
    }

    let table = quote_ident(&raw);
    let column = quote_ident(table_column_name);
    match (old.field_type.storage_type(), new.field_type.storage_type()) {
      (None, Some(storage)) => {
        self
          .store
          .execute_batch(format!("ALTER TABLE {table} ADD COLUMN {column} {}", storage.sql_type()))
          .await?;
      }
      (Some(_), None) => {
        self
          .store
          .execute_batch(format!("ALTER TABLE {table} DROP COLUMN {column}"))
          .await?;
      }
      (Some(from), Some(to)) if from != to => {
        self
          .store
          .execute(
            format!("UPDATE {table} SET {column} = CAST({column} AS {})", to.sql_type()),
            Vec::new(),
          )
          .await?;
      }
      _ => {}
    }

    self
      .columns
      .update_field(&old.id, "type", serde_json::to_value(new.field_type)?)
      .await?;
    let new = self
      .columns
      .update_field(&old.id, "property", serde_json::to_value(&new.property)?)
      .await?;

    tracing::debug!(table = %raw, column = table_column_name, ?field_type, "column updated");
    self.store.publish(ChangeSignal::update_column(
      raw,
      record_snapshot(&new)?,
      record_snapshot(&old)?,
    ));
    Ok(new)
  }

  // ── Rows ──────────────────────────────────────────────────────────────────

  /// Reject keys that are not stored columns of the table.
  async fn check_row_keys(&self, table_id: &str, row: &Row) -> Result<()> {
    let stored = self.stored_column_names(table_id).await?;
    match row.keys().find(|k| k.as_str() != ROW_ID && !stored.contains(k.as_str())) {
      Some(key) => Err(
        CoreError::Constraint(format!("{key:?} is not a stored column of {table_id}")).into(),
      ),
      None => Ok(()),
    }
  }

  async fn fetch_stored(&self, raw: &str, row_id: &str) -> Result<Option<Row>> {
    let sql = format!(
      "SELECT * FROM {} WHERE {} = ?1",
      quote_ident(raw),
      quote_ident(ROW_ID)
    );
    let rows = self.store.query(sql, vec![SqlValue::from(row_id)]).await?;
    Ok(rows.into_json().into_iter().next())
  }

  /// Insert `row` and publish `Insert`. A missing `_id` is generated.
  /// Returns the row id.
  pub async fn insert_row(&self, table_id: &str, mut row: Row) -> Result<String> {
    let raw = self.require_table(table_id).await?;
    self.check_row_keys(table_id, &row).await?;

    let id = match row_id(&row) {
      Some(id) => id.to_owned(),
      None => {
        let id = Uuid::new_v4().simple().to_string();
        row.insert(ROW_ID.to_owned(), Value::String(id.clone()));
        id
      }
    };

    let names: Vec<String> = row.keys().map(|k| quote_ident(k)).collect();
    let params: Vec<SqlValue> = row.values().map(json_to_sql).collect();
    let placeholders = (1..=params.len())
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "INSERT INTO {} ({}) VALUES ({placeholders})",
      quote_ident(&raw),
      names.join(", ")
    );
    self.store.execute(sql, params).await?;

    tracing::debug!(table = %raw, id = %id, "row inserted");
    self.store.publish(ChangeSignal::insert(raw, row));
    Ok(id)
  }

  /// Apply `changes` to the row `row_id` and publish `Update`.
  pub async fn update_row(&self, table_id: &str, row_id: &str, changes: Row) -> Result<()> {
    let raw = self.require_table(table_id).await?;
    self.check_row_keys(table_id, &changes).await?;
    let old = self
      .fetch_stored(&raw, row_id)
      .await?
      .ok_or_else(|| CoreError::not_found(raw.clone(), row_id))?;

    let mut assignments = Vec::new();
    let mut params = Vec::new();
    for (column, value) in changes.iter().filter(|(k, _)| k.as_str() != ROW_ID) {
      params.push(json_to_sql(value));
      assignments.push(format!("{} = ?{}", quote_ident(column), params.len()));
    }
    if !assignments.is_empty() {
      params.push(SqlValue::from(row_id));
      let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        quote_ident(&raw),
        assignments.join(", "),
        quote_ident(ROW_ID),
        params.len()
      );
      self.store.execute(sql, params).await?;
    }

    let new = self
      .fetch_stored(&raw, row_id)
      .await?
      .ok_or_else(|| CoreError::not_found(raw.clone(), row_id))?;
    tracing::debug!(table = %raw, id = row_id, "row updated");
    self.store.publish(ChangeSignal::update(raw, new, old));
    Ok(())
  }

  /// Delete the row `row_id`; publishes `Delete` if it existed.
  pub async fn delete_row(&self, table_id: &str, row_id: &str) -> Result<bool> {
    let raw = self.require_table(table_id).await?;
    let Some(old) = self.fetch_stored(&raw, row_id).await? else {
      return Ok(false);
    };

    let sql = format!("DELETE FROM {} WHERE {} = ?1", quote_ident(&raw), quote_ident(ROW_ID));
    let removed = self.store.execute(sql, vec![SqlValue::from(row_id)]).await? > 0;
    if removed {
      tracing::debug!(table = %raw, id = row_id, "row deleted");
      self.store.publish(ChangeSignal::delete(raw, old));
    }
    Ok(removed)
  }

  /// Every row of `table_id` with computed columns evaluated.
  pub async fn rows(&self, table_id: &str) -> Result<Vec<Row>> {
    let raw = self.require_table(table_id).await?;
    let computed = self.computed_columns(table_id).await?;
    let sql = format!("{} ORDER BY rowid", select_with_computed(&raw, &computed));
    Ok(self.store.query(sql, Vec::new()).await?.into_json())
  }
}

fn require_formula(column: &ColumnRecord) -> Result<()> {
  match column.property.formula.as_deref() {
    Some(expr) if !expr.trim().is_empty() => Ok(()),
    _ => Err(
      CoreError::Constraint(format!("formula column {} needs an expression", column.id)).into(),
    ),
  }
}

/// `SELECT *` plus one projected expression per computed column.
fn select_with_computed(raw: &str, computed: &[ColumnRecord]) -> String {
  let mut projection = vec!["*".to_owned()];
  for column in computed {
    if let Some(expr) = column.property.formula.as_deref() {
      projection.push(format!("({expr}) AS {}", quote_ident(&column.table_column_name)));
    }
  }
  format!("SELECT {} FROM {}", projection.join(", "), quote_ident(raw))
}

// ─── RecomputeEngine impl ────────────────────────────────────────────────────

/// Ids bound per `SELECT`; SQLite caps a statement at 32766 parameters.
const RECOMPUTE_BATCH: usize = 500;

impl RecomputeEngine for DataSpace {
  type Error = Error;

  async fn recompute(&self, table_id: &str, row_ids: &[String]) -> Result<Vec<Row>> {
    if row_ids.is_empty() {
      return Ok(Vec::new());
    }

    let raw = raw_table_name(table_id);
    let computed = self.computed_columns(table_id).await?;
    let select = select_with_computed(&raw, &computed);

    let mut rows = Vec::with_capacity(row_ids.len());
    for batch in row_ids.chunks(RECOMPUTE_BATCH) {
      let placeholders = (1..=batch.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
      let sql = format!("{select} WHERE {} IN ({placeholders})", quote_ident(ROW_ID));
      let params = batch.iter().map(|id| SqlValue::from(id.as_str())).collect();
      rows.extend(self.store.query(sql, params).await?.into_json());
    }

    tracing::debug!(
      table = %raw,
      requested = row_ids.len(),
      returned = rows.len(),
      computed = computed.len(),
      "rows recomputed"
    );
    Ok(rows)
  }
}
