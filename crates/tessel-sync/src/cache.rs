//! [`RowCache`]: in-memory rows keyed by table id and row id.

use std::{
  collections::HashMap,
  sync::{Arc, PoisonError, RwLock},
};

use tessel_core::row::{Row, row_id};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// A change applied to a [`RowCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  Upserted { table: String, row_ids: Vec<String> },
  Removed { table: String, row_ids: Vec<String> },
  Cleared { table: String },
}

type Tables = HashMap<String, HashMap<String, Row>>;

/// Rows held by one presentation context.
///
/// Clones share the same rows and event channel.
#[derive(Debug, Clone)]
pub struct RowCache {
  tables: Arc<RwLock<Tables>>,
  events: broadcast::Sender<CacheEvent>,
}

impl Default for RowCache {
  fn default() -> Self { Self::new() }
}

impl RowCache {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self { tables: Arc::default(), events }
  }

  /// Observe changes. A receiver that falls behind sees `Lagged` and should
  /// re-read the rows it displays.
  pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> { self.events.subscribe() }

  fn emit(&self, event: CacheEvent) {
    // No receivers is fine.
    let _ = self.events.send(event);
  }

  fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
    f(&self.tables.read().unwrap_or_else(PoisonError::into_inner))
  }

  fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
    f(&mut self.tables.write().unwrap_or_else(PoisonError::into_inner))
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Insert or replace each row under its `_id`. Rows without an id are
  /// skipped.
  pub fn set_rows(&self, table: &str, rows: Vec<Row>) {
    let row_ids = self.write(|tables| {
      let cached = tables.entry(table.to_owned()).or_default();
      let mut ids = Vec::with_capacity(rows.len());
      for row in rows {
        match row_id(&row).map(str::to_owned) {
          Some(id) => {
            ids.push(id.clone());
            cached.insert(id, row);
          }
          None => tracing::warn!(table, "dropping row without an id"),
        }
      }
      ids
    });
    if !row_ids.is_empty() {
      self.emit(CacheEvent::Upserted { table: table.to_owned(), row_ids });
    }
  }

  /// Remove rows by id. Ids not present are ignored.
  pub fn del_rows(&self, table: &str, ids: &[String]) {
    let row_ids: Vec<String> = self.write(|tables| {
      let Some(cached) = tables.get_mut(table) else {
        return Vec::new();
      };
      ids.iter().filter(|id| cached.remove(id.as_str()).is_some()).cloned().collect()
    });
    if !row_ids.is_empty() {
      self.emit(CacheEvent::Removed { table: table.to_owned(), row_ids });
    }
  }

  /// Replace the rows for `requested` ids with `rows`. Requested ids missing
  /// from `rows` no longer exist and are removed.
  pub fn replace_rows(&self, table: &str, requested: &[String], rows: Vec<Row>) {
    let vanished: Vec<String> = requested
      .iter()
      .filter(|id| !rows.iter().any(|row| row_id(row) == Some(id.as_str())))
      .cloned()
      .collect();
    self.set_rows(table, rows);
    self.del_rows(table, &vanished);
  }

  /// Drop every row of `table`.
  pub fn clear_table(&self, table: &str) {
    if self.write(|tables| tables.remove(table)).is_some() {
      self.emit(CacheEvent::Cleared { table: table.to_owned() });
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub fn get(&self, table: &str, id: &str) -> Option<Row> {
    self.read(|tables| tables.get(table)?.get(id).cloned())
  }

  pub fn contains(&self, table: &str, id: &str) -> bool {
    self.read(|tables| tables.get(table).is_some_and(|rows| rows.contains_key(id)))
  }

  /// Cached ids of `table`, sorted.
  pub fn row_ids(&self, table: &str) -> Vec<String> {
    let mut ids: Vec<String> =
      self.read(|tables| tables.get(table).map(|rows| rows.keys().cloned().collect()))
        .unwrap_or_default();
    ids.sort();
    ids
  }

  /// Cached rows of `table`, sorted by id.
  pub fn rows(&self, table: &str) -> Vec<Row> {
    let mut rows: Vec<(String, Row)> = self.read(|tables| {
      tables
        .get(table)
        .map(|rows| rows.iter().map(|(id, row)| (id.clone(), row.clone())).collect())
        .unwrap_or_default()
    });
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows.into_iter().map(|(_, row)| row).collect()
  }

  pub fn len(&self, table: &str) -> usize {
    self.read(|tables| tables.get(table).map_or(0, HashMap::len))
  }

  pub fn is_empty(&self, table: &str) -> bool { self.len(table) == 0 }
}
