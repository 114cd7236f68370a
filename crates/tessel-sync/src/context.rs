//! [`PresentationContext`]: a row cache plus the reconcilers feeding it.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use tessel_core::{
  recompute::RecomputeEngine,
  row::{Row, table_id_from_raw_name},
};
use tessel_signal::ChangeSignalBus;

use crate::{RowCache, TableReconciler, reconcile::Status};

/// One consumer of the data layer, such as a window or a view.
///
/// Contexts share nothing but the bus: each has its own cache and its own
/// subscriptions.
pub struct PresentationContext<E> {
  bus:         ChangeSignalBus,
  engine:      Arc<E>,
  cache:       RowCache,
  reconcilers: Mutex<HashMap<String, TableReconciler>>,
}

impl<E: RecomputeEngine> PresentationContext<E> {
  pub fn new(bus: ChangeSignalBus, engine: Arc<E>) -> Self {
    Self { bus, engine, cache: RowCache::new(), reconcilers: Mutex::default() }
  }

  pub fn cache(&self) -> &RowCache { &self.cache }

  fn reconcilers(&self) -> std::sync::MutexGuard<'_, HashMap<String, TableReconciler>> {
    self.reconcilers.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Start reconciling `raw_table`. Returns `false` if it is already watched.
  ///
  /// Signals published before this call are not replayed; load the current
  /// rows with [`seed`](Self::seed) after watching.
  pub fn watch(&self, raw_table: &str) -> bool {
    let mut reconcilers = self.reconcilers();
    if reconcilers.contains_key(raw_table) {
      return false;
    }
    let reconciler =
      TableReconciler::spawn(&self.bus, self.engine.clone(), self.cache.clone(), raw_table);
    reconcilers.insert(raw_table.to_owned(), reconciler);
    true
  }

  /// Stop reconciling `raw_table` and drop its cached rows. Returns whether
  /// it was watched.
  pub async fn unwatch(&self, raw_table: &str) -> bool {
    let Some(reconciler) = self.reconcilers().remove(raw_table) else {
      return false;
    };
    reconciler.shutdown().await;
    self.cache.clear_table(table_id_from_raw_name(raw_table));
    true
  }

  pub fn is_watching(&self, raw_table: &str) -> bool { self.reconcilers().contains_key(raw_table) }

  /// Watched raw table names, sorted.
  pub fn watched(&self) -> Vec<String> {
    let mut tables: Vec<String> = self.reconcilers().keys().cloned().collect();
    tables.sort();
    tables
  }

  /// Load an initial snapshot of `raw_table`.
  pub fn seed(&self, raw_table: &str, rows: Vec<Row>) {
    self.cache.set_rows(table_id_from_raw_name(raw_table), rows);
  }

  pub fn status(&self, raw_table: &str) -> Option<Status> {
    self.reconcilers().get(raw_table).map(TableReconciler::status)
  }

  /// Wait until the reconciler for `raw_table` has processed `count`
  /// signals. Returns `false` if the table is not watched.
  pub async fn wait_processed(&self, raw_table: &str, count: u64) -> bool {
    let Some(mut status) = self.reconcilers().get(raw_table).map(|r| r.status_receiver()) else {
      return false;
    };
    let _ = status.wait_for(|s| s.processed >= count).await;
    true
  }

  /// Unwatch every table.
  pub async fn shutdown(self) {
    let reconcilers: Vec<TableReconciler> = self.reconcilers().drain().map(|(_, r)| r).collect();
    for reconciler in reconcilers {
      reconciler.shutdown().await;
    }
    tracing::debug!("presentation context shut down");
  }
}
