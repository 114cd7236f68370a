//! The `RecomputeEngine` trait.
//!
//! Implemented by storage backends that can evaluate computed columns (e.g.
//! `tessel-store-sqlite`). Row-cache reconcilers depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use crate::row::Row;

/// Re-derives computed column values for a set of rows.
///
/// Cost is proportional to `row_ids.len()` × the number of computed columns,
/// so callers pass the smallest id set that covers the change.
pub trait RecomputeEngine: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Return a fresh full snapshot for every id in `row_ids` that still exists.
  ///
  /// Rows that no longer exist are omitted. An empty `row_ids` returns an
  /// empty result without touching the store.
  fn recompute<'a>(
    &'a self,
    table_id: &'a str,
    row_ids: &'a [String],
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + 'a;
}
