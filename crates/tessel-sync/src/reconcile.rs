//! [`TableReconciler`]: keeps one table of a [`RowCache`] in step with the
//! change signals published for it.
//!
//! Each reconciler owns a bus subscription and a task that drains it in
//! order, so a table is never reconciled twice at once. Signals that arrive
//! while a recompute is in flight wait in the subscription queue.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use tessel_core::{
  column::FieldType,
  recompute::RecomputeEngine,
  row::{Row, table_id_from_raw_name},
  signal::{ChangeSignal, SignalKind},
};
use tessel_signal::{ChangeSignalBus, Subscription, SubscriptionId};
use tokio::{sync::watch, task::JoinHandle};

use crate::RowCache;

// ─── Classification ──────────────────────────────────────────────────────────

/// What a signal asks of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  /// Recompute one row and store the result.
  Recompute(String),
  /// Drop one row without recomputing.
  Remove(String),
  /// Recompute every cached row of the table.
  RecomputeAll,
  Ignore,
}

/// Decide how to handle `signal`. The caller has already checked that the
/// signal is for its table.
pub fn classify(signal: &ChangeSignal) -> Action {
  match &signal.kind {
    SignalKind::Insert | SignalKind::Update => match signal.new_row_id() {
      Some(id) => Action::Recompute(id.to_owned()),
      None => Action::Ignore,
    },
    SignalKind::Delete => match signal.old_row_id() {
      Some(id) => Action::Remove(id.to_owned()),
      None => Action::Ignore,
    },
    SignalKind::AddColumn | SignalKind::UpdateColumn => {
      let Some(new) = signal.payload.new.as_ref() else {
        return Action::Ignore;
      };
      // A column type this build cannot read may be anything, so it counts
      // as both computed and changed.
      let Some(new_type) = column_type(new) else {
        return Action::RecomputeAll;
      };
      let storage_changed = match signal.payload.old.as_ref() {
        Some(old) => column_type(old).is_none_or(|old| FieldType::storage_changed(new_type, old)),
        None => false,
      };
      if storage_changed || new_type.is_computed() {
        Action::RecomputeAll
      } else {
        Action::Ignore
      }
    }
    SignalKind::Unknown(_) => Action::Ignore,
  }
}

fn column_type(column: &Row) -> Option<FieldType> {
  FieldType::deserialize(column.get("type")?).ok()
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilerState {
  #[default]
  Idle,
  Reconciling,
}

/// Observable progress of a reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
  pub state:     ReconcilerState,
  /// Signals taken off the queue so far, including discarded ones.
  pub processed: u64,
}

// ─── Reconciler ──────────────────────────────────────────────────────────────

/// Handle to a running reconciler task for one table.
///
/// Dropping the handle unsubscribes; the task ends after any in-flight
/// recompute returns, and that result is discarded.
#[derive(Debug)]
pub struct TableReconciler {
  raw_table:    String,
  subscription: SubscriptionId,
  bus:          ChangeSignalBus,
  closed:       Closed,
  status:       watch::Receiver<Status>,
  task:         Option<JoinHandle<()>>,
}

impl TableReconciler {
  /// Subscribe to `bus` and start reconciling `raw_table` into `cache`.
  ///
  /// Signals published after this returns are seen; earlier ones are not, so
  /// callers seed the cache themselves.
  pub fn spawn<E: RecomputeEngine>(
    bus: &ChangeSignalBus,
    engine: Arc<E>,
    cache: RowCache,
    raw_table: impl Into<String>,
  ) -> Self {
    let raw_table = raw_table.into();
    let subscription = bus.subscribe();
    let id = subscription.id();
    let closed = Closed::default();
    let (status_tx, status) = watch::channel(Status::default());

    let worker = Worker {
      table_id: table_id_from_raw_name(&raw_table).to_owned(),
      raw_table: raw_table.clone(),
      engine,
      cache,
      closed: closed.clone(),
      status: status_tx,
    };
    let task = tokio::spawn(worker.run(subscription));
    tracing::debug!(table = %raw_table, subscription = %id, "reconciler started");

    Self { raw_table, subscription: id, bus: bus.clone(), closed, status, task: Some(task) }
  }

  pub fn raw_table(&self) -> &str { &self.raw_table }

  pub fn status(&self) -> Status { *self.status.borrow() }

  pub fn state(&self) -> ReconcilerState { self.status().state }

  /// Wait until at least `count` signals have been processed. Returns early
  /// if the task has stopped.
  pub async fn wait_processed(&self, count: u64) {
    let mut status = self.status_receiver();
    let _ = status.wait_for(|s| s.processed >= count).await;
  }

  pub(crate) fn status_receiver(&self) -> watch::Receiver<Status> { self.status.clone() }

  /// Stop delivery. Queued signals and any in-flight result are discarded.
  ///
  /// Once this returns the task makes no further cache writes.
  pub fn unsubscribe(&self) {
    if self.closed.close() {
      self.bus.unsubscribe(self.subscription);
      tracing::debug!(table = %self.raw_table, subscription = %self.subscription, "reconciler unsubscribed");
    }
  }

  /// Unsubscribe and wait for the task to finish.
  pub async fn shutdown(mut self) {
    self.unsubscribe();
    if let Some(task) = self.task.take()
      && let Err(e) = task.await
    {
      tracing::warn!(table = %self.raw_table, error = %e, "reconciler task failed");
    }
  }
}

impl Drop for TableReconciler {
  fn drop(&mut self) { self.unsubscribe(); }
}

// ── Closed flag ─────────────────────────────────────────────────────────────

/// Shared between a handle and its worker. The worker holds the lock across
/// each cache write, so closing waits out a write already underway.
#[derive(Debug, Clone, Default)]
struct Closed(Arc<Mutex<bool>>);

impl Closed {
  fn lock(&self) -> MutexGuard<'_, bool> { self.0.lock().unwrap_or_else(PoisonError::into_inner) }

  fn is_set(&self) -> bool { *self.lock() }

  /// Set the flag; `true` if this call set it.
  fn close(&self) -> bool { !std::mem::replace(&mut *self.lock(), true) }
}

// ── Worker ──────────────────────────────────────────────────────────────────

struct Worker<E> {
  raw_table: String,
  table_id:  String,
  engine:    Arc<E>,
  cache:     RowCache,
  closed:    Closed,
  status:    watch::Sender<Status>,
}

impl<E: RecomputeEngine> Worker<E> {
  fn is_closed(&self) -> bool { self.closed.is_set() }

  /// Apply `write` unless the reconciler has been closed.
  fn write_cache(&self, write: impl FnOnce(&RowCache)) -> bool {
    let closed = self.closed.lock();
    if *closed {
      return false;
    }
    write(&self.cache);
    true
  }

  async fn run(self, mut subscription: Subscription) {
    while let Some(signal) = subscription.recv().await {
      if self.is_closed() {
        break;
      }
      if signal.table() == self.raw_table {
        self.status.send_modify(|s| s.state = ReconcilerState::Reconciling);
        self.handle(&signal).await;
      }
      self.status.send_modify(|s| {
        s.state = ReconcilerState::Idle;
        s.processed += 1;
      });
    }
    tracing::debug!(table = %self.raw_table, "reconciler stopped");
  }

  async fn handle(&self, signal: &ChangeSignal) {
    match classify(signal) {
      Action::Recompute(id) => self.recompute(vec![id]).await,
      Action::Remove(id) => {
        self.write_cache(|cache| cache.del_rows(&self.table_id, &[id]));
      }
      Action::RecomputeAll => {
        let ids = self.cache.row_ids(&self.table_id);
        if !ids.is_empty() {
          self.recompute(ids).await;
        }
      }
      Action::Ignore => {
        tracing::trace!(table = %self.raw_table, kind = signal.kind.as_str(), "signal ignored");
      }
    }
  }

  async fn recompute(&self, ids: Vec<String>) {
    match self.engine.recompute(&self.table_id, &ids).await {
      Ok(rows) => {
        if !self.write_cache(|cache| cache.replace_rows(&self.table_id, &ids, rows)) {
          tracing::debug!(table = %self.raw_table, "discarding recompute after unsubscribe");
        }
      }
      Err(e) => {
        tracing::warn!(table = %self.raw_table, rows = ids.len(), error = %e, "recompute failed");
      }
    }
  }
}
