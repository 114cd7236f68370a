//! Reactive row caches for presentation contexts.
//!
//! A [`PresentationContext`] holds one [`RowCache`] and one
//! [`TableReconciler`] per watched table. Each reconciler consumes change
//! signals from the bus, asks a
//! [`RecomputeEngine`](tessel_core::recompute::RecomputeEngine) for fresh
//! rows when a signal calls for it, and applies the result to the cache.

mod cache;
mod context;
mod reconcile;

pub use cache::{CacheEvent, RowCache};
pub use context::PresentationContext;
pub use reconcile::{Action, ReconcilerState, Status, TableReconciler, classify};
