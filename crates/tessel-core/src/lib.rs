//! Core types and trait definitions for Tessel.
//!
//! This crate is deliberately free of database and async-runtime
//! dependencies. It defines the record schemas persisted by meta-tables, the
//! change-signal protocol exchanged between contexts, and the
//! [`RecomputeEngine`](recompute::RecomputeEngine) seam that row caches use to
//! re-derive computed columns.

pub mod column;
pub mod error;
pub mod recompute;
pub mod record;
pub mod row;
pub mod script;
pub mod signal;

pub use error::{Error, Result};
