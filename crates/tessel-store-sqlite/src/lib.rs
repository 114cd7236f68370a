//! SQLite backend for Tessel.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation made through this crate
//! publishes a [`ChangeSignal`](tessel_core::signal::ChangeSignal) on the
//! store's [`ChangeSignalBus`](tessel_signal::ChangeSignalBus).

mod encode;
mod meta_table;
mod schema;
mod script;
mod space;
mod store;

pub mod error;

pub use encode::Rows;
pub use error::{Error, Result};
pub use meta_table::{Filter, Listing, MetaTable, RecordFailure};
pub use script::ScriptTable;
pub use space::DataSpace;
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
