//! Connection setup for the Tessel SQLite store.
//!
//! Meta-tables and user tables create their own backing tables; this only
//! configures the connection. Executed once when a store is opened.

/// Connection pragmas; idempotent.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA user_version = 1;
";
