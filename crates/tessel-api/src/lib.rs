//! JSON REST API for Tessel.
//!
//! Exposes an axum [`Router`] over the scripts of a data space and the
//! extensions installed in a [`Vfs`]. Auth, TLS, and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tessel_api::api_router(state))
//! ```

pub mod error;
pub mod extensions;
pub mod scripts;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use tessel_ext::{ExtensionCatalog, Vfs};
use tessel_store_sqlite::ScriptTable;

pub use error::ApiError;

/// Everything the handlers reach.
pub struct ApiState<V> {
  pub scripts: ScriptTable,
  pub catalog: ExtensionCatalog<V>,
}

impl<V: Vfs> ApiState<V> {
  pub fn new(scripts: ScriptTable, catalog: ExtensionCatalog<V>) -> Self {
    Self { scripts, catalog }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<V: Vfs>(state: Arc<ApiState<V>>) -> Router<()> {
  Router::new()
    // Scripts
    .route("/scripts", get(scripts::list::<V>).post(scripts::create::<V>))
    .route("/scripts/blocks", get(scripts::blocks::<V>))
    .route("/scripts/{id}", get(scripts::get_one::<V>).delete(scripts::delete_one::<V>))
    .route("/scripts/{id}/enable", post(scripts::enable::<V>))
    .route("/scripts/{id}/disable", post(scripts::disable::<V>))
    .route("/scripts/{id}/env", put(scripts::update_env::<V>))
    // Extensions
    .route("/extensions", get(extensions::list::<V>))
    .route("/extensions/{name}/index", get(extensions::index::<V>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
