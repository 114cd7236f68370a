//! Handlers for `/extensions` endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  response::Html,
};
use tessel_ext::{ExtensionManifest, Vfs};

use crate::{ApiState, error::ApiError};

/// `GET /extensions`
pub async fn list<V: Vfs>(
  State(state): State<Arc<ApiState<V>>>,
) -> Result<Json<Vec<ExtensionManifest>>, ApiError> {
  Ok(Json(state.catalog.list().await?))
}

/// `GET /extensions/{name}/index`: the extension's entry page.
pub async fn index<V: Vfs>(
  State(state): State<Arc<ApiState<V>>>,
  Path(name): Path<String>,
) -> Result<Html<String>, ApiError> {
  Ok(Html(state.catalog.index(&name).await?))
}
