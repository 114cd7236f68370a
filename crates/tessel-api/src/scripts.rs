//! Handlers for `/scripts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/scripts` | Optional `?status=all\|enabled\|disabled` |
//! | `POST`   | `/scripts` | Body: a script record; 409 if the id is taken |
//! | `GET`    | `/scripts/blocks` | Enabled block scripts |
//! | `GET`    | `/scripts/{id}` | 404 if not found |
//! | `DELETE` | `/scripts/{id}` | `{"deleted": bool}` |
//! | `POST`   | `/scripts/{id}/enable` | |
//! | `POST`   | `/scripts/{id}/disable` | |
//! | `PUT`    | `/scripts/{id}/env` | Body: the full environment map |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tessel_core::script::{EnvMap, ScriptRecord, ScriptStatus};
use tessel_ext::{Vfs, enabled_blocks};

use crate::{ApiState, error::ApiError};

type AppState<V> = State<Arc<ApiState<V>>>;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<String>,
}

/// `GET /scripts[?status=<status>]`
pub async fn list<V: Vfs>(
  State(state): AppState<V>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ScriptRecord>>, ApiError> {
  let status = match params.status.as_deref() {
    Some(s) => s.parse::<ScriptStatus>().map_err(|e| ApiError::BadRequest(e.to_string()))?,
    None => ScriptStatus::All,
  };
  let listing = state.scripts.list_scripts(status).await?;
  Ok(Json(listing.into_records()))
}

/// `GET /scripts/blocks`
pub async fn blocks<V: Vfs>(State(state): AppState<V>) -> Result<Json<Vec<ScriptRecord>>, ApiError> {
  let listing = state.scripts.list_scripts(ScriptStatus::Enabled).await?;
  Ok(Json(enabled_blocks(listing.into_records())))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /scripts`: the script is stored disabled.
pub async fn create<V: Vfs>(
  State(state): AppState<V>,
  Json(script): Json<ScriptRecord>,
) -> Result<impl IntoResponse, ApiError> {
  let script = state.scripts.add(script).await?;
  Ok((StatusCode::CREATED, Json(script)))
}

// ─── Single script ────────────────────────────────────────────────────────────

/// `GET /scripts/{id}`
pub async fn get_one<V: Vfs>(
  State(state): AppState<V>,
  Path(id): Path<String>,
) -> Result<Json<ScriptRecord>, ApiError> {
  Ok(Json(state.scripts.get(&id).await?))
}

/// `DELETE /scripts/{id}`
pub async fn delete_one<V: Vfs>(
  State(state): AppState<V>,
  Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
  let deleted = state.scripts.delete(&id).await?;
  Ok(Json(json!({ "deleted": deleted })))
}

/// `POST /scripts/{id}/enable`
pub async fn enable<V: Vfs>(
  State(state): AppState<V>,
  Path(id): Path<String>,
) -> Result<Json<ScriptRecord>, ApiError> {
  state.scripts.enable(&id).await?;
  Ok(Json(state.scripts.get(&id).await?))
}

/// `POST /scripts/{id}/disable`
pub async fn disable<V: Vfs>(
  State(state): AppState<V>,
  Path(id): Path<String>,
) -> Result<Json<ScriptRecord>, ApiError> {
  state.scripts.disable(&id).await?;
  Ok(Json(state.scripts.get(&id).await?))
}

/// `PUT /scripts/{id}/env`: replaces the whole map.
pub async fn update_env<V: Vfs>(
  State(state): AppState<V>,
  Path(id): Path<String>,
  Json(env_map): Json<EnvMap>,
) -> Result<Json<ScriptRecord>, ApiError> {
  Ok(Json(state.scripts.update_env_map(&id, &env_map).await?))
}
