//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<tessel_store_sqlite::Error> for ApiError {
  fn from(e: tessel_store_sqlite::Error) -> Self {
    if e.is_not_found() {
      Self::NotFound(e.to_string())
    } else if e.is_constraint() {
      Self::Conflict(e.to_string())
    } else {
      Self::Store(Box::new(e))
    }
  }
}

impl From<tessel_ext::Error> for ApiError {
  fn from(e: tessel_ext::Error) -> Self {
    use tessel_ext::Error as Ext;
    match e {
      Ext::NotFound(_) => Self::NotFound(e.to_string()),
      Ext::InvalidPath(_) | Ext::InvalidManifest(_) => Self::BadRequest(e.to_string()),
      other => Self::Store(Box::new(other)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
