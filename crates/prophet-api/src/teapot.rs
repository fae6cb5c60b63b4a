//! `GET /teapot`: a signed-in liveness probe.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn handler() -> impl IntoResponse {
  (StatusCode::IM_A_TEAPOT, Json(json!({ "data": "I'm a teapot" })))
}
