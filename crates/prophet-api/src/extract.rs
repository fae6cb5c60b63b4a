//! Request-body extractor.

use axum::{
  Json,
  extract::{FromRequest, Request, rejection::JsonRejection},
};
use prophet_core::Body;
use serde_json::Value;

use crate::error::ApiError;

/// A JSON object body. Field validation is left to the domain patch types;
/// this only guarantees well-formed JSON with an object at the top.
#[derive(Debug)]
pub struct JsonBody(pub Body);

impl<S> FromRequest<S> for JsonBody
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let Json(value) = Json::<Value>::from_request(req, state)
      .await
      .map_err(|e: JsonRejection| ApiError::InvalidField {
        field:  "body".into(),
        reason: e.body_text(),
      })?;

    match value {
      Value::Object(map) => Ok(JsonBody(map)),
      _ => Err(ApiError::InvalidField {
        field:  "body".into(),
        reason: "expected a JSON object".into(),
      }),
    }
  }
}
