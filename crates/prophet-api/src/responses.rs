//! Handlers for a single response, addressed either as
//! `/users/{user_id}/responses/{question_id}` or
//! `/questions/{question_id}/responses/{user_id}`.
//!
//! `PUT` upserts: the first call creates the row (201), later calls patch it
//! (200). The user may be `me`, but `PUT` never creates the caller's user.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use prophet_core::{
  response::{Response, ResponsePatch, Upsert},
  store::SurveyStore,
};
use serde::Deserialize;

use crate::{
  AppState,
  auth::Caller,
  error::ApiError,
  extract::JsonBody,
  links::Envelope,
  resolve,
};

/// Path parameters shared by both response routes; matched by name so the
/// segment order does not matter.
#[derive(Debug, Deserialize)]
pub struct ResponseKey {
  pub user_id:     String,
  pub question_id: String,
}

/// `GET .../responses/...`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Caller(ctx): Caller,
  Path(key): Path<ResponseKey>,
) -> Result<Json<Envelope<Response>>, ApiError>
where
  S: SurveyStore,
{
  let response =
    resolve::response(&*state.store, &ctx, &key.user_id, &key.question_id).await?;
  Ok(Json(state.links.response(response)))
}

/// `PUT .../responses/...`
pub async fn put<S>(
  State(state): State<AppState<S>>,
  Caller(ctx): Caller,
  Path(key): Path<ResponseKey>,
  JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Envelope<Response>>), ApiError>
where
  S: SurveyStore,
{
  let user = resolve::user(&*state.store, &ctx, &key.user_id, false).await?;
  let question = resolve::question(&*state.store, &key.question_id).await?;
  let patch = ResponsePatch::from_body(&body)?;

  let (response, how) = state
    .store
    .put_response(user.id, question.id, patch)
    .await
    .map_err(ApiError::from_store)?;

  let status = match how {
    Upsert::Created => {
      tracing::info!(
        user_id = user.id,
        question_id = question.id,
        "recorded response"
      );
      StatusCode::CREATED
    }
    Upsert::Updated => StatusCode::OK,
  };
  Ok((status, Json(state.links.response(response))))
}
