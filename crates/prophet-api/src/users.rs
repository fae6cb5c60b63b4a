//! Handlers for `/users` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/users` | admin |
//! | `POST`   | `/users` | admin; body: `{"subject_identifier": "..."}` |
//! | `GET`    | `/users/{id\|me}` | `me` creates the caller's user on first use |
//! | `DELETE` | `/users/{id\|me}` | admin |
//! | `GET`    | `/users/{id\|me}/responses` | |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use prophet_core::{
  response::Response,
  store::SurveyStore,
  user::NewUser,
};

use crate::{
  AppState,
  auth::Caller,
  error::ApiError,
  extract::JsonBody,
  links::{self, Envelope, UserData},
  resolve,
};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /users`
pub async fn list<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Envelope<Vec<UserData>>>, ApiError>
where
  S: SurveyStore,
{
  let users = state.store.list_users().await.map_err(ApiError::from_store)?;
  Ok(Json(state.links.users(&users)))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /users`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  let input = NewUser::from_body(&body)?;
  let user = state.store.add_user(input).await.map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(state.links.user(&user))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /users/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Caller(ctx): Caller,
  Path(id): Path<String>,
) -> Result<Json<Envelope<UserData>>, ApiError>
where
  S: SurveyStore,
{
  let user = resolve::user(&*state.store, &ctx, &id, true).await?;
  Ok(Json(state.links.user(&user)))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /users/{id}`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Caller(ctx): Caller,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  let user = resolve::user(&*state.store, &ctx, &id, false).await?;
  if !state.store.delete_user(user.id).await.map_err(ApiError::from_store)? {
    return Err(ApiError::UserNotFound(id));
  }
  tracing::info!(user_id = user.id, "deleted user");
  Ok(Json(links::deleted()))
}

// ─── Responses ────────────────────────────────────────────────────────────────

/// `GET /users/{id}/responses`
pub async fn responses<S>(
  State(state): State<AppState<S>>,
  Caller(ctx): Caller,
  Path(id): Path<String>,
) -> Result<Json<Envelope<Vec<Response>>>, ApiError>
where
  S: SurveyStore,
{
  let user = resolve::user(&*state.store, &ctx, &id, false).await?;
  let responses = state
    .store
    .list_user_responses(user.id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(state.links.user_responses(user.id, responses)))
}
