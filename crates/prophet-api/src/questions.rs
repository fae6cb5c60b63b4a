//! Handlers for `/questions` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/questions` | public |
//! | `POST`   | `/questions` | admin; body: `{"prompt": "..."}` |
//! | `GET`    | `/questions/{id}` | public |
//! | `PUT`    | `/questions/{id}` | admin; partial update |
//! | `DELETE` | `/questions/{id}` | admin |
//! | `GET`    | `/questions/{id}/responses` | 404 if the question is missing |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use prophet_core::{
  question::{NewQuestion, Question, QuestionPatch},
  response::Response,
  store::SurveyStore,
};

use crate::{
  AppState,
  error::ApiError,
  extract::JsonBody,
  links::{self, Envelope},
  resolve,
};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /questions`
pub async fn list<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Envelope<Vec<Question>>>, ApiError>
where
  S: SurveyStore,
{
  let questions = state
    .store
    .list_questions()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(state.links.questions(questions)))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /questions`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  let input = NewQuestion::from_body(&body)?;
  let question = state
    .store
    .add_question(input)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(question_id = question.id, "created question");
  Ok((StatusCode::CREATED, Json(state.links.question(question))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /questions/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Envelope<Question>>, ApiError>
where
  S: SurveyStore,
{
  let question = resolve::question(&*state.store, &id).await?;
  Ok(Json(state.links.question(question)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /questions/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
  JsonBody(body): JsonBody,
) -> Result<Json<Envelope<Question>>, ApiError>
where
  S: SurveyStore,
{
  let existing = resolve::question(&*state.store, &id).await?;
  let patch = QuestionPatch::from_body(&body)?;
  let question = state
    .store
    .update_question(existing.id, patch)
    .await
    .map_err(ApiError::from_store)?
    .ok_or(ApiError::QuestionNotFound(id))?;
  Ok(Json(state.links.question(question)))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /questions/{id}`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SurveyStore,
{
  let question = resolve::question(&*state.store, &id).await?;
  if !state
    .store
    .delete_question(question.id)
    .await
    .map_err(ApiError::from_store)?
  {
    return Err(ApiError::QuestionNotFound(id));
  }
  tracing::info!(question_id = question.id, "deleted question");
  Ok(Json(links::deleted()))
}

// ─── Responses ────────────────────────────────────────────────────────────────

/// `GET /questions/{id}/responses`
pub async fn responses<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Envelope<Vec<Response>>>, ApiError>
where
  S: SurveyStore,
{
  let question_id = id
    .parse::<i64>()
    .map_err(|_| ApiError::QuestionNotFound(id.clone()))?;
  let responses = state
    .store
    .list_question_responses(question_id)
    .await
    .map_err(ApiError::from_store)?;

  // An empty list is ambiguous: make sure the question exists.
  if responses.is_empty() {
    resolve::question(&*state.store, &id).await?;
  }
  Ok(Json(state.links.question_responses(question_id, responses)))
}
