//! Resolve path segments to stored entities.
//!
//! User IDs may be the literal `me`, which stands for the signed-in caller.
//! Anything that is neither `me` nor a valid integer is simply not found.

use prophet_core::{
  identity::RequestContext,
  question::Question,
  response::Response,
  store::SurveyStore,
  user::{NewUser, SUBJECT_IDENTIFIER_MAX_LEN, User},
};

use crate::{auth::AuthError, error::ApiError};

/// The path segment that addresses the caller's own user.
pub const ME: &str = "me";

/// Look up the user addressed by `id`.
///
/// For `me` the caller must be signed in. When no user carries the caller's
/// subject yet, one is created if `create` is set; otherwise the lookup fails
/// with `user_not_found` and nothing is written. A `sub` claim that cannot be
/// stored as a subject identifier is an auth error, never a field error.
pub async fn user<S: SurveyStore>(
  store: &S,
  ctx: &RequestContext,
  id: &str,
  create: bool,
) -> Result<User, ApiError> {
  if id == ME {
    let subject = ctx.subject().ok_or(AuthError::MeRequiresSignIn)?;
    let new = NewUser::new(subject).map_err(|_| {
      AuthError::InvalidClaims(format!(
        "`sub` must be 1 to {SUBJECT_IDENTIFIER_MAX_LEN} characters"
      ))
    })?;
    let found = if create {
      Some(store.find_or_add_user(new).await.map_err(ApiError::from_store)?)
    } else {
      store
        .find_user_by_subject(&new.subject_identifier)
        .await
        .map_err(ApiError::from_store)?
    };
    return found.ok_or_else(|| ApiError::UserNotFound(ME.to_owned()));
  }

  let not_found = || ApiError::UserNotFound(id.to_owned());
  let key = id.parse::<i64>().map_err(|_| not_found())?;
  store
    .get_user(key)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(not_found)
}

pub async fn question<S: SurveyStore>(store: &S, id: &str) -> Result<Question, ApiError> {
  let not_found = || ApiError::QuestionNotFound(id.to_owned());
  let key = id.parse::<i64>().map_err(|_| not_found())?;
  store
    .get_question(key)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(not_found)
}

/// Look up the response of `user_id` to `question_id` by its composite key.
/// Any absence, of the user, the question or the response itself, is
/// `response_not_found`. `me` is first resolved to the caller's user without
/// creating one.
pub async fn response<S: SurveyStore>(
  store: &S,
  ctx: &RequestContext,
  user_id: &str,
  question_id: &str,
) -> Result<Response, ApiError> {
  let not_found = || ApiError::ResponseNotFound {
    user_id:     user_id.to_owned(),
    question_id: question_id.to_owned(),
  };

  let user_key = if user_id == ME {
    user(store, ctx, ME, false).await?.id
  } else {
    user_id.parse::<i64>().map_err(|_| not_found())?
  };
  let question_key = question_id.parse::<i64>().map_err(|_| not_found())?;

  store
    .get_response(user_key, question_key)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(not_found)
}
