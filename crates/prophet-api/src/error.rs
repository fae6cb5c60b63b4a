//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure leaves the service as
//! `{"error": {"code": "...", "description": "..."}}`.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use prophet_core::DomainError;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("User `{0}` does not exist")]
  UserNotFound(String),

  #[error("Question `{0}` does not exist")]
  QuestionNotFound(String),

  #[error("User `{user_id}` has not responded to question `{question_id}`")]
  ResponseNotFound {
    user_id:     String,
    question_id: String,
  },

  /// No route matches the request path.
  #[error("{0}")]
  NotFound(String),

  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error("Invalid value for `{field}`: {reason}")]
  InvalidField { field: String, reason: String },

  /// Framework-level failures that have no dedicated code.
  #[error("{description}")]
  Http {
    status:      StatusCode,
    description: String,
  },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Convert a backend error, keeping domain validation failures as
  /// `invalid_field` instead of hiding them behind a 500.
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + DomainError + Send + Sync + 'static,
  {
    match e.as_domain() {
      Some(domain) => domain.clone().into(),
      None => ApiError::Store(Box::new(e)),
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      ApiError::UserNotFound(_) => "user_not_found",
      ApiError::QuestionNotFound(_) => "question_not_found",
      ApiError::ResponseNotFound { .. } => "response_not_found",
      ApiError::NotFound(_) => "resource_not_found",
      ApiError::Auth(_) => "auth_error",
      ApiError::InvalidField { .. } => "invalid_field",
      ApiError::Http { .. } | ApiError::Store(_) => "unknown",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::UserNotFound(_)
      | ApiError::QuestionNotFound(_)
      | ApiError::ResponseNotFound { .. }
      | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Auth(e) => e.status(),
      ApiError::InvalidField { .. } => StatusCode::BAD_REQUEST,
      ApiError::Http { status, .. } => *status,
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<prophet_core::Error> for ApiError {
  fn from(e: prophet_core::Error) -> Self {
    match e {
      prophet_core::Error::InvalidField { field, reason } => {
        ApiError::InvalidField { field, reason }
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let description = match &self {
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        "Internal server error".to_owned()
      }
      other => other.to_string(),
    };

    let body = json!({
      "error": {
        "code": self.code(),
        "description": description,
      },
    });
    let mut res = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}
