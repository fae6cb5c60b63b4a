//! Response: one user's answer to one question.
//!
//! Keyed by `(user_id, question_id)`; a user has at most one response per
//! question. Responses are written through an upsert and never deleted
//! directly.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  field::{self, Body},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub user_id:     i64,
  pub question_id: i64,
  /// `None` means the user skipped the question.
  pub response:    Option<bool>,
  /// How long the question was on screen before the user answered.
  pub view_time:   NaiveTime,
  /// Set by the store on insert.
  pub answered_at: DateTime<Utc>,
}

impl Response {
  /// Merge an already-validated patch into this response. The key columns
  /// are never changed.
  pub fn apply(&mut self, patch: ResponsePatch) {
    if let Some(response) = patch.response {
      self.response = response;
    }
    if let Some(view_time) = patch.view_time {
      self.view_time = view_time;
    }
  }
}

/// Whether an upsert inserted a new row or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
  Created,
  Updated,
}

// ─── Partial update ──────────────────────────────────────────────────────────

/// A validated `PUT /users/{uid}/responses/{qid}` body.
///
/// `user_id` and `question_id` may be echoed back by clients but are only
/// accepted when they match the addressed pair; see [`Self::check_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePatch {
  pub user_id:     Option<i64>,
  pub question_id: Option<i64>,
  pub response:    Option<Option<bool>>,
  pub view_time:   Option<NaiveTime>,
}

impl ResponsePatch {
  pub fn from_body(body: &Body) -> Result<Self> {
    let mut patch = Self::default();
    for (key, value) in body {
      match key.as_str() {
        "user_id" => patch.user_id = Some(field::integer(key, value)?),
        "question_id" => patch.question_id = Some(field::integer(key, value)?),
        "response" => patch.response = Some(field::bool_or_null(key, value)?),
        "view_time" => patch.view_time = Some(field::time_of_day(key, value)?),
        "answered_at" => return Err(field::read_only(key)),
        other => return Err(field::unknown(other)),
      }
    }
    Ok(patch)
  }

  /// Reject attempts to move a response to a different user or question.
  pub fn check_key(&self, user_id: i64, question_id: i64) -> Result<()> {
    if self.user_id.is_some_and(|id| id != user_id) {
      return Err(Error::invalid("user_id", "cannot be changed"));
    }
    if self.question_id.is_some_and(|id| id != question_id) {
      return Err(Error::invalid("question_id", "cannot be changed"));
    }
    Ok(())
  }

  /// Build the insert for a pair that has no response yet. Creation needs
  /// both the `response` key (which may be null) and a `view_time`.
  pub fn into_new(self, user_id: i64, question_id: i64) -> Result<NewResponse> {
    self.check_key(user_id, question_id)?;
    let response = self.response.ok_or_else(|| field::missing("response"))?;
    let view_time = self.view_time.ok_or_else(|| field::missing("view_time"))?;
    Ok(NewResponse {
      user_id,
      question_id,
      response,
      view_time,
    })
  }
}

/// Insert half of the response upsert. `answered_at` is set by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResponse {
  pub user_id:     i64,
  pub question_id: i64,
  pub response:    Option<bool>,
  pub view_time:   NaiveTime,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn body(v: serde_json::Value) -> Body { v.as_object().unwrap().clone() }

  #[test]
  fn create_requires_view_time() {
    let patch = ResponsePatch::from_body(&body(json!({ "response": true }))).unwrap();
    let err = patch.into_new(1, 2).unwrap_err();
    assert!(matches!(err, Error::InvalidField { field, .. } if field == "view_time"));
  }

  #[test]
  fn create_requires_response_key_but_allows_null() {
    let patch =
      ResponsePatch::from_body(&body(json!({ "view_time": "00:00:05" }))).unwrap();
    let err = patch.into_new(1, 2).unwrap_err();
    assert!(matches!(err, Error::InvalidField { field, .. } if field == "response"));

    let patch = ResponsePatch::from_body(&body(json!({
      "response": null,
      "view_time": "00:00:05",
    })))
    .unwrap();
    let new = patch.into_new(1, 2).unwrap();
    assert_eq!(new.response, None);
    assert_eq!(new.view_time, NaiveTime::from_hms_opt(0, 0, 5).unwrap());
  }

  #[test]
  fn echoed_key_must_match() {
    let patch = ResponsePatch::from_body(&body(json!({
      "user_id": 1,
      "question_id": 9,
    })))
    .unwrap();
    assert!(patch.check_key(1, 9).is_ok());
    let err = patch.check_key(1, 2).unwrap_err();
    assert!(matches!(err, Error::InvalidField { field, .. } if field == "question_id"));
  }

  #[test]
  fn apply_only_touches_present_fields() {
    let mut r = Response {
      user_id:     1,
      question_id: 2,
      response:    Some(true),
      view_time:   NaiveTime::from_hms_opt(0, 0, 5).unwrap(),
      answered_at: Utc::now(),
    };
    r.apply(ResponsePatch::from_body(&body(json!({ "response": false }))).unwrap());
    assert_eq!(r.response, Some(false));
    assert_eq!(r.view_time, NaiveTime::from_hms_opt(0, 0, 5).unwrap());
  }
}
