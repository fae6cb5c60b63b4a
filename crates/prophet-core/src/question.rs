//! Question: a yes/no prompt that users respond to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  field::{self, Body},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
  pub id:             i64,
  pub prompt:         String,
  pub more_info_link: Option<String>,
  /// `None` means there is no known correct answer.
  pub correct_answer: Option<bool>,
  /// Set by the store on insert; never changes afterwards.
  pub created_at:     DateTime<Utc>,
  /// `None` means the question never expires.
  pub expires_at:     Option<DateTime<Utc>>,
}

impl Question {
  /// Merge an already-validated patch into this question.
  pub fn apply(&mut self, patch: QuestionPatch) {
    if let Some(prompt) = patch.prompt {
      self.prompt = prompt;
    }
    if let Some(link) = patch.more_info_link {
      self.more_info_link = link;
    }
    if let Some(answer) = patch.correct_answer {
      self.correct_answer = answer;
    }
    if let Some(expires_at) = patch.expires_at {
      self.expires_at = expires_at;
    }
  }
}

// ─── Partial update ──────────────────────────────────────────────────────────

/// A validated partial update. Outer `None` means "leave unchanged"; for the
/// nullable columns, `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionPatch {
  pub prompt:         Option<String>,
  pub more_info_link: Option<Option<String>>,
  pub correct_answer: Option<Option<bool>>,
  pub expires_at:     Option<Option<DateTime<Utc>>>,
}

impl QuestionPatch {
  /// Validate every field of a `PUT /questions/{id}` body. Stops at the first
  /// offending field.
  pub fn from_body(body: &Body) -> Result<Self> {
    let mut patch = Self::default();
    for (key, value) in body {
      match key.as_str() {
        "prompt" => patch.prompt = Some(field::string(key, value)?),
        "more_info_link" => {
          patch.more_info_link = Some(field::string_or_null(key, value)?);
        }
        "correct_answer" => {
          patch.correct_answer = Some(field::bool_or_null(key, value)?);
        }
        "expires_at" => {
          patch.expires_at = Some(field::timestamp_or_null(key, value)?);
        }
        "id" | "created_at" => return Err(field::read_only(key)),
        other => return Err(field::unknown(other)),
      }
    }
    Ok(patch)
  }
}

// ─── NewQuestion ─────────────────────────────────────────────────────────────

/// Input to [`crate::store::SurveyStore::add_question`].
/// `created_at` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
  pub prompt:         String,
  pub more_info_link: Option<String>,
  pub correct_answer: Option<bool>,
  pub expires_at:     Option<DateTime<Utc>>,
}

impl NewQuestion {
  /// Convenience constructor with all optional fields unset.
  pub fn new(prompt: impl Into<String>) -> Self {
    Self {
      prompt:         prompt.into(),
      more_info_link: None,
      correct_answer: None,
      expires_at:     None,
    }
  }

  /// Parse a `POST /questions` body. Same field rules as a patch, plus
  /// `prompt` is required.
  pub fn from_body(body: &Body) -> Result<Self> {
    let patch = QuestionPatch::from_body(body)?;
    let prompt = patch.prompt.ok_or_else(|| field::missing("prompt"))?;
    Ok(Self {
      prompt,
      more_info_link: patch.more_info_link.flatten(),
      correct_answer: patch.correct_answer.flatten(),
      expires_at: patch.expires_at.flatten(),
    })
  }
}
