//! User: a local mapping for an identity-provider subject.
//!
//! For now a user carries nothing but its internal ID and the `sub` claim it
//! was created from. The subject identifier is never sent to clients.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  field::{self, Body},
};

/// Upper bound on the stored `sub` claim length.
pub const SUBJECT_IDENTIFIER_MAX_LEN: usize = 44;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:                 i64,
  pub subject_identifier: String,
}

/// Input to [`crate::store::SurveyStore::add_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
  pub subject_identifier: String,
}

impl NewUser {
  pub fn new(subject_identifier: impl Into<String>) -> Result<Self> {
    let subject_identifier = subject_identifier.into();
    validate_subject(&subject_identifier)?;
    Ok(Self { subject_identifier })
  }

  /// Parse a `POST /users` body: `{"subject_identifier": "..."}`.
  pub fn from_body(body: &Body) -> Result<Self> {
    let mut subject = None;
    for (key, value) in body {
      match key.as_str() {
        "subject_identifier" => {
          subject = Some(field::string(key, value)?);
        }
        "id" => return Err(field::read_only(key)),
        other => return Err(field::unknown(other)),
      }
    }
    let subject = subject.ok_or_else(|| field::missing("subject_identifier"))?;
    Self::new(subject)
  }
}

fn validate_subject(subject: &str) -> Result<()> {
  if subject.is_empty() {
    return Err(crate::Error::invalid("subject_identifier", "must not be empty"));
  }
  if subject.chars().count() > SUBJECT_IDENTIFIER_MAX_LEN {
    return Err(crate::Error::invalid(
      "subject_identifier",
      format!("must be at most {SUBJECT_IDENTIFIER_MAX_LEN} characters"),
    ));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::Error;

  fn body(v: serde_json::Value) -> Body { v.as_object().unwrap().clone() }

  #[test]
  fn parses_subject() {
    let user = NewUser::from_body(&body(json!({ "subject_identifier": "abc" })))
      .unwrap();
    assert_eq!(user.subject_identifier, "abc");
  }

  #[test]
  fn rejects_overlong_subject() {
    let long = "x".repeat(SUBJECT_IDENTIFIER_MAX_LEN + 1);
    let err = NewUser::from_body(&body(json!({ "subject_identifier": long })))
      .unwrap_err();
    assert!(matches!(err, Error::InvalidField { field, .. } if field == "subject_identifier"));
  }

  #[test]
  fn rejects_client_supplied_id() {
    let err = NewUser::from_body(&body(json!({ "id": 3, "subject_identifier": "abc" })))
      .unwrap_err();
    assert!(matches!(err, Error::InvalidField { field, .. } if field == "id"));
  }

  #[test]
  fn missing_subject_is_reported() {
    let err = NewUser::from_body(&Body::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidField { field, .. } if field == "subject_identifier"));
  }
}
