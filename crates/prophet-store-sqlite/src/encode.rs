//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, view times as `HH:MM:SS[.f]`.
//! Booleans use SQLite's native 0/1 integers via rusqlite.

use chrono::{DateTime, NaiveTime, Utc};
use prophet_core::{question::Question, response::Response, user::User};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── NaiveTime ───────────────────────────────────────────────────────────────

pub fn encode_time(t: NaiveTime) -> String { t.to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "id, subject_identifier";

pub const QUESTION_COLUMNS: &str =
  "id, prompt, more_info_link, correct_answer, created_at, expires_at";

pub const RESPONSE_COLUMNS: &str =
  "user_id, question_id, response, view_time, answered_at";

// ─── Raw rows ────────────────────────────────────────────────────────────────

pub fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    id:                 row.get(0)?,
    subject_identifier: row.get(1)?,
  })
}

/// Flat row read straight from SQLite; decoded into a [`Question`] via
/// [`RawQuestion::into_question`].
#[derive(Debug)]
pub struct RawQuestion {
  pub id:             i64,
  pub prompt:         String,
  pub more_info_link: Option<String>,
  pub correct_answer: Option<bool>,
  pub created_at:     String,
  pub expires_at:     Option<String>,
}

impl RawQuestion {
  /// Expects the columns in [`QUESTION_COLUMNS`] order.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      prompt:         row.get(1)?,
      more_info_link: row.get(2)?,
      correct_answer: row.get(3)?,
      created_at:     row.get(4)?,
      expires_at:     row.get(5)?,
    })
  }

  pub fn into_question(self) -> Result<Question> {
    Ok(Question {
      id:             self.id,
      prompt:         self.prompt,
      more_info_link: self.more_info_link,
      correct_answer: self.correct_answer,
      created_at:     decode_dt(&self.created_at)?,
      expires_at:     self.expires_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

#[derive(Debug)]
pub struct RawResponse {
  pub user_id:     i64,
  pub question_id: i64,
  pub response:    Option<bool>,
  pub view_time:   String,
  pub answered_at: String,
}

impl RawResponse {
  /// Expects the columns in [`RESPONSE_COLUMNS`] order.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:     row.get(0)?,
      question_id: row.get(1)?,
      response:    row.get(2)?,
      view_time:   row.get(3)?,
      answered_at: row.get(4)?,
    })
  }

  pub fn into_response(self) -> Result<Response> {
    Ok(Response {
      user_id:     self.user_id,
      question_id: self.question_id,
      response:    self.response,
      view_time:   decode_time(&self.view_time)?,
      answered_at: decode_dt(&self.answered_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sqlite_default_timestamp_decodes() {
    let dt = decode_dt("2024-03-01T12:30:45.123Z").unwrap();
    assert_eq!(dt.timestamp_subsec_millis(), 123);
  }

  #[test]
  fn view_time_survives_storage() {
    let t = NaiveTime::from_hms_milli_opt(0, 0, 5, 500).unwrap();
    assert_eq!(decode_time(&encode_time(t)).unwrap(), t);
    let t = NaiveTime::from_hms_opt(0, 2, 0).unwrap();
    assert_eq!(encode_time(t), "00:02:00");
  }

  #[test]
  fn garbage_timestamp_is_an_error() {
    assert!(matches!(decode_dt("yesterday"), Err(Error::DateParse(_))));
  }
}
