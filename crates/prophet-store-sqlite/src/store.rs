//! [`SqliteStore`]: the SQLite implementation of [`SurveyStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, TransactionBehavior};

use prophet_core::{
  question::{NewQuestion, Question, QuestionPatch},
  response::{Response, ResponsePatch, Upsert},
  store::SurveyStore,
  user::{NewUser, User},
};

use crate::{
  Error, Result,
  encode::{
    QUESTION_COLUMNS, RESPONSE_COLUMNS, RawQuestion, RawResponse, USER_COLUMNS,
    encode_dt, encode_time, user_from_row,
  },
  schema::SCHEMA,
};

/// Return a crate-level error out of a `Connection::call` closure without
/// committing. The closure's outer `Result` carries driver errors; the inner
/// one carries decoding and domain failures.
macro_rules! try_inner {
  ($e:expr) => {
    match $e {
      Ok(v) => v,
      Err(e) => return Ok(Err(Error::from(e))),
    }
  };
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Prophet store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_responses(
    &self,
    column: &'static str,
    key: i64,
  ) -> Result<Vec<Response>> {
    let raws: Vec<RawResponse> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RESPONSE_COLUMNS} FROM response WHERE {column} = ?1
           ORDER BY user_id, question_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![key], RawResponse::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResponse::into_response).collect()
  }
}

// ─── SurveyStore impl ────────────────────────────────────────────────────────

impl SurveyStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn list_users(&self) -> Result<Vec<User>> {
    let users = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {USER_COLUMNS} FROM \"user\" ORDER BY id"))?;
        let rows = stmt
          .query_map([], user_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(users)
  }

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let subject = input.subject_identifier;

    let user = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let taken = tx
          .query_row(
            "SELECT 1 FROM \"user\" WHERE subject_identifier = ?1",
            rusqlite::params![subject],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(Err(Error::Core(prophet_core::Error::invalid(
            "subject_identifier",
            "already registered",
          ))));
        }
        let user = tx.query_row(
          &format!(
            "INSERT INTO \"user\" (subject_identifier) VALUES (?1)
             RETURNING {USER_COLUMNS}"
          ),
          rusqlite::params![subject],
          user_from_row,
        )?;
        tx.commit()?;
        Ok(Ok(user))
      })
      .await??;

    tracing::info!(user_id = user.id, "created user");
    Ok(user)
  }

  async fn get_user(&self, id: i64) -> Result<Option<User>> {
    let user = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {USER_COLUMNS} FROM \"user\" WHERE id = ?1"),
            rusqlite::params![id],
            user_from_row,
          )
          .optional()?)
      })
      .await?;
    Ok(user)
  }

  async fn find_user_by_subject(&self, subject: &str) -> Result<Option<User>> {
    let subject = subject.to_owned();
    let user = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {USER_COLUMNS} FROM \"user\" WHERE subject_identifier = ?1"
            ),
            rusqlite::params![subject],
            user_from_row,
          )
          .optional()?)
      })
      .await?;
    Ok(user)
  }

  async fn find_or_add_user(&self, input: NewUser) -> Result<User> {
    let subject = input.subject_identifier;

    let (user, created) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = tx
          .query_row(
            &format!(
              "SELECT {USER_COLUMNS} FROM \"user\" WHERE subject_identifier = ?1"
            ),
            rusqlite::params![subject],
            user_from_row,
          )
          .optional()?;
        let outcome = match existing {
          Some(user) => (user, false),
          None => {
            let user = tx.query_row(
              &format!(
                "INSERT INTO \"user\" (subject_identifier) VALUES (?1)
                 RETURNING {USER_COLUMNS}"
              ),
              rusqlite::params![subject],
              user_from_row,
            )?;
            (user, true)
          }
        };
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    if created {
      tracing::info!(user_id = user.id, "created user on first sign-in");
    }
    Ok(user)
  }

  async fn delete_user(&self, id: i64) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM \"user\" WHERE id = ?1", rusqlite::params![id])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  // ── Questions ─────────────────────────────────────────────────────────────

  async fn list_questions(&self) -> Result<Vec<Question>> {
    let raws: Vec<RawQuestion> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {QUESTION_COLUMNS} FROM question ORDER BY id"))?;
        let rows = stmt
          .query_map([], RawQuestion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  async fn add_question(&self, input: NewQuestion) -> Result<Question> {
    let expires_at = input.expires_at.map(encode_dt);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO question (prompt, more_info_link, correct_answer, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING {QUESTION_COLUMNS}"
          ),
          rusqlite::params![
            input.prompt,
            input.more_info_link,
            input.correct_answer,
            expires_at,
          ],
          RawQuestion::from_row,
        )?)
      })
      .await?;

    raw.into_question()
  }

  async fn get_question(&self, id: i64) -> Result<Option<Question>> {
    let raw: Option<RawQuestion> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {QUESTION_COLUMNS} FROM question WHERE id = ?1"),
            rusqlite::params![id],
            RawQuestion::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawQuestion::into_question).transpose()
  }

  async fn update_question(
    &self,
    id:    i64,
    patch: QuestionPatch,
  ) -> Result<Option<Question>> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = tx
          .query_row(
            &format!("SELECT {QUESTION_COLUMNS} FROM question WHERE id = ?1"),
            rusqlite::params![id],
            RawQuestion::from_row,
          )
          .optional()?;
        let Some(raw) = raw else {
          return Ok(Ok(None));
        };

        let mut question = try_inner!(raw.into_question());
        question.apply(patch);

        tx.execute(
          "UPDATE question
           SET prompt = ?2, more_info_link = ?3, correct_answer = ?4, expires_at = ?5
           WHERE id = ?1",
          rusqlite::params![
            id,
            question.prompt,
            question.more_info_link,
            question.correct_answer,
            question.expires_at.map(encode_dt),
          ],
        )?;
        tx.commit()?;
        Ok(Ok(Some(question)))
      })
      .await?
  }

  async fn delete_question(&self, id: i64) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM question WHERE id = ?1", rusqlite::params![id])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  // ── Responses ─────────────────────────────────────────────────────────────

  async fn get_response(
    &self,
    user_id:     i64,
    question_id: i64,
  ) -> Result<Option<Response>> {
    let raw: Option<RawResponse> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {RESPONSE_COLUMNS} FROM response
               WHERE user_id = ?1 AND question_id = ?2"
            ),
            rusqlite::params![user_id, question_id],
            RawResponse::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawResponse::into_response).transpose()
  }

  async fn list_user_responses(&self, user_id: i64) -> Result<Vec<Response>> {
    self.query_responses("user_id", user_id).await
  }

  async fn list_question_responses(
    &self,
    question_id: i64,
  ) -> Result<Vec<Response>> {
    self.query_responses("question_id", question_id).await
  }

  async fn put_response(
    &self,
    user_id:     i64,
    question_id: i64,
    patch:       ResponsePatch,
  ) -> Result<(Response, Upsert)> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing = tx
          .query_row(
            &format!(
              "SELECT {RESPONSE_COLUMNS} FROM response
               WHERE user_id = ?1 AND question_id = ?2"
            ),
            rusqlite::params![user_id, question_id],
            RawResponse::from_row,
          )
          .optional()?;

        let outcome = match existing {
          Some(raw) => {
            try_inner!(patch.check_key(user_id, question_id));
            let mut response = try_inner!(raw.into_response());
            response.apply(patch);
            tx.execute(
              "UPDATE response SET response = ?3, view_time = ?4
               WHERE user_id = ?1 AND question_id = ?2",
              rusqlite::params![
                user_id,
                question_id,
                response.response,
                encode_time(response.view_time),
              ],
            )?;
            (response, Upsert::Updated)
          }
          None => {
            let new = try_inner!(patch.into_new(user_id, question_id));
            let raw = tx.query_row(
              &format!(
                "INSERT INTO response (user_id, question_id, response, view_time)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING {RESPONSE_COLUMNS}"
              ),
              rusqlite::params![
                new.user_id,
                new.question_id,
                new.response,
                encode_time(new.view_time),
              ],
              RawResponse::from_row,
            )?;
            (try_inner!(raw.into_response()), Upsert::Created)
          }
        };

        tx.commit()?;
        Ok(Ok(outcome))
      })
      .await?
  }
}
