//! The `SurveyStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `prophet-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  DomainError,
  question::{NewQuestion, Question, QuestionPatch},
  response::{Response, ResponsePatch, Upsert},
  user::{NewUser, User},
};

/// Abstraction over a Prophet storage backend.
///
/// Every method is a single storage transaction. Referential integrity and the
/// one-response-per-pair rule are enforced by the backend, not by callers.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SurveyStore: Send + Sync {
  type Error: std::error::Error + DomainError + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Persist a new user. Fails with a domain error if the subject identifier
  /// is already registered.
  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn find_user_by_subject<'a>(
    &'a self,
    subject: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Look up the user for `input.subject_identifier`, creating it in the same
  /// transaction if it does not exist yet.
  fn find_or_add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Delete a user and, through the cascade, their responses. Returns `false`
  /// if no such user existed.
  fn delete_user(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Questions ─────────────────────────────────────────────────────────

  fn list_questions(
    &self,
  ) -> impl Future<Output = Result<Vec<Question>, Self::Error>> + Send + '_;

  /// Persist a new question. `created_at` is assigned by the store.
  fn add_question(
    &self,
    input: NewQuestion,
  ) -> impl Future<Output = Result<Question, Self::Error>> + Send + '_;

  fn get_question(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Question>, Self::Error>> + Send + '_;

  /// Apply `patch` to an existing question. Returns `None` if not found.
  fn update_question(
    &self,
    id: i64,
    patch: QuestionPatch,
  ) -> impl Future<Output = Result<Option<Question>, Self::Error>> + Send + '_;

  /// Delete a question and its responses. Returns `false` if not found.
  fn delete_question(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Responses ─────────────────────────────────────────────────────────

  fn get_response(
    &self,
    user_id: i64,
    question_id: i64,
  ) -> impl Future<Output = Result<Option<Response>, Self::Error>> + Send + '_;

  fn list_user_responses(
    &self,
    user_id: i64,
  ) -> impl Future<Output = Result<Vec<Response>, Self::Error>> + Send + '_;

  fn list_question_responses(
    &self,
    question_id: i64,
  ) -> impl Future<Output = Result<Vec<Response>, Self::Error>> + Send + '_;

  /// Create the response for `(user_id, question_id)` from `patch`, or apply
  /// `patch` to the existing one. Both users and questions must already
  /// exist. Creation-time validation failures surface as domain errors.
  fn put_response(
    &self,
    user_id: i64,
    question_id: i64,
    patch: ResponsePatch,
  ) -> impl Future<Output = Result<(Response, Upsert), Self::Error>> + Send + '_;
}
