//! Hypermedia envelopes.
//!
//! Every successful body is `{"data": ..., "links": {"self": ..., ...}}`. Link
//! URLs are built from the same route templates the router registers, so a
//! link can never point at a path the service does not serve.

use std::collections::BTreeMap;

use prophet_core::{question::Question, response::Response, user::User};
use serde::Serialize;

/// Route templates, in axum's `{param}` syntax.
pub mod paths {
  pub const USERS: &str = "/users";
  pub const USER: &str = "/users/{user_id}";
  pub const USER_RESPONSES: &str = "/users/{user_id}/responses";
  pub const USER_RESPONSE: &str = "/users/{user_id}/responses/{question_id}";
  pub const QUESTIONS: &str = "/questions";
  pub const QUESTION: &str = "/questions/{question_id}";
  pub const QUESTION_RESPONSES: &str = "/questions/{question_id}/responses";
  pub const QUESTION_RESPONSE: &str = "/questions/{question_id}/responses/{user_id}";
  pub const TEAPOT: &str = "/teapot";
}

/// Builds absolute URLs under the configured base.
#[derive(Debug, Clone)]
pub struct Links {
  base: String,
}

impl Links {
  pub fn new(base_url: impl Into<String>) -> Self {
    let mut base = base_url.into();
    while base.ends_with('/') {
      base.pop();
    }
    Self { base }
  }

  /// Fill `{name}` placeholders in `template` and prefix the base URL.
  pub fn url(&self, template: &str, params: &[(&str, i64)]) -> String {
    let mut path = template.to_owned();
    for (name, value) in params {
      path = path.replace(&format!("{{{name}}}"), &value.to_string());
    }
    format!("{}{path}", self.base)
  }

  fn user_url(&self, id: i64) -> String { self.url(paths::USER, &[("user_id", id)]) }

  fn user_responses_url(&self, id: i64) -> String {
    self.url(paths::USER_RESPONSES, &[("user_id", id)])
  }

  fn question_url(&self, id: i64) -> String {
    self.url(paths::QUESTION, &[("question_id", id)])
  }

  fn question_responses_url(&self, id: i64) -> String {
    self.url(paths::QUESTION_RESPONSES, &[("question_id", id)])
  }

  fn response_url(&self, user_id: i64, question_id: i64) -> String {
    self.url(paths::USER_RESPONSE, &[
      ("user_id", user_id),
      ("question_id", question_id),
    ])
  }

  // ── Envelopes ─────────────────────────────────────────────────────────────

  pub fn user(&self, user: &User) -> Envelope<UserData> {
    Envelope::new(UserData { id: user.id })
      .link("self", self.user_url(user.id))
      .link("responses", self.user_responses_url(user.id))
  }

  pub fn users(&self, users: &[User]) -> Envelope<Vec<UserData>> {
    Envelope::new(users.iter().map(|u| UserData { id: u.id }).collect())
      .link("self", self.url(paths::USERS, &[]))
  }

  pub fn question(&self, question: Question) -> Envelope<Question> {
    let id = question.id;
    Envelope::new(question)
      .link("self", self.question_url(id))
      .link("responses", self.question_responses_url(id))
  }

  pub fn questions(&self, questions: Vec<Question>) -> Envelope<Vec<Question>> {
    Envelope::new(questions).link("self", self.url(paths::QUESTIONS, &[]))
  }

  pub fn response(&self, response: Response) -> Envelope<Response> {
    let (user_id, question_id) = (response.user_id, response.question_id);
    Envelope::new(response)
      .link("self", self.response_url(user_id, question_id))
      .link("user", self.user_url(user_id))
      .link("question", self.question_url(question_id))
  }

  pub fn user_responses(
    &self,
    user_id: i64,
    responses: Vec<Response>,
  ) -> Envelope<Vec<Response>> {
    Envelope::new(responses)
      .link("self", self.user_responses_url(user_id))
      .link("user", self.user_url(user_id))
  }

  pub fn question_responses(
    &self,
    question_id: i64,
    responses: Vec<Response>,
  ) -> Envelope<Vec<Response>> {
    Envelope::new(responses)
      .link("self", self.question_responses_url(question_id))
      .link("question", self.question_url(question_id))
  }
}

/// `{"data": ..., "links": {...}}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
  pub data:  T,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub links: BTreeMap<&'static str, String>,
}

impl<T> Envelope<T> {
  pub fn new(data: T) -> Self {
    Self {
      data,
      links: BTreeMap::new(),
    }
  }

  fn link(mut self, rel: &'static str, url: String) -> Self {
    self.links.insert(rel, url);
    self
  }
}

/// Envelope returned by deletions: `{"data": {}}`.
pub fn deleted() -> Envelope<serde_json::Map<String, serde_json::Value>> {
  Envelope::new(serde_json::Map::new())
}

/// The public face of a [`User`]; the subject identifier is never output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserData {
  pub id: i64,
}
