//! JSON REST API for Prophet.
//!
//! Exposes an axum [`Router`] backed by any [`SurveyStore`]. Authentication
//! is attached per route while the router is built: public routes carry no
//! layer, signed-in routes verify the bearer token, and administrative routes
//! additionally check the configured scopes.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod links;
pub mod questions;
pub mod resolve;
pub mod responses;
pub mod teapot;
pub mod users;

#[cfg(test)]
mod test_support;

use std::{sync::Arc, time::Duration};

use axum::{
  Router, middleware,
  http::{Method, StatusCode, Uri},
  routing::{MethodRouter, delete, get, post, put},
};
use prophet_core::store::SurveyStore;

pub use config::ServerConfig;
pub use error::ApiError;

use auth::{KeyCache, RequiredScopes, TokenVerifier};
use links::{Links, paths};

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:        Arc<S>,
  pub links:        Arc<Links>,
  pub verifier:     Arc<TokenVerifier>,
  pub admin_scopes: RequiredScopes,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:        self.store.clone(),
      links:        self.links.clone(),
      verifier:     self.verifier.clone(),
      admin_scopes: self.admin_scopes.clone(),
    }
  }
}

impl<S: SurveyStore> AppState<S> {
  pub fn new(
    store: Arc<S>,
    links: Links,
    verifier: TokenVerifier,
    admin_scopes: RequiredScopes,
  ) -> Self {
    Self {
      store,
      links: Arc::new(links),
      verifier: Arc::new(verifier),
      admin_scopes,
    }
  }

  /// Wire up the identity provider's key endpoint from `config`.
  pub fn from_config(store: Arc<S>, config: &ServerConfig) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.key_fetch_timeout_secs))
      .build()?;
    let keys = KeyCache::remote(
      client,
      config.jwks_url(),
      Duration::from_secs(config.key_cache_ttl_secs),
    );

    Ok(Self::new(
      store,
      Links::new(config.base_url.as_str()),
      TokenVerifier::new(keys, &config.issuer(), &config.api_audience),
      RequiredScopes::new(config.admin_scopes.iter().cloned()),
    ))
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Attaches the auth layers to individual method routers.
struct Gates {
  verifier: Arc<TokenVerifier>,
  admin:    RequiredScopes,
}

impl Gates {
  fn signed_in<S>(&self, route: MethodRouter<S>) -> MethodRouter<S>
  where
    S: Clone + Send + Sync + 'static,
  {
    route.route_layer(middleware::from_fn_with_state(
      self.verifier.clone(),
      auth::require_auth,
    ))
  }

  /// Scope check first, then auth wrapped around it, so the token is verified
  /// before scopes are inspected.
  fn admin<S>(&self, route: MethodRouter<S>) -> MethodRouter<S>
  where
    S: Clone + Send + Sync + 'static,
  {
    self.signed_in(route.route_layer(middleware::from_fn_with_state(
      self.admin.clone(),
      auth::require_scopes,
    )))
  }
}

/// Build the full API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: SurveyStore + 'static,
{
  let gate = Gates {
    verifier: state.verifier.clone(),
    admin:    state.admin_scopes.clone(),
  };

  Router::new()
    // Users
    .route(
      paths::USERS,
      gate.admin(get(users::list::<S>).post(users::create::<S>)),
    )
    .route(
      paths::USER,
      gate
        .signed_in(get(users::get_one::<S>))
        .merge(gate.admin(delete(users::delete_one::<S>))),
    )
    .route(paths::USER_RESPONSES, gate.signed_in(get(users::responses::<S>)))
    .route(
      paths::USER_RESPONSE,
      gate.signed_in(get(responses::get_one::<S>).put(responses::put::<S>)),
    )
    // Questions
    .route(
      paths::QUESTIONS,
      get(questions::list::<S>).merge(gate.admin(post(questions::create::<S>))),
    )
    .route(
      paths::QUESTION,
      get(questions::get_one::<S>)
        .merge(gate.admin(put(questions::update::<S>).delete(questions::delete_one::<S>))),
    )
    .route(
      paths::QUESTION_RESPONSES,
      gate.signed_in(get(questions::responses::<S>)),
    )
    .route(
      paths::QUESTION_RESPONSE,
      gate.signed_in(get(responses::get_one::<S>).put(responses::put::<S>)),
    )
    // Misc
    .route(paths::TEAPOT, gate.signed_in(get(teapot::handler)))
    .fallback(not_found)
    .method_not_allowed_fallback(method_not_allowed)
    .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
  ApiError::NotFound(format!("No resource at `{}`", uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
  ApiError::Http {
    status:      StatusCode::METHOD_NOT_ALLOWED,
    description: format!("Method `{method}` not allowed on `{}`", uri.path()),
  }
}
