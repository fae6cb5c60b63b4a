//! Bearer-token authentication and scope enforcement.
//!
//! Tokens are RS256 JWTs issued by an external identity provider. Signing keys
//! come from the provider's JWKS endpoint and are cached; an unknown `kid`
//! forces one refetch so rotated keys are picked up without a restart. Forced
//! refetches are rate limited by [`MIN_REFRESH_INTERVAL`].
//!
//! The gate is two axum middlewares attached per route when the router is
//! built: [`require_auth`] verifies the token and stores the [`Identity`] in
//! the request extensions, then [`require_scopes`] checks the `scp` claim.

use std::{
  convert::Infallible,
  sync::Arc,
  time::{Duration, Instant},
};

use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, StatusCode, header, request::Parts},
  middleware::Next,
  response::Response,
};
use jsonwebtoken::{
  Algorithm, DecodingKey, Validation,
  errors::ErrorKind,
  jwk::{Jwk, JwkSet},
};
use prophet_core::identity::{Claims, Identity, RequestContext};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::error::ApiError;

/// The only signing algorithm accepted.
pub const ALGORITHM: Algorithm = Algorithm::RS256;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AuthError {
  #[error("Authorization header not present")]
  MissingHeader,
  #[error("Could not parse Authorization header")]
  MalformedHeader,
  #[error("`{0}` algorithm not supported")]
  UnsupportedAlgorithm(String),
  #[error("Token key not found")]
  KeyNotFound,
  #[error("JWT token expired")]
  Expired,
  #[error("Invalid claims: {0}")]
  InvalidClaims(String),
  #[error("Invalid token: {0}")]
  InvalidToken(String),
  #[error("Scope `{0}` required")]
  ScopeRequired(String),
  #[error("Sign in required")]
  SignInRequired,
  #[error("User must be logged in to access `/users/me`")]
  MeRequiresSignIn,
  #[error("Could not fetch signing keys: {0}")]
  KeySetUnavailable(String),
}

impl AuthError {
  pub fn status(&self) -> StatusCode {
    match self {
      AuthError::KeySetUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      _ => StatusCode::UNAUTHORIZED,
    }
  }
}

// ─── Header parsing ──────────────────────────────────────────────────────────

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
  let value = headers
    .get(header::AUTHORIZATION)
    .ok_or(AuthError::MissingHeader)?
    .to_str()
    .map_err(|_| AuthError::MalformedHeader)?;

  let mut parts = value.split_whitespace();
  match (parts.next(), parts.next(), parts.next()) {
    (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => {
      Ok(token)
    }
    _ => Err(AuthError::MalformedHeader),
  }
}

// ─── Signing keys ────────────────────────────────────────────────────────────

/// Where signing keys come from.
#[derive(Debug)]
pub enum KeySource {
  /// The provider's JWKS endpoint.
  Remote { client: reqwest::Client, url: String },
  /// A fixed key set, for tests and offline deployments.
  Static(JwkSet),
}

impl KeySource {
  async fn fetch(&self) -> Result<JwkSet, AuthError> {
    match self {
      KeySource::Remote { client, url } => {
        tracing::debug!(%url, "fetching signing keys");
        let unavailable = |e: reqwest::Error| AuthError::KeySetUnavailable(e.to_string());
        client
          .get(url)
          .send()
          .await
          .and_then(reqwest::Response::error_for_status)
          .map_err(unavailable)?
          .json::<JwkSet>()
          .await
          .map_err(unavailable)
      }
      KeySource::Static(keys) => Ok(keys.clone()),
    }
  }
}

#[derive(Debug)]
struct CachedKeys {
  keys:       Arc<JwkSet>,
  fetched_at: Instant,
}

/// Shortest gap between two key-set fetches forced by an unknown `kid`.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Time-bounded cache over a [`KeySource`].
///
/// A miss on `kid` refetches at most once per `min_refresh`, so tokens with
/// made-up key IDs cannot turn every request into a provider round trip.
#[derive(Debug)]
pub struct KeyCache {
  source:      KeySource,
  ttl:         Duration,
  min_refresh: Duration,
  cached:      RwLock<Option<CachedKeys>>,
}

impl KeyCache {
  pub fn new(source: KeySource, ttl: Duration) -> Self {
    Self {
      source,
      ttl,
      min_refresh: MIN_REFRESH_INTERVAL,
      cached: RwLock::new(None),
    }
  }

  pub fn remote(client: reqwest::Client, url: impl Into<String>, ttl: Duration) -> Self {
    Self::new(
      KeySource::Remote {
        client,
        url: url.into(),
      },
      ttl,
    )
  }

  pub fn fixed(keys: JwkSet) -> Self {
    Self::new(KeySource::Static(keys), Duration::MAX)
  }

  pub fn with_min_refresh(mut self, min_refresh: Duration) -> Self {
    self.min_refresh = min_refresh;
    self
  }

  /// Decoding key for `kid`, refetching once if the cached set lacks it.
  pub async fn key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
    let keys = self.current(false).await?;
    if let Some(jwk) = keys.find(kid) {
      return decoding_key(jwk);
    }

    let keys = self.current(true).await?;
    match keys.find(kid) {
      Some(jwk) => decoding_key(jwk),
      None => Err(AuthError::KeyNotFound),
    }
  }

  /// The cached set if it may still be used: within the TTL for a normal
  /// lookup, within `min_refresh` when a refresh is being forced.
  fn reusable(&self, cached: &CachedKeys, refresh: bool) -> Option<Arc<JwkSet>> {
    let age = cached.fetched_at.elapsed();
    let limit = if refresh { self.min_refresh.min(self.ttl) } else { self.ttl };
    (age < limit).then(|| cached.keys.clone())
  }

  async fn current(&self, refresh: bool) -> Result<Arc<JwkSet>, AuthError> {
    if let Some(keys) = self
      .cached
      .read()
      .await
      .as_ref()
      .and_then(|c| self.reusable(c, refresh))
    {
      return Ok(keys);
    }

    let mut slot = self.cached.write().await;
    // Another request may have refreshed while we waited for the lock.
    if let Some(keys) = slot.as_ref().and_then(|c| self.reusable(c, refresh)) {
      return Ok(keys);
    }

    let keys = Arc::new(self.source.fetch().await?);
    *slot = Some(CachedKeys {
      keys:       keys.clone(),
      fetched_at: Instant::now(),
    });
    Ok(keys)
  }
}

fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
  DecodingKey::from_jwk(jwk).map_err(|e| AuthError::InvalidToken(e.to_string()))
}

// ─── Verification ────────────────────────────────────────────────────────────

/// Verifies bearer tokens against the provider's keys, issuer and audience.
#[derive(Debug)]
pub struct TokenVerifier {
  keys:       KeyCache,
  validation: Validation,
}

impl TokenVerifier {
  pub fn new(keys: KeyCache, issuer: &str, audience: &str) -> Self {
    let mut validation = Validation::new(ALGORITHM);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    Self { keys, validation }
  }

  pub async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
    let header = jsonwebtoken::decode_header(token)
      .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    // Checked before any key lookup so a foreign algorithm never reaches the
    // signature verifier.
    if header.alg != ALGORITHM {
      return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
    }

    let kid = header.kid.ok_or(AuthError::KeyNotFound)?;
    let key = self.keys.key(&kid).await?;

    let data = jsonwebtoken::decode::<Claims>(token, &key, &self.validation)
      .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims(e.to_string()),
        _ => AuthError::InvalidToken(e.to_string()),
      })?;

    Ok(Identity {
      token:  token.to_owned(),
      claims: data.claims,
    })
  }
}

// ─── Scopes ──────────────────────────────────────────────────────────────────

/// Fail unless the caller is signed in and holds every scope in `scopes`.
pub fn check_scopes<T: AsRef<str>>(
  ctx: &RequestContext,
  scopes: &[T],
) -> Result<(), AuthError> {
  let identity = ctx.identity().ok_or(AuthError::SignInRequired)?;
  for scope in scopes {
    let scope = scope.as_ref();
    if !identity.claims.has_scope(scope) {
      return Err(AuthError::ScopeRequired(scope.to_owned()));
    }
  }
  Ok(())
}

/// Scopes demanded by a [`require_scopes`] layer.
#[derive(Debug, Clone)]
pub struct RequiredScopes(Arc<[String]>);

impl RequiredScopes {
  pub fn new<I, T>(scopes: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    Self(scopes.into_iter().map(Into::into).collect())
  }
}

// ─── Middleware ──────────────────────────────────────────────────────────────

/// Reject requests without a valid bearer token; otherwise attach the
/// caller's [`Identity`] to the request.
pub async fn require_auth(
  State(verifier): State<Arc<TokenVerifier>>,
  mut req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  let token = bearer_token(req.headers())?;
  let identity = verifier.verify(token).await.inspect_err(|e| {
    tracing::warn!(reason = %e, path = %req.uri().path(), "rejected bearer token");
  })?;

  req.extensions_mut().insert(Arc::new(identity));
  Ok(next.run(req).await)
}

/// Must be layered inside [`require_auth`]; without an identity it fails with
/// [`AuthError::SignInRequired`].
pub async fn require_scopes(
  State(scopes): State<RequiredScopes>,
  req: Request,
  next: Next,
) -> Result<Response, ApiError> {
  let ctx = context_from(req.extensions());
  check_scopes(&ctx, &scopes.0[..]).inspect_err(|e| {
    tracing::warn!(reason = %e, path = %req.uri().path(), "insufficient scope");
  })?;
  Ok(next.run(req).await)
}

fn context_from(extensions: &axum::http::Extensions) -> RequestContext {
  match extensions.get::<Arc<Identity>>() {
    Some(identity) => RequestContext::signed_in(identity.clone()),
    None => RequestContext::anonymous(),
  }
}

/// Extractor yielding the caller's [`RequestContext`]. Never rejects: public
/// routes simply see an anonymous context.
pub struct Caller(pub RequestContext);

impl<S> FromRequestParts<S> for Caller
where
  S: Send + Sync,
{
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    Ok(Caller(context_from(&parts.extensions)))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;
  use crate::test_support::{self, KeyServer, TestClaims};

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  // ── Header parsing ────────────────────────────────────────────────────────

  #[test]
  fn bearer_token_extracted() {
    assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), "abc");
  }

  #[test]
  fn missing_header() {
    assert!(matches!(bearer_token(&HeaderMap::new()), Err(AuthError::MissingHeader)));
  }

  #[test]
  fn malformed_headers() {
    for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer a b", ""] {
      assert!(
        matches!(bearer_token(&headers(value)), Err(AuthError::MalformedHeader)),
        "accepted {value:?}"
      );
    }
  }

  // ── Verification ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn valid_token_yields_identity() {
    let verifier = test_support::verifier();
    let token = test_support::mint(&TestClaims::for_subject("alice").with_scopes("a b"));

    let identity = verifier.verify(&token).await.unwrap();
    assert_eq!(identity.claims.sub, "alice");
    assert!(identity.claims.has_scope("b"));
    assert_eq!(identity.token, token);
  }

  #[tokio::test]
  async fn unsupported_algorithm_rejected_before_key_lookup() {
    // Points at a closed port: any key fetch would fail as KeySetUnavailable.
    let verifier = TokenVerifier::new(
      KeyCache::remote(
        reqwest::Client::new(),
        "http://127.0.0.1:9/discovery/v2.0/keys",
        Duration::from_secs(60),
      ),
      test_support::ISSUER,
      test_support::AUDIENCE,
    );
    let token = test_support::mint_hs256(&TestClaims::for_subject("mallory"));

    let err = verifier.verify(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::UnsupportedAlgorithm(ref alg) if alg == "HS256"));
    assert_eq!(err.to_string(), "`HS256` algorithm not supported");
  }

  #[tokio::test]
  async fn expired_token() {
    let verifier = test_support::verifier();
    let token = test_support::mint(&TestClaims::for_subject("alice").expired());
    assert!(matches!(verifier.verify(&token).await, Err(AuthError::Expired)));
  }

  #[tokio::test]
  async fn wrong_audience() {
    let verifier = test_support::verifier();
    let mut claims = TestClaims::for_subject("alice");
    claims.aud = "api://someone-else".into();
    let token = test_support::mint(&claims);
    assert!(matches!(verifier.verify(&token).await, Err(AuthError::InvalidClaims(_))));
  }

  #[tokio::test]
  async fn wrong_issuer() {
    let verifier = test_support::verifier();
    let mut claims = TestClaims::for_subject("alice");
    claims.iss = "https://evil.example/tenant/".into();
    let token = test_support::mint(&claims);
    assert!(matches!(verifier.verify(&token).await, Err(AuthError::InvalidClaims(_))));
  }

  #[tokio::test]
  async fn unknown_key_id() {
    let verifier = test_support::verifier();
    let token = test_support::mint_with_kid(&TestClaims::for_subject("alice"), "rotated-away");
    assert!(matches!(verifier.verify(&token).await, Err(AuthError::KeyNotFound)));
  }

  #[tokio::test]
  async fn garbage_token() {
    let verifier = test_support::verifier();
    assert!(matches!(
      verifier.verify("not-a-jwt").await,
      Err(AuthError::InvalidToken(_))
    ));
  }

  // ── Key cache ─────────────────────────────────────────────────────────────

  fn remote_verifier(keys: KeyCache) -> TokenVerifier {
    TokenVerifier::new(keys, test_support::ISSUER, test_support::AUDIENCE)
  }

  fn remote_cache(url: &str, ttl: Duration) -> KeyCache {
    KeyCache::remote(reqwest::Client::new(), url, ttl)
  }

  #[tokio::test]
  async fn keys_fetched_once_within_ttl() {
    let server = KeyServer::start(test_support::jwks_with_kid(test_support::TEST_KID)).await;
    let verifier = remote_verifier(remote_cache(&server.url, Duration::from_secs(86_400)));

    for sub in ["alice", "bob", "carol"] {
      let token = test_support::mint(&TestClaims::for_subject(sub));
      verifier.verify(&token).await.unwrap();
    }
    assert_eq!(server.fetches(), 1);
  }

  #[tokio::test]
  async fn keys_refetched_after_ttl() {
    let server = KeyServer::start(test_support::jwks_with_kid(test_support::TEST_KID)).await;
    let verifier = remote_verifier(remote_cache(&server.url, Duration::from_millis(50)));
    let token = test_support::mint(&TestClaims::for_subject("alice"));

    verifier.verify(&token).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    verifier.verify(&token).await.unwrap();
    assert_eq!(server.fetches(), 2);
  }

  #[tokio::test]
  async fn rotated_key_picked_up_by_single_refetch() {
    let server = KeyServer::start(test_support::jwks_with_kid("retired-key")).await;
    let cache = remote_cache(&server.url, Duration::from_secs(86_400))
      .with_min_refresh(Duration::ZERO);
    let verifier = remote_verifier(cache);

    let old = test_support::mint_with_kid(&TestClaims::for_subject("alice"), "retired-key");
    verifier.verify(&old).await.unwrap();
    assert_eq!(server.fetches(), 1);

    server.publish(test_support::jwks_with_kid(test_support::TEST_KID));
    let new = test_support::mint(&TestClaims::for_subject("alice"));
    let identity = verifier.verify(&new).await.unwrap();
    assert_eq!(identity.claims.sub, "alice");
    assert_eq!(server.fetches(), 2);
  }

  #[tokio::test]
  async fn unknown_key_ids_do_not_hammer_the_provider() {
    let server = KeyServer::start(test_support::jwks_with_kid(test_support::TEST_KID)).await;
    let verifier = remote_verifier(remote_cache(&server.url, Duration::from_secs(86_400)));

    verifier
      .verify(&test_support::mint(&TestClaims::for_subject("alice")))
      .await
      .unwrap();
    assert_eq!(server.fetches(), 1);

    for n in 0..20 {
      let token =
        test_support::mint_with_kid(&TestClaims::for_subject("mallory"), &format!("bogus-{n}"));
      assert!(matches!(verifier.verify(&token).await, Err(AuthError::KeyNotFound)));
    }
    assert_eq!(server.fetches(), 1);
  }

  #[tokio::test]
  async fn unknown_key_id_refetches_once_the_interval_has_passed() {
    let server = KeyServer::start(test_support::jwks_with_kid(test_support::TEST_KID)).await;
    let cache = remote_cache(&server.url, Duration::from_secs(86_400))
      .with_min_refresh(Duration::from_millis(50));
    let verifier = remote_verifier(cache);
    let bogus = test_support::mint_with_kid(&TestClaims::for_subject("mallory"), "bogus");

    // First miss: initial fetch, then the forced refresh is throttled.
    assert!(matches!(verifier.verify(&bogus).await, Err(AuthError::KeyNotFound)));
    assert_eq!(server.fetches(), 1);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(matches!(verifier.verify(&bogus).await, Err(AuthError::KeyNotFound)));
    assert_eq!(server.fetches(), 2);
  }

  #[tokio::test]
  async fn unreachable_key_set() {
    let verifier = TokenVerifier::new(
      KeyCache::remote(
        reqwest::Client::new(),
        "http://127.0.0.1:9/discovery/v2.0/keys",
        Duration::from_secs(60),
      ),
      test_support::ISSUER,
      test_support::AUDIENCE,
    );
    let token = test_support::mint(&TestClaims::for_subject("alice"));
    let err = verifier.verify(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::KeySetUnavailable(_)));
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
  }

  // ── Scopes ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn scope_check_requires_identity() {
    let err = check_scopes(&RequestContext::anonymous(), &["Questions.Write"]).unwrap_err();
    assert!(matches!(err, AuthError::SignInRequired));
  }

  #[tokio::test]
  async fn scope_check_reports_first_missing_scope() {
    let identity = test_support::verifier()
      .verify(&test_support::mint(
        &TestClaims::for_subject("alice").with_scopes("Questions.Read"),
      ))
      .await
      .unwrap();
    let ctx = RequestContext::signed_in(Arc::new(identity));

    assert!(check_scopes(&ctx, &["Questions.Read"]).is_ok());
    let err = check_scopes(&ctx, &["Questions.Read", "Questions.Write", "Admin"]).unwrap_err();
    assert!(matches!(err, AuthError::ScopeRequired(ref s) if s == "Questions.Write"));
  }
}
