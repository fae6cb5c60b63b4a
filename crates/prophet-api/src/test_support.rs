//! Token minting and state construction shared by the unit and router tests.

use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::{SystemTime, UNIX_EPOCH},
};

use axum::{Json, Router, extract::State, routing::get};
use jsonwebtoken::{Algorithm, EncodingKey, Header, jwk::JwkSet};
use prophet_store_sqlite::SqliteStore;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::{
  AppState,
  auth::{KeyCache, RequiredScopes, TokenVerifier},
  links::Links,
};

pub const TEST_KID: &str = "test-key-1";
pub const ISSUER: &str = "https://sts.example.com/tenant/";
pub const AUDIENCE: &str = "api://prophet";
pub const BASE_URL: &str = "http://prophet.test";

const PRIVATE_KEY_PEM: &str = include_str!("testdata/rsa_test_key.pem");

/// Public modulus of `testdata/rsa_test_key.pem`, base64url.
const MODULUS: &str = "vt7rTQDTgTdswPCQMkzVsuys1bkeXokJuEfwcMNcOK9CJ6Q62jdjD9ge5GUYtPcbQOuwAmb5bqYeMab3j96GS_2noxyiyxwEDr4uYQmQRo5wQKnQ8YKx7nER4WxKOeiuacBESW2d5ZGYJkgKRTeqwHFy1Vkzapf-00dC-PymFBKZiGMsvU1qck7aG6cnIP8VBBr432XBWtCC7ETMzCMZkRF3WuWBZIdaR_hkVNi7n2BwU15JOZh1o9IM_iKN1ePT2ubO_a3nfBX46T5PQco61kEQyigUkdcQCAwnEijHyNouND2W9hAEG61KDLsFvjMSQaS4o4OLysXZcu24iamDZQ";

/// A key set publishing the test key under `kid`.
pub fn jwks_with_kid(kid: &str) -> Value {
  json!({
    "keys": [{
      "kty": "RSA",
      "use": "sig",
      "alg": "RS256",
      "kid": kid,
      "n": MODULUS,
      "e": "AQAB",
    }],
  })
}

pub fn jwks() -> JwkSet { serde_json::from_value(jwks_with_kid(TEST_KID)).unwrap() }

pub fn verifier() -> TokenVerifier {
  TokenVerifier::new(KeyCache::fixed(jwks()), ISSUER, AUDIENCE)
}

fn now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap()
    .as_secs()
}

#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
  pub sub: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub scp: Option<String>,
  pub iss: String,
  pub aud: String,
  pub exp: u64,
}

impl TestClaims {
  pub fn for_subject(sub: &str) -> Self {
    Self {
      sub: sub.into(),
      scp: None,
      iss: ISSUER.into(),
      aud: AUDIENCE.into(),
      exp: now() + 3600,
    }
  }

  pub fn with_scopes(mut self, scp: &str) -> Self {
    self.scp = Some(scp.into());
    self
  }

  pub fn expired(mut self) -> Self {
    self.exp = now() - 3600;
    self
  }
}

pub fn mint_with_kid(claims: &TestClaims, kid: &str) -> String {
  let mut header = Header::new(Algorithm::RS256);
  header.kid = Some(kid.into());
  let key = EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM.as_bytes()).unwrap();
  jsonwebtoken::encode(&header, claims, &key).unwrap()
}

pub fn mint(claims: &TestClaims) -> String { mint_with_kid(claims, TEST_KID) }

/// A token signed with a shared secret, which the verifier must refuse.
pub fn mint_hs256(claims: &TestClaims) -> String {
  let mut header = Header::new(Algorithm::HS256);
  header.kid = Some(TEST_KID.into());
  jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(b"shared")).unwrap()
}

pub fn bearer(claims: &TestClaims) -> String { format!("Bearer {}", mint(claims)) }

pub async fn state(admin_scopes: &[&str]) -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(
    Arc::new(store),
    Links::new(BASE_URL),
    verifier(),
    RequiredScopes::new(admin_scopes.iter().copied()),
  )
}

// ─── Key server ──────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct KeyServerState {
  keys: Arc<Mutex<Value>>,
  hits: Arc<AtomicUsize>,
}

async fn serve_keys(State(state): State<KeyServerState>) -> Json<Value> {
  state.hits.fetch_add(1, Ordering::SeqCst);
  Json(state.keys.lock().unwrap().clone())
}

/// A local JWKS endpoint that counts how often it is fetched.
pub struct KeyServer {
  pub url: String,
  state:   KeyServerState,
}

impl KeyServer {
  pub async fn start(keys: Value) -> Self {
    let state = KeyServerState::default();
    *state.keys.lock().unwrap() = keys;

    let app = Router::new()
      .route("/discovery/v2.0/keys", get(serve_keys))
      .with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    Self {
      url: format!("http://{addr}/discovery/v2.0/keys"),
      state,
    }
  }

  pub fn fetches(&self) -> usize { self.state.hits.load(Ordering::SeqCst) }

  /// Replace the published set, as the provider does when it rotates keys.
  pub fn publish(&self, keys: Value) { *self.state.keys.lock().unwrap() = keys; }
}
