//! Runtime configuration, deserialised from `prophet.toml` and `PROPHET_*`
//! environment variables by the server binary.

use std::fmt;

use serde::Deserialize;

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 5000 }
fn default_key_cache_ttl_secs() -> u64 { 86_400 }
fn default_key_fetch_timeout_secs() -> u64 { 10 }

#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  /// Absolute prefix for every hypermedia link.
  pub base_url:               String,
  pub database_uri:           String,
  pub tenant_id:              String,
  pub client_id:              String,
  pub client_secret:          String,
  /// Expected `aud` claim.
  pub api_audience:           String,
  pub authority_base_url:     String,
  pub issuer_base_url:        String,
  #[serde(default = "default_key_cache_ttl_secs")]
  pub key_cache_ttl_secs:     u64,
  #[serde(default = "default_key_fetch_timeout_secs")]
  pub key_fetch_timeout_secs: u64,
  /// Scopes demanded on administrative routes; empty means sign-in suffices.
  #[serde(default)]
  pub admin_scopes:           Vec<String>,
}

impl ServerConfig {
  pub fn authority(&self) -> String {
    format!("{}/{}", self.authority_base_url.trim_end_matches('/'), self.tenant_id)
  }

  /// The expected `iss` claim. The trailing slash is significant.
  pub fn issuer(&self) -> String {
    format!("{}/{}/", self.issuer_base_url.trim_end_matches('/'), self.tenant_id)
  }

  pub fn jwks_url(&self) -> String { format!("{}/discovery/v2.0/keys", self.authority()) }
}

// Hand-written so the client secret never reaches a log line.
impl fmt::Debug for ServerConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ServerConfig")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("base_url", &self.base_url)
      .field("database_uri", &self.database_uri)
      .field("tenant_id", &self.tenant_id)
      .field("client_id", &self.client_id)
      .field("client_secret", &"<redacted>")
      .field("api_audience", &self.api_audience)
      .field("authority_base_url", &self.authority_base_url)
      .field("issuer_base_url", &self.issuer_base_url)
      .field("key_cache_ttl_secs", &self.key_cache_ttl_secs)
      .field("key_fetch_timeout_secs", &self.key_fetch_timeout_secs)
      .field("admin_scopes", &self.admin_scopes)
      .finish()
  }
}
