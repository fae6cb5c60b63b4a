//! The signed-in caller, as established by the auth layer.
//!
//! Handlers receive a [`RequestContext`] explicitly and hand it to whatever
//! needs to know who is asking; nothing reads identity from ambient state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The subset of access-token claims the service relies on. Issuer, audience
/// and expiry are checked during verification and not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  /// Identity-provider subject; stored as `User::subject_identifier`.
  pub sub:  String,
  /// Space-separated delegated scopes.
  #[serde(default)]
  pub scp:  Option<String>,
  #[serde(default)]
  pub name: Option<String>,
}

impl Claims {
  pub fn scopes(&self) -> impl Iterator<Item = &str> {
    self.scp.as_deref().unwrap_or_default().split_whitespace()
  }

  pub fn has_scope(&self, scope: &str) -> bool {
    self.scopes().any(|s| s == scope)
  }
}

/// A verified bearer token together with its decoded claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub token:  String,
  pub claims: Claims,
}

/// Per-request context threaded from the handler into the resolvers.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
  identity: Option<Arc<Identity>>,
}

impl RequestContext {
  pub fn anonymous() -> Self { Self::default() }

  pub fn signed_in(identity: Arc<Identity>) -> Self {
    Self {
      identity: Some(identity),
    }
  }

  pub fn identity(&self) -> Option<&Identity> { self.identity.as_deref() }

  pub fn subject(&self) -> Option<&str> {
    self.identity().map(|i| i.claims.sub.as_str())
  }

  /// `true` only when signed in with every one of `scopes`.
  pub fn has_scopes<I, T>(&self, scopes: I) -> bool
  where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
  {
    match self.identity() {
      Some(identity) => scopes
        .into_iter()
        .all(|s| identity.claims.has_scope(s.as_ref())),
      None => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ctx(scp: Option<&str>) -> RequestContext {
    RequestContext::signed_in(Arc::new(Identity {
      token:  "t".into(),
      claims: Claims {
        sub:  "subject".into(),
        scp:  scp.map(str::to_owned),
        name: None,
      },
    }))
  }

  #[test]
  fn scopes_split_on_whitespace() {
    let c = ctx(Some("Questions.Read  Questions.Write"));
    assert!(c.has_scopes(["Questions.Read", "Questions.Write"]));
    assert!(!c.has_scopes(["Questions.Admin"]));
  }

  #[test]
  fn anonymous_has_no_scopes() {
    let c = RequestContext::anonymous();
    assert!(!c.has_scopes(["Questions.Read"]));
    assert!(!c.has_scopes(Vec::<String>::new()));
    assert_eq!(c.subject(), None);
  }

  #[test]
  fn missing_scp_claim_is_empty() {
    let c = ctx(None);
    assert!(c.has_scopes(Vec::<String>::new()));
    assert!(!c.has_scopes(["a"]));
  }
}
