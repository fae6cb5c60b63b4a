//! Error types for `prophet-core`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// A request field failed validation. Only the first offending field is
  /// ever reported.
  #[error("invalid value for `{field}`: {reason}")]
  InvalidField { field: String, reason: String },
}

impl Error {
  pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidField {
      field:  field.into(),
      reason: reason.into(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Implemented by storage backend errors so that a domain failure raised
/// inside a storage transaction reaches the HTTP layer with its field intact.
pub trait DomainError {
  fn as_domain(&self) -> Option<&Error>;
}

impl DomainError for std::convert::Infallible {
  fn as_domain(&self) -> Option<&Error> { match *self {} }
}
