//! Error type for `prophet-store-sqlite`.

use prophet_core::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain rule rejected the write (e.g. a duplicate subject identifier).
  #[error("{0}")]
  Core(#[from] prophet_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl DomainError for Error {
  fn as_domain(&self) -> Option<&prophet_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
