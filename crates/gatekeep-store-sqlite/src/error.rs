//! Error type for `gatekeep-store-sqlite`.

use gatekeep_core::store::{ErrorKind, StoreError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] gatekeep_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown {column} value in storage: {value:?}")]
  Decode { column: &'static str, value: String },

  #[error("visitor not found: {0}")]
  VisitorNotFound(Uuid),

  #[error("visitor {0} is inactive")]
  VisitorInactive(Uuid),

  /// An exit tried to close a credential another attempt already closed.
  #[error("credential {0} is no longer active")]
  CredentialNotActive(Uuid),

  #[error("role not found: {0}")]
  RoleNotFound(Uuid),

  #[error("role {0} is still assigned to users")]
  RoleInUse(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("identification of visitor {0} is referenced by access records")]
  IdentificationLocked(Uuid),

  /// A unique column already holds this value.
  #[error("{0} already exists")]
  Conflict(String),

  #[error("no free credential code after {0} attempts")]
  CodeSpaceExhausted(usize),
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self { Self::Database(e.into()) }
}

impl Error {
  /// Whether the error names a row that does not exist.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::VisitorNotFound(_)
        | Self::RoleNotFound(_)
        | Self::UserNotFound(_)
    )
  }

  /// Whether the error is a rejected state change rather than a fault.
  pub fn is_conflict(&self) -> bool {
    matches!(
      self,
      Self::Conflict(_)
        | Self::RoleInUse(_)
        | Self::IdentificationLocked(_)
        | Self::VisitorInactive(_)
        | Self::CredentialNotActive(_)
    )
  }
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    if self.is_not_found() {
      ErrorKind::NotFound
    } else if self.is_conflict() {
      ErrorKind::Conflict
    } else {
      ErrorKind::Internal
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
