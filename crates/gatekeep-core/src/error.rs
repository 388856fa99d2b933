//! Error types for `gatekeep-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown permission: {0:?}")]
  UnknownPermission(String),

  #[error("unknown access direction: {0:?}")]
  UnknownDirection(String),

  #[error("invalid time of day: {0:?} (expected HH:MM or HH:MM:SS)")]
  InvalidTimeOfDay(String),

  #[error("invalid UTC offset: {0} minutes")]
  InvalidOffset(i32),

  #[error("{0} must not be empty")]
  MissingField(&'static str),

  #[error("invalid report range: {0}")]
  InvalidReportRange(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
