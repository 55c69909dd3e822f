//! # Error handling
//!
//! The recoverable error kinds the core distinguishes. Degenerate states that reflect a
//! programmer bug rather than a data or I/O problem (double `done()`, a cursor walking past a
//! null parent, a link of the wrong length) are not represented here -- they panic at the
//! point of detection, as the system is not expected to recover from them.

use std::fmt;
use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable error kinds.
#[derive(thiserror::Error, Debug)]
pub enum Error {
  /// A key lookup missed.
  #[error("key not found")]
  NotFound,

  /// The backing block store failed a read or write.
  #[error("store I/O error: {0}")]
  StoreIo(#[from] io::Error),

  /// A persisted node failed to decode, or decoded into a structurally invalid shape.
  #[error("invalid encoding: {0}")]
  InvalidEncoding(String),

  /// An operation was cooperatively cancelled.
  #[error("operation cancelled")]
  Cancelled,
}

impl Error {
  /// Builds an [`Error::InvalidEncoding`] from a displayable cause.
  pub fn invalid_encoding(cause: impl fmt::Display) -> Self {
    Error::InvalidEncoding(cause.to_string())
  }
}
