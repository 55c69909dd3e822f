//! # Canonical encoding
//!
//! Every persisted record (nodes, chunk configs) goes through the same canonical CBOR codec,
//! so that identical values always serialize to identical bytes and therefore hash to
//! identical [`crate::address::Address`]es.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes `value` to its canonical byte representation.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
  let mut buf = Vec::new();
  ciborium::into_writer(value, &mut buf).map_err(|e| Error::invalid_encoding(e))?;
  Ok(buf)
}

/// Decodes `bytes` into a `T`, failing with [`Error::InvalidEncoding`] on malformed input.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
  ciborium::from_reader(bytes).map_err(|e| Error::invalid_encoding(e))
}
