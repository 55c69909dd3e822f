//! # Content addresses
//!
//! An [`Address`] is the identity of a persisted [`crate::node::Node`] or
//! [`crate::config::ChunkConfig`]: the SHA-256 digest of its canonical encoding, truncated to
//! 16 bytes. Two pieces of content that encode to the same bytes always share an address, and
//! nothing else does, short of a SHA-256 collision.

use sha2::{Digest, Sha256};
use std::fmt;

/// Length in bytes of an [`Address`].
pub const ADDRESS_LEN: usize = 16;

/// Multicodec tag for DAG-CBOR, as used in the CID prefix.
const CODEC_DAG_CBOR: u64 = 0x71;
/// Multihash code for SHA-256, as used in the CID prefix.
const MULTIHASH_SHA2_256: u64 = 0x12;
/// CID version byte.
const CID_VERSION_1: u64 = 0x01;

/// Content address: a truncated SHA-256 digest over a node's (or chunk config's) canonical
/// encoding.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
  /// Hashes `bytes` and returns the address that identifies them.
  pub fn of(bytes: &[u8]) -> Self {
    let digest = Sha256::digest(bytes);
    let mut truncated = [0u8; ADDRESS_LEN];
    truncated.copy_from_slice(&digest[..ADDRESS_LEN]);
    Address(truncated)
  }

  /// Wraps a raw 16-byte digest without hashing, e.g. when decoding a persisted link.
  pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
    Address(bytes)
  }

  /// The raw truncated digest.
  pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
    &self.0
  }

  /// Encodes this address as a self-describing CIDv1 byte sequence: version, DAG-CBOR codec
  /// tag, SHA-256 multihash code, digest length, digest -- each of the first four fields fits
  /// in a single unsigned-varint byte since they are all under 128.
  pub fn cid_bytes(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + ADDRESS_LEN);
    write_varint(CID_VERSION_1, &mut out);
    write_varint(CODEC_DAG_CBOR, &mut out);
    write_varint(MULTIHASH_SHA2_256, &mut out);
    write_varint(ADDRESS_LEN as u64, &mut out);
    out.extend_from_slice(&self.0);
    out
  }
}

/// Writes `value` as a multiformats unsigned varint (LEB128) -- the format CIDs and multihashes
/// use on the wire.
fn write_varint(mut value: u64, out: &mut Vec<u8>) {
  loop {
    let byte = (value & 0x7f) as u8;
    value >>= 7;
    if value == 0 {
      out.push(byte);
      break;
    }
    out.push(byte | 0x80);
  }
}

impl fmt::Debug for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Address({})", hex::encode(self.0))
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", hex::encode(self.0))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_bytes_hash_to_same_address() {
    assert_eq!(Address::of(b"hello"), Address::of(b"hello"));
  }

  #[test]
  fn different_bytes_hash_to_different_addresses() {
    assert_ne!(Address::of(b"hello"), Address::of(b"world"));
  }

  #[test]
  fn cid_bytes_carries_expected_prefix() {
    let addr = Address::of(b"payload");
    let bytes = addr.cid_bytes();
    assert_eq!(&bytes[..3], &[CID_VERSION_1 as u8, CODEC_DAG_CBOR as u8, MULTIHASH_SHA2_256 as u8]);
    assert_eq!(bytes[3], ADDRESS_LEN as u8);
    assert_eq!(&bytes[4..], addr.as_bytes());
  }

  #[test]
  fn round_trips_through_from_bytes() {
    let addr = Address::of(b"payload");
    let roundtrip = Address::from_bytes(*addr.as_bytes());
    assert_eq!(addr, roundtrip);
  }
}
