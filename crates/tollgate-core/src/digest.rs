//! Approver list digest.
//!
//! The digest answers "has the approver list changed since the last
//! aggregation". It covers every field of every entry and is independent of
//! entry order and member order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ApproverEntry;

const DIGEST_DOMAIN: &str = "tollgate 2026 approver-list digest v1";

/// A BLAKE3 digest of an approver list (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApproverDigest([u8; 32]);

impl ApproverDigest {
    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Encode as hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ApproverDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApproverDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ApproverDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ApproverDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ApproverDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute the digest of an approver list.
#[must_use]
pub fn digest(approvers: &[ApproverEntry]) -> ApproverDigest {
    let mut encoded: Vec<Vec<u8>> = approvers.iter().map(encode_entry).collect();
    encoded.sort();

    let mut hasher = blake3::Hasher::new_derive_key(DIGEST_DOMAIN);
    hasher.update(&(encoded.len() as u64).to_le_bytes());
    for entry in &encoded {
        hasher.update(entry);
    }
    ApproverDigest(*hasher.finalize().as_bytes())
}

fn encode_entry(entry: &ApproverEntry) -> Vec<u8> {
    let mut buf = Vec::new();
    put_str(&mut buf, entry.kind.as_str());
    put_str(&mut buf, &entry.name);
    put_str(&mut buf, entry.input.as_str());
    match &entry.message {
        Some(message) => {
            buf.push(1);
            put_str(&mut buf, message);
        },
        None => buf.push(0),
    }

    let mut members: Vec<(&str, &str)> = entry
        .members
        .iter()
        .map(|m| (m.name.as_str(), m.input.as_str()))
        .collect();
    members.sort_unstable();
    buf.extend_from_slice(&(members.len() as u64).to_le_bytes());
    for (name, input) in members {
        put_str(&mut buf, name);
        put_str(&mut buf, input);
    }

    // Prefix the whole entry with its length so adjacent entries can't alias.
    let mut framed = Vec::with_capacity(buf.len().saturating_add(8));
    framed.extend_from_slice(&(buf.len() as u64).to_le_bytes());
    framed.extend_from_slice(&buf);
    framed
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}
