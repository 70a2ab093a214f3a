// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Keys, values and versions.

use crate::seq::CommitSeq;
use crate::txn::TxnId;

use super::error::StorageError;

/// Maximum key size in bytes.
pub const MAX_KEY_SIZE: usize = 8 * 1024; // 8KB

/// Maximum value size in bytes.
pub const MAX_VALUE_SIZE: usize = 64 * 1024 * 1024; // 64MB

/// A key in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub Vec<u8>);

impl Key {
    /// Creates a new key from bytes.
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the key bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the key.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A value payload. Deletions are represented by the absence of a value,
/// so an empty `Value` is a legitimate payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value(pub Vec<u8>);

impl Value {
    /// Creates a new value from bytes.
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the value bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length of the value.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the value is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl AsRef<[u8]> for Value {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// One version of a key.
///
/// A version is *pending* while its writer (or the ancestor that absorbed it)
/// has not committed at root level, and *committed* once it carries a
/// sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Transaction that owns this version.
    pub writer: TxnId,
    /// Payload, `None` for a tombstone.
    pub value: Option<Value>,
    /// Commit sequence number, `None` while pending.
    pub seq: Option<CommitSeq>,
}

impl Version {
    /// Creates a pending version.
    pub fn pending(writer: TxnId, value: Option<Value>) -> Self {
        Self {
            writer,
            value,
            seq: None,
        }
    }

    /// Creates a committed version.
    pub fn committed(writer: TxnId, value: Option<Value>, seq: CommitSeq) -> Self {
        Self {
            writer,
            value,
            seq: Some(seq),
        }
    }

    /// Returns true if this version has not been committed at root level.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.seq.is_none()
    }

    /// Returns true if this version is a deletion marker.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Approximate memory footprint of the payload.
    #[inline]
    pub(crate) fn payload_len(&self) -> usize {
        self.value.as_ref().map_or(0, Value::len)
    }
}

/// Statistics from garbage collection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcStats {
    pub versions_scanned: u64,
    pub versions_deleted: u64,
    pub bytes_reclaimed: u64,
}

/// Validates key size.
pub fn validate_key(key: &Key) -> Result<(), StorageError> {
    if key.len() > MAX_KEY_SIZE {
        return Err(StorageError::KeyTooLarge {
            size: key.len(),
            max: MAX_KEY_SIZE,
        });
    }
    Ok(())
}

/// Validates value size.
pub fn validate_value(value: &Value) -> Result<(), StorageError> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(StorageError::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}
