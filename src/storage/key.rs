// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! On-disk encoding of committed versions.
//!
//! Row key: `[key_len:u32 BE][key bytes][MAX-seq:u64 BE]`
//! Row value: `[tag:u8][writer:u64 BE][payload]`, tag `1` = value, `0` = tombstone
//!
//! The sequence number is inverted (MAX - value) so that newer versions sort
//! first within the same user key under RocksDB's default byte-order comparator.

use crate::seq::CommitSeq;
use crate::txn::TxnId;

use super::{Key, StorageError, Value};

const TAG_TOMBSTONE: u8 = 0;
const TAG_VALUE: u8 = 1;

/// Encodes a user key and commit sequence into a row key.
#[inline]
pub fn encode_version_key(key: &Key, seq: CommitSeq) -> Vec<u8> {
    let key_bytes = key.as_bytes();
    let mut encoded = Vec::with_capacity(4 + key_bytes.len() + 8);

    encoded.extend_from_slice(&(key_bytes.len() as u32).to_be_bytes());
    encoded.extend_from_slice(key_bytes);
    encoded.extend_from_slice(&(u64::MAX - seq.get()).to_be_bytes());

    encoded
}

/// Decodes a row key back into user key and commit sequence.
pub fn decode_version_key(encoded: &[u8]) -> Result<(Key, CommitSeq), StorageError> {
    let user_key = extract_user_key(encoded)?;

    let seq_offset = 4 + user_key.len();
    if encoded.len() != seq_offset + 8 {
        return Err(StorageError::InvalidKeyEncoding(format!(
            "expected {} bytes, got {}",
            seq_offset + 8,
            encoded.len()
        )));
    }

    let mut inverted = [0u8; 8];
    inverted.copy_from_slice(&encoded[seq_offset..]);
    let seq = u64::MAX - u64::from_be_bytes(inverted);

    Ok((Key::new(user_key.to_vec()), CommitSeq(seq)))
}

/// Returns the prefix shared by every row of a user key.
#[inline]
pub fn user_key_prefix(key: &Key) -> Vec<u8> {
    let key_bytes = key.as_bytes();
    let mut prefix = Vec::with_capacity(4 + key_bytes.len());
    prefix.extend_from_slice(&(key_bytes.len() as u32).to_be_bytes());
    prefix.extend_from_slice(key_bytes);
    prefix
}

/// Extracts the user key from a row key without full decoding.
#[inline]
pub fn extract_user_key(encoded: &[u8]) -> Result<&[u8], StorageError> {
    if encoded.len() < 4 {
        return Err(StorageError::InvalidKeyEncoding(
            "key too short for length prefix".to_string(),
        ));
    }

    let key_len = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;

    if encoded.len() < 4 + key_len {
        return Err(StorageError::InvalidKeyEncoding(
            "key too short for user key".to_string(),
        ));
    }

    Ok(&encoded[4..4 + key_len])
}

/// Encodes the row value of a committed version.
pub fn encode_version_value(writer: TxnId, value: Option<&Value>) -> Vec<u8> {
    let payload_len = value.map_or(0, Value::len);
    let mut encoded = Vec::with_capacity(9 + payload_len);

    match value {
        Some(value) => {
            encoded.push(TAG_VALUE);
            encoded.extend_from_slice(&writer.0.to_be_bytes());
            encoded.extend_from_slice(value.as_bytes());
        }
        None => {
            encoded.push(TAG_TOMBSTONE);
            encoded.extend_from_slice(&writer.0.to_be_bytes());
        }
    }

    encoded
}

/// Decodes a row value into writer and payload.
pub fn decode_version_value(encoded: &[u8]) -> Result<(TxnId, Option<Value>), StorageError> {
    if encoded.len() < 9 {
        return Err(StorageError::Corruption(format!(
            "version row too short: {} bytes",
            encoded.len()
        )));
    }

    let mut writer = [0u8; 8];
    writer.copy_from_slice(&encoded[1..9]);
    let writer = TxnId(u64::from_be_bytes(writer));

    match encoded[0] {
        TAG_VALUE => Ok((writer, Some(Value::new(encoded[9..].to_vec())))),
        TAG_TOMBSTONE if encoded.len() == 9 => Ok((writer, None)),
        TAG_TOMBSTONE => Err(StorageError::Corruption(
            "tombstone row carries a payload".to_string(),
        )),
        tag => Err(StorageError::Corruption(format!("unknown row tag {tag}"))),
    }
}
