// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Multi-version storage and the commit log.
//!
//! The [`VersionStore`] holds, per key, the chain of committed and pending
//! versions that the visibility resolver scans. Committed versions carry the
//! sequence number of the root commit that produced them; pending versions
//! carry only their owner.
//!
//! A [`CommitLog`] receives one [`CommitRecord`] per root commit before the
//! commit's versions are finalized. [`RocksCommitLog`] persists records in
//! RocksDB; [`MemoryCommitLog`] keeps them in memory.
//!
//! # Example
//!
//! ```
//! use arborkv::seq::CommitSeq;
//! use arborkv::storage::{Key, Value, VersionStore};
//! use arborkv::txn::TxnId;
//!
//! let store = VersionStore::new(16);
//! store.put(TxnId(1), Key::from("k"), Some(Value::from("v")));
//! assert!(store.versions_of(&Key::from("k"))[0].is_pending());
//!
//! store.finalize(TxnId(1), CommitSeq(1));
//! assert_eq!(store.versions_of(&Key::from("k"))[0].seq, Some(CommitSeq(1)));
//! ```

mod commit_log;
mod error;
mod key;
mod mvcc;
mod rocks;
mod version_store;

pub use commit_log::{CommitLog, CommitRecord, MemoryCommitLog};
pub use error::StorageError;
pub use key::{
    decode_version_key, decode_version_value, encode_version_key, encode_version_value,
    extract_user_key, user_key_prefix,
};
pub use mvcc::{
    validate_key, validate_value, GcStats, Key, Value, Version, MAX_KEY_SIZE, MAX_VALUE_SIZE,
};
pub use rocks::{DurabilityMode, RocksCommitLog};
pub use version_store::VersionStore;
