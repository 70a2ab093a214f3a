// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Commit log interface.
//!
//! Every root commit appends one [`CommitRecord`] before its versions become
//! visible, read-only commits included. The log is the durability boundary of
//! the store: once `append` returns `Ok`, the commit must survive a process
//! crash, and its sequence number must never be handed out again.

use parking_lot::Mutex;

use crate::seq::CommitSeq;
use crate::txn::TxnId;

use super::{Key, StorageError, Value};

/// Everything a root commit made durable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Sequence number stamped on every version of the commit.
    pub seq: CommitSeq,
    /// Root transaction that committed.
    pub txn: TxnId,
    /// Final writes, `None` for deletions. Sorted by key.
    pub writes: Vec<(Key, Option<Value>)>,
}

impl CommitRecord {
    /// Returns true if the commit carried no writes.
    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Durable sink for commit records.
pub trait CommitLog: Send + Sync {
    /// Durably appends a commit record.
    fn append(&self, record: &CommitRecord) -> Result<(), StorageError>;

    /// Returns every record with writes appended so far, ordered by
    /// sequence number. Read-only records may be omitted.
    fn replay(&self) -> Result<Vec<CommitRecord>, StorageError>;

    /// Returns the highest sequence number ever appended, read-only records
    /// included, or [`CommitSeq::ZERO`].
    fn last_seq(&self) -> Result<CommitSeq, StorageError>;
}

/// Commit log kept in memory.
///
/// Offers no durability; used when the store runs without a persistent backend.
#[derive(Default)]
pub struct MemoryCommitLog {
    records: Mutex<Vec<CommitRecord>>,
}

impl MemoryCommitLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records appended.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if nothing was appended.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl CommitLog for MemoryCommitLog {
    fn append(&self, record: &CommitRecord) -> Result<(), StorageError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn replay(&self) -> Result<Vec<CommitRecord>, StorageError> {
        let mut records = self.records.lock().clone();
        records.sort_by_key(|r| r.seq);
        Ok(records)
    }

    fn last_seq(&self) -> Result<CommitSeq, StorageError> {
        Ok(self
            .records
            .lock()
            .iter()
            .map(|r| r.seq)
            .max()
            .unwrap_or(CommitSeq::ZERO))
    }
}
