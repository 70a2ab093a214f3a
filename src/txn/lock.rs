// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Lock table trait and types.

use crate::storage::Key;

use super::TxnId;

/// Lock modes for read/write access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock for reads (multiple readers allowed).
    Shared,
    /// Exclusive lock for writes (single writer, no readers).
    Exclusive,
}

impl LockMode {
    /// Mode compatibility matrix between unrelated holders.
    #[inline]
    pub fn compatible_with(&self, other: LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }

    /// Returns the stronger of two modes.
    #[inline]
    pub fn max(self, other: LockMode) -> LockMode {
        if self == LockMode::Exclusive || other == LockMode::Exclusive {
            LockMode::Exclusive
        } else {
            LockMode::Shared
        }
    }
}

/// A lock held by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    /// Transaction holding this lock.
    pub txn_id: TxnId,
    /// Lock mode (shared or exclusive).
    pub mode: LockMode,
    /// Key being locked.
    pub key: Key,
}

/// Outcome of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// The lock is held by the requester. `newly_granted` is false when the
    /// requester already held a grant on the key (possibly upgraded now).
    Granted { newly_granted: bool },
    /// An incompatible grant is held by a transaction that is already
    /// terminating; retrying shortly will likely succeed.
    WouldBlock { holder: TxnId },
    /// An incompatible grant is held by a live transaction.
    Conflict { holder: TxnId },
}

impl AcquireResult {
    /// Returns true if the lock was granted.
    #[inline]
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireResult::Granted { .. })
    }
}

/// Lock table interface for managing key locks.
///
/// Requests never wait: an incompatible request returns immediately and the
/// retry policy belongs to the caller.
pub trait LockTable: Send + Sync {
    /// Attempts to acquire a lock on a key.
    ///
    /// # Arguments
    /// - `txn_id`: Transaction requesting the lock
    /// - `ancestors`: The requester's ancestors, parent first. Grants held by
    ///   an ancestor or a descendant never conflict with the request.
    /// - `key`: Key to lock
    /// - `mode`: Lock mode (shared or exclusive)
    fn acquire(
        &self,
        txn_id: TxnId,
        ancestors: &[TxnId],
        key: &Key,
        mode: LockMode,
    ) -> AcquireResult;

    /// Releases one lock held by a transaction. Returns false if none was held.
    fn release(&self, txn_id: TxnId, key: &Key) -> bool;

    /// Releases all locks held by a transaction. Returns the number released.
    fn release_all(&self, txn_id: TxnId) -> usize;

    /// Moves every lock held by `child` to `parent`, keeping the stronger mode
    /// where both hold the same key. Returns the number of locks moved.
    fn inherit(&self, parent: TxnId, child: TxnId) -> usize;

    /// Marks a terminating transaction's locks as about to be released.
    fn mark_releasing(&self, txn_id: TxnId);

    /// Returns every grant on a key.
    fn holders(&self, key: &Key) -> Vec<Lock>;

    /// Returns every grant held by a transaction, sorted by key.
    fn held_by(&self, txn_id: TxnId) -> Vec<Lock>;
}
