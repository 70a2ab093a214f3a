// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction error types.

use crate::seq::SequenceError;
use crate::storage::{Key, StorageError};

use super::{TxnId, TxnState};

/// Errors that can occur in transaction operations.
///
/// All variants are local and recoverable: the caller decides whether to
/// retry, abort or surface the error.
#[derive(Debug, thiserror::Error)]
pub enum TxnError {
    #[error("parent transaction {parent} is {state}, expected active")]
    InvalidParentState { parent: TxnId, state: TxnState },

    #[error("lock conflict at key {key:?}: held by {holder}")]
    LockConflict { key: Key, holder: TxnId },

    #[error("lock at key {key:?} is being released by {holder}")]
    WouldBlock { key: Key, holder: TxnId },

    #[error("transaction {txn} is {state}, expected active")]
    InvalidState { txn: TxnId, state: TxnState },

    #[error("transaction {txn} still has active children {children:?}")]
    ChildrenStillActive { txn: TxnId, children: Vec<TxnId> },

    #[error("unknown transaction {0}")]
    UnknownTransaction(TxnId),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("sequence error: {0}")]
    Sequence(#[from] SequenceError),
}

impl TxnError {
    /// Returns true if retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TxnError::LockConflict { .. } | TxnError::WouldBlock { .. }
        )
    }
}
