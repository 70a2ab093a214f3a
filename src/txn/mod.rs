// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Nested transactions with per-transaction isolation levels.
//!
//! This module provides:
//! - Arbitrarily deep transaction hierarchies (a child commits into its parent)
//! - Isolation chosen per transaction: serializable, read-committed, or
//!   read-uncommitted, freely mixed in one hierarchy
//! - A lock table that lets related transactions share locks
//!
//! # Key Concepts
//!
//! ## Hierarchy
//!
//! A transaction begun with a parent is nested inside it. Its writes and
//! locks pass to the parent when it commits, and only a root commit makes
//! them visible to unrelated transactions. Aborting a transaction aborts all
//! of its descendants first.
//!
//! ## Locking
//!
//! Writes always take an exclusive lock. Reads take a shared lock unless the
//! reader runs under read-uncommitted; read-committed drops it right after
//! the read. Requests never wait: a conflicting request fails with
//! [`TxnError::LockConflict`], or [`TxnError::WouldBlock`] when the holder is
//! already terminating.
//!
//! # Example
//!
//! ```
//! use arborkv::storage::{Key, Value};
//! use arborkv::txn::{IsolationLevel, TransactionManager, TxnManager};
//!
//! # fn example() -> Result<(), arborkv::txn::TxnError> {
//! let mgr = TxnManager::in_memory();
//!
//! let root = mgr.begin(None, None)?;
//! let child = mgr.begin(Some(root), Some(IsolationLevel::ReadCommitted))?;
//! mgr.write(child, Key::from("counter"), Value::from("1"))?;
//! mgr.commit(child)?;
//!
//! assert_eq!(mgr.read(root, &Key::from("counter"))?, Some(Value::from("1")));
//! let committed = mgr.commit(root)?;
//! println!("committed at {:?}", committed.seq());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod coordinator;
mod error;
mod hierarchical;
mod lock;
mod manager;
mod transaction;
pub mod visibility;

pub use coordinator::{Committed, Ended, Outcome};
pub use error::TxnError;
pub use hierarchical::HierarchicalLockTable;
pub use lock::{AcquireResult, Lock, LockMode, LockTable};
pub use manager::TxnManager;
pub use transaction::{IsolationLevel, TxnId, TxnInfo, TxnState};

use crate::storage::{Key, Value};

/// Transaction manager trait.
///
/// Provides methods to begin, read, write, commit, and abort transactions.
pub trait TransactionManager: Send + Sync {
    /// Begins a transaction, nested under `parent` if given.
    ///
    /// Without an explicit isolation level a child inherits its parent's and
    /// a root gets the configured default.
    fn begin(
        &self,
        parent: Option<TxnId>,
        isolation: Option<IsolationLevel>,
    ) -> Result<TxnId, TxnError>;

    /// Reads a key within the transaction.
    ///
    /// Returns None if no version is visible or the visible one is a delete.
    fn read(&self, txn: TxnId, key: &Key) -> Result<Option<Value>, TxnError>;

    /// Writes a key within the transaction.
    fn write(&self, txn: TxnId, key: Key, value: Value) -> Result<(), TxnError>;

    /// Deletes a key within the transaction.
    ///
    /// Implemented as a write of a tombstone.
    fn delete(&self, txn: TxnId, key: Key) -> Result<(), TxnError>;

    /// Commits the transaction.
    ///
    /// Fails with [`TxnError::ChildrenStillActive`] while any child is
    /// still running.
    fn commit(&self, txn: TxnId) -> Result<Committed, TxnError>;

    /// Aborts the transaction and all of its descendants.
    ///
    /// Returns the aborted transactions, descendants before ancestors.
    fn abort(&self, txn: TxnId) -> Result<Vec<TxnId>, TxnError>;

    /// Ends the transaction with the given outcome.
    fn end(&self, txn: TxnId, outcome: Outcome) -> Result<Ended, TxnError> {
        match outcome {
            Outcome::Commit => self.commit(txn).map(Ended::Committed),
            Outcome::Abort => self.abort(txn).map(Ended::Aborted),
        }
    }
}
