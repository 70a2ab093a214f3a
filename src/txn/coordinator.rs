// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Commit and abort of nested transactions.
//!
//! A root commit stamps its pending versions with a fresh sequence number,
//! appends them to the commit log, and releases its locks. A nested commit
//! hands its pending versions and locks to the parent; nothing becomes
//! visible outside the hierarchy until the root commits.
//!
//! Abort is recursive: every non-terminal descendant is aborted first, then
//! the transaction's own versions are discarded and its locks released.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::seq::CommitSeq;
use crate::storage::{CommitLog, CommitRecord};

use super::error::TxnError;
use super::lock::LockTable;
use super::manager::TxnManager;
use super::transaction::{TxnId, TxnNode, TxnState};

/// Result of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Committed {
    /// A root transaction committed; its writes are visible at `seq`.
    Root { seq: CommitSeq },
    /// A nested transaction committed into its parent.
    IntoParent { parent: TxnId },
}

impl Committed {
    /// Returns the commit sequence number of a root commit.
    pub fn seq(&self) -> Option<CommitSeq> {
        match self {
            Committed::Root { seq } => Some(*seq),
            Committed::IntoParent { .. } => None,
        }
    }
}

/// Requested end of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Commit,
    Abort,
}

/// Result of [`super::TransactionManager::end`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ended {
    Committed(Committed),
    /// Aborted transactions, descendants before ancestors.
    Aborted(Vec<TxnId>),
}

impl<L: LockTable, C: CommitLog> TxnManager<L, C> {
    pub(super) fn coordinate_commit(&self, txn: TxnId) -> Result<Committed, TxnError> {
        let node = self.node(txn)?;

        let parent = {
            let mut n = node.lock();
            if n.state != TxnState::Active {
                return Err(TxnError::InvalidState {
                    txn,
                    state: n.state,
                });
            }
            if !n.children.is_empty() {
                return Err(TxnError::ChildrenStillActive {
                    txn,
                    children: n.children.clone(),
                });
            }
            n.state = TxnState::Committing;
            n.parent()
        };

        match parent {
            None => self.commit_root(txn, &node),
            Some(parent) => self.commit_nested(txn, parent, &node),
        }
    }

    fn commit_root(&self, txn: TxnId, node: &Arc<Mutex<TxnNode>>) -> Result<Committed, TxnError> {
        let seq = match self.sequence.next() {
            Ok(seq) => seq,
            Err(err) => {
                warn!(txn = %txn, error = %err, "no commit sequence number left, rolling back");
                self.roll_back_root(txn, node);
                return Err(err.into());
            }
        };
        let record = CommitRecord {
            seq,
            txn,
            writes: self.versions.pending_of(txn),
        };

        // Read-only commits are logged too, so their sequence numbers are
        // never reissued after a restart.
        if let Err(err) = self.log.append(&record) {
            warn!(txn = %txn, seq = %seq, error = %err, "commit log append failed, rolling back");
            self.roll_back_root(txn, node);
            return Err(err.into());
        }

        let finalized = self.release(txn, Some(seq));
        node.lock().state = TxnState::Committed;
        self.retire(txn);

        info!(txn = %txn, seq = %seq, writes = finalized, read_only = record.is_read_only(), "transaction committed");
        Ok(Committed::Root { seq })
    }

    /// Rolls back a committing root that could not be made durable.
    fn roll_back_root(&self, txn: TxnId, node: &Arc<Mutex<TxnNode>>) {
        self.release(txn, None);
        node.lock().state = TxnState::Aborted;
        self.retire(txn);
    }

    fn commit_nested(
        &self,
        txn: TxnId,
        parent_id: TxnId,
        node: &Arc<Mutex<TxnNode>>,
    ) -> Result<Committed, TxnError> {
        let parent_node = match self.node(parent_id) {
            Ok(parent_node) => parent_node,
            Err(_) => {
                let state = self.state(parent_id).unwrap_or(TxnState::Aborted);
                self.rollback_orphan(txn, node);
                return Err(TxnError::InvalidParentState {
                    parent: parent_id,
                    state,
                });
            }
        };

        let mut parent = parent_node.lock();
        if parent.state != TxnState::Active {
            let state = parent.state;
            drop(parent);
            self.rollback_orphan(txn, node);
            return Err(TxnError::InvalidParentState {
                parent: parent_id,
                state,
            });
        }

        // The parent stays locked so it cannot start terminating while it
        // takes over the child's versions and locks.
        let versions = self.versions.transfer(txn, parent_id);
        let locks = self.lock_table.inherit(parent_id, txn);
        parent.children.retain(|child| *child != txn);
        node.lock().state = TxnState::Committed;
        drop(parent);

        debug!(txn = %txn, parent = %parent_id, versions, locks, "committed into parent");
        Ok(Committed::IntoParent { parent: parent_id })
    }

    /// Rolls back a committing child whose parent is no longer active.
    ///
    /// Does nothing if the parent's abort already took the child down.
    fn rollback_orphan(&self, txn: TxnId, node: &Arc<Mutex<TxnNode>>) {
        {
            let mut n = node.lock();
            if n.state != TxnState::Committing {
                return;
            }
            n.state = TxnState::Aborting;
        }

        self.release(txn, None);
        self.mark_aborted(node);
        warn!(txn = %txn, "parent terminated during commit, rolled back");
    }

    /// Moves an `Aborting` transaction to `Aborted` and wakes ancestors
    /// waiting on it.
    fn mark_aborted(&self, node: &Arc<Mutex<TxnNode>>) {
        node.lock().state = TxnState::Aborted;
        let _gate = self.abort_gate.lock();
        self.aborted.notify_all();
    }

    /// Blocks until a transaction being aborted by another caller reaches
    /// `Aborted`.
    ///
    /// The other caller never waits on an ancestor, so waits only run down
    /// the tree and cannot cycle.
    fn wait_aborted(&self, node: &Arc<Mutex<TxnNode>>) {
        let mut gate = self.abort_gate.lock();
        while node.lock().state == TxnState::Aborting {
            self.aborted.wait(&mut gate);
        }
    }

    /// Finalizes the pending versions of `txn` at `seq` (or discards them
    /// when `seq` is `None`), then releases its locks. Returns the number of
    /// versions affected.
    fn release(&self, txn: TxnId, seq: Option<CommitSeq>) -> usize {
        // Waiters see WouldBlock rather than a conflict from here on.
        self.lock_table.mark_releasing(txn);

        let versions = match seq {
            Some(seq) => self.versions.finalize(txn, seq),
            None => self.versions.discard(txn),
        };
        self.lock_table.release_all(txn);
        versions
    }

    pub(super) fn coordinate_abort(&self, txn: TxnId) -> Result<Vec<TxnId>, TxnError> {
        let node = self.node(txn)?;

        let parent = {
            let mut n = node.lock();
            if n.state != TxnState::Active {
                return Err(TxnError::InvalidState {
                    txn,
                    state: n.state,
                });
            }
            n.state = TxnState::Aborting;
            n.parent()
        };

        let mut aborted = Vec::new();
        self.abort_subtree(txn, &node, &mut aborted);

        match parent {
            Some(parent) => {
                if let Ok(parent_node) = self.node(parent) {
                    parent_node.lock().children.retain(|child| *child != txn);
                }
            }
            None => self.retire(txn),
        }

        info!(txn = %txn, aborted = aborted.len(), "transaction aborted");
        Ok(aborted)
    }

    /// Aborts `txn` (already marked `Aborting`) and its descendants, pushing
    /// each id onto `aborted` once its rollback is complete.
    fn abort_subtree(&self, txn: TxnId, node: &Arc<Mutex<TxnNode>>, aborted: &mut Vec<TxnId>) {
        self.lock_table.mark_releasing(txn);

        let children = std::mem::take(&mut node.lock().children);
        for child in children {
            let Ok(child_node) = self.node(child) else {
                continue;
            };

            let claimed = {
                let mut c = child_node.lock();
                match c.state {
                    TxnState::Active | TxnState::Committing => {
                        c.state = TxnState::Aborting;
                        true
                    }
                    TxnState::Aborting => false,
                    TxnState::Committed | TxnState::Aborted => continue,
                }
            };

            if claimed {
                self.abort_subtree(child, &child_node, aborted);
            } else {
                // Already being aborted by its own caller (or rolled back by
                // a failed nested commit); this transaction must not finish
                // before it.
                self.wait_aborted(&child_node);
            }
        }

        let versions = self.versions.discard(txn);
        let locks = self.lock_table.release_all(txn);
        self.mark_aborted(node);

        debug!(txn = %txn, versions, locks, "rolled back");
        aborted.push(txn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::seq::{CounterSequence, SequenceError, SequenceSource};
    use crate::storage::{Key, MemoryCommitLog, StorageError, Value};
    use crate::txn::{HierarchicalLockTable, IsolationLevel, TransactionManager};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn create_test_manager() -> TxnManager {
        TxnManager::in_memory()
    }

    /// Commit log whose appends fail while `failing` is set.
    #[derive(Default)]
    struct FailingLog {
        failing: AtomicBool,
        inner: MemoryCommitLog,
    }

    impl CommitLog for FailingLog {
        fn append(&self, record: &CommitRecord) -> Result<(), StorageError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.append(record)
        }

        fn replay(&self) -> Result<Vec<CommitRecord>, StorageError> {
            self.inner.replay()
        }

        fn last_seq(&self) -> Result<CommitSeq, StorageError> {
            self.inner.last_seq()
        }
    }

    #[test]
    fn test_root_commit_makes_writes_visible() {
        let mgr = create_test_manager();
        let key = Key::from("k");

        let writer = mgr.begin(None, None).unwrap();
        mgr.write(writer, key.clone(), Value::from("v")).unwrap();
        let committed = mgr.commit(writer).unwrap();

        assert_eq!(committed, Committed::Root { seq: CommitSeq(1) });
        assert!(mgr.info(writer).unwrap().is_committed());
        assert!(mgr.held_locks(writer).is_empty());
        assert_eq!(mgr.log().len(), 1);

        let reader = mgr.begin(None, None).unwrap();
        assert_eq!(mgr.read(reader, &key).unwrap(), Some(Value::from("v")));
    }

    #[test]
    fn test_root_sequence_numbers_strictly_increase() {
        let mgr = create_test_manager();

        let mut last = CommitSeq::ZERO;
        for i in 0..5 {
            let txn = mgr.begin(None, None).unwrap();
            if i % 2 == 0 {
                mgr.write(txn, Key::from(format!("k{i}")), Value::from("v")).unwrap();
            }
            let seq = mgr.commit(txn).unwrap().seq().unwrap();
            assert!(seq > last);
            last = seq;
        }

        // Read-only commits are logged as well.
        assert_eq!(mgr.log().len(), 5);
        assert_eq!(mgr.log().last_seq().unwrap(), last);
    }

    #[test]
    fn test_nested_commit_into_parent() {
        let mgr = create_test_manager();
        let key = Key::from("k");

        let root = mgr.begin(None, None).unwrap();
        let child = mgr.begin(Some(root), None).unwrap();
        mgr.write(child, key.clone(), Value::from("child")).unwrap();

        assert_eq!(mgr.commit(child).unwrap(), Committed::IntoParent { parent: root });
        assert!(mgr.info(child).unwrap().is_committed());
        assert!(mgr.info(root).unwrap().active_children().is_empty());

        // The parent now owns both the version and the lock.
        assert_eq!(mgr.read(root, &key).unwrap(), Some(Value::from("child")));
        assert_eq!(mgr.written_keys(root), vec![key.clone()]);
        assert!(mgr.held_locks(child).is_empty());
        assert_eq!(mgr.held_locks(root).len(), 1);

        // Nothing is visible outside the hierarchy until the root commits.
        let outsider = mgr.begin(None, Some(IsolationLevel::ReadCommitted)).unwrap();
        assert!(matches!(
            mgr.read(outsider, &key),
            Err(TxnError::LockConflict { holder, .. }) if holder == root
        ));
        mgr.abort(outsider).unwrap();

        mgr.commit(root).unwrap();
        let reader = mgr.begin(None, None).unwrap();
        assert_eq!(mgr.read(reader, &key).unwrap(), Some(Value::from("child")));
    }

    #[test]
    fn test_child_write_replaces_parent_write() {
        let mgr = create_test_manager();
        let key = Key::from("k");

        let root = mgr.begin(None, None).unwrap();
        mgr.write(root, key.clone(), Value::from("parent")).unwrap();

        let child = mgr.begin(Some(root), None).unwrap();
        mgr.write(child, key.clone(), Value::from("child")).unwrap();
        mgr.commit(child).unwrap();

        assert_eq!(mgr.read(root, &key).unwrap(), Some(Value::from("child")));
        assert_eq!(mgr.versions().versions_of(&key).len(), 1);
    }

    #[test]
    fn test_aborted_child_leaves_parent_untouched() {
        let mgr = create_test_manager();
        let key = Key::from("k");

        let root = mgr.begin(None, None).unwrap();
        mgr.write(root, key.clone(), Value::from("parent")).unwrap();

        let child = mgr.begin(Some(root), None).unwrap();
        mgr.write(child, key.clone(), Value::from("child")).unwrap();
        assert_eq!(mgr.abort(child).unwrap(), vec![child]);

        assert_eq!(mgr.read(root, &key).unwrap(), Some(Value::from("parent")));
        assert!(mgr.info(root).unwrap().active_children().is_empty());
        mgr.commit(root).unwrap();
    }

    #[test]
    fn test_sibling_exclusive_conflict() {
        let mgr = create_test_manager();
        let key = Key::from("y");

        let root = mgr.begin(None, None).unwrap();
        let s1 = mgr.begin(Some(root), None).unwrap();
        let s2 = mgr.begin(Some(root), None).unwrap();

        mgr.write(s1, key.clone(), Value::from("s1")).unwrap();
        let err = mgr.write(s2, key.clone(), Value::from("s2")).unwrap_err();
        assert!(matches!(err, TxnError::LockConflict { holder, .. } if holder == s1));

        // Once s1 commits into the root, s2 may take the lock.
        mgr.commit(s1).unwrap();
        mgr.write(s2, key.clone(), Value::from("s2")).unwrap();
        mgr.commit(s2).unwrap();
        mgr.commit(root).unwrap();
    }

    #[test]
    fn test_commit_with_active_children() {
        let mgr = create_test_manager();
        let root = mgr.begin(None, None).unwrap();
        let child = mgr.begin(Some(root), None).unwrap();

        let err = mgr.commit(root).unwrap_err();
        assert!(matches!(
            err,
            TxnError::ChildrenStillActive { txn, ref children } if txn == root && children == &[child]
        ));
        assert!(mgr.info(root).unwrap().is_active());

        mgr.commit(child).unwrap();
        mgr.commit(root).unwrap();
    }

    #[test]
    fn test_commit_twice() {
        let mgr = create_test_manager();
        let txn = mgr.begin(None, None).unwrap();
        mgr.commit(txn).unwrap();

        assert!(matches!(
            mgr.commit(txn),
            Err(TxnError::InvalidState { state: TxnState::Committed, .. })
        ));
        assert!(matches!(
            mgr.abort(txn),
            Err(TxnError::InvalidState { state: TxnState::Committed, .. })
        ));
    }

    #[test]
    fn test_recursive_abort_orders_descendants_first() {
        let mgr = create_test_manager();

        let root = mgr.begin(None, None).unwrap();
        let a = mgr.begin(Some(root), None).unwrap();
        let a1 = mgr.begin(Some(a), None).unwrap();
        let b = mgr.begin(Some(root), None).unwrap();

        for (txn, key) in [(root, "r"), (a, "a"), (a1, "a1"), (b, "b")] {
            mgr.write(txn, Key::from(key), Value::from(key)).unwrap();
        }

        let aborted = mgr.abort(root).unwrap();
        assert_eq!(aborted, vec![a1, a, b, root]);

        for txn in [root, a, a1, b] {
            assert!(mgr.info(txn).unwrap().is_aborted(), "{txn}");
            assert!(mgr.held_locks(txn).is_empty());
        }
        for key in ["r", "a", "a1", "b"] {
            assert!(mgr.versions().versions_of(&Key::from(key)).is_empty());
        }
        assert!(mgr.active_transactions().is_empty());
    }

    #[test]
    fn test_abort_skips_committed_children() {
        let mgr = create_test_manager();
        let root = mgr.begin(None, None).unwrap();
        let done = mgr.begin(Some(root), None).unwrap();
        mgr.write(done, Key::from("k"), Value::from("v")).unwrap();
        mgr.commit(done).unwrap();
        let live = mgr.begin(Some(root), None).unwrap();

        assert_eq!(mgr.abort(root).unwrap(), vec![live, root]);
        assert!(mgr.info(done).unwrap().is_committed());
        assert!(mgr.versions().versions_of(&Key::from("k")).is_empty());
    }

    #[test]
    fn test_operations_on_aborted_descendant() {
        let mgr = create_test_manager();
        let root = mgr.begin(None, None).unwrap();
        let child = mgr.begin(Some(root), None).unwrap();
        mgr.abort(root).unwrap();

        assert!(matches!(
            mgr.write(child, Key::from("k"), Value::from("v")),
            Err(TxnError::InvalidState { state: TxnState::Aborted, .. })
        ));
        assert!(matches!(
            mgr.commit(child),
            Err(TxnError::InvalidState { state: TxnState::Aborted, .. })
        ));
        assert!(matches!(
            mgr.begin(Some(child), None),
            Err(TxnError::InvalidParentState { state: TxnState::Aborted, .. })
        ));
    }

    #[test]
    fn test_failed_log_append_rolls_back_root() {
        let log = Arc::new(FailingLog::default());
        let mgr = TxnManager::with_config(StoreConfig::default(), Arc::clone(&log));
        let key = Key::from("k");

        let txn = mgr.begin(None, None).unwrap();
        mgr.write(txn, key.clone(), Value::from("lost")).unwrap();

        log.failing.store(true, Ordering::SeqCst);
        let err = mgr.commit(txn).unwrap_err();
        assert!(matches!(err, TxnError::Storage(StorageError::Io(_))));
        assert!(!err.is_retryable());

        assert!(mgr.info(txn).unwrap().is_aborted());
        assert!(mgr.held_locks(txn).is_empty());
        assert!(mgr.versions().versions_of(&key).is_empty());
        assert!(log.inner.is_empty());

        log.failing.store(false, Ordering::SeqCst);
        let next = mgr.begin(None, None).unwrap();
        mgr.write(next, key.clone(), Value::from("kept")).unwrap();
        mgr.commit(next).unwrap();
        assert_eq!(log.inner.len(), 1);
    }

    #[test]
    fn test_exhausted_sequence_rolls_back_root() {
        let sequence: Arc<dyn SequenceSource> =
            Arc::new(CounterSequence::starting_after(CommitSeq(u64::MAX)));
        let mgr = TxnManager::new(
            sequence,
            Arc::new(HierarchicalLockTable::new()),
            Arc::new(MemoryCommitLog::new()),
        );
        let key = Key::from("k");

        let txn = mgr.begin(None, None).unwrap();
        mgr.write(txn, key.clone(), Value::from("v")).unwrap();

        let err = mgr.commit(txn).unwrap_err();
        assert!(matches!(err, TxnError::Sequence(SequenceError::Exhausted { .. })));
        assert!(mgr.info(txn).unwrap().is_aborted());
        assert!(mgr.held_locks(txn).is_empty());
        assert!(mgr.versions().versions_of(&key).is_empty());
        assert!(mgr.log().is_empty());
    }

    #[test]
    fn test_end_dispatches_outcome() {
        let mgr = create_test_manager();

        let a = mgr.begin(None, None).unwrap();
        assert!(matches!(
            mgr.end(a, Outcome::Commit).unwrap(),
            Ended::Committed(Committed::Root { .. })
        ));

        let b = mgr.begin(None, None).unwrap();
        assert_eq!(mgr.end(b, Outcome::Abort).unwrap(), Ended::Aborted(vec![b]));
    }

    #[test]
    fn test_finished_history_is_bounded() {
        let config = StoreConfig::new().with_finished_history(2);
        let mgr = TxnManager::with_config(config, Arc::new(MemoryCommitLog::new()));

        let first = mgr.begin(None, None).unwrap();
        mgr.commit(first).unwrap();
        for _ in 0..2 {
            let txn = mgr.begin(None, None).unwrap();
            mgr.commit(txn).unwrap();
        }

        assert!(matches!(mgr.info(first), Err(TxnError::UnknownTransaction(_))));
    }

    #[test]
    fn test_pruned_subtree_keeps_final_states() {
        let mgr = create_test_manager();
        let root = mgr.begin(None, None).unwrap();
        let child = mgr.begin(Some(root), None).unwrap();
        mgr.commit(child).unwrap();
        mgr.commit(root).unwrap();

        assert!(mgr.txns.read().is_empty());
        assert!(mgr.trees.lock().is_empty());
        assert_eq!(mgr.state(child).unwrap(), TxnState::Committed);
        assert_eq!(mgr.info(child).unwrap().root(), root);
    }

    #[test]
    fn test_releasing_holder_reports_would_block() {
        let mgr = create_test_manager();
        let key = Key::from("k");

        let holder = mgr.begin(None, None).unwrap();
        mgr.write(holder, key.clone(), Value::from("v")).unwrap();
        mgr.lock_table().mark_releasing(holder);

        let other = mgr.begin(None, None).unwrap();
        let err = mgr.write(other, key.clone(), Value::from("w")).unwrap_err();
        assert!(matches!(err, TxnError::WouldBlock { holder: h, .. } if h == holder));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_custom_sequence_source() {
        let sequence: Arc<dyn SequenceSource> = Arc::new(CounterSequence::starting_after(CommitSeq(41)));
        let mgr = TxnManager::new(
            sequence,
            Arc::new(HierarchicalLockTable::new()),
            Arc::new(MemoryCommitLog::new()),
        );

        let txn = mgr.begin(None, None).unwrap();
        assert_eq!(mgr.commit(txn).unwrap().seq(), Some(CommitSeq(42)));
    }

    #[test]
    fn test_concurrent_siblings_single_winner() {
        use std::thread;

        let mgr = Arc::new(create_test_manager());
        let root = mgr.begin(None, None).unwrap();
        let key = Key::from("contended");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let mgr = Arc::clone(&mgr);
                let key = key.clone();
                thread::spawn(move || {
                    let child = mgr.begin(Some(root), None).unwrap();
                    match mgr.write(child, key, Value::from(format!("v{i}"))) {
                        Ok(()) => true,
                        Err(err) => {
                            assert!(err.is_retryable());
                            mgr.abort(child).unwrap();
                            false
                        }
                    }
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);

        assert_eq!(mgr.info(root).unwrap().active_children().len(), 1);
        let aborted = mgr.abort(root).unwrap();
        assert_eq!(aborted.len(), 2);
        assert!(mgr.lock_table().holders(&key).is_empty());
    }

    #[test]
    fn test_concurrent_abort_and_nested_commit() {
        use std::thread;

        for _ in 0..32 {
            let mgr = Arc::new(create_test_manager());
            let root = mgr.begin(None, None).unwrap();
            let child = mgr.begin(Some(root), None).unwrap();
            mgr.write(child, Key::from("k"), Value::from("v")).unwrap();

            let committer = {
                let mgr = Arc::clone(&mgr);
                thread::spawn(move || mgr.commit(child))
            };
            mgr.abort(root).unwrap();
            let _ = committer.join().expect("thread panicked");

            // However the race went, the hierarchy ends fully rolled back.
            assert!(mgr.info(root).unwrap().is_aborted());
            assert!(mgr.state(child).unwrap().is_terminal());
            assert!(mgr.versions().versions_of(&Key::from("k")).is_empty());
            assert!(mgr.lock_table().holders(&Key::from("k")).is_empty());
        }
    }

    #[test]
    fn test_concurrent_child_and_root_abort() {
        use std::thread;

        for _ in 0..100 {
            let mgr = Arc::new(create_test_manager());
            let root = mgr.begin(None, None).unwrap();
            let child = mgr.begin(Some(root), None).unwrap();
            let grandchild = mgr.begin(Some(child), None).unwrap();
            for i in 0..50 {
                mgr.write(child, Key::from(format!("c{i}")), Value::from("v")).unwrap();
                mgr.write(grandchild, Key::from(format!("g{i}")), Value::from("v")).unwrap();
            }

            let child_abort = {
                let mgr = Arc::clone(&mgr);
                thread::spawn(move || mgr.abort(child))
            };
            let aborted = mgr.abort(root).unwrap();
            let child_result = child_abort.join().expect("thread panicked");

            // The root finishes last whichever call claimed the child.
            assert_eq!(aborted.last(), Some(&root));
            match child_result {
                Ok(ids) => assert_eq!(ids, vec![grandchild, child]),
                Err(err) => assert!(matches!(
                    err,
                    TxnError::InvalidState { .. } | TxnError::UnknownTransaction(_)
                )),
            }
            for txn in [root, child, grandchild] {
                assert_eq!(mgr.state(txn).unwrap(), TxnState::Aborted, "{txn}");
            }
            assert!(mgr.versions().key_count() == 0);
            assert!(mgr.txns.read().is_empty());
        }
    }
}
