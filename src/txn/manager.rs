// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Nested transaction manager.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::seq::{create_sequence, create_sequence_after, CommitSeq, SequenceSource};
use crate::storage::{
    validate_key, validate_value, CommitLog, GcStats, Key, MemoryCommitLog, Value, Version,
    VersionStore,
};

use super::error::TxnError;
use super::hierarchical::HierarchicalLockTable;
use super::lock::{AcquireResult, Lock, LockMode, LockTable};
use super::transaction::{IsolationLevel, TxnId, TxnInfo, TxnNode, TxnState};
use super::visibility::{self, Reader};
use super::{Committed, TransactionManager};

/// Transaction manager for nested transactions.
///
/// Transactions live in an arena keyed by [`TxnId`]; each node is guarded by
/// its own mutex so state transitions of unrelated transactions never contend.
/// When a root transaction terminates, its whole subtree is pruned from the
/// arena and the final states are kept in a bounded history.
///
/// Lock order: transaction node, then arena/tree maps or component shards.
/// A parent's node may be held while locking a child's node, never the reverse.
pub struct TxnManager<L: LockTable = HierarchicalLockTable, C: CommitLog = MemoryCommitLog> {
    pub(super) sequence: Arc<dyn SequenceSource>,
    pub(super) lock_table: Arc<L>,
    pub(super) versions: Arc<VersionStore>,
    pub(super) log: Arc<C>,
    pub(super) txns: RwLock<HashMap<TxnId, Arc<Mutex<TxnNode>>>>,
    /// Root → every descendant ever begun under it.
    pub(super) trees: Mutex<HashMap<TxnId, Vec<TxnId>>>,
    pub(super) finished: Mutex<LruCache<TxnId, TxnInfo>>,
    /// Signalled whenever a transaction reaches `Aborted`; paired with
    /// `abort_gate`.
    pub(super) aborted: Condvar,
    pub(super) abort_gate: Mutex<()>,
    next_txn_id: AtomicU64,
    default_isolation: IsolationLevel,
}

impl TxnManager<HierarchicalLockTable, MemoryCommitLog> {
    /// Creates a manager with default configuration and an in-memory commit log.
    pub fn in_memory() -> Self {
        Self::with_config(StoreConfig::default(), Arc::new(MemoryCommitLog::new()))
    }
}

impl<C: CommitLog> TxnManager<HierarchicalLockTable, C> {
    /// Creates a manager over an empty version store.
    pub fn with_config(config: StoreConfig, log: Arc<C>) -> Self {
        Self::from_parts(
            &config,
            create_sequence(config.sequence),
            Arc::new(HierarchicalLockTable::with_shards(config.lock_shards)),
            Arc::new(VersionStore::new(config.version_shards)),
            log,
        )
    }

    /// Creates a manager whose version store is loaded from the records
    /// already in `log`.
    ///
    /// Only the newest committed version of each key is kept. New sequence
    /// numbers continue after the log's high-water mark, which covers
    /// read-only commits too; transaction ids continue after the replayed
    /// writers.
    pub fn open(config: StoreConfig, log: Arc<C>) -> Result<Self, TxnError> {
        let records = log.replay()?;
        let versions = VersionStore::new(config.version_shards);

        let mut last_seq = log.last_seq()?;
        let mut last_txn = 0;
        for record in &records {
            last_seq = last_seq.max(record.seq);
            last_txn = last_txn.max(record.txn.0);
            for (key, value) in &record.writes {
                versions.install_committed(
                    key.clone(),
                    Version::committed(record.txn, value.clone(), record.seq),
                );
            }
        }
        versions.gc();

        info!(records = records.len(), keys = versions.key_count(), last_seq = %last_seq, "loaded commit log");

        let manager = Self::from_parts(
            &config,
            create_sequence_after(config.sequence, last_seq),
            Arc::new(HierarchicalLockTable::with_shards(config.lock_shards)),
            Arc::new(versions),
            log,
        );
        manager.next_txn_id.store(last_txn + 1, Ordering::Relaxed);
        Ok(manager)
    }
}

impl<L: LockTable, C: CommitLog> TxnManager<L, C> {
    /// Creates a manager from its collaborators, with default configuration
    /// and an empty version store.
    pub fn new(sequence: Arc<dyn SequenceSource>, lock_table: Arc<L>, log: Arc<C>) -> Self {
        let config = StoreConfig::default();
        let versions = Arc::new(VersionStore::new(config.version_shards));
        Self::from_parts(&config, sequence, lock_table, versions, log)
    }

    fn from_parts(
        config: &StoreConfig,
        sequence: Arc<dyn SequenceSource>,
        lock_table: Arc<L>,
        versions: Arc<VersionStore>,
        log: Arc<C>,
    ) -> Self {
        let history = NonZeroUsize::new(config.finished_history).unwrap_or(NonZeroUsize::MIN);

        Self {
            sequence,
            lock_table,
            versions,
            log,
            txns: RwLock::new(HashMap::new()),
            trees: Mutex::new(HashMap::new()),
            finished: Mutex::new(LruCache::new(history)),
            aborted: Condvar::new(),
            abort_gate: Mutex::new(()),
            next_txn_id: AtomicU64::new(1),
            default_isolation: config.default_isolation,
        }
    }

    /// Returns the sequence source.
    pub fn sequence(&self) -> &Arc<dyn SequenceSource> {
        &self.sequence
    }

    /// Returns the lock table.
    pub fn lock_table(&self) -> &Arc<L> {
        &self.lock_table
    }

    /// Returns the version store.
    pub fn versions(&self) -> &Arc<VersionStore> {
        &self.versions
    }

    /// Returns the commit log.
    pub fn log(&self) -> &Arc<C> {
        &self.log
    }

    /// Looks up a live arena node.
    ///
    /// A transaction already pruned from the arena reports its final state
    /// through `InvalidState`.
    pub(super) fn node(&self, txn: TxnId) -> Result<Arc<Mutex<TxnNode>>, TxnError> {
        let node = self.txns.read().get(&txn).cloned();
        if let Some(node) = node {
            return Ok(node);
        }

        match self.finished.lock().peek(&txn) {
            Some(info) => Err(TxnError::InvalidState {
                txn,
                state: info.state(),
            }),
            None => Err(TxnError::UnknownTransaction(txn)),
        }
    }

    /// Prunes a terminated root and its subtree from the arena.
    ///
    /// Final states are recorded before the nodes leave the arena, so a
    /// concurrent lookup always finds one or the other.
    pub(super) fn retire(&self, root: TxnId) {
        let mut ids = self.trees.lock().remove(&root).unwrap_or_default();
        ids.push(root);

        let nodes: Vec<_> = {
            let txns = self.txns.read();
            ids.iter().filter_map(|id| txns.get(id).cloned()).collect()
        };
        let infos: Vec<_> = nodes.iter().map(|node| node.lock().info()).collect();

        {
            let mut finished = self.finished.lock();
            for info in infos {
                debug_assert!(info.state().is_terminal(), "retired {} while {}", info.id(), info.state());
                finished.put(info.id(), info);
            }
        }

        let mut txns = self.txns.write();
        for id in &ids {
            txns.remove(id);
        }
    }

    /// Returns a snapshot of a transaction.
    pub fn info(&self, txn: TxnId) -> Result<TxnInfo, TxnError> {
        // The arena guard must be gone before the node is locked: `begin`
        // takes them in the opposite order.
        let node = self.txns.read().get(&txn).cloned();
        if let Some(node) = node {
            return Ok(node.lock().info());
        }

        self.finished
            .lock()
            .peek(&txn)
            .cloned()
            .ok_or(TxnError::UnknownTransaction(txn))
    }

    /// Returns the current state of a transaction.
    pub fn state(&self, txn: TxnId) -> Result<TxnState, TxnError> {
        Ok(self.info(txn)?.state())
    }

    /// Returns the isolation level fixed when the transaction began.
    pub fn effective_isolation(&self, txn: TxnId) -> Result<IsolationLevel, TxnError> {
        Ok(self.info(txn)?.isolation())
    }

    /// Returns the locks a transaction holds directly, sorted by key.
    pub fn held_locks(&self, txn: TxnId) -> Vec<Lock> {
        self.lock_table.held_by(txn)
    }

    /// Returns the keys on which a transaction owns a pending version, sorted.
    pub fn written_keys(&self, txn: TxnId) -> Vec<Key> {
        self.versions.written_keys(txn)
    }

    /// Returns the ids of every active transaction, sorted.
    pub fn active_transactions(&self) -> Vec<TxnId> {
        let nodes: Vec<_> = self.txns.read().values().cloned().collect();
        let mut active: Vec<_> = nodes
            .iter()
            .filter_map(|node| {
                let node = node.lock();
                (node.state == TxnState::Active).then(|| node.id())
            })
            .collect();
        active.sort();
        active
    }

    /// Drops committed versions no reader can reach.
    pub fn gc(&self) -> GcStats {
        let stats = self.versions.gc();
        info!(
            scanned = stats.versions_scanned,
            deleted = stats.versions_deleted,
            bytes = stats.bytes_reclaimed,
            "version gc finished"
        );
        stats
    }

    #[inline]
    fn allocate_id(&self) -> TxnId {
        TxnId(self.next_txn_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Writes a pending version (or tombstone) under an exclusive lock.
    fn put(&self, txn: TxnId, key: Key, value: Option<Value>) -> Result<(), TxnError> {
        validate_key(&key)?;
        if let Some(value) = &value {
            validate_value(value)?;
        }

        let node = self.node(txn)?;
        let node = node.lock();
        if node.state != TxnState::Active {
            return Err(TxnError::InvalidState {
                txn,
                state: node.state,
            });
        }

        // Writes lock exclusively whatever the writer's isolation level.
        match self
            .lock_table
            .acquire(txn, node.ancestors(), &key, LockMode::Exclusive)
        {
            AcquireResult::Granted { .. } => {}
            AcquireResult::WouldBlock { holder } => {
                return Err(TxnError::WouldBlock { key, holder })
            }
            AcquireResult::Conflict { holder } => {
                return Err(TxnError::LockConflict { key, holder })
            }
        }

        self.versions.put(txn, key, value);
        Ok(())
    }
}

impl<L: LockTable, C: CommitLog> TransactionManager for TxnManager<L, C> {
    fn begin(
        &self,
        parent: Option<TxnId>,
        isolation: Option<IsolationLevel>,
    ) -> Result<TxnId, TxnError> {
        let Some(parent_id) = parent else {
            let id = self.allocate_id();
            let isolation = isolation.unwrap_or(self.default_isolation);
            self.txns
                .write()
                .insert(id, Arc::new(Mutex::new(TxnNode::root(id, isolation))));

            debug!(txn = %id, %isolation, "began root transaction");
            return Ok(id);
        };

        let parent_node = self.node(parent_id).map_err(|err| match err {
            TxnError::InvalidState { state, .. } => TxnError::InvalidParentState {
                parent: parent_id,
                state,
            },
            other => other,
        })?;

        let mut parent = parent_node.lock();
        if parent.state != TxnState::Active {
            return Err(TxnError::InvalidParentState {
                parent: parent_id,
                state: parent.state,
            });
        }

        let id = self.allocate_id();
        let isolation = isolation.unwrap_or(parent.isolation);
        let child = TxnNode::child(id, &parent, isolation);
        let root = child.root_id();

        // Register before releasing the parent so a concurrent abort of the
        // parent always finds the child in the arena.
        parent.children.push(id);
        self.txns.write().insert(id, Arc::new(Mutex::new(child)));
        self.trees.lock().entry(root).or_default().push(id);
        drop(parent);

        debug!(txn = %id, parent = %parent_id, %isolation, "began nested transaction");
        Ok(id)
    }

    fn read(&self, txn: TxnId, key: &Key) -> Result<Option<Value>, TxnError> {
        validate_key(key)?;

        let node = self.node(txn)?;
        let node = node.lock();
        if node.state != TxnState::Active {
            return Err(TxnError::InvalidState {
                txn,
                state: node.state,
            });
        }

        let reader = Reader {
            txn,
            ancestors: node.ancestors(),
            isolation: node.isolation,
        };

        // Read-uncommitted never touches the lock table.
        let mut short_lock = false;
        if reader.isolation.locks_reads() {
            match self
                .lock_table
                .acquire(txn, reader.ancestors, key, LockMode::Shared)
            {
                AcquireResult::Granted { newly_granted } => {
                    short_lock = newly_granted && !reader.isolation.holds_read_locks();
                }
                AcquireResult::WouldBlock { holder } => {
                    return Err(TxnError::WouldBlock {
                        key: key.clone(),
                        holder,
                    })
                }
                AcquireResult::Conflict { holder } => {
                    return Err(TxnError::LockConflict {
                        key: key.clone(),
                        holder,
                    })
                }
            }
        }

        // The horizon is taken under the shard lock, so every committed
        // version in the chain is already covered by it.
        let visible = self.versions.with_versions(key, |versions| {
            visibility::resolve(&reader, self.sequence.current(), versions)
        });

        if short_lock {
            self.lock_table.release(txn, key);
            debug!(txn = %txn, key = ?key, "released read-committed lock");
        }

        Ok(visible.into_value())
    }

    fn write(&self, txn: TxnId, key: Key, value: Value) -> Result<(), TxnError> {
        self.put(txn, key, Some(value))
    }

    fn delete(&self, txn: TxnId, key: Key) -> Result<(), TxnError> {
        self.put(txn, key, None)
    }

    fn commit(&self, txn: TxnId) -> Result<Committed, TxnError> {
        self.coordinate_commit(txn)
    }

    fn abort(&self, txn: TxnId) -> Result<Vec<TxnId>, TxnError> {
        self.coordinate_abort(txn)
    }
}
