// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Configuration for a transaction manager.

use crate::seq::SequenceKind;
use crate::txn::IsolationLevel;

/// Default number of shards in the lock table and the version store.
pub const DEFAULT_SHARDS: usize = 256;

/// Default number of finished transactions whose final state stays queryable.
pub const DEFAULT_FINISHED_HISTORY: usize = 1024;

/// Configuration for [`TxnManager`](crate::txn::TxnManager) initialization.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Isolation level of root transactions begun without an explicit level.
    pub default_isolation: IsolationLevel,
    /// Number of lock table shards.
    pub lock_shards: usize,
    /// Number of version store shards.
    pub version_shards: usize,
    /// How many terminated transactions keep their final state queryable.
    pub finished_history: usize,
    /// Commit sequence source.
    pub sequence: SequenceKind,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_isolation: IsolationLevel::default(),
            lock_shards: DEFAULT_SHARDS,
            version_shards: DEFAULT_SHARDS,
            finished_history: DEFAULT_FINISHED_HISTORY,
            sequence: SequenceKind::default(),
        }
    }
}

impl StoreConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the isolation level used by roots begun without an explicit level.
    pub fn with_default_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.default_isolation = isolation;
        self
    }

    /// Sets the lock table shard count (minimum 1).
    pub fn with_lock_shards(mut self, shards: usize) -> Self {
        self.lock_shards = shards.max(1);
        self
    }

    /// Sets the version store shard count (minimum 1).
    pub fn with_version_shards(mut self, shards: usize) -> Self {
        self.version_shards = shards.max(1);
        self
    }

    /// Sets how many terminated transactions stay queryable (minimum 1).
    pub fn with_finished_history(mut self, entries: usize) -> Self {
        self.finished_history = entries.max(1);
        self
    }

    /// Selects the commit sequence source.
    pub fn with_sequence(mut self, kind: SequenceKind) -> Self {
        self.sequence = kind;
        self
    }
}
