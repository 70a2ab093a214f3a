// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory multi-version store.
//!
//! Each key maps to a version chain ordered newest-first:
//!
//! ```text
//! [pending (child)] [pending (parent)] [committed #9] [committed #4] ...
//! ```
//!
//! Pending versions always precede committed ones, and committed versions are
//! ordered by commit sequence number, descending. A writer owns at most one
//! pending version per key.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use parking_lot::{Mutex, RwLock};

use crate::seq::CommitSeq;
use crate::txn::TxnId;

use super::{GcStats, Key, Value, Version};

/// A shard of the version store.
#[derive(Default)]
struct VersionShard {
    chains: HashMap<Key, Vec<Version>>,
}

/// Sharded multi-version store.
///
/// Keys are spread over shards, each protected by a `RwLock`. A per-writer
/// index records which keys hold a pending version of each transaction, so
/// finalize/discard/transfer never scan the whole store.
///
/// Lock order: shard, then writer index.
pub struct VersionStore {
    shards: Box<[RwLock<VersionShard>]>,
    pending: Mutex<HashMap<TxnId, HashSet<Key>>>,
}

impl VersionStore {
    /// Creates a store with `shards` shards (at least one).
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1))
                .map(|_| RwLock::new(VersionShard::default()))
                .collect(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    fn shard_index(&self, key: &Key) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() as usize % self.shards.len()
    }

    #[inline]
    fn shard(&self, key: &Key) -> &RwLock<VersionShard> {
        &self.shards[self.shard_index(key)]
    }

    /// Takes the writer's index entry, sorted for deterministic processing.
    fn take_pending_keys(&self, txn: TxnId) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .pending
            .lock()
            .remove(&txn)
            .map(|keys| keys.into_iter().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Writes a pending version of `key` owned by `txn`.
    ///
    /// Overwrites `txn`'s own pending version in place if there is one,
    /// otherwise prepends a new pending version. The caller must hold an
    /// exclusive lock on `key`.
    pub fn put(&self, txn: TxnId, key: Key, value: Option<Value>) {
        let mut shard = self.shard(&key).write();
        let chain = shard.chains.entry(key.clone()).or_default();

        if let Some(existing) = chain
            .iter_mut()
            .find(|v| v.writer == txn && v.is_pending())
        {
            existing.value = value;
            return;
        }

        chain.insert(0, Version::pending(txn, value));
        self.pending.lock().entry(txn).or_default().insert(key);
    }

    /// Installs an already-committed version, e.g. one loaded from a commit log.
    pub fn install_committed(&self, key: Key, version: Version) {
        debug_assert!(!version.is_pending(), "install_committed needs a sequence number");
        let mut shard = self.shard(&key).write();
        let chain = shard.chains.entry(key).or_default();
        insert_committed(chain, version);
    }

    /// Converts every pending version of `txn` into a committed version
    /// stamped with `seq`. Returns the number of versions finalized.
    pub fn finalize(&self, txn: TxnId, seq: CommitSeq) -> usize {
        let mut finalized = 0;

        for key in self.take_pending_keys(txn) {
            let mut shard = self.shard(&key).write();
            let Some(chain) = shard.chains.get_mut(&key) else {
                debug_assert!(false, "writer index names a key without a chain");
                continue;
            };

            if let Some(pos) = chain.iter().position(|v| v.writer == txn && v.is_pending()) {
                let mut version = chain.remove(pos);
                version.seq = Some(seq);
                insert_committed(chain, version);
                finalized += 1;
            }
        }

        finalized
    }

    /// Removes every pending version of `txn`. Returns the number removed.
    pub fn discard(&self, txn: TxnId) -> usize {
        let mut discarded = 0;

        for key in self.take_pending_keys(txn) {
            let mut shard = self.shard(&key).write();
            let Some(chain) = shard.chains.get_mut(&key) else {
                continue;
            };

            let before = chain.len();
            chain.retain(|v| !(v.writer == txn && v.is_pending()));
            discarded += before - chain.len();

            if chain.is_empty() {
                shard.chains.remove(&key);
            }
        }

        discarded
    }

    /// Re-tags every pending version of `child` as pending under `parent`.
    ///
    /// Where the parent already had a pending version of the same key, the
    /// child's (newer) version replaces it. Returns the number of versions
    /// transferred.
    pub fn transfer(&self, child: TxnId, parent: TxnId) -> usize {
        let keys = self.take_pending_keys(child);
        let mut transferred = Vec::with_capacity(keys.len());

        for key in keys {
            let mut shard = self.shard(&key).write();
            let Some(chain) = shard.chains.get_mut(&key) else {
                continue;
            };

            let Some(pos) = chain.iter().position(|v| v.writer == child && v.is_pending()) else {
                continue;
            };

            let mut version = chain.remove(pos);
            version.writer = parent;
            chain.retain(|v| !(v.writer == parent && v.is_pending()));
            chain.insert(0, version);
            transferred.push(key);
        }

        let count = transferred.len();
        if count > 0 {
            self.pending
                .lock()
                .entry(parent)
                .or_default()
                .extend(transferred);
        }
        count
    }

    /// Returns every version of `key`, newest first.
    pub fn versions_of(&self, key: &Key) -> Vec<Version> {
        self.with_versions(key, |versions| versions.to_vec())
    }

    /// Runs `f` over the version chain of `key` while holding the shard's read lock.
    pub fn with_versions<R>(&self, key: &Key, f: impl FnOnce(&[Version]) -> R) -> R {
        let shard = self.shard(key).read();
        let versions = shard.chains.get(key).map(Vec::as_slice).unwrap_or(&[]);
        f(versions)
    }

    /// Returns the pending writes of `txn`, sorted by key.
    pub fn pending_of(&self, txn: TxnId) -> Vec<(Key, Option<Value>)> {
        let mut writes = Vec::new();

        for key in self.written_keys(txn) {
            let shard = self.shard(&key).read();
            let value = shard.chains.get(&key).and_then(|chain| {
                chain
                    .iter()
                    .find(|v| v.writer == txn && v.is_pending())
                    .map(|v| v.value.clone())
            });
            if let Some(value) = value {
                writes.push((key, value));
            }
        }

        writes
    }

    /// Returns the keys on which `txn` owns a pending version, sorted.
    pub fn written_keys(&self, txn: TxnId) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .pending
            .lock()
            .get(&txn)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Returns the number of keys with at least one version.
    pub fn key_count(&self) -> usize {
        self.shards.iter().map(|s| s.read().chains.len()).sum()
    }

    /// Drops committed versions that no reader can reach any more.
    ///
    /// Every read resolves committed versions against the current sequence
    /// number, so only the newest committed version of a key is reachable.
    /// Keys left with nothing but a committed tombstone are removed entirely.
    /// Pending versions are never touched.
    pub fn gc(&self) -> GcStats {
        let mut stats = GcStats::default();

        for shard in self.shards.iter() {
            let mut shard = shard.write();

            shard.chains.retain(|_, chain| {
                stats.versions_scanned += chain.len() as u64;

                let mut seen_committed = false;
                chain.retain(|v| {
                    if v.is_pending() {
                        return true;
                    }
                    if !seen_committed {
                        seen_committed = true;
                        return true;
                    }
                    stats.versions_deleted += 1;
                    stats.bytes_reclaimed += v.payload_len() as u64;
                    false
                });

                let only_tombstone = chain.len() == 1 && !chain[0].is_pending() && chain[0].is_tombstone();
                if only_tombstone {
                    stats.versions_deleted += 1;
                    return false;
                }
                !chain.is_empty()
            });
        }

        stats
    }
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SHARDS)
    }
}

/// Inserts a committed version after all pending versions, keeping committed
/// versions ordered by sequence number descending.
fn insert_committed(chain: &mut Vec<Version>, version: Version) {
    let pos = chain
        .iter()
        .position(|v| matches!((v.seq, version.seq), (Some(existing), Some(new)) if existing < new))
        .unwrap_or(chain.len());
    chain.insert(pos, version);
}
