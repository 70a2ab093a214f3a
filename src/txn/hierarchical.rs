// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Lock table aware of the transaction hierarchy.
//!
//! Two grants on the same key are compatible if:
//! - both are shared, or
//! - one holder is an ancestor of the other (a sub-transaction may take a
//!   lock its enclosing transaction already holds, and vice versa)
//!
//! Every grant remembers its holder's ancestors, so compatibility can be
//! decided from the table alone. When a child commits, its grants move to
//! the parent instead of being released.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::storage::Key;

use super::lock::{AcquireResult, Lock, LockMode, LockTable};
use super::TxnId;

/// A grant in the lock table.
struct Grant {
    holder: TxnId,
    /// Holder's ancestors, parent first.
    ancestors: Vec<TxnId>,
    mode: LockMode,
}

impl Grant {
    /// Returns true if the grant's holder and the requester are the same
    /// transaction or one is an ancestor of the other.
    #[inline]
    fn related_to(&self, txn_id: TxnId, ancestors: &[TxnId]) -> bool {
        self.holder == txn_id || ancestors.contains(&self.holder) || self.ancestors.contains(&txn_id)
    }
}

/// A shard of the lock table.
#[derive(Default)]
struct LockShard {
    locks: HashMap<Key, Vec<Grant>>,
}

/// Keys locked by one transaction.
#[derive(Default)]
struct Holding {
    keys: HashSet<Key>,
    releasing: bool,
}

/// Hierarchy-aware lock table.
///
/// Uses sharding to reduce contention. Each shard is protected by a RwLock.
/// A per-transaction index of held keys makes `release_all` and `inherit`
/// proportional to the locks held.
///
/// Lock order: shard, then holdings index.
pub struct HierarchicalLockTable {
    shards: Box<[RwLock<LockShard>]>,
    holdings: Mutex<HashMap<TxnId, Holding>>,
}

impl HierarchicalLockTable {
    /// Creates a lock table with the default shard count.
    pub fn new() -> Self {
        Self::with_shards(crate::config::DEFAULT_SHARDS)
    }

    /// Creates a lock table with `shards` shards (at least one).
    pub fn with_shards(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1))
                .map(|_| RwLock::new(LockShard::default()))
                .collect(),
            holdings: Mutex::new(HashMap::new()),
        }
    }

    /// Computes the shard index for a key.
    #[inline]
    fn shard_index(&self, key: &Key) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() as usize % self.shards.len()
    }

    #[inline]
    fn shard(&self, key: &Key) -> &RwLock<LockShard> {
        &self.shards[self.shard_index(key)]
    }

    /// Removes and returns a transaction's held keys.
    fn take_keys(&self, txn_id: TxnId) -> Vec<Key> {
        self.holdings
            .lock()
            .remove(&txn_id)
            .map(|h| h.keys.into_iter().collect())
            .unwrap_or_default()
    }
}

impl Default for HierarchicalLockTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LockTable for HierarchicalLockTable {
    fn acquire(
        &self,
        txn_id: TxnId,
        ancestors: &[TxnId],
        key: &Key,
        mode: LockMode,
    ) -> AcquireResult {
        let mut shard = self.shard(key).write();
        let grants = shard.locks.entry(key.clone()).or_default();

        let blocker = grants
            .iter()
            .find(|g| !g.related_to(txn_id, ancestors) && !mode.compatible_with(g.mode))
            .map(|g| g.holder);

        if let Some(holder) = blocker {
            let releasing = self
                .holdings
                .lock()
                .get(&holder)
                .is_some_and(|h| h.releasing);

            debug!(txn = %txn_id, holder = %holder, key = ?key, ?mode, releasing, "lock request refused");

            return if releasing {
                AcquireResult::WouldBlock { holder }
            } else {
                AcquireResult::Conflict { holder }
            };
        }

        if let Some(grant) = grants.iter_mut().find(|g| g.holder == txn_id) {
            grant.mode = grant.mode.max(mode);
            return AcquireResult::Granted {
                newly_granted: false,
            };
        }

        grants.push(Grant {
            holder: txn_id,
            ancestors: ancestors.to_vec(),
            mode,
        });
        self.holdings
            .lock()
            .entry(txn_id)
            .or_default()
            .keys
            .insert(key.clone());

        AcquireResult::Granted {
            newly_granted: true,
        }
    }

    fn release(&self, txn_id: TxnId, key: &Key) -> bool {
        let mut shard = self.shard(key).write();
        let Some(grants) = shard.locks.get_mut(key) else {
            return false;
        };

        let before = grants.len();
        grants.retain(|g| g.holder != txn_id);
        let released = grants.len() != before;

        if grants.is_empty() {
            shard.locks.remove(key);
        }

        if released {
            if let Some(holding) = self.holdings.lock().get_mut(&txn_id) {
                holding.keys.remove(key);
            }
        }
        released
    }

    fn release_all(&self, txn_id: TxnId) -> usize {
        let mut released = 0;

        for key in self.take_keys(txn_id) {
            let mut shard = self.shard(&key).write();
            if let Some(grants) = shard.locks.get_mut(&key) {
                let before = grants.len();
                grants.retain(|g| g.holder != txn_id);
                released += before - grants.len();

                if grants.is_empty() {
                    shard.locks.remove(&key);
                }
            }
        }

        released
    }

    fn inherit(&self, parent: TxnId, child: TxnId) -> usize {
        let keys = self.take_keys(child);
        let mut moved = Vec::with_capacity(keys.len());

        for key in keys {
            let mut shard = self.shard(&key).write();
            let Some(grants) = shard.locks.get_mut(&key) else {
                continue;
            };
            let Some(pos) = grants.iter().position(|g| g.holder == child) else {
                continue;
            };

            let grant = grants.swap_remove(pos);
            match grants.iter_mut().find(|g| g.holder == parent) {
                Some(existing) => existing.mode = existing.mode.max(grant.mode),
                None => grants.push(Grant {
                    holder: parent,
                    ancestors: grant.ancestors.get(1..).unwrap_or_default().to_vec(),
                    mode: grant.mode,
                }),
            }
            moved.push(key);
        }

        let count = moved.len();
        if count > 0 {
            self.holdings
                .lock()
                .entry(parent)
                .or_default()
                .keys
                .extend(moved);
        }
        count
    }

    fn mark_releasing(&self, txn_id: TxnId) {
        self.holdings.lock().entry(txn_id).or_default().releasing = true;
    }

    fn holders(&self, key: &Key) -> Vec<Lock> {
        let shard = self.shard(key).read();
        shard
            .locks
            .get(key)
            .map(|grants| {
                grants
                    .iter()
                    .map(|g| Lock {
                        txn_id: g.holder,
                        mode: g.mode,
                        key: key.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn held_by(&self, txn_id: TxnId) -> Vec<Lock> {
        let mut keys: Vec<Key> = self
            .holdings
            .lock()
            .get(&txn_id)
            .map(|h| h.keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();

        keys.into_iter()
            .filter_map(|key| {
                let mode = {
                    let shard = self.shard(&key).read();
                    shard
                        .locks
                        .get(&key)?
                        .iter()
                        .find(|g| g.holder == txn_id)?
                        .mode
                };
                Some(Lock { txn_id, mode, key })
            })
            .collect()
    }
}
