// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! ArborKV: an embedded transactional key-value core with nested transactions
//! and per-transaction isolation levels.
//!
//! This crate provides a multi-version store, a hierarchy-aware lock table,
//! and a transaction manager on top of them. Committed writes can be made
//! durable through a RocksDB-backed commit log.

pub mod config;
pub mod seq;
pub mod storage;
pub mod txn;

pub use config::StoreConfig;
pub use seq::{
    create_sequence, CommitSeq, CounterSequence, HlcSequence, SequenceError, SequenceKind,
    SequenceSource,
};
pub use storage::{
    CommitLog, CommitRecord, DurabilityMode, GcStats, Key, MemoryCommitLog, RocksCommitLog,
    StorageError, Value, Version, VersionStore,
};
pub use txn::{
    Committed, Ended, HierarchicalLockTable, IsolationLevel, Lock, LockMode, LockTable, Outcome,
    TransactionManager, TxnError, TxnId, TxnInfo, TxnManager, TxnState,
};
