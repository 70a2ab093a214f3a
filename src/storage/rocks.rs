// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! RocksDB-backed commit log.
//!
//! Every committed version is stored as one row (see [`super::key`]), and a
//! commit's rows are written in a single atomic `WriteBatch`, so a record is
//! either fully present or absent after a crash.
//!
//! The highest sequence number appended so far, read-only commits included,
//! is kept in a separate `meta` column family and updated in the same batch.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch, WriteOptions, DEFAULT_COLUMN_FAMILY_NAME,
};

use crate::seq::CommitSeq;

use super::{
    decode_version_key, decode_version_value, encode_version_key, encode_version_value,
    extract_user_key, user_key_prefix, validate_key, validate_value, CommitLog, CommitRecord, Key,
    StorageError, Version,
};

const META_CF: &str = "meta";
const LAST_SEQ_KEY: &[u8] = b"last_seq";

/// Durability mode for appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Appends are written to the RocksDB WAL but not fsynced.
    /// Durable against process crashes but not power failures.
    #[default]
    WalOnly,
    /// Appends are fsynced before returning.
    FsyncEveryWrite,
}

/// RocksDB-backed commit log and committed-version storage.
pub struct RocksCommitLog {
    db: DBWithThreadMode<MultiThreaded>,
    write_opts: WriteOptions,
    /// Persisted high-water mark; held across appends so it never regresses.
    last_seq: Mutex<CommitSeq>,
}

impl RocksCommitLog {
    /// Opens or creates a log at the given path with `DurabilityMode::WalOnly`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::open_with_durability(path, DurabilityMode::default())
    }

    /// Opens or creates a log with the specified durability mode.
    pub fn open_with_durability(
        path: &Path,
        durability: DurabilityMode,
    ) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(64 * 1024 * 1024); // 64MB
        opts.set_max_write_buffer_number(4);
        opts.set_level_compaction_dynamic_level_bytes(true);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);

        // Rows of one user key share the length prefix.
        opts.set_prefix_extractor(rocksdb::SliceTransform::create_fixed_prefix(4));

        let families = [
            ColumnFamilyDescriptor::new(DEFAULT_COLUMN_FAMILY_NAME, opts.clone()),
            ColumnFamilyDescriptor::new(META_CF, Options::default()),
        ];
        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, families)?;

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(durability == DurabilityMode::FsyncEveryWrite);

        let mut log = Self {
            db,
            write_opts,
            last_seq: Mutex::new(CommitSeq::ZERO),
        };
        let last_seq = log.load_last_seq()?;
        *log.last_seq.get_mut() = last_seq;
        Ok(log)
    }

    fn meta_cf(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle(META_CF)
            .ok_or_else(|| StorageError::Corruption(format!("missing column family {META_CF}")))
    }

    fn load_last_seq(&self) -> Result<CommitSeq, StorageError> {
        let Some(bytes) = self.db.get_cf(&self.meta_cf()?, LAST_SEQ_KEY)? else {
            return Ok(CommitSeq::ZERO);
        };

        let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
            StorageError::Corruption(format!("last_seq entry has {} bytes", bytes.len()))
        })?;
        Ok(CommitSeq(u64::from_be_bytes(bytes)))
    }

    /// Flushes memtables to disk.
    pub fn sync(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    /// Returns the newest committed version of `key`, if any.
    pub fn latest(&self, key: &Key) -> Result<Option<Version>, StorageError> {
        validate_key(key)?;

        let prefix = user_key_prefix(key);
        for item in self.db.prefix_iterator(&prefix) {
            let (encoded_key, value) = item?;

            // The prefix extractor only covers the length; past our rows the
            // iterator moves on to other keys of the same length.
            if extract_user_key(&encoded_key)? != key.as_bytes() {
                break;
            }

            let (_, seq) = decode_version_key(&encoded_key)?;
            let (writer, value) = decode_version_value(&value)?;
            return Ok(Some(Version::committed(writer, value, seq)));
        }

        Ok(None)
    }
}

impl CommitLog for RocksCommitLog {
    fn append(&self, record: &CommitRecord) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();

        for (key, value) in &record.writes {
            validate_key(key)?;
            if let Some(value) = value {
                validate_value(value)?;
            }

            batch.put(
                encode_version_key(key, record.seq),
                encode_version_value(record.txn, value.as_ref()),
            );
        }

        let mut last_seq = self.last_seq.lock();
        let high_water = (*last_seq).max(record.seq);
        batch.put_cf(&self.meta_cf()?, LAST_SEQ_KEY, high_water.get().to_be_bytes());

        self.db.write_opt(batch, &self.write_opts)?;
        *last_seq = high_water;
        Ok(())
    }

    fn replay(&self) -> Result<Vec<CommitRecord>, StorageError> {
        let mut records: BTreeMap<CommitSeq, CommitRecord> = BTreeMap::new();

        for item in self.db.iterator(IteratorMode::Start) {
            let (encoded_key, value) = item?;
            let (key, seq) = decode_version_key(&encoded_key)?;
            let (writer, value) = decode_version_value(&value)?;

            let record = records.entry(seq).or_insert_with(|| CommitRecord {
                seq,
                txn: writer,
                writes: Vec::new(),
            });

            if record.txn != writer {
                return Err(StorageError::Corruption(format!(
                    "sequence {seq} written by both {} and {}",
                    record.txn, writer
                )));
            }
            record.writes.push((key, value));
        }

        Ok(records
            .into_values()
            .map(|mut record| {
                record.writes.sort_by(|a, b| a.0.cmp(&b.0));
                record
            })
            .collect())
    }

    fn last_seq(&self) -> Result<CommitSeq, StorageError> {
        Ok(*self.last_seq.lock())
    }
}
