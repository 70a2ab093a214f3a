// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Visibility of versions to a reading transaction.
//!
//! The chain of a key is scanned newest-first and the first visible version
//! wins. A version is visible to a reader if:
//!
//! - the reader or one of its ancestors owns it (own writes, and writes of
//!   enclosing transactions or of children that committed into them), or
//! - it is committed with a sequence number at or below the read horizon, or
//! - it is pending and the reader runs under `ReadUncommitted`.
//!
//! Tombstones are visible like any other version; they terminate the scan
//! with [`Visible::Deleted`].

use crate::seq::CommitSeq;
use crate::storage::{Value, Version};

use super::{IsolationLevel, TxnId};

/// The reading side of a visibility decision.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    pub txn: TxnId,
    /// Ancestors, parent first.
    pub ancestors: &'a [TxnId],
    pub isolation: IsolationLevel,
}

impl Reader<'_> {
    /// Returns true if `writer` is the reader itself or one of its ancestors.
    #[inline]
    fn owns(&self, writer: TxnId) -> bool {
        writer == self.txn || self.ancestors.contains(&writer)
    }

    /// Returns true if `version` is visible at `horizon`.
    pub fn sees(&self, version: &Version, horizon: CommitSeq) -> bool {
        if self.owns(version.writer) {
            return true;
        }

        match version.seq {
            Some(seq) => seq <= horizon,
            None => self.isolation.reads_uncommitted(),
        }
    }
}

/// Result of resolving a key for a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visible {
    /// A visible version carries a value.
    Found(Value),
    /// The visible version is a tombstone.
    Deleted,
    /// No version is visible.
    NotFound,
}

impl Visible {
    /// Collapses the result into the value a caller sees.
    #[inline]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Visible::Found(value) => Some(value),
            Visible::Deleted | Visible::NotFound => None,
        }
    }
}

/// Picks the version of a newest-first chain visible to `reader`.
pub fn resolve(reader: &Reader<'_>, horizon: CommitSeq, versions: &[Version]) -> Visible {
    match versions.iter().find(|v| reader.sees(v, horizon)) {
        Some(Version {
            value: Some(value), ..
        }) => Visible::Found(value.clone()),
        Some(_) => Visible::Deleted,
        None => Visible::NotFound,
    }
}
