// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction identity, state and isolation levels.

/// Unique transaction identifier.
///
/// Identifiers are allocated in increasing order, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub u64);

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Transaction isolation levels.
///
/// The level only decides how a transaction *reads*. Writes always take
/// exclusive locks, whatever the writer's level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    /// Reads take shared locks held until the transaction ends.
    #[default]
    Serializable,
    /// Reads take shared locks released as soon as the read returns.
    ReadCommitted,
    /// Reads take no locks and may observe other transactions' pending writes.
    ReadUncommitted,
}

impl IsolationLevel {
    /// Returns true if reads at this level acquire shared locks.
    #[inline]
    pub fn locks_reads(&self) -> bool {
        !matches!(self, IsolationLevel::ReadUncommitted)
    }

    /// Returns true if shared locks are kept until the transaction ends.
    #[inline]
    pub fn holds_read_locks(&self) -> bool {
        matches!(self, IsolationLevel::Serializable)
    }

    /// Returns true if reads may observe pending versions of unrelated transactions.
    #[inline]
    pub fn reads_uncommitted(&self) -> bool {
        matches!(self, IsolationLevel::ReadUncommitted)
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IsolationLevel::Serializable => "serializable",
            IsolationLevel::ReadCommitted => "read-committed",
            IsolationLevel::ReadUncommitted => "read-uncommitted",
        };
        f.write_str(name)
    }
}

/// Transaction state.
///
/// `Active → Committing → Committed` or `Active → Aborting → Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnState {
    Active,
    Committing,
    Committed,
    Aborting,
    Aborted,
}

impl TxnState {
    /// Returns true for `Committed` and `Aborted`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxnState::Committed | TxnState::Aborted)
    }
}

impl std::fmt::Display for TxnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TxnState::Active => "active",
            TxnState::Committing => "committing",
            TxnState::Committed => "committed",
            TxnState::Aborting => "aborting",
            TxnState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Arena node of one transaction.
#[derive(Debug)]
pub(crate) struct TxnNode {
    /// `lineage[0]` is this transaction, followed by its ancestors, parent first.
    pub(crate) lineage: Vec<TxnId>,
    pub(crate) state: TxnState,
    pub(crate) isolation: IsolationLevel,
    /// Children that have not yet committed into this transaction or aborted.
    pub(crate) children: Vec<TxnId>,
}

impl TxnNode {
    /// Creates a root transaction.
    pub(crate) fn root(id: TxnId, isolation: IsolationLevel) -> Self {
        Self {
            lineage: vec![id],
            state: TxnState::Active,
            isolation,
            children: Vec::new(),
        }
    }

    /// Creates a child of `parent`.
    pub(crate) fn child(id: TxnId, parent: &TxnNode, isolation: IsolationLevel) -> Self {
        let mut lineage = Vec::with_capacity(parent.lineage.len() + 1);
        lineage.push(id);
        lineage.extend_from_slice(&parent.lineage);

        Self {
            lineage,
            state: TxnState::Active,
            isolation,
            children: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> TxnId {
        self.lineage[0]
    }

    #[inline]
    pub(crate) fn parent(&self) -> Option<TxnId> {
        self.lineage.get(1).copied()
    }

    #[inline]
    pub(crate) fn root_id(&self) -> TxnId {
        self.lineage[self.lineage.len() - 1]
    }

    /// Ancestors, parent first.
    #[inline]
    pub(crate) fn ancestors(&self) -> &[TxnId] {
        &self.lineage[1..]
    }

    pub(crate) fn info(&self) -> TxnInfo {
        TxnInfo {
            id: self.id(),
            parent: self.parent(),
            root: self.root_id(),
            state: self.state,
            isolation: self.isolation,
            active_children: self.children.clone(),
        }
    }
}

/// A point-in-time snapshot of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnInfo {
    id: TxnId,
    parent: Option<TxnId>,
    root: TxnId,
    state: TxnState,
    isolation: IsolationLevel,
    active_children: Vec<TxnId>,
}

impl TxnInfo {
    /// Returns the transaction ID.
    #[inline]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Returns the parent, `None` for a root transaction.
    #[inline]
    pub fn parent(&self) -> Option<TxnId> {
        self.parent
    }

    /// Returns the root of the transaction's hierarchy (itself for a root).
    #[inline]
    pub fn root(&self) -> TxnId {
        self.root
    }

    /// Returns the state at the time of the snapshot.
    #[inline]
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Returns the isolation level fixed at begin.
    #[inline]
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// Returns the children that had not yet terminated.
    #[inline]
    pub fn active_children(&self) -> &[TxnId] {
        &self.active_children
    }

    /// Returns true for a root transaction.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns true if the transaction is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == TxnState::Active
    }

    /// Returns true if the transaction is committed.
    #[inline]
    pub fn is_committed(&self) -> bool {
        self.state == TxnState::Committed
    }

    /// Returns true if the transaction is aborted.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.state == TxnState::Aborted
    }
}
