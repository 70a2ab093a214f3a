// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Commit sequence numbers.
//!
//! Every root commit is stamped with a sequence number drawn from a single
//! process-wide [`SequenceSource`]. Sequence numbers define the total order of
//! commits that snapshot-style readers use as their horizon:
//!
//! - A committed version is visible to a reader if `version.seq <= horizon`
//! - The horizon of a read is the source's `current()` value at that instant
//!
//! Two sources are provided:
//!
//! - [`CounterSequence`]: a plain atomic counter (`1, 2, 3, ...`)
//! - [`HlcSequence`]: hybrid logical clock values, useful when sequence
//!   numbers should also roughly track wall-clock time
//!
//! # Example
//!
//! ```
//! use arborkv::seq::{create_sequence, SequenceKind};
//!
//! let seq = create_sequence(SequenceKind::Counter);
//! let a = seq.next()?;
//! let b = seq.next()?;
//! assert!(b > a);
//! assert_eq!(seq.current(), b);
//! # Ok::<(), arborkv::seq::SequenceError>(())
//! ```

mod counter;
mod error;
mod hlc;

use std::sync::Arc;

pub use counter::CounterSequence;
pub use error::SequenceError;
pub use hlc::HlcSequence;

/// A commit sequence number.
///
/// `CommitSeq::ZERO` is never handed out; it is the horizon before the first commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CommitSeq(pub u64);

impl CommitSeq {
    /// The horizon before any commit.
    pub const ZERO: CommitSeq = CommitSeq(0);

    /// Returns the raw value.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CommitSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies the kind of sequence source in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SequenceKind {
    /// Atomic counter.
    #[default]
    Counter,
    /// Hybrid logical clock.
    Hlc,
}

impl SequenceKind {
    /// Returns a human-readable name for this source.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            SequenceKind::Counter => "counter",
            SequenceKind::Hlc => "HLC",
        }
    }
}

impl std::fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Process-wide generator of commit sequence numbers.
pub trait SequenceSource: Send + Sync {
    /// Allocates a sequence number strictly greater than every number
    /// previously returned by this source.
    ///
    /// Fails once no greater number is left.
    fn next(&self) -> Result<CommitSeq, SequenceError>;

    /// Returns the most recently allocated sequence number, or
    /// [`CommitSeq::ZERO`] if none has been allocated yet.
    fn current(&self) -> CommitSeq;

    /// Returns the kind of this source, for diagnostics.
    fn kind(&self) -> SequenceKind;
}

/// Creates a sequence source of the given kind.
pub fn create_sequence(kind: SequenceKind) -> Arc<dyn SequenceSource> {
    create_sequence_after(kind, CommitSeq::ZERO)
}

/// Creates a sequence source whose numbers are all greater than `last`.
///
/// Used when commits up to `last` already exist in a commit log.
pub fn create_sequence_after(kind: SequenceKind, last: CommitSeq) -> Arc<dyn SequenceSource> {
    match kind {
        SequenceKind::Counter => Arc::new(CounterSequence::starting_after(last)),
        SequenceKind::Hlc => Arc::new(HlcSequence::starting_after(last)),
    }
}
