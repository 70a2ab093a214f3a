// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Atomic counter sequence source.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{CommitSeq, SequenceError, SequenceKind, SequenceSource};

/// Sequence source backed by a single atomic counter.
pub struct CounterSequence {
    last: AtomicU64,
}

impl CounterSequence {
    /// Creates a counter whose first allocated number is 1.
    pub fn new() -> Self {
        Self::starting_after(CommitSeq::ZERO)
    }

    /// Creates a counter whose first allocated number is `seq + 1`.
    ///
    /// Used when resuming after commit records up to `seq` were already written.
    pub fn starting_after(seq: CommitSeq) -> Self {
        Self {
            last: AtomicU64::new(seq.0),
        }
    }
}

impl Default for CounterSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceSource for CounterSequence {
    #[inline]
    fn next(&self) -> Result<CommitSeq, SequenceError> {
        self.last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| last.checked_add(1))
            .map(|last| CommitSeq(last + 1))
            .map_err(|last| SequenceError::Exhausted {
                last: CommitSeq(last),
            })
    }

    #[inline]
    fn current(&self) -> CommitSeq {
        CommitSeq(self.last.load(Ordering::Acquire))
    }

    #[inline]
    fn kind(&self) -> SequenceKind {
        SequenceKind::Counter
    }
}
