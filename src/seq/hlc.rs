// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Hybrid Logical Clock sequence source.
//!
//! Sequence numbers are nanoseconds since the Unix epoch, bumped by a logical
//! increment whenever the physical clock has not advanced past the last value
//! handed out. Numbers stay strictly increasing even if the wall clock steps
//! backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{CommitSeq, SequenceError, SequenceKind, SequenceSource};

/// Hybrid Logical Clock sequence source.
pub struct HlcSequence {
    last: AtomicU64,
}

impl HlcSequence {
    /// Creates a new HLC source.
    pub fn new() -> Self {
        Self::starting_after(CommitSeq::ZERO)
    }

    /// Creates a source whose numbers are all greater than `seq`.
    pub fn starting_after(seq: CommitSeq) -> Self {
        Self {
            last: AtomicU64::new(seq.get()),
        }
    }

    fn physical_time_nanos() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

impl Default for HlcSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceSource for HlcSequence {
    fn next(&self) -> Result<CommitSeq, SequenceError> {
        loop {
            let physical = Self::physical_time_nanos();
            let last = self.last.load(Ordering::Acquire);
            let Some(logical) = last.checked_add(1) else {
                return Err(SequenceError::Exhausted {
                    last: CommitSeq(last),
                });
            };
            let candidate = physical.max(logical);

            match self
                .last
                .compare_exchange(last, candidate, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(CommitSeq(candidate)),
                Err(_) => continue,
            }
        }
    }

    #[inline]
    fn current(&self) -> CommitSeq {
        CommitSeq(self.last.load(Ordering::Acquire))
    }

    #[inline]
    fn kind(&self) -> SequenceKind {
        SequenceKind::Hlc
    }
}
