// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Sequence source error types.

use super::CommitSeq;

/// Errors that can occur when allocating a sequence number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("sequence exhausted after {last}")]
    Exhausted { last: CommitSeq },
}
