//! Problems the analysis notices but does not stop for.

use crate::ir::{ArcBlockId, InstrRef};

/// Problem encountered while pairing RC operations.
///
/// These are collected on the [`PairingResult`](crate::PairingResult) and
/// never abort the run. Anything touched by a problem is left out of the
/// analysis, which can only cost pairs, never produce wrong ones.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PairingProblem {
    /// The entry block ID does not name a block. Nothing is analyzed.
    #[error("entry block {entry} is out of range ({num_blocks} blocks)")]
    EntryOutOfRange { entry: ArcBlockId, num_blocks: usize },

    /// `blocks[position].id` is not `position`.
    #[error("block at position {position} has id {id}")]
    BlockIdMismatch { position: usize, id: ArcBlockId },

    /// A terminator names a block that does not exist. The edge is ignored.
    #[error("{block} jumps to nonexistent block {target}")]
    DanglingSuccessor {
        block: ArcBlockId,
        target: ArcBlockId,
    },

    /// The same mutator was matched twice in one direction. The first
    /// match is kept.
    #[error("{instr} was matched more than once")]
    DuplicateMatch { instr: InstrRef },
}
