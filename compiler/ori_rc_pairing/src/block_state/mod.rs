//! Per-block dataflow state.
//!
//! Each block owns one root → state map per direction. The evaluator fills
//! a block's map from its already-visited neighbours (`init_*` for the
//! first, `merge_*` for the rest) and then scans the block body.
//!
//! Trap blocks (`abort(); unreachable`) are detected once, on creation.
//! They never track anything and never feed state to a neighbour.

use rustc_hash::FxHashMap;

use crate::config::PairingConfig;
use crate::ir::{ArcBlock, ArcTerminator, ArcVarId};
use crate::state::{BottomUpRefCountState, RcLattice, RefCountState, TopDownRefCountState};

/// Dataflow state of one basic block.
#[derive(Clone, Debug, Default)]
pub struct BlockState {
    top_down: FxHashMap<ArcVarId, TopDownRefCountState>,
    bottom_up: FxHashMap<ArcVarId, BottomUpRefCountState>,
    is_trap: bool,
}

impl BlockState {
    /// Empty state for `block`.
    pub fn new(block: &ArcBlock, config: &PairingConfig) -> Self {
        Self {
            is_trap: is_trap_block(block, config),
            ..Self::default()
        }
    }

    /// Is this block an abort sink?
    #[inline]
    pub fn is_trap(&self) -> bool {
        self.is_trap
    }

    pub fn top_down(&self) -> &FxHashMap<ArcVarId, TopDownRefCountState> {
        &self.top_down
    }

    pub fn bottom_up(&self) -> &FxHashMap<ArcVarId, BottomUpRefCountState> {
        &self.bottom_up
    }

    pub(crate) fn top_down_mut(&mut self) -> &mut FxHashMap<ArcVarId, TopDownRefCountState> {
        &mut self.top_down
    }

    pub(crate) fn bottom_up_mut(&mut self) -> &mut FxHashMap<ArcVarId, BottomUpRefCountState> {
        &mut self.bottom_up
    }

    /// Top-down state of `root` at the current scan position.
    pub fn top_down_state(&self, root: ArcVarId) -> Option<&TopDownRefCountState> {
        self.top_down.get(&root)
    }

    /// Bottom-up state of `root` at the current scan position.
    pub fn bottom_up_state(&self, root: ArcVarId) -> Option<&BottomUpRefCountState> {
        self.bottom_up.get(&root)
    }

    /// Take the top-down state of the first predecessor.
    pub fn init_top_down(&mut self, pred: &BlockState) {
        self.top_down.clone_from(&pred.top_down);
    }

    /// Join the top-down state of another predecessor.
    pub fn merge_top_down(&mut self, pred: &BlockState) {
        merge_maps(&mut self.top_down, &pred.top_down);
    }

    /// Take the bottom-up state of the first successor.
    pub fn init_bottom_up(&mut self, succ: &BlockState) {
        self.bottom_up.clone_from(&succ.bottom_up);
    }

    /// Join the bottom-up state of another successor.
    pub fn merge_bottom_up(&mut self, succ: &BlockState) {
        merge_maps(&mut self.bottom_up, &succ.bottom_up);
    }

    pub fn clear_top_down(&mut self) {
        self.top_down.clear();
    }

    pub fn clear_bottom_up(&mut self) {
        self.bottom_up.clear();
    }

    /// Forget all tracked state. The trap flag is structural and stays.
    pub fn clear(&mut self) {
        self.clear_top_down();
        self.clear_bottom_up();
    }
}

/// Join `other` into `mine` root by root.
///
/// A root missing on either side is untracked there, and `None` wins the
/// join, so only roots present in both maps survive.
fn merge_maps<L: RcLattice>(
    mine: &mut FxHashMap<ArcVarId, RefCountState<L>>,
    other: &FxHashMap<ArcVarId, RefCountState<L>>,
) {
    mine.retain(|root, state| match other.get(root) {
        Some(theirs) => {
            state.merge(theirs);
            state.is_tracking()
        }
        None => false,
    });
}

/// Does `block` do nothing but abort?
///
/// The pattern is exact: a single call to a configured abort primitive
/// followed by `Unreachable`.
pub fn is_trap_block(block: &ArcBlock, config: &PairingConfig) -> bool {
    matches!(block.terminator, ArcTerminator::Unreachable)
        && matches!(block.body.as_slice(), [only] if config.is_abort_call(only))
}
