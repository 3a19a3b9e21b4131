//! Reference-count transition classification.
//!
//! Every instruction (and every function-entry parameter) is tagged with
//! the effect it has on the strong count of the object it names. Only
//! single-step increments and decrements start or end a pairing sequence;
//! everything else is `Unknown` and reaches the lattices only as a
//! potential use or potential decrement, answered by the alias oracle.
//!
//! Classification is context-free: it looks at one instruction and never
//! at the CFG, the alias oracle, or the current dataflow state.

use smallvec::SmallVec;

use crate::ir::{ArcClass, ArcInstr, ArcParam, InstrRef, Ownership};

/// Effect of an instruction or parameter on a root's strong count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RcTransitionKind {
    /// Atomically bumps the strong count by one.
    StrongIncrement,
    /// Drops the strong count by one, destroying the object at zero.
    StrongDecrement,
    /// The value enters scope already incremented (an owned parameter).
    StrongEntrance,
    /// No strong-count effect the analysis can pair.
    Unknown,
}

impl RcTransitionKind {
    /// Increment-like kinds start a top-down sequence.
    #[inline]
    pub fn is_increment_like(self) -> bool {
        matches!(
            self,
            RcTransitionKind::StrongIncrement | RcTransitionKind::StrongEntrance
        )
    }
}

/// Classify one instruction.
///
/// Batched increments (`count > 1`) are `Unknown`: they cannot be paired
/// with a single decrement and act as ordinary uses.
pub fn classify_instr(instr: &ArcInstr) -> RcTransitionKind {
    match instr {
        ArcInstr::RcInc { count: 1, .. } => RcTransitionKind::StrongIncrement,
        ArcInstr::RcDec { .. } => RcTransitionKind::StrongDecrement,
        _ => RcTransitionKind::Unknown,
    }
}

/// Classify a function parameter as seen at function entry.
pub fn classify_param(param: &ArcParam, class: ArcClass) -> RcTransitionKind {
    if param.ownership == Ownership::Owned && class.needs_rc() {
        RcTransitionKind::StrongEntrance
    } else {
        RcTransitionKind::Unknown
    }
}

/// A transition together with the instructions it summarizes.
///
/// Starts out naming one mutator instruction. When control-flow paths
/// join, transitions of the same kind union their mutator sets, so one
/// transition can stand for several concrete instructions. An entrance
/// has no instruction at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RcTransition {
    kind: RcTransitionKind,
    mutators: SmallVec<[InstrRef; 2]>,
}

impl RcTransition {
    /// A transition for a single mutator instruction.
    pub fn mutator(kind: RcTransitionKind, at: InstrRef) -> Self {
        debug_assert!(
            matches!(
                kind,
                RcTransitionKind::StrongIncrement | RcTransitionKind::StrongDecrement
            ),
            "mutator transition with kind {kind:?}",
        );
        let mut mutators = SmallVec::new();
        mutators.push(at);
        Self { kind, mutators }
    }

    /// The transition for an owned parameter at function entry.
    pub fn entrance() -> Self {
        Self {
            kind: RcTransitionKind::StrongEntrance,
            mutators: SmallVec::new(),
        }
    }

    pub fn kind(&self) -> RcTransitionKind {
        self.kind
    }

    /// Instructions summarized by this transition, sorted.
    pub fn mutators(&self) -> &[InstrRef] {
        &self.mutators
    }

    /// Union `other` into `self`.
    ///
    /// Returns `false` (leaving `self` untouched) if the kinds disagree.
    pub fn merge(&mut self, other: &RcTransition) -> bool {
        if self.kind != other.kind {
            return false;
        }
        for &at in &other.mutators {
            if let Err(pos) = self.mutators.binary_search(&at) {
                self.mutators.insert(pos, at);
            }
        }
        true
    }
}
