//! Per-root reference-count state.
//!
//! One [`RefCountState`] tracks how far a single root has progressed along
//! a matching sequence in one direction, together with the evidence needed
//! to act on a match. The skeleton (tracking, clearing, nesting, merging)
//! is shared; the two directions differ only in their lattice and in how
//! potential uses, potential decrements, and the final match move it:
//!
//! | Direction | Lattice (in scan order) |
//! |-----------|-------------------------|
//! | top-down  | `None → Incremented → MightBeDecremented → MightBeUsed` |
//! | bottom-up | `None → Decremented → MightBeUsed → MightBeDecremented` |
//!
//! Within one linear scan a state only moves forward. At a CFG join two
//! states are joined: `None` on either side wins, otherwise the state that
//! is further along wins.

mod bottom_up;
mod top_down;

use std::fmt;

use smallvec::SmallVec;

use crate::ir::{ArcVarId, InsertPt};
use crate::result::RcMatch;
use crate::transition::RcTransition;

pub use bottom_up::BottomUpLattice;
pub use top_down::TopDownLattice;

/// State tracked while scanning forward from increments.
pub type TopDownRefCountState = RefCountState<TopDownLattice>;

/// State tracked while scanning backward from decrements.
pub type BottomUpRefCountState = RefCountState<BottomUpLattice>;

/// A direction's lattice.
///
/// Variants must be declared in scan order so that the derived `Ord`
/// matches "further along".
pub trait RcLattice: Copy + Eq + Ord + fmt::Debug {
    /// Nothing tracked.
    const NONE: Self;

    /// The state a fresh mutator puts the root in.
    const INITIAL: Self;

    /// Join two states at a CFG merge.
    fn join(self, other: Self) -> Self {
        if self == Self::NONE || other == Self::NONE {
            Self::NONE
        } else {
            self.max(other)
        }
    }
}

/// Reference-count state of one root in one direction.
///
/// Invariant: a state whose lattice is `NONE` carries no transition and no
/// insertion points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefCountState<L> {
    lattice: L,
    transition: Option<RcTransition>,
    known_safe: bool,
    partial: bool,
    insert_pts: SmallVec<[InsertPt; 4]>,
}

impl<L: RcLattice> Default for RefCountState<L> {
    fn default() -> Self {
        Self {
            lattice: L::NONE,
            transition: None,
            known_safe: false,
            partial: false,
            insert_pts: SmallVec::new(),
        }
    }
}

impl<L: RcLattice> RefCountState<L> {
    /// Is a sequence in progress for this root?
    #[inline]
    pub fn is_tracking(&self) -> bool {
        self.lattice != L::NONE
    }

    pub fn lattice(&self) -> L {
        self.lattice
    }

    pub fn transition(&self) -> Option<&RcTransition> {
        self.transition.as_ref()
    }

    pub fn known_safe(&self) -> bool {
        self.known_safe
    }

    pub fn partial(&self) -> bool {
        self.partial
    }

    /// Candidate insertion points, sorted.
    pub fn insert_pts(&self) -> &[InsertPt] {
        &self.insert_pts
    }

    /// Forget everything about this root.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Start a new sequence at a mutator.
    ///
    /// If a sequence was already in progress the new mutator is nested
    /// inside it: the count is at least two at this point, so the inner
    /// pair is known safe. Returns whether nesting was detected.
    pub fn init_with_mutator(&mut self, transition: RcTransition) -> bool {
        let nested = self.is_tracking();
        self.lattice = L::INITIAL;
        self.transition = Some(transition);
        self.known_safe = nested;
        self.partial = false;
        self.insert_pts.clear();
        nested
    }

    /// Join `other` (the same root on another path) into `self`.
    pub fn merge(&mut self, other: &Self) {
        let lattice = self.lattice.join(other.lattice);
        if lattice == L::NONE {
            self.clear();
            return;
        }

        let transitions_agree = match (&mut self.transition, &other.transition) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            _ => false,
        };
        if !transitions_agree {
            self.clear();
            return;
        }

        self.lattice = lattice;
        self.known_safe &= other.known_safe;
        self.partial = self.partial
            || other.partial
            || self.insert_pts.len() != other.insert_pts.len();
        for &pt in &other.insert_pts {
            self.add_insert_pt(pt);
        }
    }

    fn add_insert_pt(&mut self, pt: InsertPt) {
        if let Err(pos) = self.insert_pts.binary_search(&pt) {
            self.insert_pts.insert(pos, pt);
        }
    }

    /// Move to `next` if the state is exactly `from` and the oracle agrees.
    ///
    /// The oracle is only consulted when the lattice makes its answer matter.
    fn advance(&mut self, from: L, next: L, oracle_says: impl FnOnce() -> bool) -> bool {
        if self.lattice != from || !oracle_says() {
            return false;
        }
        self.lattice = next;
        true
    }

    /// Package the current evidence as a match and clear the state.
    fn take_match(&mut self, root: ArcVarId, use_after_decrement: bool) -> Option<RcMatch> {
        let transition = self.transition.take()?;
        let matched = RcMatch {
            root,
            kind: transition.kind(),
            mutators: transition.mutators().iter().copied().collect(),
            known_safe: self.known_safe,
            insert_pts: std::mem::take(&mut self.insert_pts),
            partial: self.partial,
            use_after_decrement,
        };
        self.clear();
        Some(matched)
    }
}
