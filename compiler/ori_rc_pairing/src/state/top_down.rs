//! Top-down lattice: increments searching forward for their decrement.

use crate::ir::{ArcVarId, InsertPt, InstrRef};
use crate::result::RcMatch;

use super::{RcLattice, RefCountState};

/// Top-down lattice state, declared in scan order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TopDownLattice {
    /// Not tracking.
    None,
    /// Seen an increment (or entrance); nothing since could decrement.
    Incremented,
    /// Something since the increment may have decremented the root.
    MightBeDecremented,
    /// A use of the root followed that potential decrement.
    MightBeUsed,
}

impl RcLattice for TopDownLattice {
    const NONE: Self = TopDownLattice::None;
    const INITIAL: Self = TopDownLattice::Incremented;
}

impl RefCountState<TopDownLattice> {
    /// Offer an instruction that might decrement the root.
    ///
    /// Only matters right after the increment: the increment could sink at
    /// most to just before `point`, which is recorded.
    pub fn handle_potential_decrement(
        &mut self,
        point: InsertPt,
        may_decrement: impl FnOnce() -> bool,
    ) -> bool {
        let advanced = self.advance(
            TopDownLattice::Incremented,
            TopDownLattice::MightBeDecremented,
            may_decrement,
        );
        if advanced {
            self.add_insert_pt(point);
        }
        advanced
    }

    /// Offer an instruction that might use the root.
    ///
    /// Only matters after a potential decrement.
    pub fn handle_potential_use(&mut self, may_use: impl FnOnce() -> bool) -> bool {
        self.advance(
            TopDownLattice::MightBeDecremented,
            TopDownLattice::MightBeUsed,
            may_use,
        )
    }

    /// The matching decrement `dec` was reached.
    ///
    /// - `Incremented`: the increment can sink all the way down to `dec`.
    /// - `MightBeDecremented`: the recorded points stand.
    /// - `MightBeUsed`: no code motion; deletion needs `known_safe`.
    ///
    /// Returns `None` if nothing was tracked. The state is cleared either way.
    pub fn handle_match(&mut self, root: ArcVarId, dec: InstrRef) -> Option<RcMatch> {
        let use_after_decrement = match self.lattice {
            TopDownLattice::None => return None,
            TopDownLattice::Incremented => {
                self.insert_pts.clear();
                self.insert_pts.push(InsertPt::before(dec));
                false
            }
            TopDownLattice::MightBeDecremented => false,
            TopDownLattice::MightBeUsed => {
                self.insert_pts.clear();
                true
            }
        };
        self.take_match(root, use_after_decrement)
    }
}
