//! Bottom-up lattice: decrements searching backward for their increment.

use crate::ir::{ArcVarId, InsertPt};
use crate::result::RcMatch;

use super::{RcLattice, RefCountState};

/// Bottom-up lattice state, declared in (reverse) scan order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BottomUpLattice {
    /// Not tracking.
    None,
    /// Seen a decrement; nothing above it uses the root yet.
    Decremented,
    /// Something above the decrement may use the root.
    MightBeUsed,
    /// Something above that use may decrement the root.
    MightBeDecremented,
}

impl RcLattice for BottomUpLattice {
    const NONE: Self = BottomUpLattice::None;
    const INITIAL: Self = BottomUpLattice::Decremented;
}

impl RefCountState<BottomUpLattice> {
    /// Offer an instruction that might use the root.
    ///
    /// Only matters right above the decrement: the decrement could hoist at
    /// most to `points` (just after the use), which are recorded.
    pub fn handle_potential_use(
        &mut self,
        points: &[InsertPt],
        may_use: impl FnOnce() -> bool,
    ) -> bool {
        let advanced = self.advance(
            BottomUpLattice::Decremented,
            BottomUpLattice::MightBeUsed,
            may_use,
        );
        if advanced {
            for &pt in points {
                self.add_insert_pt(pt);
            }
        }
        advanced
    }

    /// Offer an instruction that might decrement the root.
    ///
    /// Only matters above a use; past this point the decrement cannot be
    /// hoisted without further proof.
    pub fn handle_potential_decrement(&mut self, may_decrement: impl FnOnce() -> bool) -> bool {
        self.advance(
            BottomUpLattice::MightBeUsed,
            BottomUpLattice::MightBeDecremented,
            may_decrement,
        )
    }

    /// The matching increment was reached.
    ///
    /// From `Decremented` or `MightBeUsed` the pair is simply deleted, so
    /// the insertion points are dropped. From `MightBeDecremented` they are
    /// kept and deletion needs `known_safe`.
    ///
    /// Returns `None` if nothing was tracked. The state is cleared either way.
    pub fn handle_match(&mut self, root: ArcVarId) -> Option<RcMatch> {
        let use_after_decrement = match self.lattice {
            BottomUpLattice::None => return None,
            BottomUpLattice::Decremented | BottomUpLattice::MightBeUsed => {
                self.insert_pts.clear();
                false
            }
            BottomUpLattice::MightBeDecremented => true,
        };
        self.take_match(root, use_after_decrement)
    }
}
