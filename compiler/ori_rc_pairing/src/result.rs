//! Match results handed to the rewrite stage.
//!
//! The analysis produces two maps per function. The top-down pass keys
//! entries by the decrement that closed a sequence and records the
//! increments it paired with; the bottom-up pass keys entries by the
//! increment and records the decrements. Each entry carries the evidence
//! the rewrite stage needs to decide between deleting the pair, moving
//! one side, or leaving both alone.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::ir::{ArcVarId, InsertPt, InstrRef, Name};
use crate::problem::PairingProblem;
use crate::transition::RcTransitionKind;

/// Evidence for one matched increment/decrement pairing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RcMatch {
    /// The canonical root whose count the pair manipulates.
    pub root: ArcVarId,
    /// Kind of the tracked side (`StrongIncrement`/`StrongEntrance` for
    /// top-down entries, `StrongDecrement` for bottom-up entries).
    pub kind: RcTransitionKind,
    /// The tracked mutator instructions, one per joined path. Empty for an
    /// entrance.
    pub mutators: SmallVec<[InstrRef; 2]>,
    /// Removing or moving this pair cannot underflow the count.
    pub known_safe: bool,
    /// Where the tracked mutator could be placed instead, sorted.
    pub insert_pts: SmallVec<[InsertPt; 4]>,
    /// Insertion points arrived over differing numbers of paths.
    pub partial: bool,
    /// A potential decrement was followed by a use of the root between the
    /// two sides of the pair.
    pub use_after_decrement: bool,
}

impl RcMatch {
    /// Can both sides be deleted outright?
    pub fn can_remove(&self) -> bool {
        self.known_safe || !self.use_after_decrement
    }

    /// Can the tracked side be moved to `insert_pts` instead?
    pub fn can_move(&self) -> bool {
        !self.partial && !self.insert_pts.is_empty()
    }
}

/// Increments and decrements of one root that only balance as a group.
///
/// Every decrement's top-down match names increments of the set, and every
/// increment's bottom-up match names decrements of the set. So on any path
/// that returns normally, each member runs next to a partner and the set
/// adds up to zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RcPairSet {
    pub root: ArcVarId,
    /// Sorted.
    pub increments: Vec<InstrRef>,
    /// Sorted.
    pub decrements: Vec<InstrRef>,
    /// Every match in the set is known safe.
    pub known_safe: bool,
    /// Every match in the set allows deleting both sides.
    pub removable: bool,
}

/// Pair counts for one function, for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PairingStats {
    pub top_down_pairs: usize,
    pub bottom_up_pairs: usize,
    pub known_safe: usize,
    pub partial: usize,
    pub removable: usize,
}

/// Everything one analysis run produced for a function.
#[derive(Clone, Debug, Default)]
pub struct PairingResult {
    pub(crate) function: Option<Name>,
    pub(crate) dec_to_inc: FxHashMap<InstrRef, RcMatch>,
    pub(crate) inc_to_dec: FxHashMap<InstrRef, RcMatch>,
    pub(crate) problems: Vec<PairingProblem>,
}

impl PairingResult {
    /// The analyzed function's name.
    pub fn function(&self) -> Option<Name> {
        self.function
    }

    /// Top-down results: decrement → matched increment state.
    pub fn dec_to_inc(&self) -> &FxHashMap<InstrRef, RcMatch> {
        &self.dec_to_inc
    }

    /// Bottom-up results: increment → matched decrement state.
    pub fn inc_to_dec(&self) -> &FxHashMap<InstrRef, RcMatch> {
        &self.inc_to_dec
    }

    /// Structural problems found while analyzing. None of them abort the run.
    pub fn problems(&self) -> &[PairingProblem] {
        &self.problems
    }

    /// Top-down match for a decrement.
    pub fn match_for_decrement(&self, dec: InstrRef) -> Option<&RcMatch> {
        self.dec_to_inc.get(&dec)
    }

    /// Bottom-up match for an increment.
    pub fn match_for_increment(&self, inc: InstrRef) -> Option<&RcMatch> {
        self.inc_to_dec.get(&inc)
    }

    /// All `(increment, decrement)` instruction pairs, from both
    /// directions, sorted and deduplicated. Entrances contribute nothing.
    pub fn matched_pairs(&self) -> Vec<(InstrRef, InstrRef)> {
        let mut pairs: Vec<(InstrRef, InstrRef)> = Vec::new();
        for (&dec, m) in &self.dec_to_inc {
            pairs.extend(m.mutators.iter().map(|&inc| (inc, dec)));
        }
        for (&inc, m) in &self.inc_to_dec {
            pairs.extend(m.mutators.iter().map(|&dec| (inc, dec)));
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    /// Group matches into sets confirmed by both directions.
    ///
    /// A decrement paired top-down only, or an increment paired bottom-up
    /// only, is one-sided evidence and belongs to no set. Sets come back
    /// ordered by their first decrement.
    pub fn pair_sets(&self) -> Vec<RcPairSet> {
        let mut decs: Vec<InstrRef> = self
            .dec_to_inc
            .iter()
            .filter(|(_, m)| !m.mutators.is_empty())
            .map(|(&dec, _)| dec)
            .collect();
        decs.sort_unstable();

        let mut grouped: FxHashSet<InstrRef> = FxHashSet::default();
        let mut sets = Vec::new();
        for dec in decs {
            if grouped.contains(&dec) {
                continue;
            }
            if let Some(set) = self.close_pair_set(dec, &mut grouped) {
                sets.push(set);
            }
        }
        sets
    }

    /// Follow matches from `dec` in both directions until nothing new turns
    /// up. `None` if some member is unmatched in one of them.
    fn close_pair_set(
        &self,
        dec: InstrRef,
        grouped: &mut FxHashSet<InstrRef>,
    ) -> Option<RcPairSet> {
        let mut increments: Vec<InstrRef> = Vec::new();
        let mut decrements = vec![dec];
        let mut root = None;
        let mut closed = true;
        let mut known_safe = true;
        let mut removable = true;

        let mut work = vec![(dec, true)];
        while let Some((at, is_dec)) = work.pop() {
            let map = if is_dec {
                &self.dec_to_inc
            } else {
                &self.inc_to_dec
            };
            let Some(m) = map.get(&at).filter(|m| !m.mutators.is_empty()) else {
                closed = false;
                continue;
            };
            if is_dec && m.kind != RcTransitionKind::StrongIncrement {
                closed = false;
            }
            if *root.get_or_insert(m.root) != m.root {
                closed = false;
            }
            known_safe &= m.known_safe;
            removable &= m.can_remove();

            let members = if is_dec {
                &mut increments
            } else {
                &mut decrements
            };
            for &partner in &m.mutators {
                if let Err(pos) = members.binary_search(&partner) {
                    members.insert(pos, partner);
                    work.push((partner, !is_dec));
                }
            }
        }

        grouped.extend(decrements.iter().copied());
        if !closed {
            return None;
        }
        Some(RcPairSet {
            root: root?,
            increments,
            decrements,
            known_safe,
            removable,
        })
    }

    /// Returns `true` if neither direction matched anything.
    pub fn is_empty(&self) -> bool {
        self.dec_to_inc.is_empty() && self.inc_to_dec.is_empty()
    }

    pub fn stats(&self) -> PairingStats {
        let all = || self.dec_to_inc.values().chain(self.inc_to_dec.values());
        PairingStats {
            top_down_pairs: self.dec_to_inc.len(),
            bottom_up_pairs: self.inc_to_dec.len(),
            known_safe: all().filter(|m| m.known_safe).count(),
            partial: all().filter(|m| m.partial).count(),
            removable: all().filter(|m| m.can_remove()).count(),
        }
    }
}
