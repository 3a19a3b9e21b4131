//! Per-instruction dispatch into the lattices.
//!
//! [`RcInstVisitor`] splits instructions into strong increments, strong
//! decrements, and everything else; [`dispatch_instr`] routes one
//! instruction to the matching method. The evaluator drives the two
//! dataflow visitors below through it, and a downstream walk that already
//! visits every instruction can drive them too instead of running a
//! separate scan.
//!
//! Both dataflow visitors follow the same per-instruction protocol:
//!
//! 1. Offer the instruction to every tracked root *other than* the one it
//!    mutates, first as a potential decrement, then as a potential use.
//! 2. If it is a mutator, start a sequence (the driving side) or close one
//!    (the matching side) for its own root.

use rustc_hash::FxHashMap;

use crate::alias::AliasOracle;
use crate::identity::RcIdentity;
use crate::ir::{ArcInstr, ArcTerminator, ArcVarId, InsertPt, InstrRef};
use crate::problem::PairingProblem;
use crate::result::RcMatch;
use crate::state::{BottomUpRefCountState, TopDownRefCountState};
use crate::transition::{classify_instr, RcTransition, RcTransitionKind};

/// Visitor over instructions, split by RC transition kind.
pub trait RcInstVisitor {
    type Output;

    /// `instr` is a single-step `RcInc` of `var`.
    fn visit_strong_increment(
        &mut self,
        at: InstrRef,
        instr: &ArcInstr,
        var: ArcVarId,
    ) -> Self::Output;

    /// `instr` is an `RcDec` of `var`.
    fn visit_strong_decrement(
        &mut self,
        at: InstrRef,
        instr: &ArcInstr,
        var: ArcVarId,
    ) -> Self::Output;

    /// Any other instruction, batched increments included.
    fn visit_other(&mut self, at: InstrRef, instr: &ArcInstr) -> Self::Output;
}

/// Route `instr` (found at `at`) to the visitor method for its kind.
pub fn dispatch_instr<V: RcInstVisitor + ?Sized>(
    visitor: &mut V,
    at: InstrRef,
    instr: &ArcInstr,
) -> V::Output {
    match (classify_instr(instr), instr) {
        (RcTransitionKind::StrongIncrement, ArcInstr::RcInc { var, .. }) => {
            visitor.visit_strong_increment(at, instr, *var)
        }
        (RcTransitionKind::StrongDecrement, ArcInstr::RcDec { var }) => {
            visitor.visit_strong_decrement(at, instr, *var)
        }
        _ => visitor.visit_other(at, instr),
    }
}

/// What a dataflow visitor did with one instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataflowVisitResult {
    /// Root whose sequence the instruction started or closed.
    pub root: Option<ArcVarId>,
    /// The instruction started a sequence inside one already in progress.
    pub nesting_detected: bool,
}

/// Record `matched` under `at`, keeping the first match on a duplicate.
fn record_match(
    matches: &mut FxHashMap<InstrRef, RcMatch>,
    problems: &mut Vec<PairingProblem>,
    at: InstrRef,
    matched: RcMatch,
) {
    debug_assert!(!matches.contains_key(&at), "{at} matched twice");
    if matches.contains_key(&at) {
        problems.push(PairingProblem::DuplicateMatch { instr: at });
        return;
    }
    matches.insert(at, matched);
}

// Top-down

/// Forward scan: increments start sequences, decrements close them.
///
/// Matches are recorded keyed by the closing decrement.
pub struct TopDownDataflowVisitor<'a> {
    states: &'a mut FxHashMap<ArcVarId, TopDownRefCountState>,
    oracle: &'a dyn AliasOracle,
    identity: &'a RcIdentity,
    dec_to_inc: &'a mut FxHashMap<InstrRef, RcMatch>,
    problems: &'a mut Vec<PairingProblem>,
}

impl<'a> TopDownDataflowVisitor<'a> {
    pub fn new(
        states: &'a mut FxHashMap<ArcVarId, TopDownRefCountState>,
        oracle: &'a dyn AliasOracle,
        identity: &'a RcIdentity,
        dec_to_inc: &'a mut FxHashMap<InstrRef, RcMatch>,
        problems: &'a mut Vec<PairingProblem>,
    ) -> Self {
        Self {
            states,
            oracle,
            identity,
            dec_to_inc,
            problems,
        }
    }

    /// Drop every tracked root.
    pub fn clear_all(&mut self) {
        self.states.clear();
    }

    fn offer(&mut self, at: InstrRef, instr: &ArcInstr, skip: Option<ArcVarId>) {
        let (oracle, identity) = (self.oracle, self.identity);
        let point = InsertPt::before(at);
        for (&root, state) in self.states.iter_mut() {
            if Some(root) == skip {
                continue;
            }
            state.handle_potential_decrement(point, || {
                oracle.may_decrement(instr, root, identity)
            });
            state.handle_potential_use(|| oracle.may_use(instr, root, identity));
        }
    }

    /// Offer the block terminator. `point` is the slot just before it.
    pub fn visit_terminator(&mut self, point: InsertPt, term: &ArcTerminator) {
        let (oracle, identity) = (self.oracle, self.identity);
        for (&root, state) in self.states.iter_mut() {
            state.handle_potential_decrement(point, || {
                oracle.terminator_may_decrement(term, root, identity)
            });
            state.handle_potential_use(|| oracle.terminator_may_use(term, root, identity));
        }
    }
}

impl RcInstVisitor for TopDownDataflowVisitor<'_> {
    type Output = DataflowVisitResult;

    fn visit_strong_increment(
        &mut self,
        at: InstrRef,
        instr: &ArcInstr,
        var: ArcVarId,
    ) -> DataflowVisitResult {
        let root = self.identity.root(var);
        self.offer(at, instr, Some(root));
        let nesting_detected = self
            .states
            .entry(root)
            .or_default()
            .init_with_mutator(RcTransition::mutator(RcTransitionKind::StrongIncrement, at));
        DataflowVisitResult {
            root: Some(root),
            nesting_detected,
        }
    }

    fn visit_strong_decrement(
        &mut self,
        at: InstrRef,
        instr: &ArcInstr,
        var: ArcVarId,
    ) -> DataflowVisitResult {
        let root = self.identity.root(var);
        self.offer(at, instr, Some(root));
        let Some(matched) = self
            .states
            .remove(&root)
            .and_then(|mut state| state.handle_match(root, at))
        else {
            return DataflowVisitResult::default();
        };
        record_match(self.dec_to_inc, self.problems, at, matched);
        DataflowVisitResult {
            root: Some(root),
            nesting_detected: false,
        }
    }

    fn visit_other(&mut self, at: InstrRef, instr: &ArcInstr) -> DataflowVisitResult {
        self.offer(at, instr, None);
        DataflowVisitResult::default()
    }
}

// Bottom-up

/// Backward scan: decrements start sequences, increments close them.
///
/// Instructions must be fed in reverse order. Matches are recorded keyed
/// by the closing increment.
pub struct BottomUpDataflowVisitor<'a> {
    states: &'a mut FxHashMap<ArcVarId, BottomUpRefCountState>,
    oracle: &'a dyn AliasOracle,
    identity: &'a RcIdentity,
    inc_to_dec: &'a mut FxHashMap<InstrRef, RcMatch>,
    problems: &'a mut Vec<PairingProblem>,
}

impl<'a> BottomUpDataflowVisitor<'a> {
    pub fn new(
        states: &'a mut FxHashMap<ArcVarId, BottomUpRefCountState>,
        oracle: &'a dyn AliasOracle,
        identity: &'a RcIdentity,
        inc_to_dec: &'a mut FxHashMap<InstrRef, RcMatch>,
        problems: &'a mut Vec<PairingProblem>,
    ) -> Self {
        Self {
            states,
            oracle,
            identity,
            inc_to_dec,
            problems,
        }
    }

    /// Drop every tracked root.
    pub fn clear_all(&mut self) {
        self.states.clear();
    }

    fn offer(&mut self, at: InstrRef, instr: &ArcInstr, skip: Option<ArcVarId>) {
        let (oracle, identity) = (self.oracle, self.identity);
        let points = [InsertPt::after(at)];
        for (&root, state) in self.states.iter_mut() {
            if Some(root) == skip {
                continue;
            }
            state.handle_potential_decrement(|| oracle.may_decrement(instr, root, identity));
            state.handle_potential_use(&points, || oracle.may_use(instr, root, identity));
        }
    }

    /// Offer the block terminator. A use there can only be followed by
    /// code at the start of each successor, so those are the `points`.
    pub fn visit_terminator(&mut self, points: &[InsertPt], term: &ArcTerminator) {
        let (oracle, identity) = (self.oracle, self.identity);
        for (&root, state) in self.states.iter_mut() {
            state.handle_potential_decrement(|| {
                oracle.terminator_may_decrement(term, root, identity)
            });
            state.handle_potential_use(points, || {
                oracle.terminator_may_use(term, root, identity)
            });
        }
    }
}

impl RcInstVisitor for BottomUpDataflowVisitor<'_> {
    type Output = DataflowVisitResult;

    fn visit_strong_increment(
        &mut self,
        at: InstrRef,
        instr: &ArcInstr,
        var: ArcVarId,
    ) -> DataflowVisitResult {
        let root = self.identity.root(var);
        self.offer(at, instr, Some(root));
        let Some(matched) = self
            .states
            .remove(&root)
            .and_then(|mut state| state.handle_match(root))
        else {
            return DataflowVisitResult::default();
        };
        record_match(self.inc_to_dec, self.problems, at, matched);
        DataflowVisitResult {
            root: Some(root),
            nesting_detected: false,
        }
    }

    fn visit_strong_decrement(
        &mut self,
        at: InstrRef,
        instr: &ArcInstr,
        var: ArcVarId,
    ) -> DataflowVisitResult {
        let root = self.identity.root(var);
        self.offer(at, instr, Some(root));
        let nesting_detected = self
            .states
            .entry(root)
            .or_default()
            .init_with_mutator(RcTransition::mutator(RcTransitionKind::StrongDecrement, at));
        DataflowVisitResult {
            root: Some(root),
            nesting_detected,
        }
    }

    fn visit_other(&mut self, at: InstrRef, instr: &ArcInstr) -> DataflowVisitResult {
        self.offer(at, instr, None);
        DataflowVisitResult::default()
    }
}
