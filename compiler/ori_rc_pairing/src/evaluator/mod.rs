//! Bidirectional dataflow evaluator for RC pairing.
//!
//! Finds `RcInc`/`RcDec` pairs on the same root that the rewrite stage may
//! delete or move. Two independent passes run over one function:
//!
//! 1. **Top-down:** blocks in reverse post-order. Each block starts from
//!    the join of its predecessors' exit states and scans forward.
//!    Increments (and owned parameters at entry) start sequences;
//!    decrements close them. Results are keyed by decrement.
//!
//! 2. **Bottom-up:** blocks in post-order. Each block starts from the join
//!    of its successors' entry states and scans backward. Decrements start
//!    sequences; increments close them. Results are keyed by increment.
//!
//! # Loops
//!
//! There is no fixed-point iteration. A block reached over a back-edge
//! drops all incoming state instead of merging it. State also never
//! crosses an edge that enters or leaves a loop ([`CfgOrder::same_loops`]),
//! so a pair is only ever matched between blocks of the same loop
//! iteration, or between blocks outside every loop.
//!
//! # Trap blocks
//!
//! A block that only aborts is a leak sink. It is never scanned, tracks
//! nothing, and contributes nothing to its neighbours.
//!
//! # Pool boundaries
//!
//! A call to a configured pool-boundary primitive changes ownership in ways
//! the lattices do not model. It drops every tracked root in the current
//! direction.
//!
//! # References
//!
//! - LLVM: `lib/Transforms/ObjCARC/ObjCARCOpts.cpp`: `BBState`, `PtrState`
//! - Swift: `lib/SILOptimizer/ARC/`: `ARCSequenceOpts`, `RefCountState`

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::alias::AliasOracle;
use crate::block_state::BlockState;
use crate::config::PairingConfig;
use crate::graph::{check_cfg, compute_predecessors, compute_successors, CfgOrder};
use crate::identity::RcIdentity;
use crate::ir::{ArcBlockId, ArcFunction, InsertPt, InstrRef};
use crate::problem::PairingProblem;
use crate::result::{PairingResult, RcMatch};
use crate::transition::{classify_param, RcTransition, RcTransitionKind};
use crate::visitor::{dispatch_instr, BottomUpDataflowVisitor, TopDownDataflowVisitor};

/// Analyze one function with the given oracle and configuration.
pub fn analyze_function(
    func: &ArcFunction,
    oracle: &dyn AliasOracle,
    config: &PairingConfig,
) -> PairingResult {
    RcDataflowEvaluator::new(func, oracle, config).run()
}

/// Analyze every function of a module, in parallel.
///
/// Functions are independent, so each one gets its own evaluator on a
/// rayon worker. Results come back in input order.
pub fn analyze_module(
    funcs: &[ArcFunction],
    oracle: &(dyn AliasOracle + Sync),
    config: &PairingConfig,
) -> Vec<PairingResult> {
    let results: Vec<PairingResult> = funcs
        .par_iter()
        .map(|func| analyze_function(func, oracle, config))
        .collect();

    let pairs: usize = results.iter().map(|r| r.matched_pairs().len()).sum();
    tracing::debug!(
        functions = funcs.len(),
        pairs,
        "analyzed module for RC pairs",
    );

    results
}

/// Dataflow state for one analysis run over one function.
///
/// Everything derived from the CFG (orders, back-edges, neighbour lists,
/// root identities) is computed once in [`new`](Self::new) and reused by
/// every pass and every re-run.
pub struct RcDataflowEvaluator<'a> {
    func: &'a ArcFunction,
    oracle: &'a dyn AliasOracle,
    config: &'a PairingConfig,
    identity: RcIdentity,
    order: CfgOrder,
    predecessors: Vec<Vec<usize>>,
    successors: Vec<SmallVec<[usize; 4]>>,
    block_states: Vec<BlockState>,
    dec_to_inc: FxHashMap<InstrRef, RcMatch>,
    inc_to_dec: FxHashMap<InstrRef, RcMatch>,
    /// Structural problems, found once in `new`.
    cfg_problems: Vec<PairingProblem>,
    /// Problems found while matching; reset by `clear`.
    match_problems: Vec<PairingProblem>,
}

impl<'a> RcDataflowEvaluator<'a> {
    pub fn new(
        func: &'a ArcFunction,
        oracle: &'a dyn AliasOracle,
        config: &'a PairingConfig,
    ) -> Self {
        let cfg_problems = check_cfg(func);
        for problem in &cfg_problems {
            tracing::debug!(function = func.name.raw(), %problem, "malformed CFG");
        }

        Self {
            func,
            oracle,
            config,
            identity: RcIdentity::compute(func),
            order: CfgOrder::compute(func),
            predecessors: compute_predecessors(func),
            successors: compute_successors(func),
            block_states: func
                .blocks
                .iter()
                .map(|block| BlockState::new(block, config))
                .collect(),
            dec_to_inc: FxHashMap::default(),
            inc_to_dec: FxHashMap::default(),
            cfg_problems,
            match_problems: Vec::new(),
        }
    }

    /// Reset all block state and results, keeping the CFG facts.
    pub fn clear(&mut self) {
        for state in &mut self.block_states {
            state.clear();
        }
        self.dec_to_inc.clear();
        self.inc_to_dec.clear();
        self.match_problems.clear();
    }

    /// Run the enabled passes from a clean state and hand back the result.
    pub fn run(&mut self) -> PairingResult {
        self.clear();
        if self.config.top_down {
            self.run_top_down();
        }
        if self.config.bottom_up {
            self.run_bottom_up();
        }
        let result = self.take_result();

        let stats = result.stats();
        tracing::debug!(
            function = self.func.name.raw(),
            top_down = stats.top_down_pairs,
            bottom_up = stats.bottom_up_pairs,
            known_safe = stats.known_safe,
            partial = stats.partial,
            "paired RC operations",
        );

        result
    }

    /// Move the accumulated matches and problems out of the evaluator.
    pub fn take_result(&mut self) -> PairingResult {
        let mut problems = self.cfg_problems.clone();
        problems.append(&mut self.match_problems);
        PairingResult {
            function: Some(self.func.name),
            dec_to_inc: std::mem::take(&mut self.dec_to_inc),
            inc_to_dec: std::mem::take(&mut self.inc_to_dec),
            problems,
        }
    }

    /// State of `block` after the most recent passes: its exit state for
    /// top-down and its entry state for bottom-up.
    pub fn block_state(&self, block: ArcBlockId) -> Option<&BlockState> {
        self.block_states.get(block.index())
    }

    // Top-down

    /// Run the top-down pass, replacing earlier top-down results.
    pub fn run_top_down(&mut self) {
        self.dec_to_inc.clear();
        let rpo = self.order.reverse_postorder().to_vec();
        for block_idx in rpo {
            self.top_down_block(block_idx);
        }
    }

    fn top_down_block(&mut self, block_idx: usize) {
        let mut state = std::mem::take(&mut self.block_states[block_idx]);
        state.clear_top_down();

        if state.is_trap() {
            tracing::trace!(block = block_idx, "top-down: skipping trap block");
            self.block_states[block_idx] = state;
            return;
        }

        self.merge_predecessors(block_idx, &mut state);

        let is_entry = block_idx == self.func.entry.index();
        if is_entry && !self.has_live_predecessor(block_idx) {
            self.seed_entrances(&mut state);
        }

        let block = &self.func.blocks[block_idx];
        let block_id = ArcBlockId::from_index(block_idx);
        let mut visitor = TopDownDataflowVisitor::new(
            state.top_down_mut(),
            self.oracle,
            &self.identity,
            &mut self.dec_to_inc,
            &mut self.match_problems,
        );

        for (i, instr) in block.body.iter().enumerate() {
            let at = InstrRef::new(block_id, i);
            if self.config.is_pool_boundary(instr) {
                tracing::trace!(%at, "top-down: pool boundary, dropping all roots");
                visitor.clear_all();
                continue;
            }
            let visited = dispatch_instr(&mut visitor, at, instr);
            if visited.nesting_detected {
                tracing::trace!(%at, "top-down: nested increment is known safe");
            }
        }

        let before_terminator = InsertPt::before(InstrRef::new(block_id, block.body.len()));
        visitor.visit_terminator(before_terminator, &block.terminator);

        self.block_states[block_idx] = state;
    }

    /// Join the exit states of `block_idx`'s predecessors into `state`.
    fn merge_predecessors(&self, block_idx: usize, state: &mut BlockState) {
        let mut seeded = false;
        for &pred in &self.predecessors[block_idx] {
            if !self.order.is_reachable(pred) {
                continue;
            }
            if self.order.is_back_edge(pred, block_idx) {
                tracing::trace!(
                    block = block_idx,
                    pred,
                    "top-down: back-edge, dropping incoming state",
                );
                state.clear_top_down();
                return;
            }
            let pred_state = &self.block_states[pred];
            if pred_state.is_trap() {
                continue;
            }
            if !self.order.same_loops(pred, block_idx) {
                tracing::trace!(
                    block = block_idx,
                    pred,
                    "top-down: loop boundary, dropping incoming state",
                );
                state.clear_top_down();
                return;
            }
            if seeded {
                state.merge_top_down(pred_state);
            } else {
                state.init_top_down(pred_state);
                seeded = true;
            }
        }
    }

    fn has_live_predecessor(&self, block_idx: usize) -> bool {
        self.predecessors[block_idx]
            .iter()
            .any(|&pred| self.order.is_reachable(pred))
    }

    /// Owned reference parameters arrive already incremented.
    fn seed_entrances(&self, state: &mut BlockState) {
        for param in &self.func.params {
            let class = self.func.var_class(param.var);
            if classify_param(param, class) != RcTransitionKind::StrongEntrance {
                continue;
            }
            let root = self.identity.root(param.var);
            state
                .top_down_mut()
                .entry(root)
                .or_default()
                .init_with_mutator(RcTransition::entrance());
        }
    }

    // Bottom-up

    /// Run the bottom-up pass, replacing earlier bottom-up results.
    pub fn run_bottom_up(&mut self) {
        self.inc_to_dec.clear();
        let postorder = self.order.postorder().to_vec();
        for block_idx in postorder {
            self.bottom_up_block(block_idx);
        }
    }

    fn bottom_up_block(&mut self, block_idx: usize) {
        let mut state = std::mem::take(&mut self.block_states[block_idx]);
        state.clear_bottom_up();

        if state.is_trap() {
            tracing::trace!(block = block_idx, "bottom-up: skipping trap block");
            self.block_states[block_idx] = state;
            return;
        }

        self.merge_successors(block_idx, &mut state);

        let block = &self.func.blocks[block_idx];
        let block_id = ArcBlockId::from_index(block_idx);
        let successor_starts: SmallVec<[InsertPt; 4]> = self.successors[block_idx]
            .iter()
            .map(|&succ| InsertPt::block_start(ArcBlockId::from_index(succ)))
            .collect();
        let mut visitor = BottomUpDataflowVisitor::new(
            state.bottom_up_mut(),
            self.oracle,
            &self.identity,
            &mut self.inc_to_dec,
            &mut self.match_problems,
        );

        visitor.visit_terminator(&successor_starts, &block.terminator);

        for (i, instr) in block.body.iter().enumerate().rev() {
            let at = InstrRef::new(block_id, i);
            if self.config.is_pool_boundary(instr) {
                tracing::trace!(%at, "bottom-up: pool boundary, dropping all roots");
                visitor.clear_all();
                continue;
            }
            let visited = dispatch_instr(&mut visitor, at, instr);
            if visited.nesting_detected {
                tracing::trace!(%at, "bottom-up: nested decrement is known safe");
            }
        }

        self.block_states[block_idx] = state;
    }

    /// Join the entry states of `block_idx`'s successors into `state`.
    fn merge_successors(&self, block_idx: usize, state: &mut BlockState) {
        let mut seeded = false;
        for &succ in &self.successors[block_idx] {
            if self.order.is_back_edge(block_idx, succ) {
                tracing::trace!(
                    block = block_idx,
                    succ,
                    "bottom-up: back-edge, dropping incoming state",
                );
                state.clear_bottom_up();
                return;
            }
            let succ_state = &self.block_states[succ];
            if succ_state.is_trap() {
                continue;
            }
            if !self.order.same_loops(block_idx, succ) {
                tracing::trace!(
                    block = block_idx,
                    succ,
                    "bottom-up: loop boundary, dropping incoming state",
                );
                state.clear_bottom_up();
                return;
            }
            if seeded {
                state.merge_bottom_up(succ_state);
            } else {
                state.init_bottom_up(succ_state);
                seeded = true;
            }
        }
    }
}

#[cfg(test)]
mod tests;
