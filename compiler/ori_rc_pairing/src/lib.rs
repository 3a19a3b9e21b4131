//! Retain/release pairing analysis for the Ori compiler's ARC IR.
//!
//! RC insertion emits far more `RcInc`/`RcDec` operations than a program
//! needs. This crate finds increment/decrement pairs on the same object
//! that a later rewrite may delete outright or move closer together, and
//! records the evidence the rewrite needs to do so safely:
//!
//! - **Transitions** ([`RcTransitionKind`]): which instructions start or
//!   close a pairing sequence.
//! - **Per-root state** ([`RefCountState`]): two lattices, one per scan
//!   direction, tracking how far a root has progressed toward a match.
//! - **Per-block state** ([`BlockState`]): a root → state map per direction,
//!   merged at CFG joins, with trap-block detection.
//! - **Evaluator** ([`RcDataflowEvaluator`]): the top-down pass over reverse
//!   post-order and the bottom-up pass over post-order.
//!
//! The analysis never mutates the IR. It produces a [`PairingResult`] with
//! one map per direction: decrement → matched increments (top-down) and
//! increment → matched decrements (bottom-up).
//!
//! # Soundness
//!
//! Every imprecise spot falls back to "stop tracking this root": loop
//! back-edges, pool-boundary calls, trap blocks, mismatched merges. That
//! can only lose pairs. Whether an arbitrary instruction touches a root is
//! left to an [`AliasOracle`], whose answers are trusted as conservative.
//!
//! # Crate Dependencies
//!
//! Self-contained: the ARC IR surface in [`ir`] is the subset of the
//! compiler's ARC IR the analysis reads. No LLVM dependency.

pub mod alias;
pub mod block_state;
pub mod config;
pub mod evaluator;
pub mod graph;
pub mod identity;
pub mod ir;
pub mod problem;
pub mod result;
pub mod state;
pub mod transition;
pub mod visitor;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use alias::{AliasOracle, ConservativeAlias};
pub use block_state::{is_trap_block, BlockState};
pub use config::PairingConfig;
pub use evaluator::{analyze_function, analyze_module, RcDataflowEvaluator};
pub use graph::{check_cfg, CfgOrder};
pub use identity::{RcIdentity, RootKind};
pub use ir::{
    ArcBlock, ArcBlockId, ArcClass, ArcFunction, ArcInstr, ArcParam, ArcTerminator, ArcValue,
    ArcVarId, CtorKind, InsertPt, InstrRef, LitValue, Name, Ownership, PrimOp,
};
pub use problem::PairingProblem;
pub use result::{PairingResult, PairingStats, RcMatch, RcPairSet};
pub use state::{
    BottomUpLattice, BottomUpRefCountState, RcLattice, RefCountState, TopDownLattice,
    TopDownRefCountState,
};
pub use transition::{classify_instr, classify_param, RcTransition, RcTransitionKind};
pub use visitor::{
    dispatch_instr, BottomUpDataflowVisitor, DataflowVisitResult, RcInstVisitor,
    TopDownDataflowVisitor,
};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with
/// `RUST_LOG=ori_rc_pairing=debug` or `RUST_LOG=ori_rc_pairing=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .try_init();
        }
    });
}
