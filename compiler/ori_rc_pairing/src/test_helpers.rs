//! Shared test utilities for the pairing analysis.
//!
//! Factory functions for building small ARC IR functions by hand. Only
//! compiled in test builds.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::{
    ArcBlock, ArcBlockId, ArcClass, ArcFunction, ArcInstr, ArcParam, ArcTerminator, ArcVarId,
    CtorKind, Name, Ownership,
};
use crate::result::PairingResult;

/// Shorthand for `ArcVarId::new(n)`.
pub(crate) fn v(n: u32) -> ArcVarId {
    ArcVarId::new(n)
}

/// Shorthand for `ArcBlockId::new(n)`.
pub(crate) fn b(n: u32) -> ArcBlockId {
    ArcBlockId::new(n)
}

/// Name of the abort primitive used by trap-block tests.
pub(crate) const ABORT: Name = Name::from_raw(900);

/// Name of the pool-boundary primitive used by evaluator tests.
pub(crate) const POOL_BOUNDARY: Name = Name::from_raw(901);

/// Build a minimal `ArcFunction` with a default name (`Name::from_raw(1)`).
pub(crate) fn make_func(
    params: Vec<ArcParam>,
    blocks: Vec<ArcBlock>,
    var_classes: Vec<ArcClass>,
) -> ArcFunction {
    ArcFunction {
        name: Name::from_raw(1),
        params,
        blocks,
        entry: ArcBlockId::new(0),
        var_classes,
    }
}

/// `n` reference-class variables.
pub(crate) fn refs(n: usize) -> Vec<ArcClass> {
    vec![ArcClass::DefiniteRef; n]
}

/// Create an owned parameter.
pub(crate) fn owned_param(var: u32) -> ArcParam {
    ArcParam {
        var: ArcVarId::new(var),
        ownership: Ownership::Owned,
    }
}

/// Create a borrowed parameter.
pub(crate) fn borrowed_param(var: u32) -> ArcParam {
    ArcParam {
        var: ArcVarId::new(var),
        ownership: Ownership::Borrowed,
    }
}

/// Build a block without parameters.
pub(crate) fn block(id: u32, body: Vec<ArcInstr>, terminator: ArcTerminator) -> ArcBlock {
    ArcBlock {
        id: b(id),
        params: vec![],
        body,
        terminator,
    }
}

/// `RcInc(var)` with count 1.
pub(crate) fn inc(var: u32) -> ArcInstr {
    ArcInstr::RcInc {
        var: v(var),
        count: 1,
    }
}

/// `RcDec(var)`.
pub(crate) fn dec(var: u32) -> ArcInstr {
    ArcInstr::RcDec { var: v(var) }
}

/// A plain read of `var` that cannot decrement anything: `dst = var.0`.
pub(crate) fn read(dst: u32, var: u32) -> ArcInstr {
    ArcInstr::Project {
        dst: v(dst),
        value: v(var),
        field: 0,
    }
}

/// A direct call `dst = f(args...)`.
pub(crate) fn call(dst: u32, func: u32, args: &[u32]) -> ArcInstr {
    ArcInstr::Apply {
        dst: v(dst),
        func: Name::from_raw(func),
        args: args.iter().map(|&a| v(a)).collect(),
    }
}

/// A fresh allocation `dst = Tuple(args...)`.
pub(crate) fn alloc(dst: u32, args: &[u32]) -> ArcInstr {
    ArcInstr::Construct {
        dst: v(dst),
        ctor: CtorKind::Tuple,
        args: args.iter().map(|&a| v(a)).collect(),
    }
}

/// `Jump` without arguments.
pub(crate) fn jump(target: u32) -> ArcTerminator {
    ArcTerminator::Jump {
        target: b(target),
        args: vec![],
    }
}

/// `Branch` on `cond`.
pub(crate) fn branch(cond: u32, then_block: u32, else_block: u32) -> ArcTerminator {
    ArcTerminator::Branch {
        cond: v(cond),
        then_block: b(then_block),
        else_block: b(else_block),
    }
}

/// `Return` of `var`.
pub(crate) fn ret(var: u32) -> ArcTerminator {
    ArcTerminator::Return { value: v(var) }
}

/// A trap block: `abort(); unreachable`.
pub(crate) fn trap_block(id: u32, dst: u32) -> ArcBlock {
    block(
        id,
        vec![ArcInstr::Apply {
            dst: v(dst),
            func: ABORT,
            args: vec![],
        }],
        ArcTerminator::Unreachable,
    )
}

/// Physically delete every top-down pair reported by `result`, standing in
/// for the rewrite stage.
///
/// Entrance matches pair a decrement with no instruction and are left alone.
pub(crate) fn remove_matched_pairs(func: &mut ArcFunction, result: &PairingResult) {
    let mut removals: FxHashMap<usize, FxHashSet<usize>> = FxHashMap::default();
    for (dec_at, m) in result.dec_to_inc() {
        if m.mutators.is_empty() {
            continue;
        }
        removals
            .entry(dec_at.block.index())
            .or_default()
            .insert(dec_at.index as usize);
        for inc_at in &m.mutators {
            removals
                .entry(inc_at.block.index())
                .or_default()
                .insert(inc_at.index as usize);
        }
    }

    for (&block_idx, remove_set) in &removals {
        let block = &mut func.blocks[block_idx];
        let old_body = std::mem::take(&mut block.body);
        block.body = old_body
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !remove_set.contains(i))
            .map(|(_, instr)| instr)
            .collect();
    }
}

/// Count `RcInc`/`RcDec` instructions across the function.
pub(crate) fn count_rc_ops(func: &ArcFunction) -> usize {
    func.blocks
        .iter()
        .flat_map(|bl| bl.body.iter())
        .filter(|i| matches!(i, ArcInstr::RcInc { .. } | ArcInstr::RcDec { .. }))
        .count()
}
