//! Alias-analysis oracle consulted by the lattices.
//!
//! The dataflow never decides on its own whether an arbitrary instruction
//! touches a tracked root; it asks an [`AliasOracle`]. The evaluator only
//! asks when the root's current lattice state makes the answer matter, so
//! an expensive oracle is queried far less often than once per
//! instruction and root.
//!
//! [`ConservativeAlias`] is the default. It knows nothing about callees and
//! answers from operand roots and [`RootKind`](crate::identity::RootKind)
//! provenance only.

use crate::identity::RcIdentity;
use crate::ir::{ArcInstr, ArcTerminator, ArcVarId};

/// Answers "might this instruction use / decrement that root?".
///
/// Answers must be conservative: `false` only when the instruction
/// certainly does not. `root` is always a canonical root from `identity`.
pub trait AliasOracle {
    /// Might `instr` read the object `root` names (or anything reachable
    /// only through it)?
    fn may_use(&self, instr: &ArcInstr, root: ArcVarId, identity: &RcIdentity) -> bool;

    /// Might `instr` decrement the count of `root`'s object?
    fn may_decrement(&self, instr: &ArcInstr, root: ArcVarId, identity: &RcIdentity) -> bool;

    /// [`may_use`](Self::may_use) for a block terminator.
    fn terminator_may_use(
        &self,
        term: &ArcTerminator,
        root: ArcVarId,
        identity: &RcIdentity,
    ) -> bool;

    /// [`may_decrement`](Self::may_decrement) for a block terminator.
    fn terminator_may_decrement(
        &self,
        term: &ArcTerminator,
        root: ArcVarId,
        identity: &RcIdentity,
    ) -> bool;
}

/// Oracle that assumes the worst about anything it cannot see through.
///
/// - Calls use the root if they receive any reference at all, since the
///   callee may reach the root through the heap. Calls, `Set`, and every
///   `RcDec` of a reference may decrement it.
/// - Other instructions use the root only through an operand that may
///   alias it, and never decrement it.
/// - Ownership-transferring terminators (`Return`, `Jump` arguments) may
///   decrement any root they hand off; `Invoke` behaves like a call.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConservativeAlias;

impl ConservativeAlias {
    fn any_aliases(vars: &[ArcVarId], root: ArcVarId, identity: &RcIdentity) -> bool {
        vars.iter().any(|&var| identity.may_alias(var, root))
    }

    fn any_rc(vars: &[ArcVarId], identity: &RcIdentity) -> bool {
        vars.iter().any(|&var| identity.is_rc(var))
    }
}

impl AliasOracle for ConservativeAlias {
    fn may_use(&self, instr: &ArcInstr, root: ArcVarId, identity: &RcIdentity) -> bool {
        let used = instr.used_vars();
        if instr.is_call() {
            Self::any_rc(&used, identity)
        } else {
            Self::any_aliases(&used, root, identity)
        }
    }

    fn may_decrement(&self, instr: &ArcInstr, _root: ArcVarId, identity: &RcIdentity) -> bool {
        match instr {
            ArcInstr::RcDec { var } => identity.is_rc(*var),
            ArcInstr::Apply { .. } | ArcInstr::ApplyIndirect { .. } | ArcInstr::Set { .. } => true,
            ArcInstr::Let { .. }
            | ArcInstr::Cast { .. }
            | ArcInstr::Project { .. }
            | ArcInstr::Construct { .. }
            | ArcInstr::RcInc { .. } => false,
        }
    }

    fn terminator_may_use(
        &self,
        term: &ArcTerminator,
        root: ArcVarId,
        identity: &RcIdentity,
    ) -> bool {
        match term {
            ArcTerminator::Invoke { args, .. } => Self::any_rc(args, identity),
            _ => Self::any_aliases(&term.used_vars(), root, identity),
        }
    }

    fn terminator_may_decrement(
        &self,
        term: &ArcTerminator,
        root: ArcVarId,
        identity: &RcIdentity,
    ) -> bool {
        match term {
            ArcTerminator::Invoke { .. } => true,
            _ => Self::any_aliases(&term.transferred_vars(), root, identity),
        }
    }
}
