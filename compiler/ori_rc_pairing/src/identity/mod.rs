//! RC identity: which variables name the same reference-counted object.
//!
//! `let y = x` and `let y = x as T` do not create objects; they give an
//! existing one a second name. Every variable is mapped to the variable at
//! the start of such a chain, its *root*, and state is tracked per root so
//! `RcInc(y); RcDec(x)` is seen as one object's increment and decrement.
//!
//! Each root also gets a coarse provenance ([`RootKind`]). A fresh
//! allocation cannot be any other root, and a function parameter cannot be
//! an object allocated inside the function. That is all the alias oracle
//! needs to rule out interference between unrelated roots.

use rustc_hash::FxHashMap;

use crate::ir::{ArcClass, ArcFunction, ArcInstr, ArcValue, ArcVarId};

/// Where a root's object comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RootKind {
    /// A function parameter.
    Param,
    /// The result of a `Construct` in this function.
    Fresh,
    /// Anything else: call results, projections, block parameters.
    Opaque,
}

/// Root and provenance for every variable of one function.
#[derive(Clone, Debug, Default)]
pub struct RcIdentity {
    /// `var → root` for variables that are not their own root.
    roots: FxHashMap<ArcVarId, ArcVarId>,
    kinds: FxHashMap<ArcVarId, RootKind>,
    var_classes: Vec<ArcClass>,
}

impl RcIdentity {
    /// Resolve roots for every variable defined in `func`.
    pub fn compute(func: &ArcFunction) -> Self {
        let mut copy_of: FxHashMap<ArcVarId, ArcVarId> = FxHashMap::default();
        let mut kinds: FxHashMap<ArcVarId, RootKind> = FxHashMap::default();

        for param in &func.params {
            kinds.insert(param.var, RootKind::Param);
        }

        for block in &func.blocks {
            for instr in &block.body {
                match instr {
                    ArcInstr::Let {
                        dst,
                        value: ArcValue::Var(src),
                    }
                    | ArcInstr::Cast { dst, value: src } => {
                        copy_of.insert(*dst, *src);
                    }
                    ArcInstr::Construct { dst, .. } => {
                        kinds.insert(*dst, RootKind::Fresh);
                    }
                    _ => {}
                }
            }
        }

        // Chains may be listed in any block order, so resolve after the
        // scan. A malformed cycle stops at the step limit.
        let max_steps = copy_of.len();
        let roots = copy_of
            .keys()
            .map(|&var| {
                let mut root = var;
                for _ in 0..=max_steps {
                    match copy_of.get(&root) {
                        Some(&src) if src != var => root = src,
                        _ => break,
                    }
                }
                (var, root)
            })
            .filter(|&(var, root)| var != root)
            .collect();

        Self {
            roots,
            kinds,
            var_classes: func.var_classes.clone(),
        }
    }

    /// The canonical root of `var`.
    #[inline]
    pub fn root(&self, var: ArcVarId) -> ArcVarId {
        self.roots.get(&var).copied().unwrap_or(var)
    }

    /// Provenance of `root`. Non-roots report their root's provenance.
    pub fn root_kind(&self, var: ArcVarId) -> RootKind {
        self.kinds
            .get(&self.root(var))
            .copied()
            .unwrap_or(RootKind::Opaque)
    }

    /// Can `var` name a reference-counted object?
    #[inline]
    pub fn is_rc(&self, var: ArcVarId) -> bool {
        self.var_classes
            .get(var.index())
            .copied()
            .unwrap_or(ArcClass::PossibleRef)
            .needs_rc()
    }

    /// Might `a` and `b` name the same object?
    ///
    /// Scalars alias nothing. Equal roots always alias. Distinct roots are
    /// kept apart only when provenance proves it.
    pub fn may_alias(&self, a: ArcVarId, b: ArcVarId) -> bool {
        if !self.is_rc(a) || !self.is_rc(b) {
            return false;
        }
        let (root_a, root_b) = (self.root(a), self.root(b));
        if root_a == root_b {
            return true;
        }
        !matches!(
            (self.root_kind(root_a), self.root_kind(root_b)),
            (RootKind::Fresh, RootKind::Fresh | RootKind::Param)
                | (RootKind::Param, RootKind::Fresh)
        )
    }
}
