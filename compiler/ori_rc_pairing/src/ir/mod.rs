//! ARC IR: the basic-block representation the pairing analysis reads.
//!
//! The analysis never mutates the IR; it only walks blocks, classifies
//! instructions, and reports positions. The shape follows the ARC IR used
//! by the rest of the ARC pipeline (LLVM-style basic blocks with block
//! parameters in place of phi nodes):
//!
//! - **[`ArcFunction`]**: parameters, blocks, per-variable [`ArcClass`]
//! - **[`ArcBlock`]**: parameters, body instructions, terminator
//! - **[`ArcInstr`]**: a single instruction (let-binding, call, construct, RC op)
//! - **[`ArcTerminator`]**: block exit (return, jump, branch, switch)
//!
//! Positions inside a function are addressed by [`InstrRef`] (an existing
//! instruction) and [`InsertPt`] (a slot between instructions).

use std::fmt;

// ── ID newtypes ─────────────────────────────────────────────────────

/// Variable ID within an ARC IR function.
///
/// Each `ArcVarId` identifies a unique SSA-like value within a single
/// [`ArcFunction`]. IDs are allocated sequentially starting from 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ArcVarId(u32);

impl ArcVarId {
    /// Create a new variable ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArcVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Basic block ID within an ARC IR function.
///
/// `blocks[id.index()]` is the block with this ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ArcBlockId(u32);

impl ArcBlockId {
    /// Create a new block ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Build a block ID from a `usize` index.
    #[inline]
    pub(crate) fn from_index(idx: usize) -> Self {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "ARC IR block counts fit in u32"
        )]
        let raw = idx as u32;
        Self(raw)
    }
}

impl fmt::Display for ArcBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Interned symbol for function names (callees, closures, the function itself).
///
/// The host compiler owns the interner; the analysis only compares names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Create a name from its raw interned index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw interned index.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

// ── Classification ──────────────────────────────────────────────────

/// ARC classification of a variable's type.
///
/// Only non-scalar variables can be roots of reference-count tracking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArcClass {
    /// No reference counting needed. The value is purely stack/register.
    Scalar,
    /// Definitely contains a reference-counted heap pointer.
    DefiniteRef,
    /// Might contain a reference-counted pointer; treated as a reference.
    PossibleRef,
}

impl ArcClass {
    /// Returns `true` if values of this class might need reference counting.
    #[inline]
    pub fn needs_rc(self) -> bool {
        self != ArcClass::Scalar
    }
}

/// Ownership of a function parameter.
///
/// An `Owned` parameter arrives already incremented: the callee holds a +1
/// obligation for it on entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The callee borrows the value and carries no RC obligation.
    Borrowed,
    /// The callee receives a +1 reference it must eventually release.
    Owned,
}

// ── Values ──────────────────────────────────────────────────────────

/// Literal value in the ARC IR.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LitValue {
    Int(i64),
    Bool(bool),
    Unit,
}

/// Primitive scalar operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimOp {
    Add,
    Sub,
    Eq,
    Lt,
    Not,
}

/// A value expression in the ARC IR (right-hand side of `Let`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArcValue {
    /// Reference to an existing variable (a copy of the same object).
    Var(ArcVarId),
    /// A literal constant.
    Literal(LitValue),
    /// A primitive operation over scalars.
    PrimOp { op: PrimOp, args: Vec<ArcVarId> },
}

/// The kind of constructor for a `Construct` instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CtorKind {
    /// Named struct.
    Struct(Name),
    /// Enum variant by index.
    EnumVariant { enum_name: Name, variant: u32 },
    /// Tuple.
    Tuple,
    /// List literal.
    ListLiteral,
    /// Closure capture: packages captured variables into a closure object.
    Closure { func: Name },
}

// ── Parameters ──────────────────────────────────────────────────────

/// A function parameter in the ARC IR, annotated with ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArcParam {
    /// The variable ID bound to this parameter.
    pub var: ArcVarId,
    /// Ownership annotation from borrow inference.
    pub ownership: Ownership,
}

// ── Instructions ────────────────────────────────────────────────────

/// A single instruction in an ARC IR basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArcInstr {
    /// Bind a value to a variable: `let dst = value`.
    Let { dst: ArcVarId, value: ArcValue },

    /// Reinterpreting view of an existing object: `let dst = value as T`.
    ///
    /// `dst` and `value` share one reference count.
    Cast { dst: ArcVarId, value: ArcVarId },

    /// Direct function call: `let dst = func(args...)`.
    Apply {
        dst: ArcVarId,
        func: Name,
        args: Vec<ArcVarId>,
    },

    /// Indirect call through a closure: `let dst = closure(args...)`.
    ApplyIndirect {
        dst: ArcVarId,
        closure: ArcVarId,
        args: Vec<ArcVarId>,
    },

    /// Field projection: `let dst = value.field`.
    Project {
        dst: ArcVarId,
        value: ArcVarId,
        field: u32,
    },

    /// Constructor application: `let dst = ctor(args...)`.
    Construct {
        dst: ArcVarId,
        ctor: CtorKind,
        args: Vec<ArcVarId>,
    },

    /// In-place field update: `base.field = value`. Releases the old field.
    Set {
        base: ArcVarId,
        field: u32,
        value: ArcVarId,
    },

    /// Increment reference count. `count > 1` is a batched increment.
    RcInc { var: ArcVarId, count: u32 },

    /// Decrement reference count and free if zero.
    RcDec { var: ArcVarId },
}

impl ArcInstr {
    /// Returns the variable defined (written) by this instruction, if any.
    pub fn defined_var(&self) -> Option<ArcVarId> {
        match self {
            ArcInstr::Let { dst, .. }
            | ArcInstr::Cast { dst, .. }
            | ArcInstr::Apply { dst, .. }
            | ArcInstr::ApplyIndirect { dst, .. }
            | ArcInstr::Project { dst, .. }
            | ArcInstr::Construct { dst, .. } => Some(*dst),

            ArcInstr::Set { .. } | ArcInstr::RcInc { .. } | ArcInstr::RcDec { .. } => None,
        }
    }

    /// Returns all variables read (used) by this instruction.
    ///
    /// The `dst` of value-producing instructions is NOT included.
    pub fn used_vars(&self) -> Vec<ArcVarId> {
        match self {
            ArcInstr::Let { value, .. } => match value {
                ArcValue::Var(v) => vec![*v],
                ArcValue::Literal(_) => vec![],
                ArcValue::PrimOp { args, .. } => args.clone(),
            },

            ArcInstr::Apply { args, .. } | ArcInstr::Construct { args, .. } => args.clone(),

            ArcInstr::ApplyIndirect { closure, args, .. } => {
                let mut vars = Vec::with_capacity(1 + args.len());
                vars.push(*closure);
                vars.extend_from_slice(args);
                vars
            }

            ArcInstr::Cast { value, .. } | ArcInstr::Project { value, .. } => vec![*value],

            ArcInstr::RcInc { var, .. } | ArcInstr::RcDec { var } => vec![*var],

            ArcInstr::Set { base, value, .. } => vec![*base, *value],
        }
    }

    /// Returns `true` if this instruction transfers control to a callee.
    pub fn is_call(&self) -> bool {
        matches!(self, ArcInstr::Apply { .. } | ArcInstr::ApplyIndirect { .. })
    }
}

// ── Terminators ─────────────────────────────────────────────────────

/// Block terminator: how control leaves a basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArcTerminator {
    /// Return a value from the function (transfers ownership to the caller).
    Return { value: ArcVarId },

    /// Unconditional jump to a target block, passing arguments.
    Jump {
        target: ArcBlockId,
        args: Vec<ArcVarId>,
    },

    /// Conditional branch on a boolean.
    Branch {
        cond: ArcVarId,
        then_block: ArcBlockId,
        else_block: ArcBlockId,
    },

    /// Multi-way branch on an integer discriminant.
    Switch {
        scrutinee: ArcVarId,
        cases: Vec<(u64, ArcBlockId)>,
        default: ArcBlockId,
    },

    /// Call that may unwind. On success, jumps to `normal`; on unwind,
    /// jumps to `unwind`.
    Invoke {
        dst: ArcVarId,
        func: Name,
        args: Vec<ArcVarId>,
        normal: ArcBlockId,
        unwind: ArcBlockId,
    },

    /// Resume unwinding.
    Resume,

    /// Marks a block as unreachable (e.g., after a call that aborts).
    Unreachable,
}

impl ArcTerminator {
    /// Returns all variables read (used) by this terminator.
    pub fn used_vars(&self) -> Vec<ArcVarId> {
        match self {
            ArcTerminator::Return { value } => vec![*value],
            ArcTerminator::Jump { args, .. } | ArcTerminator::Invoke { args, .. } => args.clone(),
            ArcTerminator::Branch { cond, .. } => vec![*cond],
            ArcTerminator::Switch { scrutinee, .. } => vec![*scrutinee],
            ArcTerminator::Resume | ArcTerminator::Unreachable => vec![],
        }
    }

    /// Variables whose ownership leaves the block through this terminator.
    ///
    /// `Return` hands its value to the caller, `Jump` hands its arguments to
    /// the target's block parameters, and `Invoke` hands its arguments to
    /// the callee. Branch conditions and switch scrutinees are plain reads.
    pub fn transferred_vars(&self) -> Vec<ArcVarId> {
        match self {
            ArcTerminator::Return { value } => vec![*value],
            ArcTerminator::Jump { args, .. } | ArcTerminator::Invoke { args, .. } => args.clone(),
            ArcTerminator::Branch { .. }
            | ArcTerminator::Switch { .. }
            | ArcTerminator::Resume
            | ArcTerminator::Unreachable => vec![],
        }
    }
}

// ── Blocks ──────────────────────────────────────────────────────────

/// A basic block in the ARC IR.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArcBlock {
    /// This block's identifier.
    pub id: ArcBlockId,
    /// Block parameters: values passed from predecessor blocks via `Jump`.
    pub params: Vec<ArcVarId>,
    /// Sequential instructions executed in order.
    pub body: Vec<ArcInstr>,
    /// How control leaves this block.
    pub terminator: ArcTerminator,
}

// ── Functions ───────────────────────────────────────────────────────

/// A complete function in the ARC IR.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArcFunction {
    /// The function's mangled name.
    pub name: Name,
    /// Function parameters with ownership annotations.
    pub params: Vec<ArcParam>,
    /// Basic blocks in definition order. `blocks[entry.index()]` is the entry.
    pub blocks: Vec<ArcBlock>,
    /// The entry block ID.
    pub entry: ArcBlockId,
    /// Classification of each variable, indexed by `ArcVarId::index()`.
    pub var_classes: Vec<ArcClass>,
}

impl ArcFunction {
    /// Look up the ARC class of a variable.
    ///
    /// Variables outside `var_classes` are treated as `PossibleRef`.
    #[inline]
    pub fn var_class(&self, var: ArcVarId) -> ArcClass {
        self.var_classes
            .get(var.index())
            .copied()
            .unwrap_or(ArcClass::PossibleRef)
    }

    /// Look up a block by ID.
    #[inline]
    pub fn block(&self, id: ArcBlockId) -> &ArcBlock {
        &self.blocks[id.index()]
    }

    /// Resolve an instruction reference, if it is in bounds.
    pub fn instr(&self, at: InstrRef) -> Option<&ArcInstr> {
        self.blocks
            .get(at.block.index())
            .and_then(|block| block.body.get(at.index as usize))
    }
}

// ── Positions ───────────────────────────────────────────────────────

/// Address of an instruction: block plus index into the block body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrRef {
    pub block: ArcBlockId,
    pub index: u32,
}

impl InstrRef {
    /// Create a reference to `block.body[index]`.
    #[inline]
    pub fn new(block: ArcBlockId, index: usize) -> Self {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "ARC IR block bodies fit in u32"
        )]
        let index = index as u32;
        Self { block, index }
    }
}

impl fmt::Display for InstrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.block, self.index)
    }
}

/// A slot between instructions where code could be placed.
///
/// `InsertPt { block, index }` means "before `block.body[index]`";
/// `index == body.len()` is the slot just before the terminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsertPt {
    pub block: ArcBlockId,
    pub index: u32,
}

impl InsertPt {
    /// The slot immediately before `at`.
    #[inline]
    pub fn before(at: InstrRef) -> Self {
        Self {
            block: at.block,
            index: at.index,
        }
    }

    /// The slot immediately after `at`.
    #[inline]
    pub fn after(at: InstrRef) -> Self {
        Self {
            block: at.block,
            index: at.index + 1,
        }
    }

    /// The first slot of `block`.
    #[inline]
    pub fn block_start(block: ArcBlockId) -> Self {
        Self { block, index: 0 }
    }
}
