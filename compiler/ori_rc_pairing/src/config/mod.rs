//! Pairing analysis configuration.

use rustc_hash::FxHashSet;

use crate::ir::{ArcInstr, Name};

/// Configuration for one pairing run.
///
/// The host compiler tells the analysis which runtime primitives abort the
/// program (their blocks become trap blocks) and which ones open or close
/// an autorelease-style pool (all tracking is reset across them).
#[derive(Debug, Clone)]
pub struct PairingConfig {
    /// Functions that never return. A block that only calls one of these
    /// and then hits `Unreachable` is a trap block.
    pub abort_functions: FxHashSet<Name>,

    /// Functions that delimit a release pool.
    pub pool_boundary_functions: FxHashSet<Name>,

    /// Run the top-down pass.
    /// Default: `true`.
    pub top_down: bool,

    /// Run the bottom-up pass.
    /// Default: `true`.
    pub bottom_up: bool,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            abort_functions: FxHashSet::default(),
            pool_boundary_functions: FxHashSet::default(),
            top_down: true,
            bottom_up: true,
        }
    }
}

impl PairingConfig {
    /// Register an abort primitive (builder pattern).
    #[must_use]
    pub fn with_abort_function(mut self, func: Name) -> Self {
        self.abort_functions.insert(func);
        self
    }

    /// Register a pool-boundary primitive (builder pattern).
    #[must_use]
    pub fn with_pool_boundary_function(mut self, func: Name) -> Self {
        self.pool_boundary_functions.insert(func);
        self
    }

    /// Enable or disable the top-down pass (builder pattern).
    #[must_use]
    pub fn with_top_down(mut self, enable: bool) -> Self {
        self.top_down = enable;
        self
    }

    /// Enable or disable the bottom-up pass (builder pattern).
    #[must_use]
    pub fn with_bottom_up(mut self, enable: bool) -> Self {
        self.bottom_up = enable;
        self
    }

    /// Is `instr` a direct call to an abort primitive?
    pub fn is_abort_call(&self, instr: &ArcInstr) -> bool {
        matches!(instr, ArcInstr::Apply { func, .. } if self.abort_functions.contains(func))
    }

    /// Is `instr` a direct call to a pool-boundary primitive?
    pub fn is_pool_boundary(&self, instr: &ArcInstr) -> bool {
        matches!(
            instr,
            ArcInstr::Apply { func, .. } if self.pool_boundary_functions.contains(func)
        )
    }
}

#[cfg(test)]
mod tests;
