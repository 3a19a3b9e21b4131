//! CFG utilities for the pairing analysis.
//!
//! Both dataflow directions need the same facts about a function's control
//! flow: a visiting order, which edges close loops, which blocks each loop
//! contains, and which blocks are reachable at all. [`CfgOrder`] computes
//! them once so the evaluator can cache them for the whole run.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{smallvec, SmallVec};

use crate::ir::{ArcBlockId, ArcFunction, ArcTerminator};
use crate::problem::PairingProblem;

/// Compute the predecessor list for each block (deduplicated).
///
/// Returns a vector indexed by block index, where each entry is the
/// list of distinct predecessor block indices. Edges to out-of-range
/// blocks are dropped.
pub(crate) fn compute_predecessors(func: &ArcFunction) -> Vec<Vec<usize>> {
    let num_blocks = func.blocks.len();
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); num_blocks];

    for (block_idx, block) in func.blocks.iter().enumerate() {
        let mut seen = FxHashSet::default();
        for succ_id in successor_block_ids(&block.terminator) {
            let succ_idx = succ_id.index();
            if succ_idx < num_blocks && seen.insert(succ_idx) {
                predecessors[succ_idx].push(block_idx);
            }
        }
    }

    predecessors
}

/// Compute the successor list for each block (deduplicated, in range).
pub(crate) fn compute_successors(func: &ArcFunction) -> Vec<SmallVec<[usize; 4]>> {
    let num_blocks = func.blocks.len();
    func.blocks
        .iter()
        .map(|block| {
            let mut succs: SmallVec<[usize; 4]> = SmallVec::new();
            for succ_id in successor_block_ids(&block.terminator) {
                let succ_idx = succ_id.index();
                if succ_idx < num_blocks && !succs.contains(&succ_idx) {
                    succs.push(succ_idx);
                }
            }
            succs
        })
        .collect()
}

/// Extract successor block IDs from a terminator.
///
/// Returns `SmallVec<[ArcBlockId; 4]>` to avoid heap allocation for the
/// common case (max 2 successors except Switch with many cases).
pub(crate) fn successor_block_ids(terminator: &ArcTerminator) -> SmallVec<[ArcBlockId; 4]> {
    match terminator {
        ArcTerminator::Return { .. } | ArcTerminator::Resume | ArcTerminator::Unreachable => {
            SmallVec::new()
        }
        ArcTerminator::Jump { target, .. } => smallvec![*target],
        ArcTerminator::Branch {
            then_block,
            else_block,
            ..
        } => smallvec![*then_block, *else_block],
        ArcTerminator::Switch { cases, default, .. } => {
            let mut targets = SmallVec::with_capacity(cases.len() + 1);
            for &(_, b) in cases {
                targets.push(b);
            }
            targets.push(*default);
            targets
        }
        ArcTerminator::Invoke { normal, unwind, .. } => smallvec![*normal, *unwind],
    }
}

/// Check the structural assumptions the analysis relies on.
///
/// Returns one problem per defect. None of them are fatal: dangling edges
/// are ignored by every traversal, and a function whose entry is out of
/// range is simply not analyzed.
pub fn check_cfg(func: &ArcFunction) -> Vec<PairingProblem> {
    let num_blocks = func.blocks.len();
    let mut problems = Vec::new();

    if func.entry.index() >= num_blocks {
        problems.push(PairingProblem::EntryOutOfRange {
            entry: func.entry,
            num_blocks,
        });
    }

    for (block_idx, block) in func.blocks.iter().enumerate() {
        if block.id.index() != block_idx {
            problems.push(PairingProblem::BlockIdMismatch {
                position: block_idx,
                id: block.id,
            });
        }
        for succ_id in successor_block_ids(&block.terminator) {
            if succ_id.index() >= num_blocks {
                problems.push(PairingProblem::DanglingSuccessor {
                    block: ArcBlockId::from_index(block_idx),
                    target: succ_id,
                });
            }
        }
    }

    problems
}

/// Loop headers whose loop contains each block, sorted by index.
///
/// The loop of header `h` is `h` plus every block reachable from `h` that
/// reaches one of `h`'s latches without passing through `h`. Only blocks
/// reachable from `h` count, so a second entry into an irreducible cycle
/// stays outside the loop.
fn loop_membership(
    successors: &[SmallVec<[usize; 4]>],
    back_edges: &FxHashSet<(usize, usize)>,
) -> Vec<SmallVec<[usize; 2]>> {
    let num_blocks = successors.len();
    let mut predecessors: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); num_blocks];
    for (block_idx, succs) in successors.iter().enumerate() {
        for &succ in succs {
            predecessors[succ].push(block_idx);
        }
    }

    let mut latches: FxHashMap<usize, SmallVec<[usize; 2]>> = FxHashMap::default();
    for &(latch, header) in back_edges {
        latches.entry(header).or_default().push(latch);
    }
    let mut headers: Vec<usize> = latches.keys().copied().collect();
    headers.sort_unstable();

    let mut membership: Vec<SmallVec<[usize; 2]>> = vec![SmallVec::new(); num_blocks];
    for header in headers {
        let from_header = reachable_from(successors, header);
        let mut in_loop = vec![false; num_blocks];
        in_loop[header] = true;

        let mut work: Vec<usize> = latches[&header].to_vec();
        while let Some(block_idx) = work.pop() {
            if in_loop[block_idx] || !from_header[block_idx] {
                continue;
            }
            in_loop[block_idx] = true;
            work.extend(predecessors[block_idx].iter().copied());
        }

        for (block_idx, &inside) in in_loop.iter().enumerate() {
            if inside {
                membership[block_idx].push(header);
            }
        }
    }

    membership
}

fn reachable_from(successors: &[SmallVec<[usize; 4]>], start: usize) -> Vec<bool> {
    let mut seen = vec![false; successors.len()];
    let mut work = vec![start];
    seen[start] = true;
    while let Some(block_idx) = work.pop() {
        for &succ in &successors[block_idx] {
            if !seen[succ] {
                seen[succ] = true;
                work.push(succ);
            }
        }
    }
    seen
}

/// Visiting orders and loop structure for one function.
///
/// Computed once per analysis run by an iterative DFS from the entry
/// block. An edge `u → s` is a back-edge when `s` is still on the DFS
/// stack while `u` is being expanded, i.e. `s` is an ancestor of `u`.
/// Blocks the DFS never reaches are absent from both orders.
///
/// Every cycle contains a back-edge, and every block on that cycle lies in
/// the loop of the back-edge's target. So an edge between blocks with the
/// same [`loop_headers`](Self::loop_headers) never enters or leaves a loop.
#[derive(Clone, Debug, Default)]
pub struct CfgOrder {
    postorder: Vec<usize>,
    reverse_postorder: Vec<usize>,
    back_edges: FxHashSet<(usize, usize)>,
    loops: Vec<SmallVec<[usize; 2]>>,
    reachable: Vec<bool>,
}

impl CfgOrder {
    /// Walk the CFG of `func` from its entry block.
    pub fn compute(func: &ArcFunction) -> Self {
        let num_blocks = func.blocks.len();
        let entry = func.entry.index();
        if entry >= num_blocks {
            return Self {
                reachable: vec![false; num_blocks],
                ..Self::default()
            };
        }

        let successors = compute_successors(func);
        let mut visited = vec![false; num_blocks];
        let mut on_stack = vec![false; num_blocks];
        let mut postorder = Vec::with_capacity(num_blocks);
        let mut back_edges = FxHashSet::default();

        // Stack entries: (block_index, next successor position to expand).
        let mut stack: Vec<(usize, usize)> = vec![(entry, 0)];
        visited[entry] = true;
        on_stack[entry] = true;

        while let Some(&mut (block_idx, ref mut next)) = stack.last_mut() {
            let succs = &successors[block_idx];
            if *next < succs.len() {
                let succ_idx = succs[*next];
                *next += 1;
                if on_stack[succ_idx] {
                    back_edges.insert((block_idx, succ_idx));
                } else if !visited[succ_idx] {
                    visited[succ_idx] = true;
                    on_stack[succ_idx] = true;
                    stack.push((succ_idx, 0));
                }
                continue;
            }

            on_stack[block_idx] = false;
            postorder.push(block_idx);
            stack.pop();
        }

        let mut reverse_postorder = postorder.clone();
        reverse_postorder.reverse();
        let loops = loop_membership(&successors, &back_edges);

        Self {
            postorder,
            reverse_postorder,
            back_edges,
            loops,
            reachable: visited,
        }
    }

    /// Reachable blocks, every block after all of its DFS descendants.
    pub fn postorder(&self) -> &[usize] {
        &self.postorder
    }

    /// Reachable blocks, every block before its successors except along back-edges.
    pub fn reverse_postorder(&self) -> &[usize] {
        &self.reverse_postorder
    }

    /// Is `from → to` a loop-closing edge?
    pub fn is_back_edge(&self, from: usize, to: usize) -> bool {
        self.back_edges.contains(&(from, to))
    }

    /// Number of loop-closing edges found by the walk.
    pub fn num_back_edges(&self) -> usize {
        self.back_edges.len()
    }

    /// Headers of the loops containing `block`, sorted by index.
    pub fn loop_headers(&self, block: usize) -> &[usize] {
        self.loops
            .get(block)
            .map(SmallVec::as_slice)
            .unwrap_or_default()
    }

    /// Do `a` and `b` sit in exactly the same loops?
    ///
    /// State carried along an edge between blocks that differ here would
    /// pair an operation run once per iteration with one run once per
    /// loop entry.
    pub fn same_loops(&self, a: usize, b: usize) -> bool {
        self.loop_headers(a) == self.loop_headers(b)
    }

    /// Was `block` reached from the entry block?
    pub fn is_reachable(&self, block: usize) -> bool {
        self.reachable.get(block).copied().unwrap_or(false)
    }
}
