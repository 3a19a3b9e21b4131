use pretty_assertions::assert_eq;

use crate::alias::ConservativeAlias;
use crate::config::PairingConfig;
use crate::ir::{ArcClass, ArcFunction, InsertPt, InstrRef, Name};
use crate::result::{PairingStats, RcPairSet};
use crate::test_helpers::{
    b, block, borrowed_param, branch, call, count_rc_ops, dec, inc, jump, make_func, owned_param,
    read, refs, remove_matched_pairs, ret, trap_block, v, ABORT, POOL_BOUNDARY,
};
use crate::transition::RcTransitionKind;

use super::*;

fn at(block: u32, index: usize) -> InstrRef {
    InstrRef::new(b(block), index)
}

fn analyze(func: &ArcFunction) -> PairingResult {
    analyze_function(func, &ConservativeAlias, &PairingConfig::default())
}

/// `%0` ref, `%1` scalar (branch condition), `%2` and `%3` refs.
fn classes() -> Vec<ArcClass> {
    vec![
        ArcClass::DefiniteRef,
        ArcClass::Scalar,
        ArcClass::DefiniteRef,
        ArcClass::DefiniteRef,
    ]
}

// End-to-end

/// `entry: inc(%0); br B1 / B1: use(%0); dec(%0); ret`
#[test]
fn inc_then_use_then_dec_across_blocks() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![inc(0)], jump(1)),
            block(1, vec![read(2, 0), dec(0)], ret(2)),
        ],
        refs(3),
    );

    let result = analyze(&func);

    let m = result.match_for_decrement(at(1, 1)).unwrap();
    assert_eq!(m.kind, RcTransitionKind::StrongIncrement);
    assert_eq!(m.mutators.as_slice(), &[at(0, 0)]);
    assert!(!m.known_safe);
    assert_eq!(m.insert_pts.as_slice(), &[InsertPt::before(at(1, 1))]);
    assert!(!m.partial);
    assert!(m.can_remove());

    let m = result.match_for_increment(at(0, 0)).unwrap();
    assert_eq!(m.mutators.as_slice(), &[at(1, 1)]);
    assert!(m.insert_pts.is_empty());

    assert_eq!(result.matched_pairs(), vec![(at(0, 0), at(1, 1))]);
    assert_eq!(result.function(), Some(func.name));
    assert!(result.problems().is_empty());
}

// Known-safe nesting

#[test]
fn nested_pairs_peel_one_per_run() {
    let mut func = make_func(
        vec![borrowed_param(0)],
        vec![block(0, vec![inc(0), inc(0), dec(0), dec(0)], ret(0))],
        refs(1),
    );

    let first = analyze(&func);
    assert_eq!(first.matched_pairs(), vec![(at(0, 1), at(0, 2))]);
    assert!(first.match_for_decrement(at(0, 2)).unwrap().known_safe);
    assert!(first.match_for_increment(at(0, 1)).unwrap().known_safe);
    assert_eq!(
        first.stats(),
        PairingStats {
            top_down_pairs: 1,
            bottom_up_pairs: 1,
            known_safe: 2,
            partial: 0,
            removable: 2,
        }
    );

    remove_matched_pairs(&mut func, &first);
    assert_eq!(count_rc_ops(&func), 2);

    let second = analyze(&func);
    assert_eq!(second.matched_pairs(), vec![(at(0, 0), at(0, 1))]);
    assert!(!second.match_for_decrement(at(0, 1)).unwrap().known_safe);

    remove_matched_pairs(&mut func, &second);
    assert_eq!(count_rc_ops(&func), 0);
    assert!(analyze(&func).is_empty());
}

// Back-edges

/// B0 → B1 → B2 → B1 (back-edge), B1 → B3.
#[test]
fn no_pair_across_back_edge() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![inc(0)], jump(1)),
            block(1, vec![], branch(1, 2, 3)),
            block(2, vec![dec(0)], jump(1)),
            block(3, vec![], ret(2)),
        ],
        classes(),
    );
    let config = PairingConfig::default();
    let mut evaluator = RcDataflowEvaluator::new(&func, &ConservativeAlias, &config);

    let result = evaluator.run();

    assert!(result.is_empty());
    let header = evaluator.block_state(b(1)).unwrap();
    assert!(header.top_down().is_empty());
    assert!(header.bottom_up().is_empty());
}

/// B0 → B1 (self-loop) → B2. The decrement runs once per iteration.
#[test]
fn preheader_increment_does_not_pair_with_loop_decrement() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![inc(0)], jump(1)),
            block(1, vec![dec(0)], branch(1, 1, 2)),
            block(2, vec![], ret(2)),
        ],
        classes(),
    );
    let config = PairingConfig::default();
    let mut evaluator = RcDataflowEvaluator::new(&func, &ConservativeAlias, &config);

    let result = evaluator.run();

    assert!(result.is_empty());
    assert!(evaluator.block_state(b(0)).unwrap().bottom_up().is_empty());
}

/// B0 → B1 (header) → B2 → B1, B1 → B3. The increment runs once per
/// iteration, the decrement once after the loop.
#[test]
fn header_increment_does_not_pair_after_loop_exit() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![], jump(1)),
            block(1, vec![inc(0)], branch(1, 2, 3)),
            block(2, vec![], jump(1)),
            block(3, vec![dec(0)], ret(2)),
        ],
        classes(),
    );

    let result = analyze(&func);

    assert!(result.is_empty());
}

/// B0 → B1 | B2, B1 → B2, B2 → B1 | B3: B2 is a second way into the cycle.
#[test]
fn no_pair_into_irreducible_cycle() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![inc(0)], branch(1, 1, 2)),
            block(1, vec![], jump(2)),
            block(2, vec![dec(0)], branch(1, 1, 3)),
            block(3, vec![], ret(2)),
        ],
        classes(),
    );

    let result = analyze(&func);

    assert!(result.is_empty());
}

#[test]
fn pairs_inside_loop_body_survive() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![], jump(1)),
            block(1, vec![], branch(1, 2, 3)),
            block(2, vec![inc(0), read(2, 0), dec(0)], jump(1)),
            block(3, vec![], ret(2)),
        ],
        classes(),
    );

    let result = analyze(&func);

    assert_eq!(result.matched_pairs(), vec![(at(2, 0), at(2, 2))]);
}

#[test]
fn entry_loop_header_is_not_seeded() {
    let func = make_func(
        vec![owned_param(0)],
        vec![
            block(0, vec![dec(0)], branch(1, 0, 1)),
            block(1, vec![], ret(2)),
        ],
        classes(),
    );

    let result = analyze(&func);

    assert!(result.dec_to_inc().is_empty());
}

// Trap blocks

/// B0 → B1 (trap) | B2; B2 decrements.
fn guarded_by_trap() -> ArcFunction {
    make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![inc(0)], branch(1, 1, 2)),
            trap_block(1, 3),
            block(2, vec![dec(0)], ret(2)),
        ],
        classes(),
    )
}

#[test]
fn trap_successor_is_ignored() {
    let func = guarded_by_trap();
    let config = PairingConfig::default().with_abort_function(ABORT);
    let mut evaluator = RcDataflowEvaluator::new(&func, &ConservativeAlias, &config);

    let result = evaluator.run();

    assert!(result.match_for_increment(at(0, 0)).is_some());
    assert!(result.match_for_decrement(at(2, 0)).is_some());
    let trap = evaluator.block_state(b(1)).unwrap();
    assert!(trap.is_trap());
    assert!(trap.top_down().is_empty());
    assert!(trap.bottom_up().is_empty());
}

#[test]
fn unrecognized_abort_block_blocks_bottom_up() {
    let result = analyze(&guarded_by_trap());

    // The abort block is an ordinary exit with nothing tracked.
    assert!(result.inc_to_dec().is_empty());
    assert!(result.match_for_decrement(at(2, 0)).is_some());
}

// Partial merges

/// B0 → B1 | B2 → B3. Only B1 may decrement `%0`.
#[test]
fn uneven_insertion_points_are_partial() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![inc(0)], branch(1, 1, 2)),
            block(1, vec![call(3, 7, &[])], jump(3)),
            block(2, vec![], jump(3)),
            block(3, vec![dec(0)], ret(2)),
        ],
        classes(),
    );

    let result = analyze(&func);

    let m = result.match_for_decrement(at(3, 0)).unwrap();
    assert!(m.partial);
    assert_eq!(m.insert_pts.as_slice(), &[InsertPt::before(at(1, 0))]);
    assert!(!m.can_move());
    assert!(m.can_remove());
    assert_eq!(result.stats().partial, 1);
}

#[test]
fn paths_from_both_sides_merge_mutators() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![], branch(1, 1, 2)),
            block(1, vec![inc(0)], jump(3)),
            block(2, vec![inc(0)], jump(3)),
            block(3, vec![dec(0)], ret(2)),
        ],
        classes(),
    );

    let result = analyze(&func);

    let m = result.match_for_decrement(at(3, 0)).unwrap();
    assert_eq!(m.mutators.as_slice(), &[at(1, 0), at(2, 0)]);
    assert!(!m.partial);
    assert_eq!(
        result.matched_pairs(),
        vec![(at(1, 0), at(3, 0)), (at(2, 0), at(3, 0))]
    );
}

/// B0 → B1 | B2 → B3. Each arm may decrement `%0` once.
#[test]
fn one_point_per_arm_is_not_partial() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![inc(0)], branch(1, 1, 2)),
            block(1, vec![call(3, 7, &[])], jump(3)),
            block(2, vec![call(3, 7, &[])], jump(3)),
            block(3, vec![dec(0)], ret(2)),
        ],
        classes(),
    );

    let result = analyze(&func);

    let m = result.match_for_decrement(at(3, 0)).unwrap();
    assert!(!m.partial);
    assert_eq!(
        m.insert_pts.as_slice(),
        &[InsertPt::before(at(1, 0)), InsertPt::before(at(2, 0))]
    );
    assert!(m.can_move());
}

// Pair sets

#[test]
fn joined_increments_form_one_pair_set() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![], branch(1, 1, 2)),
            block(1, vec![inc(0)], jump(3)),
            block(2, vec![inc(0)], jump(3)),
            block(3, vec![dec(0)], ret(2)),
        ],
        classes(),
    );

    let result = analyze(&func);

    assert_eq!(
        result.pair_sets(),
        vec![RcPairSet {
            root: v(0),
            increments: vec![at(1, 0), at(2, 0)],
            decrements: vec![at(3, 0)],
            known_safe: false,
            removable: true,
        }]
    );
}

/// B0 → B1 | B2. Only B1 releases the increment.
#[test]
fn one_sided_match_forms_no_pair_set() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![
            block(0, vec![inc(0)], branch(1, 1, 2)),
            block(1, vec![dec(0)], ret(2)),
            block(2, vec![], ret(2)),
        ],
        classes(),
    );

    let result = analyze(&func);

    assert!(result.match_for_decrement(at(1, 0)).is_some());
    assert!(result.match_for_increment(at(0, 0)).is_none());
    assert!(result.pair_sets().is_empty());
}

#[test]
fn call_between_pair_blocks_removal_of_the_set() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![block(0, vec![inc(0), call(1, 7, &[0]), dec(0)], ret(0))],
        refs(2),
    );

    let result = analyze(&func);

    // The callee may release another owner of `%0` and then read it.
    assert!(result.match_for_decrement(at(0, 2)).unwrap().use_after_decrement);
    assert!(result.match_for_increment(at(0, 0)).unwrap().can_remove());
    let sets = result.pair_sets();
    assert_eq!(sets.len(), 1);
    assert!(!sets[0].removable);
}

// Pool boundaries

#[test]
fn pool_boundary_drops_tracking() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![block(
            0,
            vec![inc(0), call(2, POOL_BOUNDARY.raw(), &[]), dec(0)],
            ret(2),
        )],
        classes(),
    );

    let plain = analyze(&func);
    assert_eq!(plain.matched_pairs(), vec![(at(0, 0), at(0, 2))]);
    assert_eq!(
        plain.match_for_decrement(at(0, 2)).unwrap().insert_pts.as_slice(),
        &[InsertPt::before(at(0, 1))]
    );

    let config = PairingConfig::default().with_pool_boundary_function(POOL_BOUNDARY);
    let bounded = analyze_function(&func, &ConservativeAlias, &config);
    assert!(bounded.is_empty());
}

// Entrances

#[test]
fn owned_parameter_matches_its_release() {
    let func = make_func(
        vec![owned_param(0), borrowed_param(2)],
        vec![block(0, vec![dec(0), dec(2)], ret(3))],
        classes(),
    );

    let result = analyze(&func);

    let m = result.match_for_decrement(at(0, 0)).unwrap();
    assert_eq!(m.kind, RcTransitionKind::StrongEntrance);
    assert!(m.mutators.is_empty());
    assert!(result.match_for_decrement(at(0, 1)).is_none());
    assert!(result.matched_pairs().is_empty());
}

// Evaluator surface

#[test]
fn passes_can_run_separately_and_rerun() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![block(0, vec![inc(0), dec(0)], ret(0))],
        refs(1),
    );
    let config = PairingConfig::default().with_bottom_up(false);
    let mut evaluator = RcDataflowEvaluator::new(&func, &ConservativeAlias, &config);

    let first = evaluator.run();
    let second = evaluator.run();
    assert_eq!(first.dec_to_inc(), second.dec_to_inc());
    assert!(first.inc_to_dec().is_empty());

    evaluator.clear();
    evaluator.run_bottom_up();
    evaluator.run_bottom_up();
    let bottom_up_only = evaluator.take_result();
    assert!(bottom_up_only.dec_to_inc().is_empty());
    assert_eq!(bottom_up_only.inc_to_dec().len(), 1);
}

#[test]
fn malformed_cfg_is_reported_not_fatal() {
    let func = make_func(
        vec![borrowed_param(0)],
        vec![block(0, vec![inc(0), dec(0)], jump(4))],
        refs(1),
    );

    let result = analyze(&func);

    assert_eq!(
        result.problems(),
        &[PairingProblem::DanglingSuccessor {
            block: b(0),
            target: b(4),
        }]
    );
    assert_eq!(result.matched_pairs(), vec![(at(0, 0), at(0, 1))]);
}

#[test]
fn module_results_keep_input_order() {
    let mut second = make_func(
        vec![borrowed_param(0)],
        vec![block(0, vec![inc(0), dec(0)], ret(0))],
        refs(1),
    );
    second.name = Name::from_raw(2);
    let first = make_func(
        vec![borrowed_param(0)],
        vec![block(0, vec![read(1, 0)], ret(0))],
        refs(2),
    );

    let results = analyze_module(
        &[first, second],
        &ConservativeAlias,
        &PairingConfig::default(),
    );

    assert_eq!(results.len(), 2);
    assert!(results[0].is_empty());
    assert_eq!(results[1].function(), Some(Name::from_raw(2)));
    assert_eq!(results[1].matched_pairs().len(), 1);
}
