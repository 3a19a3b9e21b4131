use crate::test_helpers::{call, dec, ABORT, POOL_BOUNDARY};

use super::*;

#[test]
fn default_runs_both_passes_and_knows_no_primitives() {
    let config = PairingConfig::default();
    assert!(config.top_down);
    assert!(config.bottom_up);
    assert!(!config.is_abort_call(&call(0, ABORT.raw(), &[])));
    assert!(!config.is_pool_boundary(&call(0, POOL_BOUNDARY.raw(), &[])));
}

#[test]
fn registered_primitives_are_recognized() {
    let config = PairingConfig::default()
        .with_abort_function(ABORT)
        .with_pool_boundary_function(POOL_BOUNDARY);

    assert!(config.is_abort_call(&call(0, ABORT.raw(), &[])));
    assert!(!config.is_abort_call(&call(0, POOL_BOUNDARY.raw(), &[])));
    assert!(config.is_pool_boundary(&call(0, POOL_BOUNDARY.raw(), &[1])));
    assert!(!config.is_pool_boundary(&dec(0)));
}

#[test]
fn passes_can_be_disabled() {
    let config = PairingConfig::default()
        .with_top_down(false)
        .with_bottom_up(false);
    assert!(!config.top_down);
    assert!(!config.bottom_up);
}
