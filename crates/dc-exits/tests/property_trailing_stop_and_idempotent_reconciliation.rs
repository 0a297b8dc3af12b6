use dc_exits::{apply_trailing_stop, reconcile_stop_order, ExitPositionState};
use dc_testkit::FakeBroker;

/// Property 3 — trailing stop monotonicity: `apply_trailing_stop(x, y)`
/// returns `>= x` whenever `x` is `Some`, so a sequence of updates never
/// lets the stored stop price decrease.
#[test]
fn property_trailing_stop_never_decreases_across_a_sequence_of_updates() {
    let candidates = [148.0, 147.5, 149.0, 148.8, 150.25, 149.9, 151.0];
    let mut stop: Option<f64> = None;
    for &candidate in &candidates {
        let previous = stop;
        stop = apply_trailing_stop(stop, Some(candidate));
        if let Some(prev) = previous {
            assert!(stop.unwrap() >= prev, "stop regressed from {prev} to {:?}", stop);
        }
    }
    assert_eq!(stop, Some(151.0));
}

/// Property 5 — idempotent reconciliation: running `reconcile_stop_order`
/// twice in a row against an unchanged broker state results in zero new
/// submissions on the second run.
#[test]
fn property_repeated_reconciliation_submits_only_once() {
    let mut broker = FakeBroker::new();
    let state = ExitPositionState::new("AAPL", 10, 150.0, "2024-01-16T14:30:00Z");

    let first = reconcile_stop_order(&mut broker, state, 10, 148.0).unwrap();
    assert_eq!(broker.submit_calls.len(), 1, "first run should submit exactly once");

    let second_state = ExitPositionState::new("AAPL", 10, 150.0, "2024-01-16T14:30:00Z");
    let second = reconcile_stop_order(&mut broker, second_state, 10, 148.0).unwrap();
    assert_eq!(broker.submit_calls.len(), 1, "second run against unchanged broker state must not resubmit");
    assert_eq!(first.state.stop_order_id, second.state.stop_order_id);
}
