// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use itertools::Itertools;
use noc_components::arbiter::policy::{Adaptive, RoundRobin, Sequence, build_policy};
use noc_components::arbiter::{Arbitrate, ArbitrationKind, Request};
use noc_engine::test_helpers::start_test;

fn all_pending(n: usize) -> Vec<Request> {
    vec![Request::pending(true); n]
}

#[test]
fn sequence_ignores_requests() {
    let engine = start_test(file!());
    let top = engine.top();
    let mut policy = Sequence::new(4);
    let requests = vec![Request::pending(false); 4];
    let grants = (0..8)
        .map(|cycle| policy.arbitrate(top, cycle, &requests).unwrap())
        .collect_vec();
    assert_eq!(grants, vec![0, 1, 2, 3, 0, 1, 2, 3]);
}

#[test]
fn round_robin_fairness() {
    let engine = start_test(file!());
    let top = engine.top();

    for n in 1..=8 {
        let mut policy = RoundRobin::new(n);
        let requests = all_pending(n);
        let grants = (0..(4 * n) as u64)
            .map(|cycle| policy.arbitrate(top, cycle, &requests).unwrap())
            .collect_vec();

        // Every window of n consecutive grants covers every requester.
        for window in grants.windows(n) {
            let unique = window.iter().unique().count();
            assert_eq!(unique, n, "window {window:?} of {grants:?}");
        }
    }
}

#[test]
fn round_robin_has_one_cycle_latency() {
    let engine = start_test(file!());
    let top = engine.top();
    let mut policy = RoundRobin::new(4);

    let mut requests = vec![Request::pending(false); 4];
    requests[2].pending = true;

    // Not seen until the following call.
    assert_eq!(policy.arbitrate(top, 0, &requests), Some(3));
    assert_eq!(policy.arbitrate(top, 1, &requests), Some(2));

    // Nothing pending keeps the last grant.
    let idle = vec![Request::pending(false); 4];
    assert_eq!(policy.arbitrate(top, 2, &idle), Some(2));
    assert_eq!(policy.arbitrate(top, 3, &idle), Some(2));
}

#[test]
fn round_robin_skips_idle() {
    let engine = start_test(file!());
    let top = engine.top();
    let mut policy = RoundRobin::new(4);
    let requests = vec![
        Request::pending(true),
        Request::pending(false),
        Request::pending(true),
        Request::pending(false),
    ];
    policy.arbitrate(top, 0, &requests);
    let grants = (1..7)
        .map(|cycle| policy.arbitrate(top, cycle, &requests).unwrap())
        .collect_vec();
    assert_eq!(grants, vec![0, 2, 0, 2, 0, 2]);
}

#[test]
fn adaptive_prefers_oldest() {
    let engine = start_test(file!());
    let top = engine.top();
    let mut policy = Adaptive::new(3);

    let only_zero = vec![
        Request::pending(true),
        Request::pending(false),
        Request::pending(false),
    ];
    assert_eq!(policy.arbitrate(top, 0, &only_zero), Some(0));

    let requests = vec![
        Request::pending(false),
        Request::pending(true),
        Request::pending(true),
    ];
    // Equal waits: lowest index wins, the loser keeps its age.
    assert_eq!(policy.arbitrate(top, 1, &requests), Some(1));
    assert_eq!(policy.wait(2), 1);
    assert_eq!(policy.arbitrate(top, 2, &requests), Some(2));
    assert_eq!(policy.arbitrate(top, 3, &requests), Some(1));

    let idle = vec![Request::pending(false); 3];
    assert_eq!(policy.arbitrate(top, 4, &idle), None);
}

#[test]
fn adaptive_weight_overrides_age() {
    let engine = start_test(file!());
    let top = engine.top();
    let mut policy = Adaptive::new(2);
    policy.age(0);
    policy.age(0);
    let requests = vec![Request::new(true, 0), Request::new(true, 5)];
    assert_eq!(policy.arbitrate(top, 0, &requests), Some(1));
    assert_eq!(policy.wait(0), 3);
    assert_eq!(policy.pick(&[(0, 0), (1, 2)]), Some(0));
    assert_eq!(policy.pick(&[]), None);
}

#[test]
fn factory_builds_each_kind() {
    for kind in [
        ArbitrationKind::Sequence,
        ArbitrationKind::RoundRobin,
        ArbitrationKind::Adaptive,
    ] {
        assert_eq!(build_policy(kind, 4).kind(), kind);
    }
    assert_eq!(ArbitrationKind::default().to_string(), "round-robin");
}

#[test]
fn parse_kind() {
    assert_eq!("RR".parse(), Ok(ArbitrationKind::RoundRobin));
    assert_eq!("adaptive".parse(), Ok(ArbitrationKind::Adaptive));
    assert!("lottery".parse::<ArbitrationKind>().is_err());
}
