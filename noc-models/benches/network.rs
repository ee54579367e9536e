// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;
use std::rc::Rc;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use noc_config::RoutingAlgorithm;
use noc_engine::engine::Engine;
use noc_models::network::Network;
use noc_models::test_helpers::uniform_random;
use noc_track::tracker::dev_null_tracker;

const NUM_CYCLES: u64 = 2000;

fn setup_network(routing: RoutingAlgorithm) -> (Engine, Rc<RefCell<Network>>) {
    // Create an engine without the tracker system opening files for logging
    let tracker = dev_null_tracker();
    let mut engine = Engine::new(&tracker);
    let config = uniform_random(routing, 20, 17);
    let network = Network::build(&mut engine, Rc::new(config)).unwrap();
    (engine, network)
}

fn run_network(args: (Engine, Rc<RefCell<Network>>)) {
    let (mut engine, network) = args;
    engine.run_for(NUM_CYCLES).unwrap();
    engine.finalize().unwrap();
    assert!(network.borrow().stats().unwrap().is_accounted());
}

fn bench_network(c: &mut Criterion) {
    let mut group = c.benchmark_group("mesh_4x4");
    group.sample_size(20);

    for routing in [RoutingAlgorithm::Xy, RoutingAlgorithm::Dyxy, RoutingAlgorithm::Dybm] {
        group.bench_function(routing.name(), |b| {
            b.iter_batched(
                || setup_network(routing),
                run_network,
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = bench_network
}
criterion_main!(benches);
