// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Configurations and checks shared by the tests and benchmarks.

use std::collections::HashSet;

use noc_config::{AppKind, DestinationKind, NocConfig, RoutingAlgorithm, TileApp};

use crate::direction::Direction;
use crate::network::Network;

/// A single packet of `pkt_size` bytes from `src` to `dest`.
#[must_use]
pub fn single_packet(
    routing: RoutingAlgorithm,
    src: usize,
    dest: usize,
    pkt_size: usize,
) -> NocConfig {
    NocConfig {
        routing,
        warmup_cycles: 5,
        tg_cycles: 5,
        tiles: vec![TileApp {
            tile: src,
            app: AppKind::Cbr,
            pkt_size,
            load: 100,
            destination: DestinationKind::Fixed,
            fixed_target: dest as u64,
            ..TileApp::default()
        }],
        ..NocConfig::default()
    }
}

/// Every tile sends CBR traffic to random destinations.
#[must_use]
pub fn uniform_random(routing: RoutingAlgorithm, load: u32, pkt_size: usize) -> NocConfig {
    let mut config = NocConfig {
        routing,
        ..NocConfig::default()
    };
    config.tiles = (0..config.num_tiles())
        .map(|tile| TileApp {
            tile,
            app: AppKind::Cbr,
            pkt_size,
            load,
            destination: DestinationKind::Random,
            ..TileApp::default()
        })
        .collect();
    config
}

/// Check the flow-control invariants of every link of the network.
///
/// - the committed credit of each VC reports a free buffer exactly when the
///   VC is not full, and the upstream output channel holds the same credit,
/// - a link VC only ever holds flits of one packet,
/// - a VC that holds flits is not free in the upstream VC allocator.
///
/// # Panics
///
/// Panics when an invariant does not hold.
pub fn check_flow_control(network: &Network) {
    let grid = network.grid();
    for id in 0..grid.num_tiles() {
        let tile = network.tile(id);
        for side in Direction::LINKS {
            let (Some(ic), Some(upstream)) = (tile.input(side), grid.neighbour(id, side)) else {
                continue;
            };
            let upstream = network.tile(upstream);
            let dir = side.opposite();
            let oc = upstream.output(dir).unwrap();
            for v in 0..ic.num_vcs() {
                let vc = ic.vc(v);
                let credit = *ic.credit(v).read();
                assert_eq!(
                    credit.free_buf,
                    !vc.queue.is_full(),
                    "tile {id} {side} vc{v}: credit does not match occupancy"
                );
                assert_eq!(oc.credit(v), credit, "tile {id} {side} vc{v}: stale credit");

                let packets: HashSet<(usize, u64)> =
                    vc.queue.iter().map(|f| f.packet_key()).collect();
                assert!(
                    packets.len() <= 1,
                    "tile {id} {side} vc{v}: packets {packets:?} share a vc"
                );
                if !vc.queue.is_empty() {
                    assert!(
                        !upstream.vca().is_free(dir, v),
                        "tile {id} {side} vc{v}: occupied vc is free upstream"
                    );
                }
            }
        }
    }
}
