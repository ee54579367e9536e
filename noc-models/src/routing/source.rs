// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Source routing: the head flit carries the whole path.

use noc_config::RoutingAlgorithm;

use crate::direction::Direction;
use crate::fault_info::FaultInfo;
use crate::flit::RouteTarget;
use crate::routing::{RouteRequest, RouterContext, RoutingEngine, RoutingEnv};

/// Bits of the route code consumed per hop.
pub const BITS_PER_HOP: u32 = 3;

const HOP_MASK: u64 = (1 << BITS_PER_HOP) - 1;

pub struct SourceRouting {
    _ctx: RouterContext,
}

impl SourceRouting {
    #[must_use]
    pub fn new(ctx: RouterContext) -> Self {
        Self { _ctx: ctx }
    }
}

/// Build a route code from a list of hops, first hop in the lowest bits.
#[must_use]
pub fn encode_route(hops: &[Direction]) -> u64 {
    hops.iter()
        .rev()
        .fold(0, |code, dir| (code << BITS_PER_HOP) | dir.index() as u64)
}

impl RoutingEngine for SourceRouting {
    fn calc_next(
        &mut self,
        _env: &RoutingEnv,
        request: &RouteRequest,
        _fault_info: &mut FaultInfo,
    ) -> Option<Direction> {
        match request.target {
            RouteTarget::SourceRoute(code) => Direction::from_index((code & HOP_MASK) as usize),
            RouteTarget::Destination(_) => None,
        }
    }

    fn algorithm(&self) -> RoutingAlgorithm {
        RoutingAlgorithm::Source
    }
}

#[cfg(test)]
mod tests {
    use noc_config::{Topology, TurnSelection};

    use super::*;
    use crate::routing::test_env::Signals;
    use crate::topology::Grid;

    #[test]
    fn decodes_lowest_bits() {
        let grid = Grid::new(Topology::Mesh, 3, 3);
        let signals = Signals::new(&grid, 0);
        let mut engine = SourceRouting::new(RouterContext::new(0, grid, TurnSelection::Random, 1));
        let code = encode_route(&[Direction::East, Direction::South, Direction::Core]);
        assert_eq!(code, 0o412);

        let mut request = RouteRequest {
            arrival: Direction::Core,
            source: 0,
            target: RouteTarget::SourceRoute(code),
            hop_count: 0,
        };
        let mut info = FaultInfo::default();
        assert_eq!(
            engine.calc_next(&signals.env(), &request, &mut info),
            Some(Direction::East)
        );
        request.target = RouteTarget::SourceRoute(code >> BITS_PER_HOP);
        assert_eq!(
            engine.calc_next(&signals.env(), &request, &mut info),
            Some(Direction::South)
        );
        request.target = RouteTarget::SourceRoute(0o7);
        assert_eq!(engine.calc_next(&signals.env(), &request, &mut info), None);
    }
}
