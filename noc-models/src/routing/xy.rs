// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Dimension-order routing: columns first, then rows.

use std::cmp::Ordering;

use noc_config::RoutingAlgorithm;

use crate::direction::Direction;
use crate::fault_info::FaultInfo;
use crate::routing::{RouteRequest, RouterContext, RoutingEngine, RoutingEnv, offsets};

pub struct Xy {
    ctx: RouterContext,
}

impl Xy {
    #[must_use]
    pub fn new(ctx: RouterContext) -> Self {
        Self { ctx }
    }
}

impl RoutingEngine for Xy {
    fn calc_next(
        &mut self,
        _env: &RoutingEnv,
        request: &RouteRequest,
        _fault_info: &mut FaultInfo,
    ) -> Option<Direction> {
        let dest = request.destination()?;
        let (drow, dcol) = offsets(&self.ctx.grid, self.ctx.tile, dest);
        let dir = match (dcol.cmp(&0), drow.cmp(&0)) {
            (Ordering::Greater, _) => Direction::East,
            (Ordering::Less, _) => Direction::West,
            (Ordering::Equal, Ordering::Less) => Direction::North,
            (Ordering::Equal, Ordering::Greater) => Direction::South,
            (Ordering::Equal, Ordering::Equal) => Direction::Core,
        };
        Some(dir)
    }

    fn algorithm(&self) -> RoutingAlgorithm {
        RoutingAlgorithm::Xy
    }
}

#[cfg(test)]
mod tests {
    use noc_config::{Topology, TurnSelection};

    use super::*;
    use crate::routing::test_env::{Signals, request};
    use crate::topology::Grid;

    #[test]
    fn every_hop_gets_closer() {
        let grid = Grid::new(Topology::Mesh, 4, 5);
        for src in 0..grid.num_tiles() {
            for dest in 0..grid.num_tiles() {
                let mut tile = src;
                let mut arrival = Direction::Core;
                loop {
                    let signals = Signals::new(&grid, tile);
                    let mut engine =
                        Xy::new(RouterContext::new(tile, grid, TurnSelection::Random, 1));
                    let mut info = FaultInfo::default();
                    let dir = engine
                        .calc_next(&signals.env(), &request(arrival, src, dest), &mut info)
                        .unwrap();
                    if dir == Direction::Core {
                        assert_eq!(tile, dest);
                        break;
                    }
                    let next = grid.neighbour(tile, dir).unwrap();
                    assert_eq!(grid.manhattan(next, dest) + 1, grid.manhattan(tile, dest));
                    arrival = dir.opposite();
                    tile = next;
                }
            }
        }
    }
}
