// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Dynamic XY routing.
//!
//! When both a row and a column move would bring the packet closer, the
//! neighbour reporting the lower stress wins. Equal stress is broken at
//! random. The packet is never sent back the way it came.

use std::cmp::Ordering;

use noc_config::RoutingAlgorithm;

use crate::direction::Direction;
use crate::fault_info::FaultInfo;
use crate::routing::{RouteRequest, RouterContext, RoutingEngine, RoutingEnv, offsets};

pub struct DyXy {
    ctx: RouterContext,
}

impl DyXy {
    #[must_use]
    pub fn new(ctx: RouterContext) -> Self {
        Self { ctx }
    }
}

impl RoutingEngine for DyXy {
    fn calc_next(
        &mut self,
        env: &RoutingEnv,
        request: &RouteRequest,
        _fault_info: &mut FaultInfo,
    ) -> Option<Direction> {
        let dest = request.destination()?;
        let (drow, dcol) = offsets(&self.ctx.grid, self.ctx.tile, dest);

        let vertical = if drow > 0 {
            Direction::South
        } else {
            Direction::North
        };
        let horizontal = if dcol > 0 {
            Direction::East
        } else {
            Direction::West
        };
        if dcol == 0 {
            return Some(if drow == 0 { Direction::Core } else { vertical });
        }
        if drow == 0 {
            return Some(horizontal);
        }

        let mut choice = match env.stress(vertical).cmp(&env.stress(horizontal)) {
            Ordering::Less => vertical,
            Ordering::Greater => horizontal,
            Ordering::Equal => self.ctx.choose(&[vertical, horizontal])?,
        };
        if choice == request.arrival {
            choice = if vertical == request.arrival {
                horizontal
            } else {
                vertical
            };
        }
        Some(choice)
    }

    fn algorithm(&self) -> RoutingAlgorithm {
        RoutingAlgorithm::Dyxy
    }
}

#[cfg(test)]
mod tests {
    use noc_config::{Topology, TurnSelection};

    use super::*;
    use crate::routing::test_env::{Signals, request};
    use crate::topology::Grid;

    #[test]
    fn lower_stress_wins() {
        let grid = Grid::new(Topology::Mesh, 4, 4);
        let mut signals = Signals::new(&grid, 5);
        let mut engine = DyXy::new(RouterContext::new(5, grid, TurnSelection::Random, 1));
        let mut info = FaultInfo::default();
        let req = request(Direction::Core, 5, 15);

        signals.stress[Direction::South.index()] = 3;
        signals.stress[Direction::East.index()] = 1;
        assert_eq!(
            engine.calc_next(&signals.env(), &req, &mut info),
            Some(Direction::East)
        );

        signals.stress[Direction::East.index()] = 7;
        assert_eq!(
            engine.calc_next(&signals.env(), &req, &mut info),
            Some(Direction::South)
        );

        // Never straight back
        let req = request(Direction::South, 5, 15);
        assert_eq!(
            engine.calc_next(&signals.env(), &req, &mut info),
            Some(Direction::East)
        );
    }

    #[test]
    fn straight_lines() {
        let grid = Grid::new(Topology::Mesh, 4, 4);
        let signals = Signals::new(&grid, 5);
        let mut engine = DyXy::new(RouterContext::new(5, grid, TurnSelection::Random, 1));
        let mut info = FaultInfo::default();
        for (dest, dir) in [
            (1, Direction::North),
            (13, Direction::South),
            (7, Direction::East),
            (4, Direction::West),
            (5, Direction::Core),
        ] {
            assert_eq!(
                engine.calc_next(&signals.env(), &request(Direction::Core, 5, dest), &mut info),
                Some(dir)
            );
        }
    }
}
