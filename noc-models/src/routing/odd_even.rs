// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Odd-even turn model.
//!
//! East-to-north/south turns are only taken in odd columns (or the source
//! column) and north/south-to-west turns only in even columns. 180 degree
//! turns are never taken. The DyAD variant uses the congestion flags of the
//! neighbours to choose between the legal directions.

use noc_config::RoutingAlgorithm;

use crate::direction::{Direction, NUM_LINK_DIRECTIONS};
use crate::fault_info::FaultInfo;
use crate::routing::{RouteRequest, RouterContext, RoutingEngine, RoutingEnv, offsets};

pub struct OddEven {
    ctx: RouterContext,
    dynamic: bool,
}

impl OddEven {
    /// `dynamic` selects DyAD-OE.
    #[must_use]
    pub fn new(ctx: RouterContext, dynamic: bool) -> Self {
        Self { ctx, dynamic }
    }

    /// The legal output directions, in `N, S, E, W` order.
    fn available(&self, request: &RouteRequest, dest: usize) -> Vec<Direction> {
        let grid = &self.ctx.grid;
        let tile = self.ctx.tile;
        let arrival = request.arrival;
        let (_, col) = grid.coords(tile);
        let (_, src_col) = grid.coords(request.source);
        let (_, dst_col) = grid.coords(dest);
        let (drow, dcol) = offsets(grid, tile, dest);

        let mut avail = [false; NUM_LINK_DIRECTIONS];
        let mut allow = |dir: Direction| avail[dir.index()] = true;

        // Prefer north if it is needed, otherwise fall back to south
        let north_or_south = |allow: &mut dyn FnMut(Direction), north_ok: bool| {
            if north_ok && !grid.border_north(tile) && arrival != Direction::North {
                allow(Direction::North);
            } else if !grid.border_south(tile) && arrival != Direction::South {
                allow(Direction::South);
            }
        };

        if dcol == 0 {
            if drow < 0 {
                if arrival != Direction::North && !grid.border_north(tile) {
                    allow(Direction::North);
                }
            } else if arrival != Direction::South && !grid.border_south(tile) {
                allow(Direction::South);
            }
        } else if dcol > 0 {
            if drow == 0 {
                if arrival != Direction::East {
                    allow(Direction::East);
                }
            } else {
                if col % 2 != 0 || col == src_col {
                    north_or_south(&mut allow, drow < 0);
                }
                if (dst_col % 2 != 0 || dcol != 1) && arrival != Direction::East {
                    allow(Direction::East);
                }
            }
        } else {
            if arrival != Direction::West {
                allow(Direction::West);
            }
            if col % 2 == 0 {
                north_or_south(&mut allow, drow <= 0);
            }
        }

        Direction::LINKS
            .into_iter()
            .filter(|d| avail[d.index()])
            .collect()
    }
}

impl RoutingEngine for OddEven {
    fn calc_next(
        &mut self,
        env: &RoutingEnv,
        request: &RouteRequest,
        _fault_info: &mut FaultInfo,
    ) -> Option<Direction> {
        let dest = request.destination()?;
        if dest == self.ctx.tile {
            return Some(Direction::Core);
        }
        let avail = self.available(request, dest);
        if !self.dynamic {
            return avail.first().copied();
        }

        let need_adaptive = Direction::LINKS
            .iter()
            .any(|d| self.ctx.has_neighbour(*d) && env.is_congested(*d));
        if !need_adaptive {
            return avail.first().copied();
        }
        if let Some(dir) = avail.iter().find(|d| !env.is_congested(**d)) {
            return Some(*dir);
        }
        self.ctx.choose(&avail)
    }

    fn algorithm(&self) -> RoutingAlgorithm {
        if self.dynamic {
            RoutingAlgorithm::DyadOe
        } else {
            RoutingAlgorithm::Oe
        }
    }
}

#[cfg(test)]
mod tests {
    use noc_config::{Topology, TurnSelection};

    use super::*;
    use crate::routing::test_env::{Signals, request};
    use crate::topology::Grid;

    fn engine(grid: Grid, tile: usize, dynamic: bool) -> OddEven {
        OddEven::new(RouterContext::new(tile, grid, TurnSelection::Random, 3), dynamic)
    }

    #[test]
    fn reaches_every_destination() {
        let grid = Grid::new(Topology::Mesh, 5, 5);
        for src in 0..grid.num_tiles() {
            for dest in 0..grid.num_tiles() {
                let mut tile = src;
                let mut arrival = Direction::Core;
                for _ in 0..(2 * grid.num_tiles()) {
                    let signals = Signals::new(&grid, tile);
                    let mut info = FaultInfo::default();
                    let dir = engine(grid, tile, false)
                        .calc_next(&signals.env(), &request(arrival, src, dest), &mut info)
                        .unwrap();
                    if dir == Direction::Core {
                        break;
                    }
                    assert_ne!(dir, arrival, "180 degree turn at {tile}");
                    tile = grid.neighbour(tile, dir).unwrap();
                    arrival = dir.opposite();
                }
                assert_eq!(tile, dest, "{src} -> {dest}");
            }
        }
    }

    #[test]
    fn dyad_avoids_congested_neighbour() {
        let grid = Grid::new(Topology::Mesh, 4, 4);
        // Tile 9 is in an odd column so a south-east packet can go south or east.
        let mut signals = Signals::new(&grid, 9);
        let req = request(Direction::Core, 9, 15);

        let mut info = FaultInfo::default();
        assert_eq!(
            engine(grid, 9, true).calc_next(&signals.env(), &req, &mut info),
            Some(Direction::South)
        );

        signals.congested[Direction::South.index()] = true;
        assert_eq!(
            engine(grid, 9, true).calc_next(&signals.env(), &req, &mut info),
            Some(Direction::East)
        );
        assert_eq!(
            engine(grid, 9, false).calc_next(&signals.env(), &req, &mut info),
            Some(Direction::South)
        );
    }
}
