// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Fault-tolerant routing with backtracking.
//!
//! The destination's quadrant relative to the current tile, together with the
//! tile parity, gives a *normal* and an *adaptive* candidate direction. A
//! candidate is blocked when its link is faulty or when it would send the
//! packet straight back. The normal candidate is preferred.
//!
//! When both candidates are blocked the packet backtracks: the previous
//! forward move is undone using a direction derived from the quadrant seen at
//! the previous tile, this tile's parity and whether that move was adaptive.
//! Forward moves are pushed onto [`FaultInfo::history`] and backtracks pop
//! them.
//!
//! A packet fails when it has to backtrack out of its source tile, when the
//! history overflows or when its hop count passes twice the history width.

use noc_config::RoutingAlgorithm;

use crate::direction::Direction;
use crate::fault_info::{FaultInfo, HISTORY_BITS};
use crate::routing::{RouteRequest, RouterContext, RoutingEngine, RoutingEnv};

/// Hop count after which a packet is abandoned.
pub const MAX_HOPS: u32 = 2 * HISTORY_BITS;

pub struct DyBm {
    ctx: RouterContext,
}

impl DyBm {
    #[must_use]
    pub fn new(ctx: RouterContext) -> Self {
        Self { ctx }
    }

    /// Quadrant of `dest`: 0 south-east, 1 south-west, 2 north-east,
    /// 3 north-west.
    ///
    /// A destination in the same row or column is assigned to the side that
    /// does not face a border or the arrival link.
    #[must_use]
    pub fn quadrant(&self, dest: usize, arrival: Direction) -> u8 {
        let grid = &self.ctx.grid;
        let tile = self.ctx.tile;
        let (x, y) = grid.coords(tile);
        let (dx, dy) = grid.coords(dest);

        if dx > x {
            if dy > y {
                0
            } else if dy < y {
                1
            } else if grid.border_east(tile) || arrival == Direction::East {
                1
            } else {
                0
            }
        } else if dx < x {
            if dy > y {
                2
            } else if dy < y {
                3
            } else if grid.border_west(tile) || arrival == Direction::West {
                2
            } else {
                3
            }
        } else if dy > y {
            if grid.border_north(tile) || arrival == Direction::North {
                0
            } else {
                2
            }
        } else if grid.border_south(tile) || arrival == Direction::South {
            3
        } else {
            1
        }
    }

    fn route(
        &self,
        env: &RoutingEnv,
        request: &RouteRequest,
        dest: usize,
        quadrant: u8,
        fault_info: &mut FaultInfo,
        history: &mut u32,
    ) -> Option<Direction> {
        use Direction::{Core, East, North, South, West};

        let state = env.state;
        let tile = self.ctx.tile;
        if request.hop_count > MAX_HOPS {
            return None;
        }
        if dest == tile {
            return if state.is_faulty(Core) {
                None
            } else {
                Some(Core)
            };
        }

        let (x, y) = self.ctx.grid.coords(tile);
        let (dx, dy) = self.ctx.grid.coords(dest);
        let same_row = x == dx;
        let same_col = y == dy;
        let last_adaptive = fault_info.last_was_adaptive();
        let first_adaptive = fault_info.history_full();

        let (normal, adaptive, aligned) = match (quadrant, state.parity) {
            (0, true) => (East, South, same_col),
            (0, false) => (South, East, same_row),
            (1, true) => (South, West, same_row),
            (1, false) => (West, South, same_col),
            (2, true) => (North, East, same_row),
            (2, false) => (East, North, same_col),
            (_, true) => (West, North, same_col),
            (_, false) => (North, West, same_row),
        };
        let blocked = |dir: Direction| state.is_faulty(dir) || dir == request.arrival;
        let attempt = |dir: Direction, bit: bool| (!blocked(dir)).then_some((dir, bit));

        // The move taken and the bit recorded for it
        let forward = if aligned {
            if fault_info.last_back {
                if fault_info.last_back_adaptive {
                    attempt(normal, false)
                } else {
                    None
                }
            } else {
                attempt(adaptive, false).or_else(|| attempt(normal, true))
            }
        } else if fault_info.last_back {
            if fault_info.last_back_adaptive {
                None
            } else {
                attempt(adaptive, true)
            }
        } else {
            attempt(normal, false).or_else(|| attempt(adaptive, true))
        };

        if let Some((dir, bit)) = forward {
            fault_info.last_back = false;
            *history = (*history << 1) | u32::from(bit);
            if first_adaptive {
                return None;
            }
            return Some(dir);
        }

        fault_info.last_back = true;
        if request.source == tile {
            return None;
        }
        let back = match (fault_info.last_dir?, state.parity, last_adaptive) {
            (0, true, true) | (0, false, false) => West,
            (0, true, false) | (0, false, true) => North,
            (1, true, true) | (1, false, false) => North,
            (1, true, false) | (1, false, true) => East,
            (2, true, true) | (2, false, false) => South,
            (2, true, false) | (2, false, true) => West,
            (_, true, true) | (_, false, false) => East,
            (_, true, false) | (_, false, true) => South,
        };
        if state.is_faulty(back) {
            return None;
        }
        fault_info.last_back_adaptive = last_adaptive;
        *history >>= 1;
        Some(back)
    }
}

impl RoutingEngine for DyBm {
    fn calc_next(
        &mut self,
        env: &RoutingEnv,
        request: &RouteRequest,
        fault_info: &mut FaultInfo,
    ) -> Option<Direction> {
        let dest = request.destination()?;
        let quadrant = self.quadrant(dest, request.arrival);
        let mut history = fault_info.history;
        let result = self.route(env, request, dest, quadrant, fault_info, &mut history);
        fault_info.history = history;
        fault_info.last_dir = Some(quadrant);
        if result.is_none() {
            fault_info.fail = true;
        }
        result
    }

    fn algorithm(&self) -> RoutingAlgorithm {
        RoutingAlgorithm::Dybm
    }
}
