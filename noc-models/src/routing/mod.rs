// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Next-hop routing algorithms.
//!
//! Every algorithm implements [`RoutingEngine`]. A tile's
//! [`Controller`](crate::controller::Controller) owns one engine, created by
//! [`build_engine`], and calls it for each HEAD/HDT flit that needs a route.
//!
//! An engine returns `None` when it cannot find a legal direction. The caller
//! then marks the packet as failed.

use noc_config::{RoutingAlgorithm, TurnSelection};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::direction::{Direction, NUM_LINK_DIRECTIONS};
use crate::fault_info::FaultInfo;
use crate::flit::RouteTarget;
use crate::router_state::RouterState;
use crate::topology::Grid;

pub mod dybm;
pub mod dyxy;
pub mod odd_even;
pub mod source;
pub mod turn_model;
pub mod xy;

/// What the engine of one tile knows about itself.
pub struct RouterContext {
    pub tile: usize,
    pub grid: Grid,
    pub turn_selection: TurnSelection,
    pub rng: StdRng,
}

impl RouterContext {
    #[must_use]
    pub fn new(tile: usize, grid: Grid, turn_selection: TurnSelection, seed: u64) -> Self {
        Self {
            tile,
            grid,
            turn_selection,
            rng: StdRng::seed_from_u64(seed.wrapping_add(tile as u64)),
        }
    }

    /// Whether the tile has a neighbour on this side.
    #[must_use]
    pub fn has_neighbour(&self, dir: Direction) -> bool {
        self.grid.has_link(self.tile, dir)
    }

    /// Uniform choice between the candidates.
    pub fn choose(&mut self, candidates: &[Direction]) -> Option<Direction> {
        candidates.choose(&mut self.rng).copied()
    }

    /// Pick one of several legal directions according to the turn selection.
    ///
    /// With [`TurnSelection::Congestion`] the first candidate whose neighbour
    /// exists and is not congested wins. Otherwise, or when every neighbour
    /// is congested, the choice is random.
    pub fn select(&mut self, env: &RoutingEnv, candidates: &[Direction]) -> Option<Direction> {
        if candidates.len() == 1 {
            return Some(candidates[0]);
        }
        if self.turn_selection == TurnSelection::Congestion {
            if let Some(dir) = candidates
                .iter()
                .find(|d| self.has_neighbour(**d) && !env.is_congested(**d))
            {
                return Some(*dir);
            }
        }
        self.choose(candidates)
    }
}

/// The signals from neighbouring tiles seen by the engine.
///
/// Arrays are indexed by [`Direction::index`] of the link.
#[derive(Clone, Copy, Debug)]
pub struct RoutingEnv<'a> {
    pub state: &'a RouterState,
    pub stress: &'a [u32; NUM_LINK_DIRECTIONS],
    pub congested: &'a [bool; NUM_LINK_DIRECTIONS],
}

impl RoutingEnv<'_> {
    #[must_use]
    pub fn is_congested(&self, dir: Direction) -> bool {
        match dir {
            Direction::Core => false,
            _ => self.congested[dir.index()],
        }
    }

    #[must_use]
    pub fn stress(&self, dir: Direction) -> u32 {
        match dir {
            Direction::Core => 0,
            _ => self.stress[dir.index()],
        }
    }
}

/// The fields of a head flit that routing depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteRequest {
    /// Side of the tile the flit arrived on.
    pub arrival: Direction,
    pub source: usize,
    pub target: RouteTarget,
    pub hop_count: u32,
}

impl RouteRequest {
    #[must_use]
    pub fn destination(&self) -> Option<usize> {
        match self.target {
            RouteTarget::Destination(tile) => Some(tile),
            RouteTarget::SourceRoute(_) => None,
        }
    }
}

pub trait RoutingEngine {
    /// Compute the output direction of a packet at this tile.
    ///
    /// `fault_info` is the copy that will be forwarded with the packet.
    fn calc_next(
        &mut self,
        env: &RoutingEnv,
        request: &RouteRequest,
        fault_info: &mut FaultInfo,
    ) -> Option<Direction>;

    fn algorithm(&self) -> RoutingAlgorithm;
}

/// Create the engine for an algorithm.
#[must_use]
pub fn build_engine(algorithm: RoutingAlgorithm, ctx: RouterContext) -> Box<dyn RoutingEngine> {
    match algorithm {
        RoutingAlgorithm::Source => Box::new(source::SourceRouting::new(ctx)),
        RoutingAlgorithm::Xy => Box::new(xy::Xy::new(ctx)),
        RoutingAlgorithm::Oe => Box::new(odd_even::OddEven::new(ctx, false)),
        RoutingAlgorithm::DyadOe => Box::new(odd_even::OddEven::new(ctx, true)),
        RoutingAlgorithm::WestFirst => Box::new(turn_model::TurnModel::new(
            ctx,
            turn_model::TurnRule::WestFirst,
        )),
        RoutingAlgorithm::NorthLast => Box::new(turn_model::TurnModel::new(
            ctx,
            turn_model::TurnRule::NorthLast,
        )),
        RoutingAlgorithm::NegativeFirst => Box::new(turn_model::TurnModel::new(
            ctx,
            turn_model::TurnRule::NegativeFirst,
        )),
        RoutingAlgorithm::Dyxy => Box::new(dyxy::DyXy::new(ctx)),
        RoutingAlgorithm::Dybm => Box::new(dybm::DyBm::new(ctx)),
    }
}

/// Row and column offsets from `tile` to `dest` (positive is south/east).
pub(crate) fn offsets(grid: &Grid, tile: usize, dest: usize) -> (isize, isize) {
    let (x, y) = grid.coords(tile);
    let (dx, dy) = grid.coords(dest);
    (dx as isize - x as isize, dy as isize - y as isize)
}

#[cfg(test)]
pub(crate) mod test_env {
    use super::*;

    pub struct Signals {
        pub state: RouterState,
        pub stress: [u32; NUM_LINK_DIRECTIONS],
        pub congested: [bool; NUM_LINK_DIRECTIONS],
    }

    impl Signals {
        pub fn new(grid: &Grid, tile: usize) -> Self {
            let mut state = RouterState::new(grid.parity(tile));
            let mut stress = [0; NUM_LINK_DIRECTIONS];
            let mut congested = [false; NUM_LINK_DIRECTIONS];
            for dir in Direction::LINKS {
                if !grid.has_link(tile, dir) {
                    state.set_faulty(dir, true);
                    stress[dir.index()] = u32::MAX;
                    congested[dir.index()] = true;
                }
            }
            Self {
                state,
                stress,
                congested,
            }
        }

        pub fn env(&self) -> RoutingEnv<'_> {
            RoutingEnv {
                state: &self.state,
                stress: &self.stress,
                congested: &self.congested,
            }
        }
    }

    pub fn request(arrival: Direction, source: usize, dest: usize) -> RouteRequest {
        RouteRequest {
            arrival,
            source,
            target: RouteTarget::Destination(dest),
            hop_count: 0,
        }
    }
}
