// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The routing controller of a tile.
//!
//! Input channels post route queries during the evaluate phase. The
//! controller answers all of them when the tile commits and each input
//! channel collects its reply on the following cycle.

use std::rc::Rc;

use noc_config::NocConfig;
use noc_track::entity::Entity;
use noc_track::{debug, trace, warn};

use crate::direction::{Direction, NUM_LINK_DIRECTIONS};
use crate::fault_info::FaultInfo;
use crate::flit::RouteTarget;
use crate::router_state::RouterState;
use crate::routing::{RouteRequest, RouterContext, RoutingEngine, RoutingEnv, build_engine};
use crate::topology::Grid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteQuery {
    /// Virtual channel of the requesting input channel.
    pub vc: usize,
    pub request: RouteRequest,
    pub fault_info: FaultInfo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteReply {
    pub vc: usize,

    /// `None` when the packet cannot be routed.
    pub direction: Option<Direction>,

    /// Fault info to forward with the packet.
    pub fault_info: FaultInfo,
}

pub struct Controller {
    pub entity: Rc<Entity>,
    grid: Grid,
    tile: usize,
    engine: Box<dyn RoutingEngine>,
    state: RouterState,
    stress: [u32; NUM_LINK_DIRECTIONS],
    congested: [bool; NUM_LINK_DIRECTIONS],
    queries: Vec<Option<RouteQuery>>,
    replies: Vec<Option<RouteReply>>,
    num_failed: u64,
}

impl Controller {
    #[must_use]
    pub fn new(
        parent: &Rc<Entity>,
        config: &NocConfig,
        grid: Grid,
        tile: usize,
        num_ports: usize,
    ) -> Self {
        let entity = Entity::child(parent, "controller");
        let ctx = RouterContext::new(tile, grid, config.turn_selection, config.seed);
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
            entity,
            grid,
            tile,
            engine: build_engine(config.routing, ctx),
            state,
            stress,
            congested,
            queries: vec![None; num_ports],
            replies: vec![None; num_ports],
            num_failed: 0,
        }
    }

    /// Post a query from input port `port`. Answered when the tile commits.
    pub fn request(&mut self, port: usize, query: RouteQuery) {
        trace!(self.entity ; "query from port {}: {:?}", port, query.request);
        self.queries[port] = Some(query);
    }

    pub fn take_reply(&mut self, port: usize) -> Option<RouteReply> {
        self.replies[port].take()
    }

    /// Answer every query posted this cycle.
    pub fn commit(&mut self) {
        for port in 0..self.queries.len() {
            if let Some(query) = self.queries[port].take() {
                let reply = self.route(&query);
                self.replies[port] = Some(reply);
            }
        }
    }

    fn route(&mut self, query: &RouteQuery) -> RouteReply {
        let mut fault_info = query.fault_info;
        let valid_target = match query.request.target {
            RouteTarget::Destination(dest) => dest < self.grid.num_tiles(),
            RouteTarget::SourceRoute(_) => true,
        };

        let env = RoutingEnv {
            state: &self.state,
            stress: &self.stress,
            congested: &self.congested,
        };
        let direction = if valid_target {
            self.engine
                .calc_next(&env, &query.request, &mut fault_info)
                .filter(|dir| !self.state.is_faulty(*dir))
        } else {
            None
        };

        match direction {
            Some(dir) => {
                debug!(self.entity ; "vc{} {:?} routed {}", query.vc, query.request.target, dir);
            }
            None => {
                fault_info.fail = true;
                self.num_failed += 1;
                warn!(self.entity ; "tile {}: unable to route {:?} from {} ({})",
                    self.tile, query.request.target, query.request.source, fault_info);
            }
        }
        RouteReply {
            vc: query.vc,
            direction,
            fault_info,
        }
    }

    pub fn set_stress(&mut self, dir: Direction, value: u32) {
        if dir.is_link() && self.grid.has_link(self.tile, dir) {
            self.stress[dir.index()] = value;
        }
    }

    pub fn set_congested(&mut self, dir: Direction, congested: bool) {
        if dir.is_link() && self.grid.has_link(self.tile, dir) {
            self.congested[dir.index()] = congested;
        }
    }

    #[must_use]
    pub fn stress(&self, dir: Direction) -> u32 {
        match dir {
            Direction::Core => 0,
            _ => self.stress[dir.index()],
        }
    }

    #[must_use]
    pub fn is_congested(&self, dir: Direction) -> bool {
        dir.is_link() && self.congested[dir.index()]
    }

    /// Mark an output direction as failed or working.
    pub fn set_fault(&mut self, dir: Direction, fail: bool) {
        self.state.set_faulty(dir, fail);
    }

    #[must_use]
    pub fn is_faulty(&self, dir: Direction) -> bool {
        self.state.is_faulty(dir)
    }

    /// All four links are faulty.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.state.is_shutdown()
    }

    #[must_use]
    pub fn state(&self) -> &RouterState {
        &self.state
    }

    /// Number of queries that could not be routed.
    #[must_use]
    pub fn num_failed(&self) -> u64 {
        self.num_failed
    }
}

#[cfg(test)]
mod tests {
    use noc_config::Topology;
    use noc_track::entity::toplevel;
    use noc_track::tracker::dev_null_tracker;

    use super::*;

    fn controller(tile: usize) -> Controller {
        let config = NocConfig::default();
        let top = toplevel(&dev_null_tracker(), "top");
        let grid = Grid::new(Topology::Mesh, 4, 4);
        Controller::new(&top, &config, grid, tile, 5)
    }

    fn query(dest: usize) -> RouteQuery {
        RouteQuery {
            vc: 1,
            request: RouteRequest {
                arrival: Direction::Core,
                source: 5,
                target: RouteTarget::Destination(dest),
                hop_count: 0,
            },
            fault_info: FaultInfo::default(),
        }
    }

    #[test]
    fn reply_after_commit() {
        let mut controller = controller(5);
        controller.request(4, query(7));
        assert!(controller.take_reply(4).is_none());
        controller.commit();
        let reply = controller.take_reply(4).unwrap();
        assert_eq!(reply.vc, 1);
        assert_eq!(reply.direction, Some(Direction::East));
        assert!(!reply.fault_info.fail);
        assert!(controller.take_reply(4).is_none());
    }

    #[test]
    fn faulty_direction_fails() {
        let mut controller = controller(5);
        controller.set_fault(Direction::East, true);
        controller.request(0, query(7));
        controller.commit();
        let reply = controller.take_reply(0).unwrap();
        assert_eq!(reply.direction, None);
        assert!(reply.fault_info.fail);
        assert_eq!(controller.num_failed(), 1);

        controller.set_fault(Direction::Core, true);
        controller.request(0, query(5));
        controller.commit();
        assert_eq!(controller.take_reply(0).unwrap().direction, None);
    }

    #[test]
    fn borders_are_faulty() {
        let controller = controller(0);
        assert!(controller.is_faulty(Direction::North));
        assert!(controller.is_faulty(Direction::West));
        assert!(!controller.is_faulty(Direction::East));
        assert!(controller.is_congested(Direction::North));
        assert_eq!(controller.stress(Direction::West), u32::MAX);
        assert!(!controller.is_shutdown());
    }

    #[test]
    fn unknown_destination_fails() {
        let mut controller = controller(5);
        controller.request(2, query(99));
        controller.commit();
        assert!(controller.take_reply(2).unwrap().fault_info.fail);
    }
}
