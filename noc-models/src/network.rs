// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The network: a grid of tiles joined by point-to-point links.
//!
//! Each cycle every tile is evaluated. During commit the tiles latch their
//! internal handshakes, flits sent on a link are stored by the neighbour,
//! and the credit, congestion and stress signals of each input channel are
//! copied to the upstream tile. Signals therefore reach their consumer on
//! the cycle after they were produced.
//!
//! The network also owns the fault injection API. Faults can cascade: in
//! _realistic_ mode a tile that loses links on both axes is shut down and
//! its neighbours lose the links facing it, which may in turn shut them down.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use itertools::Itertools;
use noc_config::{FaultDirection, FaultSpec, NocConfig, Topology};
use noc_engine::engine::Engine;
use noc_engine::sim_error;
use noc_engine::time::clock::Clock;
use noc_engine::traits::Clocked;
use noc_engine::types::{SimError, SimResult};
use noc_track::entity::Entity;
use noc_track::{error, info, warn};

use crate::direction::Direction;
use crate::stats::NetworkStats;
use crate::tile::Tile;
use crate::topology::Grid;

fn fault_directions(direction: FaultDirection) -> &'static [Direction] {
    match direction {
        FaultDirection::North => &[Direction::North],
        FaultDirection::South => &[Direction::South],
        FaultDirection::East => &[Direction::East],
        FaultDirection::West => &[Direction::West],
        FaultDirection::Core => &[Direction::Core],
        FaultDirection::All => &[
            Direction::North,
            Direction::East,
            Direction::West,
            Direction::South,
            Direction::Core,
        ],
    }
}

pub struct Network {
    pub entity: Rc<Entity>,
    config: Rc<NocConfig>,
    grid: Grid,
    tiles: Vec<Tile>,

    /// Tiles whose core still takes traffic.
    accept: Vec<bool>,

    /// Faults that appear after the first cycle, in cycle order.
    scheduled_faults: VecDeque<FaultSpec>,
    stats: Option<NetworkStats>,
}

impl Network {
    pub fn new(parent: &Rc<Entity>, config: Rc<NocConfig>) -> Result<Self, SimError> {
        config.validate()?;
        let entity = Entity::child(parent, "noc");
        let grid = Grid::from_config(&config);
        let tiles = (0..grid.num_tiles())
            .map(|id| Tile::new(&entity, &config, grid, id))
            .collect_vec();

        let (initial, scheduled): (Vec<FaultSpec>, Vec<FaultSpec>) =
            config.faults.iter().cloned().partition(|f| f.cycle == 0);
        let scheduled_faults = scheduled
            .into_iter()
            .sorted_by_key(|f| f.cycle)
            .collect();

        info!(entity ; "{:?} {}x{}, {} routing, {} vcs of {} flits",
            config.topology, config.num_rows, config.num_cols, config.routing.name(),
            config.num_vcs, config.num_bufs);

        let mut network = Self {
            entity,
            accept: vec![true; grid.num_tiles()],
            config,
            grid,
            tiles,
            scheduled_faults,
            stats: None,
        };
        for fault in &initial {
            network.apply_fault(fault)?;
        }
        Ok(network)
    }

    /// Create a network and register it with the engine.
    pub fn build(engine: &mut Engine, config: Rc<NocConfig>) -> Result<Rc<RefCell<Self>>, SimError> {
        let network = Rc::new(RefCell::new(Network::new(engine.top(), config)?));
        engine.register(network.clone());
        Ok(network)
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn config(&self) -> &NocConfig {
        &self.config
    }

    #[must_use]
    pub fn tile(&self, id: usize) -> &Tile {
        &self.tiles[id]
    }

    /// Whether the core of `tile` still takes traffic.
    #[must_use]
    pub fn accepts(&self, tile: usize) -> bool {
        self.accept[tile]
    }

    /// Statistics of the run, available once the network is finalized.
    #[must_use]
    pub fn stats(&self) -> Option<&NetworkStats> {
        self.stats.as_ref()
    }

    fn apply_fault(&mut self, fault: &FaultSpec) -> SimResult {
        for &dir in fault_directions(fault.direction) {
            self.set_router_fail_dir(fault.tile, dir, true, fault.realistic)?;
        }
        Ok(())
    }

    fn check_tile(&self, tile: usize) -> SimResult {
        if tile >= self.tiles.len() {
            return sim_error!(format!("no tile {tile} in the network"));
        }
        Ok(())
    }

    /// Fail or repair one direction of a tile.
    ///
    /// Returns `true` when nothing changed.
    pub fn set_router_fail_dir(
        &mut self,
        tile: usize,
        dir: Direction,
        fail: bool,
        realistic: bool,
    ) -> Result<bool, SimError> {
        self.check_tile(tile)?;
        if dir.is_link() && !self.grid.has_link(tile, dir) {
            return Ok(true);
        }
        if self.tiles[tile].is_faulty(dir) == fail {
            return Ok(true);
        }

        warn!(self.entity ; "tile {} {}: {}", tile, dir, if fail { "failed" } else { "repaired" });
        self.tiles[tile].set_fault(dir, fail);
        if dir == Direction::Core {
            self.accept[tile] = !fail;
        }
        if fail && realistic && dir.is_link() && self.lost_both_axes(tile) {
            self.shutdown(tile);
        }
        Ok(false)
    }

    /// Fail every link and the core of a tile, shutting it down.
    pub fn set_router_fail(&mut self, tile: usize) -> SimResult {
        for dir in fault_directions(FaultDirection::All) {
            self.set_router_fail_dir(tile, *dir, true, true)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_router_fail_dir(&self, tile: usize, dir: Direction) -> bool {
        self.tiles[tile].is_faulty(dir)
    }

    /// All four links of the tile are faulty.
    #[must_use]
    pub fn is_shutdown(&self, tile: usize) -> bool {
        self.tiles[tile].controller().is_shutdown()
    }

    /// A faulty link on each axis. Missing border links count as faulty.
    fn lost_both_axes(&self, tile: usize) -> bool {
        let t = &self.tiles[tile];
        let vertical = t.is_faulty(Direction::North) || t.is_faulty(Direction::South);
        let horizontal = t.is_faulty(Direction::East) || t.is_faulty(Direction::West);
        vertical && horizontal
    }

    /// Whether a neighbour of a tile being shut down has to follow it.
    ///
    /// Mesh border tiles already miss the links that leave the grid, so they
    /// follow only when more than two directions are faulty.
    fn qualifies_for_shutdown(&self, tile: usize) -> bool {
        if self.config.topology == Topology::Torus || !self.grid.is_border(tile) {
            self.lost_both_axes(tile)
        } else {
            self.tiles[tile].controller().state().num_faulty_links() > 2
        }
    }

    fn shutdown(&mut self, start: usize) {
        let mut visited = vec![false; self.tiles.len()];
        let mut queue = VecDeque::from([start]);
        visited[start] = true;

        while let Some(tile) = queue.pop_front() {
            warn!(self.entity ; "tile {} shut down", tile);
            for dir in Direction::ALL {
                if dir == Direction::Core || self.grid.has_link(tile, dir) {
                    self.tiles[tile].set_fault(dir, true);
                }
            }
            self.accept[tile] = false;

            for dir in Direction::LINKS {
                let Some(neighbour) = self.grid.neighbour(tile, dir) else {
                    continue;
                };
                self.tiles[neighbour].set_fault(dir.opposite(), true);
                if !visited[neighbour]
                    && !self.is_shutdown(neighbour)
                    && self.qualifies_for_shutdown(neighbour)
                {
                    visited[neighbour] = true;
                    queue.push_back(neighbour);
                }
            }
        }
    }

    fn deliver_links(&mut self, cycle: u64) {
        for tile in 0..self.tiles.len() {
            for dir in Direction::LINKS {
                let Some(flit) = self.tiles[tile].take_link_out(dir) else {
                    continue;
                };
                match self.grid.neighbour(tile, dir) {
                    Some(neighbour) => {
                        self.tiles[neighbour].store_from_link(dir.opposite(), flit, cycle);
                    }
                    None => error!(self.entity ; "tile {} sent {} off the grid", tile, flit),
                }
            }
        }
    }

    fn propagate_signals(&mut self) {
        let mut updates = Vec::new();
        for tile in &self.tiles {
            let stress = tile.stress();
            for side in Direction::LINKS {
                let Some(upstream) = self.grid.neighbour(tile.id(), side) else {
                    continue;
                };
                if let Some(feedback) = tile.feedback(side) {
                    updates.push((upstream, side.opposite(), feedback, stress));
                }
            }
        }
        for (upstream, dir, feedback, stress) in updates {
            self.tiles[upstream].apply_feedback(dir, &feedback, stress);
        }
    }
}

impl Clocked for Network {
    fn evaluate(&mut self, clock: &Clock) -> SimResult {
        let cycle = clock.cycle();
        while self
            .scheduled_faults
            .front()
            .is_some_and(|f| f.cycle <= cycle)
        {
            if let Some(fault) = self.scheduled_faults.pop_front() {
                self.apply_fault(&fault)?;
            }
        }

        for tile in &mut self.tiles {
            tile.evaluate(cycle, &self.accept);
        }
        Ok(())
    }

    fn commit(&mut self, clock: &Clock) -> SimResult {
        let cycle = clock.cycle();
        for tile in &mut self.tiles {
            tile.commit(cycle);
        }
        self.deliver_links(cycle);
        for tile in &mut self.tiles {
            tile.latch();
        }
        self.propagate_signals();
        Ok(())
    }

    fn finalize(&mut self, clock: &Clock) -> SimResult {
        let end_cycle = clock.cycle();
        let tiles = self.tiles.iter().map(|t| t.stats(end_cycle)).collect_vec();
        let stats = NetworkStats::new(
            tiles,
            self.config.flit_size_bytes,
            self.config.clk_period_ns(),
        );
        info!(self.entity ; "{} of {} packets received after {} cycles",
            stats.received_packets(), stats.generated_packets(), end_cycle);
        if stats.partially_invalid() {
            warn!(self.entity ; "{} flits failed, {} unrouted",
                stats.failed_flits(), stats.unrouted_flits());
        }
        self.stats = Some(stats);
        Ok(())
    }
}
