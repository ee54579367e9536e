// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A tile: one router and its core.
//!
//! The router has an input and an output channel per port, a routing
//! [`Controller`] and a [`VcAllocator`]. The network moves flits between the
//! output channels of one tile and the input channels of its neighbours, and
//! carries the credit and congestion signals back.

use std::rc::Rc;

use noc_config::NocConfig;
use noc_track::entity::Entity;
use noc_track::{error, trace};

use crate::controller::Controller;
use crate::credit::CreditLine;
use crate::direction::{Direction, NUM_LINK_DIRECTIONS};
use crate::flit::Flit;
use crate::input_channel::{InputChannel, TileView};
use crate::output_channel::OutputChannel;
use crate::stats::{TileStats, Utilization};
use crate::topology::{Grid, PortMap};
use crate::traffic::Core;
use crate::vc_allocator::VcAllocator;

/// Signals an input channel sends back to the upstream tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feedback {
    /// Committed credit of each VC and whether it was written this cycle.
    pub credits: Vec<(CreditLine, bool)>,
    pub vc_congested: Vec<bool>,
    pub congested: bool,
}

pub struct Tile {
    pub entity: Rc<Entity>,
    id: usize,
    port_map: PortMap,
    controller: Controller,
    vca: VcAllocator,
    ics: Vec<InputChannel>,
    ocs: Vec<OutputChannel>,
    core: Core,

    /// Crossbar writes staged during evaluate: `(output port, input port, flit)`.
    crossbar: Vec<(usize, usize, Flit)>,
    injection: Option<Flit>,
    link_out: [Option<Flit>; NUM_LINK_DIRECTIONS],
    warmup_cycles: u64,
    utilization: Utilization,
    total_buffers: usize,
    total_vcs: usize,
}

impl Tile {
    #[must_use]
    pub fn new(parent: &Rc<Entity>, config: &NocConfig, grid: Grid, id: usize) -> Self {
        let entity = Entity::child(parent, &format!("tile{id}"));
        let port_map = PortMap::new(&grid, id);
        let num_ports = port_map.num_ports();
        let ics = port_map
            .directions()
            .enumerate()
            .map(|(port, dir)| InputChannel::new(&entity, config, dir, port))
            .collect();
        let ocs = port_map
            .directions()
            .map(|dir| OutputChannel::new(&entity, config, dir, num_ports))
            .collect();
        Self {
            controller: Controller::new(&entity, config, grid, id, num_ports),
            vca: VcAllocator::new(&entity, config.num_vcs, num_ports, config.congestion_affect_vc),
            core: Core::new(&entity, config, id),
            ics,
            ocs,
            crossbar: Vec::with_capacity(num_ports),
            injection: None,
            link_out: [None; NUM_LINK_DIRECTIONS],
            warmup_cycles: config.warmup_cycles,
            utilization: Utilization::default(),
            total_buffers: num_ports * config.num_vcs * config.num_bufs,
            total_vcs: num_ports * config.num_vcs,
            entity,
            id,
            port_map,
        }
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn port_map(&self) -> &PortMap {
        &self.port_map
    }

    pub fn evaluate(&mut self, cycle: u64, accept: &[bool]) {
        let core_port = self.port_map.core_port();
        let credit = *self.ics[core_port].credit(0).read();
        self.injection = self.core.generate(cycle, &credit, accept);

        let num_ports = self.port_map.num_ports();
        let in_ready: Vec<Vec<bool>> = self
            .ocs
            .iter()
            .map(|oc| (0..num_ports).map(|port| oc.in_ready(port)).collect())
            .collect();

        for oc in &mut self.ocs {
            if let Some(flit) = oc.evaluate(cycle) {
                match oc.direction() {
                    Direction::Core => self.core.receive(flit, cycle),
                    dir => self.link_out[dir.index()] = Some(flit),
                }
            }
        }

        let mut view = TileView {
            controller: &mut self.controller,
            vca: &mut self.vca,
            port_map: &self.port_map,
            in_ready: &in_ready,
        };
        for (port, ic) in self.ics.iter_mut().enumerate() {
            if let Some((out_port, flit)) = ic.evaluate(cycle, &mut view) {
                self.crossbar.push((out_port, port, flit));
            }
        }

        if cycle >= self.warmup_cycles {
            let occupied: usize = self.ics.iter().map(InputChannel::occupancy).sum();
            let allocated: usize = self.ics.iter().map(InputChannel::allocated_vcs).sum();
            self.utilization.sample(occupied, allocated);
        }
    }

    pub fn commit(&mut self, cycle: u64) {
        self.controller.commit();
        self.vca.commit();
        for (out_port, in_port, flit) in self.crossbar.drain(..) {
            self.ocs[out_port].accept(in_port, flit);
        }
        if let Some(flit) = self.injection.take() {
            let core_port = self.port_map.core_port();
            self.ics[core_port].store(flit, cycle);
        }
    }

    /// The flit sent on the link towards `dir` this cycle.
    pub fn take_link_out(&mut self, dir: Direction) -> Option<Flit> {
        if dir.is_link() {
            self.link_out[dir.index()].take()
        } else {
            None
        }
    }

    /// Store a flit arriving on the link at side `dir`.
    pub fn store_from_link(&mut self, dir: Direction, flit: Flit, cycle: u64) {
        match self.port_map.port(dir) {
            Some(port) => self.ics[port].store(flit, cycle),
            None => error!(self.entity ; "no input channel at {} for {}", dir, flit),
        }
    }

    /// Publish the credit and congestion signals of every input channel.
    pub fn latch(&mut self) {
        for ic in &mut self.ics {
            ic.latch();
        }
    }

    /// Flits buffered in the link input channels.
    #[must_use]
    pub fn stress(&self) -> u32 {
        self.ics
            .iter()
            .filter(|ic| ic.direction().is_link())
            .map(InputChannel::stress)
            .sum()
    }

    /// Signals of the input channel at side `dir`.
    #[must_use]
    pub fn feedback(&self, dir: Direction) -> Option<Feedback> {
        let ic = &self.ics[self.port_map.port(dir)?];
        Some(Feedback {
            credits: (0..ic.num_vcs())
                .map(|vc| {
                    let credit = ic.credit(vc);
                    (*credit.read(), credit.event())
                })
                .collect(),
            vc_congested: ic.vc_congested().to_vec(),
            congested: ic.is_congested(),
        })
    }

    /// Take the signals of the neighbour towards `dir`.
    pub fn apply_feedback(&mut self, dir: Direction, feedback: &Feedback, stress: u32) {
        let Some(port) = self.port_map.port(dir) else {
            return;
        };
        let oc = &mut self.ocs[port];
        for (vc, &(credit, event)) in feedback.credits.iter().enumerate() {
            if event {
                trace!(self.entity ; "credit from {} vc{}: {:?}", dir, vc, credit);
                self.vca.credit(dir, vc, credit.free_vc);
            }
            oc.set_credit(vc, credit);
        }
        for (vc, &congested) in feedback.vc_congested.iter().enumerate() {
            oc.set_vc_congested(vc, congested);
            self.vca.set_congested(dir, vc, congested);
        }
        self.controller.set_congested(dir, feedback.congested);
        self.controller.set_stress(dir, stress);
    }

    /// Mark a direction failed or working.
    ///
    /// Failing the core direction also turns the core's generator off.
    pub fn set_fault(&mut self, dir: Direction, fail: bool) {
        self.controller.set_fault(dir, fail);
        if let Some(port) = self.port_map.port(dir) {
            self.ocs[port].set_failed(fail);
        }
        if dir == Direction::Core {
            self.core.set_enabled(!fail);
        }
    }

    #[must_use]
    pub fn is_faulty(&self, dir: Direction) -> bool {
        self.controller.is_faulty(dir)
    }

    #[must_use]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    #[must_use]
    pub fn vca(&self) -> &VcAllocator {
        &self.vca
    }

    #[must_use]
    pub fn core(&self) -> &Core {
        &self.core
    }

    #[must_use]
    pub fn input(&self, dir: Direction) -> Option<&InputChannel> {
        self.port_map.port(dir).map(|port| &self.ics[port])
    }

    #[must_use]
    pub fn output(&self, dir: Direction) -> Option<&OutputChannel> {
        self.port_map.port(dir).map(|port| &self.ocs[port])
    }

    /// Collect the statistics of this tile. Flits still held by the router
    /// are counted as unrouted.
    #[must_use]
    pub fn stats(&self, end_cycle: u64) -> TileStats {
        let mut stats = TileStats {
            tile: self.id,
            core: self.core.stats().clone(),
            channels: self
                .ocs
                .iter()
                .map(|oc| (oc.direction(), oc.stats().clone()))
                .collect(),
            utilization: self.utilization,
            total_buffers: self.total_buffers,
            total_vcs: self.total_vcs,
            ..TileStats::default()
        };
        for ic in &self.ics {
            let ic_stats = ic.stats();
            stats.failed_flits += ic_stats.failed_flits;
            stats.failed_packets += ic_stats.failed_packets;
            stats.failed_total_latency += ic_stats.failed_total_latency;
            stats.failed_worst_latency = stats
                .failed_worst_latency
                .max(ic_stats.failed_worst_latency);
            stats.dropped_flits += ic_stats.dropped_flits;
            stats.dropped_packets += ic_stats.dropped_packets;
        }
        let held = self
            .ics
            .iter()
            .flat_map(|ic| ic.flits())
            .chain(self.ocs.iter().flat_map(|oc| oc.flits()));
        for flit in held {
            stats
                .unrouted
                .record(flit.is_head_like(), end_cycle.saturating_sub(flit.sim.generated_at));
        }
        stats
    }
}
