// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The input channel of one link.
//!
//! Flits arriving on the link are stored in the virtual channel named by
//! their `vc_id`. Each cycle two arbitration passes run over the VCs:
//!
//!  - the _route_ pass asks the [`Controller`] for the output direction of
//!    an unrouted packet,
//!  - the _transmit_ pass moves one flit of a routed packet through the
//!    crossbar, first obtaining a VC on the next hop from the
//!    [`VcAllocator`] for HEAD/HDT flits.
//!
//! A credit is returned upstream for every change in VC occupancy.

use std::rc::Rc;

use noc_components::arbiter::policy::build_policy;
use noc_components::arbiter::{Arbitrate, Request};
use noc_components::fifo::BoundedFifo;
use noc_components::signal::Signal;
use noc_config::NocConfig;
use noc_track::entity::Entity;
use noc_track::{debug, error, trace, warn};

use crate::controller::{Controller, RouteQuery, RouteReply};
use crate::credit::CreditLine;
use crate::direction::Direction;
use crate::fault_info::FaultInfo;
use crate::flit::{Flit, RouteTarget};
use crate::routing::RouteRequest;
use crate::routing::source::BITS_PER_HOP;
use crate::topology::PortMap;
use crate::vc_allocator::VcAllocator;

pub struct VirtualChannel {
    pub queue: BoundedFifo<Flit>,

    /// Output direction of the packet at the head of the queue.
    pub route: Option<Direction>,

    /// VC granted on the next hop.
    pub next_vc: Option<usize>,

    /// Returned by the controller, forwarded with the head flit.
    pub fault_info: FaultInfo,

    /// The packet could not be routed and is being thrown away.
    pub discarding: bool,
}

impl VirtualChannel {
    fn new(num_bufs: usize) -> Self {
        Self {
            queue: BoundedFifo::new(num_bufs),
            route: None,
            next_vc: None,
            fault_info: FaultInfo::default(),
            discarding: false,
        }
    }

    /// Whether a packet currently holds this VC.
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        !self.queue.is_empty() || self.route.is_some() || self.discarding
    }

    fn release(&mut self) {
        self.route = None;
        self.next_vc = None;
        self.fault_info = FaultInfo::default();
        self.discarding = false;
    }
}

/// Flits and packets an input channel had to throw away.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputStats {
    /// Flits of packets that could not be routed.
    pub failed_flits: u64,
    pub failed_packets: u64,
    pub failed_total_latency: u64,
    pub failed_worst_latency: u64,

    /// Flits lost to full queues or protocol violations.
    pub dropped_flits: u64,
    pub dropped_packets: u64,
}

/// What an input channel uses from the rest of its tile.
pub struct TileView<'a> {
    pub controller: &'a mut Controller,
    pub vca: &'a mut VcAllocator,
    pub port_map: &'a PortMap,

    /// `in_ready[output port][input port]` as seen at the start of the cycle.
    pub in_ready: &'a [Vec<bool>],
}

pub struct InputChannel {
    pub entity: Rc<Entity>,
    direction: Direction,
    port: usize,
    vcs: Vec<VirtualChannel>,
    route_arbiter: Box<dyn Arbitrate>,
    transmit_arbiter: Box<dyn Arbitrate>,
    route_pending: Option<usize>,
    vc_pending: Option<usize>,
    credit_out: Vec<Signal<CreditLine>>,
    stress: u32,
    congested: bool,
    vc_congested: Vec<bool>,
    congestion_level: usize,
    half_num_bufs: usize,
    hop_use: bool,
    hop_level: u32,
    stats: InputStats,
}

impl InputChannel {
    #[must_use]
    pub fn new(parent: &Rc<Entity>, config: &NocConfig, direction: Direction, port: usize) -> Self {
        let entity = Entity::child(parent, &format!("ic_{direction}"));
        Self {
            entity,
            direction,
            port,
            vcs: (0..config.num_vcs)
                .map(|_| VirtualChannel::new(config.num_bufs))
                .collect(),
            route_arbiter: build_policy(config.arbitration, config.num_vcs),
            transmit_arbiter: build_policy(config.arbitration, config.num_vcs),
            route_pending: None,
            vc_pending: None,
            credit_out: vec![Signal::default(); config.num_vcs],
            stress: 0,
            congested: false,
            vc_congested: vec![false; config.num_vcs],
            congestion_level: config.congestion_level(),
            half_num_bufs: config.half_num_bufs(),
            hop_use: config.hop_use,
            hop_level: config.hop_level,
            stats: InputStats::default(),
        }
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Store a flit arriving from the link. Called during commit.
    pub fn store(&mut self, mut flit: Flit, cycle: u64) {
        let vc = flit.vc_id;
        if vc >= self.vcs.len() {
            error!(self.entity ; "{} names an unknown vc, dropped", flit);
            self.drop_flit(&flit);
            return;
        }
        flit.sim.entered_tile_at = cycle;
        let queue = &mut self.vcs[vc].queue;
        match queue.push(flit) {
            Ok(()) => {
                trace!(self.entity ; "store {}", flit);
                self.stress += 1;
                let free_buf = !queue.is_full();
                self.credit_out[vc].write(CreditLine::new(false, free_buf));
            }
            Err(e) => {
                error!(self.entity ; "{}: {} dropped", e, flit);
                self.drop_flit(&flit);
            }
        }
    }

    fn drop_flit(&mut self, flit: &Flit) {
        self.stats.dropped_flits += 1;
        if flit.is_head_like() {
            self.stats.dropped_packets += 1;
        }
    }

    /// Run both arbitration passes. Returns the output port and flit to
    /// write into the crossbar, if any.
    pub fn evaluate(&mut self, cycle: u64, tile: &mut TileView) -> Option<(usize, Flit)> {
        if let Some(reply) = tile.controller.take_reply(self.port) {
            self.apply_route(reply);
        }
        if let Some(grant) = tile.vca.take_grant(self.port) {
            let vc = self.vc_pending.take();
            if let (Some(vc), Some(next_vc)) = (vc, grant) {
                trace!(self.entity ; "vc{} has next vc{}", vc, next_vc);
                self.vcs[vc].next_vc = Some(next_vc);
            }
        }
        self.route_pass(cycle, tile.controller);
        self.transmit_pass(cycle, tile)
    }

    fn apply_route(&mut self, reply: RouteReply) {
        self.route_pending = None;
        let vc = &mut self.vcs[reply.vc];
        vc.fault_info = reply.fault_info;
        match reply.direction {
            Some(dir) => {
                vc.route = Some(dir);
                if let Some(header) = vc.queue.peek_mut().and_then(|head| head.header_mut()) {
                    if let RouteTarget::SourceRoute(code) = header.target {
                        header.target = RouteTarget::SourceRoute(code >> BITS_PER_HOP);
                    }
                }
            }
            None => {
                warn!(self.entity ; "vc{}: discarding unroutable packet", reply.vc);
                vc.discarding = true;
            }
        }
    }

    fn weight(&self, flit: Option<&Flit>) -> u64 {
        match flit {
            Some(flit) if self.hop_use => u64::from(flit.hop_count.saturating_sub(self.hop_level)),
            _ => 0,
        }
    }

    fn route_pass(&mut self, cycle: u64, controller: &mut Controller) {
        if self.route_pending.is_some() {
            return;
        }
        let requests: Vec<Request> = self
            .vcs
            .iter()
            .map(|vc| {
                Request::new(
                    !vc.queue.is_empty() && vc.route.is_none() && !vc.discarding,
                    self.weight(vc.queue.peek()),
                )
            })
            .collect();
        let Some(v) = self.route_arbiter.arbitrate(&self.entity, cycle, &requests) else {
            return;
        };
        if !requests[v].pending {
            return;
        }

        let vc = &mut self.vcs[v];
        let Some(head) = vc.queue.peek() else {
            return;
        };
        match head.header() {
            Some(header) => {
                let query = RouteQuery {
                    vc: v,
                    request: RouteRequest {
                        arrival: self.direction,
                        source: head.source_tile,
                        target: header.target,
                        hop_count: head.hop_count,
                    },
                    fault_info: header.fault_info,
                };
                controller.request(self.port, query);
                self.route_pending = Some(v);
            }
            None => {
                error!(self.entity ; "vc{}: {} without a route, clearing queue", v, head);
                let num_packets = vc.queue.iter().filter(|f| f.is_head_like()).count();
                let num_dropped = vc.queue.clear();
                vc.release();
                self.stats.dropped_flits += num_dropped as u64;
                self.stats.dropped_packets += num_packets as u64;
                self.stress -= num_dropped as u32;
                self.credit_out[v].write(CreditLine::new(true, true));
            }
        }
    }

    fn transmit_pass(&mut self, cycle: u64, tile: &mut TileView) -> Option<(usize, Flit)> {
        let requests: Vec<Request> = self
            .vcs
            .iter()
            .map(|vc| {
                Request::new(
                    !vc.queue.is_empty() && (vc.route.is_some() || vc.discarding),
                    self.weight(vc.queue.peek()),
                )
            })
            .collect();
        let v = self
            .transmit_arbiter
            .arbitrate(&self.entity, cycle, &requests)?;
        if !requests[v].pending {
            return None;
        }
        if self.vcs[v].discarding {
            self.discard(v, cycle);
            return None;
        }

        let dir = self.vcs[v].route?;
        let Some(out_port) = tile.port_map.port(dir) else {
            error!(self.entity ; "vc{}: no port towards {}", v, dir);
            self.vcs[v].discarding = true;
            return None;
        };

        let head_like = self.vcs[v].queue.peek().is_some_and(Flit::is_head_like);
        if out_port != tile.port_map.core_port() && self.vcs[v].next_vc.is_none() {
            if head_like && self.vc_pending.is_none() {
                tile.vca.request(self.port, dir);
                self.vc_pending = Some(v);
            }
            return None;
        }
        if !tile.in_ready[out_port][self.port] {
            return None;
        }

        let vc = &mut self.vcs[v];
        let mut flit = vc.queue.pop()?;
        if let Some(next_vc) = vc.next_vc {
            flit.vc_id = next_vc;
        }
        flit.sim.switch_traversals += 1;
        flit.sim.wait_cycles += cycle.saturating_sub(flit.sim.entered_tile_at);
        if let Some(header) = flit.header_mut() {
            header.fault_info = vc.fault_info;
        }
        self.stress -= 1;

        let released = flit.is_tail_like();
        if released {
            vc.release();
        }
        self.credit_out[v].write(CreditLine::new(released, true));
        debug!(self.entity ; "vc{} sends {} to {}", v, flit, dir);
        Some((out_port, flit))
    }

    fn discard(&mut self, v: usize, cycle: u64) {
        let vc = &mut self.vcs[v];
        let Some(flit) = vc.queue.pop() else {
            return;
        };
        let latency = cycle.saturating_sub(flit.sim.generated_at);
        self.stats.failed_flits += 1;
        self.stats.failed_total_latency += latency;
        self.stats.failed_worst_latency = self.stats.failed_worst_latency.max(latency);
        if flit.is_head_like() {
            self.stats.failed_packets += 1;
        }
        self.stress -= 1;

        let released = flit.is_tail_like();
        if released {
            vc.release();
        }
        self.credit_out[v].write(CreditLine::new(released, true));
        debug!(self.entity ; "vc{} discards {}", v, flit);
    }

    /// Publish credits and recompute the congestion signals. Called after
    /// all stores of the cycle.
    pub fn latch(&mut self) {
        for credit in &mut self.credit_out {
            credit.commit();
        }
        for (congested, vc) in self.vc_congested.iter_mut().zip(&self.vcs) {
            *congested = vc.queue.len() > self.congestion_level;
        }
        self.congested = self.occupancy() > self.half_num_bufs;
    }

    #[must_use]
    pub fn credit(&self, vc: usize) -> &Signal<CreditLine> {
        &self.credit_out[vc]
    }

    /// Occupied buffers over all VCs.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.vcs.iter().map(|vc| vc.queue.len()).sum()
    }

    #[must_use]
    pub fn allocated_vcs(&self) -> usize {
        self.vcs.iter().filter(|vc| vc.is_allocated()).count()
    }

    #[must_use]
    pub fn vc(&self, vc: usize) -> &VirtualChannel {
        &self.vcs[vc]
    }

    #[must_use]
    pub fn num_vcs(&self) -> usize {
        self.vcs.len()
    }

    /// Occupied buffers exceed half of the total.
    #[must_use]
    pub fn is_congested(&self) -> bool {
        self.congested
    }

    #[must_use]
    pub fn vc_congested(&self) -> &[bool] {
        &self.vc_congested
    }

    #[must_use]
    pub fn stress(&self) -> u32 {
        self.stress
    }

    #[must_use]
    pub fn stats(&self) -> &InputStats {
        &self.stats
    }

    /// Flits still buffered.
    pub fn flits(&self) -> impl Iterator<Item = &Flit> {
        self.vcs.iter().flat_map(|vc| vc.queue.iter())
    }
}

#[cfg(test)]
mod tests {
    use noc_config::{ArbitrationKind, RoutingAlgorithm};
    use noc_track::entity::toplevel;
    use noc_track::tracker::dev_null_tracker;

    use super::*;
    use crate::flit::FlitFactory;
    use crate::topology::Grid;

    const TILE: usize = 5;

    fn config(num_bufs: usize) -> NocConfig {
        NocConfig {
            arbitration: ArbitrationKind::Adaptive,
            num_bufs,
            ..NocConfig::default()
        }
    }

    struct Bench {
        ic: InputChannel,
        controller: Controller,
        vca: VcAllocator,
        port_map: PortMap,
        in_ready: Vec<Vec<bool>>,
    }

    impl Bench {
        fn new(config: &NocConfig) -> Self {
            let top = toplevel(&dev_null_tracker(), "top");
            let grid = Grid::from_config(config);
            let port_map = PortMap::new(&grid, TILE);
            let num_ports = port_map.num_ports();
            let port = port_map.port(Direction::West).unwrap();
            Self {
                ic: InputChannel::new(&top, config, Direction::West, port),
                controller: Controller::new(&top, config, grid, TILE, num_ports),
                vca: VcAllocator::new(&top, config.num_vcs, num_ports, false),
                in_ready: vec![vec![true; num_ports]; num_ports],
                port_map,
            }
        }

        fn step(&mut self, cycle: u64) -> Option<(usize, Flit)> {
            let mut view = TileView {
                controller: &mut self.controller,
                vca: &mut self.vca,
                port_map: &self.port_map,
                in_ready: &self.in_ready,
            };
            let sent = self.ic.evaluate(cycle, &mut view);
            self.controller.commit();
            self.vca.commit();
            self.ic.latch();
            sent
        }
    }

    fn factory() -> FlitFactory {
        FlitFactory::new(1, RoutingAlgorithm::Xy)
    }

    #[test]
    fn credit_follows_occupancy() {
        let mut bench = Bench::new(&config(2));
        bench.ic.store(factory().make_head(0, 0, 9, 0), 0);
        bench.ic.latch();
        assert_eq!(*bench.ic.credit(0).read(), CreditLine::new(false, true));

        bench.ic.store(factory().make_data(0, 1, 0), 1);
        bench.ic.latch();
        assert_eq!(*bench.ic.credit(0).read(), CreditLine::new(false, false));
        assert_eq!(bench.ic.stress(), 2);

        bench.ic.store(factory().make_tail(0, 2, 0), 2);
        assert_eq!(bench.ic.stats().dropped_flits, 1);
        assert_eq!(bench.ic.occupancy(), 2);
    }

    #[test]
    fn data_flit_on_unrouted_vc_is_dropped() {
        let mut bench = Bench::new(&config(4));
        bench.ic.store(factory().make_data(0, 1, 0), 0);
        bench.ic.store(factory().make_tail(0, 2, 0), 0);
        bench.ic.latch();

        assert!(bench.step(1).is_none());
        assert_eq!(bench.ic.occupancy(), 0);
        assert_eq!(bench.ic.stress(), 0);
        assert!(!bench.ic.vc(0).is_allocated());
        assert_eq!(bench.ic.stats().dropped_flits, 2);
        assert_eq!(bench.ic.stats().dropped_packets, 0);
        assert_eq!(*bench.ic.credit(0).read(), CreditLine::new(true, true));
    }

    #[test]
    fn routed_to_core_without_a_vc() {
        let mut bench = Bench::new(&config(4));
        bench.ic.store(factory().make_hdt(0, 0, TILE as u64, 0), 0);
        bench.ic.latch();

        // Route query this cycle, reply collected on the next.
        assert!(bench.step(1).is_none());
        let (port, flit) = bench.step(2).unwrap();
        assert_eq!(port, bench.port_map.core_port());
        assert_eq!(flit.sim.switch_traversals, 1);
        assert_eq!(flit.sim.wait_cycles, 2);
        assert_eq!(bench.ic.stress(), 0);
        assert!(!bench.ic.vc(0).is_allocated());
        assert_eq!(*bench.ic.credit(0).read(), CreditLine::new(true, true));
    }

    #[test]
    fn link_departure_waits_for_ready() {
        let mut bench = Bench::new(&config(4));
        let east = bench.port_map.port(Direction::East).unwrap();
        let port = bench.port_map.port(Direction::West).unwrap();
        bench.in_ready[east][port] = false;
        bench.ic.store(factory().make_hdt(0, 0, 7, 0), 0);
        bench.ic.latch();

        assert!(bench.step(1).is_none());
        // Routed east: request a VC, then stall on the busy output.
        assert!(bench.step(2).is_none());
        assert!(bench.step(3).is_none());
        assert_eq!(bench.ic.vc(0).next_vc, Some(0));
        assert_eq!(bench.ic.occupancy(), 1);

        bench.in_ready[east][port] = true;
        let (out, flit) = bench.step(4).unwrap();
        assert_eq!(out, east);
        assert_eq!(flit.vc_id, 0);
        assert!(!bench.vca.is_free(Direction::East, 0));
    }
}
