// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The compute core of a tile: a traffic generator and a sink.
//!
//! A generating core starts packets at a constant bit rate (CBR) or in
//! exponentially distributed bursts, and injects their flits into VC 0 of the
//! core input channel whenever that VC advertises a free buffer. Every core
//! also receives the flits ejected at its tile and records their statistics.

use std::collections::HashMap;
use std::rc::Rc;

use noc_config::{AppKind, DestinationKind, NocConfig, RoutingAlgorithm, TileApp};
use noc_track::entity::Entity;
use noc_track::{debug, error, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::credit::CreditLine;
use crate::flit::{Flit, FlitFactory, RouteTarget};
use crate::stats::CoreStats;

/// Number of flits of a packet of `pkt_size` bytes.
#[must_use]
pub fn flits_per_packet(config: &NocConfig, pkt_size: usize) -> u32 {
    let data = pkt_size.saturating_sub(config.head_payload);
    (data.div_ceil(config.data_payload) + 1) as u32
}

/// Cycles between packet starts for a load given in percent.
#[must_use]
pub fn packet_interval(load: u32, num_flits: u32) -> u64 {
    100_u64.div_ceil(u64::from(load.max(1))) * u64::from(num_flits) * 2
}

fn sample_exponential(rng: &mut StdRng, mean: f64) -> f64 {
    let u: f64 = rng.r#gen();
    -mean * (1.0 - u).ln()
}

/// The packet currently being injected.
#[derive(Clone, Copy, Debug)]
struct Injection {
    packet_id: u64,
    target: u64,
    next_flit: u32,
    next_flit_at: u64,
    started_at: u64,
}

pub struct Core {
    pub entity: Rc<Entity>,
    tile: usize,
    num_tiles: usize,
    app: TileApp,
    factory: FlitFactory,
    source_routed: bool,
    rng: StdRng,
    num_flits: u32,
    interval: u64,
    warmup_cycles: u64,
    tg_cycles: u64,
    enabled: bool,
    next_packet_at: u64,
    current: Option<Injection>,
    burst_remaining: u64,
    next_packet_id: u64,
    head_generated_at: HashMap<(usize, u64), u64>,
    stats: CoreStats,
}

impl Core {
    #[must_use]
    pub fn new(parent: &Rc<Entity>, config: &NocConfig, tile: usize) -> Self {
        let app = config.effective_app(tile);
        let num_flits = flits_per_packet(config, app.pkt_size);
        let interval = packet_interval(app.load, num_flits);
        let entity = Entity::child(parent, "core");
        if app.app.generates() {
            info!(entity ; "{:?} traffic, {} flits every {} cycles", app.app, num_flits, interval);
        }
        Self {
            entity,
            tile,
            num_tiles: config.num_tiles(),
            factory: FlitFactory::new(tile, config.routing),
            source_routed: config.routing == RoutingAlgorithm::Source,
            rng: StdRng::seed_from_u64(config.seed.wrapping_mul(31).wrapping_add(tile as u64)),
            num_flits,
            interval,
            warmup_cycles: config.warmup_cycles,
            tg_cycles: config.tg_cycles,
            enabled: true,
            next_packet_at: config.warmup_cycles,
            current: None,
            burst_remaining: 0,
            next_packet_id: 0,
            head_generated_at: HashMap::new(),
            stats: CoreStats::default(),
            app,
        }
    }

    /// Turn the ip-core on or off. A core that is off starts no new packets.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn app(&self) -> AppKind {
        self.app.app
    }

    /// Target of the next packet and the tile it is going to, when known.
    fn next_target(&mut self) -> (u64, Option<usize>) {
        match self.app.destination {
            DestinationKind::Fixed if self.source_routed => (self.app.fixed_target, None),
            DestinationKind::Fixed => (self.app.fixed_target, Some(self.app.fixed_target as usize)),
            DestinationKind::Random => {
                let mut dest = self.rng.gen_range(0..self.num_tiles - 1);
                if dest >= self.tile {
                    dest += 1;
                }
                (dest as u64, Some(dest))
            }
        }
    }

    /// Cycles until the packet after the one starting now.
    fn packet_gap(&mut self) -> u64 {
        if self.app.app != AppKind::Bursty {
            return self.interval;
        }
        if self.burst_remaining == 0 {
            let len = sample_exponential(&mut self.rng, self.app.avg_burst_len).round() as u64;
            self.burst_remaining = len.max(1);
        }
        self.burst_remaining -= 1;
        if self.burst_remaining == 0 {
            let off = sample_exponential(&mut self.rng, self.app.avg_off_time).round() as u64;
            self.interval + off
        } else {
            self.interval
        }
    }

    fn start_packet(&mut self, cycle: u64, accept: &[bool]) {
        if !self.enabled
            || cycle < self.warmup_cycles
            || cycle > self.tg_cycles
            || cycle < self.next_packet_at
        {
            return;
        }
        let (target, dest) = self.next_target();
        if let Some(dest) = dest {
            if !accept.get(dest).copied().unwrap_or(false) {
                debug!(self.entity ; "tile {} does not accept traffic, skipping packet", dest);
                self.next_packet_at = cycle + self.interval;
                return;
            }
        }
        let packet_id = self.next_packet_id;
        self.next_packet_id += 1;
        let gap = self.packet_gap();
        self.next_packet_at = cycle + gap;
        self.current = Some(Injection {
            packet_id,
            target,
            next_flit: 0,
            next_flit_at: cycle,
            started_at: cycle,
        });
    }

    /// Produce the next flit to inject, if any.
    ///
    /// `credit` is the committed credit of VC 0 of the core input channel and
    /// `accept` tells which tiles still take traffic.
    pub fn generate(&mut self, cycle: u64, credit: &CreditLine, accept: &[bool]) -> Option<Flit> {
        if !self.app.app.generates() {
            return None;
        }
        if self.current.is_none() {
            self.start_packet(cycle, accept);
        }
        let mut injection = self.current?;
        if cycle < injection.next_flit_at || !credit.free_buf {
            return None;
        }

        let id = injection.next_flit;
        let last = id + 1 == self.num_flits;
        let flit = match (id, last) {
            (0, true) => self.factory.make_hdt(injection.packet_id, id, injection.target, cycle),
            (0, false) => self.factory.make_head(injection.packet_id, id, injection.target, cycle),
            (_, true) => self.factory.make_tail(injection.packet_id, id, cycle),
            (_, false) => self.factory.make_data(injection.packet_id, id, cycle),
        };
        if flit.is_head_like() {
            self.stats.sent_packets += 1;
        }
        self.stats.sent_flits += 1;

        if last {
            self.current = None;
            self.next_packet_at = self.next_packet_at.max(cycle + 1);
        } else {
            injection.next_flit += 1;
            injection.next_flit_at = cycle + self.app.flit_interval.max(1);
            self.current = Some(injection);
        }
        trace!(self.entity ; "inject {} (packet started at {})", flit, injection.started_at);
        Some(flit)
    }

    /// Take a flit ejected at this tile.
    pub fn receive(&mut self, mut flit: Flit, cycle: u64) {
        flit.sim.arrived_at = Some(cycle);
        if let Some(RouteTarget::Destination(dest)) = flit.header().map(|h| h.target) {
            if dest != self.tile {
                error!(self.entity ; "{} ejected at the wrong tile", flit);
            }
        }
        debug!(self.entity ; "receive {}", flit);

        let stats = &mut self.stats;
        let latency = cycle.saturating_sub(flit.sim.generated_at);
        stats.received_flits += 1;
        stats.total_flit_latency += latency;
        stats.worst_flit_latency = stats.worst_flit_latency.max(latency);
        stats.total_wait += flit.sim.wait_cycles;
        stats.worst_wait = stats.worst_wait.max(flit.sim.wait_cycles);

        if flit.is_head_like() {
            let hops = u64::from(flit.hop_count);
            stats.received_packets += 1;
            stats.total_hops += hops;
            stats.worst_hops = stats.worst_hops.max(hops);
            self.head_generated_at
                .insert(flit.packet_key(), flit.sim.generated_at);
        }
        if flit.is_tail_like() {
            if let Some(generated_at) = self.head_generated_at.remove(&flit.packet_key()) {
                let latency = cycle.saturating_sub(generated_at);
                stats.completed_packets += 1;
                stats.total_packet_latency += latency;
                stats.worst_packet_latency = stats.worst_packet_latency.max(latency);
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> &CoreStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use noc_track::entity::toplevel;
    use noc_track::tracker::dev_null_tracker;

    use super::*;

    fn generator(config: &NocConfig) -> Core {
        let top = toplevel(&dev_null_tracker(), "top");
        Core::new(&top, config, 0)
    }

    fn cbr(pkt_size: usize, load: u32) -> NocConfig {
        NocConfig {
            warmup_cycles: 0,
            tiles: vec![TileApp {
                tile: 0,
                app: AppKind::Cbr,
                pkt_size,
                load,
                destination: DestinationKind::Fixed,
                fixed_target: 5,
                flit_interval: 2,
                ..TileApp::default()
            }],
            ..NocConfig::default()
        }
    }

    #[test]
    fn packet_sizing() {
        let config = NocConfig::default();
        assert_eq!(flits_per_packet(&config, 1), 1);
        assert_eq!(flits_per_packet(&config, 17), 5);
        assert_eq!(flits_per_packet(&config, 18), 6);
        assert_eq!(packet_interval(50, 5), 20);
        assert_eq!(packet_interval(30, 1), 8);
    }

    #[test]
    fn cbr_spacing() {
        let config = cbr(9, 100);
        let mut core = generator(&config);
        let accept = vec![true; 16];
        let free = CreditLine::default();

        let injected: Vec<(u64, &'static str)> = (0..16)
            .filter_map(|cycle| {
                core.generate(cycle, &free, &accept)
                    .map(|flit| (cycle, flit.kind_name()))
            })
            .collect();
        // Three flits, two cycles apart, a new packet every six cycles
        assert_eq!(
            injected,
            vec![
                (0, "HEAD"),
                (2, "DATA"),
                (4, "TAIL"),
                (6, "HEAD"),
                (8, "DATA"),
                (10, "TAIL"),
                (12, "HEAD"),
                (14, "DATA"),
            ]
        );
        assert_eq!(core.stats().sent_packets, 3);
    }

    #[test]
    fn waits_for_credit() {
        let config = cbr(1, 100);
        let mut core = generator(&config);
        let accept = vec![true; 16];
        let full = CreditLine::new(false, false);
        assert!(core.generate(0, &full, &accept).is_none());
        assert!(core.generate(1, &full, &accept).is_none());
        let flit = core.generate(2, &CreditLine::default(), &accept).unwrap();
        assert_eq!(flit.kind_name(), "HDT");
        assert_eq!(flit.sim.generated_at, 2);
    }

    #[test]
    fn skips_refused_destination() {
        let config = cbr(1, 50);
        let mut core = generator(&config);
        let mut accept = vec![true; 16];
        accept[5] = false;
        let free = CreditLine::default();
        assert!(core.generate(0, &free, &accept).is_none());
        accept[5] = true;
        assert!(core.generate(1, &free, &accept).is_none());
        assert!(core.generate(4, &free, &accept).is_some());
        assert_eq!(core.stats().sent_packets, 1);
    }

    #[test]
    fn disabled_core_is_quiet() {
        let config = cbr(1, 100);
        let mut core = generator(&config);
        core.set_enabled(false);
        let accept = vec![true; 16];
        for cycle in 0..10 {
            assert!(core.generate(cycle, &CreditLine::default(), &accept).is_none());
        }
    }

    #[test]
    fn random_destination_never_self() {
        let mut config = cbr(1, 100);
        config.tiles[0].destination = DestinationKind::Random;
        let mut core = generator(&config);
        let accept = vec![true; 16];
        for cycle in 0..200 {
            if let Some(flit) = core.generate(cycle, &CreditLine::default(), &accept) {
                let target = flit.header().unwrap().target;
                assert_ne!(target, RouteTarget::Destination(0));
            }
        }
        assert!(core.stats().sent_packets > 50);
    }

    #[test]
    fn sink_latency() {
        let config = NocConfig::default();
        let mut core = generator(&config);
        let factory = FlitFactory::new(3, RoutingAlgorithm::Xy);
        let mut head = factory.make_head(0, 0, 0, 10);
        head.hop_count = 3;
        head.sim.wait_cycles = 4;
        let tail = factory.make_tail(0, 1, 12);

        core.receive(head, 20);
        core.receive(tail, 25);
        let stats = core.stats();
        assert_eq!(stats.received_packets, 1);
        assert_eq!(stats.completed_packets, 1);
        assert_eq!(stats.total_packet_latency, 15);
        assert_eq!(stats.worst_flit_latency, 13);
        assert_eq!(stats.worst_hops, 3);
        assert_eq!(stats.total_wait, 4);
    }
}
