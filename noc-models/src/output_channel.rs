// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The output channel of one side of a tile.
//!
//! Flits written by the crossbar land in a register per input port. Each
//! cycle the channel:
//!
//!  1. picks one VC register to send on the link, provided the downstream
//!     input channel has advertised a free buffer for that VC,
//!  2. moves waiting input registers into free VC registers.
//!
//! The channel towards the local core needs no credits.

use std::collections::HashMap;
use std::rc::Rc;

use noc_components::arbiter::policy::{Adaptive, build_policy};
use noc_components::arbiter::{Arbitrate, ArbitrationKind, Request};
use noc_config::NocConfig;
use noc_track::entity::Entity;
use noc_track::{debug, trace, warn};

use crate::credit::CreditLine;
use crate::direction::Direction;
use crate::flit::Flit;
use crate::stats::ChannelStats;

pub struct OutputChannel {
    pub entity: Rc<Entity>,
    direction: Direction,
    r_in: Vec<Option<Flit>>,
    r_vc: Vec<Option<Flit>>,
    credit_in: Vec<CreditLine>,
    vc_congested_in: Vec<bool>,
    failed: bool,
    arbitration: ArbitrationKind,
    vc_arbiter: Box<dyn Arbitrate>,
    input_arbiter: Adaptive,
    write_through: bool,
    congestion_use: bool,
    congestion_priority: u64,
    hop_use: bool,
    hop_level: u32,

    /// Cycle at which the head of each packet in transit entered the tile.
    packet_entry: HashMap<(usize, u64), u64>,
    stats: ChannelStats,
}

impl OutputChannel {
    #[must_use]
    pub fn new(
        parent: &Rc<Entity>,
        config: &NocConfig,
        direction: Direction,
        num_ports: usize,
    ) -> Self {
        Self {
            entity: Entity::child(parent, &format!("oc_{direction}")),
            direction,
            r_in: vec![None; num_ports],
            r_vc: vec![None; config.num_vcs],
            credit_in: vec![CreditLine::default(); config.num_vcs],
            vc_congested_in: vec![false; config.num_vcs],
            failed: false,
            arbitration: config.arbitration,
            vc_arbiter: build_policy(config.arbitration, config.num_vcs),
            input_arbiter: Adaptive::new(num_ports),
            write_through: config.write_through_outport,
            congestion_use: config.congestion_use,
            congestion_priority: config.congestion_priority,
            hop_use: config.hop_use,
            hop_level: config.hop_level,
            packet_entry: HashMap::new(),
            stats: ChannelStats::default(),
        }
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether input port `port` may write a flit this cycle.
    #[must_use]
    pub fn in_ready(&self, port: usize) -> bool {
        !self.failed && self.r_in[port].is_none()
    }

    /// Take a flit from the crossbar. Called during commit.
    pub fn accept(&mut self, port: usize, flit: Flit) {
        if self.failed {
            warn!(self.entity ; "{} written to a failed channel", flit);
        }
        let vc = flit.vc_id;
        if self.write_through && vc < self.r_vc.len() && self.r_vc[vc].is_none() {
            trace!(self.entity ; "write through {} from port {}", flit, port);
            self.r_vc[vc] = Some(flit);
            return;
        }
        trace!(self.entity ; "port {} holds {}", port, flit);
        self.r_in[port] = Some(flit);
    }

    fn hop_bonus(&self, flit: &Flit) -> u64 {
        if self.hop_use {
            u64::from(flit.hop_count.saturating_sub(self.hop_level))
        } else {
            0
        }
    }

    /// Advance one cycle. Returns the flit sent on the link or to the core.
    pub fn evaluate(&mut self, cycle: u64) -> Option<Flit> {
        if self.failed {
            return None;
        }
        let sent = self.emit(cycle);
        self.fill_vc_registers();
        sent
    }

    fn emit(&mut self, cycle: u64) -> Option<Flit> {
        let is_link = self.direction.is_link();
        let requests: Vec<Request> = self
            .r_vc
            .iter()
            .enumerate()
            .map(|(v, flit)| match flit {
                Some(flit) => {
                    let mut weight = self.hop_bonus(flit);
                    if self.congestion_use && !self.vc_congested_in[v] {
                        weight += self.congestion_priority;
                    }
                    Request::new(!is_link || self.credit_in[v].free_buf, weight)
                }
                None => Request::pending(false),
            })
            .collect();
        let v = self.vc_arbiter.arbitrate(&self.entity, cycle, &requests)?;
        if !requests[v].pending {
            return None;
        }

        let mut flit = self.r_vc[v].take()?;
        if is_link {
            flit.hop_count += 1;
        }
        self.record(cycle, &flit);
        debug!(self.entity ; "send {}", flit);
        Some(flit)
    }

    fn record(&mut self, cycle: u64, flit: &Flit) {
        let entered = flit.sim.entered_tile_at;
        self.stats
            .record_flit(cycle, cycle.saturating_sub(entered));
        if flit.is_head_like() {
            self.packet_entry.insert(flit.packet_key(), entered);
        }
        if flit.is_tail_like() {
            if let Some(entry) = self.packet_entry.remove(&flit.packet_key()) {
                self.stats.record_packet(cycle.saturating_sub(entry));
            }
        }
    }

    fn fill_vc_registers(&mut self) {
        for v in 0..self.r_vc.len() {
            if self.r_vc[v].is_some() {
                continue;
            }
            let candidates: Vec<(usize, u64)> = self
                .r_in
                .iter()
                .enumerate()
                .filter_map(|(port, flit)| match flit {
                    Some(flit) if flit.vc_id == v => Some((port, self.hop_bonus(flit))),
                    _ => None,
                })
                .collect();
            let winner = match self.arbitration {
                ArbitrationKind::Adaptive => {
                    for &(port, _) in &candidates {
                        self.input_arbiter.age(port);
                    }
                    let winner = self.input_arbiter.pick(&candidates);
                    if let Some(port) = winner {
                        self.input_arbiter.reset(port);
                    }
                    winner
                }
                ArbitrationKind::Sequence | ArbitrationKind::RoundRobin => {
                    candidates.first().map(|&(port, _)| port)
                }
            };
            if let Some(port) = winner {
                self.r_vc[v] = self.r_in[port].take();
            }
        }
    }

    /// Latch a credit returned by the downstream input channel.
    pub fn set_credit(&mut self, vc: usize, credit: CreditLine) {
        self.credit_in[vc] = credit;
    }

    #[must_use]
    pub fn credit(&self, vc: usize) -> CreditLine {
        self.credit_in[vc]
    }

    pub fn set_vc_congested(&mut self, vc: usize, congested: bool) {
        self.vc_congested_in[vc] = congested;
    }

    pub fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    #[must_use]
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Flits still held in the channel registers.
    pub fn flits(&self) -> impl Iterator<Item = &Flit> {
        self.r_in.iter().chain(self.r_vc.iter()).flatten()
    }
}

#[cfg(test)]
mod tests {
    use noc_config::RoutingAlgorithm;
    use noc_track::entity::toplevel;
    use noc_track::tracker::dev_null_tracker;

    use super::*;
    use crate::flit::FlitFactory;

    fn channel(config: &NocConfig, direction: Direction) -> OutputChannel {
        let top = toplevel(&dev_null_tracker(), "top");
        OutputChannel::new(&top, config, direction, 5)
    }

    fn adaptive() -> NocConfig {
        NocConfig {
            arbitration: ArbitrationKind::Adaptive,
            ..NocConfig::default()
        }
    }

    fn flit(vc: usize, entered: u64) -> Flit {
        let mut flit = FlitFactory::new(0, RoutingAlgorithm::Xy).make_hdt(vc as u64, 0, 3, 0);
        flit.vc_id = vc;
        flit.sim.entered_tile_at = entered;
        flit
    }

    #[test]
    fn staged_then_sent() {
        let config = adaptive();
        let mut oc = channel(&config, Direction::East);
        oc.accept(2, flit(1, 4));
        assert!(!oc.in_ready(2));
        assert!(oc.in_ready(0));

        // First cycle moves the flit into its VC register
        assert_eq!(oc.evaluate(5), None);
        assert!(oc.in_ready(2));
        let sent = oc.evaluate(6).unwrap();
        assert_eq!(sent.hop_count, 1);
        assert_eq!(oc.stats().flits, 1);
        assert_eq!(oc.stats().packets, 1);
        assert_eq!(oc.stats().total_packet_latency, 2);
    }

    #[test]
    fn waits_for_credit() {
        let config = NocConfig {
            write_through_outport: true,
            ..adaptive()
        };
        let mut oc = channel(&config, Direction::South);
        oc.set_credit(0, CreditLine::new(false, false));
        oc.accept(0, flit(0, 0));
        assert!(oc.in_ready(0));
        assert_eq!(oc.evaluate(1), None);
        assert_eq!(oc.evaluate(2), None);

        oc.set_credit(0, CreditLine::new(false, true));
        assert!(oc.evaluate(3).is_some());
    }

    #[test]
    fn core_needs_no_credit() {
        let config = NocConfig {
            write_through_outport: true,
            ..adaptive()
        };
        let mut oc = channel(&config, Direction::Core);
        oc.set_credit(2, CreditLine::new(false, false));
        oc.accept(1, flit(2, 0));
        let sent = oc.evaluate(1).unwrap();
        assert_eq!(sent.hop_count, 0);
    }

    #[test]
    fn failed_channel_is_idle() {
        let config = adaptive();
        let mut oc = channel(&config, Direction::West);
        oc.accept(0, flit(0, 0));
        oc.set_failed(true);
        assert!(!oc.in_ready(1));
        assert_eq!(oc.evaluate(1), None);
        assert_eq!(oc.evaluate(2), None);
        assert_eq!(oc.flits().count(), 1);
    }

    #[test]
    fn one_input_per_vc_register() {
        let config = NocConfig {
            arbitration: ArbitrationKind::Sequence,
            ..NocConfig::default()
        };
        let mut oc = channel(&config, Direction::North);
        oc.set_credit(0, CreditLine::new(false, false));
        oc.accept(3, flit(0, 0));
        oc.accept(1, flit(0, 0));
        assert_eq!(oc.evaluate(0), None);
        // Lowest input port moved first
        assert!(oc.in_ready(1));
        assert!(!oc.in_ready(3));
        assert_eq!(oc.flits().count(), 2);
    }
}
