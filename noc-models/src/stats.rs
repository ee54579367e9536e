// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Statistics collected by the channels and cores of the network.
//!
//! Counters are gathered while the simulation runs and combined into a
//! [`NetworkStats`] summary when the network is finalized.

use std::fmt;

use crate::direction::Direction;

fn ratio(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

/// Traffic leaving one output channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub packets: u64,
    pub flits: u64,

    /// Sum over packets of the cycles from the head entering the tile to the
    /// tail leaving it.
    pub total_packet_latency: u64,
    pub total_flit_latency: u64,
    pub first_cycle: Option<u64>,
    pub last_cycle: u64,
}

impl ChannelStats {
    pub fn record_flit(&mut self, cycle: u64, latency: u64) {
        self.flits += 1;
        self.total_flit_latency += latency;
        if self.first_cycle.is_none() {
            self.first_cycle = Some(cycle);
        }
        self.last_cycle = cycle;
    }

    pub fn record_packet(&mut self, latency: u64) {
        self.packets += 1;
        self.total_packet_latency += latency;
    }

    #[must_use]
    pub fn avg_packet_latency(&self) -> f64 {
        ratio(self.total_packet_latency, self.packets)
    }

    #[must_use]
    pub fn avg_flit_latency(&self) -> f64 {
        ratio(self.total_flit_latency, self.flits)
    }

    /// Throughput in Gbps between the first and last flit.
    #[must_use]
    pub fn throughput_gbps(&self, flit_size_bytes: usize, clk_period_ns: f64) -> f64 {
        let Some(first) = self.first_cycle else {
            return 0.0;
        };
        let span = self.last_cycle - first;
        if span == 0 {
            return 0.0;
        }
        (self.flits * flit_size_bytes as u64 * 8) as f64 / (span as f64 * clk_period_ns)
    }
}

/// Traffic generated and received by one core.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoreStats {
    pub sent_packets: u64,
    pub sent_flits: u64,

    /// Packets whose first flit reached this core.
    pub received_packets: u64,
    pub received_flits: u64,

    /// Packets whose last flit reached this core.
    pub completed_packets: u64,
    pub total_packet_latency: u64,
    pub worst_packet_latency: u64,
    pub total_flit_latency: u64,
    pub worst_flit_latency: u64,
    pub total_wait: u64,
    pub worst_wait: u64,
    pub total_hops: u64,
    pub worst_hops: u64,
}

impl CoreStats {
    #[must_use]
    pub fn avg_packet_latency(&self) -> f64 {
        ratio(self.total_packet_latency, self.completed_packets)
    }

    #[must_use]
    pub fn avg_flit_latency(&self) -> f64 {
        ratio(self.total_flit_latency, self.received_flits)
    }

    /// Average cycles a flit spent in input buffers.
    #[must_use]
    pub fn avg_wait(&self) -> f64 {
        ratio(self.total_wait, self.received_flits)
    }

    /// Average hops taken per packet.
    #[must_use]
    pub fn avg_hops(&self) -> f64 {
        ratio(self.total_hops, self.received_packets)
    }
}

/// Mean buffer and VC usage of the input channels of a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Utilization {
    pub samples: u64,
    pub occupied_buffers: u64,
    pub allocated_vcs: u64,
}

impl Utilization {
    pub fn sample(&mut self, occupied_buffers: usize, allocated_vcs: usize) {
        self.samples += 1;
        self.occupied_buffers += occupied_buffers as u64;
        self.allocated_vcs += allocated_vcs as u64;
    }
}

/// Flits still inside the network at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unrouted {
    pub flits: u64,
    pub packets: u64,
    pub total_wait: u64,
    pub worst_wait: u64,
}

impl Unrouted {
    pub fn record(&mut self, head_like: bool, wait: u64) {
        self.flits += 1;
        if head_like {
            self.packets += 1;
        }
        self.total_wait += wait;
        self.worst_wait = self.worst_wait.max(wait);
    }

    #[must_use]
    pub fn avg_wait(&self) -> f64 {
        ratio(self.total_wait, self.flits)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileStats {
    pub tile: usize,
    pub core: CoreStats,
    pub channels: Vec<(Direction, ChannelStats)>,
    pub utilization: Utilization,
    pub total_buffers: usize,
    pub total_vcs: usize,

    /// Packets thrown away because they could not be routed.
    pub failed_flits: u64,
    pub failed_packets: u64,
    pub failed_total_latency: u64,
    pub failed_worst_latency: u64,

    /// Flits lost to protocol violations.
    pub dropped_flits: u64,
    pub dropped_packets: u64,
    pub unrouted: Unrouted,
}

impl TileStats {
    #[must_use]
    pub fn buffer_utilization(&self) -> f64 {
        ratio(
            self.utilization.occupied_buffers,
            self.utilization.samples * self.total_buffers as u64,
        )
    }

    #[must_use]
    pub fn vc_utilization(&self) -> f64 {
        ratio(
            self.utilization.allocated_vcs,
            self.utilization.samples * self.total_vcs as u64,
        )
    }

    #[must_use]
    pub fn avg_failed_latency(&self) -> f64 {
        ratio(self.failed_total_latency, self.failed_flits)
    }

    /// Statistics of the output channel in direction `dir`.
    #[must_use]
    pub fn channel(&self, dir: Direction) -> Option<&ChannelStats> {
        self.channels
            .iter()
            .find(|(d, _)| *d == dir)
            .map(|(_, stats)| stats)
    }
}

/// Summary of a whole run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkStats {
    pub tiles: Vec<TileStats>,
    pub flit_size_bytes: usize,
    pub clk_period_ns: f64,
}

impl NetworkStats {
    #[must_use]
    pub fn new(tiles: Vec<TileStats>, flit_size_bytes: usize, clk_period_ns: f64) -> Self {
        Self {
            tiles,
            flit_size_bytes,
            clk_period_ns,
        }
    }

    fn sum(&self, f: impl Fn(&TileStats) -> u64) -> u64 {
        self.tiles.iter().map(f).sum()
    }

    #[must_use]
    pub fn generated_packets(&self) -> u64 {
        self.sum(|t| t.core.sent_packets)
    }

    #[must_use]
    pub fn generated_flits(&self) -> u64 {
        self.sum(|t| t.core.sent_flits)
    }

    #[must_use]
    pub fn received_packets(&self) -> u64 {
        self.sum(|t| t.core.received_packets)
    }

    #[must_use]
    pub fn received_flits(&self) -> u64 {
        self.sum(|t| t.core.received_flits)
    }

    #[must_use]
    pub fn failed_packets(&self) -> u64 {
        self.sum(|t| t.failed_packets)
    }

    #[must_use]
    pub fn failed_flits(&self) -> u64 {
        self.sum(|t| t.failed_flits)
    }

    #[must_use]
    pub fn dropped_packets(&self) -> u64 {
        self.sum(|t| t.dropped_packets)
    }

    #[must_use]
    pub fn dropped_flits(&self) -> u64 {
        self.sum(|t| t.dropped_flits)
    }

    /// Packets whose first flit was still in flight at the end of the run.
    #[must_use]
    pub fn stranded_packets(&self) -> u64 {
        self.sum(|t| t.unrouted.packets)
    }

    #[must_use]
    pub fn unrouted_flits(&self) -> u64 {
        self.sum(|t| t.unrouted.flits)
    }

    #[must_use]
    pub fn worst_unrouted_wait(&self) -> u64 {
        self.tiles
            .iter()
            .map(|t| t.unrouted.worst_wait)
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn avg_unrouted_wait(&self) -> f64 {
        ratio(self.sum(|t| t.unrouted.total_wait), self.unrouted_flits())
    }

    /// Every generated packet was received, failed, dropped or is still in
    /// flight.
    #[must_use]
    pub fn is_accounted(&self) -> bool {
        self.generated_packets()
            == self.received_packets()
                + self.failed_packets()
                + self.dropped_packets()
                + self.stranded_packets()
    }

    /// Latency and throughput figures do not cover all generated traffic.
    #[must_use]
    pub fn partially_invalid(&self) -> bool {
        self.failed_flits() > 0 || self.unrouted_flits() > 0 || self.dropped_flits() > 0
    }

    #[must_use]
    pub fn avg_packet_latency(&self) -> f64 {
        ratio(
            self.sum(|t| t.core.total_packet_latency),
            self.sum(|t| t.core.completed_packets),
        )
    }

    #[must_use]
    pub fn worst_packet_latency(&self) -> u64 {
        self.tiles
            .iter()
            .map(|t| t.core.worst_packet_latency)
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn avg_flit_latency(&self) -> f64 {
        ratio(
            self.sum(|t| t.core.total_flit_latency),
            self.received_flits(),
        )
    }

    #[must_use]
    pub fn avg_wait(&self) -> f64 {
        ratio(self.sum(|t| t.core.total_wait), self.received_flits())
    }

    #[must_use]
    pub fn avg_hops(&self) -> f64 {
        ratio(self.sum(|t| t.core.total_hops), self.received_packets())
    }

    #[must_use]
    pub fn worst_hops(&self) -> u64 {
        self.tiles
            .iter()
            .map(|t| t.core.worst_hops)
            .max()
            .unwrap_or(0)
    }

    /// Mean throughput of the links that carried traffic.
    #[must_use]
    pub fn avg_link_throughput_gbps(&self) -> f64 {
        let active: Vec<f64> = self
            .tiles
            .iter()
            .flat_map(|t| t.channels.iter())
            .filter(|(dir, stats)| dir.is_link() && stats.flits > 0)
            .map(|(_, stats)| stats.throughput_gbps(self.flit_size_bytes, self.clk_period_ns))
            .collect();
        if active.is_empty() {
            0.0
        } else {
            active.iter().sum::<f64>() / active.len() as f64
        }
    }

    #[must_use]
    pub fn avg_buffer_utilization(&self) -> f64 {
        if self.tiles.is_empty() {
            return 0.0;
        }
        self.tiles
            .iter()
            .map(TileStats::buffer_utilization)
            .sum::<f64>()
            / self.tiles.len() as f64
    }

    #[must_use]
    pub fn avg_vc_utilization(&self) -> f64 {
        if self.tiles.is_empty() {
            return 0.0;
        }
        self.tiles.iter().map(TileStats::vc_utilization).sum::<f64>() / self.tiles.len() as f64
    }
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<28}{:>14}{:>14}", "", "packets", "flits")?;
        for (name, packets, flits) in [
            ("generated", self.generated_packets(), self.generated_flits()),
            ("received", self.received_packets(), self.received_flits()),
            ("failed", self.failed_packets(), self.failed_flits()),
            ("dropped", self.dropped_packets(), self.dropped_flits()),
            ("unrouted", self.stranded_packets(), self.unrouted_flits()),
        ] {
            writeln!(f, "{name:<28}{packets:>14}{flits:>14}")?;
        }
        writeln!(f)?;
        writeln!(f, "{:<28}{:>14.2}", "avg packet latency", self.avg_packet_latency())?;
        writeln!(f, "{:<28}{:>14}", "worst packet latency", self.worst_packet_latency())?;
        writeln!(f, "{:<28}{:>14.2}", "avg flit latency", self.avg_flit_latency())?;
        writeln!(f, "{:<28}{:>14.2}", "avg wait cycles", self.avg_wait())?;
        writeln!(f, "{:<28}{:>14.2}", "avg hop count", self.avg_hops())?;
        writeln!(f, "{:<28}{:>14}", "worst hop count", self.worst_hops())?;
        writeln!(
            f,
            "{:<28}{:>14.3}",
            "avg link throughput (Gbps)",
            self.avg_link_throughput_gbps()
        )?;
        writeln!(
            f,
            "{:<28}{:>13.1}%",
            "buffer utilization",
            self.avg_buffer_utilization() * 100.0
        )?;
        writeln!(
            f,
            "{:<28}{:>13.1}%",
            "vc utilization",
            self.avg_vc_utilization() * 100.0
        )?;
        writeln!(f, "{:<28}{:>14.2}", "avg unrouted wait", self.avg_unrouted_wait())?;
        writeln!(f, "{:<28}{:>14}", "worst unrouted wait", self.worst_unrouted_wait())?;
        if self.partially_invalid() {
            writeln!(f)?;
            writeln!(
                f,
                "results are partially invalid: not all packets were delivered"
            )?;
        }
        Ok(())
    }
}
