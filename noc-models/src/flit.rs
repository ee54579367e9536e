// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The flit: the unit of flow control moved between tiles.
//!
//! A packet is either a single [`FlitKind::Hdt`] flit or a
//! [`FlitKind::Head`] followed by zero or more [`FlitKind::Data`] flits and a
//! final [`FlitKind::Tail`]. Only the first flit of a packet carries a
//! [`RoutingHeader`]; the rest follow the route that was recorded for the
//! virtual channel they occupy.

use std::fmt;

use noc_config::RoutingAlgorithm;

use crate::fault_info::FaultInfo;

/// Where a packet is going.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteTarget {
    /// Destination tile id.
    Destination(usize),

    /// Remaining route code, three bits per hop with the next hop in the
    /// lowest bits.
    SourceRoute(u64),
}

impl RouteTarget {
    /// The value handed to a routing engine.
    #[must_use]
    pub fn code(&self) -> u64 {
        match self {
            RouteTarget::Destination(tile) => *tile as u64,
            RouteTarget::SourceRoute(code) => *code,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutingHeader {
    pub target: RouteTarget,
    pub algorithm: RoutingAlgorithm,
    pub fault_info: FaultInfo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlitKind {
    Head(RoutingHeader),
    Data,
    Tail,
    /// A packet made of a single flit.
    Hdt(RoutingHeader),
}

/// Timing information collected while a flit moves through the network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimData {
    /// Cycle in which the generator created the flit.
    pub generated_at: u64,

    /// Cycle in which the flit was ejected at its destination.
    pub arrived_at: Option<u64>,

    /// Cycle in which the flit was stored by the current tile.
    pub entered_tile_at: u64,

    /// Cycles spent waiting in input channel buffers.
    pub wait_cycles: u64,

    pub switch_traversals: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Flit {
    pub kind: FlitKind,
    pub packet_id: u64,
    pub flit_id: u32,
    pub hop_count: u32,

    /// Virtual channel occupied at the receiving input channel.
    pub vc_id: usize,
    pub source_tile: usize,
    pub sim: SimData,
}

impl Flit {
    /// HEAD or HDT: starts a packet and carries a header.
    #[must_use]
    pub fn is_head_like(&self) -> bool {
        matches!(self.kind, FlitKind::Head(_) | FlitKind::Hdt(_))
    }

    /// TAIL or HDT: ends a packet.
    #[must_use]
    pub fn is_tail_like(&self) -> bool {
        matches!(self.kind, FlitKind::Tail | FlitKind::Hdt(_))
    }

    #[must_use]
    pub fn header(&self) -> Option<&RoutingHeader> {
        match &self.kind {
            FlitKind::Head(header) | FlitKind::Hdt(header) => Some(header),
            FlitKind::Data | FlitKind::Tail => None,
        }
    }

    pub fn header_mut(&mut self) -> Option<&mut RoutingHeader> {
        match &mut self.kind {
            FlitKind::Head(header) | FlitKind::Hdt(header) => Some(header),
            FlitKind::Data | FlitKind::Tail => None,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            FlitKind::Head(_) => "HEAD",
            FlitKind::Data => "DATA",
            FlitKind::Tail => "TAIL",
            FlitKind::Hdt(_) => "HDT",
        }
    }

    /// Identifies the packet across the whole network.
    #[must_use]
    pub fn packet_key(&self) -> (usize, u64) {
        (self.source_tile, self.packet_id)
    }
}

impl fmt::Display for Flit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}.{} vc{}",
            self.kind_name(),
            self.source_tile,
            self.packet_id,
            self.flit_id,
            self.vc_id
        )?;
        if let Some(header) = self.header() {
            match header.target {
                RouteTarget::Destination(tile) => write!(f, " ->{tile}")?,
                RouteTarget::SourceRoute(code) => write!(f, " route:{code:#o}")?,
            }
        }
        Ok(())
    }
}

/// Builds the flits injected by one tile.
#[derive(Clone, Debug)]
pub struct FlitFactory {
    tile: usize,
    algorithm: RoutingAlgorithm,
}

impl FlitFactory {
    #[must_use]
    pub fn new(tile: usize, algorithm: RoutingAlgorithm) -> Self {
        Self { tile, algorithm }
    }

    fn header(&self, target: u64) -> RoutingHeader {
        let target = match self.algorithm {
            RoutingAlgorithm::Source => RouteTarget::SourceRoute(target),
            _ => RouteTarget::Destination(target as usize),
        };
        RoutingHeader {
            target,
            algorithm: self.algorithm,
            fault_info: FaultInfo::default(),
        }
    }

    fn build(&self, kind: FlitKind, packet_id: u64, flit_id: u32, now: u64) -> Flit {
        Flit {
            kind,
            packet_id,
            flit_id,
            hop_count: 0,
            vc_id: 0,
            source_tile: self.tile,
            sim: SimData {
                generated_at: now,
                ..SimData::default()
            },
        }
    }

    /// `target` is a tile id, or a route code when source routing is used.
    #[must_use]
    pub fn make_head(&self, packet_id: u64, flit_id: u32, target: u64, now: u64) -> Flit {
        self.build(FlitKind::Head(self.header(target)), packet_id, flit_id, now)
    }

    #[must_use]
    pub fn make_data(&self, packet_id: u64, flit_id: u32, now: u64) -> Flit {
        self.build(FlitKind::Data, packet_id, flit_id, now)
    }

    #[must_use]
    pub fn make_tail(&self, packet_id: u64, flit_id: u32, now: u64) -> Flit {
        self.build(FlitKind::Tail, packet_id, flit_id, now)
    }

    #[must_use]
    pub fn make_hdt(&self, packet_id: u64, flit_id: u32, target: u64, now: u64) -> Flit {
        self.build(FlitKind::Hdt(self.header(target)), packet_id, flit_id, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_first_flit_has_header() {
        let factory = FlitFactory::new(3, RoutingAlgorithm::Xy);
        let head = factory.make_head(7, 0, 12, 100);
        let data = factory.make_data(7, 1, 102);
        let tail = factory.make_tail(7, 2, 104);

        let header = head.header().unwrap();
        assert_eq!(header.target, RouteTarget::Destination(12));
        assert_eq!(header.algorithm, RoutingAlgorithm::Xy);
        assert_eq!(header.fault_info, FaultInfo::default());
        assert!(head.is_head_like() && !head.is_tail_like());
        assert!(data.header().is_none());
        assert!(tail.is_tail_like());
        assert_eq!(tail.sim.generated_at, 104);
        assert_eq!(head.source_tile, 3);
        assert_eq!(head.packet_key(), tail.packet_key());
    }

    #[test]
    fn source_route_target() {
        let factory = FlitFactory::new(0, RoutingAlgorithm::Source);
        let hdt = factory.make_hdt(0, 0, 0o42, 5);
        assert!(hdt.is_head_like() && hdt.is_tail_like());
        assert_eq!(hdt.header().unwrap().target, RouteTarget::SourceRoute(0o42));
        assert_eq!(hdt.to_string(), "HDT 0.0.0 vc0 route:0o42");
    }
}
