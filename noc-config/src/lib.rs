// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The settings shared by every part of a NoC simulation.
//!
//! A [`NocConfig`] is built once, validated and then shared read-only between
//! all components (normally as an `Rc<NocConfig>`). Values are merged from the
//! following sources, later sources taking priority:
//!
//!  1. the defaults given by [`NocConfig::default`]
//!  2. an optional TOML file
//!  3. environment variables prefixed with `NOC_` (e.g. `NOC_NUM_ROWS=8`)
//!  4. command-line overrides applied by the caller
//!
//! # Example
//!
//! ```toml
//! num_rows = 3
//! num_cols = 3
//! routing = "dybm"
//!
//! [[tiles]]
//! tile = 0
//! app = "cbr"
//! load = 20
//! destination = "fixed"
//! fixed_target = 8
//!
//! [[faults]]
//! tile = 4
//! direction = "east"
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
pub use noc_components::arbiter::ArbitrationKind;
use noc_engine::sim_error;
use noc_engine::types::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "NOC_";

/// Limits on the grid size.
pub const MIN_GRID_DIM: usize = 2;
pub const MAX_GRID_DIM: usize = 9;

/// Limits on the buffering per link.
pub const MAX_NUM_VCS: usize = 8;
pub const MAX_NUM_BUFS: usize = 16;

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    #[default]
    Mesh,
    Torus,
}

/// The routing algorithm used by every tile.
#[derive(
    clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingAlgorithm {
    /// Follow a route code carried in the head flit.
    Source,
    #[default]
    Xy,
    Oe,
    DyadOe,
    WestFirst,
    NorthLast,
    NegativeFirst,
    Dyxy,
    /// Fault-tolerant routing with backtracking.
    Dybm,
}

impl RoutingAlgorithm {
    pub const ALL: [RoutingAlgorithm; 9] = [
        RoutingAlgorithm::Source,
        RoutingAlgorithm::Xy,
        RoutingAlgorithm::Oe,
        RoutingAlgorithm::DyadOe,
        RoutingAlgorithm::WestFirst,
        RoutingAlgorithm::NorthLast,
        RoutingAlgorithm::NegativeFirst,
        RoutingAlgorithm::Dyxy,
        RoutingAlgorithm::Dybm,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RoutingAlgorithm::Source => "source",
            RoutingAlgorithm::Xy => "xy",
            RoutingAlgorithm::Oe => "oe",
            RoutingAlgorithm::DyadOe => "dyad-oe",
            RoutingAlgorithm::WestFirst => "west-first",
            RoutingAlgorithm::NorthLast => "north-last",
            RoutingAlgorithm::NegativeFirst => "negative-first",
            RoutingAlgorithm::Dyxy => "dyxy",
            RoutingAlgorithm::Dybm => "dybm",
        }
    }
}

impl fmt::Display for RoutingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for RoutingAlgorithm {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase().replace('_', "-");
        match RoutingAlgorithm::ALL.iter().find(|a| a.name() == lower) {
            Some(algorithm) => Ok(*algorithm),
            None => sim_error!(format!("unknown routing algorithm '{s}'")),
        }
    }
}

/// How a turn-model algorithm chooses between several legal directions.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TurnSelection {
    #[default]
    Random,
    /// Prefer directions whose neighbour is not congested.
    Congestion,
}

/// The application running on a tile's core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppKind {
    /// Constant bit rate traffic.
    Cbr,
    /// On/off traffic with exponentially distributed bursts.
    Bursty,
    /// Only receives traffic.
    #[default]
    Sink,
    None,
}

impl AppKind {
    #[must_use]
    pub fn generates(&self) -> bool {
        matches!(self, AppKind::Cbr | AppKind::Bursty)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestinationKind {
    #[default]
    Random,
    Fixed,
}

/// The directions that can be named in a fault.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultDirection {
    North,
    South,
    East,
    West,
    Core,
    /// Every link and the core.
    #[default]
    All,
}

/// Traffic settings of one tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileApp {
    pub tile: usize,
    pub app: AppKind,

    /// Packet size in bytes.
    pub pkt_size: usize,

    /// Offered load as a percentage of the link bandwidth (1..=100).
    pub load: u32,

    pub destination: DestinationKind,

    /// Destination tile, or the route code when routing is `source`.
    pub fixed_target: u64,

    /// Minimum cycles between the flits of a packet.
    pub flit_interval: u64,

    /// Mean number of packets in a burst (bursty only).
    pub avg_burst_len: f64,

    /// Mean number of idle cycles between bursts (bursty only).
    pub avg_off_time: f64,
}

impl Default for TileApp {
    fn default() -> Self {
        Self {
            tile: 0,
            app: AppKind::Cbr,
            pkt_size: 17,
            load: 50,
            destination: DestinationKind::Random,
            fixed_target: 0,
            flit_interval: 2,
            avg_burst_len: 4.0,
            avg_off_time: 100.0,
        }
    }
}

/// A link failure to inject.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultSpec {
    pub tile: usize,
    pub direction: FaultDirection,

    /// Cycle at which the fault appears. Zero means before the first cycle.
    pub cycle: u64,

    /// Propagate the fault to neighbours that lose a whole axis.
    pub realistic: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NocConfig {
    pub topology: Topology,
    pub num_rows: usize,
    pub num_cols: usize,
    pub routing: RoutingAlgorithm,
    pub turn_selection: TurnSelection,
    pub arbitration: ArbitrationKind,
    pub num_vcs: usize,
    pub num_bufs: usize,
    pub flit_size_bytes: usize,
    pub head_payload: usize,
    pub data_payload: usize,

    /// Per-VC occupancy at which a VC reports congestion. Defaults to half
    /// of `num_bufs`.
    pub congestion_level: Option<usize>,
    pub congestion_priority: u64,
    pub congestion_use: bool,
    pub congestion_affect_vc: bool,
    pub hop_use: bool,
    pub hop_level: u32,
    pub write_through_outport: bool,
    pub sim_cycles: u64,
    pub warmup_cycles: u64,
    pub tg_cycles: u64,
    pub clk_freq_ghz: f64,
    pub seed: u64,
    pub default_app: AppKind,
    pub tiles: Vec<TileApp>,
    pub faults: Vec<FaultSpec>,
}

impl Default for NocConfig {
    fn default() -> Self {
        Self {
            topology: Topology::Mesh,
            num_rows: 4,
            num_cols: 4,
            routing: RoutingAlgorithm::Xy,
            turn_selection: TurnSelection::Random,
            arbitration: ArbitrationKind::RoundRobin,
            num_vcs: 4,
            num_bufs: 8,
            flit_size_bytes: 5,
            head_payload: 1,
            data_payload: 4,
            congestion_level: None,
            congestion_priority: 1,
            congestion_use: false,
            congestion_affect_vc: false,
            hop_use: false,
            hop_level: 0,
            write_through_outport: false,
            sim_cycles: 3000,
            warmup_cycles: 5,
            tg_cycles: 1000,
            clk_freq_ghz: 1.0,
            seed: 1,
            default_app: AppKind::Sink,
            tiles: Vec::new(),
            faults: Vec::new(),
        }
    }
}

fn figment_error(e: figment::Error) -> SimError {
    SimError(format!("configuration: {e}"))
}

impl NocConfig {
    /// Merge the defaults, an optional TOML file and the environment.
    ///
    /// The result is validated before it is returned.
    pub fn load(conf_file: Option<&Path>) -> Result<Self, SimError> {
        let mut figment = Figment::from(Serialized::defaults(NocConfig::default()));
        if let Some(path) = conf_file {
            if !path.is_file() {
                return sim_error!(format!("{} is not a config file", path.display()));
            }
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));
        let config: NocConfig = figment.extract().map_err(figment_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML string on top of the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self, SimError> {
        let config: NocConfig = Figment::from(Serialized::defaults(NocConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .map_err(figment_error)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn num_tiles(&self) -> usize {
        self.num_rows * self.num_cols
    }

    #[must_use]
    pub fn congestion_level(&self) -> usize {
        self.congestion_level.unwrap_or(self.num_bufs / 2)
    }

    /// Half of the buffering of one input channel, the threshold for the
    /// channel-level congestion flag.
    #[must_use]
    pub fn half_num_bufs(&self) -> usize {
        self.num_bufs * self.num_vcs / 2
    }

    #[must_use]
    pub fn clk_period_ns(&self) -> f64 {
        1.0 / self.clk_freq_ghz
    }

    /// The application of a tile, if one was configured.
    #[must_use]
    pub fn tile_app(&self, tile: usize) -> Option<&TileApp> {
        self.tiles.iter().find(|t| t.tile == tile)
    }

    /// The application a tile runs: its `tiles` entry, or `default_app`
    /// with default traffic settings.
    #[must_use]
    pub fn effective_app(&self, tile: usize) -> TileApp {
        self.tile_app(tile).cloned().unwrap_or(TileApp {
            tile,
            app: self.default_app,
            ..TileApp::default()
        })
    }

    /// Check that all values are consistent with each other.
    pub fn validate(&self) -> SimResult {
        for (name, dim) in [("num_rows", self.num_rows), ("num_cols", self.num_cols)] {
            if !(MIN_GRID_DIM..=MAX_GRID_DIM).contains(&dim) {
                return sim_error!(format!(
                    "{name} must be in {MIN_GRID_DIM}..={MAX_GRID_DIM}, got {dim}"
                ));
            }
        }
        if !(1..=MAX_NUM_VCS).contains(&self.num_vcs) {
            return sim_error!(format!(
                "num_vcs must be in 1..={MAX_NUM_VCS}, got {}",
                self.num_vcs
            ));
        }
        if !(1..=MAX_NUM_BUFS).contains(&self.num_bufs) {
            return sim_error!(format!(
                "num_bufs must be in 1..={MAX_NUM_BUFS}, got {}",
                self.num_bufs
            ));
        }
        if self.data_payload == 0 || self.head_payload > self.flit_size_bytes {
            return sim_error!("flit payloads do not fit the flit size");
        }
        if self.clk_freq_ghz <= 0.0 {
            return sim_error!("clk_freq_ghz must be positive");
        }
        if self.warmup_cycles > self.tg_cycles {
            return sim_error!(format!(
                "warmup_cycles ({}) is after tg_cycles ({})",
                self.warmup_cycles, self.tg_cycles
            ));
        }

        let num_tiles = self.num_tiles();
        let mut seen = vec![false; num_tiles];
        for app in &self.tiles {
            if app.tile >= num_tiles {
                return sim_error!(format!(
                    "tile {} does not exist in a {num_tiles} tile network",
                    app.tile
                ));
            }
            if seen[app.tile] {
                return sim_error!(format!("tile {} is configured twice", app.tile));
            }
            seen[app.tile] = true;
        }
        for tile in 0..num_tiles {
            let app = self.effective_app(tile);
            if app.app.generates() {
                self.validate_generator(&app)?;
            }
        }

        for fault in &self.faults {
            if fault.tile >= num_tiles {
                return sim_error!(format!("fault on unknown tile {}", fault.tile));
            }
        }
        Ok(())
    }

    fn validate_generator(&self, app: &TileApp) -> SimResult {
        if !(1..=100).contains(&app.load) {
            return sim_error!(format!(
                "tile {}: load must be in 1..=100, got {}",
                app.tile, app.load
            ));
        }
        if app.pkt_size < self.head_payload {
            return sim_error!(format!(
                "tile {}: pkt_size {} is smaller than the head payload",
                app.tile, app.pkt_size
            ));
        }
        if app.app == AppKind::Bursty && (app.avg_burst_len < 1.0 || app.avg_off_time < 0.0) {
            return sim_error!(format!("tile {}: invalid burst parameters", app.tile));
        }
        match (app.destination, self.routing) {
            (DestinationKind::Random, RoutingAlgorithm::Source) => {
                return sim_error!(format!(
                    "tile {}: source routing needs a fixed route code",
                    app.tile
                ));
            }
            (DestinationKind::Fixed, RoutingAlgorithm::Source) => {}
            (DestinationKind::Fixed, _) => {
                let target = app.fixed_target as usize;
                if target >= self.num_tiles() || target == app.tile {
                    return sim_error!(format!(
                        "tile {}: invalid fixed destination {}",
                        app.tile, app.fixed_target
                    ));
                }
            }
            (DestinationKind::Random, _) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = NocConfig::default();
        config.validate().unwrap();
        assert_eq!(config.num_tiles(), 16);
        assert_eq!(config.congestion_level(), 4);
        assert_eq!(config.half_num_bufs(), 16);
        assert_eq!(config.clk_period_ns(), 1.0);
    }

    #[test]
    fn routing_names() {
        for algorithm in RoutingAlgorithm::ALL {
            assert_eq!(algorithm.name().parse::<RoutingAlgorithm>(), Ok(algorithm));
        }
        assert_eq!("DyAD_OE".parse(), Ok(RoutingAlgorithm::DyadOe));
        assert!("ospf".parse::<RoutingAlgorithm>().is_err());
    }

    #[test]
    fn grid_limits() {
        let config = NocConfig {
            num_rows: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = NocConfig {
            num_cols: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fixed_destination_checked() {
        let mut config = NocConfig::default();
        config.tiles.push(TileApp {
            tile: 3,
            destination: DestinationKind::Fixed,
            fixed_target: 3,
            ..Default::default()
        });
        assert!(config.validate().is_err());
        config.tiles[0].fixed_target = 16;
        assert!(config.validate().is_err());
        config.tiles[0].fixed_target = 15;
        config.validate().unwrap();
        config.routing = RoutingAlgorithm::Source;
        config.tiles[0].fixed_target = 0o1234;
        config.validate().unwrap();
    }
}
