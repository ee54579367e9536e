// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A command-line front-end for running a NoC simulation.
//!
//! For example, run using:
//!   cargo run --bin noc-sim -- --config noc.toml --routing dybm
//!   --stdout-level debug --stdout-filter-regex '.*tile5.*'
//!
//! Settings are taken from the defaults, then the `--config` file, then any
//! `NOC_*` environment variables and finally the options given here.

use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;

use clap::Parser;
use noc_config::{ArbitrationKind, NocConfig, RoutingAlgorithm, Topology};
use noc_engine::engine::Engine;
use noc_engine::types::SimError;
use noc_models::network::Network;
use noc_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};
use noc_track::{Track, Tracker};

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Cycle-accurate simulation of a virtual-channel network-on-chip")]
struct Cli {
    /// TOML file with the network, traffic and fault settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of cycles to simulate.
    #[arg(long)]
    sim_cycles: Option<u64>,

    #[arg(long)]
    rows: Option<usize>,

    #[arg(long)]
    cols: Option<usize>,

    #[arg(long, value_enum)]
    topology: Option<Topology>,

    #[arg(long, value_enum)]
    routing: Option<RoutingAlgorithm>,

    /// One of `sequence`, `round-robin` or `adaptive`.
    #[arg(long, value_parser = ArbitrationKind::from_str)]
    arbitration: Option<ArbitrationKind>,

    /// Seed for the traffic generators.
    #[arg(long)]
    seed: Option<u64>,

    /// Disable logging to the console.
    #[arg(long, default_value = "false")]
    quiet: bool,

    /// Level of log message to display.
    #[arg(long, default_value = "Warn")]
    stdout_level: log::Level,

    /// Set a regular expression for which entites should have logging level set
    /// to `--stdout-level`. Others will have level set to `Error`.
    #[arg(long, default_value = "")]
    stdout_filter_regex: String,

    /// Also write log messages to this file.
    #[arg(long)]
    log_file: Option<String>,

    /// Level of log message to write to `--log-file`.
    #[arg(long, default_value = "Debug")]
    log_file_level: log::Level,
}

impl Cli {
    fn apply_overrides(&self, config: &mut NocConfig) {
        if let Some(sim_cycles) = self.sim_cycles {
            config.sim_cycles = sim_cycles;
        }
        if let Some(rows) = self.rows {
            config.num_rows = rows;
        }
        if let Some(cols) = self.cols {
            config.num_cols = cols;
        }
        if let Some(topology) = self.topology {
            config.topology = topology;
        }
        if let Some(routing) = self.routing {
            config.routing = routing;
        }
        if let Some(arbitration) = self.arbitration {
            config.arbitration = arbitration;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
    }
}

fn setup_all_trackers(args: &Cli) -> Result<Tracker, SimError> {
    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: !args.quiet,
            level: args.stdout_level,
            filter_regex: &args.stdout_filter_regex,
            file: None,
        },
        log_file: TrackerConfig {
            enable: args.log_file.is_some(),
            level: args.log_file_level,
            filter_regex: "",
            file: args.log_file.as_deref(),
        },
    };
    Ok(setup_trackers(&config)?)
}

fn main() -> Result<(), SimError> {
    let args = Cli::parse();

    let mut config = NocConfig::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;

    let tracker = setup_all_trackers(&args)?;
    let mut engine = Engine::new(&tracker);
    let sim_cycles = config.sim_cycles;
    let network = Network::build(&mut engine, Rc::new(config))?;

    engine.run_for(sim_cycles)?;
    engine.finalize()?;
    tracker.shutdown();

    let network = network.borrow();
    let Some(stats) = network.stats() else {
        return Err(SimError("simulation produced no statistics".to_string()));
    };
    println!("{stats}");
    if !stats.is_accounted() {
        return Err(SimError("packet accounting does not balance".to_string()));
    }
    Ok(())
}
