// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::io::Write;

use noc_config::{
    AppKind, ArbitrationKind, DestinationKind, FaultDirection, NocConfig, RoutingAlgorithm,
    Topology,
};
use serial_test::serial;

const SAMPLE: &str = r#"
topology = "torus"
num_rows = 3
num_cols = 5
routing = "dyad-oe"
arbitration = "adaptive"
num_bufs = 2
congestion_level = 1

[[tiles]]
tile = 0
app = "cbr"
load = 20
destination = "fixed"
fixed_target = 14

[[tiles]]
tile = 7
app = "bursty"

[[faults]]
tile = 4
direction = "east"
cycle = 100
realistic = true
"#;

fn write_sample() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(SAMPLE.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn load_from_file() {
    let file = write_sample();
    let config = NocConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.topology, Topology::Torus);
    assert_eq!(config.num_tiles(), 15);
    assert_eq!(config.routing, RoutingAlgorithm::DyadOe);
    assert_eq!(config.arbitration, ArbitrationKind::Adaptive);
    assert_eq!(config.congestion_level(), 1);

    let app = config.tile_app(0).unwrap();
    assert_eq!(app.app, AppKind::Cbr);
    assert_eq!(app.destination, DestinationKind::Fixed);
    assert_eq!(app.fixed_target, 14);
    assert_eq!(config.tile_app(7).unwrap().app, AppKind::Bursty);
    assert!(config.tile_app(8).is_none());

    assert_eq!(config.faults.len(), 1);
    assert_eq!(config.faults[0].direction, FaultDirection::East);
    assert!(config.faults[0].realistic);

    // Untouched values keep their defaults.
    assert_eq!(config.num_vcs, 4);
    assert_eq!(config.sim_cycles, 3000);
}

#[test]
#[serial]
fn environment_overrides_file() {
    let file = write_sample();
    figment::Jail::expect_with(|jail| {
        jail.set_env("NOC_NUM_ROWS", "6");
        jail.set_env("NOC_SEED", "42");
        let config = NocConfig::load(Some(file.path())).map_err(|e| e.0)?;
        assert_eq!(config.num_rows, 6);
        assert_eq!(config.num_cols, 5);
        assert_eq!(config.seed, 42);
        Ok(())
    });
}

#[test]
#[serial]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    assert!(NocConfig::load(Some(&missing)).is_err());
}

#[test]
fn invalid_values_rejected() {
    assert!(NocConfig::from_toml_str("num_bufs = 0").is_err());
    assert!(NocConfig::from_toml_str("routing = \"ospf\"").is_err());
    assert!(
        NocConfig::from_toml_str("[[tiles]]\ntile = 1\napp = \"cbr\"\nload = 0").is_err()
    );
    assert!(NocConfig::from_toml_str("[[faults]]\ntile = 99").is_err());
    assert!(
        NocConfig::from_toml_str("[[tiles]]\ntile = 1\n[[tiles]]\ntile = 1").is_err()
    );
}

#[test]
fn default_app_is_validated() {
    let random_source = NocConfig {
        routing: RoutingAlgorithm::Source,
        default_app: AppKind::Cbr,
        ..NocConfig::default()
    };
    assert!(random_source.validate().is_err());

    let random_xy = NocConfig {
        default_app: AppKind::Cbr,
        ..NocConfig::default()
    };
    assert!(random_xy.validate().is_ok());
    assert_eq!(random_xy.effective_app(3).app, AppKind::Cbr);
    assert_eq!(random_xy.effective_app(3).tile, 3);
    assert_eq!(random_xy.effective_app(3).destination, DestinationKind::Random);

    let sinks_only = NocConfig {
        routing: RoutingAlgorithm::Source,
        ..NocConfig::default()
    };
    assert!(sinks_only.validate().is_ok());

    let toml = "routing = \"source\"\ndefault_app = \"cbr\"";
    assert!(NocConfig::from_toml_str(toml).is_err());
}
