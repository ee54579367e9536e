// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Cycle-accurate models of a virtual-channel network-on-chip.
//!
//! A [`Network`](crate::network::Network) is a mesh or torus of
//! [`Tile`](crate::tile::Tile)s. Each tile contains a router with one input
//! and one output channel per direction, a routing controller, a VC
//! allocator and a core that generates and receives traffic.
//!
//! A flit moves through a router in the following steps:
//!
//!  - it is stored in the input channel VC named by its `vc_id`,
//!  - the head flit of a packet is routed by the controller,
//!  - a VC on the next hop is granted by the VC allocator,
//!  - the flit crosses the crossbar into the output channel,
//!  - the output channel sends it once the downstream VC has a free buffer.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use noc_config::NocConfig;
//! use noc_engine::engine::Engine;
//! use noc_engine::run_simulation;
//! use noc_models::network::Network;
//! use noc_track::tracker::dev_null_tracker;
//!
//! let mut engine = Engine::new(&dev_null_tracker());
//! let network = Network::build(&mut engine, Rc::new(NocConfig::default())).unwrap();
//! run_simulation!(engine, 100);
//!
//! let network = network.borrow();
//! assert!(network.stats().unwrap().is_accounted());
//! ```

pub mod controller;
pub mod credit;
pub mod direction;
pub mod fault_info;
pub mod flit;
pub mod input_channel;
pub mod network;
pub mod output_channel;
pub mod router_state;
pub mod routing;
pub mod stats;
pub mod test_helpers;
pub mod tile;
pub mod topology;
pub mod traffic;
pub mod vc_allocator;
