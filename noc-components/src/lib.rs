// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Generic building blocks shared by the NoC models.
//!
//! - [`fifo::BoundedFifo`]: a fixed-capacity first-in first-out buffer.
//! - [`signal::Signal`]: a wire whose writes become visible on commit.
//! - [`arbiter`]: the arbitration disciplines used to select between
//!   requesters.

pub mod arbiter;
pub mod fifo;
pub mod signal;
