// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A set of common traits used across the NoC engine.

use crate::time::clock::Clock;
use crate::types::SimResult;

/// The interface of anything that the [`Engine`](crate::engine::Engine)
/// advances one cycle at a time.
pub trait Clocked {
    /// Compute the next state using only state committed on earlier cycles.
    fn evaluate(&mut self, clock: &Clock) -> SimResult;

    /// Latch the state produced by [`evaluate`](Clocked::evaluate).
    fn commit(&mut self, clock: &Clock) -> SimResult;

    /// Called once after the last simulated cycle.
    fn finalize(&mut self, _clock: &Clock) -> SimResult {
        Ok(())
    }
}
