// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! This module represents the time during a simulation.
//!
//! Time is made up of a cycle count and a phase.

use core::cmp::Ordering;
use std::cell::Cell;
use std::rc::Rc;

use crate::types::Cycle;

/// Phase used while components evaluate their next state.
pub const EVALUATE_PHASE: u32 = 0;

/// Phase used while components commit their state.
pub const COMMIT_PHASE: u32 = 1;

/// ClockTick structure for representing a number of Clock ticks and a phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockTick {
    /// Clock ticks.
    tick: Cycle,

    /// Clock phase.
    phase: u32,
}

impl ClockTick {
    #[must_use]
    pub fn new(tick: Cycle, phase: u32) -> Self {
        Self { tick, phase }
    }

    /// Get the current clock tick.
    #[must_use]
    pub fn tick(&self) -> Cycle {
        self.tick
    }

    /// Get the current clock phase.
    #[must_use]
    pub fn phase(&self) -> u32 {
        self.phase
    }
}

/// Define the comparison operation for ClockTick.
impl Ord for ClockTick {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.tick.cmp(&other.tick) {
            Ordering::Equal => self.phase.cmp(&other.phase),
            ordering => ordering,
        }
    }
}

impl PartialOrd for ClockTick {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ClockTick {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}.{}", self.tick, self.phase)
    }
}

/// A clock shared between the engine and the components it drives.
///
/// Cloning a [`Clock`] gives another handle onto the same time.
#[derive(Clone, Debug)]
pub struct Clock {
    /// Frequency of the clock in MHz.
    freq_mhz: f64,

    now: Rc<Cell<ClockTick>>,
}

impl Clock {
    #[must_use]
    pub fn new(freq_mhz: f64) -> Self {
        Self {
            freq_mhz,
            now: Rc::new(Cell::new(ClockTick::default())),
        }
    }

    #[must_use]
    pub fn freq_mhz(&self) -> f64 {
        self.freq_mhz
    }

    /// Clock period in nanoseconds.
    #[must_use]
    pub fn period_ns(&self) -> f64 {
        1000.0 / self.freq_mhz
    }

    #[must_use]
    pub fn tick_now(&self) -> ClockTick {
        self.now.get()
    }

    /// Shorthand for the current cycle count.
    #[must_use]
    pub fn cycle(&self) -> Cycle {
        self.now.get().tick()
    }

    #[must_use]
    pub fn time_now_ns(&self) -> f64 {
        self.cycle() as f64 * self.period_ns()
    }

    pub(crate) fn set(&self, tick: ClockTick) {
        self.now.set(tick);
    }
}
