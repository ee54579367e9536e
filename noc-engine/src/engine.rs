// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The engine that steps all registered components.
//!
//! # Two-phase cycles
//!
//! For every simulated cycle the engine first calls
//! [`evaluate`](crate::traits::Clocked::evaluate) on every component and only
//! then calls [`commit`](crate::traits::Clocked::commit) on every component.
//! Values exchanged between components must be latched during `commit` so that
//! they can only be observed on the following cycle.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use noc_engine::engine::Engine;
//! use noc_engine::time::clock::Clock;
//! use noc_engine::traits::Clocked;
//! use noc_engine::types::SimResult;
//!
//! #[derive(Default)]
//! struct Counter {
//!     count: u64,
//! }
//!
//! impl Clocked for Counter {
//!     fn evaluate(&mut self, _clock: &Clock) -> SimResult {
//!         Ok(())
//!     }
//!
//!     fn commit(&mut self, _clock: &Clock) -> SimResult {
//!         self.count += 1;
//!         Ok(())
//!     }
//! }
//!
//! let mut engine = Engine::default();
//! let counter = Rc::new(RefCell::new(Counter::default()));
//! engine.register(counter.clone());
//! engine.run_for(10).unwrap();
//! assert_eq!(counter.borrow().count, 10);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use noc_track::entity::{Entity, toplevel};
use noc_track::tracker::stdout_tracker;
use noc_track::{Tracker, debug, info, set_time};

use crate::time::clock::{COMMIT_PHASE, Clock, ClockTick, EVALUATE_PHASE};
use crate::traits::Clocked;
use crate::types::{Cycle, SimResult};

/// Default clock frequency (1GHz).
pub const DEFAULT_FREQ_MHZ: f64 = 1000.0;

pub struct Engine {
    toplevel: Rc<Entity>,
    tracker: Tracker,
    clock: Clock,
    components: Vec<Rc<RefCell<dyn Clocked>>>,
    finalized: bool,
}

impl Engine {
    #[must_use]
    pub fn new(tracker: &Tracker) -> Self {
        Self::new_with_freq(tracker, DEFAULT_FREQ_MHZ)
    }

    #[must_use]
    pub fn new_with_freq(tracker: &Tracker, freq_mhz: f64) -> Self {
        let toplevel = toplevel(tracker, "top");
        Self {
            toplevel,
            tracker: tracker.clone(),
            clock: Clock::new(freq_mhz),
            components: Vec::new(),
            finalized: false,
        }
    }

    #[must_use]
    pub fn top(&self) -> &Rc<Entity> {
        &self.toplevel
    }

    #[must_use]
    pub fn tracker(&self) -> Tracker {
        self.tracker.clone()
    }

    #[must_use]
    pub fn default_clock(&self) -> &Clock {
        &self.clock
    }

    /// Current simulation cycle.
    #[must_use]
    pub fn cycle(&self) -> Cycle {
        self.clock.cycle()
    }

    /// Add a component that will be stepped every cycle.
    pub fn register(&mut self, component: Rc<RefCell<dyn Clocked>>) {
        self.components.push(component);
    }

    /// Advance the simulation by `cycles` clock cycles.
    ///
    /// Returns the first error raised by a component, leaving the clock at the
    /// cycle in which it happened.
    pub fn run_for(&mut self, cycles: Cycle) -> SimResult {
        let start = self.clock.cycle();
        debug!(self.toplevel ; "run {} cycles from {}", cycles, start);
        for _ in 0..cycles {
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> SimResult {
        let cycle = self.clock.cycle();
        set_time!(self.toplevel ; cycle);

        self.clock.set(ClockTick::new(cycle, EVALUATE_PHASE));
        for component in &self.components {
            component.borrow_mut().evaluate(&self.clock)?;
        }

        self.clock.set(ClockTick::new(cycle, COMMIT_PHASE));
        for component in &self.components {
            component.borrow_mut().commit(&self.clock)?;
        }

        self.clock.set(ClockTick::new(cycle + 1, EVALUATE_PHASE));
        Ok(())
    }

    /// Run every component's finalizer. Only the first call has any effect.
    pub fn finalize(&mut self) -> SimResult {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        info!(self.toplevel ; "finalize after {} cycles", self.clock.cycle());
        for component in &self.components {
            component.borrow_mut().finalize(&self.clock)?;
        }
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        let tracker = stdout_tracker(log::Level::Warn);
        Self::new(&tracker)
    }
}
