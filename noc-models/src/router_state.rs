// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use crate::direction::{Direction, NUM_DIRECTIONS};

/// Fault flags of a tile, as seen by its routing engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouterState {
    faults: [bool; NUM_DIRECTIONS],

    /// `row + column` is even.
    pub parity: bool,
}

impl RouterState {
    #[must_use]
    pub fn new(parity: bool) -> Self {
        Self {
            faults: [false; NUM_DIRECTIONS],
            parity,
        }
    }

    #[must_use]
    pub fn is_faulty(&self, dir: Direction) -> bool {
        self.faults[dir.index()]
    }

    pub fn set_faulty(&mut self, dir: Direction, fail: bool) {
        self.faults[dir.index()] = fail;
    }

    /// All four links are faulty.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        Direction::LINKS.iter().all(|d| self.is_faulty(*d))
    }

    #[must_use]
    pub fn num_faulty_links(&self) -> usize {
        Direction::LINKS.iter().filter(|d| self.is_faulty(**d)).count()
    }
}
