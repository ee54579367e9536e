// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The five directions of a tile.

use std::fmt;

pub const NUM_DIRECTIONS: usize = 5;

/// The number of link (non-core) directions.
pub const NUM_LINK_DIRECTIONS: usize = 4;

/// A side of a tile. `North` is towards row 0 and `West` towards column 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Core,
}

impl Direction {
    pub const ALL: [Direction; NUM_DIRECTIONS] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Core,
    ];

    pub const LINKS: [Direction; NUM_LINK_DIRECTIONS] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Direction> {
        Direction::ALL.get(index).copied()
    }

    /// The side of the neighbouring tile that faces this one.
    #[must_use]
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
            Direction::Core => Direction::Core,
        }
    }

    #[must_use]
    pub fn is_link(self) -> bool {
        self != Direction::Core
    }

    /// Directions that are at right angles to this one.
    #[must_use]
    pub fn perpendicular(self) -> [Direction; 2] {
        match self {
            Direction::North | Direction::South => [Direction::East, Direction::West],
            Direction::East | Direction::West => [Direction::North, Direction::South],
            Direction::Core => [Direction::Core, Direction::Core],
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Core => "core",
        };
        write!(f, "{name}")
    }
}
