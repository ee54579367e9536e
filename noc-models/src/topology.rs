// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Grid geometry.
//!
//! Tile `id` sits at row `x = id / num_cols` and column `y = id % num_cols`.
//! Row 0 is the north edge and column 0 the west edge.

use noc_config::{NocConfig, Topology};

use crate::direction::{Direction, NUM_DIRECTIONS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    pub topology: Topology,
    pub num_rows: usize,
    pub num_cols: usize,
}

impl Grid {
    #[must_use]
    pub fn new(topology: Topology, num_rows: usize, num_cols: usize) -> Self {
        Self {
            topology,
            num_rows,
            num_cols,
        }
    }

    #[must_use]
    pub fn from_config(config: &NocConfig) -> Self {
        Self::new(config.topology, config.num_rows, config.num_cols)
    }

    #[must_use]
    pub fn num_tiles(&self) -> usize {
        self.num_rows * self.num_cols
    }

    /// `(row, column)` of a tile.
    #[must_use]
    pub fn coords(&self, id: usize) -> (usize, usize) {
        (id / self.num_cols, id % self.num_cols)
    }

    #[must_use]
    pub fn id(&self, row: usize, col: usize) -> usize {
        row * self.num_cols + col
    }

    #[must_use]
    pub fn border_north(&self, id: usize) -> bool {
        id < self.num_cols
    }

    #[must_use]
    pub fn border_south(&self, id: usize) -> bool {
        id >= self.num_tiles() - self.num_cols
    }

    #[must_use]
    pub fn border_east(&self, id: usize) -> bool {
        (id + 1) % self.num_cols == 0
    }

    #[must_use]
    pub fn border_west(&self, id: usize) -> bool {
        id % self.num_cols == 0
    }

    /// Whether the mesh has no link on this side of the tile.
    #[must_use]
    pub fn on_border(&self, id: usize, dir: Direction) -> bool {
        match dir {
            Direction::North => self.border_north(id),
            Direction::South => self.border_south(id),
            Direction::East => self.border_east(id),
            Direction::West => self.border_west(id),
            Direction::Core => false,
        }
    }

    #[must_use]
    pub fn is_border(&self, id: usize) -> bool {
        Direction::LINKS.iter().any(|d| self.on_border(id, *d))
    }

    #[must_use]
    pub fn is_corner(&self, id: usize) -> bool {
        Direction::LINKS
            .iter()
            .filter(|d| self.on_border(id, **d))
            .count()
            == 2
    }

    /// True when `row + column` is even.
    #[must_use]
    pub fn parity(&self, id: usize) -> bool {
        let (x, y) = self.coords(id);
        (x + y) % 2 == 0
    }

    /// The tile on the other end of the link leaving `id` towards `dir`.
    #[must_use]
    pub fn neighbour(&self, id: usize, dir: Direction) -> Option<usize> {
        let (x, y) = self.coords(id);
        match self.topology {
            Topology::Mesh => {
                if !dir.is_link() || self.on_border(id, dir) {
                    return None;
                }
                Some(match dir {
                    Direction::North => self.id(x - 1, y),
                    Direction::South => self.id(x + 1, y),
                    Direction::East => self.id(x, y + 1),
                    Direction::West => self.id(x, y - 1),
                    Direction::Core => id,
                })
            }
            Topology::Torus => match dir {
                Direction::North => Some(self.id((x + self.num_rows - 1) % self.num_rows, y)),
                Direction::South => Some(self.id((x + 1) % self.num_rows, y)),
                Direction::East => Some(self.id(x, (y + 1) % self.num_cols)),
                Direction::West => Some(self.id(x, (y + self.num_cols - 1) % self.num_cols)),
                Direction::Core => None,
            },
        }
    }

    #[must_use]
    pub fn has_link(&self, id: usize, dir: Direction) -> bool {
        self.neighbour(id, dir).is_some()
    }

    /// Mesh distance between two tiles.
    #[must_use]
    pub fn manhattan(&self, a: usize, b: usize) -> usize {
        let (ax, ay) = self.coords(a);
        let (bx, by) = self.coords(b);
        ax.abs_diff(bx) + ay.abs_diff(by)
    }
}

/// Maps the directions of one tile onto the indices of its channels.
///
/// In a torus every tile has ports `N=0, S=1, E=2, W=3, Core=4`. In a mesh
/// the links that leave the grid are absent and the remaining ports are
/// numbered in `N, S, E, W` order, followed by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortMap {
    ports: [Option<usize>; NUM_DIRECTIONS],
    num_ports: usize,
}

impl PortMap {
    #[must_use]
    pub fn new(grid: &Grid, id: usize) -> Self {
        let mut ports = [None; NUM_DIRECTIONS];
        let mut next = 0;
        for dir in Direction::LINKS {
            if grid.has_link(id, dir) {
                ports[dir.index()] = Some(next);
                next += 1;
            }
        }
        ports[Direction::Core.index()] = Some(next);
        Self {
            ports,
            num_ports: next + 1,
        }
    }

    #[must_use]
    pub fn port(&self, dir: Direction) -> Option<usize> {
        self.ports[dir.index()]
    }

    #[must_use]
    pub fn core_port(&self) -> usize {
        self.num_ports - 1
    }

    /// Number of ports including the core.
    #[must_use]
    pub fn num_ports(&self) -> usize {
        self.num_ports
    }

    /// The direction served by a port.
    #[must_use]
    pub fn direction(&self, port: usize) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|d| self.ports[d.index()] == Some(port))
    }

    /// Directions in port order.
    pub fn directions(&self) -> impl Iterator<Item = Direction> + '_ {
        (0..self.num_ports).filter_map(|p| self.direction(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh4() -> Grid {
        Grid::new(Topology::Mesh, 4, 4)
    }

    #[test]
    fn borders_and_corners() {
        let grid = mesh4();
        assert!(grid.is_corner(0) && grid.is_corner(3) && grid.is_corner(12) && grid.is_corner(15));
        assert!(grid.is_border(1) && !grid.is_corner(1));
        assert!(!grid.is_border(5));
        assert!(grid.parity(0) && !grid.parity(1) && grid.parity(5));
    }

    #[test]
    fn mesh_ports() {
        let grid = mesh4();
        // Interior
        let map = PortMap::new(&grid, 5);
        assert_eq!(map.num_ports(), 5);
        assert_eq!(map.port(Direction::West), Some(3));
        // North border
        let map = PortMap::new(&grid, 1);
        assert_eq!(map.port(Direction::North), None);
        assert_eq!(map.port(Direction::South), Some(0));
        assert_eq!(map.port(Direction::East), Some(1));
        assert_eq!(map.port(Direction::West), Some(2));
        assert_eq!(map.core_port(), 3);
        // North-east corner
        let map = PortMap::new(&grid, 3);
        assert_eq!(map.port(Direction::West), Some(1));
        assert_eq!(map.core_port(), 2);
        assert_eq!(map.direction(2), Some(Direction::Core));
        assert_eq!(
            map.directions().collect::<Vec<_>>(),
            vec![Direction::South, Direction::West, Direction::Core]
        );
    }

    #[test]
    fn torus_wraps() {
        let grid = Grid::new(Topology::Torus, 3, 4);
        assert_eq!(grid.neighbour(0, Direction::North), Some(8));
        assert_eq!(grid.neighbour(0, Direction::West), Some(3));
        assert_eq!(grid.neighbour(11, Direction::East), Some(8));
        assert_eq!(grid.neighbour(11, Direction::South), Some(3));
        let map = PortMap::new(&grid, 0);
        assert_eq!(map.core_port(), 4);
        assert_eq!(map.port(Direction::East), Some(2));
    }

    #[test]
    fn mesh_neighbours() {
        let grid = mesh4();
        assert_eq!(grid.neighbour(5, Direction::North), Some(1));
        assert_eq!(grid.neighbour(5, Direction::South), Some(9));
        assert_eq!(grid.neighbour(5, Direction::East), Some(6));
        assert_eq!(grid.neighbour(5, Direction::West), Some(4));
        assert_eq!(grid.neighbour(0, Direction::North), None);
        assert_eq!(grid.manhattan(0, 15), 6);
    }
}
