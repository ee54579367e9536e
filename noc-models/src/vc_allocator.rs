// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Allocation of virtual channels on the next hop.
//!
//! The allocator keeps a table of which VCs of each neighbour's input channel
//! are free. A VC is marked busy when it is granted and becomes free again
//! when the neighbour reports that the packet using it has left. Requests are
//! granted the lowest free VC; in congestion-aware mode a free VC that is not
//! congested is preferred.

use std::rc::Rc;

use noc_track::entity::Entity;
use noc_track::{debug, trace};

use crate::direction::{Direction, NUM_LINK_DIRECTIONS};

pub struct VcAllocator {
    pub entity: Rc<Entity>,
    congestion_aware: bool,
    free: [Vec<bool>; NUM_LINK_DIRECTIONS],
    congested: [Vec<bool>; NUM_LINK_DIRECTIONS],
    requests: Vec<Option<Direction>>,
    grants: Vec<Option<Option<usize>>>,
}

impl VcAllocator {
    #[must_use]
    pub fn new(
        parent: &Rc<Entity>,
        num_vcs: usize,
        num_ports: usize,
        congestion_aware: bool,
    ) -> Self {
        Self {
            entity: Entity::child(parent, "vca"),
            congestion_aware,
            free: std::array::from_fn(|_| vec![true; num_vcs]),
            congested: std::array::from_fn(|_| vec![false; num_vcs]),
            requests: vec![None; num_ports],
            grants: vec![None; num_ports],
        }
    }

    /// Ask for a VC towards `dir` on behalf of input port `port`.
    pub fn request(&mut self, port: usize, dir: Direction) {
        trace!(self.entity ; "port {} requests a vc towards {}", port, dir);
        self.requests[port] = Some(dir);
    }

    /// The answer to the last request of `port`: `Some(None)` when no VC was
    /// free.
    pub fn take_grant(&mut self, port: usize) -> Option<Option<usize>> {
        self.grants[port].take()
    }

    /// Serve the requests posted this cycle in port order.
    pub fn commit(&mut self) {
        for port in 0..self.requests.len() {
            if let Some(dir) = self.requests[port].take() {
                let grant = self.allocate(dir);
                match grant {
                    Some(vc) => debug!(self.entity ; "port {} granted {} vc{}", port, dir, vc),
                    None => trace!(self.entity ; "port {}: no free vc towards {}", port, dir),
                }
                self.grants[port] = Some(grant);
            }
        }
    }

    fn allocate(&mut self, dir: Direction) -> Option<usize> {
        if !dir.is_link() {
            return None;
        }
        let free = &mut self.free[dir.index()];
        let congested = &self.congested[dir.index()];
        let uncongested = if self.congestion_aware {
            (0..free.len()).find(|vc| free[*vc] && !congested[*vc])
        } else {
            None
        };
        let vc = uncongested.or_else(|| free.iter().position(|f| *f))?;
        free[vc] = false;
        Some(vc)
    }

    /// Apply a credit event received from the neighbour towards `dir`.
    pub fn credit(&mut self, dir: Direction, vc: usize, free_vc: bool) {
        if dir.is_link() {
            self.free[dir.index()][vc] = free_vc;
        }
    }

    pub fn set_congested(&mut self, dir: Direction, vc: usize, congested: bool) {
        if dir.is_link() {
            self.congested[dir.index()][vc] = congested;
        }
    }

    #[must_use]
    pub fn is_free(&self, dir: Direction, vc: usize) -> bool {
        dir.is_link() && self.free[dir.index()][vc]
    }
}

#[cfg(test)]
mod tests {
    use noc_track::entity::toplevel;
    use noc_track::tracker::dev_null_tracker;

    use super::*;

    fn allocator(congestion_aware: bool) -> VcAllocator {
        let top = toplevel(&dev_null_tracker(), "top");
        VcAllocator::new(&top, 3, 5, congestion_aware)
    }

    #[test]
    fn lowest_free_vc_first() {
        let mut vca = allocator(false);
        vca.request(0, Direction::East);
        vca.request(1, Direction::East);
        vca.commit();
        assert_eq!(vca.take_grant(0), Some(Some(0)));
        assert_eq!(vca.take_grant(1), Some(Some(1)));
        assert_eq!(vca.take_grant(1), None);

        vca.credit(Direction::East, 0, true);
        vca.request(2, Direction::East);
        vca.commit();
        assert_eq!(vca.take_grant(2), Some(Some(0)));
    }

    #[test]
    fn exhausted() {
        let mut vca = allocator(false);
        for _ in 0..3 {
            vca.request(0, Direction::North);
            vca.commit();
            assert!(matches!(vca.take_grant(0), Some(Some(_))));
        }
        vca.request(0, Direction::North);
        vca.commit();
        assert_eq!(vca.take_grant(0), Some(None));
        assert!(!vca.is_free(Direction::North, 2));
        assert!(vca.is_free(Direction::South, 2));
    }

    #[test]
    fn prefers_uncongested() {
        let mut vca = allocator(true);
        vca.set_congested(Direction::West, 0, true);
        vca.request(0, Direction::West);
        vca.commit();
        assert_eq!(vca.take_grant(0), Some(Some(1)));

        // Falls back to a congested VC
        vca.set_congested(Direction::West, 2, true);
        vca.credit(Direction::West, 1, false);
        vca.request(0, Direction::West);
        vca.commit();
        assert_eq!(vca.take_grant(0), Some(Some(0)));
    }
}
