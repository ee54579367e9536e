// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A bounded first-in first-out buffer.

use std::collections::VecDeque;
use std::collections::vec_deque::{Iter, IterMut};

use noc_engine::sim_error;
use noc_engine::types::SimResult;

/// A ring buffer with a fixed capacity.
///
/// Pushing onto a full buffer is an error and leaves the buffer unchanged.
#[derive(Clone, Debug)]
pub struct BoundedFifo<T> {
    capacity: usize,
    data: VecDeque<T>,
}

impl<T> BoundedFifo<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            data: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: T) -> SimResult {
        if self.is_full() {
            return sim_error!(format!("push to full fifo (capacity {})", self.capacity));
        }
        self.data.push_back(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        self.data.pop_front()
    }

    /// Look at the oldest entry without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.data.front()
    }

    pub fn peek_mut(&mut self) -> Option<&mut T> {
        self.data.front_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.data.len() >= self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> Iter<'_, T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        self.data.iter_mut()
    }

    /// Remove all entries, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.data.len();
        self.data.clear();
        dropped
    }
}
