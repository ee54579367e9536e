// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Adaptive policy
//!
//! Every pending requester ages by one on each call. The requester with the
//! highest `wait + weight` is granted and its wait is reset. Ties go to the
//! lowest index.

use std::rc::Rc;

use noc_track::entity::Entity;
use noc_track::trace;

use crate::arbiter::{Arbitrate, ArbitrationKind, Request, requests_str};

pub struct Adaptive {
    wait: Vec<u64>,
}

impl Adaptive {
    #[must_use]
    pub fn new(num_inputs: usize) -> Self {
        Self {
            wait: vec![0; num_inputs],
        }
    }

    /// Age a single requester.
    pub fn age(&mut self, index: usize) {
        self.wait[index] += 1;
    }

    pub fn reset(&mut self, index: usize) {
        self.wait[index] = 0;
    }

    #[must_use]
    pub fn wait(&self, index: usize) -> u64 {
        self.wait[index]
    }

    /// Choose between `(index, weight)` candidates without changing any state.
    #[must_use]
    pub fn pick(&self, candidates: &[(usize, u64)]) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for &(index, weight) in candidates {
            let score = self.wait[index] + weight;
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((index, score)),
            }
        }
        best.map(|(index, _)| index)
    }
}

impl Arbitrate for Adaptive {
    fn arbitrate(
        &mut self,
        entity: &Rc<Entity>,
        _cycle: u64,
        requests: &[Request],
    ) -> Option<usize> {
        let mut candidates = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            if request.pending {
                self.age(index);
                candidates.push((index, request.weight));
            }
        }

        let grant = self.pick(&candidates);
        if let Some(index) = grant {
            self.reset(index);
        }
        trace!(entity ; "adaptive: {} -> {:?}", requests_str(requests), grant);
        grant
    }

    fn kind(&self) -> ArbitrationKind {
        ArbitrationKind::Adaptive
    }
}
