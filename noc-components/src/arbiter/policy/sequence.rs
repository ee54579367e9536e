// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Sequence policy
//!
//! Requester `cycle % n` is selected on every cycle, whether or not it has
//! anything to do.

use std::rc::Rc;

use noc_track::entity::Entity;
use noc_track::trace;

use crate::arbiter::{Arbitrate, ArbitrationKind, Request, requests_str};

pub struct Sequence {
    num_inputs: usize,
}

impl Sequence {
    #[must_use]
    pub fn new(num_inputs: usize) -> Self {
        Self { num_inputs }
    }
}

impl Arbitrate for Sequence {
    fn arbitrate(
        &mut self,
        entity: &Rc<Entity>,
        cycle: u64,
        requests: &[Request],
    ) -> Option<usize> {
        if self.num_inputs == 0 {
            return None;
        }
        let grant = (cycle % self.num_inputs as u64) as usize;
        trace!(entity ; "seq: {} -> {}", requests_str(requests), grant);
        Some(grant)
    }

    fn kind(&self) -> ArbitrationKind {
        ArbitrationKind::Sequence
    }
}
