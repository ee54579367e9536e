// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Round Robin policy
//!
//! The grant is computed from the requests registered on the previous call,
//! which adds one cycle of arbitration latency. The search starts from the
//! requester after the last grant. When nothing was pending the last grant is
//! kept.

use std::rc::Rc;

use noc_track::entity::Entity;
use noc_track::trace;

use crate::arbiter::{Arbitrate, ArbitrationKind, Request, requests_str};

pub struct RoundRobin {
    last_grant: usize,
    registered: Vec<bool>,
}

impl RoundRobin {
    #[must_use]
    pub fn new(num_inputs: usize) -> Self {
        Self {
            last_grant: num_inputs.saturating_sub(1),
            registered: vec![false; num_inputs],
        }
    }
}

impl Arbitrate for RoundRobin {
    fn arbitrate(
        &mut self,
        entity: &Rc<Entity>,
        _cycle: u64,
        requests: &[Request],
    ) -> Option<usize> {
        let num_inputs = self.registered.len();
        if num_inputs == 0 {
            return None;
        }

        for i in 1..=num_inputs {
            let index = (self.last_grant + i) % num_inputs;
            if self.registered[index] {
                self.last_grant = index;
                break;
            }
        }

        for (registered, request) in self.registered.iter_mut().zip(requests) {
            *registered = request.pending;
        }

        trace!(entity ; "rr: {} -> {}", requests_str(requests), self.last_grant);
        Some(self.last_grant)
    }

    fn kind(&self) -> ArbitrationKind {
        ArbitrationKind::RoundRobin
    }
}
