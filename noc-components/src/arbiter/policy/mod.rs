// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Arbitration policies

mod adaptive;
mod round_robin;
mod sequence;

pub use adaptive::Adaptive;
pub use round_robin::RoundRobin;
pub use sequence::Sequence;

use crate::arbiter::{Arbitrate, ArbitrationKind};

/// Create the policy for a discipline with `num_inputs` requesters.
#[must_use]
pub fn build_policy(kind: ArbitrationKind, num_inputs: usize) -> Box<dyn Arbitrate> {
    match kind {
        ArbitrationKind::Sequence => Box::new(Sequence::new(num_inputs)),
        ArbitrationKind::RoundRobin => Box::new(RoundRobin::new(num_inputs)),
        ArbitrationKind::Adaptive => Box::new(Adaptive::new(num_inputs)),
    }
}
