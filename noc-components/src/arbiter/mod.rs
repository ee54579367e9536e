// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Arbitration between a set of requesters.
//!
//! An arbiter is given one [`Request`] per requester each time it is called
//! and returns the index of the requester that has been granted, if any. The
//! [`Arbitrate`] trait allows the discipline to be selected at construction
//! time; see [`policy`] for the available disciplines and
//! [`policy::build_policy`] to create one from an [`ArbitrationKind`].

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use noc_engine::sim_error;
use noc_engine::types::SimError;
use noc_track::entity::Entity;
use serde::{Deserialize, Serialize};

pub mod policy;

/// The state of one requester on one call to the arbiter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Request {
    /// The requester has work to do.
    pub pending: bool,

    /// Additional priority used by disciplines that support weighting.
    pub weight: u64,
}

impl Request {
    #[must_use]
    pub fn new(pending: bool, weight: u64) -> Self {
        Self { pending, weight }
    }

    #[must_use]
    pub fn pending(pending: bool) -> Self {
        Self { pending, weight: 0 }
    }
}

/// The available arbitration disciplines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArbitrationKind {
    /// Grant `cycle % n` regardless of the requests.
    Sequence,

    /// Rotate fairly between the pending requesters.
    #[default]
    RoundRobin,

    /// Grant the requester that has waited longest.
    Adaptive,
}

impl fmt::Display for ArbitrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArbitrationKind::Sequence => "sequence",
            ArbitrationKind::RoundRobin => "round-robin",
            ArbitrationKind::Adaptive => "adaptive",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ArbitrationKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequence" => Ok(ArbitrationKind::Sequence),
            "round-robin" | "rr" => Ok(ArbitrationKind::RoundRobin),
            "adaptive" => Ok(ArbitrationKind::Adaptive),
            _ => sim_error!(format!("unknown arbitration '{s}'")),
        }
    }
}

pub trait Arbitrate {
    /// Select one of the requesters.
    ///
    /// A discipline may return an index whose request is not pending (for
    /// example [`policy::Sequence`]); callers must check before acting on
    /// the grant.
    fn arbitrate(&mut self, entity: &Rc<Entity>, cycle: u64, requests: &[Request])
    -> Option<usize>;

    /// The discipline implemented.
    fn kind(&self) -> ArbitrationKind;
}

/// Render requests for trace output, e.g. `r-r-` for requesters 0 and 2.
#[must_use]
pub fn requests_str(requests: &[Request]) -> String {
    requests
        .iter()
        .map(|r| if r.pending { 'r' } else { '-' })
        .collect()
}
