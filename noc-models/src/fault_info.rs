// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Per-packet state used by fault-tolerant routing.

use std::fmt;

/// Number of forward moves that can be recorded in [`FaultInfo::history`].
pub const HISTORY_BITS: u32 = u32::BITS;

/// Carried by HEAD/HDT flits and updated at every hop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaultInfo {
    /// The previous move was a backtrack.
    pub last_back: bool,

    /// The forward move undone by the last backtrack had been adaptive.
    pub last_back_adaptive: bool,

    /// Quadrant of the destination seen at the previous hop.
    pub last_dir: Option<u8>,

    /// The packet cannot be delivered.
    pub fail: bool,

    /// One bit per forward move, newest in bit 0: 0 normal, 1 adaptive.
    pub history: u32,
}

impl FaultInfo {
    /// Whether the most recent forward move was adaptive.
    #[must_use]
    pub fn last_was_adaptive(&self) -> bool {
        self.history & 1 != 0
    }

    /// Whether pushing another move would lose the oldest recorded one.
    #[must_use]
    pub fn history_full(&self) -> bool {
        self.history & (1 << (HISTORY_BITS - 1)) != 0
    }
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last_dir = match self.last_dir {
            Some(q) => q.to_string(),
            None => "-".to_string(),
        };
        write!(
            f,
            "back:{} back_adaptive:{} last_dir:{} fail:{} history:{:#x}",
            self.last_back, self.last_back_adaptive, last_dir, self.fail, self.history
        )
    }
}
