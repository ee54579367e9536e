// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Credits returned from an input channel to the upstream output channel.

/// State of one virtual channel of an input channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreditLine {
    /// The VC has been released by the packet that occupied it.
    pub free_vc: bool,

    /// There is at least one free buffer slot in the VC.
    pub free_buf: bool,
}

impl CreditLine {
    #[must_use]
    pub fn new(free_vc: bool, free_buf: bool) -> Self {
        Self { free_vc, free_buf }
    }
}

impl Default for CreditLine {
    fn default() -> Self {
        Self {
            free_vc: true,
            free_buf: true,
        }
    }
}
