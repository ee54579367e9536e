// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A synchronous, cycle-stepped simulation engine.
//!
//! Components implement [`Clocked`](crate::traits::Clocked) and are
//! registered with the [`Engine`](crate::engine::Engine). Every cycle is run
//! in two phases:
//!
//!  - _evaluate_: each component computes its next state from the state that
//!    was committed at the end of the previous cycle.
//!  - _commit_: each component latches the values it produced so that they
//!    become visible to the rest of the simulation on the following cycle.
//!
//! Because no component can observe a value written during the same evaluate
//! phase, the order in which components are registered does not change the
//! result of a simulation.

pub mod engine;
pub mod test_helpers;
pub mod time;
pub mod traits;
pub mod types;

/// Run a simulation for a number of cycles and finalize all components.
///
/// Intended for tests and examples; panics on error.
#[macro_export]
macro_rules! run_simulation {
    ($engine:expr, $cycles:expr) => {
        $engine.run_for($cycles).unwrap();
        $engine.finalize().unwrap();
    };
}
