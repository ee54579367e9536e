// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! This crate provides combined _track_ capabilities for the NoC simulator.
//!
//! _Track_ means the combination of _log_ and _trace_ where:
//!
//!   - _log_ are text-based human-readable messages emitted at various levels
//!     of verbosity (from `Trace` through to `Error`).
//!   - _trace_ provides a standard set of modelling events that can be emitted.
//!     For example, entity creation/destruction or a value being updated.
//!
//! Every part of a model owns an [`Entity`](crate::entity::Entity) and all
//! events are emitted through the macros of this crate so that the output of
//! each entity can be filtered by its hierarchical name.

// Enable warnings for missing documentation
#![warn(missing_docs)]

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

pub use log;

pub mod builder;
pub mod entity;
pub mod test_helpers;

/// Include the trackers.
pub mod tracker;
pub use tracker::{Track, TrackConfigError, Tracker};

/// A type alias for objects that receive _log_ / _trace_ events.
pub type Writer = Box<dyn std::io::Write>;
type SharedWriter = Rc<RefCell<Writer>>;

/// Take a command-line string and convert it to a [`log::Level`].
pub fn str_to_level(lvl: &str) -> Result<log::Level, TrackConfigError> {
    log::Level::from_str(lvl)
        .map_err(|_| TrackConfigError(format!("Unable to parse level string '{lvl}'")))
}

/// Unique identifier given to each entity.
///
/// There are two reserved values: [NO_ID] and [ROOT].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(pub u64);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id value which indicates where there is no valid entity.
pub const NO_ID: Id = Id(0);

/// The root id from which all other ids are derived.
pub const ROOT: Id = Id(1);

/// Add an entity creation event
#[macro_export]
macro_rules! create {
    ($entity:expr) => {{
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            $entity
                .tracker
                .create($entity.parent_id(), $entity.id, $entity.full_name());
        }
    }};
}

/// Add an entity destroy event
#[macro_export]
macro_rules! destroy {
    ($entity:expr) => {{
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            $entity.tracker.destroy($entity.parent_id(), $entity.id);
        }
    }};
}

/// Track an entity changing a numeric value (for example buffer occupancy).
#[macro_export]
macro_rules! value {
    ($entity:expr ; $value:expr) => {{
        if $entity
            .tracker
            .is_entity_enabled($entity.id, $crate::log::Level::Trace)
        {
            $entity.tracker.value($entity.id, $value as f64);
        }
    }};
}

/// Update the current simulation cycle.
///
/// Always forwarded so that trackers can stamp log lines with the cycle.
#[macro_export]
macro_rules! set_time {
    ($entity:expr ; $cycle:expr) => {{
        $entity.tracker.time($entity.id, $cycle);
    }};
}

/// Base macro for log messages of all levels.
#[macro_export]
macro_rules! log_base {
    ($entity:expr ; $lvl:expr, $($arg:tt)+) => (
        if $entity.tracker.is_entity_enabled($entity.id, $lvl) {
            $entity.tracker.log($entity.id, $lvl, format_args!($($arg)+));
        }
    );
}

/// The `trace` macro emits a log message at level `log::Level::Trace`
#[macro_export]
macro_rules! trace {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Trace, $($arg)+);
    );
}

/// The `debug` macro emits a log message at level `log::Level::Debug`
#[macro_export]
macro_rules! debug {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Debug, $($arg)+);
    );
}

/// The `info` macro emits a log message at level `log::Level::Info`
#[macro_export]
macro_rules! info {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Info, $($arg)+);
    );
}

/// The `warn` macro emits a log message at level `log::Level::Warn`
#[macro_export]
macro_rules! warn {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Warn, $($arg)+);
    );
}

/// The `error` macro emits a log message at level `log::Level::Error`
#[macro_export]
macro_rules! error {
    ($entity:expr ; $($arg:tt)+) => (
        $crate::log_base!($entity ; $crate::log::Level::Error, $($arg)+);
    );
}
