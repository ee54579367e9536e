// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::Cell;

use crate::tracker::Track;
use crate::{Id, ROOT};

/// A tracker that drops every event.
///
/// Ids are still unique so that entities can be created as normal.
pub struct DevNullTracker {
    unique_id: Cell<u64>,
}

impl Default for DevNullTracker {
    fn default() -> Self {
        Self {
            unique_id: Cell::new(ROOT.0 + 1),
        }
    }
}

impl Track for DevNullTracker {
    fn unique_id(&self) -> Id {
        let id = self.unique_id.get();
        self.unique_id.set(id + 1);
        Id(id)
    }

    fn is_entity_enabled(&self, _id: Id, _level: log::Level) -> bool {
        false
    }

    fn add_entity(&self, _id: Id, _entity_name: &str) {}
    fn create(&self, _created_by: Id, _created_obj: Id, _name: &str) {}
    fn destroy(&self, _destroyed_by: Id, _destroyed_obj: Id) {}
    fn value(&self, _id: Id, _value: f64) {}
    fn log(&self, _msg_by: Id, _level: log::Level, _msg: std::fmt::Arguments) {}
    fn time(&self, _set_by: Id, _cycle: u64) {}
    fn shutdown(&self) {}
}
