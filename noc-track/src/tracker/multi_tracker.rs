// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use crate::Id;
use crate::tracker::{EntityManager, Track, Tracker};

/// Container for multiple [`Tracker`]s
pub struct MultiTracker {
    entity_manager: EntityManager,
    trackers: Vec<Tracker>,
}

impl MultiTracker {
    /// Add a new tracker
    pub fn add_tracker(&mut self, tracker: Tracker) {
        self.trackers.push(tracker);
    }
}

impl Default for MultiTracker {
    fn default() -> Self {
        Self {
            // Only used to hand out ids shared by all the trackers
            entity_manager: EntityManager::new(log::Level::Error),
            trackers: Vec::new(),
        }
    }
}

impl Track for MultiTracker {
    fn unique_id(&self) -> Id {
        self.entity_manager.unique_id()
    }

    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool {
        self.trackers
            .iter()
            .any(|tracker| tracker.is_entity_enabled(id, level))
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        for tracker in &self.trackers {
            tracker.add_entity(id, entity_name);
        }
    }

    fn create(&self, created_by: Id, created_obj: Id, name: &str) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(created_obj, log::Level::Trace) {
                tracker.create(created_by, created_obj, name);
            }
        }
    }

    fn destroy(&self, destroyed_by: Id, destroyed_obj: Id) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(destroyed_obj, log::Level::Trace) {
                tracker.destroy(destroyed_by, destroyed_obj);
            }
        }
    }

    fn value(&self, id: Id, value: f64) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(id, log::Level::Trace) {
                tracker.value(id, value);
            }
        }
    }

    fn log(&self, msg_by: Id, level: log::Level, msg: std::fmt::Arguments) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(msg_by, level) {
                tracker.log(msg_by, level, msg);
            }
        }
    }

    fn time(&self, set_by: Id, cycle: u64) {
        for tracker in &self.trackers {
            tracker.time(set_by, cycle);
        }
    }

    fn shutdown(&self) {
        for tracker in &self.trackers {
            tracker.shutdown();
        }
    }
}
