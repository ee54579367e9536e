// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Named nodes of the simulation hierarchy.
//!
//! Every model component owns an [`Entity`]. Its path (for example
//! `top::noc::tile5::ic_east`) is what the per-entity log filters match
//! against, and its [`Id`] tags every event it emits.

use std::fmt;
use std::rc::Rc;

use crate::{Id, NO_ID, Tracker, create, destroy};

const SEPARATOR: &str = "::";

pub struct Entity {
    /// Last component of the path.
    pub name: String,

    /// `None` only for the top-level entity.
    pub parent: Option<Rc<Entity>>,

    pub id: Id,

    pub tracker: Tracker,

    path: String,
}

impl Entity {
    /// Create an entity below `parent`. It shares the parent's tracker.
    #[must_use]
    pub fn new(parent: &Rc<Entity>, name: &str) -> Self {
        let path = format!("{}{SEPARATOR}{name}", parent.path);
        Self::register(Some(parent.clone()), name, path, parent.tracker.clone())
    }

    fn register(parent: Option<Rc<Entity>>, name: &str, path: String, tracker: Tracker) -> Self {
        let id = tracker.unique_id();
        tracker.add_entity(id, &path);
        let entity = Self {
            name: name.to_string(),
            parent,
            id,
            tracker,
            path,
        };
        create!(entity);
        entity
    }

    /// Create an entity below `parent` and share it.
    #[must_use]
    pub fn child(parent: &Rc<Entity>, name: &str) -> Rc<Entity> {
        Rc::new(Self::new(parent, name))
    }

    /// The full hierarchical name, parts joined with `::`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.path
    }

    /// Id of the parent, or [`NO_ID`] at the top level.
    #[must_use]
    pub fn parent_id(&self) -> Id {
        self.parent.as_ref().map_or(NO_ID, |parent| parent.id)
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        destroy!(self);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("path", &self.path)
            .field("id", &self.id)
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Create the root of a hierarchy.
#[must_use]
pub fn toplevel(tracker: &Tracker, name: &str) -> Rc<Entity> {
    Rc::new(Entity::register(
        None,
        name,
        name.to_string(),
        tracker.clone(),
    ))
}
