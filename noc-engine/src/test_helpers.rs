// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::rc::Rc;

use noc_track::tracker::{EntityManager, TextTracker};
use noc_track::{Tracker, Writer};

use crate::engine::Engine;

/// Create a text tracker writing to `traces/<test file stem>.log`.
#[must_use]
pub fn create_tracker(full_filepath: &str) -> Tracker {
    // Place all trace files in one folder
    const FOLDER: &str = "traces";

    // Create that folder if it doesn't exist yet
    fs::create_dir_all(FOLDER).unwrap();

    let filename_only = Path::new(full_filepath)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap();

    let log_writer: Writer = Box::new(BufWriter::new(
        fs::File::create(format!("{FOLDER}/{filename_only}.log")).unwrap(),
    ));

    let default_log_level = log::Level::Info;
    let entity_manager = EntityManager::new(default_log_level);
    let tracker: Tracker = Rc::new(TextTracker::new(entity_manager, log_writer));
    tracker
}

#[must_use]
pub fn start_test(full_filepath: &str) -> Engine {
    Engine::new(&create_tracker(full_filepath))
}
