// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use noc_engine::run_simulation;
use noc_engine::sim_error;
use noc_engine::test_helpers::start_test;
use noc_engine::time::clock::{COMMIT_PHASE, Clock, EVALUATE_PHASE};
use noc_engine::traits::Clocked;
use noc_engine::types::{SimError, SimResult};

/// A register that copies the value seen on `input` to `output`.
struct Stage {
    input: Rc<Cell<u64>>,
    next: u64,
    output: Rc<Cell<u64>>,
}

impl Clocked for Stage {
    fn evaluate(&mut self, clock: &Clock) -> SimResult {
        assert_eq!(clock.tick_now().phase(), EVALUATE_PHASE);
        self.next = self.input.get();
        Ok(())
    }

    fn commit(&mut self, clock: &Clock) -> SimResult {
        assert_eq!(clock.tick_now().phase(), COMMIT_PHASE);
        self.output.set(self.next);
        Ok(())
    }
}

struct Counter {
    value: Rc<Cell<u64>>,
    finalized: Rc<Cell<u32>>,
}

impl Clocked for Counter {
    fn evaluate(&mut self, _clock: &Clock) -> SimResult {
        Ok(())
    }

    fn commit(&mut self, clock: &Clock) -> SimResult {
        self.value.set(clock.cycle() + 1);
        Ok(())
    }

    fn finalize(&mut self, _clock: &Clock) -> SimResult {
        self.finalized.set(self.finalized.get() + 1);
        Ok(())
    }
}

fn pipeline(reverse: bool) -> u64 {
    let mut engine = start_test(file!());
    let a = Rc::new(Cell::new(0));
    let b = Rc::new(Cell::new(0));
    let c = Rc::new(Cell::new(0));
    let finalized = Rc::new(Cell::new(0));

    let counter = Rc::new(RefCell::new(Counter {
        value: a.clone(),
        finalized: finalized.clone(),
    }));
    let first = Rc::new(RefCell::new(Stage {
        input: a,
        next: 0,
        output: b.clone(),
    }));
    let second = Rc::new(RefCell::new(Stage {
        input: b,
        next: 0,
        output: c.clone(),
    }));

    if reverse {
        engine.register(second);
        engine.register(first);
        engine.register(counter);
    } else {
        engine.register(counter);
        engine.register(first);
        engine.register(second);
    }

    run_simulation!(engine, 10);
    assert_eq!(engine.cycle(), 10);
    assert_eq!(finalized.get(), 1);
    c.get()
}

#[test]
fn two_phase_delays_each_stage() {
    // The counter reaches 10; each stage adds one cycle of delay.
    assert_eq!(pipeline(false), 8);
}

#[test]
fn registration_order_is_irrelevant() {
    assert_eq!(pipeline(false), pipeline(true));
}

struct Failing;

impl Clocked for Failing {
    fn evaluate(&mut self, clock: &Clock) -> SimResult {
        if clock.cycle() == 3 {
            return sim_error!(format!("failed at {}", clock.cycle()));
        }
        Ok(())
    }

    fn commit(&mut self, _clock: &Clock) -> SimResult {
        Ok(())
    }
}

#[test]
fn error_stops_run() {
    let mut engine = start_test(file!());
    engine.register(Rc::new(RefCell::new(Failing)));
    let result = engine.run_for(10);
    assert_eq!(result, Err(SimError("failed at 3".to_string())));
    assert_eq!(engine.cycle(), 3);
    assert_eq!(format!("{}", result.unwrap_err()), "Error: failed at 3");
}

#[test]
fn finalize_only_once() {
    let mut engine = start_test(file!());
    let finalized = Rc::new(Cell::new(0));
    engine.register(Rc::new(RefCell::new(Counter {
        value: Rc::new(Cell::new(0)),
        finalized: finalized.clone(),
    })));
    engine.run_for(2).unwrap();
    engine.finalize().unwrap();
    engine.finalize().unwrap();
    assert_eq!(finalized.get(), 1);
}
