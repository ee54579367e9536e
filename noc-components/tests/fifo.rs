// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use noc_components::fifo::BoundedFifo;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random interleavings of push and pop preserve insertion order.
#[test]
fn fifo_order_is_preserved() {
    let mut rng = StdRng::seed_from_u64(7);
    for capacity in 1..=16 {
        let mut fifo = BoundedFifo::new(capacity);
        let mut next_in = 0u32;
        let mut next_out = 0u32;
        for _ in 0..500 {
            if rng.gen_bool(0.55) {
                if fifo.push(next_in).is_ok() {
                    next_in += 1;
                } else {
                    assert_eq!(fifo.len(), capacity);
                }
            } else if let Some(v) = fifo.pop() {
                assert_eq!(v, next_out);
                next_out += 1;
            }
            assert!(fifo.len() <= capacity);
        }
        while let Some(v) = fifo.pop() {
            assert_eq!(v, next_out);
            next_out += 1;
        }
        assert_eq!(next_in, next_out);
    }
}
