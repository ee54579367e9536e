// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Partially adaptive turn models.
//!
//! Each rule forbids a pair of turns so that no cycle of channel dependencies
//! can form. When the rule leaves more than one productive direction the
//! tile's [`TurnSelection`](noc_config::TurnSelection) picks one.

use noc_config::RoutingAlgorithm;

use crate::direction::Direction;
use crate::fault_info::FaultInfo;
use crate::routing::{RouteRequest, RouterContext, RoutingEngine, RoutingEnv, offsets};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnRule {
    /// All westward hops are taken first.
    WestFirst,
    /// Northward hops are only taken with eastward or westward ones still
    /// outstanding, or last.
    NorthLast,
    /// Hops towards lower rows or columns (north and west) are taken first.
    NegativeFirst,
}

pub struct TurnModel {
    ctx: RouterContext,
    rule: TurnRule,
}

impl TurnModel {
    #[must_use]
    pub fn new(ctx: RouterContext, rule: TurnRule) -> Self {
        Self { ctx, rule }
    }

    /// Legal productive directions for a packet `(drow, dcol)` away from its
    /// destination. Never empty unless the packet has arrived.
    fn candidates(&self, drow: isize, dcol: isize) -> Vec<Direction> {
        let vertical = match drow {
            0 => None,
            d if d < 0 => Some(Direction::North),
            _ => Some(Direction::South),
        };
        let horizontal = match dcol {
            0 => None,
            d if d < 0 => Some(Direction::West),
            _ => Some(Direction::East),
        };

        match self.rule {
            TurnRule::WestFirst => match horizontal {
                Some(Direction::West) => vec![Direction::West],
                _ => vertical.into_iter().chain(horizontal).collect(),
            },
            TurnRule::NorthLast => match (vertical, horizontal) {
                (Some(Direction::North), Some(h)) => vec![Direction::North, h],
                (_, Some(h)) => vec![h],
                (v, None) => v.into_iter().collect(),
            },
            TurnRule::NegativeFirst => {
                let negative: Vec<Direction> = vertical
                    .into_iter()
                    .chain(horizontal)
                    .filter(|d| matches!(d, Direction::North | Direction::West))
                    .collect();
                if negative.is_empty() {
                    vertical.into_iter().chain(horizontal).collect()
                } else {
                    negative
                }
            }
        }
    }
}

impl RoutingEngine for TurnModel {
    fn calc_next(
        &mut self,
        env: &RoutingEnv,
        request: &RouteRequest,
        _fault_info: &mut FaultInfo,
    ) -> Option<Direction> {
        let dest = request.destination()?;
        let (drow, dcol) = offsets(&self.ctx.grid, self.ctx.tile, dest);
        if drow == 0 && dcol == 0 {
            return Some(Direction::Core);
        }
        let candidates = self.candidates(drow, dcol);
        self.ctx.select(env, &candidates)
    }

    fn algorithm(&self) -> RoutingAlgorithm {
        match self.rule {
            TurnRule::WestFirst => RoutingAlgorithm::WestFirst,
            TurnRule::NorthLast => RoutingAlgorithm::NorthLast,
            TurnRule::NegativeFirst => RoutingAlgorithm::NegativeFirst,
        }
    }
}
